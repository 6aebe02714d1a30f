//! Bulk and write results

use serde::{Deserialize, Serialize};

use crate::errors::PimError;

/// Outcome of one item in a bulk operation
///
/// Bulk operations never fail as a whole from the caller's point of view;
/// every input item maps to exactly one `BulkItemResult`, in input order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkItemResult {
    pub identifier: String,
    /// HTTP status for the item; `0` when no response was received
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BulkItemResult {
    pub fn new(identifier: impl Into<String>, status_code: u16, message: Option<String>) -> Self {
        Self { identifier: identifier.into(), status_code, message }
    }

    /// Record a failed item, keeping the error's status when it has one.
    pub fn from_error(identifier: impl Into<String>, error: &PimError) -> Self {
        Self::new(identifier, error.status().unwrap_or(0), Some(error.to_string()))
    }

    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.status_code >= 200 && self.status_code < 300
    }
}

/// One line of a native bulk response
///
/// ```json
/// {"line": 1, "identifier": "sku-1", "status_code": 204}
/// {"line": 2, "code": "shirts", "status_code": 422, "message": "..."}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkStatusLine {
    /// 1-based position of the item in the request payload
    pub line: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BulkStatusLine {
    /// Resource key reported by the server (`identifier` or `code`).
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        self.identifier.as_deref().or(self.code.as_deref())
    }

    /// Parse a newline-delimited response body, skipping blank lines.
    ///
    /// # Errors
    /// Returns `PimError::Decode` on the first malformed line.
    pub fn parse_ndjson(body: &str) -> Result<Vec<Self>, PimError> {
        body.lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(|line| {
                serde_json::from_str(line)
                    .map_err(|e| PimError::Decode(format!("invalid bulk status line: {e}")))
            })
            .collect()
    }
}

/// Acknowledgement of a single write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteAck {
    pub status: u16,
    /// `Location` of the created or updated resource
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl WriteAck {
    #[must_use]
    pub const fn created(&self) -> bool {
        self.status == 201
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_ndjson_status_lines() {
        let body = "{\"line\":1,\"identifier\":\"sku-1\",\"status_code\":201}\n\n\
                    {\"line\":2,\"code\":\"shirts\",\"status_code\":422,\"message\":\"bad\"}\n";
        let lines = BulkStatusLine::parse_ndjson(body).unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].key(), Some("sku-1"));
        assert_eq!(lines[1].key(), Some("shirts"));
        assert_eq!(lines[1].message.as_deref(), Some("bad"));

        assert!(BulkStatusLine::parse_ndjson("{not json}").is_err());
    }

    #[test]
    fn test_item_result_from_error() {
        let err = PimError::Api { status: 500, message: "boom".into() };
        let result = BulkItemResult::from_error("sku-1", &err);
        assert_eq!(result.status_code, 500);
        assert!(!result.is_success());

        let result = BulkItemResult::from_error("sku-2", &PimError::connect("refused"));
        assert_eq!(result.status_code, 0);
        assert!(result.message.unwrap().contains("refused"));
    }
}
