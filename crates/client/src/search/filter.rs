//! Filter clauses and the field-keyed filter set

use pimsdk_domain::{PimError, Result};
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::Value;

use super::operator::{FieldKind, Operator, ValueShape};

/// What a clause filters on, which decides its locale/scope rules
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Built-in property (`enabled`, `family`, ...)
    Property,
    /// Product attribute, optionally localizable and scopable
    Attribute,
    /// Raw clause, unchecked
    Raw,
}

/// One search condition
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FilterClause {
    #[serde(skip)]
    pub field: String,
    #[serde(skip)]
    pub kind: FieldKind,
    #[serde(skip)]
    pub target: Target,
    pub operator: Operator,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locales: Option<Vec<String>>,
}

impl FilterClause {
    /// Clause without locale or scope; the value is dropped for operators
    /// that take none.
    pub fn new(
        field: impl Into<String>,
        kind: FieldKind,
        target: Target,
        operator: Operator,
        value: Value,
    ) -> Self {
        Self {
            field: field.into(),
            kind,
            target,
            operator,
            value: operator.takes_value().then_some(value),
            locale: None,
            scope: None,
            locales: None,
        }
    }

    /// Check operator, value shape and locale/scope use.
    ///
    /// # Errors
    /// `PimError::Validation` naming the field.
    pub fn validate(&self) -> Result<()> {
        if !self.kind.allows(self.operator) {
            return Err(self.invalid(format!(
                "operator {} is not allowed on {} fields",
                self.operator,
                self.kind.label()
            )));
        }
        if self.kind != FieldKind::Any {
            self.validate_value()?;
        }
        self.validate_context()
    }

    fn validate_value(&self) -> Result<()> {
        let value = match (self.operator.value_shape(), &self.value) {
            (ValueShape::Absent, None) => return Ok(()),
            (ValueShape::Absent, Some(_)) => {
                return Err(self.invalid(format!("operator {} takes no value", self.operator)));
            }
            (_, None) => {
                return Err(self.invalid(format!("operator {} requires a value", self.operator)));
            }
            (_, Some(value)) => value,
        };

        let elements: Vec<&Value> = match self.operator.value_shape() {
            ValueShape::Scalar if value.is_array() => {
                return Err(self.invalid(format!("operator {} expects a single value", self.operator)));
            }
            ValueShape::Scalar => vec![value],
            ValueShape::List => match value.as_array() {
                Some(items) if !items.is_empty() => items.iter().collect(),
                _ => {
                    return Err(self.invalid(format!(
                        "operator {} expects a non-empty list",
                        self.operator
                    )));
                }
            },
            ValueShape::Range => match value.as_array() {
                Some(items) if items.len() == 2 => items.iter().collect(),
                _ => {
                    return Err(self.invalid(format!(
                        "operator {} expects a list of two bounds",
                        self.operator
                    )));
                }
            },
            ValueShape::Absent => Vec::new(),
        };

        let expected = self.element_type();
        if let Some(bad) = elements.iter().find(|v| !expected.matches(v)) {
            return Err(self.invalid(format!("expected {} value, got {bad}", expected.label())));
        }
        Ok(())
    }

    fn validate_context(&self) -> Result<()> {
        match self.target {
            Target::Raw => Ok(()),
            Target::Attribute => {
                if self.locales.is_some() {
                    return Err(self.invalid("attribute filters take a single locale"));
                }
                Ok(())
            }
            Target::Property => match self.kind {
                FieldKind::Completeness => {
                    if self.scope.is_none() {
                        return Err(self.invalid("completeness filters require a scope"));
                    }
                    if self.locale.is_some() {
                        return Err(self.invalid("completeness filters take locales, not locale"));
                    }
                    Ok(())
                }
                FieldKind::ModelCompleteness => {
                    if self.scope.is_none() {
                        return Err(self.invalid("completeness filters require a scope"));
                    }
                    if self.locale.is_some() && self.locales.is_some() {
                        return Err(self.invalid("completeness filters take locale or locales, not both"));
                    }
                    Ok(())
                }
                FieldKind::QualityScore => {
                    if self.scope.is_none() || self.locale.is_none() {
                        return Err(self.invalid("quality score filters require a scope and a locale"));
                    }
                    Ok(())
                }
                _ if self.locale.is_some() || self.scope.is_some() || self.locales.is_some() => {
                    Err(self.invalid(format!("{} filters are not localizable or scopable", self.field)))
                }
                _ => Ok(()),
            },
        }
    }

    fn element_type(&self) -> ElementType {
        match (self.kind, self.operator) {
            (_, Operator::SinceLastNDays) => ElementType::Integer,
            (FieldKind::Enabled | FieldKind::Boolean, _) => ElementType::Bool,
            (FieldKind::Completeness, _) => ElementType::Integer,
            (FieldKind::Number, _) => ElementType::Number,
            _ => ElementType::String,
        }
    }

    fn invalid(&self, message: impl Into<String>) -> PimError {
        PimError::invalid_field(self.field.clone(), message)
    }
}

#[derive(Debug, Clone, Copy)]
enum ElementType {
    Bool,
    Integer,
    Number,
    String,
}

impl ElementType {
    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Bool => value.is_boolean(),
            Self::Integer => value.is_i64() || value.is_u64(),
            // Akeneo number attributes also accept decimal strings
            Self::Number => value.is_number() || value.as_str().is_some_and(|s| s.parse::<f64>().is_ok()),
            Self::String => value.is_string(),
        }
    }

    const fn label(self) -> &'static str {
        match self {
            Self::Bool => "a boolean",
            Self::Integer => "an integer",
            Self::Number => "a numeric",
            Self::String => "a string",
        }
    }
}

/// Clauses keyed by field, both in insertion order
///
/// Serializes to the `search` criteria object:
/// `{"field": [{"operator": ..., "value": ...}, ...], ...}`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterSet {
    fields: Vec<(String, Vec<FilterClause>)>,
}

impl FilterSet {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Append a clause; clauses on the same field are AND-ed in order.
    pub fn push(&mut self, clause: FilterClause) {
        match self.fields.iter_mut().find(|(field, _)| *field == clause.field) {
            Some((_, clauses)) => clauses.push(clause),
            None => self.fields.push((clause.field.clone(), vec![clause])),
        }
    }

    /// Clauses for one field.
    #[must_use]
    pub fn get(&self, field: &str) -> &[FilterClause] {
        self.fields.iter().find(|(f, _)| f == field).map_or(&[], |(_, clauses)| clauses.as_slice())
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(field, _)| field.as_str())
    }

    pub fn clauses(&self) -> impl Iterator<Item = &FilterClause> {
        self.fields.iter().flat_map(|(_, clauses)| clauses.iter())
    }

    /// Validate every clause.
    ///
    /// # Errors
    /// The first invalid clause, as `PimError::Validation`.
    pub fn validate(&self) -> Result<()> {
        self.clauses().try_for_each(FilterClause::validate)
    }

    /// Compact JSON of the criteria object.
    ///
    /// # Errors
    /// `PimError::Decode` if a value cannot be serialized.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }
}

impl Serialize for FilterSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len()))?;
        for (field, clauses) in &self.fields {
            map.serialize_entry(field, clauses)?;
        }
        map.end()
    }
}
