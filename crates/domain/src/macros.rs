//! Macro for implementing Display and FromStr for wire-token enums
//!
//! HTTP methods and search operators travel as fixed upper-case tokens
//! (`"PATCH"`, `"NOT IN"`, `"SINCE LAST N DAYS"`). This macro generates a
//! single mapping for both directions so the two can never drift apart.
//!
//! # Example
//!
//! ```rust
//! use pimsdk_domain::impl_wire_token_conversions;
//!
//! #[derive(Debug, Clone, Copy, PartialEq, Eq)]
//! pub enum Direction {
//!     Ascending,
//!     Descending,
//! }
//!
//! impl_wire_token_conversions!(Direction {
//!     Ascending => "ASC",
//!     Descending => "DESC",
//! });
//!
//! assert_eq!(Direction::Ascending.to_string(), "ASC");
//! assert_eq!("desc".parse::<Direction>().unwrap(), Direction::Descending);
//! ```

/// Implements Display, FromStr and `as_str` for wire-token enums
///
/// - Display writes the token exactly as declared
/// - FromStr parses case-insensitively and tolerates surrounding whitespace
/// - Parse errors name the enum and echo the rejected input
#[macro_export]
macro_rules! impl_wire_token_conversions {
    ($enum_name:ident { $($variant:ident => $str:expr),+ $(,)? }) => {
        impl $enum_name {
            /// Wire token for this variant.
            #[must_use]
            pub const fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $str,)+
                }
            }
        }

        impl std::fmt::Display for $enum_name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $enum_name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let candidate = s.trim();
                $(
                    if candidate.eq_ignore_ascii_case($str) {
                        return Ok(Self::$variant);
                    }
                )+
                Err(format!("Invalid {}: {}", stringify!($enum_name), s))
            }
        }
    };
}
