//! Search operators and the field kinds that accept them

use pimsdk_domain::impl_wire_token_conversions;
use serde::{Serialize, Serializer};

/// Comparison operator of one filter clause
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Equal,
    NotEqual,
    Lower,
    LowerOrEqual,
    Greater,
    GreaterOrEqual,
    Between,
    NotBetween,
    In,
    NotIn,
    InOrUnclassified,
    InChildren,
    NotInChildren,
    Unclassified,
    Empty,
    NotEmpty,
    Contains,
    DoesNotContain,
    StartsWith,
    SinceLastNDays,
    GreaterOnAllLocales,
    GreaterOrEqualOnAllLocales,
    LowerOnAllLocales,
    LowerOrEqualOnAllLocales,
    AllComplete,
    AllIncomplete,
    AtLeastComplete,
    AtLeastIncomplete,
}

impl_wire_token_conversions!(Operator {
    Equal => "=",
    NotEqual => "!=",
    Lower => "<",
    LowerOrEqual => "<=",
    Greater => ">",
    GreaterOrEqual => ">=",
    Between => "BETWEEN",
    NotBetween => "NOT BETWEEN",
    In => "IN",
    NotIn => "NOT IN",
    InOrUnclassified => "IN OR UNCLASSIFIED",
    InChildren => "IN CHILDREN",
    NotInChildren => "NOT IN CHILDREN",
    Unclassified => "UNCLASSIFIED",
    Empty => "EMPTY",
    NotEmpty => "NOT EMPTY",
    Contains => "CONTAINS",
    DoesNotContain => "DOES NOT CONTAIN",
    StartsWith => "STARTS WITH",
    SinceLastNDays => "SINCE LAST N DAYS",
    GreaterOnAllLocales => "GREATER THAN ON ALL LOCALES",
    GreaterOrEqualOnAllLocales => "GREATER OR EQUALS THAN ON ALL LOCALES",
    LowerOnAllLocales => "LOWER THAN ON ALL LOCALES",
    LowerOrEqualOnAllLocales => "LOWER OR EQUALS THAN ON ALL LOCALES",
    AllComplete => "ALL COMPLETE",
    AllIncomplete => "ALL INCOMPLETE",
    AtLeastComplete => "AT LEAST COMPLETE",
    AtLeastIncomplete => "AT LEAST INCOMPLETE",
});

impl Serialize for Operator {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Shape of the value an operator expects
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueShape {
    /// No `value` key at all
    Absent,
    Scalar,
    List,
    /// Two-element list
    Range,
}

impl Operator {
    #[must_use]
    pub const fn value_shape(self) -> ValueShape {
        match self {
            Self::Empty
            | Self::NotEmpty
            | Self::Unclassified
            | Self::AllComplete
            | Self::AllIncomplete
            | Self::AtLeastComplete
            | Self::AtLeastIncomplete => ValueShape::Absent,
            Self::In
            | Self::NotIn
            | Self::InOrUnclassified
            | Self::InChildren
            | Self::NotInChildren => ValueShape::List,
            Self::Between | Self::NotBetween => ValueShape::Range,
            _ => ValueShape::Scalar,
        }
    }

    #[must_use]
    pub const fn takes_value(self) -> bool {
        !matches!(self.value_shape(), ValueShape::Absent)
    }
}

/// Type of the field a clause filters on
///
/// Decides which operators are valid and what the value must look like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Uuid,
    Identifier,
    Categories,
    Enabled,
    Completeness,
    /// Product-model completeness: how many variants are complete
    ModelCompleteness,
    Family,
    Groups,
    Date,
    Parent,
    QualityScore,
    Text,
    Number,
    Select,
    Boolean,
    File,
    /// Raw clauses: any known operator, any value
    Any,
}

impl FieldKind {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Uuid => "uuid",
            Self::Identifier => "identifier",
            Self::Categories => "categories",
            Self::Enabled => "enabled",
            Self::Completeness => "completeness",
            Self::ModelCompleteness => "model completeness",
            Self::Family => "family",
            Self::Groups => "groups",
            Self::Date => "date",
            Self::Parent => "parent",
            Self::QualityScore => "quality score",
            Self::Text => "text",
            Self::Number => "number",
            Self::Select => "select",
            Self::Boolean => "boolean",
            Self::File => "file",
            Self::Any => "raw",
        }
    }

    /// Operators accepted for this kind of field.
    #[must_use]
    pub fn allowed_operators(self) -> &'static [Operator] {
        use Operator::{
            AllComplete, AllIncomplete, AtLeastComplete, AtLeastIncomplete, Between, Contains,
            DoesNotContain, Empty, Equal, Greater, GreaterOnAllLocales, GreaterOrEqual,
            GreaterOrEqualOnAllLocales, In, InChildren, InOrUnclassified, Lower, LowerOnAllLocales,
            LowerOrEqual, LowerOrEqualOnAllLocales, NotBetween, NotEmpty, NotEqual, NotIn,
            NotInChildren, SinceLastNDays, StartsWith, Unclassified,
        };

        match self {
            Self::Uuid => &[In, NotIn],
            Self::Identifier => {
                &[Equal, NotEqual, In, NotIn, StartsWith, Contains, DoesNotContain, Empty, NotEmpty]
            }
            Self::Categories => {
                &[In, NotIn, InOrUnclassified, InChildren, NotInChildren, Unclassified]
            }
            Self::Enabled | Self::Boolean => &[Equal, NotEqual],
            Self::Completeness => &[
                Lower,
                LowerOrEqual,
                Equal,
                NotEqual,
                Greater,
                GreaterOrEqual,
                GreaterOnAllLocales,
                GreaterOrEqualOnAllLocales,
                LowerOnAllLocales,
                LowerOrEqualOnAllLocales,
            ],
            Self::ModelCompleteness => {
                &[AllComplete, AllIncomplete, AtLeastComplete, AtLeastIncomplete]
            }
            Self::Family | Self::Groups | Self::Select => &[In, NotIn, Empty, NotEmpty],
            Self::Date => &[
                Equal,
                NotEqual,
                Lower,
                Greater,
                Between,
                NotBetween,
                SinceLastNDays,
                Empty,
                NotEmpty,
            ],
            Self::Parent => &[Equal, In, Empty, NotEmpty],
            Self::QualityScore => &[In],
            Self::Text => &[
                Equal,
                NotEqual,
                In,
                NotIn,
                StartsWith,
                Contains,
                DoesNotContain,
                Empty,
                NotEmpty,
            ],
            Self::File => {
                &[Equal, NotEqual, StartsWith, Contains, DoesNotContain, Empty, NotEmpty]
            }
            Self::Number => {
                &[Lower, LowerOrEqual, Equal, NotEqual, GreaterOrEqual, Greater, Empty, NotEmpty]
            }
            Self::Any => &[],
        }
    }

    #[must_use]
    pub fn allows(self, operator: Operator) -> bool {
        matches!(self, Self::Any) || self.allowed_operators().contains(&operator)
    }
}
