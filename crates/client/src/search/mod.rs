//! Search filter compiler
//!
//! [`SearchQuery`] is an immutable builder: every method returns a new query
//! and leaves the receiver untouched. Nothing is validated until
//! [`SearchQuery::compile`] (or one of its siblings) runs, which checks every
//! clause against its field kind and produces either query parameters or a
//! JSON body. Compilation is pure: the same query always compiles to the
//! same bytes.
//!
//! ```rust
//! use pimsdk_client::search::{AttributeRef, Operator, SearchQuery};
//!
//! let query = SearchQuery::new()
//!     .enabled(Operator::Equal, true)
//!     .family(Operator::In, ["shirts"])
//!     .attribute_text(AttributeRef::new("name").locale("en_US"), Operator::Contains, "linen")
//!     .limit(50);
//!
//! let params = query.compile().unwrap();
//! assert_eq!(params[0].0, "search");
//! assert_eq!(params[1], ("limit".to_string(), "50".to_string()));
//! ```

pub mod filter;
pub mod operator;

use pimsdk_domain::{PimError, RequestDescriptor, Result};
use serde_json::{json, Map, Value};

pub use filter::{FilterClause, FilterSet, Target};
pub use operator::{FieldKind, Operator, ValueShape};

/// Attribute code plus the optional locale and scope of a clause
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeRef {
    pub code: String,
    pub locale: Option<String>,
    pub scope: Option<String>,
}

impl AttributeRef {
    pub fn new(code: impl Into<String>) -> Self {
        Self { code: code.into(), locale: None, scope: None }
    }

    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

impl From<&str> for AttributeRef {
    fn from(code: &str) -> Self {
        Self::new(code)
    }
}

impl From<String> for AttributeRef {
    fn from(code: String) -> Self {
        Self::new(code)
    }
}

/// Locale, scope and locales carried by a clause that has no
/// [`AttributeRef`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClauseContext {
    pub locale: Option<String>,
    pub scope: Option<String>,
    pub locales: Option<Vec<String>>,
}

impl ClauseContext {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    #[must_use]
    pub fn scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }

    #[must_use]
    pub fn locales<I, S>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.locales = Some(locales.into_iter().map(Into::into).collect());
        self
    }

    fn apply_to(self, clause: &mut FilterClause) {
        clause.locale = self.locale;
        clause.scope = self.scope;
        clause.locales = self.locales;
    }
}

/// Immutable search builder
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    filters: FilterSet,
    /// Raw clauses whose operator could not be parsed
    rejected: Vec<(String, String)>,
    search_locale: Option<String>,
    search_scope: Option<String>,
    page: Option<u32>,
    limit: Option<u32>,
    with_count: Option<bool>,
    attributes: Vec<String>,
    locales: Vec<String>,
    scope: Option<String>,
}

fn strings<I, S>(values: I) -> Value
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    Value::Array(values.into_iter().map(|v| Value::String(v.into())).collect())
}

impl SearchQuery {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_clause(&self, clause: FilterClause) -> Self {
        let mut next = self.clone();
        next.filters.push(clause);
        next
    }

    fn property(&self, field: &str, kind: FieldKind, operator: Operator, value: Value) -> Self {
        self.with_clause(FilterClause::new(field, kind, Target::Property, operator, value))
    }

    fn attribute(
        &self,
        attribute: AttributeRef,
        kind: FieldKind,
        operator: Operator,
        value: Value,
    ) -> Self {
        let mut clause = FilterClause::new(attribute.code, kind, Target::Attribute, operator, value);
        clause.locale = attribute.locale;
        clause.scope = attribute.scope;
        self.with_clause(clause)
    }

    // Property filters

    #[must_use]
    pub fn uuid<I, S>(&self, operator: Operator, uuids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property("uuid", FieldKind::Uuid, operator, strings(uuids))
    }

    /// Identifier filter; `value` is a code or a list of codes depending on
    /// the operator.
    #[must_use]
    pub fn identifier(&self, operator: Operator, value: impl Into<Value>) -> Self {
        self.property("identifier", FieldKind::Identifier, operator, value.into())
    }

    #[must_use]
    pub fn categories<I, S>(&self, operator: Operator, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property("categories", FieldKind::Categories, operator, strings(codes))
    }

    #[must_use]
    pub fn enabled(&self, operator: Operator, enabled: bool) -> Self {
        self.property("enabled", FieldKind::Enabled, operator, Value::Bool(enabled))
    }

    /// Completeness on one channel, across all of its locales.
    #[must_use]
    pub fn completeness(&self, operator: Operator, percent: u32, scope: impl Into<String>) -> Self {
        let mut clause = FilterClause::new(
            "completeness",
            FieldKind::Completeness,
            Target::Property,
            operator,
            json!(percent),
        );
        clause.scope = Some(scope.into());
        self.with_clause(clause)
    }

    /// Completeness restricted to some locales of a channel.
    #[must_use]
    pub fn completeness_in_locales<I, S>(
        &self,
        operator: Operator,
        percent: u32,
        scope: impl Into<String>,
        locales: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut clause = FilterClause::new(
            "completeness",
            FieldKind::Completeness,
            Target::Property,
            operator,
            json!(percent),
        );
        clause.scope = Some(scope.into());
        clause.locales = Some(locales.into_iter().map(Into::into).collect());
        self.with_clause(clause)
    }

    /// Product-model completeness (`ALL COMPLETE`, `AT LEAST INCOMPLETE`,
    /// ...). `context` must name a scope and may narrow it to one locale or
    /// a list of locales.
    #[must_use]
    pub fn model_completeness(&self, operator: Operator, context: ClauseContext) -> Self {
        let mut clause = FilterClause::new(
            "completeness",
            FieldKind::ModelCompleteness,
            Target::Property,
            operator,
            Value::Null,
        );
        context.apply_to(&mut clause);
        self.with_clause(clause)
    }

    #[must_use]
    pub fn family<I, S>(&self, operator: Operator, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property("family", FieldKind::Family, operator, strings(codes))
    }

    #[must_use]
    pub fn groups<I, S>(&self, operator: Operator, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.property("groups", FieldKind::Groups, operator, strings(codes))
    }

    /// Creation date; a `YYYY-MM-DD HH:MM:SS` string, a two-date range, or a
    /// day count for `SINCE LAST N DAYS`.
    #[must_use]
    pub fn created(&self, operator: Operator, value: impl Into<Value>) -> Self {
        self.property("created", FieldKind::Date, operator, value.into())
    }

    /// Update date; same value forms as [`SearchQuery::created`].
    #[must_use]
    pub fn updated(&self, operator: Operator, value: impl Into<Value>) -> Self {
        self.property("updated", FieldKind::Date, operator, value.into())
    }

    #[must_use]
    pub fn parent(&self, operator: Operator, value: impl Into<Value>) -> Self {
        self.property("parent", FieldKind::Parent, operator, value.into())
    }

    #[must_use]
    pub fn quality_score<I, S>(
        &self,
        operator: Operator,
        scores: I,
        scope: impl Into<String>,
        locale: impl Into<String>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut clause = FilterClause::new(
            "quality_score",
            FieldKind::QualityScore,
            Target::Property,
            operator,
            strings(scores),
        );
        clause.scope = Some(scope.into());
        clause.locale = Some(locale.into());
        self.with_clause(clause)
    }

    // Attribute filters

    /// Text filter; `value` is a string, or a list of strings for `IN` and
    /// `NOT IN`.
    #[must_use]
    pub fn attribute_text(
        &self,
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.attribute(attribute.into(), FieldKind::Text, operator, value.into())
    }

    #[must_use]
    pub fn attribute_number(
        &self,
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.attribute(attribute.into(), FieldKind::Number, operator, value.into())
    }

    #[must_use]
    pub fn attribute_select<I, S>(
        &self,
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        options: I,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attribute(attribute.into(), FieldKind::Select, operator, strings(options))
    }

    #[must_use]
    pub fn attribute_boolean(
        &self,
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        value: bool,
    ) -> Self {
        self.attribute(attribute.into(), FieldKind::Boolean, operator, Value::Bool(value))
    }

    #[must_use]
    pub fn attribute_date(
        &self,
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        value: impl Into<Value>,
    ) -> Self {
        self.attribute(attribute.into(), FieldKind::Date, operator, value.into())
    }

    #[must_use]
    pub fn attribute_file(
        &self,
        attribute: impl Into<AttributeRef>,
        operator: Operator,
        filename: impl Into<String>,
    ) -> Self {
        self.attribute(attribute.into(), FieldKind::File, operator, Value::String(filename.into()))
    }

    /// `EMPTY` / `NOT EMPTY` on any attribute.
    #[must_use]
    pub fn attribute_empty(&self, attribute: impl Into<AttributeRef>, empty: bool) -> Self {
        let operator = if empty { Operator::Empty } else { Operator::NotEmpty };
        self.attribute(attribute.into(), FieldKind::Text, operator, Value::Null)
    }

    /// Clause passed through unchecked, except that `operator` must be a
    /// known operator token.
    #[must_use]
    pub fn raw(&self, field: impl Into<String>, operator: &str, value: Option<Value>) -> Self {
        self.raw_with_context(field, operator, value, ClauseContext::default())
    }

    /// [`SearchQuery::raw`] with a locale, scope or locales attached.
    #[must_use]
    pub fn raw_with_context(
        &self,
        field: impl Into<String>,
        operator: &str,
        value: Option<Value>,
        context: ClauseContext,
    ) -> Self {
        let field = field.into();
        match operator.parse::<Operator>() {
            Ok(operator) => {
                let mut clause =
                    FilterClause::new(field, FieldKind::Any, Target::Raw, operator, Value::Null);
                clause.value = value;
                context.apply_to(&mut clause);
                self.with_clause(clause)
            }
            Err(_) => {
                let mut next = self.clone();
                next.rejected.push((field, operator.to_string()));
                next
            }
        }
    }

    // Query options

    #[must_use]
    pub fn search_locale(&self, locale: impl Into<String>) -> Self {
        Self { search_locale: Some(locale.into()), ..self.clone() }
    }

    #[must_use]
    pub fn search_scope(&self, scope: impl Into<String>) -> Self {
        Self { search_scope: Some(scope.into()), ..self.clone() }
    }

    #[must_use]
    pub fn page(&self, page: u32) -> Self {
        Self { page: Some(page), ..self.clone() }
    }

    #[must_use]
    pub fn limit(&self, limit: u32) -> Self {
        Self { limit: Some(limit), ..self.clone() }
    }

    #[must_use]
    pub fn with_count(&self, with_count: bool) -> Self {
        Self { with_count: Some(with_count), ..self.clone() }
    }

    /// Only return these attributes' values.
    #[must_use]
    pub fn attributes<I, S>(&self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { attributes: codes.into_iter().map(Into::into).collect(), ..self.clone() }
    }

    /// Only return values for these locales.
    #[must_use]
    pub fn locales<I, S>(&self, codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self { locales: codes.into_iter().map(Into::into).collect(), ..self.clone() }
    }

    /// Only return values for this channel.
    #[must_use]
    pub fn scope(&self, scope: impl Into<String>) -> Self {
        Self { scope: Some(scope.into()), ..self.clone() }
    }

    // Presets

    #[must_use]
    pub fn enabled_products() -> Self {
        Self::new().enabled(Operator::Equal, true)
    }

    #[must_use]
    pub fn in_categories<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().categories(Operator::In, codes)
    }

    #[must_use]
    pub fn with_family<I, S>(codes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new().family(Operator::In, codes)
    }

    #[must_use]
    pub fn recently_updated(days: u32) -> Self {
        Self::new().updated(Operator::SinceLastNDays, days)
    }

    /// Products below `threshold` percent complete on `scope`.
    #[must_use]
    pub fn incomplete(scope: impl Into<String>, threshold: u32) -> Self {
        Self::new().completeness(Operator::Lower, threshold, scope)
    }

    // Compilation

    /// Validated filter set.
    ///
    /// # Errors
    /// `PimError::Validation` for the first invalid clause.
    pub fn filter_set(&self) -> Result<&FilterSet> {
        if let Some((field, operator)) = self.rejected.first() {
            return Err(PimError::invalid_field(
                field.clone(),
                format!("unknown search operator '{operator}'"),
            ));
        }
        self.filters.validate()?;
        Ok(&self.filters)
    }

    /// Query parameters for list endpoints, in a fixed order: `search`,
    /// `search_locale`, `search_scope`, `attributes`, `locales`, `scope`,
    /// `page`, `limit`, `with_count`.
    ///
    /// # Errors
    /// `PimError::Validation` for the first invalid clause.
    pub fn compile(&self) -> Result<Vec<(String, String)>> {
        let filters = self.filter_set()?;
        let mut params = Vec::new();
        if !filters.is_empty() {
            params.push(("search".to_string(), filters.to_json()?));
        }
        self.push_options(&mut params);
        Ok(params)
    }

    /// JSON body for `POST .../search` endpoints.
    ///
    /// The criteria travel as a JSON string under `search`, like the query
    /// parameter form; the options sit next to it.
    ///
    /// # Errors
    /// `PimError::Validation` for the first invalid clause.
    pub fn compile_body(&self) -> Result<Value> {
        let filters = self.filter_set()?;
        let mut body = Map::new();
        if !filters.is_empty() {
            body.insert("search".into(), Value::String(filters.to_json()?));
        }
        for (key, value) in self.options() {
            body.insert(key.into(), value);
        }
        Ok(Value::Object(body))
    }

    /// Append the compiled parameters to `descriptor`.
    ///
    /// # Errors
    /// `PimError::Validation` for the first invalid clause.
    pub fn apply(&self, descriptor: RequestDescriptor) -> Result<RequestDescriptor> {
        Ok(descriptor.query_pairs(self.compile()?))
    }

    fn push_options(&self, params: &mut Vec<(String, String)>) {
        for (key, value) in self.options() {
            let rendered = match value {
                Value::String(s) => s,
                Value::Array(items) => items
                    .iter()
                    .filter_map(Value::as_str)
                    .collect::<Vec<_>>()
                    .join(","),
                other => other.to_string(),
            };
            params.push((key.to_string(), rendered));
        }
    }

    fn options(&self) -> Vec<(&'static str, Value)> {
        let mut options = Vec::new();
        if let Some(locale) = &self.search_locale {
            options.push(("search_locale", json!(locale)));
        }
        if let Some(scope) = &self.search_scope {
            options.push(("search_scope", json!(scope)));
        }
        if !self.attributes.is_empty() {
            options.push(("attributes", json!(self.attributes)));
        }
        if !self.locales.is_empty() {
            options.push(("locales", json!(self.locales)));
        }
        if let Some(scope) = &self.scope {
            options.push(("scope", json!(scope)));
        }
        if let Some(page) = self.page {
            options.push(("page", json!(page)));
        }
        if let Some(limit) = self.limit {
            options.push(("limit", json!(limit)));
        }
        if let Some(with_count) = self.with_count {
            options.push(("with_count", json!(with_count)));
        }
        options
    }
}
