//! Generic query construction for entity stores.
//!
//! A [`Query`] is a set of field equality filters plus a typed set of
//! [`Directives`] that shape the result (sorting, paging, projection, and the
//! remove/native switches). Queries can be built fluently or parsed from the
//! host framework's directive-suffixed JSON form.
//!
//! # Query Building
//!
//! ```ignore
//! use couchlayer::query::{Query, SortDirection};
//!
//! let query = Query::builder()
//!     .filter("status", "active")
//!     .sort("created", SortDirection::Desc)
//!     .limit(10)
//!     .skip(20)
//!     .build();
//! ```
//!
//! # Directive-suffixed form
//!
//! ```ignore
//! use serde_json::json;
//!
//! let query = Query::from_value(json!({
//!     "status": "active",
//!     "sort$": { "created": -1 },
//!     "limit$": 10,
//! }))?;
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{StoreError, StoreResult};

/// Suffix marking a directive key in the directive-suffixed query form.
pub const DIRECTIVE_SUFFIX: char = '$';

/// Sort direction for query results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    /// Ascending order.
    Asc,
    /// Descending order.
    Desc,
}

impl SortDirection {
    /// Negative weights sort descending, everything else ascending.
    pub fn from_weight(weight: &Value) -> Self {
        match weight.as_f64() {
            Some(w) if w < 0.0 => SortDirection::Desc,
            _ => SortDirection::Asc,
        }
    }
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq)]
pub struct Sort {
    /// The field name to sort by.
    pub field: String,
    /// The sort direction.
    pub direction: SortDirection,
}

/// Result-shaping options attached to a query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Directives {
    /// Sort keys in declaration order. Only the first one is honored.
    pub sort: Vec<Sort>,
    /// Maximum number of documents to return.
    pub limit: Option<u64>,
    /// Number of documents to skip.
    pub skip: Option<u64>,
    /// Projection of returned fields.
    pub fields: Option<Vec<String>>,
    /// Remove every matching record instead of one.
    pub all: bool,
    /// Whether remove returns the deleted record. Defaults to `true`.
    pub load: Option<bool>,
    /// Raw find body passed through untouched by list queries.
    pub native: Option<Value>,
}

/// A single directive parsed from a `$`-suffixed key.
#[derive(Debug, Clone, PartialEq)]
enum Directive {
    Sort(Vec<Sort>),
    Limit(u64),
    Skip(u64),
    Fields(Vec<String>),
    All(bool),
    Load(bool),
    Native(Value),
}

impl Directive {
    /// Parses a directive by its name (the key without the suffix).
    ///
    /// Returns `Ok(None)` for directives this store does not act on and for
    /// `null` values, which leave the directive unset.
    fn parse(name: &str, value: Value) -> StoreResult<Option<Self>> {
        if value.is_null() {
            return Ok(None);
        }

        Ok(Some(match name {
            "sort" => match value {
                Value::Object(keys) => Directive::Sort(
                    keys.into_iter()
                        .map(|(field, weight)| Sort {
                            direction: SortDirection::from_weight(&weight),
                            field,
                        })
                        .collect(),
                ),
                other => return Err(StoreError::InvalidQuery(format!("sort$ expects an object, got {other}"))),
            },
            "limit" => Directive::Limit(count(name, &value)?),
            "skip" => Directive::Skip(count(name, &value)?),
            "fields" => match value {
                Value::Array(items) => Directive::Fields(
                    items
                        .into_iter()
                        .map(|item| match item {
                            Value::String(field) => Ok(field),
                            other => Err(StoreError::InvalidQuery(format!("fields$ expects field names, got {other}"))),
                        })
                        .collect::<StoreResult<Vec<_>>>()?,
                ),
                other => return Err(StoreError::InvalidQuery(format!("fields$ expects an array, got {other}"))),
            },
            "all" => Directive::All(truthy(&value)),
            "load" => Directive::Load(truthy(&value)),
            "native" => Directive::Native(value),
            _ => return Ok(None),
        }))
    }

    fn apply(self, directives: &mut Directives) {
        match self {
            Directive::Sort(sort) => directives.sort = sort,
            Directive::Limit(limit) => directives.limit = Some(limit),
            Directive::Skip(skip) => directives.skip = Some(skip),
            Directive::Fields(fields) => directives.fields = Some(fields),
            Directive::All(all) => directives.all = all,
            Directive::Load(load) => directives.load = Some(load),
            Directive::Native(native) => directives.native = Some(native),
        }
    }
}

/// Reads a non-negative integer, accepting integral floats such as `2.0`.
fn count(name: &str, value: &Value) -> StoreResult<u64> {
    value
        .as_u64()
        .or_else(|| {
            value
                .as_f64()
                .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u64::MAX as f64)
                .map(|n| n as u64)
        })
        .ok_or_else(|| StoreError::InvalidQuery(format!("{name}$ expects a non-negative integer, got {value}")))
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// A generic query: equality filters plus result-shaping directives.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    /// Field name to expected value, in insertion order.
    pub filter: Map<String, Value>,
    /// Result-shaping options.
    pub directives: Directives,
}

impl Query {
    /// Creates an empty query matching every record of a type.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder() -> QueryBuilder {
        QueryBuilder::new()
    }

    /// Creates a query selecting a single record by id.
    pub fn by_id(id: impl Into<String>) -> Self {
        Query::builder().filter("id", id.into()).build()
    }

    /// Parses the directive-suffixed query form.
    ///
    /// A bare string is treated as an id lookup. Keys ending in `$` are read as
    /// directives; unrecognized directives are ignored and never become filters.
    pub fn from_value(value: Value) -> StoreResult<Self> {
        let fields = match value {
            Value::Object(fields) => fields,
            Value::String(id) => return Ok(Query::by_id(id)),
            Value::Null => return Ok(Query::new()),
            other => return Err(StoreError::InvalidQuery(format!("Expected an object, got {other}"))),
        };

        let mut query = Query::new();
        for (key, value) in fields {
            match key.strip_suffix(DIRECTIVE_SUFFIX) {
                Some(name) => {
                    if let Some(directive) = Directive::parse(name, value)? {
                        directive.apply(&mut query.directives);
                    }
                }
                None => {
                    query.filter.insert(key, value);
                }
            }
        }

        Ok(query)
    }
}

#[derive(Debug, Clone, Default)]
pub struct QueryBuilder {
    query: Query,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new() -> Self {
        QueryBuilder { query: Query::default() }
    }

    /// Adds an equality filter on a field.
    pub fn filter(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.query.filter.insert(field.into(), value.into());
        self
    }

    /// Appends a sort key. Only the first sort key reaches the database.
    pub fn sort(mut self, field: impl Into<String>, direction: SortDirection) -> Self {
        self.query.directives.sort.push(Sort { field: field.into(), direction });
        self
    }

    pub fn limit(mut self, limit: u64) -> Self {
        self.query.directives.limit = Some(limit);
        self
    }

    pub fn skip(mut self, skip: u64) -> Self {
        self.query.directives.skip = Some(skip);
        self
    }

    /// Restricts the fields returned for each document.
    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.query.directives.fields = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    /// Makes a remove delete every match instead of one.
    pub fn all(mut self, all: bool) -> Self {
        self.query.directives.all = all;
        self
    }

    /// Controls whether a single remove returns the deleted record.
    pub fn load(mut self, load: bool) -> Self {
        self.query.directives.load = Some(load);
        self
    }

    /// Supplies a raw find body for list queries.
    pub fn native(mut self, body: Value) -> Self {
        self.query.directives.native = Some(body);
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> Query {
        self.query
    }
}
