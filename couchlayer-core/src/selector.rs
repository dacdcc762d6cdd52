//! Translation from generic queries to the database's selector-query documents.
//!
//! The compiled form is the body of a `_find` request:
//!
//! ```text
//! { "selector": {...}, "sort": [{ "field": "asc" }], "limit": 10, "skip": 0, "fields": [...] }
//! ```
//!
//! Every selector is scoped to one logical type through the discriminator field.

use serde::{Serialize, Serializer, ser::SerializeMap};
use serde_json::{Map, Value};

use crate::{
    query::{Query, SortDirection},
    record::{Canon, ID_FIELD},
};

/// A single `{field: direction}` entry of a selector query's `sort` list.
#[derive(Debug, Clone, PartialEq)]
pub struct SortEntry {
    pub field: String,
    pub direction: SortDirection,
}

impl Serialize for SortEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(&self.field, &self.direction)?;
        map.end()
    }
}

/// The database's native find-query shape.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SelectorQuery {
    pub selector: Map<String, Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<Vec<SortEntry>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fields: Option<Vec<String>>,
}

/// Body of a `_find` request issued by list queries.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum FindBody {
    /// A compiled selector query.
    Selector(SelectorQuery),
    /// A caller-supplied body passed through untouched.
    Native(Value),
}

/// Compiles generic queries against a configured discriminator field.
#[derive(Debug, Clone, Copy)]
pub struct QueryCompiler<'a> {
    discriminator: &'a str,
}

impl<'a> QueryCompiler<'a> {
    pub fn new(discriminator: &'a str) -> Self {
        Self { discriminator }
    }

    /// Compiles `query` into a selector query scoped to `canon`.
    ///
    /// `id` filters target the internal identifier field; an `id` value that is
    /// itself a stored document is unwrapped to its `_id`. Only the first sort
    /// key is emitted.
    pub fn compile(&self, query: &Query, canon: &Canon) -> SelectorQuery {
        let mut selector = Map::new();

        for (field, value) in &query.filter {
            if field == "id" {
                let id = value
                    .as_object()
                    .and_then(|document| document.get(ID_FIELD))
                    .unwrap_or(value);
                selector.insert(ID_FIELD.to_string(), id.clone());
            } else {
                selector.insert(field.clone(), value.clone());
            }
        }

        selector.insert(self.discriminator.to_string(), Value::String(canon.canonical()));

        let directives = &query.directives;

        SelectorQuery {
            selector,
            sort: directives.sort.first().map(|sort| {
                vec![SortEntry {
                    field: sort.field.clone(),
                    direction: sort.direction,
                }]
            }),
            limit: directives.limit,
            skip: directives.skip,
            fields: directives.fields.clone(),
        }
    }

    /// Like [`compile`](Self::compile), but a `native` directive wins and is sent as-is.
    pub fn compile_for_list(&self, query: &Query, canon: &Canon) -> FindBody {
        match &query.directives.native {
            Some(native) => FindBody::Native(native.clone()),
            None => FindBody::Selector(self.compile(query, canon)),
        }
    }
}
