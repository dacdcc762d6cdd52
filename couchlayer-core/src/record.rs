//! Records, canonical type names and typed entities.
//!
//! A [`Record`] is the framework-facing view of a stored document: a public
//! `id`, a set of fields, and the [`Canon`] naming its logical type. The
//! database's `_id`/`_rev` bookkeeping never appears in a record's fields.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value, from_value, to_value};
use std::fmt;

use crate::error::{StoreError, StoreResult};

/// The database's internal document identifier field.
pub const ID_FIELD: &str = "_id";
/// The database's revision token field.
pub const REV_FIELD: &str = "_rev";
/// Marker set on documents in a bulk-delete batch.
pub const DELETED_FIELD: &str = "_deleted";

/// Logical type of a record, built from an optional base (namespace) and a name.
///
/// The canonical form is `"{base}_{name}"`, or just `"{name}"` without a base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Canon {
    pub base: Option<String>,
    pub name: String,
}

impl Canon {
    pub fn new(name: impl Into<String>) -> Self {
        Self { base: None, name: name.into() }
    }

    pub fn with_base(base: impl Into<String>, name: impl Into<String>) -> Self {
        Self { base: Some(base.into()), name: name.into() }
    }

    /// Parses `"name"` or `"base/name"`. A leading zone (`"zone/base/name"`) is ignored.
    pub fn parse(input: &str) -> StoreResult<Self> {
        let parts = input
            .split('/')
            .filter(|part| !part.is_empty() && *part != "-")
            .collect::<Vec<_>>();

        match parts.as_slice() {
            [name] => Ok(Canon::new(*name)),
            [base, name] | [_, base, name] => Ok(Canon::with_base(*base, *name)),
            _ => Err(StoreError::InvalidQuery(format!("Invalid canonical type name: {input}"))),
        }
    }

    /// Returns the name persisted in every document's discriminator field.
    pub fn canonical(&self) -> String {
        match &self.base {
            Some(base) => format!("{}_{}", base, self.name),
            None => self.name.clone(),
        }
    }
}

impl fmt::Display for Canon {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// A single persisted record of some logical type.
///
/// A record with an `id` is an update target when saved; one without is an
/// insert target, optionally using `preassigned_id` as the new document id.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    canon: Canon,
    id: Option<String>,
    preassigned_id: Option<String>,
    fields: Map<String, Value>,
}

impl Record {
    /// Creates an empty record of the given type.
    pub fn new(canon: Canon) -> Self {
        Self {
            canon,
            id: None,
            preassigned_id: None,
            fields: Map::new(),
        }
    }

    /// Creates a record from a JSON object. An `id` key becomes the record id;
    /// an empty string counts as no id.
    pub fn from_fields(canon: Canon, value: Value) -> StoreResult<Self> {
        let Value::Object(mut fields) = value else {
            return Err(StoreError::InvalidDocument("Expected a JSON object".into()));
        };

        let id = match fields.remove("id") {
            Some(Value::String(id)) if id.is_empty() => None,
            Some(Value::String(id)) => Some(id),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        };

        Ok(Self { canon, id, preassigned_id: None, fields })
    }

    /// Builds a record out of a stored document.
    ///
    /// `_id` moves into the record id; `_rev` and the discriminator field are dropped.
    pub fn from_document(canon: Canon, document: Value, discriminator: &str) -> StoreResult<Self> {
        let Value::Object(mut fields) = document else {
            return Err(StoreError::InvalidDocument("Expected a JSON object".into()));
        };

        let id = match fields.remove(ID_FIELD) {
            Some(Value::String(id)) => Some(id),
            _ => None,
        };
        fields.remove(REV_FIELD);
        fields.remove(discriminator);

        Ok(Self { canon, id, preassigned_id: None, fields })
    }

    pub fn canon(&self) -> &Canon {
        &self.canon
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn clear_id(&mut self) {
        self.id = None;
    }

    /// The caller-chosen identifier for the next insert (`id$`).
    pub fn preassigned_id(&self) -> Option<&str> {
        self.preassigned_id.as_deref()
    }

    pub fn preassign_id(&mut self, id: impl Into<String>) {
        self.preassigned_id = Some(id.into());
    }

    pub(crate) fn take_preassigned_id(&mut self) -> Option<String> {
        self.preassigned_id.take()
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Sets a field. Builder style, for constructing records inline.
    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    /// Enumerates the record's own fields, excluding `id`.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Returns the record as a JSON object with its `id` inlined.
    pub fn to_value(&self) -> Value {
        let mut object = self.fields.clone();
        if let Some(id) = &self.id {
            object.insert("id".to_string(), Value::String(id.clone()));
        }
        Value::Object(object)
    }
}

/// Trait for strongly typed values persisted as records.
///
/// The type serializes to a JSON object; an optional `id` field carries the
/// record id.
///
/// # Example
///
/// ```ignore
/// use couchlayer::record::{Canon, Entity};
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct Invoice {
///     #[serde(skip_serializing_if = "Option::is_none")]
///     pub id: Option<String>,
///     pub total: u64,
/// }
///
/// impl Entity for Invoice {
///     fn canon() -> Canon {
///         Canon::with_base("billing", "invoice")
///     }
/// }
/// ```
pub trait Entity: Serialize + DeserializeOwned + Send + Sync + Clone + 'static {
    /// Returns the logical type every value of this entity is stored under.
    fn canon() -> Canon;
}

/// Conversions between typed entities and records.
pub trait EntityExt: Entity {
    fn to_record(&self) -> StoreResult<Record>;
    fn from_record(record: Record) -> StoreResult<Self>;
}

impl<E: Entity> EntityExt for E {
    fn to_record(&self) -> StoreResult<Record> {
        Record::from_fields(E::canon(), to_value(self)?)
    }

    fn from_record(record: Record) -> StoreResult<Self> {
        Ok(from_value(record.to_value())?)
    }
}
