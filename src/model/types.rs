//! Model types: property kinds and descriptors, entity values, model definitions.

use crate::error::StorageError;
use crate::model::coercion::{Decoder, Encoder, DATETIME_FORMAT, FALSE_TOKEN};
use crate::store::Storage;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// JSON-safe representation of an entity: `"id"` (decimal string) plus encoded properties.
pub type Jobj = Map<String, Value>;

/// Decoded property values keyed by property name. Absent key means null.
pub type FieldMap = BTreeMap<String, FieldValue>;

/// Hook consulted before creating an entity; returning an entity means "already exists".
pub type ExistingLookup =
    Arc<dyn Fn(&ModelType, &Jobj, &dyn Storage) -> Result<Option<Entity>, StorageError> + Send + Sync>;

/// Semantic kind of a property. Selects the default converters in the coercion registry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyKind {
    Boolean,
    Integer,
    Float,
    String,
    StringList,
    Datetime,
    Reference,
    User,
}

impl PropertyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyKind::Boolean => "boolean",
            PropertyKind::Integer => "integer",
            PropertyKind::Float => "float",
            PropertyKind::String => "string",
            PropertyKind::StringList => "string_list",
            PropertyKind::Datetime => "datetime",
            PropertyKind::Reference => "reference",
            PropertyKind::User => "user",
        }
    }
}

impl fmt::Display for PropertyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque identity token of an authenticated caller.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserIdentity(pub String);

impl UserIdentity {
    pub fn new(token: impl Into<String>) -> Self {
        UserIdentity(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Pointer to another entity, rendered as `TypeName/<id>`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub model: String,
    pub id: i64,
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.model, self.id)
    }
}

/// A decoded, typed property value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    StrList(Vec<String>),
    DateTime(NaiveDateTime),
    Ref(EntityRef),
    User(UserIdentity),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Bool(true) => f.write_str("True"),
            FieldValue::Bool(false) => f.write_str(FALSE_TOKEN),
            FieldValue::Int(n) => write!(f, "{}", n),
            FieldValue::Float(x) => write!(f, "{}", x),
            FieldValue::Str(s) => f.write_str(s),
            FieldValue::StrList(items) => f.write_str(&items.join(" ")),
            FieldValue::DateTime(dt) => write!(f, "{}", dt.format(DATETIME_FORMAT)),
            FieldValue::Ref(r) => write!(f, "{}", r),
            FieldValue::User(u) => f.write_str(u.as_str()),
        }
    }
}

/// An instance of a model. The id is assigned by storage on creation and never changes.
#[derive(Clone, Debug, PartialEq)]
pub struct Entity {
    pub model: String,
    pub id: Option<i64>,
    pub fields: FieldMap,
}

impl Entity {
    pub fn new(model: impl Into<String>, fields: FieldMap) -> Self {
        Entity {
            model: model.into(),
            id: None,
            fields,
        }
    }

    pub fn get(&self, property: &str) -> Option<&FieldValue> {
        self.fields.get(property)
    }

    /// Set or clear (with `None`) a property value.
    pub fn set(&mut self, property: &str, value: Option<FieldValue>) {
        match value {
            Some(v) => {
                self.fields.insert(property.to_string(), v);
            }
            None => {
                self.fields.remove(property);
            }
        }
    }

    /// `Model/<id>` for stored entities.
    pub fn path(&self) -> Option<String> {
        self.id.map(|id| format!("{}/{}", self.model, id))
    }
}

/// One typed property of a model, with optional per-property converter overrides.
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub kind: PropertyKind,
    pub(crate) decoder: Option<Decoder>,
    pub(crate) encoder: Option<Encoder>,
}

impl PropertyDescriptor {
    pub fn new(name: impl Into<String>, kind: PropertyKind) -> Self {
        PropertyDescriptor {
            name: name.into(),
            kind,
            decoder: None,
            encoder: None,
        }
    }

    pub fn with_decoder(mut self, decoder: Decoder) -> Self {
        self.decoder = Some(decoder);
        self
    }

    pub fn with_encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = Some(encoder);
        self
    }

    pub fn decoder(&self) -> Option<&Decoder> {
        self.decoder.as_ref()
    }

    pub fn encoder(&self) -> Option<&Encoder> {
        self.encoder.as_ref()
    }
}

impl fmt::Debug for PropertyDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyDescriptor")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("decoder_override", &self.decoder.is_some())
            .field("encoder_override", &self.encoder.is_some())
            .finish()
    }
}

/// A named entity type with ordered properties.
#[derive(Clone)]
pub struct ModelType {
    pub name: String,
    pub properties: Vec<PropertyDescriptor>,
    /// Property (kind `user`) stamped with the caller's identity on create.
    pub owner_property: Option<String>,
    pub(crate) existing: Option<ExistingLookup>,
}

impl ModelType {
    pub fn new(name: impl Into<String>) -> Self {
        ModelType {
            name: name.into(),
            properties: Vec::new(),
            owner_property: None,
            existing: None,
        }
    }

    pub fn property(mut self, name: impl Into<String>, kind: PropertyKind) -> Self {
        self.properties.push(PropertyDescriptor::new(name, kind));
        self
    }

    pub fn with_property(mut self, descriptor: PropertyDescriptor) -> Self {
        self.properties.push(descriptor);
        self
    }

    pub fn owner_property(mut self, name: impl Into<String>) -> Self {
        self.owner_property = Some(name.into());
        self
    }

    /// Override the decoder of an already declared property. Unknown names are ignored.
    pub fn override_decoder(mut self, property: &str, decoder: Decoder) -> Self {
        if let Some(p) = self.properties.iter_mut().find(|p| p.name == property) {
            p.decoder = Some(decoder);
        }
        self
    }

    /// Override the encoder of an already declared property. Unknown names are ignored.
    pub fn override_encoder(mut self, property: &str, encoder: Encoder) -> Self {
        if let Some(p) = self.properties.iter_mut().find(|p| p.name == property) {
            p.encoder = Some(encoder);
        }
        self
    }

    pub fn existing_lookup(mut self, lookup: ExistingLookup) -> Self {
        self.existing = Some(lookup);
        self
    }

    pub fn find_property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub(crate) fn existing(&self) -> Option<&ExistingLookup> {
        self.existing.as_ref()
    }
}

impl fmt::Debug for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelType")
            .field("name", &self.name)
            .field("properties", &self.properties)
            .field("owner_property", &self.owner_property)
            .field("existing_lookup", &self.existing.is_some())
            .finish()
    }
}
