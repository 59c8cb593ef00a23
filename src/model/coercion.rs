//! String <-> typed value converters, keyed by property kind.
//!
//! Kinds without a registered converter fall back to identity decoding (the raw
//! string) and generic string encoding.

use crate::error::CoercionError;
use crate::model::registry::Registry;
use crate::model::types::{EntityRef, FieldValue, PropertyDescriptor, PropertyKind, UserIdentity};
use crate::store::Storage;
use chrono::{NaiveDateTime, Timelike, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Wire format of datetime properties (always UTC).
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Boolean decoding yields false only for this exact token.
pub const FALSE_TOKEN: &str = "False";

/// What a decoder may consult: reference properties resolve `Type/<id>` through both.
pub struct CoercionContext<'a> {
    pub registry: &'a Registry,
    pub storage: &'a dyn Storage,
}

/// `Ok(None)` means the value decodes to null and the field is left unset.
pub type Decoder =
    Arc<dyn Fn(&str, &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> + Send + Sync>;

/// `None` means the value encodes to null and is omitted from the jobj.
pub type Encoder = Arc<dyn Fn(&FieldValue) -> Option<Value> + Send + Sync>;

#[derive(Clone)]
pub struct CoercionRegistry {
    decoders: HashMap<PropertyKind, Decoder>,
    encoders: HashMap<PropertyKind, Encoder>,
}

impl Default for CoercionRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl CoercionRegistry {
    /// No kind-specific converters at all; every kind uses the fallbacks.
    pub fn empty() -> Self {
        CoercionRegistry {
            decoders: HashMap::new(),
            encoders: HashMap::new(),
        }
    }

    pub fn with_defaults() -> Self {
        let mut r = Self::empty();
        r.register_decoder(PropertyKind::Boolean, Arc::new(decode_boolean));
        r.register_decoder(PropertyKind::Integer, Arc::new(decode_integer));
        r.register_decoder(PropertyKind::Float, Arc::new(decode_float));
        r.register_decoder(PropertyKind::StringList, Arc::new(decode_string_list));
        r.register_decoder(PropertyKind::Datetime, Arc::new(decode_datetime));
        r.register_decoder(PropertyKind::Reference, Arc::new(decode_reference));
        r.register_decoder(PropertyKind::User, Arc::new(decode_user));

        r.register_encoder(PropertyKind::Boolean, Arc::new(encode_boolean));
        r.register_encoder(PropertyKind::StringList, Arc::new(encode_string_list));
        r.register_encoder(PropertyKind::Datetime, Arc::new(encode_datetime));
        r.register_encoder(PropertyKind::Reference, Arc::new(encode_reference));
        r
    }

    /// Replace the default decoder for a kind.
    pub fn register_decoder(&mut self, kind: PropertyKind, decoder: Decoder) {
        self.decoders.insert(kind, decoder);
    }

    /// Replace the default encoder for a kind.
    pub fn register_encoder(&mut self, kind: PropertyKind, encoder: Encoder) {
        self.encoders.insert(kind, encoder);
    }

    pub fn decoder_for(&self, kind: PropertyKind) -> Decoder {
        self.decoders
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(decode_identity))
    }

    pub fn encoder_for(&self, kind: PropertyKind) -> Encoder {
        self.encoders
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| Arc::new(encode_generic))
    }

    /// Fill in whichever converters the descriptor does not override. Existing overrides are kept.
    pub fn resolve(&self, descriptor: &mut PropertyDescriptor) {
        if descriptor.decoder.is_none() {
            descriptor.decoder = Some(self.decoder_for(descriptor.kind));
        }
        if descriptor.encoder.is_none() {
            descriptor.encoder = Some(self.encoder_for(descriptor.kind));
        }
    }
}

fn invalid(kind: PropertyKind, raw: &str, reason: impl ToString) -> CoercionError {
    CoercionError::Invalid {
        kind,
        value: raw.to_string(),
        reason: reason.to_string(),
    }
}

fn decode_identity(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    Ok(Some(FieldValue::Str(raw.to_string())))
}

fn decode_boolean(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    Ok(Some(FieldValue::Bool(raw != FALSE_TOKEN)))
}

fn decode_integer(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    raw.trim()
        .parse::<i64>()
        .map(|n| Some(FieldValue::Int(n)))
        .map_err(|e| invalid(PropertyKind::Integer, raw, e))
}

fn decode_float(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    raw.trim()
        .parse::<f64>()
        .map(|x| Some(FieldValue::Float(x)))
        .map_err(|e| invalid(PropertyKind::Float, raw, e))
}

fn decode_string_list(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    Ok(Some(FieldValue::StrList(
        raw.split_whitespace().map(String::from).collect(),
    )))
}

fn decode_datetime(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    if raw.is_empty() {
        let now = Utc::now().naive_utc();
        let now = now.with_nanosecond(0).unwrap_or(now);
        return Ok(Some(FieldValue::DateTime(now)));
    }
    NaiveDateTime::parse_from_str(raw, DATETIME_FORMAT)
        .map(|dt| Some(FieldValue::DateTime(dt)))
        .map_err(|e| invalid(PropertyKind::Datetime, raw, e))
}

/// `Type/<id>` resolves only when the type is registered and the entity exists.
fn decode_reference(raw: &str, ctx: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    let Some((model_name, id)) = raw.split_once('/') else {
        return Ok(None);
    };
    let Ok(id) = id.parse::<i64>() else {
        return Ok(None);
    };
    let Some(model) = ctx.registry.lookup_model(model_name) else {
        return Ok(None);
    };
    Ok(ctx.storage.get(model, id)?.map(|_| {
        FieldValue::Ref(EntityRef {
            model: model.name.clone(),
            id,
        })
    }))
}

fn decode_user(raw: &str, _: &CoercionContext<'_>) -> Result<Option<FieldValue>, CoercionError> {
    Ok(Some(FieldValue::User(UserIdentity::new(raw))))
}

fn encode_generic(value: &FieldValue) -> Option<Value> {
    Some(Value::String(value.to_string()))
}

fn encode_boolean(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Bool(b) => Some(Value::Bool(*b)),
        other => encode_generic(other),
    }
}

fn encode_string_list(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::StrList(items) => Some(Value::String(items.join(" "))),
        other => encode_generic(other),
    }
}

fn encode_datetime(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::DateTime(dt) => Some(Value::String(dt.format(DATETIME_FORMAT).to_string())),
        other => encode_generic(other),
    }
}

fn encode_reference(value: &FieldValue) -> Option<Value> {
    match value {
        FieldValue::Ref(r) => Some(Value::String(r.to_string())),
        _ => None,
    }
}
