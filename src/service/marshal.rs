//! Entity <-> jobj conversion, plus create/update through the storage collaborator.

use crate::error::{AppError, CoercionError};
use crate::model::{
    CoercionContext, Decoder, Encoder, Entity, EntityRef, FieldMap, FieldValue, Jobj, ModelType, PropertyDescriptor, Registry,
    FALSE_TOKEN,
};
use crate::store::Storage;
use serde_json::Value;

pub struct Marshaller<'a> {
    registry: &'a Registry,
    storage: &'a dyn Storage,
}

impl<'a> Marshaller<'a> {
    pub fn new(registry: &'a Registry, storage: &'a dyn Storage) -> Self {
        Marshaller { registry, storage }
    }

    /// `{"id": "<id>"}`, or an empty jobj for an entity not yet stored.
    pub fn id_jobj(entity: &Entity) -> Jobj {
        let mut jobj = Jobj::new();
        if let Some(id) = entity.id {
            jobj.insert("id".into(), Value::String(id.to_string()));
        }
        jobj
    }

    /// Id plus every non-null property, encoded. Null properties are omitted, never emitted as null;
    /// a reference whose target is no longer stored counts as null.
    pub fn to_jobj(&self, entity: &Entity) -> Jobj {
        let mut jobj = Self::id_jobj(entity);
        let Some(model) = self.registry.lookup_model(&entity.model) else {
            return jobj;
        };
        for p in &model.properties {
            let Some(value) = entity.get(&p.name) else {
                continue;
            };
            if let FieldValue::Ref(target) = value {
                if !self.resolves(target) {
                    continue;
                }
            }
            if let Some(encoded) = self.encoder(p)(value) {
                jobj.insert(p.name.clone(), encoded);
            }
        }
        jobj
    }

    /// Decode every non-`id` key of `jobj` with the model's converters.
    ///
    /// Keys naming no property are ignored on purpose, so older servers accept
    /// bodies from newer clients. JSON nulls and values decoding to null are skipped.
    pub fn jobj_to_field_map(&self, model: &ModelType, jobj: &Jobj) -> Result<FieldMap, AppError> {
        let ctx = CoercionContext {
            registry: self.registry,
            storage: self.storage,
        };
        let mut fields = FieldMap::new();
        for (key, value) in jobj {
            if key == "id" {
                continue;
            }
            let Some(p) = model.find_property(key) else {
                tracing::debug!(model = %model.name, property = %key, "ignoring unknown property");
                continue;
            };
            let Some(raw) = raw_text(p, value)? else {
                continue;
            };
            let decoded = self.decoder(p)(&raw, &ctx).map_err(|source| AppError::InvalidValue {
                property: key.clone(),
                source,
            })?;
            if let Some(v) = decoded {
                fields.insert(key.clone(), v);
            }
        }
        Ok(fields)
    }

    /// Build and persist a new entity. `extra` wins over jobj values on key collision.
    pub fn create_entity(&self, model: &ModelType, jobj: &Jobj, extra: FieldMap) -> Result<Jobj, AppError> {
        let mut fields = self.jobj_to_field_map(model, jobj)?;
        fields.extend(extra);
        let entity = self.storage.create(model, fields)?;
        Ok(self.to_jobj(&entity))
    }

    /// Apply the decoded jobj onto `entity`, persist, and return its full new state.
    pub fn update_entity(&self, entity: &mut Entity, jobj: &Jobj) -> Result<Jobj, AppError> {
        let model = self
            .registry
            .lookup_model(&entity.model)
            .ok_or_else(|| AppError::UnknownModel(entity.model.clone()))?;
        let fields = self.jobj_to_field_map(model, jobj)?;
        for (name, value) in fields {
            entity.set(&name, Some(value));
        }
        self.storage.save(entity)?;
        Ok(self.to_jobj(entity))
    }

    fn resolves(&self, target: &EntityRef) -> bool {
        let Some(model) = self.registry.lookup_model(&target.model) else {
            return false;
        };
        match self.storage.get(model, target.id) {
            Ok(found) => found.is_some(),
            Err(e) => {
                tracing::warn!(reference = %target, error = %e, "reference lookup failed");
                false
            }
        }
    }

    fn decoder(&self, p: &PropertyDescriptor) -> Decoder {
        p.decoder()
            .cloned()
            .unwrap_or_else(|| self.registry.coercions().decoder_for(p.kind))
    }

    fn encoder(&self, p: &PropertyDescriptor) -> Encoder {
        p.encoder()
            .cloned()
            .unwrap_or_else(|| self.registry.coercions().encoder_for(p.kind))
    }
}

/// Text handed to a decoder. Clients may send native scalars (and string arrays
/// for lists) in place of strings. List items are joined with a space, so an
/// item containing whitespace is rejected rather than silently split.
fn raw_text(p: &PropertyDescriptor, value: &Value) -> Result<Option<String>, AppError> {
    let invalid = |reason: &str| AppError::InvalidValue {
        property: p.name.clone(),
        source: CoercionError::Invalid {
            kind: p.kind,
            value: value.to_string(),
            reason: reason.into(),
        },
    };
    let text = match value {
        Value::Null => return Ok(None),
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "True".to_string(),
        Value::Bool(false) => FALSE_TOKEN.to_string(),
        Value::Array(items) => {
            let mut words = Vec::with_capacity(items.len());
            for item in items {
                match item.as_str() {
                    Some(s) if !s.is_empty() && !s.contains(char::is_whitespace) => words.push(s),
                    Some(_) => return Err(invalid("list items must be non-empty and contain no whitespace")),
                    None => return Err(invalid("list items must be strings")),
                }
            }
            words.join(" ")
        }
        _ => return Err(invalid("expected a string or a scalar")),
    };
    Ok(Some(text))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyKind, UserIdentity};
    use crate::store::InMemoryStore;
    use serde_json::json;
    use std::sync::Arc;

    fn registry() -> Registry {
        let mut reg = Registry::new();
        reg.register_model(
            ModelType::new("Sample")
                .property("user", PropertyKind::User)
                .property("emotion", PropertyKind::Float)
                .property("created", PropertyKind::Integer)
                .property("comment", PropertyKind::String)
                .property("tags", PropertyKind::StringList)
                .property("active", PropertyKind::Boolean),
            None,
        )
        .unwrap();
        reg
    }

    fn jobj(v: Value) -> Jobj {
        match v {
            Value::Object(m) => m,
            _ => panic!("not an object"),
        }
    }

    #[test]
    fn create_then_read_back() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let sample = reg.lookup_model("Sample").unwrap();
        let out = m
            .create_entity(
                sample,
                &jobj(json!({"emotion": "0.25", "created": 1256423837200i64, "tags": ["a", "b"], "active": false})),
                FieldMap::new(),
            )
            .unwrap();
        assert_eq!(
            Value::Object(out),
            json!({"id": "1", "emotion": "0.25", "created": "1256423837200", "tags": "a b", "active": false})
        );
        let stored = store.get(sample, 1).unwrap().unwrap();
        assert_eq!(stored.get("emotion"), Some(&FieldValue::Float(0.25)));
        assert_eq!(stored.get("comment"), None);
    }

    #[test]
    fn null_properties_are_omitted() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let mut entity = Entity::new("Sample", FieldMap::new());
        entity.id = Some(5);
        assert_eq!(Value::Object(m.to_jobj(&entity)), json!({"id": "5"}));
    }

    #[test]
    fn unknown_keys_and_id_are_ignored() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let sample = reg.lookup_model("Sample").unwrap();
        let fields = m
            .jobj_to_field_map(sample, &jobj(json!({"id": "99", "bogus": "x", "comment": "hi", "created": null})))
            .unwrap();
        assert_eq!(fields.len(), 1);
        assert_eq!(fields.get("comment"), Some(&FieldValue::Str("hi".into())));
    }

    #[test]
    fn extra_fields_take_precedence() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let sample = reg.lookup_model("Sample").unwrap();
        let mut extra = FieldMap::new();
        extra.insert("user".into(), FieldValue::User(UserIdentity::new("owner@example.com")));
        let out = m
            .create_entity(sample, &jobj(json!({"user": "spoofed@example.com"})), extra)
            .unwrap();
        assert_eq!(out.get("user"), Some(&json!("owner@example.com")));
    }

    #[test]
    fn update_is_idempotent() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let sample = reg.lookup_model("Sample").unwrap();
        m.create_entity(sample, &jobj(json!({"comment": "first"})), FieldMap::new())
            .unwrap();
        let change = jobj(json!({"comment": "second", "emotion": 3.14}));

        let mut entity = store.get(sample, 1).unwrap().unwrap();
        let j1 = m.update_entity(&mut entity, &change).unwrap();
        let mut entity = store.get(sample, 1).unwrap().unwrap();
        let j2 = m.update_entity(&mut entity, &change).unwrap();
        assert_eq!(j1, j2);
        assert_eq!(Value::Object(j2), json!({"id": "1", "emotion": "3.14", "comment": "second"}));
    }

    #[test]
    fn undecodable_value_is_reported() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let sample = reg.lookup_model("Sample").unwrap();
        let err = m
            .jobj_to_field_map(sample, &jobj(json!({"created": "yesterday"})))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidValue { ref property, .. } if property == "created"));
        let err = m
            .jobj_to_field_map(sample, &jobj(json!({"comment": {"nested": true}})))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidValue { .. }));
    }

    #[test]
    fn per_property_overrides_are_used() {
        let mut reg = Registry::new();
        let upper: Decoder = Arc::new(
            |raw: &str, _: &CoercionContext<'_>| -> Result<Option<FieldValue>, CoercionError> {
                Ok(Some(FieldValue::Str(raw.to_uppercase())))
            },
        );
        let bracket: Encoder = Arc::new(|v: &FieldValue| Some(Value::String(format!("[{}]", v))));
        reg.register_model(
            ModelType::new("Pager")
                .property("code", PropertyKind::String)
                .override_decoder("code", upper)
                .override_encoder("code", bracket),
            None,
        )
        .unwrap();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let pager = reg.lookup_model("Pager").unwrap();
        let out = m
            .create_entity(pager, &jobj(json!({"code": "abc"})), FieldMap::new())
            .unwrap();
        assert_eq!(out.get("code"), Some(&json!("[ABC]")));
    }

    #[test]
    fn list_items_with_whitespace_are_rejected() {
        let reg = registry();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let sample = reg.lookup_model("Sample").unwrap();
        let err = m
            .jobj_to_field_map(sample, &jobj(json!({"tags": ["a b", "c"]})))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidValue { ref property, .. } if property == "tags"));
        let err = m
            .jobj_to_field_map(sample, &jobj(json!({"tags": ["a", 1]})))
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidValue { .. }));
        let fields = m
            .jobj_to_field_map(sample, &jobj(json!({"tags": ["a", "b"]})))
            .unwrap();
        assert_eq!(fields.get("tags"), Some(&FieldValue::StrList(vec!["a".into(), "b".into()])));
    }

    #[test]
    fn reference_to_deleted_entity_is_omitted() {
        let mut reg = Registry::new();
        reg.register_model(ModelType::new("Doctor"), None).unwrap();
        reg.register_model(ModelType::new("Pager").property("doctor", PropertyKind::Reference), None)
            .unwrap();
        let store = InMemoryStore::new();
        let m = Marshaller::new(&reg, &store);
        let doctor = reg.lookup_model("Doctor").unwrap();
        let pager = reg.lookup_model("Pager").unwrap();
        let target = store.create(doctor, FieldMap::new()).unwrap();
        let out = m
            .create_entity(pager, &jobj(json!({"doctor": "Doctor/1"})), FieldMap::new())
            .unwrap();
        assert_eq!(out.get("doctor"), Some(&json!("Doctor/1")));

        store.delete(&target).unwrap();
        let stored = store.get(pager, 1).unwrap().unwrap();
        assert_eq!(Value::Object(m.to_jobj(&stored)), json!({"id": "1"}));
    }
}
