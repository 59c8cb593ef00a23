//! Registry of models, special objects and their invocable methods.
//!
//! Built once at startup through `&mut self` registration calls, then shared
//! read-only (typically behind an `Arc`) for the lifetime of the process.
//! All listings come back sorted.

use crate::error::{MethodError, RegistryError};
use crate::model::coercion::CoercionRegistry;
use crate::model::types::{Entity, ModelType, UserIdentity};
use crate::store::Storage;
use serde_json::Value;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Everything a registered method gets to see when invoked.
pub struct MethodCall<'a> {
    pub registry: &'a Registry,
    pub storage: &'a dyn Storage,
    pub caller: Option<&'a UserIdentity>,
    /// Set for instance methods only.
    pub entity: Option<&'a Entity>,
}

pub type Method = Arc<dyn Fn(&MethodCall<'_>) -> Result<Value, MethodError> + Send + Sync>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// Callable on a model type.
    Model,
    /// Callable on one entity of a model.
    Instance,
    /// Callable on a special object.
    Special,
}

impl fmt::Display for MethodKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MethodKind::Model => "model method",
            MethodKind::Instance => "instance method",
            MethodKind::Special => "special method",
        })
    }
}

/// A named bag of methods with no backing entities. Addressed as `$name` in URLs.
#[derive(Clone)]
pub struct SpecialObject {
    pub name: String,
    methods: BTreeMap<String, Method>,
}

impl SpecialObject {
    pub fn method(&self, name: &str) -> Option<&Method> {
        self.methods.get(name)
    }

    pub fn method_names(&self) -> Vec<String> {
        self.methods.keys().cloned().collect()
    }
}

#[derive(Clone)]
struct RegisteredModel {
    model: ModelType,
    model_methods: BTreeMap<String, Method>,
    instance_methods: BTreeMap<String, Method>,
}

#[derive(Clone, Default)]
pub struct Registry {
    coercions: CoercionRegistry,
    models: BTreeMap<String, RegisteredModel>,
    specials: BTreeMap<String, SpecialObject>,
}

impl Registry {
    pub fn new() -> Self {
        Self::with_coercions(CoercionRegistry::with_defaults())
    }

    pub fn with_coercions(coercions: CoercionRegistry) -> Self {
        Registry {
            coercions,
            models: BTreeMap::new(),
            specials: BTreeMap::new(),
        }
    }

    pub fn coercions(&self) -> &CoercionRegistry {
        &self.coercions
    }

    /// Register a model under `name` (defaults to the model's own name).
    /// Missing per-property converters are filled from the coercion defaults.
    pub fn register_model(&mut self, mut model: ModelType, name: Option<&str>) -> Result<(), RegistryError> {
        if let Some(name) = name {
            model.name = name.to_string();
        }
        if self.models.contains_key(&model.name) {
            return Err(RegistryError::DuplicateModel(model.name));
        }
        let mut seen = HashSet::new();
        for p in &model.properties {
            if !seen.insert(p.name.as_str()) {
                return Err(RegistryError::DuplicateProperty {
                    model: model.name.clone(),
                    property: p.name.clone(),
                });
            }
        }
        for p in model.properties.iter_mut() {
            self.coercions.resolve(p);
        }
        tracing::info!(model = %model.name, properties = model.properties.len(), "registered model");
        self.models.insert(
            model.name.clone(),
            RegisteredModel {
                model,
                model_methods: BTreeMap::new(),
                instance_methods: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn lookup_model(&self, name: &str) -> Option<&ModelType> {
        self.models.get(name).map(|r| &r.model)
    }

    pub fn list_model_names(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn register_special(&mut self, name: &str) -> Result<(), RegistryError> {
        if self.specials.contains_key(name) {
            return Err(RegistryError::DuplicateSpecial(name.to_string()));
        }
        tracing::info!(special = %name, "registered special object");
        self.specials.insert(
            name.to_string(),
            SpecialObject {
                name: name.to_string(),
                methods: BTreeMap::new(),
            },
        );
        Ok(())
    }

    pub fn lookup_special(&self, name: &str) -> Option<&SpecialObject> {
        self.specials.get(name)
    }

    pub fn list_special_names(&self) -> Vec<String> {
        self.specials.keys().cloned().collect()
    }

    /// Register `method` under (kind, owner, name). The owner is a model name for
    /// model/instance methods and a special name for special methods; it must already be registered.
    pub fn register_method(
        &mut self,
        kind: MethodKind,
        owner: &str,
        name: &str,
        method: Method,
    ) -> Result<(), RegistryError> {
        let methods = self.methods_mut(kind, owner).ok_or_else(|| RegistryError::UnknownOwner {
            kind,
            owner: owner.to_string(),
        })?;
        if methods.contains_key(name) {
            return Err(RegistryError::DuplicateMethod {
                kind,
                owner: owner.to_string(),
                name: name.to_string(),
            });
        }
        methods.insert(name.to_string(), method);
        tracing::info!(%kind, owner = %owner, method = %name, "registered method");
        Ok(())
    }

    pub fn register_model_method<F>(&mut self, model: &str, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&MethodCall<'_>) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.register_method(MethodKind::Model, model, name, Arc::new(f))
    }

    pub fn register_instance_method<F>(&mut self, model: &str, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&MethodCall<'_>) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.register_method(MethodKind::Instance, model, name, Arc::new(f))
    }

    pub fn register_special_method<F>(&mut self, special: &str, name: &str, f: F) -> Result<(), RegistryError>
    where
        F: Fn(&MethodCall<'_>) -> Result<Value, MethodError> + Send + Sync + 'static,
    {
        self.register_method(MethodKind::Special, special, name, Arc::new(f))
    }

    pub fn lookup_method(&self, kind: MethodKind, owner: &str, name: &str) -> Option<&Method> {
        self.methods(kind, owner).and_then(|m| m.get(name))
    }

    /// Sorted method names; empty when the owner is unknown.
    pub fn list_methods(&self, kind: MethodKind, owner: &str) -> Vec<String> {
        self.methods(kind, owner)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn methods(&self, kind: MethodKind, owner: &str) -> Option<&BTreeMap<String, Method>> {
        match kind {
            MethodKind::Model => self.models.get(owner).map(|r| &r.model_methods),
            MethodKind::Instance => self.models.get(owner).map(|r| &r.instance_methods),
            MethodKind::Special => self.specials.get(owner).map(|s| &s.methods),
        }
    }

    fn methods_mut(&mut self, kind: MethodKind, owner: &str) -> Option<&mut BTreeMap<String, Method>> {
        match kind {
            MethodKind::Model => self.models.get_mut(owner).map(|r| &mut r.model_methods),
            MethodKind::Instance => self.models.get_mut(owner).map(|r| &mut r.instance_methods),
            MethodKind::Special => self.specials.get_mut(owner).map(|s| &mut s.methods),
        }
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("models", &self.list_model_names())
            .field("specials", &self.list_special_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::types::PropertyKind;

    fn noop(_: &MethodCall<'_>) -> Result<Value, MethodError> {
        Ok(Value::Null)
    }

    #[test]
    fn models_are_listed_sorted() {
        let mut reg = Registry::new();
        reg.register_model(ModelType::new("Pager"), None).unwrap();
        reg.register_model(ModelType::new("Doctor"), None).unwrap();
        reg.register_model(ModelType::new("Whatever"), Some("Clinic")).unwrap();
        assert_eq!(reg.list_model_names(), vec!["Clinic", "Doctor", "Pager"]);
        assert_eq!(reg.lookup_model("Clinic").map(|m| m.name.as_str()), Some("Clinic"));
        assert!(reg.lookup_model("Whatever").is_none());
    }

    #[test]
    fn duplicate_model_is_rejected() {
        let mut reg = Registry::new();
        reg.register_model(ModelType::new("Doctor"), None).unwrap();
        let err = reg.register_model(ModelType::new("Doctor"), None).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateModel(ref n) if n == "Doctor"));
    }

    #[test]
    fn duplicate_property_is_rejected() {
        let mut reg = Registry::new();
        let model = ModelType::new("Doctor")
            .property("name", PropertyKind::String)
            .property("name", PropertyKind::Integer);
        assert!(matches!(
            reg.register_model(model, None),
            Err(RegistryError::DuplicateProperty { .. })
        ));
    }

    #[test]
    fn registration_resolves_every_converter() {
        let mut reg = Registry::new();
        reg.register_model(
            ModelType::new("Sample")
                .property("emotion", PropertyKind::Float)
                .property("comment", PropertyKind::String),
            None,
        )
        .unwrap();
        let model = reg.lookup_model("Sample").unwrap();
        assert!(model.properties.iter().all(|p| p.decoder().is_some() && p.encoder().is_some()));
    }

    #[test]
    fn specials_and_methods() {
        let mut reg = Registry::new();
        reg.register_special("meta").unwrap();
        assert!(matches!(reg.register_special("meta"), Err(RegistryError::DuplicateSpecial(_))));
        reg.register_special_method("meta", "version", noop).unwrap();
        reg.register_special_method("meta", "models", noop).unwrap();
        assert!(matches!(
            reg.register_special_method("meta", "models", noop),
            Err(RegistryError::DuplicateMethod { .. })
        ));
        assert_eq!(reg.list_methods(MethodKind::Special, "meta"), vec!["models", "version"]);
        assert!(reg.lookup_method(MethodKind::Special, "meta", "version").is_some());
        assert!(reg.lookup_method(MethodKind::Special, "meta", "nope").is_none());
        assert!(reg.lookup_special("nope").is_none());
    }

    #[test]
    fn model_and_instance_methods_are_separate_namespaces() {
        let mut reg = Registry::new();
        reg.register_model(ModelType::new("Doctor"), None).unwrap();
        reg.register_model_method("Doctor", "count", noop).unwrap();
        reg.register_instance_method("Doctor", "count", noop).unwrap();
        assert_eq!(reg.list_methods(MethodKind::Model, "Doctor"), vec!["count"]);
        assert_eq!(reg.list_methods(MethodKind::Instance, "Doctor"), vec!["count"]);
        assert!(reg.list_methods(MethodKind::Model, "Pager").is_empty());
    }

    #[test]
    fn method_needs_registered_owner() {
        let mut reg = Registry::new();
        let err = reg.register_model_method("Ghost", "count", noop).unwrap_err();
        assert!(matches!(err, RegistryError::UnknownOwner { kind: MethodKind::Model, .. }));
    }
}
