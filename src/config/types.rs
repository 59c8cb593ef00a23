//! Declarative model definitions, as read from a JSON document.

use crate::model::{ModelType, PropertyKind};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyConfig {
    pub name: String,
    pub kind: PropertyKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyConfig>,
    /// Property of kind `user` stamped with the caller's identity on create.
    #[serde(default)]
    pub owner_property: Option<String>,
}

impl ModelConfig {
    pub fn to_model(&self) -> ModelType {
        let model = self
            .properties
            .iter()
            .fold(ModelType::new(&self.name), |m, p| m.property(&p.name, p.kind));
        match &self.owner_property {
            Some(owner) => model.owner_property(owner),
            None => model,
        }
    }
}

/// All definitions in one document: `{"models": [...], "specials": [...]}`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FullConfig {
    #[serde(default)]
    pub models: Vec<ModelConfig>,
    /// Special object names, without the `$`.
    #[serde(default)]
    pub specials: Vec<String>,
}
