//! Load model definitions from JSON and register them.

use crate::config::{validate, FullConfig};
use crate::error::ConfigError;
use crate::model::Registry;
use std::path::Path;

pub fn parse_config(json: &str) -> Result<FullConfig, ConfigError> {
    Ok(serde_json::from_str(json)?)
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<FullConfig, ConfigError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
    parse_config(&text)
}

/// Validate `config` and register its models and specials into `registry`.
pub fn register_config(registry: &mut Registry, config: &FullConfig) -> Result<(), ConfigError> {
    validate(config)?;
    for m in &config.models {
        registry.register_model(m.to_model(), None)?;
    }
    for s in &config.specials {
        registry.register_special(s)?;
    }
    Ok(())
}

/// Fresh registry (default coercions) holding everything in `config`.
pub fn build_registry(config: &FullConfig) -> Result<Registry, ConfigError> {
    let mut registry = Registry::new();
    register_config(&mut registry, config)?;
    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::PropertyKind;

    const DOCTORS: &str = r#"{
        "models": [
            {"name": "Doctor", "properties": [{"name": "name", "kind": "string"}]},
            {"name": "Pager", "properties": [
                {"name": "number", "kind": "integer"},
                {"name": "owner", "kind": "user"},
                {"name": "doctor", "kind": "reference"}
            ], "owner_property": "owner"}
        ],
        "specials": ["meta"]
    }"#;

    #[test]
    fn builds_registry_from_json() {
        let registry = build_registry(&parse_config(DOCTORS).unwrap()).unwrap();
        assert_eq!(registry.list_model_names(), vec!["Doctor", "Pager"]);
        let pager = registry.lookup_model("Pager").unwrap();
        assert_eq!(pager.owner_property.as_deref(), Some("owner"));
        assert_eq!(pager.find_property("doctor").map(|p| p.kind), Some(PropertyKind::Reference));
        assert!(registry.lookup_special("meta").is_some());
    }

    #[test]
    fn unknown_kind_is_a_parse_error() {
        let err = parse_config(r#"{"models": [{"name": "X", "properties": [{"name": "a", "kind": "blob"}]}]}"#)
            .unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn rejects_bad_definitions() {
        let cases = [
            r#"{"models": [{"name": "Bad-Name"}]}"#,
            r#"{"models": [{"name": "A"}, {"name": "A"}]}"#,
            r#"{"models": [{"name": "A", "properties": [{"name": "id", "kind": "integer"}]}]}"#,
            r#"{"models": [{"name": "A", "properties": [{"name": "x", "kind": "integer"}, {"name": "x", "kind": "float"}]}]}"#,
            r#"{"models": [{"name": "A", "owner_property": "who"}]}"#,
            r#"{"models": [{"name": "A", "properties": [{"name": "who", "kind": "string"}], "owner_property": "who"}]}"#,
            r#"{"specials": ["meta", "meta"]}"#,
            r#"{"specials": ["$meta"]}"#,
        ];
        for json in cases {
            let config = parse_config(json).unwrap();
            assert!(
                matches!(build_registry(&config), Err(ConfigError::Validation(_))),
                "accepted {}",
                json
            );
        }
    }

    #[test]
    fn registering_twice_reports_duplicates() {
        let config = parse_config(DOCTORS).unwrap();
        let mut registry = build_registry(&config).unwrap();
        assert!(matches!(
            register_config(&mut registry, &config),
            Err(ConfigError::Registry(_))
        ));
    }

    #[test]
    fn missing_file_is_a_load_error() {
        assert!(matches!(
            load_from_path("/definitely/not/here.json"),
            Err(ConfigError::Load(_))
        ));
    }
}
