//! Config validation: identifier syntax, uniqueness, owner properties.

use crate::config::FullConfig;
use crate::error::ConfigError;
use crate::model::PropertyKind;
use regex::Regex;
use std::collections::HashSet;

fn check_identifier(re: &Regex, what: &str, name: &str) -> Result<(), ConfigError> {
    if re.is_match(name) {
        Ok(())
    } else {
        Err(ConfigError::Validation(format!(
            "{} name '{}' must contain only letters, digits and '_'",
            what, name
        )))
    }
}

pub fn validate(config: &FullConfig) -> Result<(), ConfigError> {
    let ident = Regex::new("^[A-Za-z0-9_]+$").map_err(|e| ConfigError::Validation(e.to_string()))?;

    let mut model_names = HashSet::new();
    for m in &config.models {
        check_identifier(&ident, "model", &m.name)?;
        if !model_names.insert(m.name.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate model '{}'", m.name)));
        }
        let mut property_names = HashSet::new();
        for p in &m.properties {
            check_identifier(&ident, "property", &p.name)?;
            if p.name == "id" {
                return Err(ConfigError::Validation(format!(
                    "model '{}': 'id' is reserved",
                    m.name
                )));
            }
            if !property_names.insert(p.name.as_str()) {
                return Err(ConfigError::Validation(format!(
                    "model '{}': duplicate property '{}'",
                    m.name, p.name
                )));
            }
        }
        if let Some(owner) = &m.owner_property {
            match m.properties.iter().find(|p| &p.name == owner) {
                Some(p) if p.kind == PropertyKind::User => {}
                Some(p) => {
                    return Err(ConfigError::Validation(format!(
                        "model '{}': owner property '{}' must be of kind user, not {}",
                        m.name, owner, p.kind
                    )))
                }
                None => {
                    return Err(ConfigError::Validation(format!(
                        "model '{}': owner property '{}' is not declared",
                        m.name, owner
                    )))
                }
            }
        }
    }

    let mut special_names = HashSet::new();
    for s in &config.specials {
        check_identifier(&ident, "special", s)?;
        if !special_names.insert(s.as_str()) {
            return Err(ConfigError::Validation(format!("duplicate special '{}'", s)));
        }
    }
    Ok(())
}
