//! Runtime settings, read from `JSONREST_*` environment variables.

/// Prefix pattern used when none is configured: the root.
pub const DEFAULT_PREFIX: &str = "/";
pub const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Settings {
    /// URL prefix pattern stripped before shape matching (e.g. `/`, `api`, `v\d+`).
    pub prefix: String,
    /// Report a failing method's own error message to the caller instead of a generic one.
    pub expose_method_errors: bool,
    pub max_body_bytes: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            prefix: DEFAULT_PREFIX.to_string(),
            expose_method_errors: false,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
        }
    }
}

impl Settings {
    /// `JSONREST_PREFIX`, `JSONREST_EXPOSE_METHOD_ERRORS`, `JSONREST_MAX_BODY_BYTES`.
    /// Unset or unparseable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Settings::default();
        Settings {
            prefix: lookup("JSONREST_PREFIX").unwrap_or(defaults.prefix),
            expose_method_errors: lookup("JSONREST_EXPOSE_METHOD_ERRORS")
                .and_then(|v| parse_flag(&v))
                .unwrap_or(defaults.expose_method_errors),
            max_body_bytes: lookup("JSONREST_MAX_BODY_BYTES")
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.max_body_bytes),
        }
    }

    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    pub fn expose_method_errors(mut self, expose: bool) -> Self {
        self.expose_method_errors = expose;
        self
    }
}

fn parse_flag(v: &str) -> Option<bool> {
    match v.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn reads_overrides_and_keeps_defaults() {
        let env: HashMap<&str, &str> = [
            ("JSONREST_PREFIX", "api"),
            ("JSONREST_EXPOSE_METHOD_ERRORS", "yes"),
            ("JSONREST_MAX_BODY_BYTES", "not a number"),
        ]
        .into_iter()
        .collect();
        let s = Settings::from_lookup(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(s.prefix, "api");
        assert!(s.expose_method_errors);
        assert_eq!(s.max_body_bytes, DEFAULT_MAX_BODY_BYTES);
    }

    #[test]
    fn empty_environment_gives_defaults() {
        assert_eq!(Settings::from_lookup(|_| None), Settings::default());
    }
}
