//! REST URL grammar: classifies a path into one of six shapes.
//!
//! A prefix pattern is matched and stripped first; the remainder is then tried
//! against the shapes in a fixed order, first match wins. Shapes nest as
//! prefixes of one another, so the order matters:
//!
//! 1. `$special/method`
//! 2. `$special`
//! 3. `model/<digits>/method`
//! 4. `model/<digits>`
//! 5. `model/method`
//! 6. `model`
//!
//! Every shape accepts one optional trailing `/`. Names are not checked
//! against any registry here.

use regex::{Captures, Regex};
use std::fmt;

const IDENT: &str = "[A-Za-z0-9_]+";
const DIGITS: &str = "[0-9]+";

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Shape {
    SpecialMethod,
    Special,
    InstanceMethod,
    Instance,
    ModelMethod,
    Collection,
}

impl Shape {
    /// Priority order used when matching.
    pub const ALL: [Shape; 6] = [
        Shape::SpecialMethod,
        Shape::Special,
        Shape::InstanceMethod,
        Shape::Instance,
        Shape::ModelMethod,
        Shape::Collection,
    ];

    pub(crate) fn index(self) -> usize {
        match self {
            Shape::SpecialMethod => 0,
            Shape::Special => 1,
            Shape::InstanceMethod => 2,
            Shape::Instance => 3,
            Shape::ModelMethod => 4,
            Shape::Collection => 5,
        }
    }

    fn pattern(self) -> String {
        let body = match self {
            Shape::SpecialMethod => format!(r"\$(?P<special>{IDENT})/(?P<method>{IDENT})"),
            Shape::Special => format!(r"\$(?P<special>{IDENT})"),
            Shape::InstanceMethod => format!("(?P<model>{IDENT})/(?P<id>{DIGITS})/(?P<method>{IDENT})"),
            Shape::Instance => format!("(?P<model>{IDENT})/(?P<id>{DIGITS})"),
            Shape::ModelMethod => format!("(?P<model>{IDENT})/(?P<method>{IDENT})"),
            Shape::Collection => format!("(?P<model>{IDENT})"),
        };
        format!("^{body}/?$")
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Shape::SpecialMethod => "special-method",
            Shape::Special => "special",
            Shape::InstanceMethod => "model-instance-method",
            Shape::Instance => "model-instance",
            Shape::ModelMethod => "model-method",
            Shape::Collection => "model-collection",
        })
    }
}

/// A classified path with its captures. Special names are captured without the `$`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RestPath {
    SpecialMethod { special: String, method: String },
    Special { special: String },
    InstanceMethod { model: String, id: String, method: String },
    Instance { model: String, id: String },
    ModelMethod { model: String, method: String },
    Collection { model: String },
}

impl RestPath {
    pub fn shape(&self) -> Shape {
        match self {
            RestPath::SpecialMethod { .. } => Shape::SpecialMethod,
            RestPath::Special { .. } => Shape::Special,
            RestPath::InstanceMethod { .. } => Shape::InstanceMethod,
            RestPath::Instance { .. } => Shape::Instance,
            RestPath::ModelMethod { .. } => Shape::ModelMethod,
            RestPath::Collection { .. } => Shape::Collection,
        }
    }

    fn from_captures(shape: Shape, caps: &Captures<'_>) -> Self {
        let get = |name: &str| caps.name(name).map(|m| m.as_str().to_string()).unwrap_or_default();
        match shape {
            Shape::SpecialMethod => RestPath::SpecialMethod {
                special: get("special"),
                method: get("method"),
            },
            Shape::Special => RestPath::Special { special: get("special") },
            Shape::InstanceMethod => RestPath::InstanceMethod {
                model: get("model"),
                id: get("id"),
                method: get("method"),
            },
            Shape::Instance => RestPath::Instance {
                model: get("model"),
                id: get("id"),
            },
            Shape::ModelMethod => RestPath::ModelMethod {
                model: get("model"),
                method: get("method"),
            },
            Shape::Collection => RestPath::Collection { model: get("model") },
        }
    }
}

/// Successful match: the literal prefix text that was stripped, and the classified rest.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedPath {
    pub prefix: String,
    pub route: RestPath,
}

#[derive(Clone, Debug)]
pub struct RestUrlParser {
    prefix: Regex,
    shapes: Vec<(Shape, Regex)>,
}

impl RestUrlParser {
    /// `prefix` is a regex pattern; it always absorbs one leading and one trailing `/`
    /// (`""` and `"/"` mean the root, `"api"` means `/api/`).
    pub fn new(prefix: &str) -> Result<Self, regex::Error> {
        let prefix = Regex::new(&format!("^(?:{})", normalize_prefix(prefix)))?;
        let shapes = Shape::ALL
            .iter()
            .map(|s| Regex::new(&s.pattern()).map(|re| (*s, re)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(RestUrlParser { prefix, shapes })
    }

    /// Classify `path`. `None` when the prefix or every shape fails to match.
    pub fn parse(&self, path: &str) -> Option<ParsedPath> {
        let Some(prefix) = self.prefix.find(path) else {
            tracing::debug!(path = %path, "no prefix match");
            return None;
        };
        let rest = &path[prefix.end()..];
        for (shape, re) in &self.shapes {
            if let Some(caps) = re.captures(rest) {
                tracing::debug!(path = %path, %shape, "matched");
                return Some(ParsedPath {
                    prefix: prefix.as_str().to_string(),
                    route: RestPath::from_captures(*shape, &caps),
                });
            }
        }
        tracing::debug!(path = %path, rest = %rest, "no shape match");
        None
    }

    /// Matched prefix text when `path` is nothing but the prefix (plus slashes).
    ///
    /// The prefix itself must match, so `"///"` is a root under the default prefix while
    /// `""` is not. Both stay no-matches for [`RestUrlParser::parse`].
    pub fn root(&self, path: &str) -> Option<String> {
        let prefix = self.prefix.find(path)?;
        path[prefix.end()..]
            .chars()
            .all(|c| c == '/')
            .then(|| prefix.as_str().to_string())
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        "/".to_string()
    } else {
        format!("/{}/", trimmed)
    }
}
