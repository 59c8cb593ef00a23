//! Entity model: property kinds, entities, coercion defaults and the registry.

pub mod types;
pub mod coercion;
pub mod registry;

pub use types::*;
pub use coercion::{CoercionContext, CoercionRegistry, Decoder, Encoder, DATETIME_FORMAT, FALSE_TOKEN};
pub use registry::{Method, MethodCall, MethodKind, Registry, SpecialObject};
