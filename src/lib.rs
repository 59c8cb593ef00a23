//! jsonrest: a JSON-over-HTTP REST layer over registered models.
//!
//! Models, special objects and methods go into a [`Registry`] at startup; a
//! [`Dispatcher`] then serves the six URL shapes against any [`Storage`].

pub mod config;
pub mod error;
pub mod extractors;
pub mod grammar;
pub mod handlers;
pub mod model;
pub mod response;
pub mod routes;
pub mod service;
pub mod state;
pub mod store;

pub use config::{build_registry, load_from_path, parse_config, register_config, FullConfig, Settings};
pub use error::{AppError, CoercionError, ConfigError, MethodError, RegistryError, StorageError};
pub use extractors::CallerIdentity;
pub use grammar::{ParsedPath, RestPath, RestUrlParser, Shape};
pub use handlers::{Dispatcher, Handler, RequestScope, RestRequest, Verb};
pub use model::{
    Entity, EntityRef, FieldMap, FieldValue, Jobj, Method, MethodCall, MethodKind, ModelType, PropertyKind, Registry,
    UserIdentity,
};
pub use response::RestResponse;
pub use routes::{common_routes, rest_routes};
pub use state::AppState;
pub use store::{InMemoryStore, Storage};
