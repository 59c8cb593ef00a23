//! Dispatcher: classify the path, pick the handler for (verb, shape), render the result.
//!
//! The dispatcher is synchronous and holds only read-only state; a request runs
//! end to end on the calling thread. Every outcome, failures included, comes back
//! as a `RestResponse`.

use crate::config::Settings;
use crate::error::{AppError, ConfigError};
use crate::grammar::{RestPath, RestUrlParser, Shape};
use crate::handlers::verbs;
use crate::model::{Entity, Jobj, Method, MethodCall, MethodKind, ModelType, Registry, SpecialObject, UserIdentity};
use crate::response::RestResponse;
use crate::service::{invoke, Marshaller};
use crate::store::Storage;
use axum::http;
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Verb {
    Get,
    Post,
    Put,
    Delete,
}

impl Verb {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Get => "GET",
            Verb::Post => "POST",
            Verb::Put => "PUT",
            Verb::Delete => "DELETE",
        }
    }

    pub fn from_method(method: &http::Method) -> Option<Verb> {
        method.as_str().parse().ok()
    }
}

impl FromStr for Verb {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "GET" => Ok(Verb::Get),
            "POST" => Ok(Verb::Post),
            "PUT" => Ok(Verb::Put),
            "DELETE" => Ok(Verb::Delete),
            _ => Err(AppError::UnsupportedVerb(s.to_string())),
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the transport hands over: verb, path, raw body, and the authenticated caller if any.
#[derive(Clone, Debug)]
pub struct RestRequest {
    pub verb: Verb,
    pub path: String,
    pub body: Vec<u8>,
    pub caller: Option<UserIdentity>,
}

impl RestRequest {
    pub fn new(verb: Verb, path: impl Into<String>) -> Self {
        RestRequest {
            verb,
            path: path.into(),
            body: Vec::new(),
            caller: None,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_json(self, body: &Value) -> Self {
        self.with_body(body.to_string())
    }

    pub fn with_caller(mut self, caller: UserIdentity) -> Self {
        self.caller = Some(caller);
        self
    }
}

/// Everything a handler may touch while serving one request.
pub struct RequestScope<'a> {
    pub registry: &'a Registry,
    pub storage: &'a dyn Storage,
    pub settings: &'a Settings,
    pub request: &'a RestRequest,
    /// Literal prefix text matched in the request path, e.g. `/` or `/api/`.
    pub prefix: &'a str,
}

impl<'a> RequestScope<'a> {
    pub fn marshaller(&self) -> Marshaller<'a> {
        Marshaller::new(self.registry, self.storage)
    }

    pub fn model(&self, name: &str) -> Result<&'a ModelType, AppError> {
        self.registry
            .lookup_model(name)
            .ok_or_else(|| AppError::UnknownModel(name.to_string()))
    }

    pub fn special(&self, name: &str) -> Result<&'a SpecialObject, AppError> {
        self.registry
            .lookup_special(name)
            .ok_or_else(|| AppError::UnknownSpecial(name.to_string()))
    }

    pub fn method(&self, kind: MethodKind, owner: &str, name: &str) -> Result<&'a Method, AppError> {
        self.registry
            .lookup_method(kind, owner, name)
            .ok_or_else(|| AppError::UnknownMethod {
                kind,
                owner: owner.to_string(),
                method: name.to_string(),
            })
    }

    pub fn parse_id(strid: &str) -> Result<i64, AppError> {
        strid.parse().map_err(|_| AppError::InvalidId(strid.to_string()))
    }

    /// Stored entity of `model` with the given id; 404 when absent.
    pub fn entity(&self, model: &ModelType, strid: &str) -> Result<Entity, AppError> {
        let id = Self::parse_id(strid)?;
        self.storage
            .get(model, id)?
            .ok_or_else(|| AppError::EntityNotFound(format!("{}/{}", model.name, strid)))
    }

    /// Request body as a jobj. Anything but a JSON object is malformed.
    pub fn body_jobj(&self) -> Result<Jobj, AppError> {
        let value: Value = serde_json::from_slice(&self.request.body)
            .map_err(|e| AppError::MalformedBody(e.to_string()))?;
        match value {
            Value::Object(m) => Ok(m),
            _ => Err(AppError::MalformedBody("body must be a JSON object".into())),
        }
    }

    /// Path of a resource under the matched prefix, for `Location` headers.
    pub fn location(&self, entity_path: &str) -> String {
        format!("{}{}", self.prefix, entity_path)
    }

    /// Run a registered method; failures and panics become a 400 `Invocation` error.
    pub fn call(&self, target: String, method: &Method, entity: Option<&Entity>) -> Result<RestResponse, AppError> {
        let call = MethodCall {
            registry: self.registry,
            storage: self.storage,
            caller: self.request.caller.as_ref(),
            entity,
        };
        match invoke(method, &call) {
            Ok(value) => Ok(RestResponse::ok(value)),
            Err(e) => {
                tracing::warn!(call = %target, error = %e, "method call failed");
                let message = if self.settings.expose_method_errors {
                    e.0
                } else {
                    "method failed".to_string()
                };
                Err(AppError::Invocation { target, message })
            }
        }
    }
}

pub type Handler = fn(&RequestScope<'_>, &RestPath) -> Result<RestResponse, AppError>;

/// One handler slot per shape. Empty slots answer 400.
#[derive(Clone, Copy, Default)]
pub struct VerbHandlers {
    slots: [Option<Handler>; 6],
}

impl VerbHandlers {
    pub fn with(mut self, shape: Shape, handler: Handler) -> Self {
        self.slots[shape.index()] = Some(handler);
        self
    }

    pub fn without(mut self, shape: Shape) -> Self {
        self.slots[shape.index()] = None;
        self
    }

    pub fn get(&self, shape: Shape) -> Option<Handler> {
        self.slots[shape.index()]
    }

    pub fn default_get() -> Self {
        Self::default()
            .with(Shape::SpecialMethod, verbs::call_special_method)
            .with(Shape::Special, verbs::list_special_methods)
            .with(Shape::InstanceMethod, verbs::call_instance_method)
            .with(Shape::Instance, verbs::read_instance)
            .with(Shape::ModelMethod, verbs::call_model_method)
            .with(Shape::Collection, verbs::list_collection)
    }

    pub fn default_post() -> Self {
        Self::default()
            .with(Shape::SpecialMethod, verbs::call_special_method)
            .with(Shape::InstanceMethod, verbs::call_instance_method)
            .with(Shape::ModelMethod, verbs::call_model_method)
            .with(Shape::Collection, verbs::create_in_collection)
    }

    pub fn default_put() -> Self {
        Self::default().with(Shape::Instance, verbs::update_instance)
    }

    pub fn default_delete() -> Self {
        Self::default().with(Shape::Instance, verbs::delete_instance)
    }
}

impl fmt::Debug for VerbHandlers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let handled: Vec<String> = Shape::ALL
            .iter()
            .filter(|s| self.get(**s).is_some())
            .map(|s| s.to_string())
            .collect();
        f.debug_struct("VerbHandlers").field("handled", &handled).finish()
    }
}

pub struct Dispatcher {
    registry: Arc<Registry>,
    storage: Arc<dyn Storage>,
    settings: Settings,
    parser: RestUrlParser,
    get: VerbHandlers,
    post: VerbHandlers,
    put: VerbHandlers,
    delete: VerbHandlers,
}

impl Dispatcher {
    pub fn new(registry: Arc<Registry>, storage: Arc<dyn Storage>, settings: Settings) -> Result<Self, ConfigError> {
        let parser = RestUrlParser::new(&settings.prefix)
            .map_err(|e| ConfigError::Validation(format!("prefix pattern '{}': {}", settings.prefix, e)))?;
        Ok(Dispatcher {
            registry,
            storage,
            settings,
            parser,
            get: VerbHandlers::default_get(),
            post: VerbHandlers::default_post(),
            put: VerbHandlers::default_put(),
            delete: VerbHandlers::default_delete(),
        })
    }

    /// Replace (or add) the handler for one verb and shape.
    pub fn with_handler(mut self, verb: Verb, shape: Shape, handler: Handler) -> Self {
        let table = self.table_mut(verb);
        *table = table.with(shape, handler);
        self
    }

    /// Stop handling one verb and shape; such requests then answer 400.
    pub fn without_handler(mut self, verb: Verb, shape: Shape) -> Self {
        let table = self.table_mut(verb);
        *table = table.without(shape);
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn storage(&self) -> &dyn Storage {
        self.storage.as_ref()
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn parser(&self) -> &RestUrlParser {
        &self.parser
    }

    pub fn handle(&self, request: &RestRequest) -> RestResponse {
        match self.route(request) {
            Ok(response) => {
                tracing::debug!(verb = %request.verb, path = %request.path, status = %response.status, "handled");
                response
            }
            Err(e) => {
                let response = RestResponse::error(&e);
                if response.status.is_server_error() {
                    tracing::error!(verb = %request.verb, path = %request.path, error = %e, "request failed");
                } else {
                    tracing::debug!(verb = %request.verb, path = %request.path, error = %e, "request rejected");
                }
                response
            }
        }
    }

    fn route(&self, request: &RestRequest) -> Result<RestResponse, AppError> {
        let invalid = || AppError::InvalidPath {
            verb: request.verb.to_string(),
            path: request.path.clone(),
        };
        if request.verb == Verb::Get && self.parser.root(&request.path).is_some() {
            return Ok(RestResponse::ok(self.registry.list_model_names()));
        }
        let parsed = self.parser.parse(&request.path).ok_or_else(invalid)?;
        let handler = self.table(request.verb).get(parsed.route.shape()).ok_or_else(invalid)?;
        let scope = RequestScope {
            registry: &self.registry,
            storage: self.storage.as_ref(),
            settings: &self.settings,
            request,
            prefix: &parsed.prefix,
        };
        handler(&scope, &parsed.route)
    }

    fn table(&self, verb: Verb) -> &VerbHandlers {
        match verb {
            Verb::Get => &self.get,
            Verb::Post => &self.post,
            Verb::Put => &self.put,
            Verb::Delete => &self.delete,
        }
    }

    fn table_mut(&mut self, verb: Verb) -> &mut VerbHandlers {
        match verb {
            Verb::Get => &mut self.get,
            Verb::Post => &mut self.post,
            Verb::Put => &mut self.put,
            Verb::Delete => &mut self.delete,
        }
    }
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("registry", &self.registry)
            .field("settings", &self.settings)
            .field("get", &self.get)
            .field("post", &self.post)
            .field("put", &self.put)
            .field("delete", &self.delete)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn verbs_parse_case_insensitively() {
        assert_eq!("get".parse::<Verb>().unwrap(), Verb::Get);
        assert_eq!(Verb::from_method(&http::Method::DELETE), Some(Verb::Delete));
        assert_eq!(Verb::from_method(&http::Method::PATCH), None);
        assert!(matches!("HEAD".parse::<Verb>(), Err(AppError::UnsupportedVerb(_))));
    }

    #[test]
    fn default_tables_cover_expected_shapes() {
        assert!(VerbHandlers::default_get().get(Shape::Special).is_some());
        assert!(VerbHandlers::default_post().get(Shape::Special).is_none());
        assert!(VerbHandlers::default_post().get(Shape::Instance).is_none());
        assert!(VerbHandlers::default_put().get(Shape::Collection).is_none());
        assert!(VerbHandlers::default_delete().get(Shape::Instance).is_some());
    }

    #[test]
    fn bad_prefix_pattern_is_a_config_error() {
        let storage: Arc<dyn Storage> = Arc::new(crate::store::InMemoryStore::new());
        let settings = Settings::default().with_prefix("api(");
        let err = Dispatcher::new(Arc::new(Registry::new()), storage, settings).unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }
}
