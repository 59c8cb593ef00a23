//! Demo server: Doctor and Pager models over an in-memory store.
//!
//! Run from repo root: `cargo run -p demo-server`
//! Point `JSONREST_MODELS` at a JSON model file to serve your own models.

use jsonrest::{
    build_registry, common_routes, load_from_path, parse_config, rest_routes, AppState, Dispatcher, InMemoryStore,
    MethodError, Registry, Settings, Storage,
};
use serde_json::{json, Value};
use std::sync::Arc;
use tokio::net::TcpListener;

const BUILTIN_MODELS: &str = r#"{
    "models": [
        {"name": "Doctor", "properties": [{"name": "name", "kind": "string"}]},
        {"name": "Pager", "properties": [
            {"name": "number", "kind": "integer"},
            {"name": "owner", "kind": "user"},
            {"name": "doctor", "kind": "reference"},
            {"name": "issued", "kind": "datetime"}
        ], "owner_property": "owner"}
    ],
    "specials": ["meta"]
}"#;

fn register_methods(registry: &mut Registry) -> Result<(), jsonrest::RegistryError> {
    if registry.lookup_special("meta").is_some() {
        registry.register_special_method("meta", "models", |call| Ok(json!(call.registry.list_model_names())))?;
        registry.register_special_method("meta", "whoami", |call| {
            Ok(call.caller.map_or(Value::Null, |u| Value::String(u.as_str().to_string())))
        })?;
    }
    if let Some(doctor) = registry.lookup_model("Doctor").cloned() {
        registry.register_model_method("Doctor", "count", move |call| {
            let n = call
                .storage
                .query_all(&doctor)
                .map_err(|e| MethodError(e.to_string()))?
                .len();
            Ok(json!(n))
        })?;
        registry.register_instance_method("Doctor", "describe", |call| {
            let entity = call.entity.ok_or_else(|| MethodError::from("no entity"))?;
            let name = entity.get("name").map(|v| v.to_string()).unwrap_or_default();
            Ok(json!(format!("{} is {}", entity.path().unwrap_or_default(), name)))
        })?;
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("jsonrest=info,demo_server=info")),
        )
        .init();

    let settings = Settings::from_env();
    let config = match std::env::var("JSONREST_MODELS") {
        Ok(path) => load_from_path(path)?,
        Err(_) => parse_config(BUILTIN_MODELS)?,
    };
    let mut registry = build_registry(&config)?;
    register_methods(&mut registry)?;

    let storage: Arc<dyn Storage> = Arc::new(InMemoryStore::new());
    let dispatcher = Dispatcher::new(Arc::new(registry), storage, settings)?;
    let state = AppState::new(dispatcher);

    let app = common_routes().merge(rest_routes(state));
    let bind = std::env::var("JSONREST_BIND").unwrap_or_else(|_| "127.0.0.1:3000".into());
    let listener = TcpListener::bind(&bind).await?;
    tracing::info!("demo server listening on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}
