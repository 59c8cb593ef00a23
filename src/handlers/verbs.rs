//! Default handlers behind each (verb, shape) slot.

use crate::error::AppError;
use crate::handlers::dispatch::RequestScope;
use crate::model::{FieldMap, FieldValue, MethodKind};
use crate::response::RestResponse;
use crate::grammar::RestPath;
use crate::service::Marshaller;
use serde_json::Value;

fn mismatch(scope: &RequestScope<'_>) -> AppError {
    AppError::InvalidPath {
        verb: scope.request.verb.to_string(),
        path: scope.request.path.clone(),
    }
}

/// GET `Model`: id-only jobjs for every entity.
pub fn list_collection(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::Collection { model } = path else {
        return Err(mismatch(scope));
    };
    let model = scope.model(model)?;
    let ids: Vec<Value> = scope
        .storage
        .query_all(model)?
        .iter()
        .map(|e| Value::Object(Marshaller::id_jobj(e)))
        .collect();
    Ok(RestResponse::ok(ids))
}

/// GET `Model/<id>`: full jobj.
pub fn read_instance(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::Instance { model, id } = path else {
        return Err(mismatch(scope));
    };
    let model = scope.model(model)?;
    let entity = scope.entity(model, id)?;
    Ok(RestResponse::ok(scope.marshaller().to_jobj(&entity)))
}

/// POST `Model`: create from the body jobj; 302 to an existing match when the model has a lookup hook.
pub fn create_in_collection(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::Collection { model } = path else {
        return Err(mismatch(scope));
    };
    let model = scope.model(model)?;
    let jobj = scope.body_jobj()?;

    if let Some(lookup) = model.existing() {
        if let Some(existing) = lookup(model, &jobj, scope.storage)? {
            if let Some(p) = existing.path() {
                let location = scope.location(&p);
                tracing::info!(location = %location, "create matched existing entity");
                return Ok(RestResponse::found(location));
            }
        }
    }

    let mut extra = FieldMap::new();
    if let (Some(owner), Some(caller)) = (&model.owner_property, &scope.request.caller) {
        extra.insert(owner.clone(), FieldValue::User(caller.clone()));
    }
    let created = scope.marshaller().create_entity(model, &jobj, extra)?;
    let id = created
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| AppError::Internal("created entity has no id".into()))?;
    let location = scope.location(&format!("{}/{}", model.name, id));
    tracing::info!(location = %location, "created entity");
    Ok(RestResponse::created(created, location))
}

/// PUT `Model/<id>`: apply the body jobj onto the stored entity.
pub fn update_instance(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::Instance { model, id } = path else {
        return Err(mismatch(scope));
    };
    let model = scope.model(model)?;
    let mut entity = scope.entity(model, id)?;
    let jobj = scope.body_jobj()?;
    let updated = scope.marshaller().update_entity(&mut entity, &jobj)?;
    Ok(RestResponse::ok(updated))
}

/// DELETE `Model/<id>`: empty jobj whether or not the entity existed.
pub fn delete_instance(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::Instance { model, id } = path else {
        return Err(mismatch(scope));
    };
    let model = scope.model(model)?;
    let id = RequestScope::parse_id(id)?;
    if let Some(entity) = scope.storage.get(model, id)? {
        scope.storage.delete(&entity)?;
        tracing::info!(model = %model.name, id, "deleted entity");
    }
    Ok(RestResponse::ok(Value::Object(Default::default())))
}

/// GET `$special`: its method names.
pub fn list_special_methods(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::Special { special } = path else {
        return Err(mismatch(scope));
    };
    Ok(RestResponse::ok(scope.special(special)?.method_names()))
}

pub fn call_special_method(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::SpecialMethod { special, method } = path else {
        return Err(mismatch(scope));
    };
    scope.special(special)?;
    let m = scope.method(MethodKind::Special, special, method)?;
    scope.call(format!("${}/{}", special, method), m, None)
}

pub fn call_model_method(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::ModelMethod { model, method } = path else {
        return Err(mismatch(scope));
    };
    scope.model(model)?;
    let m = scope.method(MethodKind::Model, model, method)?;
    scope.call(format!("{}/{}", model, method), m, None)
}

pub fn call_instance_method(scope: &RequestScope<'_>, path: &RestPath) -> Result<RestResponse, AppError> {
    let RestPath::InstanceMethod { model, id, method } = path else {
        return Err(mismatch(scope));
    };
    let model_type = scope.model(model)?;
    let m = scope.method(MethodKind::Instance, model, method)?;
    let entity = scope.entity(model_type, id)?;
    scope.call(format!("{}/{}/{}", model, id, method), m, Some(&entity))
}
