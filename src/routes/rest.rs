//! Every path not claimed by another route goes through the dispatcher.

use crate::error::AppError;
use crate::extractors::CallerIdentity;
use crate::handlers::{RestRequest, Verb};
use crate::response::RestResponse;
use crate::state::AppState;
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{Method, Uri},
    Router,
};
use tower_http::limit::RequestBodyLimitLayer;

async fn dispatch(
    State(state): State<AppState>,
    CallerIdentity(caller): CallerIdentity,
    method: Method,
    uri: Uri,
    body: Bytes,
) -> RestResponse {
    let Some(verb) = Verb::from_method(&method) else {
        return RestResponse::error(&AppError::UnsupportedVerb(method.to_string()));
    };
    let mut request = RestRequest::new(verb, uri.path()).with_body(body.to_vec());
    request.caller = caller;

    let dispatcher = state.dispatcher.clone();
    match tokio::task::spawn_blocking(move || dispatcher.handle(&request)).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(error = %e, "dispatch task failed");
            RestResponse::error(&AppError::Internal(e.to_string()))
        }
    }
}

/// Fallback router serving the REST grammar under the configured prefix.
///
/// `Settings::max_body_bytes` is the only body cap; axum's own default limit is switched off.
pub fn rest_routes(state: AppState) -> Router {
    let limit = state.dispatcher.settings().max_body_bytes;
    Router::new()
        .fallback(dispatch)
        .layer(DefaultBodyLimit::disable())
        .layer(RequestBodyLimitLayer::new(limit))
        .with_state(state)
}
