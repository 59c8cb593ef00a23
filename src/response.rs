//! The (status, body, headers) triple produced for every request.

use crate::error::AppError;
use axum::{
    http::{header::LOCATION, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Clone, Debug, PartialEq)]
pub struct RestResponse {
    pub status: StatusCode,
    pub body: Value,
    pub headers: BTreeMap<String, String>,
}

impl RestResponse {
    pub fn new(status: StatusCode, body: Value) -> Self {
        RestResponse {
            status,
            body,
            headers: BTreeMap::new(),
        }
    }

    pub fn ok(body: impl Into<Value>) -> Self {
        Self::new(StatusCode::OK, body.into())
    }

    /// 201 with `Location` pointing at the new resource.
    pub fn created(body: impl Into<Value>, location: String) -> Self {
        Self::new(StatusCode::CREATED, body.into()).with_header(LOCATION.as_str(), location)
    }

    /// 302 to an already existing resource, empty jobj body.
    pub fn found(location: String) -> Self {
        Self::new(StatusCode::FOUND, Value::Object(Default::default())).with_header(LOCATION.as_str(), location)
    }

    pub fn error(err: &AppError) -> Self {
        let (status, _) = err.status_and_code();
        let body = serde_json::to_value(err.body()).unwrap_or(Value::Null);
        Self::new(status, body)
    }

    pub fn with_header(mut self, name: &str, value: String) -> Self {
        self.headers.insert(name.to_string(), value);
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.get(LOCATION.as_str()).map(String::as_str)
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

impl IntoResponse for RestResponse {
    fn into_response(self) -> Response {
        let mut response = (self.status, Json(self.body)).into_response();
        for (name, value) in self.headers {
            match (HeaderName::try_from(name.as_str()), HeaderValue::try_from(value.as_str())) {
                (Ok(n), Ok(v)) => {
                    response.headers_mut().insert(n, v);
                }
                _ => tracing::warn!(header = %name, "dropping header that is not valid HTTP"),
            }
        }
        response
    }
}
