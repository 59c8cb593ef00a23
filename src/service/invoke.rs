//! Invoke a registered method, turning errors and panics into `MethodError`.

use crate::error::MethodError;
use crate::model::{Method, MethodCall};
use serde_json::Value;
use std::panic::{catch_unwind, AssertUnwindSafe};

pub fn invoke(method: &Method, call: &MethodCall<'_>) -> Result<Value, MethodError> {
    match catch_unwind(AssertUnwindSafe(|| method(call))) {
        Ok(result) => result,
        Err(payload) => {
            let message = payload
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "method panicked".to_string());
            Err(MethodError(message))
        }
    }
}
