//! Wire types: one JSON object per line in each direction.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Operation requested from the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    Compile,
    Generate,
}

/// JSON newline-delimited request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceRequest {
    pub id: u64,
    pub method: Method,
    pub params: Value,
}

/// JSON newline-delimited response, correlated by `id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceResponse {
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
}

impl ServiceResponse {
    pub fn ok(id: u64, data: Value) -> Self {
        Self {
            id,
            ok: true,
            data: Some(data),
            error: None,
        }
    }

    pub fn error(id: u64, payload: Value) -> Self {
        Self {
            id,
            ok: false,
            data: None,
            error: Some(payload),
        }
    }
}
