//! Bridge call and response wire types (JSON, camelCase)

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A call from the web layer into a native plugin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeCall {
    /// Correlates the response; assigned by the bridge when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub call_id: Option<String>,
    /// Registered plugin name, e.g. "TextRecognition"
    pub plugin_id: String,
    /// Plugin method, e.g. "recognize"
    pub method_name: String,
    /// Method arguments
    #[serde(default)]
    pub options: Map<String, Value>,
}

impl BridgeCall {
    /// Create a call with a fresh id
    pub fn new(
        plugin_id: impl Into<String>,
        method_name: impl Into<String>,
        options: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: Some(uuid::Uuid::new_v4().to_string()),
            plugin_id: plugin_id.into(),
            method_name: method_name.into(),
            options,
        }
    }
}

/// Rejection detail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeError {
    /// Human-readable failure message
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

/// The single answer to a `BridgeCall`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BridgeResponse {
    pub call_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<BridgeError>,
}

impl BridgeResponse {
    /// A resolved call
    pub fn resolved(call_id: impl Into<String>, data: Value) -> Self {
        Self {
            call_id: call_id.into(),
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// A rejected call
    pub fn rejected(
        call_id: impl Into<String>,
        message: impl Into<String>,
        code: Option<String>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            success: false,
            data: None,
            error: Some(BridgeError {
                message: message.into(),
                code,
            }),
        }
    }

    /// Rejection message, if this response is a rejection
    pub fn error_message(&self) -> Option<&str> {
        self.error.as_ref().map(|e| e.message.as_str())
    }
}
