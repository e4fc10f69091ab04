//! Native plugins exposed over the bridge
//!
//! A plugin is registered with the bridge before it is built, loaded once
//! when the bridge starts, invoked any number of times (possibly from
//! several threads at once), and destroyed once when the bridge shuts down.

pub mod text_recognition;

use anyhow::Result;
use serde_json::{Map, Value};

use crate::shared::{BridgeCall, BridgeResponse};

pub use text_recognition::{RecognitionRequest, TextRecognitionPlugin};

/// A native plugin callable from the web layer
pub trait Plugin: Send + Sync {
    /// Name the web layer addresses the plugin by
    fn name(&self) -> &'static str;

    /// Methods the plugin answers
    fn methods(&self) -> &'static [&'static str];

    /// Acquire resources. Called once, before any `invoke`.
    fn load(&self) -> Result<()> {
        Ok(())
    }

    /// Handle one call to `method`
    fn invoke(&self, method: &str, call: &PluginCall) -> PluginResponse;

    /// Release resources. Called once, after the last `invoke`.
    fn handle_on_destroy(&self) {}
}

/// Arguments of one call as seen by a plugin
#[derive(Debug, Clone)]
pub struct PluginCall {
    call_id: String,
    method: String,
    data: Map<String, Value>,
}

impl PluginCall {
    pub fn new(
        call_id: impl Into<String>,
        method: impl Into<String>,
        data: Map<String, Value>,
    ) -> Self {
        Self {
            call_id: call_id.into(),
            method: method.into(),
            data,
        }
    }

    /// Build from a wire call, assigning an id if it has none
    pub fn from_bridge_call(call: BridgeCall) -> Self {
        let call_id = call
            .call_id
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        Self::new(call_id, call.method_name, call.options)
    }

    pub fn call_id(&self) -> &str {
        &self.call_id
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    /// String argument `key`; `None` when absent, null or not a string
    pub fn get_string(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }

    /// String argument `key`, or `default`
    pub fn get_string_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get_string(key).unwrap_or(default)
    }
}

/// How a plugin answered a call
#[derive(Debug, Clone, PartialEq)]
pub enum PluginResponse {
    Resolved(Value),
    Rejected {
        message: String,
        code: Option<String>,
    },
}

impl PluginResponse {
    pub fn resolve(data: Value) -> Self {
        PluginResponse::Resolved(data)
    }

    pub fn reject(message: impl Into<String>) -> Self {
        PluginResponse::Rejected {
            message: message.into(),
            code: None,
        }
    }

    pub fn reject_with_code(message: impl Into<String>, code: impl Into<String>) -> Self {
        PluginResponse::Rejected {
            message: message.into(),
            code: Some(code.into()),
        }
    }

    /// Attach the call id to produce the wire response
    pub fn into_bridge_response(self, call_id: impl Into<String>) -> BridgeResponse {
        match self {
            PluginResponse::Resolved(data) => BridgeResponse::resolved(call_id, data),
            PluginResponse::Rejected { message, code } => {
                BridgeResponse::rejected(call_id, message, code)
            }
        }
    }
}
