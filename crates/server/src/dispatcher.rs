//! Transport-agnostic method routing.

use crate::backend::ToolBackend;
use crate::protocol::{CallEnvelope, ErrorObject, Outcome, ResultEnvelope};
use futures::FutureExt as _;
use oas_mcp_openapi_tools::error::OpenApiToolsError;
use rmcp::model::{ErrorCode, JsonObject};
use serde_json::{Value, json};
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{debug, error, warn};

pub const PROTOCOL_VERSION: &str = "2024-11-05";
pub const SERVER_NAME: &str = "oas-mcp";
pub const SERVER_VERSION: &str = "1.0.0";

/// Routes `initialize`, `tools/list` and `tools/call`. Stateless between calls, so one instance
/// is shared by every transport and connection.
#[derive(Clone)]
pub struct Dispatcher {
    backend: Arc<dyn ToolBackend>,
}

impl Dispatcher {
    #[must_use]
    pub fn new(backend: Arc<dyn ToolBackend>) -> Self {
        Self { backend }
    }

    /// Handle one request. Never fails: every problem becomes an error envelope carrying the
    /// request's `id`, including a panic while handling it.
    pub async fn dispatch(&self, call: CallEnvelope) -> ResultEnvelope {
        let id = call.id.clone();
        let method = call.method.clone();
        debug!(method = %method, id = %id, "request received");

        let outcome = match AssertUnwindSafe(self.route(call)).catch_unwind().await {
            Ok(outcome) => outcome,
            Err(panic) => {
                error!(method = %method, panic = %panic_message(panic.as_ref()), "request handler panicked");
                Outcome::Error(ErrorObject::new(ErrorCode::INTERNAL_ERROR, "Internal error"))
            }
        };

        match outcome {
            Outcome::Result(result) => ResultEnvelope::success(id, result),
            Outcome::Error(error) => {
                warn!(method = %method, id = %id, code = error.code, message = %error.message, "request failed");
                ResultEnvelope::failure(id, error)
            }
        }
    }

    async fn route(&self, call: CallEnvelope) -> Outcome {
        match call.method.as_str() {
            "initialize" => Outcome::Result(initialize_result()),
            "tools/list" => Outcome::Result(json!({ "tools": self.backend.list_tools() })),
            "tools/call" => self.call_tool(call.params).await,
            _ => Outcome::Error(ErrorObject::new(ErrorCode::METHOD_NOT_FOUND, "Method not found")),
        }
    }

    async fn call_tool(&self, params: Option<Value>) -> Outcome {
        let (name, arguments) = match parse_call_params(params) {
            Ok(parsed) => parsed,
            Err(e) => return Outcome::Error(e),
        };

        match self.backend.call_tool(&name, arguments).await {
            Ok(result) => match serde_json::to_value(&result) {
                Ok(v) => Outcome::Result(v),
                Err(e) => Outcome::Error(ErrorObject::new(ErrorCode::INTERNAL_ERROR, e.to_string())),
            },
            Err(OpenApiToolsError::ToolNotFound(_)) => {
                Outcome::Error(ErrorObject::new(ErrorCode::INVALID_PARAMS, "Tool not found"))
            }
            Err(e) => Outcome::Error(ErrorObject::new(ErrorCode::INTERNAL_ERROR, e.to_string())),
        }
    }
}

/// Fixed capability/version descriptor.
#[must_use]
pub fn initialize_result() -> Value {
    json!({
        "protocolVersion": PROTOCOL_VERSION,
        "capabilities": { "tools": {} },
        "serverInfo": { "name": SERVER_NAME, "version": SERVER_VERSION }
    })
}

/// `params` must be an object with a string `name`; `arguments` may be an object, `null` or
/// absent.
fn parse_call_params(params: Option<Value>) -> Result<(String, JsonObject), ErrorObject> {
    let invalid = || ErrorObject::new(ErrorCode::INVALID_PARAMS, "Invalid params");

    let Some(Value::Object(mut params)) = params else {
        return Err(invalid());
    };
    let Some(Value::String(name)) = params.remove("name") else {
        return Err(ErrorObject::new(ErrorCode::INVALID_PARAMS, "Missing tool name"));
    };
    let arguments = match params.remove("arguments") {
        None | Some(Value::Null) => JsonObject::new(),
        Some(Value::Object(args)) => args,
        Some(_) => return Err(invalid()),
    };
    Ok((name, arguments))
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
