//! Map tool-call arguments onto an upstream request.
//!
//! Binding is not validation: declared-but-missing arguments (even required ones) are simply not
//! sent, and undeclared arguments are ignored.

use crate::document::ParameterLocation;
use crate::generator::{BODY_ARGUMENT, GeneratedTool};
use oas_mcp_http_tools::runtime::{UpstreamRequest, value_to_string};
use rmcp::model::JsonObject;

/// Bind `arguments` to `tool`'s operation, in parameter declaration order.
///
/// - `query` → appended to the query
/// - `header` → added to the caller headers
/// - `path` → `{name}` replaced in the path template, unescaped
/// - `cookie` / `formData` → not sent
///
/// `arguments["body"]` becomes the JSON body only if the operation declares a request body and
/// the value is not `null`.
#[must_use]
pub fn bind_request(tool: &GeneratedTool, arguments: &JsonObject) -> UpstreamRequest {
    let info = &tool.operation;
    let mut req = UpstreamRequest::new(info.verb.method(), info.path.clone());

    for param in &info.operation.parameters {
        let Some(value) = arguments.get(&param.name) else {
            continue;
        };
        let rendered = value_to_string(value);
        match param.location {
            ParameterLocation::Query => req.query.push((param.name.clone(), rendered)),
            ParameterLocation::Header => req.headers.push((param.name.clone(), rendered)),
            ParameterLocation::Path => {
                req.path = req.path.replace(&format!("{{{}}}", param.name), &rendered);
            }
            ParameterLocation::Cookie | ParameterLocation::FormData => {}
        }
    }

    if info.operation.request_body.is_some()
        && let Some(body) = arguments.get(BODY_ARGUMENT).filter(|v| !v.is_null())
    {
        req.body = Some(body.clone());
    }

    req
}
