//! Derive MCP tools from catalog entries.

use crate::catalog::OperationInfo;
use crate::document::{Operation, Parameter, Schema};
use crate::error::{OpenApiToolsError, Result};
use oas_mcp_http_tools::semantics::annotations_for_method;
use rmcp::model::{JsonObject, Tool};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::warn;

/// Name of the input property carrying the request body.
pub const BODY_ARGUMENT: &str = "body";

/// A tool plus the operation it calls. The operation is never serialized to callers.
#[derive(Debug, Clone)]
pub struct GeneratedTool {
    pub name: String,
    pub description: String,
    pub input_schema: Arc<JsonObject>,
    pub operation: OperationInfo,
}

impl GeneratedTool {
    /// The MCP view of this tool, with annotations from its HTTP verb.
    #[must_use]
    pub fn to_tool(&self) -> Tool {
        let mut tool = Tool::new(
            self.name.clone(),
            self.description.clone(),
            Arc::clone(&self.input_schema),
        );
        tool.annotations = Some(annotations_for_method(&self.operation.verb.method()));
        tool
    }
}

/// Immutable name → tool lookup that preserves catalog order.
#[derive(Debug, Default)]
pub struct ToolCatalog {
    tools: Vec<GeneratedTool>,
    index: HashMap<String, usize>,
}

impl ToolCatalog {
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&GeneratedTool> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &GeneratedTool> {
        self.tools.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.tools.iter().map(GeneratedTool::to_tool).collect()
    }
}

/// Build one tool per catalog entry.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::DuplicateToolName`] if two entries resolve to the same name.
pub fn generate(operations: Vec<OperationInfo>) -> Result<ToolCatalog> {
    let mut catalog = ToolCatalog {
        tools: Vec::with_capacity(operations.len()),
        index: HashMap::with_capacity(operations.len()),
    };

    for info in operations {
        let name = info.operation_id.clone();
        if let Some(&existing) = catalog.index.get(&name) {
            return Err(OpenApiToolsError::DuplicateToolName {
                name,
                first: catalog.tools[existing].operation.label(),
                second: info.label(),
            });
        }

        let tool = GeneratedTool {
            description: describe(&info),
            input_schema: Arc::new(build_input_schema(&info.operation)),
            name: name.clone(),
            operation: info,
        };
        catalog.index.insert(name, catalog.tools.len());
        catalog.tools.push(tool);
    }

    Ok(catalog)
}

/// First non-empty of description, summary, `VERB path`.
#[must_use]
pub fn describe(info: &OperationInfo) -> String {
    let op = &info.operation;
    [op.description.as_deref(), op.summary.as_deref()]
        .into_iter()
        .flatten()
        .find(|s| !s.trim().is_empty())
        .map_or_else(|| info.label(), str::to_string)
}

/// Object schema with one property per parameter, plus `body` when a request body is declared.
#[must_use]
pub fn build_input_schema(op: &Operation) -> JsonObject {
    let mut properties = JsonObject::new();
    let mut required: Vec<Value> = Vec::new();

    for param in &op.parameters {
        properties.insert(param.name.clone(), parameter_property(param));
        if param.required && !required.iter().any(|r| r == param.name.as_str()) {
            required.push(Value::String(param.name.clone()));
        }
    }

    if let Some(body) = &op.request_body {
        let mut prop = JsonObject::new();
        prop.insert("type".to_string(), json!("object"));
        if let Some(desc) = body.description.as_deref().filter(|d| !d.is_empty()) {
            prop.insert("description".to_string(), json!(desc));
        }
        if properties
            .insert(BODY_ARGUMENT.to_string(), Value::Object(prop))
            .is_some()
        {
            warn!("parameter named '{BODY_ARGUMENT}' is shadowed by the request body");
        }
        if body.required && !required.iter().any(|r| r == BODY_ARGUMENT) {
            required.push(json!(BODY_ARGUMENT));
        }
    }

    let mut schema = JsonObject::new();
    schema.insert("type".to_string(), json!("object"));
    schema.insert("properties".to_string(), Value::Object(properties));
    if !required.is_empty() {
        schema.insert("required".to_string(), Value::Array(required));
    }
    schema
}

fn parameter_property(param: &Parameter) -> Value {
    let schema = param.schema.as_ref();
    let mut prop = type_hint(schema);

    if let Some(desc) = param.description.as_deref().filter(|d| !d.is_empty()) {
        prop.insert("description".to_string(), json!(desc));
    }
    if let Some(items) = schema.and_then(|s| s.items.as_deref()) {
        prop.insert("items".to_string(), Value::Object(type_hint(Some(items))));
    }
    if let Some(example) = param
        .example
        .as_ref()
        .or_else(|| schema.and_then(|s| s.example.as_ref()))
    {
        prop.insert("example".to_string(), example.clone());
    }
    if let Some(default) = schema.and_then(|s| s.default.as_ref()) {
        prop.insert("default".to_string(), default.clone());
    }
    Value::Object(prop)
}

/// `type` (defaulting to `string`), plus `format` and `enum` when present.
fn type_hint(schema: Option<&Schema>) -> JsonObject {
    let mut out = JsonObject::new();
    let ty = schema
        .and_then(|s| s.schema_type.as_deref())
        .unwrap_or("string");
    out.insert("type".to_string(), json!(ty));
    if let Some(format) = schema.and_then(|s| s.format.as_deref()) {
        out.insert("format".to_string(), json!(format));
    }
    if let Some(values) = schema.map(|s| &s.enum_values).filter(|v| !v.is_empty()) {
        out.insert("enum".to_string(), Value::Array(values.clone()));
    }
    out
}
