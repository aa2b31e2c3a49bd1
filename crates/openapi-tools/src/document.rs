//! In-memory `OpenAPI` 3.x / Swagger 2.0 document model and its parser.
//!
//! The model keeps only what tool generation and request binding need. Decoding is lenient:
//! unknown fields are ignored, parameter types may be missing, and unresolvable `$ref`s are
//! skipped with a warning. Structural completeness (version, `info.title`, `info.version`, at
//! least one path) is checked before anything else is built.

use crate::error::{OpenApiToolsError, Result};
use crate::resolver::LocalResolver;
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use tracing::warn;

/// HTTP verbs an [`PathItem`] can bind, ordered the way operations are enumerated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HttpVerb {
    Get,
    Post,
    Put,
    Delete,
    Options,
    Head,
    Patch,
    Trace,
}

impl HttpVerb {
    pub const ALL: [HttpVerb; 8] = [
        HttpVerb::Get,
        HttpVerb::Post,
        HttpVerb::Put,
        HttpVerb::Delete,
        HttpVerb::Options,
        HttpVerb::Head,
        HttpVerb::Patch,
        HttpVerb::Trace,
    ];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            HttpVerb::Get => "GET",
            HttpVerb::Post => "POST",
            HttpVerb::Put => "PUT",
            HttpVerb::Delete => "DELETE",
            HttpVerb::Options => "OPTIONS",
            HttpVerb::Head => "HEAD",
            HttpVerb::Patch => "PATCH",
            HttpVerb::Trace => "TRACE",
        }
    }

    /// Key of this verb inside a path item object.
    #[must_use]
    pub fn key(self) -> &'static str {
        match self {
            HttpVerb::Get => "get",
            HttpVerb::Post => "post",
            HttpVerb::Put => "put",
            HttpVerb::Delete => "delete",
            HttpVerb::Options => "options",
            HttpVerb::Head => "head",
            HttpVerb::Patch => "patch",
            HttpVerb::Trace => "trace",
        }
    }

    #[must_use]
    pub fn method(self) -> reqwest::Method {
        match self {
            HttpVerb::Get => reqwest::Method::GET,
            HttpVerb::Post => reqwest::Method::POST,
            HttpVerb::Put => reqwest::Method::PUT,
            HttpVerb::Delete => reqwest::Method::DELETE,
            HttpVerb::Options => reqwest::Method::OPTIONS,
            HttpVerb::Head => reqwest::Method::HEAD,
            HttpVerb::Patch => reqwest::Method::PATCH,
            HttpVerb::Trace => reqwest::Method::TRACE,
        }
    }
}

impl fmt::Display for HttpVerb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Json,
    Yaml,
}

impl DocumentFormat {
    /// JSON when the hint ends in `.json` (any case) or the trimmed content starts with `{`,
    /// YAML otherwise.
    #[must_use]
    pub fn detect(bytes: &[u8], filename_hint: &str) -> Self {
        if filename_hint.to_ascii_lowercase().ends_with(".json")
            || bytes.trim_ascii_start().starts_with(b"{")
        {
            DocumentFormat::Json
        } else {
            DocumentFormat::Yaml
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentFormat::Json => f.write_str("JSON"),
            DocumentFormat::Yaml => f.write_str("YAML"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecVersion {
    /// `openapi: 3.x`
    OpenApi(String),
    /// `swagger: "2.0"`
    Swagger(String),
}

impl SpecVersion {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            SpecVersion::OpenApi(v) | SpecVersion::Swagger(v) => v,
        }
    }

    #[must_use]
    pub fn is_swagger(&self) -> bool {
        matches!(self, SpecVersion::Swagger(_))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Info {
    pub title: String,
    pub version: String,
    pub description: Option<String>,
}

/// Security requirement object: scheme name → scopes.
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

#[derive(Debug, Clone)]
pub struct Document {
    pub version: SpecVersion,
    pub info: Info,
    pub paths: BTreeMap<String, PathItem>,
    pub components: Components,
    pub security: Vec<SecurityRequirement>,
}

#[derive(Debug, Clone, Default)]
pub struct Components {
    /// `components.schemas` (3.x) or `definitions` (2.0).
    pub schemas: BTreeMap<String, Schema>,
}

/// The operations bound under one path. Verbs without an operation are absent.
#[derive(Debug, Clone, Default)]
pub struct PathItem {
    pub operations: BTreeMap<HttpVerb, Arc<Operation>>,
}

impl PathItem {
    #[must_use]
    pub fn get(&self, verb: HttpVerb) -> Option<&Arc<Operation>> {
        self.operations.get(&verb)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Operation {
    pub operation_id: Option<String>,
    pub summary: Option<String>,
    pub description: Option<String>,
    /// Effective parameters: path-item level first, then operation level, with an
    /// operation-level entry replacing a path-level one of the same name and location.
    pub parameters: Vec<Parameter>,
    pub request_body: Option<RequestBody>,
    pub responses: BTreeMap<String, Response>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterLocation {
    Query,
    Header,
    Path,
    Cookie,
    /// Swagger 2.0 `formData`.
    FormData,
}

impl ParameterLocation {
    fn from_in(value: &str) -> Option<Self> {
        match value {
            "query" => Some(ParameterLocation::Query),
            "header" => Some(ParameterLocation::Header),
            "path" => Some(ParameterLocation::Path),
            "cookie" => Some(ParameterLocation::Cookie),
            "formData" => Some(ParameterLocation::FormData),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub location: ParameterLocation,
    pub required: bool,
    pub description: Option<String>,
    pub schema: Option<Schema>,
    pub example: Option<Value>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestBody {
    pub description: Option<String>,
    pub required: bool,
    /// Schema of the `application/json` content, else of the first declared content type.
    pub schema: Option<Schema>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Response {
    pub description: Option<String>,
}

/// Simplified JSON Schema: enough to type tool inputs, not to validate them.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct Schema {
    /// Set when this schema is a reference that was not (or could not be) resolved.
    #[serde(rename = "$ref")]
    pub reference: Option<String>,
    #[serde(rename = "type", deserialize_with = "de_schema_type")]
    pub schema_type: Option<String>,
    pub format: Option<String>,
    pub description: Option<String>,
    pub properties: BTreeMap<String, Schema>,
    pub items: Option<Box<Schema>>,
    #[serde(deserialize_with = "de_string_list")]
    pub required: Vec<String>,
    #[serde(rename = "enum")]
    pub enum_values: Vec<Value>,
    pub example: Option<Value>,
    pub default: Option<Value>,
}

impl Schema {
    fn is_empty(&self) -> bool {
        *self == Schema::default()
    }
}

/// 3.1 allows `type: [string, "null"]`; take the first non-null entry.
fn de_schema_type<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::String(s) => Some(s),
        Value::Array(items) => items
            .iter()
            .filter_map(Value::as_str)
            .find(|t| *t != "null")
            .map(str::to_string),
        _ => None,
    })
}

fn de_string_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Value::deserialize(deserializer)? {
        Value::Array(items) => items
            .into_iter()
            .filter_map(|v| match v {
                Value::String(s) => Some(s),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    })
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawOperation {
    #[serde(rename = "operationId")]
    operation_id: Option<String>,
    summary: Option<String>,
    description: Option<String>,
    parameters: Vec<Value>,
    #[serde(rename = "requestBody")]
    request_body: Option<Value>,
    responses: Map<String, Value>,
}

#[derive(Deserialize)]
struct RawParameter {
    name: String,
    #[serde(rename = "in")]
    location: String,
    #[serde(default)]
    required: bool,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    schema: Option<Schema>,
    #[serde(default)]
    example: Option<Value>,
    /// Swagger 2.0 puts `type`/`format`/`items`/`enum` on the parameter itself.
    #[serde(flatten)]
    inline: Schema,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawRequestBody {
    description: Option<String>,
    required: bool,
    content: BTreeMap<String, RawMediaType>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawMediaType {
    schema: Option<Schema>,
}

#[derive(Deserialize, Default)]
#[serde(default)]
struct RawResponse {
    description: Option<String>,
}

enum BoundParameter {
    Param(Parameter),
    /// Swagger 2.0 `in: body`.
    Body(RequestBody),
}

/// Parse `bytes` as an `OpenAPI` or Swagger document.
///
/// `filename_hint` only takes part in the format decision (see [`DocumentFormat::detect`]).
///
/// # Errors
///
/// Returns [`OpenApiToolsError::DocumentParse`] if the bytes do not decode, and
/// [`OpenApiToolsError::InvalidDocument`] if the version marker, `info.title`, `info.version`
/// or every path is missing, or an operation object is malformed.
pub fn parse(bytes: &[u8], filename_hint: &str) -> Result<Document> {
    let format = DocumentFormat::detect(bytes, filename_hint);
    let root = decode(bytes, format)?;
    Document::from_value(&root)
}

/// Raw bytes of the document at `path`, ready for [`parse`].
///
/// # Errors
///
/// Returns [`OpenApiToolsError::DocumentRead`] if the file cannot be read.
pub fn read_document(path: &Path) -> Result<Vec<u8>> {
    std::fs::read(path).map_err(|source| OpenApiToolsError::DocumentRead {
        path: path.display().to_string(),
        source,
    })
}

fn decode(bytes: &[u8], format: DocumentFormat) -> Result<Value> {
    match format {
        DocumentFormat::Json => {
            serde_json::from_slice(bytes).map_err(|e| OpenApiToolsError::DocumentParse {
                format,
                message: e.to_string(),
            })
        }
        DocumentFormat::Yaml => serde_yaml::from_slice::<serde_yaml::Value>(bytes)
            .map(yaml_to_json)
            .map_err(|e| OpenApiToolsError::DocumentParse {
                format,
                message: e.to_string(),
            }),
    }
}

/// YAML allows non-string mapping keys (`200:` under `responses`); JSON objects do not.
fn yaml_to_json(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::from(i)
            } else if let Some(u) = n.as_u64() {
                Value::from(u)
            } else {
                n.as_f64()
                    .and_then(serde_json::Number::from_f64)
                    .map_or(Value::Null, Value::Number)
            }
        }
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(seq) => Value::Array(seq.into_iter().map(yaml_to_json).collect()),
        Yaml::Mapping(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (yaml_key(k), yaml_to_json(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => yaml_to_json(tagged.value),
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    match key {
        serde_yaml::Value::String(s) => s,
        serde_yaml::Value::Number(n) => n.to_string(),
        serde_yaml::Value::Bool(b) => b.to_string(),
        serde_yaml::Value::Null => "null".to_string(),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

/// Version numbers and titles are sometimes unquoted in YAML (`version: 1.0`).
fn scalar_string(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn invalid(message: impl Into<String>) -> OpenApiToolsError {
    OpenApiToolsError::InvalidDocument(message.into())
}

impl Document {
    fn from_value(root: &Value) -> Result<Self> {
        let version = if let Some(v) = scalar_string(root.get("openapi")) {
            SpecVersion::OpenApi(v)
        } else if let Some(v) = scalar_string(root.get("swagger")) {
            SpecVersion::Swagger(v)
        } else {
            return Err(invalid("missing OpenAPI/Swagger version"));
        };

        let info = root.get("info");
        let title = scalar_string(info.and_then(|i| i.get("title")))
            .ok_or_else(|| invalid("missing info.title"))?;
        let info_version = scalar_string(info.and_then(|i| i.get("version")))
            .ok_or_else(|| invalid("missing info.version"))?;
        let info = Info {
            title,
            version: info_version,
            description: info
                .and_then(|i| i.get("description"))
                .and_then(Value::as_str)
                .map(str::to_string),
        };

        let raw_paths = root
            .get("paths")
            .and_then(Value::as_object)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| invalid("no paths defined"))?;

        let resolver = LocalResolver::new(root);
        let mut paths = BTreeMap::new();
        for (path, item) in raw_paths {
            let item = match resolver.resolve(item) {
                Ok(item) => item,
                Err(e) => {
                    warn!(path = %path, error = %e, "skipping path item");
                    continue;
                }
            };
            paths.insert(path.clone(), build_path_item(&resolver, path, item)?);
        }

        Ok(Document {
            version,
            info,
            paths,
            components: build_components(root),
            security: build_security(root),
        })
    }

    /// Number of (path, verb) pairs that carry an operation.
    #[must_use]
    pub fn operation_count(&self) -> usize {
        self.paths.values().map(|p| p.operations.len()).sum()
    }
}

fn build_path_item(resolver: &LocalResolver<'_>, path: &str, item: &Value) -> Result<PathItem> {
    let shared: &[Value] = item
        .get("parameters")
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or_default();

    let mut operations = BTreeMap::new();
    for verb in HttpVerb::ALL {
        let Some(raw) = item.get(verb.key()).filter(|v| !v.is_null()) else {
            continue;
        };
        let operation = build_operation(resolver, verb, path, raw, shared)?;
        operations.insert(verb, Arc::new(operation));
    }
    Ok(PathItem { operations })
}

fn build_operation(
    resolver: &LocalResolver<'_>,
    verb: HttpVerb,
    path: &str,
    raw: &Value,
    shared: &[Value],
) -> Result<Operation> {
    let raw: RawOperation = serde_json::from_value(raw.clone())
        .map_err(|e| invalid(format!("{verb} {path}: {e}")))?;

    let mut parameters: Vec<Parameter> = Vec::new();
    let mut request_body = None;

    for value in shared.iter().chain(raw.parameters.iter()) {
        match build_parameter(resolver, value) {
            Ok(BoundParameter::Param(p)) => {
                if let Some(existing) = parameters
                    .iter_mut()
                    .find(|e| e.name == p.name && e.location == p.location)
                {
                    *existing = p;
                } else {
                    parameters.push(p);
                }
            }
            Ok(BoundParameter::Body(body)) => request_body = Some(body),
            Err(e) => warn!(method = %verb, path = %path, error = %e, "skipping parameter"),
        }
    }

    if let Some(body) = &raw.request_body {
        match build_request_body(resolver, body) {
            Ok(body) => request_body = Some(body),
            Err(e) => warn!(method = %verb, path = %path, error = %e, "skipping request body"),
        }
    }

    let mut responses = BTreeMap::new();
    for (status, value) in &raw.responses {
        let resolved = resolver
            .resolve(value)
            .and_then(|v| serde_json::from_value::<RawResponse>(v.clone()).map_err(Into::into));
        match resolved {
            Ok(r) => {
                responses.insert(
                    status.clone(),
                    Response {
                        description: r.description,
                    },
                );
            }
            Err(e) => warn!(method = %verb, path = %path, status = %status, error = %e, "skipping response"),
        }
    }

    Ok(Operation {
        operation_id: raw.operation_id,
        summary: raw.summary,
        description: raw.description,
        parameters,
        request_body,
        responses,
    })
}

fn build_parameter(resolver: &LocalResolver<'_>, value: &Value) -> Result<BoundParameter> {
    let value = resolver.resolve(value)?;
    let raw: RawParameter = serde_json::from_value(value.clone())?;

    let schema = match raw.schema {
        Some(schema) => Some(schema),
        None if !raw.inline.is_empty() => Some(raw.inline),
        None => None,
    };
    let schema = match schema.map(|s| resolver.schema(s)).transpose() {
        Ok(schema) => schema,
        Err(e) => {
            warn!(parameter = %raw.name, error = %e, "ignoring parameter schema");
            None
        }
    };

    if raw.location == "body" {
        return Ok(BoundParameter::Body(RequestBody {
            description: raw.description,
            required: raw.required,
            schema,
        }));
    }

    let location = ParameterLocation::from_in(&raw.location).ok_or_else(|| {
        invalid(format!(
            "parameter '{}' has unknown location '{}'",
            raw.name, raw.location
        ))
    })?;

    Ok(BoundParameter::Param(Parameter {
        name: raw.name,
        location,
        required: raw.required,
        description: raw.description,
        schema,
        example: raw.example,
    }))
}

fn build_request_body(resolver: &LocalResolver<'_>, value: &Value) -> Result<RequestBody> {
    let value = resolver.resolve(value)?;
    let mut raw: RawRequestBody = serde_json::from_value(value.clone())?;

    let schema = raw
        .content
        .remove("application/json")
        .and_then(|m| m.schema)
        .or_else(|| raw.content.into_values().find_map(|m| m.schema));
    let schema = match schema.map(|s| resolver.schema(s)).transpose() {
        Ok(schema) => schema,
        Err(e) => {
            warn!(error = %e, "ignoring request body schema");
            None
        }
    };

    Ok(RequestBody {
        description: raw.description,
        required: raw.required,
        schema,
    })
}

fn build_components(root: &Value) -> Components {
    let raw = root
        .pointer("/components/schemas")
        .or_else(|| root.get("definitions"))
        .and_then(Value::as_object);

    let mut schemas = BTreeMap::new();
    for (name, value) in raw.into_iter().flatten() {
        match serde_json::from_value::<Schema>(value.clone()) {
            Ok(schema) => {
                schemas.insert(name.clone(), schema);
            }
            Err(e) => warn!(schema = %name, error = %e, "skipping component schema"),
        }
    }
    Components { schemas }
}

fn build_security(root: &Value) -> Vec<SecurityRequirement> {
    let Some(raw) = root.get("security") else {
        return Vec::new();
    };
    serde_json::from_value(raw.clone()).unwrap_or_else(|e| {
        warn!(error = %e, "ignoring malformed global security requirements");
        Vec::new()
    })
}
