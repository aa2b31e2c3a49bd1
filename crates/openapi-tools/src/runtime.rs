//! The `OpenAPI` tool source: document → catalog → upstream calls.

use crate::binder::bind_request;
use crate::catalog::flatten;
use crate::document::{parse, read_document};
use crate::error::{OpenApiToolsError, Result};
use crate::generator::{ToolCatalog, generate};
use oas_mcp_http_tools::runtime::{UpstreamClient, UpstreamResponse};
use rmcp::model::{CallToolResult, Content, JsonObject, Tool};
use sha2::{Digest as _, Sha256};
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Tools generated from one document, executed through one shared upstream client.
///
/// Cheap to clone; the catalog is immutable after construction.
#[derive(Clone)]
pub struct OpenApiToolSource {
    inner: Arc<Inner>,
}

struct Inner {
    source: String,
    sha256: String,
    catalog: ToolCatalog,
    client: UpstreamClient,
}

impl OpenApiToolSource {
    /// Load the document at `path` and generate its tools.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, the document is invalid, or two operations
    /// resolve to the same tool name.
    pub fn from_file(path: &Path, client: UpstreamClient) -> Result<Self> {
        let bytes = read_document(path)?;
        Self::from_bytes(&bytes, &path.display().to_string(), client)
    }

    /// Like [`OpenApiToolSource::from_file`], for bytes already in memory. `source` is used as
    /// the format hint and reported as the document location.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is invalid or two operations share a tool name.
    pub fn from_bytes(bytes: &[u8], source: &str, client: UpstreamClient) -> Result<Self> {
        let sha256 = hex::encode(Sha256::digest(bytes));
        let doc = parse(bytes, source)?;
        let catalog = generate(flatten(&doc))?;

        info!(
            source = %source,
            sha256 = %sha256,
            title = %doc.info.title,
            version = %doc.info.version,
            spec_version = %doc.version.as_str(),
            tools = catalog.len(),
            "generated tool catalog"
        );

        Ok(Self {
            inner: Arc::new(Inner {
                source: source.to_string(),
                sha256,
                catalog,
                client,
            }),
        })
    }

    /// Where the document was loaded from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.inner.source
    }

    /// Hex SHA-256 of the raw document bytes.
    #[must_use]
    pub fn sha256(&self) -> &str {
        &self.inner.sha256
    }

    #[must_use]
    pub fn tools_count(&self) -> usize {
        self.inner.catalog.len()
    }

    #[must_use]
    pub fn list_tools(&self) -> Vec<Tool> {
        self.inner.catalog.list_tools()
    }

    /// Bind `arguments`, call upstream, and format the reply as one text block.
    ///
    /// A non-2xx upstream status is still a formatted result, flagged with `is_error`.
    ///
    /// # Errors
    ///
    /// Returns [`OpenApiToolsError::ToolNotFound`] for unknown names, and
    /// [`OpenApiToolsError::Http`] if the upstream call cannot be built, fails, or times out.
    pub async fn call_tool(&self, name: &str, arguments: JsonObject) -> Result<CallToolResult> {
        let tool = self
            .inner
            .catalog
            .get(name)
            .ok_or_else(|| OpenApiToolsError::ToolNotFound(name.to_string()))?;

        let request = bind_request(tool, &arguments);
        debug!(tool = %name, method = %request.method, path = %request.path, "executing tool");

        let response = self
            .inner
            .client
            .execute(&request)
            .await
            .inspect_err(|e| error!(tool = %name, error = %e, "upstream call failed"))?;

        format_result(&response)
    }
}

/// Pretty-printed `{status_code, headers, body}` as a single text block.
///
/// # Errors
///
/// Returns [`OpenApiToolsError::Json`] if the response cannot be serialized.
pub fn format_result(response: &UpstreamResponse) -> Result<CallToolResult> {
    let text = serde_json::to_string_pretty(response)?;
    let content = vec![Content::text(text)];
    Ok(if response.is_success() {
        CallToolResult::success(content)
    } else {
        CallToolResult::error(content)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use oas_mcp_http_tools::config::{AuthConfig, AuthType, UpstreamConfig};
    use oas_mcp_test_support::spawn_echo_upstream;
    use serde_json::{Value, json};
    use sha2::Digest as _;

    const DOC: &str = r#"
openapi: 3.0.0
info:
  title: Echo
  version: "1.0"
paths:
  /pets/{id}:
    get:
      parameters:
        - name: id
          in: path
          required: true
        - name: verbose
          in: query
  /pets:
    post:
      operationId: createPet
      requestBody:
        required: true
        content:
          application/json: {}
  /status/{code}:
    get:
      operationId: status
      parameters:
        - name: code
          in: path
          required: true
"#;

    fn client(base_url: &str, auth: AuthConfig) -> UpstreamClient {
        let cfg = UpstreamConfig {
            base_url: base_url.to_string(),
            timeout: 5,
        };
        UpstreamClient::new(&cfg, auth).expect("client")
    }

    fn result_json(result: &CallToolResult) -> Value {
        let text = result.content[0]
            .as_text()
            .map(|t| t.text.clone())
            .expect("text content");
        serde_json::from_str(&text).expect("json")
    }

    fn args(v: Value) -> JsonObject {
        v.as_object().cloned().expect("object")
    }

    #[test]
    fn from_file_records_source_and_fingerprint() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("api.yaml");
        std::fs::write(&path, DOC).expect("write");

        let source =
            OpenApiToolSource::from_file(&path, client("http://localhost", AuthConfig::default()))
                .expect("source");
        assert_eq!(source.source(), path.display().to_string());
        assert_eq!(source.sha256(), hex::encode(Sha256::digest(DOC.as_bytes())));
        assert_eq!(source.sha256().len(), 64);
        assert_eq!(source.tools_count(), 3);
        assert_eq!(source.list_tools().len(), 3);
    }

    #[test]
    fn from_file_reports_missing_file() {
        let err = OpenApiToolSource::from_file(
            Path::new("/definitely/not/here.json"),
            client("http://localhost", AuthConfig::default()),
        )
        .err()
        .expect("error");
        assert!(matches!(err, OpenApiToolsError::DocumentRead { .. }));
    }

    #[tokio::test]
    async fn call_tool_forwards_and_formats() {
        let upstream = spawn_echo_upstream().await.expect("upstream");
        let auth = AuthConfig {
            auth_type: AuthType::Bearer,
            token: "t0k".to_string(),
            ..AuthConfig::default()
        };
        let source = OpenApiToolSource::from_bytes(
            DOC.as_bytes(),
            "api.yaml",
            client(&upstream.base_url, auth),
        )
        .expect("source");

        let result = source
            .call_tool("get_pets_id", args(json!({"id": "7"})))
            .await
            .expect("call");
        assert_eq!(result.is_error, Some(false));
        let formatted = result_json(&result);
        assert_eq!(formatted["status_code"], 200);
        assert_eq!(formatted["headers"]["content-type"], "application/json");
        assert_eq!(formatted["body"]["path"], "/pets/7");
        assert_eq!(formatted["body"]["query"], "");
        assert_eq!(formatted["body"]["headers"]["authorization"], json!(["Bearer t0k"]));
        assert_eq!(formatted["body"]["headers"]["user-agent"], json!(["oas-mcp/1.0"]));

        let created = source
            .call_tool("createPet", args(json!({"body": {"name": "rex"}})))
            .await
            .expect("call");
        let formatted = result_json(&created);
        assert_eq!(formatted["body"]["method"], "POST");
        assert_eq!(formatted["body"]["body"], r#"{"name":"rex"}"#);
    }

    #[tokio::test]
    async fn non_success_status_is_flagged() {
        let upstream = spawn_echo_upstream().await.expect("upstream");
        let source = OpenApiToolSource::from_bytes(
            DOC.as_bytes(),
            "api.yaml",
            client(&upstream.base_url, AuthConfig::default()),
        )
        .expect("source");

        let result = source
            .call_tool("status", args(json!({"code": 503})))
            .await
            .expect("call");
        assert_eq!(result.is_error, Some(true));
        let formatted = result_json(&result);
        assert_eq!(formatted["status_code"], 503);
        assert_eq!(formatted["body"], json!({"status": 503}));
    }

    #[tokio::test]
    async fn unknown_tool_and_transport_failure_are_errors() {
        let port = oas_mcp_test_support::pick_unused_port().expect("port");
        let source = OpenApiToolSource::from_bytes(
            DOC.as_bytes(),
            "api.yaml",
            client(&format!("http://127.0.0.1:{port}"), AuthConfig::default()),
        )
        .expect("source");

        let err = source.call_tool("missing", JsonObject::new()).await.unwrap_err();
        assert!(matches!(err, OpenApiToolsError::ToolNotFound(_)));

        let err = source
            .call_tool("get_pets_id", args(json!({"id": "1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, OpenApiToolsError::Http(_)), "{err}");
    }
}
