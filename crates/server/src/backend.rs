//! The tool capability the dispatcher routes `tools/*` calls to.
//!
//! NOTE: catalog building and upstream execution live in `oas-mcp-openapi-tools`. This trait is
//! the seam that lets the dispatcher be exercised without a document or an upstream.

use async_trait::async_trait;
use oas_mcp_openapi_tools::error::OpenApiToolsError;
use oas_mcp_openapi_tools::runtime::OpenApiToolSource;
use rmcp::model::{CallToolResult, JsonObject, Tool};

#[async_trait]
pub trait ToolBackend: Send + Sync {
    /// The full catalog, in catalog order.
    fn list_tools(&self) -> Vec<Tool>;

    /// Execute `name` with `arguments`.
    ///
    /// Unknown names must fail with [`OpenApiToolsError::ToolNotFound`].
    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<CallToolResult, OpenApiToolsError>;
}

#[async_trait]
impl ToolBackend for OpenApiToolSource {
    fn list_tools(&self) -> Vec<Tool> {
        OpenApiToolSource::list_tools(self)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: JsonObject,
    ) -> Result<CallToolResult, OpenApiToolsError> {
        OpenApiToolSource::call_tool(self, name, arguments).await
    }
}
