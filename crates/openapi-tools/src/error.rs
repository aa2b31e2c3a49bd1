//! Error types for `oas-mcp-openapi-tools`.

use crate::document::DocumentFormat;
use oas_mcp_http_tools::runtime::HttpToolsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpenApiToolsError {
    #[error("failed to read document '{path}': {source}")]
    DocumentRead {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The bytes are not valid JSON or YAML (whichever the format heuristic picked).
    #[error("failed to parse document as {format}: {message}")]
    DocumentParse {
        format: DocumentFormat,
        message: String,
    },

    /// Decoded, but structurally incomplete. The message names what is missing.
    #[error("invalid document: {0}")]
    InvalidDocument(String),

    #[error("duplicate tool name '{name}' ({first} and {second})")]
    DuplicateToolName {
        name: String,
        first: String,
        second: String,
    },

    #[error("Tool not found: {0}")]
    ToolNotFound(String),

    #[error(transparent)]
    Http(#[from] HttpToolsError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, OpenApiToolsError>;
