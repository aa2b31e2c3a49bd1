//! `OpenAPI` → MCP tool translation.
//!
//! Startup runs strictly in this order, once:
//! 1. [`document::parse`] turns JSON/YAML bytes into a validated [`document::Document`]
//! 2. [`catalog::flatten`] lists every (path, verb, operation) with a resolved identifier
//! 3. [`generator::generate`] derives one MCP tool per catalog entry
//!
//! At call time [`binder::bind_request`] maps tool arguments onto an upstream request, which
//! `oas-mcp-http-tools` executes. [`runtime::OpenApiToolSource`] ties the steps together.

pub mod binder;
pub mod catalog;
pub mod document;
pub mod error;
pub mod generator;
mod resolver;
pub mod runtime;
