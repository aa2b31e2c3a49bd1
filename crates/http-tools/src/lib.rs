//! Upstream HTTP plumbing shared by the `OpenAPI` tool source.
//!
//! This crate knows nothing about `OpenAPI` documents. It takes an already-bound request
//! (method, path, query, headers, body), applies the configured header and auth policy, sends it
//! through one pooled client, and normalizes whatever comes back.

pub mod config;
pub mod runtime;
pub mod safety;
pub mod semantics;
