//! Flatten a [`Document`] into an ordered list of callable operations.

use crate::document::{Document, HttpVerb, Operation};
use std::sync::Arc;

/// One (path, verb, operation) triple with its resolved identifier.
#[derive(Debug, Clone)]
pub struct OperationInfo {
    pub path: String,
    pub verb: HttpVerb,
    pub operation: Arc<Operation>,
    /// The declared `operationId`, or a synthesized one when that is missing or empty.
    pub operation_id: String,
}

impl OperationInfo {
    /// `VERB path`, used in descriptions and error messages.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.verb, self.path)
    }
}

/// Every operation in `doc`: paths in key order, and within a path the verbs in
/// [`HttpVerb::ALL`] order.
#[must_use]
pub fn flatten(doc: &Document) -> Vec<OperationInfo> {
    let mut out = Vec::with_capacity(doc.operation_count());
    for (path, item) in &doc.paths {
        for verb in HttpVerb::ALL {
            let Some(operation) = item.get(verb) else {
                continue;
            };
            let operation_id = match operation.operation_id.as_deref() {
                Some(id) if !id.is_empty() => id.to_string(),
                _ => synthesize_operation_id(verb, path),
            };
            out.push(OperationInfo {
                path: path.clone(),
                verb,
                operation: Arc::clone(operation),
                operation_id,
            });
        }
    }
    out
}

/// `lower(verb) + "_" + path`, with surrounding slashes trimmed, inner slashes turned into `_`
/// and template braces dropped: `GET /pets/{id}` → `get_pets_id`.
#[must_use]
pub fn synthesize_operation_id(verb: HttpVerb, path: &str) -> String {
    let normalized: String = path
        .trim_matches('/')
        .chars()
        .filter(|c| !matches!(c, '{' | '}'))
        .map(|c| if c == '/' { '_' } else { c })
        .collect();
    format!("{}_{normalized}", verb.key())
}
