//! Local `$ref` resolution.
//!
//! Only same-document references (`#/components/...`, `#/definitions/...`, `#/parameters/...`)
//! are followed. Chains are followed until a non-reference value is reached; a reference that
//! revisits an earlier one is reported as cyclic.

use crate::document::Schema;
use crate::error::{OpenApiToolsError, Result};
use serde_json::Value;
use std::collections::HashSet;

pub(crate) struct LocalResolver<'a> {
    root: &'a Value,
}

impl<'a> LocalResolver<'a> {
    pub(crate) fn new(root: &'a Value) -> Self {
        Self { root }
    }

    /// `value` itself, or the value its `$ref` chain ends at.
    pub(crate) fn resolve(&self, value: &'a Value) -> Result<&'a Value> {
        match value.get("$ref").and_then(Value::as_str) {
            Some(reference) => self.follow(reference),
            None => Ok(value),
        }
    }

    /// Resolve a schema reference plus, one level down, its `items` reference.
    ///
    /// Nested property schemas keep their references; recursive schemas stay finite this way.
    pub(crate) fn schema(&self, schema: Schema) -> Result<Schema> {
        let mut resolved = self.schema_shallow(schema)?;
        if let Some(items) = resolved.items.take() {
            resolved.items = Some(Box::new(self.schema_shallow(*items)?));
        }
        Ok(resolved)
    }

    fn schema_shallow(&self, schema: Schema) -> Result<Schema> {
        let Some(reference) = schema.reference.as_deref() else {
            return Ok(schema);
        };
        let target = self.follow(reference)?;
        serde_json::from_value(target.clone()).map_err(|e| {
            OpenApiToolsError::InvalidDocument(format!("$ref '{reference}' is not a schema: {e}"))
        })
    }

    fn follow(&self, reference: &str) -> Result<&'a Value> {
        let mut seen: HashSet<String> = HashSet::new();
        let mut current = reference.to_string();

        loop {
            if !seen.insert(current.clone()) {
                return Err(OpenApiToolsError::InvalidDocument(format!(
                    "cyclic $ref detected while resolving '{reference}'"
                )));
            }

            let pointer = current.strip_prefix('#').ok_or_else(|| {
                OpenApiToolsError::InvalidDocument(format!(
                    "external $ref '{current}' is not supported"
                ))
            })?;
            let target = self.root.pointer(pointer).ok_or_else(|| {
                OpenApiToolsError::InvalidDocument(format!("unresolved $ref '{current}'"))
            })?;

            match target.get("$ref").and_then(Value::as_str) {
                Some(next) => current = next.to_string(),
                None => return Ok(target),
            }
        }
    }
}
