//! Parsed GraphQL documents.
//!
//! Query text is parsed before anything goes over the wire, so syntax errors,
//! ambiguous multi-operation documents and missing required variables are
//! reported as query-level errors without touching the network.

use async_graphql_parser::parse_query;
use async_graphql_parser::types::OperationType;
use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ClientError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => Self::Query,
            OperationType::Mutation => Self::Mutation,
            OperationType::Subscription => Self::Subscription,
        }
    }
}

/// A variable declared by the selected operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VariableSpec {
    pub name: String,
    /// Non-null type without a default value.
    pub required: bool,
}

/// Executable GraphQL document with one selected operation.
#[derive(Debug, Clone)]
pub struct Document {
    source: String,
    operation_name: Option<String>,
    kind: OperationKind,
    variables: Vec<VariableSpec>,
}

struct ParsedOperation {
    name: Option<String>,
    kind: OperationKind,
    variables: Vec<VariableSpec>,
}

impl Document {
    /// Parse a document containing exactly one operation.
    pub fn parse(source: impl Into<String>) -> Result<Self, ClientError> {
        Self::parse_with(source.into(), None)
    }

    /// Parse a document and select the operation called `name`.
    pub fn parse_operation(source: impl Into<String>, name: &str) -> Result<Self, ClientError> {
        Self::parse_with(source.into(), Some(name))
    }

    fn parse_with(source: String, wanted: Option<&str>) -> Result<Self, ClientError> {
        let parsed = parse_query(&source).map_err(|e| ClientError::Document { message: e.to_string() })?;

        let mut operations: Vec<ParsedOperation> = parsed
            .operations
            .iter()
            .map(|(name, op)| ParsedOperation {
                name: name.map(|n| n.as_str().to_string()),
                kind: op.node.ty.into(),
                variables: op
                    .node
                    .variable_definitions
                    .iter()
                    .map(|def| VariableSpec {
                        name: def.node.name.node.as_str().to_string(),
                        required: !def.node.var_type.node.nullable && def.node.default_value.is_none(),
                    })
                    .collect(),
            })
            .collect();

        let selected = match wanted {
            Some(wanted) => {
                let index = operations
                    .iter()
                    .position(|op| op.name.as_deref() == Some(wanted))
                    .ok_or_else(|| ClientError::Document {
                        message: format!("document has no operation named '{wanted}'"),
                    })?;
                operations.swap_remove(index)
            }
            None if operations.len() == 1 => operations.remove(0),
            None => {
                return Err(ClientError::Document {
                    message: format!(
                        "document defines {} operations, select one by name",
                        operations.len()
                    ),
                })
            }
        };

        debug!(operation = ?selected.name, kind = ?selected.kind, "Parsed GraphQL document");
        Ok(Self {
            source,
            operation_name: selected.name,
            kind: selected.kind,
            variables: selected.variables,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn variables(&self) -> &[VariableSpec] {
        &self.variables
    }

    /// Check that every required variable has a non-null value.
    pub fn check_variables(&self, parameters: &Map<String, Value>) -> Result<(), ClientError> {
        let missing: Vec<&str> = self
            .variables
            .iter()
            .filter(|var| var.required)
            .filter(|var| parameters.get(&var.name).map_or(true, Value::is_null))
            .map(|var| var.name.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ClientError::Document {
                message: format!("missing required variables: {}", missing.join(", ")),
            })
        }
    }
}
