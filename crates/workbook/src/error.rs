//! Error types for workbook operations
//!
//! Flat hierarchy. Naming and extraction failures never reach this type:
//! they degrade to a fallback recorded on the node or the extraction result.
//! What ends up here is either fatal (I/O, broken XML) or a lookup the caller
//! asked for directly.

use crate::types::NodeId;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, WorkbookError>;

#[derive(Debug, Error)]
pub enum WorkbookError {
    #[error("Node not found: {0}")]
    NodeNotFound(NodeId),

    #[error("Attribute '{attribute}' missing on <{tag}>")]
    AttributeMissing { tag: String, attribute: String },

    #[error("No field named '{name}' on <{tag}>")]
    FieldNotFound { tag: String, name: String },

    #[error("Field '{name}' on <{tag}> is {actual}, expected {expected}")]
    FieldKind {
        tag: String,
        name: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Malformed document: {0}")]
    Malformed(String),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
