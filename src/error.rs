use thiserror::Error;

use crate::validate::{DocumentKind, Violation};

/// Failures surfaced by schema inference and document loading.
#[derive(Debug, Error)]
pub enum SchemaError {
    /// A data row does not have the same number of fields as the header.
    #[error("Data row {row} has {found} field(s) but the header declares {expected}")]
    MalformedInput {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("max_categorical must be a positive integer")]
    InvalidThreshold,

    /// A document failed validation; every violation found is carried along.
    #[error("{kind} document failed validation with {} violation(s)", .violations.len())]
    InvalidDocument {
        kind: DocumentKind,
        violations: Vec<Violation>,
    },
}
