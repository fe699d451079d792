use thiserror::Error;

use crate::data::model::{Component, FieldKind, GmNo};
use crate::data::filter::Operator;

// ---------------------------------------------------------------------------
// Query-time errors
// ---------------------------------------------------------------------------

/// Validation failures raised by the query engine and the spectra resolver.
///
/// Every variant is detected before any record is scanned, so a failing
/// request never yields partial results.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum QueryError {
    #[error("unknown field `{0}`")]
    UnknownField(String),

    #[error("cannot compare {kind} field `{field}` using `{operator}` with operand {operand}")]
    TypeMismatch {
        field: String,
        kind: FieldKind,
        operator: Operator,
        operand: String,
    },

    #[error("malformed range `{0}`: expected `<low> to <high>` with low <= high")]
    MalformedRange(String),

    #[error("{fields} field name(s) were given but {ranges} range(s)")]
    ArityMismatch { fields: usize, ranges: usize },

    #[error("unknown ground motion {0}")]
    UnknownRecord(GmNo),

    #[error("unknown component `{0}` (expected one of S1, S2, S3, B1, B2, B3)")]
    UnknownComponent(String),

    #[error("invalid period list: {0}")]
    InvalidPeriods(String),

    #[error("the {0} period grid is not configured for this catalog")]
    UnconfiguredGrid(&'static str),
}

// ---------------------------------------------------------------------------
// Catalog build errors
// ---------------------------------------------------------------------------

/// Problems found while validating a catalog snapshot at load time.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CatalogError {
    #[error("ground-motion number must be a positive integer, got {0}")]
    InvalidGmNo(String),

    #[error("duplicate ground-motion number {0}")]
    DuplicateGmNo(GmNo),

    #[error("record {gm_no}: missing required field `{field}`")]
    MissingField { gm_no: GmNo, field: String },

    #[error("record {gm_no}: field `{field}` must be {expected}, got {found}")]
    FieldType {
        gm_no: GmNo,
        field: String,
        expected: FieldKind,
        found: String,
    },

    #[error("record {gm_no}: field `{field}` is not declared in the catalog schema")]
    UndeclaredField { gm_no: GmNo, field: String },

    #[error("field `{0}` is declared more than once")]
    DuplicateField(String),

    #[error("record {gm_no}: invalid {component} spectrum: {reason}")]
    InvalidCurve {
        gm_no: GmNo,
        component: Component,
        reason: String,
    },

    #[error("noise field `{0}` must be declared numeric")]
    NoiseField(String),

    #[error("invalid {grid} period grid: {reason}")]
    InvalidGrid { grid: &'static str, reason: String },
}

pub type QueryResult<T> = std::result::Result<T, QueryError>;
