use thiserror::Error;

use crate::domain::ValueKind;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FilterError {
    #[error("filter {key} expects a {expected} value, found {found}")]
    ValueKindMismatch {
        key: String,
        expected: ValueKind,
        found: ValueKind,
    },
    #[error("no filter with key {key} in the current view")]
    UnknownFilter { key: String },
    #[error("step index {index} out of range for a table of {len} steps")]
    StepOutOfRange { index: u32, len: usize },
    #[error("a power step table needs at least one step")]
    EmptySteps,
    #[error("power steps must be strictly increasing, {previous} is followed by {next}")]
    UnorderedSteps { previous: i64, next: i64 },
}

impl FilterError {
    /// Mismatches come from a corrupted or hand-edited store and are never retried.
    pub fn is_fatal(&self) -> bool {
        matches!(self, FilterError::ValueKindMismatch { .. })
    }
}
