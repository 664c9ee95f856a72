//! Error types for repeat-engine operations.

use serde::Serialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "message", rename_all = "snake_case")]
pub enum RepeatError {
    /// The recurrence string could not be parsed. Callers treat the task as
    /// non-recurring and leave it untouched.
    #[error("Malformed RRULE: {0}")]
    MalformedRule(String),

    /// The rule parsed, but no next occurrence could be produced from the anchor.
    #[error("Inconsistent RRULE: {0}")]
    InconsistentRule(String),

    #[error("Invalid timezone: {0}")]
    InvalidTimezone(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, RepeatError>;
