//! Error taxonomy shared by every calculator

use thiserror::Error;

/// Result alias used throughout the engine
pub type Result<T> = std::result::Result<T, FinsightError>;

/// Failures a calculation can report to its caller
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FinsightError {
    /// User input breaks a domain rule; nothing was changed
    #[error("validation failed: {0}")]
    Validation(String),

    /// Currency code missing from the rate table
    #[error("unknown currency code '{0}'")]
    UnknownCurrency(String),

    /// A referenced record is missing from the snapshot
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// Repository or forecast service failure
    #[error("external service failed: {0}")]
    ExternalService(String),
}

impl FinsightError {
    pub fn validation(message: impl Into<String>) -> Self {
        FinsightError::Validation(message.into())
    }

    pub fn not_found(kind: &'static str, id: impl Into<String>) -> Self {
        FinsightError::NotFound {
            kind,
            id: id.into(),
        }
    }
}

/// Per-record failure collected by a bulk operation
#[derive(Debug, Clone, PartialEq)]
pub struct RecordError {
    /// Identifier of the failing input (id, row number, ...)
    pub key: String,
    pub error: FinsightError,
}

/// Outcome of a bulk operation that continues past failing records
#[derive(Debug, Clone, PartialEq)]
pub struct BulkOutcome<T> {
    pub created: Vec<T>,
    pub errors: Vec<RecordError>,
}

impl<T> Default for BulkOutcome<T> {
    fn default() -> Self {
        Self {
            created: Vec::new(),
            errors: Vec::new(),
        }
    }
}

impl<T> BulkOutcome<T> {
    /// Record the result of processing one input
    pub fn push(&mut self, key: impl Into<String>, result: Result<T>) {
        match result {
            Ok(item) => self.created.push(item),
            Err(error) => self.errors.push(RecordError {
                key: key.into(),
                error,
            }),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bulk_outcome_collects_both_sides() {
        let mut outcome = BulkOutcome::default();
        outcome.push("row-1", Ok(1));
        outcome.push("row-2", Err(FinsightError::validation("bad row")));
        outcome.push("row-3", Ok(3));

        assert_eq!(outcome.created, vec![1, 3]);
        assert_eq!(outcome.errors.len(), 1);
        assert_eq!(outcome.errors[0].key, "row-2");
        assert!(!outcome.is_clean());
    }

    #[test]
    fn test_error_messages() {
        let err = FinsightError::not_found("assignment", "a-9");
        assert_eq!(err.to_string(), "assignment 'a-9' not found");
        let err = FinsightError::UnknownCurrency("XYZ".to_string());
        assert_eq!(err.to_string(), "unknown currency code 'XYZ'");
    }
}
