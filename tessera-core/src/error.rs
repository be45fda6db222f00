//! Error types for TESSERA operations

use thiserror::Error;

/// Mapping configuration errors.
///
/// These are construction-time failures: a mapping that cannot be built,
/// or a property name the mapping does not know. They are never silently
/// ignored and never surface as runtime query failures.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MappingError {
    #[error("Table name must not be empty (schema: {schema:?})")]
    MissingTableName { schema: Option<String> },

    #[error("Unknown property '{property}' on mapping for table '{table}'")]
    UnknownProperty { table: String, property: String },

    #[error("Duplicate column mapping for property '{property}' on table '{table}'")]
    DuplicateColumn { table: String, property: String },
}

/// Repository/driver boundary errors.
///
/// Concurrency conflicts are NOT errors - they surface as boolean `false`
/// from update/delete. Only transport failures and row-decode failures
/// land here, and driver failures propagate unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum RepositoryError {
    #[error("Driver error: {reason}")]
    Driver { reason: String },

    #[error("Row is missing column '{column}'")]
    MissingColumn { column: String },

    #[error("Failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },

    #[error("Parameter '{name}' has no bound value")]
    UnboundParameter { name: String },

    #[error("Bulk load error: {reason}")]
    BulkLoad { reason: String },
}

/// Master error type for all TESSERA errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TesseraError {
    #[error("Mapping error: {0}")]
    Mapping(#[from] MappingError),

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Result type alias for TESSERA operations.
pub type TesseraResult<T> = Result<T, TesseraError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mapping_error_message_names_property() {
        let err = MappingError::UnknownProperty {
            table: "asset".to_string(),
            property: "bogus".to_string(),
        };
        let message = err.to_string();
        assert!(message.contains("bogus"));
        assert!(message.contains("asset"));
    }

    #[test]
    fn test_errors_convert_into_master_type() {
        let err: TesseraError = MappingError::MissingTableName { schema: None }.into();
        assert!(matches!(err, TesseraError::Mapping(_)));

        let err: TesseraError = RepositoryError::Driver {
            reason: "connection reset".to_string(),
        }
        .into();
        assert!(matches!(err, TesseraError::Repository(_)));
    }
}
