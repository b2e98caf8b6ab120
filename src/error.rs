use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PloutosError {
    /// A rule or processor config that cannot be applied as written.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Slave legs that do not balance against their master.
    #[error("Unbalanced slaves: master expects {expected}, slaves sum to {actual}")]
    Reconciliation { expected: Decimal, actual: Decimal },

    #[error("Invalid slaves: {0}")]
    InvalidSlaves(String),

    /// The operation was already carried out (or raced with another writer).
    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Database error: {0}")]
    Db(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Settings error: {0}")]
    Settings(String),
}

impl PloutosError {
    /// Short, stable label used in batch reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Configuration(_) => "configuration",
            Self::Reconciliation { .. } => "reconciliation",
            Self::InvalidSlaves(_) => "invalid_slaves",
            Self::Conflict(_) => "conflict",
            Self::NotFound(_) => "not_found",
            Self::Validation(_) => "validation",
            Self::Db(_) => "database",
            Self::Io(_) => "io",
            Self::Json(_) => "json",
            Self::Settings(_) => "settings",
        }
    }
}

pub type Result<T> = std::result::Result<T, PloutosError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_labels_are_distinct_for_domain_errors() {
        let conflict = PloutosError::Conflict("pair".into());
        let config = PloutosError::Configuration("bad".into());
        let unbalanced = PloutosError::Reconciliation {
            expected: Decimal::new(-4200, 2),
            actual: Decimal::new(-4100, 2),
        };
        assert_eq!(conflict.kind(), "conflict");
        assert_eq!(config.kind(), "configuration");
        assert_eq!(unbalanced.kind(), "reconciliation");
    }

    #[test]
    fn test_reconciliation_message_shows_both_sides() {
        let err = PloutosError::Reconciliation {
            expected: Decimal::new(-4200, 2),
            actual: Decimal::new(-4100, 2),
        };
        assert_eq!(
            err.to_string(),
            "Unbalanced slaves: master expects -42.00, slaves sum to -41.00"
        );
    }
}
