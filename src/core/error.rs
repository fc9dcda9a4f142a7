use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Unsupported association shape for field '{field}' on '{entity}': {reason}")]
    UnsupportedAssociationShape {
        entity: String,
        field: String,
        reason: String,
    },

    #[error("Unknown entity type '{0}'")]
    UnknownEntityType(String),

    #[error("Field '{field}' not found on '{entity}'")]
    FieldNotFound { entity: String, field: String },

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("Storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("{entity} '{id}' not found")]
    NotFound { entity: String, id: String },

    #[error("Missing argument: {0}")]
    MissingArgument(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),
}

pub type Result<T> = std::result::Result<T, DbError>;

impl DbError {
    /// Wraps a backend failure, keeping it reachable through `source()`.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Storage(Box::new(err))
    }

    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn not_found(entity: impl Into<String>, id: impl ToString) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Metadata problems: these come from entity definitions, never from data.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::UnsupportedAssociationShape { .. }
        )
    }

    pub fn is_storage(&self) -> bool {
        matches!(self, Self::Storage(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// HTTP-equivalent status the boundary layer should report.
    pub fn status_hint(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::MissingArgument(_) | Self::ParseError(_) | Self::TypeMismatch(_) => 400,
            Self::FieldNotFound { .. } | Self::UnknownEntityType(_) => 400,
            Self::UnsupportedOperation(_) => 405,
            Self::Configuration(_)
            | Self::UnsupportedAssociationShape { .. }
            | Self::Storage(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(err: rusqlite::Error) -> Self {
        Self::storage(err)
    }
}

impl From<serde_json::Error> for DbError {
    fn from(err: serde_json::Error) -> Self {
        Self::ParseError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storage_error_keeps_source() {
        let err = DbError::storage(std::io::Error::other("disk on fire"));
        assert!(err.is_storage());
        let source = std::error::Error::source(&err).unwrap();
        assert_eq!(source.to_string(), "disk on fire");
        assert_eq!(err.status_hint(), 500);
    }

    #[test]
    fn test_status_hints() {
        assert_eq!(DbError::not_found("Person", "abc").status_hint(), 404);
        assert_eq!(DbError::MissingArgument("x".into()).status_hint(), 400);
        assert!(DbError::configuration("bad").is_configuration());
        assert!(
            DbError::UnsupportedAssociationShape {
                entity: "A".into(),
                field: "bs".into(),
                reason: "element type unknown".into(),
            }
            .is_configuration()
        );
    }
}
