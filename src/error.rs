use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("schema violation: {0}")]
    SchemaViolation(String),

    #[error("validation error: {0}")]
    ValidationError(String),

    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl ServiceError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::UpstreamUnavailable(_) => "upstream_unavailable",
            Self::SchemaViolation(_) => "schema_violation",
            Self::ValidationError(_) => "validation_error",
            Self::Cancelled(_) => "cancelled",
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Self::NotFound(message)
            | Self::UpstreamUnavailable(message)
            | Self::SchemaViolation(message)
            | Self::ValidationError(message)
            | Self::Cancelled(message) => message,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::NotFound(_) => 2,
            Self::ValidationError(_) => 3,
            Self::UpstreamUnavailable(_) => 4,
            Self::SchemaViolation(_) => 5,
            Self::Cancelled(_) => 6,
        }
    }
}

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

impl From<rusqlite::Error> for ServiceError {
    fn from(err: rusqlite::Error) -> Self {
        Self::UpstreamUnavailable(format!("vocabulary store error: {err}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_exit_codes_are_distinct() {
        let errors = [
            ServiceError::NotFound("a".into()),
            ServiceError::UpstreamUnavailable("b".into()),
            ServiceError::SchemaViolation("c".into()),
            ServiceError::ValidationError("d".into()),
            ServiceError::Cancelled("e".into()),
        ];

        let mut kinds = errors.iter().map(ServiceError::kind).collect::<Vec<_>>();
        kinds.sort();
        kinds.dedup();
        assert_eq!(kinds.len(), errors.len());

        let mut codes = errors.iter().map(ServiceError::exit_code).collect::<Vec<_>>();
        codes.sort();
        codes.dedup();
        assert_eq!(codes.len(), errors.len());
    }

    #[test]
    fn display_carries_message() {
        let err = ServiceError::SchemaViolation("missing field `target`".into());
        assert_eq!(err.message(), "missing field `target`");
        assert_eq!(err.to_string(), "schema violation: missing field `target`");
    }
}
