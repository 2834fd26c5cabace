use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Missing field: {0}")]
    MissingField(String),

    #[error("Unknown event type: {0}")]
    UnknownEventType(String),

    #[error("Identity mapping unavailable: {0}")]
    MappingUnavailable(String),

    #[error("Transformation error: {0}")]
    Transformation(String),

    #[error("Publish failed: {0}")]
    PublishFailed(#[from] anyhow::Error),
}

impl DomainError {
    /// Whether redelivering the batch could succeed where this attempt failed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DomainError::MappingUnavailable(_) | DomainError::PublishFailed(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_kinds() {
        assert!(DomainError::MappingUnavailable("kv down".to_string()).is_retryable());
        assert!(DomainError::PublishFailed(anyhow::anyhow!("no ack")).is_retryable());
        assert!(!DomainError::MissingField("content.name".to_string()).is_retryable());
        assert!(!DomainError::MalformedInput("eof".to_string()).is_retryable());
        assert!(!DomainError::UnknownEventType("m.foo".to_string()).is_retryable());
    }

    #[test]
    fn test_error_display() {
        let err = DomainError::MissingField("m.room.name event has no content.name".to_string());
        assert_eq!(
            err.to_string(),
            "Missing field: m.room.name event has no content.name"
        );
    }
}
