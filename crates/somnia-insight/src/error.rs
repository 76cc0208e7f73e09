use thiserror::Error;
use uuid::Uuid;

use somnia_core::error::SomniaError;

/// Errors that can occur in analytics queries.
#[derive(Error, Debug)]
pub enum InsightError {
    #[error("days must be between 1 and {max}, got {days}")]
    InvalidWindow { days: u32, max: u32 },
    #[error("limit must be between 1 and {max}, got {limit}")]
    InvalidLimit { limit: usize, max: usize },
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("unsupported interval: {0}")]
    UnsupportedInterval(String),
    #[error("no interactions recorded for user {0}")]
    UserNotFound(String),
    #[error("conversation not found: {0}")]
    ConversationNotFound(Uuid),
    #[error("export error: {0}")]
    Export(String),
    #[error("storage error: {0}")]
    Storage(String),
}

impl From<SomniaError> for InsightError {
    fn from(err: SomniaError) -> Self {
        InsightError::Storage(err.to_string())
    }
}

impl From<serde_json::Error> for InsightError {
    fn from(err: serde_json::Error) -> Self {
        InsightError::Export(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_invalid_window() {
        let e = InsightError::InvalidWindow { days: 0, max: 365 };
        assert_eq!(e.to_string(), "days must be between 1 and 365, got 0");
    }

    #[test]
    fn test_error_display_user_not_found() {
        let e = InsightError::UserNotFound("alice".to_string());
        assert_eq!(e.to_string(), "no interactions recorded for user alice");
    }

    #[test]
    fn test_error_display_unsupported_format() {
        let e = InsightError::UnsupportedFormat("xml".to_string());
        assert_eq!(e.to_string(), "unsupported format: xml");
    }

    #[test]
    fn test_error_from_somnia() {
        let e: InsightError = SomniaError::Storage("db offline".to_string()).into();
        assert!(matches!(e, InsightError::Storage(_)));
        assert!(e.to_string().contains("db offline"));
    }

    #[test]
    fn test_error_is_debug() {
        let e = InsightError::ConversationNotFound(Uuid::nil());
        assert!(format!("{:?}", e).contains("ConversationNotFound"));
    }
}
