use thiserror::Error;

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Backend error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid access token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AdminError {
    /// Message suitable for a user-facing result, without the variant prefix
    /// for errors reported by the backend itself.
    pub fn user_message(&self) -> String {
        match self {
            AdminError::Api { message, .. } => message.clone(),
            AdminError::InvalidInput(msg)
            | AdminError::Internal(msg) => msg.clone(),
            other => other.to_string(),
        }
    }
}

pub type AdminResult<T> = Result<T, AdminError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_display() {
        let err = AdminError::Api {
            status: 429,
            message: "rate limited".to_string(),
        };
        assert_eq!(err.to_string(), "Backend error (429): rate limited");
        assert_eq!(err.user_message(), "rate limited");
    }

    #[test]
    fn test_user_message_strips_prefix() {
        let err = AdminError::InvalidInput("Email is required".to_string());
        assert_eq!(err.user_message(), "Email is required");
    }
}
