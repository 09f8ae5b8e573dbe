use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::Role;

/// An account as reported by the auth service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: String,
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: serde_json::Value,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl AuthUser {
    /// Case-insensitive email comparison.
    pub fn email_matches(&self, email: &str) -> bool {
        self.email.as_deref().is_some_and(|e| emails_match(e, email))
    }
}

/// Case-insensitive over the full Unicode range, like SQL `lower()`.
pub fn emails_match(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}

/// Metadata attached to a new account at sign-up.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SignUpMetadata {
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: String,
    pub password: String,
    pub metadata: SignUpMetadata,
}

/// Identity of the authenticated caller.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub user_id: String,
    pub email: Option<String>,
    /// Bearer token the session was established with, when known. Used to
    /// evaluate server-side checks as this caller.
    pub access_token: Option<String>,
}

impl Session {
    pub fn new(user_id: impl Into<String>, email: Option<String>) -> Self {
        Self {
            user_id: user_id.into(),
            email,
            access_token: None,
        }
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}
