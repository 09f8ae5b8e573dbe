use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::AdminResult;
use crate::models::Session;

/// Claims carried by the backend's access tokens.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,
    #[serde(default)]
    pub email: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: Option<i64>,
    /// Database role the token runs as (`authenticated`, `service_role`, ...).
    #[serde(default)]
    pub role: Option<String>,
}

/// Verify an HS256 access token and turn it into a `Session`.
pub fn decode_session(token: &str, secret: &str) -> AdminResult<Session> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Audience differs between projects; signature and expiry are what matter here.
    validation.validate_aud = false;

    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(Session::new(data.claims.sub, data.claims.email).with_access_token(token))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use jsonwebtoken::{encode, EncodingKey, Header};

    fn token(secret: &str, exp_offset_secs: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = Claims {
            sub: "u1".to_string(),
            email: Some("admin@x.com".to_string()),
            exp: now + exp_offset_secs,
            iat: Some(now),
            role: Some("authenticated".to_string()),
        };
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_session() {
        let jwt = token("project-secret", 3600);
        let session = decode_session(&jwt, "project-secret").unwrap();
        assert_eq!(session.user_id, "u1");
        assert_eq!(session.email.as_deref(), Some("admin@x.com"));
        assert_eq!(session.access_token.as_deref(), Some(jwt.as_str()));
    }

    #[test]
    fn test_decode_rejects_wrong_secret() {
        let jwt = token("project-secret", 3600);
        assert!(decode_session(&jwt, "other-secret").is_err());
    }

    #[test]
    fn test_decode_rejects_expired_token() {
        let jwt = token("project-secret", -3600);
        assert!(decode_session(&jwt, "project-secret").is_err());
    }
}
