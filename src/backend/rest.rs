//! Adapter for the hosted backend's HTTP API: auth endpoints under
//! `/auth/v1`, table and RPC endpoints under `/rest/v1`.

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

use super::{AuthProvider, RoleStore};
use crate::config::Config;
use crate::error::{AdminError, AdminResult};
use crate::http_client::HttpClient;
use crate::models::{emails_match, AuthUser, Profile, Role, Session, SignUpRequest, UserRole};
use crate::session_token;

const USER_ROLES: &str = "rest/v1/user_roles";
const PROFILES: &str = "rest/v1/profiles";
const IS_ADMIN_RPC: &str = "rest/v1/rpc/is_admin";

const USER_ROLE_COLUMNS: &str = "user_id,role,created_at";
const PROFILE_COLUMNS: &str = "id,email,name,role,created_at";

/// Page size for the admin user listing.
const USERS_PER_PAGE: usize = 1000;
/// Upper bound on listing pages walked in one call.
const MAX_USER_PAGES: usize = 100;

#[derive(Debug, Deserialize)]
struct UserListResponse {
    #[serde(default)]
    users: Vec<AuthUser>,
}

pub struct RestBackend {
    http: HttpClient,
    service_role_key: Option<String>,
    access_token: Option<String>,
    jwt_secret: Option<String>,
}

impl RestBackend {
    pub fn new(http: HttpClient) -> Self {
        Self {
            http,
            service_role_key: None,
            access_token: None,
            jwt_secret: None,
        }
    }

    pub fn from_config(config: &Config) -> AdminResult<Self> {
        let http = HttpClient::new(&config.backend_url, &config.anon_key, config.http_timeout())?;
        let mut backend = Self::new(http);
        backend.service_role_key = config.service_role_key.clone();
        backend.access_token = config.access_token.clone();
        backend.jwt_secret = config.jwt_secret.clone();
        Ok(backend)
    }

    pub fn with_service_role_key(mut self, key: impl Into<String>) -> Self {
        self.service_role_key = Some(key.into());
        self
    }

    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }

    pub fn with_jwt_secret(mut self, secret: impl Into<String>) -> Self {
        self.jwt_secret = Some(secret.into());
        self
    }

    /// Identity used for table access: the service key bypasses row-level
    /// security, otherwise rows are read as the signed-in caller.
    fn table_bearer(&self) -> &str {
        self.service_role_key
            .as_deref()
            .or(self.access_token.as_deref())
            .unwrap_or_else(|| self.http.api_key())
    }

    fn filter_eq(value: &str) -> String {
        format!("eq.{}", value)
    }
}

/// A short page ends the listing.
fn is_last_page(count: usize) -> bool {
    count < USERS_PER_PAGE
}

/// Pull the account out of a sign-up response. Depending on whether email
/// confirmation is enabled the user is either nested under `user` or is the
/// body itself.
fn signed_up_user(body: serde_json::Value) -> AdminResult<AuthUser> {
    let user = if body.get("user").is_some_and(|u| u.is_object()) {
        body["user"].clone()
    } else if body.get("id").is_some() {
        body
    } else {
        return Err(AdminError::Internal(
            "Sign-up response did not include a user".to_string(),
        ));
    };
    serde_json::from_value(user)
        .map_err(|e| AdminError::Internal(format!("Malformed sign-up response: {}", e)))
}

#[async_trait]
impl AuthProvider for RestBackend {
    async fn current_session(&self) -> AdminResult<Option<Session>> {
        let Some(token) = self.access_token.as_deref() else {
            return Ok(None);
        };

        if let Some(secret) = self.jwt_secret.as_deref() {
            return session_token::decode_session(token, secret).map(Some);
        }

        let request = self.http.request(Method::GET, "auth/v1/user", token);
        match self.http.send_json::<AuthUser>(request).await {
            Ok(user) => Ok(Some(Session::new(user.id, user.email).with_access_token(token))),
            Err(AdminError::Api { status: 401 | 403, message }) => {
                tracing::debug!("Access token rejected: {}", message);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn sign_up(&self, request: &SignUpRequest) -> AdminResult<AuthUser> {
        let body = json!({
            "email": request.email,
            "password": request.password,
            "data": request.metadata,
        });
        let builder = self
            .http
            .request(Method::POST, "auth/v1/signup", self.http.api_key())
            .json(&body);
        let response: serde_json::Value = self.http.send_json(builder).await?;
        signed_up_user(response)
    }

    async fn list_users(&self) -> AdminResult<Vec<AuthUser>> {
        let key = self.service_role_key.as_deref().ok_or_else(|| {
            AdminError::InvalidInput("Listing users requires the service role key".to_string())
        })?;

        let mut users = Vec::new();
        for page in 1..=MAX_USER_PAGES {
            let builder = self
                .http
                .request(Method::GET, "auth/v1/admin/users", key)
                .query(&[
                    ("page", page.to_string()),
                    ("per_page", USERS_PER_PAGE.to_string()),
                ]);
            let batch: UserListResponse = self.http.send_json(builder).await?;
            let count = batch.users.len();
            users.extend(batch.users);
            if is_last_page(count) {
                return Ok(users);
            }
        }
        tracing::warn!(
            "User listing stopped after {} pages ({} users); later accounts were not checked",
            MAX_USER_PAGES,
            users.len()
        );
        Ok(users)
    }
}

#[async_trait]
impl RoleStore for RestBackend {
    async fn find_role(&self, user_id: &str, role: Role) -> AdminResult<Option<UserRole>> {
        let builder = self
            .http
            .request(Method::GET, USER_ROLES, self.table_bearer())
            .query(&[
                ("select", USER_ROLE_COLUMNS.to_string()),
                ("user_id", Self::filter_eq(user_id)),
                ("role", Self::filter_eq(role.as_str())),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<UserRole> = self.http.send_json(builder).await?;
        Ok(rows.into_iter().next())
    }

    async fn delete_roles(&self, user_id: &str, role: Role) -> AdminResult<u64> {
        let builder = self
            .http
            .request(Method::DELETE, USER_ROLES, self.table_bearer())
            .header("Prefer", "return=representation")
            .query(&[("user_id", Self::filter_eq(user_id)), ("role", Self::filter_eq(role.as_str()))]);
        let rows: Vec<UserRole> = self.http.send_json(builder).await?;
        Ok(rows.len() as u64)
    }

    async fn insert_role(&self, user_id: &str, role: Role) -> AdminResult<UserRole> {
        let builder = self
            .http
            .request(Method::POST, USER_ROLES, self.table_bearer())
            .header("Prefer", "return=representation")
            .json(&[UserRole::new(user_id, role)]);
        let rows: Vec<UserRole> = self.http.send_json(builder).await?;
        rows.into_iter()
            .next()
            .ok_or_else(|| AdminError::Internal("Insert returned no row".to_string()))
    }

    async fn list_role_holders(&self, role: Role) -> AdminResult<Vec<String>> {
        let builder = self
            .http
            .request(Method::GET, USER_ROLES, self.table_bearer())
            .query(&[
                ("select", USER_ROLE_COLUMNS.to_string()),
                ("role", Self::filter_eq(role.as_str())),
            ]);
        let rows: Vec<UserRole> = self.http.send_json(builder).await?;
        Ok(rows.into_iter().map(|r| r.user_id).collect())
    }

    async fn is_admin_rpc(&self, session: &Session) -> AdminResult<bool> {
        // The function reads the caller from the token, so it must run as the session.
        let token = session
            .access_token
            .as_deref()
            .or(self.access_token.as_deref())
            .ok_or_else(|| {
                AdminError::InvalidInput(
                    "Privilege check requires the caller's access token".to_string(),
                )
            })?;
        let builder = self
            .http
            .request(Method::POST, IS_ADMIN_RPC, token)
            .json(&json!({}));
        let result: Option<bool> = self.http.send_json(builder).await?;
        Ok(result.unwrap_or(false))
    }

    async fn get_profile(&self, user_id: &str) -> AdminResult<Option<Profile>> {
        let builder = self
            .http
            .request(Method::GET, PROFILES, self.table_bearer())
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("id", Self::filter_eq(user_id)),
                ("limit", "1".to_string()),
            ]);
        let rows: Vec<Profile> = self.http.send_json(builder).await?;
        Ok(rows.into_iter().next())
    }

    async fn find_profile_by_email(&self, email: &str) -> AdminResult<Option<Profile>> {
        let email = email.trim();
        let builder = self
            .http
            .request(Method::GET, PROFILES, self.table_bearer())
            .query(&[
                ("select", PROFILE_COLUMNS.to_string()),
                ("email", format!("ilike.{}", email)),
            ]);
        let rows: Vec<Profile> = self.http.send_json(builder).await?;
        // ilike treats `_` and `%` as wildcards; keep exact matches only.
        Ok(rows
            .into_iter()
            .find(|p| p.email.as_deref().is_some_and(|e| emails_match(e, email))))
    }

    async fn update_profile_role(&self, user_id: &str, role: Role) -> AdminResult<u64> {
        let builder = self
            .http
            .request(Method::PATCH, PROFILES, self.table_bearer())
            .header("Prefer", "return=representation")
            .query(&[("id", Self::filter_eq(user_id))])
            .json(&json!({ "role": role.as_str() }));
        let rows: Vec<Profile> = self.http.send_json(builder).await?;
        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn backend() -> RestBackend {
        let http = HttpClient::new("https://db.example.test", "anon-key", Duration::from_secs(5))
            .unwrap();
        RestBackend::new(http)
    }

    #[test]
    fn test_signed_up_user_nested() {
        let body = json!({
            "access_token": "t",
            "user": { "id": "u1", "email": "new@x.com", "user_metadata": { "role": "admin" } }
        });
        let user = signed_up_user(body).unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.user_metadata["role"], "admin");
    }

    #[test]
    fn test_signed_up_user_top_level() {
        let body = json!({ "id": "u1", "email": "new@x.com" });
        assert_eq!(signed_up_user(body).unwrap().id, "u1");
    }

    #[test]
    fn test_signed_up_user_missing() {
        assert!(signed_up_user(json!({ "user": null })).is_err());
    }

    #[test]
    fn test_is_last_page() {
        assert!(is_last_page(0));
        assert!(is_last_page(USERS_PER_PAGE - 1));
        assert!(!is_last_page(USERS_PER_PAGE));
    }

    #[test]
    fn test_table_bearer_preference() {
        let anon = backend();
        assert_eq!(anon.table_bearer(), "anon-key");

        let user = backend().with_access_token("user-token");
        assert_eq!(user.table_bearer(), "user-token");

        let service = backend()
            .with_access_token("user-token")
            .with_service_role_key("service-key");
        assert_eq!(service.table_bearer(), "service-key");
    }

    #[tokio::test]
    async fn test_no_access_token_means_no_session() {
        assert!(backend().current_session().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_session_decoded_locally_with_secret() {
        use crate::session_token::Claims;
        use jsonwebtoken::{encode, EncodingKey, Header};

        let claims = Claims {
            sub: "u1".to_string(),
            email: Some("admin@x.com".to_string()),
            exp: chrono::Utc::now().timestamp() + 3600,
            iat: None,
            role: None,
        };
        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"project-secret"),
        )
        .unwrap();

        let session = backend()
            .with_access_token(token)
            .with_jwt_secret("project-secret")
            .current_session()
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.user_id, "u1");
    }

    #[tokio::test]
    async fn test_list_users_requires_service_key() {
        let err = backend().list_users().await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_rpc_requires_token() {
        let session = Session::new("u1", None);
        let err = backend().is_admin_rpc(&session).await.unwrap_err();
        assert!(matches!(err, AdminError::InvalidInput(_)));
    }
}
