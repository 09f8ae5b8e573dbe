use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

use crate::error::{AdminError, AdminResult};

/// HTTP client bound to the hosted backend's base URL and project API key.
#[derive(Clone)]
pub struct HttpClient {
    client: Client,
    base_url: String,
    api_key: String,
}

/// Error body shapes returned by the auth and table endpoints.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    message: Option<String>,
    msg: Option<String>,
    error_description: Option<String>,
    error: Option<String>,
}

impl HttpClient {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> AdminResult<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
        })
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// Request carrying the project key plus `bearer` as the caller identity.
    pub fn request(&self, method: Method, path: &str, bearer: &str) -> RequestBuilder {
        self.client
            .request(method, self.url(path))
            .header("apikey", &self.api_key)
            .bearer_auth(bearer)
    }

    pub async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> AdminResult<T> {
        let response = check_status(builder.send().await?).await?;
        Ok(response.json().await?)
    }
}

async fn check_status(response: Response) -> AdminResult<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(AdminError::Api {
        status: status.as_u16(),
        message: error_message(&body),
    })
}

/// First message field present in an error body, or the raw body.
pub fn error_message(body: &str) -> String {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    parsed
        .message
        .or(parsed.msg)
        .or(parsed.error_description)
        .or(parsed.error)
        .unwrap_or_else(|| {
            let trimmed = body.trim();
            if trimmed.is_empty() {
                "unknown error".to_string()
            } else {
                trimmed.to_string()
            }
        })
}
