use std::env;
use std::time::Duration;

/// Default name given to accounts created through admin setup.
pub const DEFAULT_ADMIN_NAME: &str = "Administrator";

/// Default wait between sign-up and the role writes, giving the backend's
/// profile trigger time to create the profile row.
pub const DEFAULT_PROFILE_SYNC_DELAY_MS: u64 = 1000;

#[derive(Clone, Debug)]
pub struct Config {
    pub backend_url: String,
    pub anon_key: String,
    pub service_role_key: Option<String>,
    pub access_token: Option<String>,
    pub jwt_secret: Option<String>,
    pub database_url: Option<String>,
    pub profile_sync_delay_ms: u64,
    pub repair_profile_on_read: bool,
    pub http_timeout_secs: u64,
}

/// Settings consumed by the admin services.
#[derive(Clone, Debug)]
pub struct AdminConfig {
    pub profile_sync_delay: Duration,
    pub repair_profile_on_read: bool,
    pub default_admin_name: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            profile_sync_delay: Duration::from_millis(DEFAULT_PROFILE_SYNC_DELAY_MS),
            repair_profile_on_read: true,
            default_admin_name: DEFAULT_ADMIN_NAME.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenvy::dotenv().ok();

        Ok(Config {
            backend_url: env::var("BACKEND_URL")?
                .trim_end_matches('/')
                .to_string(),
            anon_key: env::var("BACKEND_ANON_KEY")?,
            service_role_key: non_empty_var("BACKEND_SERVICE_ROLE_KEY"),
            access_token: non_empty_var("BACKEND_ACCESS_TOKEN"),
            jwt_secret: non_empty_var("BACKEND_JWT_SECRET"),
            database_url: non_empty_var("DATABASE_URL"),
            profile_sync_delay_ms: env::var("PROFILE_SYNC_DELAY_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PROFILE_SYNC_DELAY_MS),
            repair_profile_on_read: env::var("REPAIR_PROFILE_ON_READ")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(true),
            http_timeout_secs: env::var("HTTP_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(30),
        })
    }

    pub fn admin(&self) -> AdminConfig {
        AdminConfig {
            profile_sync_delay: Duration::from_millis(self.profile_sync_delay_ms),
            repair_profile_on_read: self.repair_profile_on_read,
            default_admin_name: DEFAULT_ADMIN_NAME.to_string(),
        }
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }
}

fn non_empty_var(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
