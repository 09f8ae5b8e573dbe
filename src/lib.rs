pub mod backend;
pub mod config;
pub mod db;
pub mod error;
pub mod http_client;
pub mod models;
pub mod services;
pub mod session_token;

pub use config::{AdminConfig, Config};
pub use error::{AdminError, AdminResult};
