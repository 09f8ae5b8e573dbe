pub mod auth_user;
pub mod profile;
pub mod role;
pub mod user_role;

pub use auth_user::*;
pub use profile::*;
pub use role::*;
pub use user_role::*;
