pub mod identity;
pub mod pool;
pub mod store;

pub use identity::{
    claims_json,
    set_current_user,
    CLAIMS_SETTING,
    CLAIM_SUB_SETTING,
};
pub use pool::create_pool;
pub use store::PgRoleStore;
