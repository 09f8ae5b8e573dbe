use sqlx::PgConnection;

use crate::models::Session;

/// Session setting `is_admin()` and the row-level-security policies read the
/// caller's user id from.
pub const CLAIM_SUB_SETTING: &str = "request.jwt.claim.sub";

/// Full claims document, for policies that read `auth.jwt()`.
pub const CLAIMS_SETTING: &str = "request.jwt.claims";

/// Claims document pushed into the database session for `session`.
pub fn claims_json(session: &Session) -> serde_json::Value {
    serde_json::json!({
        "sub": session.user_id,
        "email": session.email,
        "role": "authenticated",
    })
}

/// Sets the current caller for the database session.
/// Transaction-local: must be called inside the transaction that runs the
/// checks, and is cleared on commit or rollback.
pub async fn set_current_user(conn: &mut PgConnection, session: &Session) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT set_config($1, $2, true), set_config($3, $4, true)")
        .bind(CLAIM_SUB_SETTING)
        .bind(&session.user_id)
        .bind(CLAIMS_SETTING)
        .bind(claims_json(session).to_string())
        .execute(conn)
        .await?;
    Ok(())
}
