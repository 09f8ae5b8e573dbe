use async_trait::async_trait;
use sqlx::PgPool;

use super::identity::set_current_user;
use crate::backend::RoleStore;
use crate::error::AdminResult;
use crate::models::{Profile, Role, Session, UserRole};

/// `RoleStore` backed by a direct Postgres connection to the project database.
#[derive(Clone)]
pub struct PgRoleStore {
    pool: PgPool,
}

impl PgRoleStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RoleStore for PgRoleStore {
    async fn find_role(&self, user_id: &str, role: Role) -> AdminResult<Option<UserRole>> {
        let row = sqlx::query_as::<_, UserRole>(
            "SELECT user_id::text AS user_id, role, created_at
             FROM user_roles
             WHERE user_id = $1::uuid AND role = $2
             LIMIT 1",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn delete_roles(&self, user_id: &str, role: Role) -> AdminResult<u64> {
        let result = sqlx::query("DELETE FROM user_roles WHERE user_id = $1::uuid AND role = $2")
            .bind(user_id)
            .bind(role.as_str())
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert_role(&self, user_id: &str, role: Role) -> AdminResult<UserRole> {
        let row = sqlx::query_as::<_, UserRole>(
            "INSERT INTO user_roles (user_id, role) VALUES ($1::uuid, $2)
             RETURNING user_id::text AS user_id, role, created_at",
        )
        .bind(user_id)
        .bind(role.as_str())
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn list_role_holders(&self, role: Role) -> AdminResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "SELECT user_id::text FROM user_roles WHERE role = $1 ORDER BY created_at",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn is_admin_rpc(&self, session: &Session) -> AdminResult<bool> {
        let mut tx = self.pool.begin().await?;
        set_current_user(&mut *tx, session).await?;

        let result: Option<bool> = sqlx::query_scalar("SELECT is_admin()")
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(result.unwrap_or(false))
    }

    async fn get_profile(&self, user_id: &str) -> AdminResult<Option<Profile>> {
        let row = sqlx::query_as::<_, Profile>(
            "SELECT id::text AS id, email, name, role, created_at
             FROM profiles
             WHERE id = $1::uuid",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_profile_by_email(&self, email: &str) -> AdminResult<Option<Profile>> {
        let row = sqlx::query_as::<_, Profile>(
            "SELECT id::text AS id, email, name, role, created_at
             FROM profiles
             WHERE lower(email) = lower($1)
             ORDER BY created_at
             LIMIT 1",
        )
        .bind(email.trim())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_profile_role(&self, user_id: &str, role: Role) -> AdminResult<u64> {
        let result = sqlx::query("UPDATE profiles SET role = $1 WHERE id = $2::uuid")
            .bind(role.as_str())
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
