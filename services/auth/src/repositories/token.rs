//! Session token repository backed by PostgreSQL

use anyhow::Result;
use async_trait::async_trait;
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use super::TokenRepository;
use crate::models::{AuthToken, User};

/// Create or overwrite a user's token on any executor, so the PIN
/// repository can run it inside its own transaction.
pub(crate) async fn upsert_token<'e, E>(
    executor: E,
    user_id: Uuid,
    token: &str,
) -> sqlx::Result<AuthToken>
where
    E: PgExecutor<'e>,
{
    sqlx::query_as::<_, AuthToken>(
        r#"
        INSERT INTO auth_tokens (user_id, token)
        VALUES ($1, $2)
        ON CONFLICT (user_id)
        DO UPDATE SET token = EXCLUDED.token, updated_at = now()
        RETURNING id, user_id, token, updated_at
        "#,
    )
    .bind(user_id)
    .bind(token)
    .fetch_one(executor)
    .await
}

/// PostgreSQL implementation of [`TokenRepository`]
#[derive(Clone)]
pub struct PgTokenRepository {
    pool: PgPool,
}

impl PgTokenRepository {
    /// Create a new token repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TokenRepository for PgTokenRepository {
    async fn rotate(&self, user_id: Uuid, token: &str) -> Result<AuthToken> {
        Ok(upsert_token(&self.pool, user_id, token).await?)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<AuthToken>> {
        let token = sqlx::query_as::<_, AuthToken>(
            r#"
            SELECT id, user_id, token, updated_at
            FROM auth_tokens
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            r#"
            SELECT u.id, u.email, u.name, u.created_at, u.updated_at
            FROM auth_tokens t
            JOIN users u ON u.id = t.user_id
            WHERE t.token = $1
            "#,
        )
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }
}
