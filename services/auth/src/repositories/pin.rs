//! PIN repository backed by PostgreSQL

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{PinRepository, token::upsert_token};
use crate::models::{AuthPin, AuthToken};

/// PostgreSQL implementation of [`PinRepository`]
#[derive(Clone)]
pub struct PgPinRepository {
    pool: PgPool,
}

impl PgPinRepository {
    /// Create a new pin repository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PinRepository for PgPinRepository {
    async fn upsert(&self, user_id: Uuid, pin_code: &str) -> Result<AuthPin> {
        let pin = sqlx::query_as::<_, AuthPin>(
            r#"
            INSERT INTO auth_pins (user_id, pin_code)
            VALUES ($1, $2)
            ON CONFLICT (user_id)
            DO UPDATE SET pin_code = EXCLUDED.pin_code, updated_at = now()
            RETURNING id, user_id, pin_code, updated_at
            "#,
        )
        .bind(user_id)
        .bind(pin_code)
        .fetch_one(&self.pool)
        .await?;

        Ok(pin)
    }

    async fn find_fresh(
        &self,
        email: &str,
        pin_code: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AuthPin>> {
        let pin = sqlx::query_as::<_, AuthPin>(
            r#"
            SELECT p.id, p.user_id, p.pin_code, p.updated_at
            FROM auth_pins p
            JOIN users u ON u.id = p.user_id
            WHERE p.pin_code = $1
              AND lower(u.email) = lower($2)
              AND p.updated_at > $3
            LIMIT 1
            "#,
        )
        .bind(pin_code)
        .bind(email)
        .bind(since)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pin)
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<AuthPin>> {
        let pin = sqlx::query_as::<_, AuthPin>(
            r#"
            SELECT id, user_id, pin_code, updated_at
            FROM auth_pins
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(pin)
    }

    async fn consume_and_rotate(
        &self,
        pin: &AuthPin,
        since: DateTime<Utc>,
        new_token: &str,
    ) -> Result<Option<AuthToken>> {
        let mut tx = self.pool.begin().await?;

        // Re-check code and freshness: the row may have been re-issued
        // since it was matched.
        let deleted = sqlx::query(
            r#"
            DELETE FROM auth_pins
            WHERE id = $1 AND pin_code = $2 AND updated_at > $3
            "#,
        )
        .bind(pin.id)
        .bind(&pin.pin_code)
        .bind(since)
        .execute(&mut *tx)
        .await?;

        if deleted.rows_affected() == 0 {
            info!("Pin {} was already consumed, rolling back", pin.id);
            tx.rollback().await?;
            return Ok(None);
        }

        let token = upsert_token(&mut *tx, pin.user_id, new_token).await?;
        tx.commit().await?;

        Ok(Some(token))
    }
}
