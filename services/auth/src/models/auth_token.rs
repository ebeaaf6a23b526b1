//! Persistent session token model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Session credential. One row per user, rotated on every sign-in; the
/// `token` value is what the session cookie carries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuthToken {
    pub id: Uuid,
    pub user_id: Uuid,
    pub token: String,
    pub updated_at: DateTime<Utc>,
}

/// Generate a fresh, unguessable session token value
pub fn generate_token() -> String {
    Uuid::new_v4().to_string()
}
