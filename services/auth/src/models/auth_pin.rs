//! One-time PIN model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// One-time sign-in code. At most one row exists per user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct AuthPin {
    pub id: Uuid,
    pub user_id: Uuid,
    pub pin_code: String,
    /// Last issuance time; the validity window is measured from here.
    pub updated_at: DateTime<Utc>,
}

impl AuthPin {
    /// Whether the pin was written strictly after `since`
    pub fn is_fresh(&self, since: DateTime<Utc>) -> bool {
        self.updated_at > since
    }
}
