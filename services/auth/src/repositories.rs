//! Repository traits for the persistent state touched by sign-in
//!
//! Handlers only see these traits; `Pg*` types back them with PostgreSQL and
//! [`memory::MemoryStore`] backs all of them in-process.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::models::{AuthPin, AuthToken, User};

pub mod memory;
pub mod pin;
pub mod token;
pub mod user;

pub use memory::MemoryStore;
pub use pin::PgPinRepository;
pub use token::PgTokenRepository;
pub use user::PgUserDirectory;

/// Read access to the user directory
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find a user by email, ignoring case
    async fn find_by_email(&self, email: &str) -> Result<Option<User>>;
}

/// Storage for one-time PIN codes
#[async_trait]
pub trait PinRepository: Send + Sync {
    /// Create or replace the user's pin and reset its validity window
    async fn upsert(&self, user_id: Uuid, pin_code: &str) -> Result<AuthPin>;

    /// Find a pin with this exact code, owned by the user with this email,
    /// written strictly after `since`
    async fn find_fresh(
        &self,
        email: &str,
        pin_code: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AuthPin>>;

    /// Get the current pin of a user, fresh or not
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<AuthPin>>;

    /// Delete `pin` and rotate the owner's session token to `new_token` as
    /// one atomic unit.
    ///
    /// Returns `None`, with nothing written, when the pin no longer exists
    /// in the matched state (consumed by a concurrent verification or
    /// re-issued in between).
    async fn consume_and_rotate(
        &self,
        pin: &AuthPin,
        since: DateTime<Utc>,
        new_token: &str,
    ) -> Result<Option<AuthToken>>;
}

/// Storage for persistent session tokens
#[async_trait]
pub trait TokenRepository: Send + Sync {
    /// Create or overwrite the user's token
    async fn rotate(&self, user_id: Uuid, token: &str) -> Result<AuthToken>;

    /// Get the current token of a user
    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<AuthToken>>;

    /// Resolve a session token value to its owner
    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>>;
}
