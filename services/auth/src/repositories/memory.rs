//! In-process store implementing every repository trait
//!
//! All state sits behind one mutex, so `consume_and_rotate` is atomic with
//! respect to every other call. Used by the router tests and handy for
//! running the service without PostgreSQL.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{PinRepository, TokenRepository, UserDirectory};
use crate::models::{AuthPin, AuthToken, User};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Uuid, User>,
    /// Keyed by user id
    pins: HashMap<Uuid, AuthPin>,
    /// Keyed by user id
    tokens: HashMap<Uuid, AuthToken>,
}

impl Inner {
    fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.to_lowercase();
        self.users
            .values()
            .find(|user| user.email.to_lowercase() == email)
    }

    fn rotate(&mut self, user_id: Uuid, token: &str) -> AuthToken {
        let now = Utc::now();
        let entry = self.tokens.entry(user_id).or_insert_with(|| AuthToken {
            id: Uuid::new_v4(),
            user_id,
            token: String::new(),
            updated_at: now,
        });
        entry.token = token.to_string();
        entry.updated_at = now;
        entry.clone()
    }
}

/// Shared in-memory store
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to the directory
    pub async fn insert_user(&self, user: User) {
        self.inner.lock().await.users.insert(user.id, user);
    }

    /// Overwrite the issuance time of a user's pin. Returns false when the
    /// user has no pin.
    pub async fn set_pin_updated_at(&self, user_id: Uuid, updated_at: DateTime<Utc>) -> bool {
        match self.inner.lock().await.pins.get_mut(&user_id) {
            Some(pin) => {
                pin.updated_at = updated_at;
                true
            }
            None => false,
        }
    }

    /// Number of pins currently stored, across all users
    pub async fn pin_count(&self) -> usize {
        self.inner.lock().await.pins.len()
    }

    /// Number of tokens currently stored, across all users
    pub async fn token_count(&self) -> usize {
        self.inner.lock().await.tokens.len()
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        Ok(self.inner.lock().await.user_by_email(email).cloned())
    }
}

#[async_trait]
impl PinRepository for MemoryStore {
    async fn upsert(&self, user_id: Uuid, pin_code: &str) -> Result<AuthPin> {
        let now = Utc::now();
        let mut inner = self.inner.lock().await;
        let pin = inner.pins.entry(user_id).or_insert_with(|| AuthPin {
            id: Uuid::new_v4(),
            user_id,
            pin_code: String::new(),
            updated_at: now,
        });
        pin.pin_code = pin_code.to_string();
        pin.updated_at = now;
        Ok(pin.clone())
    }

    async fn find_fresh(
        &self,
        email: &str,
        pin_code: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<AuthPin>> {
        let inner = self.inner.lock().await;
        let Some(user) = inner.user_by_email(email) else {
            return Ok(None);
        };

        Ok(inner
            .pins
            .get(&user.id)
            .filter(|pin| pin.pin_code == pin_code && pin.is_fresh(since))
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<AuthPin>> {
        Ok(self.inner.lock().await.pins.get(&user_id).cloned())
    }

    async fn consume_and_rotate(
        &self,
        pin: &AuthPin,
        since: DateTime<Utc>,
        new_token: &str,
    ) -> Result<Option<AuthToken>> {
        let mut inner = self.inner.lock().await;

        let still_matches = inner.pins.get(&pin.user_id).is_some_and(|current| {
            current.id == pin.id && current.pin_code == pin.pin_code && current.is_fresh(since)
        });
        if !still_matches {
            return Ok(None);
        }

        inner.pins.remove(&pin.user_id);
        Ok(Some(inner.rotate(pin.user_id, new_token)))
    }
}

#[async_trait]
impl TokenRepository for MemoryStore {
    async fn rotate(&self, user_id: Uuid, token: &str) -> Result<AuthToken> {
        Ok(self.inner.lock().await.rotate(user_id, token))
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Option<AuthToken>> {
        Ok(self.inner.lock().await.tokens.get(&user_id).cloned())
    }

    async fn find_user_by_token(&self, token: &str) -> Result<Option<User>> {
        let inner = self.inner.lock().await;
        Ok(inner
            .tokens
            .values()
            .find(|stored| stored.token == token)
            .and_then(|stored| inner.users.get(&stored.user_id))
            .cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    async fn store_with_user(email: &str) -> (MemoryStore, User) {
        let store = MemoryStore::new();
        let user = User::new(email, None);
        store.insert_user(user.clone()).await;
        (store, user)
    }

    #[tokio::test]
    async fn email_lookup_ignores_case() {
        let (store, user) = store_with_user("Ada@Example.com").await;

        let found = store.find_by_email("ada@example.COM").await.unwrap();
        assert_eq!(found.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn upsert_keeps_one_pin_per_user() {
        let (store, user) = store_with_user("ada@example.com").await;

        let first = store.upsert(user.id, "111111").await.unwrap();
        let second = store.upsert(user.id, "222222").await.unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(store.pin_count().await, 1);
        let current = PinRepository::find_by_user(&store, user.id).await.unwrap();
        assert_eq!(current.unwrap().pin_code, "222222");
    }

    #[tokio::test]
    async fn consume_is_single_use() {
        let (store, user) = store_with_user("ada@example.com").await;
        let since = Utc::now() - Duration::minutes(5);
        let pin = store.upsert(user.id, "123456").await.unwrap();

        let first = store.consume_and_rotate(&pin, since, "token-a").await.unwrap();
        let second = store.consume_and_rotate(&pin, since, "token-b").await.unwrap();

        assert_eq!(first.map(|t| t.token), Some("token-a".to_string()));
        assert!(second.is_none());
        assert_eq!(store.pin_count().await, 0);
        let token = TokenRepository::find_by_user(&store, user.id).await.unwrap();
        assert_eq!(token.unwrap().token, "token-a");
    }

    #[tokio::test]
    async fn consume_rejects_reissued_pin() {
        let (store, user) = store_with_user("ada@example.com").await;
        let since = Utc::now() - Duration::minutes(5);
        let matched = store.upsert(user.id, "123456").await.unwrap();
        store.upsert(user.id, "654321").await.unwrap();

        let result = store
            .consume_and_rotate(&matched, since, "token")
            .await
            .unwrap();

        assert!(result.is_none());
        assert_eq!(store.pin_count().await, 1);
        assert_eq!(store.token_count().await, 0);
    }

    #[tokio::test]
    async fn token_resolves_to_owner() {
        let (store, user) = store_with_user("ada@example.com").await;
        store.rotate(user.id, "old").await.unwrap();
        store.rotate(user.id, "new").await.unwrap();

        assert!(store.find_user_by_token("old").await.unwrap().is_none());
        let owner = store.find_user_by_token("new").await.unwrap();
        assert_eq!(owner.map(|u| u.id), Some(user.id));
        assert_eq!(store.token_count().await, 1);
    }
}
