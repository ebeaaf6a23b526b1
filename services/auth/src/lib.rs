//! Passwordless authentication service
//!
//! Users sign in either with a one-time PIN mailed to them or with a Google
//! Identity credential. Both paths end by rotating the user's persistent
//! session token and handing it to the browser in a cookie.

pub mod config;
pub mod database;
pub mod error;
pub mod google;
pub mod mailer;
pub mod models;
pub mod pin;
pub mod redaction;
pub mod repositories;
pub mod routes;
pub mod session;
pub mod validation;

use sqlx::PgPool;
use std::sync::Arc;

use crate::{
    config::AuthConfig,
    google::IdTokenVerifier,
    mailer::Mailer,
    repositories::{
        MemoryStore, PgPinRepository, PgTokenRepository, PgUserDirectory, PinRepository,
        TokenRepository, UserDirectory,
    },
    session::SessionCookies,
};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Present when backed by PostgreSQL; used by the health check
    pub db_pool: Option<PgPool>,
    pub users: Arc<dyn UserDirectory>,
    pub pins: Arc<dyn PinRepository>,
    pub tokens: Arc<dyn TokenRepository>,
    pub mailer: Arc<dyn Mailer>,
    pub verifier: Arc<dyn IdTokenVerifier>,
    pub cookies: SessionCookies,
    pub config: Arc<AuthConfig>,
}

impl AppState {
    /// State backed by PostgreSQL repositories
    pub fn postgres(
        pool: PgPool,
        mailer: Arc<dyn Mailer>,
        verifier: Arc<dyn IdTokenVerifier>,
        config: AuthConfig,
    ) -> Self {
        Self {
            users: Arc::new(PgUserDirectory::new(pool.clone())),
            pins: Arc::new(PgPinRepository::new(pool.clone())),
            tokens: Arc::new(PgTokenRepository::new(pool.clone())),
            db_pool: Some(pool),
            mailer,
            verifier,
            cookies: SessionCookies::new(config.cookie_name.clone(), config.cookie_secure),
            config: Arc::new(config),
        }
    }

    /// State backed by a single in-memory store
    pub fn in_memory(
        store: MemoryStore,
        mailer: Arc<dyn Mailer>,
        verifier: Arc<dyn IdTokenVerifier>,
        config: AuthConfig,
    ) -> Self {
        Self {
            db_pool: None,
            users: Arc::new(store.clone()),
            pins: Arc::new(store.clone()),
            tokens: Arc::new(store),
            mailer,
            verifier,
            cookies: SessionCookies::new(config.cookie_name.clone(), config.cookie_secure),
            config: Arc::new(config),
        }
    }
}
