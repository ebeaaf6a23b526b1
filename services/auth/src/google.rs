//! Google Identity credentials
//!
//! A credential posted by the Google sign-in button is a compact RS256 JWT.
//! It goes through two stages:
//!
//! 1. [`decode_credential_payload`] checks the structure and decodes the
//!    claims. Nothing it returns is trusted.
//! 2. An [`IdTokenVerifier`] checks signature, issuer, audience and expiry.
//!    Only its output may be used to pick an account.
//!
//! [`UnverifiedDecoder`] skips stage 2. It exists for deployments that
//! have not configured a client id yet and has to be switched on
//! explicitly.

use anyhow::Result;
use async_trait::async_trait;
use base64::{
    Engine, alphabet,
    engine::{DecodePaddingMode, GeneralPurpose, GeneralPurposeConfig},
};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header, jwk::JwkSet};
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    sync::Arc,
    time::{Duration, Instant},
};
use thiserror::Error;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Google's published signing keys
pub const GOOGLE_CERTS_URL: &str = "https://www.googleapis.com/oauth2/v3/certs";

/// Accepted `iss` values for Google ID tokens
pub const GOOGLE_ISSUERS: [&str; 2] = ["accounts.google.com", "https://accounts.google.com"];

const KEY_SET_TTL: Duration = Duration::from_secs(3600);
const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// Standard alphabet, padding optional, like the browser's `atob`
const PAYLOAD_ENGINE: GeneralPurpose = GeneralPurpose::new(
    &alphabet::STANDARD,
    GeneralPurposeConfig::new().with_decode_padding_mode(DecodePaddingMode::Indifferent),
);

/// Identity claims carried by a Google credential
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoogleCredential {
    pub sub: String,
    pub email: String,
    pub email_verified: Option<bool>,
    pub name: Option<String>,
    pub given_name: Option<String>,
    pub family_name: Option<String>,
    pub picture: Option<String>,
}

/// Credential errors
#[derive(Error, Debug)]
pub enum CredentialError {
    /// Not a three-part token, bad base64, bad UTF-8 or unexpected JSON
    #[error("Malformed credential: {0}")]
    Malformed(String),

    /// Signature, issuer, audience, expiry or email verification failed
    #[error("Credential rejected: {0}")]
    Rejected(String),

    /// Signed with a key that is not in the trusted key set
    #[error("Unknown signing key: {0}")]
    UnknownKey(String),

    /// The trusted key set could not be loaded
    #[error("Failed to load signing keys: {0}")]
    KeySet(String),
}

/// Stage 1: decode the claims of a credential without verifying anything.
///
/// The middle segment is translated from the URL-safe alphabet to the
/// standard one, base64-decoded, read as UTF-8 and parsed as JSON. A payload
/// without `email` is malformed.
pub fn decode_credential_payload(credential: &str) -> Result<GoogleCredential, CredentialError> {
    let mut segments = credential.split('.');
    let (Some(_), Some(payload), Some(_), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return Err(CredentialError::Malformed(
            "expected three dot-separated segments".to_string(),
        ));
    };

    let standard: String = payload
        .chars()
        .map(|c| match c {
            '-' => '+',
            '_' => '/',
            c => c,
        })
        .collect();

    let bytes = PAYLOAD_ENGINE
        .decode(standard.as_bytes())
        .map_err(|e| CredentialError::Malformed(format!("payload is not base64: {}", e)))?;

    let json = String::from_utf8(bytes)
        .map_err(|e| CredentialError::Malformed(format!("payload is not UTF-8: {}", e)))?;

    serde_json::from_str(&json)
        .map_err(|e| CredentialError::Malformed(format!("unexpected payload: {}", e)))
}

/// Turns a posted credential into identity claims that may be trusted
#[async_trait]
pub trait IdTokenVerifier: Send + Sync {
    async fn verify(&self, credential: &str) -> Result<GoogleCredential, CredentialError>;
}

/// Decodes credentials without verifying them
#[derive(Debug, Clone, Default)]
pub struct UnverifiedDecoder;

#[async_trait]
impl IdTokenVerifier for UnverifiedDecoder {
    async fn verify(&self, credential: &str) -> Result<GoogleCredential, CredentialError> {
        warn!("Accepting Google credential without signature verification");
        decode_credential_payload(credential)
    }
}

enum KeySource {
    Remote { http: reqwest::Client, url: String },
    Static,
}

struct CachedKeys {
    keys: HashMap<String, DecodingKey>,
    fetched_at: Instant,
}

/// Verifies RS256 credentials against Google's key set
pub struct GoogleIdTokenVerifier {
    client_id: String,
    source: KeySource,
    cache: RwLock<Option<CachedKeys>>,
}

impl GoogleIdTokenVerifier {
    /// Verifier that downloads the key set from `certs_url` and refreshes it
    /// hourly or when an unknown key id shows up
    pub fn new(client_id: impl Into<String>, certs_url: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            source: KeySource::Remote {
                http: reqwest::Client::new(),
                url: certs_url.into(),
            },
            cache: RwLock::new(None),
        }
    }

    /// Verifier pinned to a fixed key set
    pub fn with_key_set(
        client_id: impl Into<String>,
        key_set: &JwkSet,
    ) -> Result<Self, CredentialError> {
        Ok(Self {
            client_id: client_id.into(),
            source: KeySource::Static,
            cache: RwLock::new(Some(CachedKeys {
                keys: decoding_keys(key_set)?,
                fetched_at: Instant::now(),
            })),
        })
    }

    async fn key_for(&self, kid: &str) -> Result<DecodingKey, CredentialError> {
        let needs_refresh = {
            let cache = self.cache.read().await;
            match cache.as_ref() {
                Some(cached) => {
                    if let Some(key) = cached.keys.get(kid) {
                        if cached.fetched_at.elapsed() < KEY_SET_TTL
                            || matches!(self.source, KeySource::Static)
                        {
                            return Ok(key.clone());
                        }
                    }
                    cached.fetched_at.elapsed() >= MIN_REFRESH_INTERVAL
                }
                None => true,
            }
        };

        if needs_refresh {
            if let KeySource::Remote { http, url } = &self.source {
                let keys = fetch_key_set(http, url).await?;
                *self.cache.write().await = Some(CachedKeys {
                    keys,
                    fetched_at: Instant::now(),
                });
            }
        }

        self.cache
            .read()
            .await
            .as_ref()
            .and_then(|cached| cached.keys.get(kid).cloned())
            .ok_or_else(|| CredentialError::UnknownKey(kid.to_string()))
    }
}

#[async_trait]
impl IdTokenVerifier for GoogleIdTokenVerifier {
    async fn verify(&self, credential: &str) -> Result<GoogleCredential, CredentialError> {
        // Reject structurally broken input before any key lookup.
        decode_credential_payload(credential)?;

        let header = decode_header(credential)
            .map_err(|e| CredentialError::Malformed(format!("bad header: {}", e)))?;
        if header.alg != Algorithm::RS256 {
            return Err(CredentialError::Rejected(format!(
                "unexpected algorithm {:?}",
                header.alg
            )));
        }
        let kid = header
            .kid
            .ok_or_else(|| CredentialError::Rejected("missing key id".to_string()))?;

        let key = self.key_for(&kid).await?;

        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.client_id]);
        validation.set_issuer(&GOOGLE_ISSUERS);

        let claims = decode::<GoogleCredential>(credential, &key, &validation)
            .map_err(|e| CredentialError::Rejected(e.to_string()))?
            .claims;

        if claims.email_verified == Some(false) {
            return Err(CredentialError::Rejected("email not verified".to_string()));
        }

        Ok(claims)
    }
}

fn decoding_keys(key_set: &JwkSet) -> Result<HashMap<String, DecodingKey>, CredentialError> {
    let mut keys = HashMap::new();
    for jwk in &key_set.keys {
        let Some(kid) = jwk.common.key_id.clone() else {
            continue;
        };
        let key = DecodingKey::from_jwk(jwk)
            .map_err(|e| CredentialError::KeySet(format!("key {}: {}", kid, e)))?;
        keys.insert(kid, key);
    }
    Ok(keys)
}

async fn fetch_key_set(
    http: &reqwest::Client,
    url: &str,
) -> Result<HashMap<String, DecodingKey>, CredentialError> {
    info!("Fetching Google signing keys from {}", url);

    let key_set: JwkSet = http
        .get(url)
        .send()
        .await
        .and_then(|response| response.error_for_status())
        .map_err(|e| CredentialError::KeySet(e.to_string()))?
        .json()
        .await
        .map_err(|e| CredentialError::KeySet(e.to_string()))?;

    decoding_keys(&key_set)
}

/// Google sign-in configuration
#[derive(Debug, Clone)]
pub struct GoogleConfig {
    /// OAuth client id the credentials must be issued for
    pub client_id: Option<String>,
    /// Location of Google's key set
    pub certs_url: String,
    /// Accept credentials without verifying them
    pub allow_unverified: bool,
}

impl GoogleConfig {
    /// Create a new GoogleConfig from environment variables
    ///
    /// # Environment Variables
    /// - `GOOGLE_CLIENT_ID`: OAuth client id (required unless unverified
    ///   credentials are allowed)
    /// - `GOOGLE_CERTS_URL`: Key set location (default: Google's v3 certs)
    /// - `GOOGLE_ALLOW_UNVERIFIED_CREDENTIALS`: `true` to skip signature
    ///   verification (default: false)
    pub fn from_env() -> Result<Self> {
        let client_id = std::env::var("GOOGLE_CLIENT_ID")
            .ok()
            .filter(|id| !id.is_empty());

        let certs_url =
            std::env::var("GOOGLE_CERTS_URL").unwrap_or_else(|_| GOOGLE_CERTS_URL.to_string());

        let allow_unverified = std::env::var("GOOGLE_ALLOW_UNVERIFIED_CREDENTIALS")
            .map(|v| v == "true" || v == "1")
            .unwrap_or(false);

        Ok(GoogleConfig {
            client_id,
            certs_url,
            allow_unverified,
        })
    }

    /// Build the verifier this configuration asks for
    pub fn build_verifier(&self) -> Result<Arc<dyn IdTokenVerifier>> {
        match (&self.client_id, self.allow_unverified) {
            (Some(client_id), allow_unverified) => {
                if allow_unverified {
                    warn!(
                        "GOOGLE_ALLOW_UNVERIFIED_CREDENTIALS ignored because GOOGLE_CLIENT_ID is set"
                    );
                }
                Ok(Arc::new(GoogleIdTokenVerifier::new(
                    client_id.clone(),
                    self.certs_url.clone(),
                )))
            }
            (None, true) => {
                warn!("Google credentials will NOT be verified; set GOOGLE_CLIENT_ID to fix this");
                Ok(Arc::new(UnverifiedDecoder))
            }
            (None, false) => Err(anyhow::anyhow!(
                "GOOGLE_CLIENT_ID environment variable not set"
            )),
        }
    }
}
