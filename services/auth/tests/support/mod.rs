//! Shared fixtures for the router tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, header},
};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode, jwk::JwkSet};
use pin_auth::{
    AppState,
    config::AuthConfig,
    google::GoogleIdTokenVerifier,
    mailer::{MailError, Mailer},
    models::User,
    repositories::MemoryStore,
    routes::create_router,
};
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;

pub const CLIENT_ID: &str = "test-client-id.apps.googleusercontent.com";
pub const KEY_ID: &str = "test-key-1";

const SIGNING_KEY: &[u8] = include_bytes!("../fixtures/google_test_key.pem");
const KEY_SET: &str = include_str!("../fixtures/google_jwks.json");

#[derive(Debug, Clone, PartialEq)]
pub struct SentMail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer that keeps every message instead of sending it
#[derive(Default)]
pub struct RecordingMailer {
    sent: Mutex<Vec<SentMail>>,
    fail: bool,
}

impl RecordingMailer {
    pub fn failing() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn sent(&self) -> Vec<SentMail> {
        self.sent.lock().unwrap().clone()
    }

    /// PIN from the most recent message
    pub fn last_pin(&self) -> String {
        let sent = self.sent();
        let mail = sent.last().expect("no mail was sent");
        mail.body
            .strip_prefix("PIN CODE: ")
            .expect("unexpected mail body")
            .to_string()
    }
}

#[async_trait]
impl Mailer for RecordingMailer {
    async fn send_mail(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        self.sent.lock().unwrap().push(SentMail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });

        if self.fail {
            return Err(MailError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: MemoryStore,
    pub mailer: Arc<RecordingMailer>,
    pub state: AppState,
}

pub fn verifier() -> GoogleIdTokenVerifier {
    let key_set: JwkSet = serde_json::from_str(KEY_SET).unwrap();
    GoogleIdTokenVerifier::with_key_set(CLIENT_ID, &key_set).unwrap()
}

pub fn test_app_with(mailer: RecordingMailer) -> TestApp {
    let store = MemoryStore::new();
    let mailer = Arc::new(mailer);
    let state = AppState::in_memory(
        store.clone(),
        mailer.clone(),
        Arc::new(verifier()),
        AuthConfig::default(),
    );

    TestApp {
        router: create_router(state.clone()),
        store,
        mailer,
        state,
    }
}

pub fn test_app() -> TestApp {
    test_app_with(RecordingMailer::default())
}

impl TestApp {
    pub async fn add_user(&self, email: &str) -> User {
        let user = User::new(email, Some("Test User".to_string()));
        self.store.insert_user(user.clone()).await;
        user
    }

    pub async fn post_form(&self, uri: &str, form: &[(&str, &str)]) -> Response<Body> {
        self.request(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from(encode_form(form)))
                .unwrap(),
        )
        .await
    }

    pub async fn get(&self, uri: &str, cookie: Option<&str>) -> Response<Body> {
        let mut builder = Request::builder().method("GET").uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn request(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

fn encode_form(form: &[(&str, &str)]) -> String {
    form.iter()
        .map(|(key, value)| format!("{}={}", key, percent_encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

fn percent_encode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                (b as char).to_string()
            }
            _ => format!("%{:02X}", b),
        })
        .collect()
}

pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::LOCATION)
        .map(|v| v.to_str().unwrap().to_string())
}

/// Value of the `session_id` cookie set by the response
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .find_map(|v| {
            v.split(';')
                .next()
                .and_then(|pair| pair.trim().strip_prefix("session_id="))
                .map(str::to_string)
        })
}

pub fn now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap()
        .as_secs()
}

/// Claims of a valid Google credential for `email`
pub fn google_claims(email: &str) -> Value {
    json!({
        "iss": "https://accounts.google.com",
        "aud": CLIENT_ID,
        "sub": "110169484474386276334",
        "email": email,
        "email_verified": true,
        "name": "Ada Lovelace",
        "given_name": "Ada",
        "family_name": "Lovelace",
        "picture": "https://example.com/ada.png",
        "iat": now(),
        "exp": now() + 3600,
    })
}

/// Sign claims the way Google does
pub fn sign_credential(claims: &Value) -> String {
    sign_with_kid(claims, KEY_ID)
}

pub fn sign_with_kid(claims: &Value, kid: &str) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = Some(kid.to_string());
    let key = EncodingKey::from_rsa_pem(SIGNING_KEY).unwrap();
    encode(&header, claims, &key).unwrap()
}
