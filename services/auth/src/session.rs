//! Session cookie management

use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use tracing::info;

use crate::{AppState, models::User};

/// Reads and writes the session identifier cookie
#[derive(Debug, Clone)]
pub struct SessionCookies {
    name: String,
    secure: bool,
}

impl SessionCookies {
    /// Create a new cookie manager
    pub fn new(name: impl Into<String>, secure: bool) -> Self {
        Self {
            name: name.into(),
            secure,
        }
    }

    /// Cookie name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store the session token, replacing any previous one
    pub fn set_session_id(&self, jar: CookieJar, token: &str) -> CookieJar {
        let cookie = Cookie::build((self.name.clone(), token.to_string()))
            .path("/")
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax);

        jar.add(cookie)
    }

    /// Current session token, if any
    pub fn session_id(&self, jar: &CookieJar) -> Option<String> {
        jar.get(&self.name)
            .map(|cookie| cookie.value().to_string())
            .filter(|value| !value.is_empty())
    }
}

/// Resolve the user signed in through the session cookie
pub async fn current_user(state: &AppState, jar: &CookieJar) -> anyhow::Result<Option<User>> {
    let Some(token) = state.cookies.session_id(jar) else {
        return Ok(None);
    };

    let user = state.tokens.find_user_by_token(&token).await?;
    if let Some(user) = &user {
        info!("Resolved session for user: {}", user.id);
    }

    Ok(user)
}
