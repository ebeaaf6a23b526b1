//! One-time PIN issuance and verification

use anyhow::Result;
use chrono::Utc;
use rand::Rng;
use tracing::{info, warn};

use crate::{
    AppState,
    mailer::DeliveryOutcome,
    models::{AuthToken, User, auth_token::generate_token},
    redaction::mask_email,
};

const PIN_CODE_CHARS: &[u8] = b"0123456789";

/// Build a numeric code of `length` digits, each drawn independently
pub fn create_pin_code<R: Rng + ?Sized>(rng: &mut R, length: usize) -> String {
    (0..length)
        .map(|_| PIN_CODE_CHARS[rng.gen_range(0..PIN_CODE_CHARS.len())] as char)
        .collect()
}

/// Outcome of a `login` action
#[derive(Debug, Clone, PartialEq)]
pub enum PinIssuance {
    /// No user has this email; nothing was written or sent
    UnknownUser,
    /// A pin was stored for the user and mailed
    Issued { user: User, delivery: DeliveryOutcome },
}

/// Issue a fresh pin for the user owning `email`, replacing any earlier one,
/// and mail it. Delivery is best effort: its outcome is reported, not raised.
pub async fn issue_pin(state: &AppState, email: &str) -> Result<PinIssuance> {
    let Some(user) = state.users.find_by_email(email).await? else {
        info!("PIN requested for unknown email {}", mask_email(email));
        return Ok(PinIssuance::UnknownUser);
    };

    let pin_code = create_pin_code(&mut rand::thread_rng(), state.config.pin_length);
    state.pins.upsert(user.id, &pin_code).await?;

    let body = format!("PIN CODE: {}", pin_code);
    let delivery: DeliveryOutcome = state
        .mailer
        .send_mail(&user.email, &state.config.mail_subject, &body)
        .await
        .into();

    match &delivery {
        DeliveryOutcome::Delivered => info!("PIN issued for user: {}", user.id),
        DeliveryOutcome::Failed(reason) => {
            warn!("PIN issued for user {} but delivery failed: {}", user.id, reason)
        }
    }

    Ok(PinIssuance::Issued { user, delivery })
}

/// Check a submitted pin and, if it matches a fresh one, consume it and
/// rotate the user's session token in one transaction.
///
/// Returns `None` for a wrong, expired, or already consumed code.
pub async fn verify_pin(state: &AppState, email: &str, pin_code: &str) -> Result<Option<AuthToken>> {
    let ttl = chrono::Duration::from_std(state.config.pin_ttl())?;
    let since = Utc::now() - ttl;

    let Some(pin) = state.pins.find_fresh(email, pin_code, since).await? else {
        info!("No fresh PIN matched for {}", mask_email(email));
        return Ok(None);
    };

    let token = state
        .pins
        .consume_and_rotate(&pin, since, &generate_token())
        .await?;

    match &token {
        Some(token) => info!("PIN verified, session rotated for user: {}", token.user_id),
        None => info!("PIN for user {} was consumed concurrently", pin.user_id),
    }

    Ok(token)
}
