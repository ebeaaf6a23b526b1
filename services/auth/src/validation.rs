//! Decoding of posted forms into typed inputs
//!
//! Each action's form is read with every field optional, then validated
//! into either the typed input or a [`FormError`] before any lookup runs.

use regex::Regex;
use serde::Deserialize;
use std::sync::OnceLock;

/// Raw `login` form
#[derive(Debug, Default, Deserialize)]
pub struct LoginForm {
    pub email: Option<String>,
}

/// Raw `submit` form
#[derive(Debug, Default, Deserialize)]
pub struct SubmitForm {
    pub email: Option<String>,
    pub pin_code: Option<String>,
}

/// Raw `google` form
#[derive(Debug, Default, Deserialize)]
pub struct GoogleForm {
    pub credential: Option<String>,
}

/// Validated `login` input
#[derive(Debug, Clone, PartialEq)]
pub struct LoginInput {
    pub email: String,
}

/// Validated `submit` input
#[derive(Debug, Clone, PartialEq)]
pub struct SubmitInput {
    pub email: String,
    pub pin_code: String,
}

/// Validated `google` input
#[derive(Debug, Clone, PartialEq)]
pub struct GoogleInput {
    pub credential: String,
}

/// A required field was absent or empty. Carries whatever email was posted
/// so the form can be re-rendered with it.
#[derive(Debug, Clone, PartialEq)]
pub struct FormError {
    pub email: String,
}

fn required(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

impl LoginForm {
    pub fn validate(self) -> Result<LoginInput, FormError> {
        match required(self.email) {
            Some(email) => Ok(LoginInput { email }),
            None => Err(FormError {
                email: String::new(),
            }),
        }
    }
}

impl SubmitForm {
    pub fn validate(self) -> Result<SubmitInput, FormError> {
        match (required(self.email), required(self.pin_code)) {
            (Some(email), Some(pin_code)) => Ok(SubmitInput { email, pin_code }),
            (email, _) => Err(FormError {
                email: email.unwrap_or_default(),
            }),
        }
    }
}

impl GoogleForm {
    pub fn validate(self) -> Result<GoogleInput, FormError> {
        match required(self.credential) {
            Some(credential) => Ok(GoogleInput { credential }),
            None => Err(FormError {
                email: String::new(),
            }),
        }
    }
}

/// Whether a submitted code could have been issued at all. Codes that fail
/// this can never match a stored pin.
pub fn is_well_formed_pin(pin_code: &str, length: usize) -> bool {
    static PIN_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex =
        PIN_REGEX.get_or_init(|| Regex::new(r"^[0-9]+$").expect("Failed to compile pin regex"));

    pin_code.len() == length && regex.is_match(pin_code)
}

/// Whether `target` is a same-site path that is safe to redirect to
pub fn is_local_redirect(target: &str) -> bool {
    target.starts_with('/') && !target.starts_with("//") && !target.contains('\\')
}
