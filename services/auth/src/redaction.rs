//! Masking of personal data before it reaches the logs

use std::fmt;

/// Display wrapper that masks an email address: `ada.lovelace@example.com`
/// prints as `a***@example.com`.
pub struct MaskedEmail<'a>(pub &'a str);

impl fmt::Display for MaskedEmail<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0.split_once('@') {
            Some((local, domain)) => match local.chars().next() {
                Some(first) => write!(f, "{}***@{}", first, domain),
                None => write!(f, "***@{}", domain),
            },
            None => f.write_str("***"),
        }
    }
}

/// Mask an email address for logging
pub fn mask_email(email: &str) -> MaskedEmail<'_> {
    MaskedEmail(email)
}
