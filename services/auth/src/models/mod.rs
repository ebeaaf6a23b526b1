//! Authentication service models

pub mod auth_pin;
pub mod auth_token;
pub mod user;

// Re-export for convenience
pub use auth_pin::AuthPin;
pub use auth_token::AuthToken;
pub use user::User;
