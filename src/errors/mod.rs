//! Error types surfaced at the HTTP boundary
//!
//! - `app_error` - handler errors rendered as JSON responses
//! - `auth_error` - authentication failures returned by the auth middleware

pub mod app_error;
pub mod auth_error;

pub use app_error::{AppError, AppResult};
pub use auth_error::{AuthError, AuthResult};
