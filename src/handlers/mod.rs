//! HTTP request handlers
//!
//! - `api` - Health check endpoint
//! - `webhooks` - Telephony provider webhooks (poll, recording callback, status)
//! - `control` - Driver-to-transport control endpoints (say-text, listen-to-user)
//! - `recording` - Recording URL lookup
//! - `calls` - Live session listing

pub mod api;
pub mod calls;
pub mod control;
pub mod recording;
pub mod webhooks;
