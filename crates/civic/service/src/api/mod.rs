//! HTTP API for civicd

pub mod auth;
mod handlers;
mod router;

pub use auth::{CurrentUser, USER_HEADER};
pub use router::create_router;
