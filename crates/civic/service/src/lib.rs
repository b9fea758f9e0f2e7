//! Civic Service - the HTTP face of the complaint lifecycle.
//!
//! Wires storage, identity, notification sinks, the lifecycle engine and the
//! assignment balancer into one [`AppState`] and exposes them under
//! `/api/v1`. The `civicd` binary is a thin shell around [`Server`].

#![deny(unsafe_code)]

pub mod api;
pub mod config;
pub mod error;
pub mod server;
pub mod state;

pub use api::create_router;
pub use config::ServiceConfig;
pub use error::{ApiError, ApiResult, ServiceError, ServiceResult};
pub use server::Server;
pub use state::AppState;
