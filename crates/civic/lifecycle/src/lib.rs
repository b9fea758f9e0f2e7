//! Civic Lifecycle - the complaint state machine.
//!
//! A complaint moves strictly forward through
//! `pending -> assigned -> in-progress -> resolved`. Each step has a role
//! gate, appends exactly one timeline event and raises exactly one
//! notification once the store has accepted the commit.

#![deny(unsafe_code)]

mod config;
mod engine;
mod error;
mod observer;
mod query;
pub mod validation;

pub use config::LifecycleConfig;
pub use engine::{
    CreateComplaint, LifecycleEngine, TransitionOutcome, TransitionPayload,
};
pub use error::{LifecycleError, LifecycleResult, ValidationFailure};
pub use observer::{CommittedTransition, TransitionObserver};
pub use query::{ComplaintQuery, ComplaintStatistics};
pub use validation::validate_image;
