//! Civic storage abstractions.
//!
//! This crate defines the storage contract the lifecycle core talks to:
//! - user records (identity store backing)
//! - complaint records with per-complaint compare-and-swap commits
//! - image attachments (binary content behind stable references)
//!
//! Design stance:
//! - The store is the only owner of complaint state; callers hold copies.
//! - A commit replaces a complaint only when the caller's version matches and
//!   the new timeline extends the stored one by exactly one entry.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]
#![warn(rust_2018_idioms)]

pub mod attachments;
mod error;
pub mod memory;
#[cfg(feature = "postgres")]
pub mod postgres;
mod traits;

pub use attachments::{attachment_reference, FsAttachmentStore, InMemoryAttachmentStore};
pub use error::{StorageError, StorageResult};
pub use traits::{
    check_append_only, AttachmentStore, CivicStorage, ComplaintStore, QueryWindow, UserStore,
};
