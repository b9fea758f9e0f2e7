//! REST API handlers

mod attachments;
mod complaints;
mod employees;
mod events;
mod health;
mod notifications;
mod stats;
mod users;

pub use attachments::*;
pub use complaints::*;
pub use employees::*;
pub use events::*;
pub use health::*;
pub use notifications::*;
pub use stats::*;
pub use users::*;
