//! Prism Core - Foundational types for Prism
//!
//! This crate provides the vocabulary every other Prism crate shares:
//! - `TaskId`, `SessionId`, `UserId` - Identifiers
//! - `TaskStatus`, `MediaType` - Task lifecycle and media kinds
//! - Error types and Result alias

mod error;
mod id;
mod types;

pub use error::{PrismError, Result};
pub use id::{SessionId, TaskId, UserId};
pub use types::{MediaType, TaskStatus};
