//! Shared types for the procurement platform
//!
//! Common types used across crates including domain models,
//! error types, response structures, and utility types.

pub mod error;
pub mod models;
pub mod types;

// Re-exports
pub use serde::{Deserialize, Serialize};

pub use error::{AppError, AppResult, ErrorCode};
pub use types::{EntityId, Timestamp};
