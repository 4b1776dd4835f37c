//! External collaborator contracts
//!
//! The core consumes payments, notifications, object storage and QR
//! rendering through these narrow traits; their implementations are
//! out of scope. In-process implementations are provided for tests
//! and local runs.

pub mod files;
pub mod notify;
pub mod payment;
pub mod qr;

pub use files::{FileStore, InMemoryFileStore};
pub use notify::{NotificationDispatcher, RecordingDispatcher, TracingDispatcher};
pub use payment::{InProcessGateway, PaymentGateway, PaymentIntent, PaymentMethod};
pub use qr::{InlineQrRenderer, QrRenderer};

use shared::error::{AppError, ErrorCode};
use thiserror::Error;

/// Failure of an external collaborator call
///
/// These never corrupt local entity state: services apply local changes
/// only after the external call succeeds.
#[derive(Debug, Error)]
pub enum CollaboratorError {
    #[error("collaborator unavailable: {0}")]
    Unavailable(String),

    #[error("collaborator rejected the request: {0}")]
    Rejected(String),
}

impl From<CollaboratorError> for AppError {
    fn from(err: CollaboratorError) -> Self {
        AppError::with_message(ErrorCode::ExternalDependency, err.to_string())
    }
}
