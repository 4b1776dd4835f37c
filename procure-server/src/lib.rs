//! Procurement core services
//!
//! Coordinates procurement between buyers, suppliers and an operator:
//! order lifecycle management, the quotation bidding engine, the
//! subscription quota ledger and the job-site invitation service.
//!
//! External concerns (payments, notifications, object storage, QR
//! rendering) are consumed through the collaborator traits in
//! [`collaborators`]; persistence goes through the versioned in-memory
//! [`store`].

pub mod bootstrap;
pub mod collaborators;
pub mod config;
pub mod core;
pub mod job_sites;
pub mod money;
pub mod orders;
pub mod quotations;
pub mod store;
pub mod subscription;

pub use config::Config;
pub use crate::core::{init_tracing, Collaborators, Core};
