//! Order lifecycle management
//!
//! Owns order state transitions, item delivery accounting and
//! payment gating. The transition graph lives in [`transitions`] and is
//! enforced on every status change.

mod manager;
mod transitions;

pub use manager::{CreateOrder, OrderError, OrderManager, OrderResult, QuickLookups};
pub use transitions::is_valid_transition;
