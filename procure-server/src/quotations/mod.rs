//! Quotation and bidding engine
//!
//! Owns quotation state transitions and the set of competing supplier
//! quotes attached to each quotation, including acceptance/rejection.

mod engine;

pub use engine::{
    AddSupplierQuote, CreateQuotation, QuotationEngine, QuotationError, QuotationResult,
    UpdateQuotation,
};
