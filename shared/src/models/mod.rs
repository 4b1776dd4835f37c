//! Domain models for the procurement platform

pub mod invitation;
pub mod job_site;
pub mod notification;
pub mod order;
pub mod profile;
pub mod quotation;
pub mod supplier;

pub use invitation::{InvitationStatus, JobSiteInvitation};
pub use job_site::{Address, JobSite, JobSiteStatus};
pub use notification::{Notification, NotificationKind};
pub use order::{
    DeliveredItem, DeliveryRecord, Order, OrderItem, OrderStatus, OrderStatusEntry,
    PaymentDetails, PaymentStatus,
};
pub use profile::{
    Profile, ProfilePreferences, Subscription, SubscriptionStatus, SubscriptionUsage, UsageCounter,
};
pub use quotation::{Quotation, QuotationStatus, SupplierQuote, SupplierQuoteStatus};
pub use supplier::{Supplier, SupplierContact};
