//! Unified error codes for the procurement platform
//!
//! Error codes are organized by category:
//! - 0xxx: General errors
//! - 1xxx: Authentication errors
//! - 2xxx: Permission errors
//! - 3xxx: Subscription errors
//! - 4xxx: Order errors
//! - 5xxx: Payment errors
//! - 6xxx: Quotation errors
//! - 7xxx: Job site errors
//! - 8xxx: Directory errors (profiles, suppliers)
//! - 9xxx: System errors

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unified error code enum
///
/// All error codes are represented as u16 values for efficient serialization
/// and cross-language compatibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ErrorCode {
    // ==================== 0xxx: General ====================
    /// Operation completed successfully
    Success = 0,
    /// Unknown error
    Unknown = 1,
    /// Validation failed
    ValidationFailed = 2,
    /// Resource not found
    NotFound = 3,
    /// Resource already exists
    AlreadyExists = 4,
    /// Invalid request
    InvalidRequest = 5,
    /// Value out of range
    ValueOutOfRange = 6,

    // ==================== 1xxx: Auth ====================
    /// User is not authenticated
    NotAuthenticated = 1001,
    /// Token has expired
    TokenExpired = 1002,
    /// Token is invalid
    TokenInvalid = 1003,

    // ==================== 2xxx: Permission ====================
    /// Permission denied
    PermissionDenied = 2001,
    /// Only the resource owner may perform this operation
    OwnerRequired = 2002,
    /// Admin role required
    AdminRequired = 2003,

    // ==================== 3xxx: Subscription ====================
    /// Usage quota exceeded for the current billing period
    QuotaExceeded = 3001,
    /// Profile has no active subscription
    NoActiveSubscription = 3002,

    // ==================== 4xxx: Order ====================
    /// Order not found
    OrderNotFound = 4001,
    /// Order status transition is not permitted
    InvalidTransition = 4002,
    /// Delivered quantity would exceed the ordered quantity
    DeliveryExceedsOrder = 4003,
    /// Order is not in a deliverable status
    DeliveryNotAllowed = 4004,
    /// Delivery item index is out of range
    DeliveryItemOutOfRange = 4005,
    /// Order is referenced by a quotation
    OrderHasQuotations = 4006,

    // ==================== 5xxx: Payment ====================
    /// A payment intent already exists for this order
    PaymentIntentExists = 5001,
    /// No order references this payment intent
    PaymentNotFound = 5002,
    /// Payment processing failed
    PaymentFailed = 5003,

    // ==================== 6xxx: Quotation ====================
    /// Quotation not found
    QuotationNotFound = 6001,
    /// Supplier quote not found
    SupplierQuoteNotFound = 6002,
    /// Supplier quote has already been accepted or rejected
    QuoteAlreadyDecided = 6003,
    /// Operation requires a self-managed quotation
    NotSelfManaged = 6004,
    /// Operation requires a draft quotation
    QuotationNotDraft = 6005,
    /// Quotation has already been accepted
    QuotationAlreadyAccepted = 6006,
    /// Quotation has submitted supplier quotes
    QuotationHasQuotes = 6007,
    /// Supplier submission token has expired
    SubmissionExpired = 6008,

    // ==================== 7xxx: Job site ====================
    /// Job site not found
    JobSiteNotFound = 7001,
    /// Invitation not found or not usable
    InvitationNotFound = 7002,
    /// Invitation has expired
    InvitationExpired = 7003,
    /// Invitation has already been accepted
    InvitationAlreadyAccepted = 7004,
    /// Buyer is already a member of the job site
    BuyerAlreadyAdded = 7005,
    /// Buyer is not a member of the job site
    BuyerNotInJobSite = 7006,
    /// Buyer has orders associated with the job site
    BuyerHasOrders = 7007,
    /// Job site has associated orders
    JobSiteHasOrders = 7008,

    // ==================== 8xxx: Directory ====================
    /// Profile not found
    ProfileNotFound = 8001,
    /// Supplier not found
    SupplierNotFound = 8002,
    /// Supplier is not active
    SupplierInactive = 8003,

    // ==================== 9xxx: System ====================
    /// Internal server error
    InternalError = 9001,
    /// Storage error
    StorageError = 9002,
    /// Concurrent modification detected (version mismatch)
    VersionConflict = 9003,
    /// External collaborator call failed
    ExternalDependency = 9004,
}

impl ErrorCode {
    /// Get the numeric code value
    #[inline]
    pub const fn code(&self) -> u16 {
        *self as u16
    }

    /// Check if this is a success code
    #[inline]
    pub const fn is_success(&self) -> bool {
        matches!(self, ErrorCode::Success)
    }

    /// Get the developer-facing English message for this error code
    pub const fn message(&self) -> &'static str {
        match self {
            // General
            ErrorCode::Success => "Operation completed successfully",
            ErrorCode::Unknown => "An unknown error occurred",
            ErrorCode::ValidationFailed => "Validation failed",
            ErrorCode::NotFound => "Resource not found",
            ErrorCode::AlreadyExists => "Resource already exists",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::ValueOutOfRange => "Value is out of range",

            // Auth
            ErrorCode::NotAuthenticated => "User is not authenticated",
            ErrorCode::TokenExpired => "Token has expired",
            ErrorCode::TokenInvalid => "Token is invalid",

            // Permission
            ErrorCode::PermissionDenied => "Permission denied",
            ErrorCode::OwnerRequired => "Only the resource owner may perform this operation",
            ErrorCode::AdminRequired => "Administrator role is required",

            // Subscription
            ErrorCode::QuotaExceeded => "Usage quota exceeded for current subscription period",
            ErrorCode::NoActiveSubscription => "Profile has no active subscription",

            // Order
            ErrorCode::OrderNotFound => "Order not found",
            ErrorCode::InvalidTransition => "Order status transition is not permitted",
            ErrorCode::DeliveryExceedsOrder => "Delivered quantity exceeds ordered quantity",
            ErrorCode::DeliveryNotAllowed => {
                "Order must be in shipping or partially delivered status"
            }
            ErrorCode::DeliveryItemOutOfRange => "Delivery item index is out of range",
            ErrorCode::OrderHasQuotations => "Order is referenced by a quotation",

            // Payment
            ErrorCode::PaymentIntentExists => "Payment intent already exists for this order",
            ErrorCode::PaymentNotFound => "No order references this payment intent",
            ErrorCode::PaymentFailed => "Payment processing failed",

            // Quotation
            ErrorCode::QuotationNotFound => "Quotation not found",
            ErrorCode::SupplierQuoteNotFound => "Supplier quote not found",
            ErrorCode::QuoteAlreadyDecided => "Supplier quote has already been decided",
            ErrorCode::NotSelfManaged => {
                "Only self-managed quotations can be decided by the buyer"
            }
            ErrorCode::QuotationNotDraft => "Quotation must be in draft status",
            ErrorCode::QuotationAlreadyAccepted => "Quotation has already been accepted",
            ErrorCode::QuotationHasQuotes => "Quotation has submitted supplier quotes",
            ErrorCode::SubmissionExpired => "Supplier submission token has expired",

            // Job site
            ErrorCode::JobSiteNotFound => "Job site not found",
            ErrorCode::InvitationNotFound => "Invalid or expired invitation",
            ErrorCode::InvitationExpired => "Invitation has expired",
            ErrorCode::InvitationAlreadyAccepted => "Invitation has already been accepted",
            ErrorCode::BuyerAlreadyAdded => "Buyer already added to job site",
            ErrorCode::BuyerNotInJobSite => "Buyer not found in job site",
            ErrorCode::BuyerHasOrders => "Cannot remove buyer with associated orders",
            ErrorCode::JobSiteHasOrders => "Cannot delete job site with associated orders",

            // Directory
            ErrorCode::ProfileNotFound => "Profile not found",
            ErrorCode::SupplierNotFound => "One or more suppliers not found",
            ErrorCode::SupplierInactive => "Supplier is not active",

            // System
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage error",
            ErrorCode::VersionConflict => "Concurrent modification detected",
            ErrorCode::ExternalDependency => "External collaborator call failed",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.message(), self.code())
    }
}

impl From<ErrorCode> for u16 {
    fn from(code: ErrorCode) -> Self {
        code.code()
    }
}

/// Error returned when converting an unknown u16 into an [`ErrorCode`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvalidErrorCode(pub u16);

impl fmt::Display for InvalidErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid error code: {}", self.0)
    }
}

impl std::error::Error for InvalidErrorCode {}

impl TryFrom<u16> for ErrorCode {
    type Error = InvalidErrorCode;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Success),
            1 => Ok(Self::Unknown),
            2 => Ok(Self::ValidationFailed),
            3 => Ok(Self::NotFound),
            4 => Ok(Self::AlreadyExists),
            5 => Ok(Self::InvalidRequest),
            6 => Ok(Self::ValueOutOfRange),
            1001 => Ok(Self::NotAuthenticated),
            1002 => Ok(Self::TokenExpired),
            1003 => Ok(Self::TokenInvalid),
            2001 => Ok(Self::PermissionDenied),
            2002 => Ok(Self::OwnerRequired),
            2003 => Ok(Self::AdminRequired),
            3001 => Ok(Self::QuotaExceeded),
            3002 => Ok(Self::NoActiveSubscription),
            4001 => Ok(Self::OrderNotFound),
            4002 => Ok(Self::InvalidTransition),
            4003 => Ok(Self::DeliveryExceedsOrder),
            4004 => Ok(Self::DeliveryNotAllowed),
            4005 => Ok(Self::DeliveryItemOutOfRange),
            4006 => Ok(Self::OrderHasQuotations),
            5001 => Ok(Self::PaymentIntentExists),
            5002 => Ok(Self::PaymentNotFound),
            5003 => Ok(Self::PaymentFailed),
            6001 => Ok(Self::QuotationNotFound),
            6002 => Ok(Self::SupplierQuoteNotFound),
            6003 => Ok(Self::QuoteAlreadyDecided),
            6004 => Ok(Self::NotSelfManaged),
            6005 => Ok(Self::QuotationNotDraft),
            6006 => Ok(Self::QuotationAlreadyAccepted),
            6007 => Ok(Self::QuotationHasQuotes),
            6008 => Ok(Self::SubmissionExpired),
            7001 => Ok(Self::JobSiteNotFound),
            7002 => Ok(Self::InvitationNotFound),
            7003 => Ok(Self::InvitationExpired),
            7004 => Ok(Self::InvitationAlreadyAccepted),
            7005 => Ok(Self::BuyerAlreadyAdded),
            7006 => Ok(Self::BuyerNotInJobSite),
            7007 => Ok(Self::BuyerHasOrders),
            7008 => Ok(Self::JobSiteHasOrders),
            8001 => Ok(Self::ProfileNotFound),
            8002 => Ok(Self::SupplierNotFound),
            8003 => Ok(Self::SupplierInactive),
            9001 => Ok(Self::InternalError),
            9002 => Ok(Self::StorageError),
            9003 => Ok(Self::VersionConflict),
            9004 => Ok(Self::ExternalDependency),
            _ => Err(InvalidErrorCode(value)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in [
            ErrorCode::Success,
            ErrorCode::QuotaExceeded,
            ErrorCode::DeliveryExceedsOrder,
            ErrorCode::InvitationExpired,
            ErrorCode::VersionConflict,
        ] {
            assert_eq!(ErrorCode::try_from(code.code()), Ok(code));
        }
    }

    #[test]
    fn test_unknown_code_rejected() {
        assert_eq!(ErrorCode::try_from(999), Err(InvalidErrorCode(999)));
        assert_eq!(ErrorCode::try_from(4999), Err(InvalidErrorCode(4999)));
    }

    #[test]
    fn test_serde_as_u16() {
        let json = serde_json::to_string(&ErrorCode::QuotaExceeded).unwrap();
        assert_eq!(json, "3001");
        let code: ErrorCode = serde_json::from_str("4003").unwrap();
        assert_eq!(code, ErrorCode::DeliveryExceedsOrder);
    }
}
