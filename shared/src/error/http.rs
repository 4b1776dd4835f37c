//! HTTP status code mapping for error codes

use super::codes::ErrorCode;
use http::StatusCode;

impl ErrorCode {
    /// Get the appropriate HTTP status code for this error code
    pub fn http_status(&self) -> StatusCode {
        match self {
            // Success
            Self::Success => StatusCode::OK,

            // 404 Not Found
            Self::NotFound
            | Self::OrderNotFound
            | Self::QuotationNotFound
            | Self::SupplierQuoteNotFound
            | Self::JobSiteNotFound
            | Self::InvitationNotFound
            | Self::PaymentNotFound
            | Self::ProfileNotFound
            | Self::SupplierNotFound
            | Self::BuyerNotInJobSite => StatusCode::NOT_FOUND,

            // 409 Conflict
            Self::AlreadyExists
            | Self::QuotaExceeded
            | Self::InvalidTransition
            | Self::DeliveryExceedsOrder
            | Self::DeliveryNotAllowed
            | Self::OrderHasQuotations
            | Self::PaymentIntentExists
            | Self::QuoteAlreadyDecided
            | Self::NotSelfManaged
            | Self::QuotationNotDraft
            | Self::QuotationAlreadyAccepted
            | Self::QuotationHasQuotes
            | Self::InvitationAlreadyAccepted
            | Self::BuyerAlreadyAdded
            | Self::BuyerHasOrders
            | Self::JobSiteHasOrders
            | Self::SupplierInactive
            | Self::VersionConflict => StatusCode::CONFLICT,

            // 401 Unauthorized
            Self::NotAuthenticated | Self::TokenExpired | Self::TokenInvalid => {
                StatusCode::UNAUTHORIZED
            }

            // 403 Forbidden
            Self::PermissionDenied | Self::OwnerRequired | Self::AdminRequired => {
                StatusCode::FORBIDDEN
            }

            // 400 Bad Request
            Self::Unknown
            | Self::ValidationFailed
            | Self::InvalidRequest
            | Self::ValueOutOfRange
            | Self::DeliveryItemOutOfRange => StatusCode::BAD_REQUEST,

            // 410 Gone (expired credentials)
            Self::InvitationExpired | Self::SubmissionExpired => StatusCode::GONE,

            // 402 Payment Required
            Self::PaymentFailed | Self::NoActiveSubscription => StatusCode::PAYMENT_REQUIRED,

            // 502 Bad Gateway (collaborator failures)
            Self::ExternalDependency => StatusCode::BAD_GATEWAY,

            // 500 Internal Server Error
            Self::InternalError | Self::StorageError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ErrorCode::QuotaExceeded.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::OrderNotFound.http_status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ErrorCode::DeliveryItemOutOfRange.http_status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ErrorCode::InvitationExpired.http_status(), StatusCode::GONE);
        assert_eq!(
            ErrorCode::SupplierInactive.http_status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ErrorCode::ExternalDependency.http_status(),
            StatusCode::BAD_GATEWAY
        );
    }
}
