//! Job site invitation model
//!
//! Single-use, time-limited token granting job-site membership.

use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Invitation status
///
/// `Pending` may move to `Accepted` or `Expired` exactly once;
/// both are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InvitationStatus {
    #[default]
    Pending,
    Accepted,
    Expired,
}

/// Job site invitation entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSiteInvitation {
    pub id: EntityId,
    pub job_site_id: EntityId,
    pub inviter_profile_id: EntityId,
    /// Opaque unguessable token carried in the invitation link
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub status: InvitationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_by_profile_id: Option<EntityId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub accepted_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl JobSiteInvitation {
    /// Expiry is evaluated lazily at use-time; no background sweep runs
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    pub fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.status == InvitationStatus::Pending && !self.is_expired(now)
    }
}
