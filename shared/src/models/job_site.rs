//! Job site model

use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Job site status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobSiteStatus {
    #[default]
    Active,
    Completed,
    Suspended,
}

/// Delivery address
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub street: String,
    pub city: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
}

/// Job site entity
///
/// A physical delivery location owned by a buyer profile, optionally
/// shared with other buyers via invitation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSite {
    pub id: EntityId,
    pub name: String,
    /// Owning buyer profile; only the owner can invite or revoke
    pub owner_profile_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    /// Buyer profiles with access to the job site (includes the owner)
    pub buyers: Vec<EntityId>,
    pub status: JobSiteStatus,
    pub created_at: DateTime<Utc>,
}

impl JobSite {
    pub fn has_buyer(&self, profile_id: &str) -> bool {
        self.buyers.iter().any(|b| b == profile_id)
    }
}
