//! Supplier directory model

use crate::types::EntityId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Supplier contact person
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupplierContact {
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Supplier company entity
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: EntityId,
    pub company_name: String,
    pub contact: SupplierContact,
    /// Inactive suppliers cannot be routed orders or invited to quote
    pub active: bool,
    /// Product categories served (free-form tags)
    #[serde(default)]
    pub categories: Vec<String>,
    pub created_at: DateTime<Utc>,
}
