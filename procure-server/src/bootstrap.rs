//! First-run bootstrap
//!
//! Seeds the default admin profile. Idempotent: running it against a
//! store that already holds an admin changes nothing.

use crate::config::Config;
use crate::store::Store;
use chrono::{Duration, Utc};
use shared::error::AppResult;
use shared::models::{Profile, ProfilePreferences, SubscriptionUsage};
use shared::types::new_entity_id;

/// Ensure a default admin profile exists.
///
/// Returns the created profile, or `None` when an admin was already
/// present.
pub fn ensure_default_admin(store: &Store, config: &Config) -> AppResult<Option<Profile>> {
    if store.profiles.find(|p| p.is_admin).is_some() {
        tracing::debug!("admin profile already present, skipping bootstrap");
        return Ok(None);
    }

    let now = Utc::now();
    let admin = Profile {
        id: new_entity_id(),
        company_name: "Administrator".into(),
        email: config.default_admin_email.clone(),
        is_admin: true,
        preferences: ProfilePreferences::default(),
        subscription: None,
        subscription_usage: SubscriptionUsage::new_period(now, now + Duration::days(30)),
        created_at: now,
    };
    store.profiles.insert(admin.id.clone(), admin.clone())?;
    tracing::info!(profile = %admin.id, email = %admin.email, "default admin created");
    Ok(Some(admin))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bootstrap_is_idempotent() {
        let store = Store::new();
        let config = Config::default();

        let first = ensure_default_admin(&store, &config).unwrap();
        let admin = first.unwrap();
        assert!(admin.is_admin);
        assert_eq!(admin.email, config.default_admin_email);

        let second = ensure_default_admin(&store, &config).unwrap();
        assert!(second.is_none());
        assert_eq!(store.profiles.len(), 1);
    }
}
