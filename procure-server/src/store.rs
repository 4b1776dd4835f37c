//! Versioned in-memory document store
//!
//! Stands in for the persistence collaborator: CRUD plus optimistic
//! concurrency, keyed by opaque ids. Each document carries a version
//! counter; `update` compares the caller's expected version and fails
//! with a conflict on mismatch, and `mutate` serializes writers on the
//! same entity by holding the shard entry while a draft copy is edited.
//! A failing mutation leaves the stored document untouched.

use dashmap::DashMap;
use shared::error::{AppError, ErrorCode};
use shared::models::{JobSite, JobSiteInvitation, Order, Profile, Quotation, Supplier};
use thiserror::Error;

/// Storage errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("version conflict on {id}: expected {expected}, found {actual}")]
    VersionConflict {
        id: String,
        expected: u64,
        actual: u64,
    },
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(id) => AppError::not_found(id),
            StoreError::AlreadyExists(id) => {
                AppError::with_message(ErrorCode::AlreadyExists, format!("{} already exists", id))
            }
            StoreError::VersionConflict { .. } => {
                AppError::with_message(ErrorCode::VersionConflict, err.to_string())
            }
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A document together with its version counter
#[derive(Debug, Clone)]
struct Versioned<T> {
    version: u64,
    doc: T,
}

/// One keyed collection of documents
#[derive(Debug)]
pub struct Collection<T: Clone> {
    inner: DashMap<String, Versioned<T>>,
}

impl<T: Clone> Default for Collection<T> {
    fn default() -> Self {
        Self {
            inner: DashMap::new(),
        }
    }
}

impl<T: Clone> Collection<T> {
    /// Insert a new document; fails if the id is taken
    pub fn insert(&self, id: impl Into<String>, doc: T) -> StoreResult<()> {
        let id = id.into();
        match self.inner.entry(id.clone()) {
            dashmap::mapref::entry::Entry::Occupied(_) => Err(StoreError::AlreadyExists(id)),
            dashmap::mapref::entry::Entry::Vacant(slot) => {
                slot.insert(Versioned { version: 1, doc });
                Ok(())
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<T> {
        self.inner.get(id).map(|v| v.doc.clone())
    }

    /// Fetch a document together with its current version (for ETag-style updates)
    pub fn get_versioned(&self, id: &str) -> Option<(u64, T)> {
        self.inner.get(id).map(|v| (v.version, v.doc.clone()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.inner.contains_key(id)
    }

    pub fn remove(&self, id: &str) -> Option<T> {
        self.inner.remove(id).map(|(_, v)| v.doc)
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Replace a document, checking the expected version.
    ///
    /// Returns the new version. A losing writer gets
    /// [`StoreError::VersionConflict`] and must re-read and retry.
    pub fn update(&self, id: &str, expected_version: u64, doc: T) -> StoreResult<u64> {
        let mut entry = self
            .inner
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        if entry.version != expected_version {
            return Err(StoreError::VersionConflict {
                id: id.to_string(),
                expected: expected_version,
                actual: entry.version,
            });
        }
        entry.version += 1;
        entry.doc = doc;
        Ok(entry.version)
    }

    /// Read-modify-write under the entry lock.
    ///
    /// The closure edits a draft copy; the stored document is replaced
    /// only when the closure succeeds, so a failing mutation is
    /// all-or-nothing. Concurrent `mutate` calls on the same id are
    /// serialized; calls on different ids run in parallel.
    pub fn mutate<R, E>(&self, id: &str, f: impl FnOnce(&mut T) -> Result<R, E>) -> Result<R, E>
    where
        E: From<StoreError>,
    {
        let mut entry = self
            .inner
            .get_mut(id)
            .ok_or_else(|| E::from(StoreError::NotFound(id.to_string())))?;
        let mut draft = entry.doc.clone();
        let out = f(&mut draft)?;
        entry.version += 1;
        entry.doc = draft;
        Ok(out)
    }

    /// Snapshot of all documents (unordered)
    pub fn all(&self) -> Vec<T> {
        self.inner.iter().map(|v| v.doc.clone()).collect()
    }

    /// First document matching the predicate, with its id
    pub fn find(&self, pred: impl Fn(&T) -> bool) -> Option<(String, T)> {
        self.inner
            .iter()
            .find(|v| pred(&v.doc))
            .map(|v| (v.key().clone(), v.doc.clone()))
    }

    /// All documents matching the predicate
    pub fn filter(&self, pred: impl Fn(&T) -> bool) -> Vec<T> {
        self.inner
            .iter()
            .filter(|v| pred(&v.doc))
            .map(|v| v.doc.clone())
            .collect()
    }
}

/// The full document store, one collection per entity
#[derive(Debug, Default)]
pub struct Store {
    pub orders: Collection<Order>,
    pub quotations: Collection<Quotation>,
    pub profiles: Collection<Profile>,
    pub suppliers: Collection<Supplier>,
    pub job_sites: Collection<JobSite>,
    pub invitations: Collection<JobSiteInvitation>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve an order by the opaque payment intent id it references
    pub fn order_by_payment_intent(&self, intent_id: &str) -> Option<Order> {
        self.orders
            .find(|o| o.payment_intent_id.as_deref() == Some(intent_id))
            .map(|(_, o)| o)
    }

    /// Resolve an invitation by its token
    pub fn invitation_by_token(&self, token: &str) -> Option<JobSiteInvitation> {
        self.invitations.find(|i| i.token == token).map(|(_, i)| i)
    }

    /// Resolve a quotation by one of its supplier submission tokens
    pub fn quotation_by_submission_token(&self, token: &str) -> Option<Quotation> {
        self.quotations
            .find(|q| q.supplier_quotes.iter().any(|sq| sq.submission_token == token))
            .map(|(_, q)| q)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::models::{JobSite, JobSiteStatus};

    fn site(id: &str) -> JobSite {
        JobSite {
            id: id.to_string(),
            name: format!("Site {}", id),
            owner_profile_id: "p1".into(),
            address: None,
            buyers: vec!["p1".into()],
            status: JobSiteStatus::Active,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn test_insert_rejects_duplicate() {
        let col = Collection::<JobSite>::default();
        col.insert("js1", site("js1")).unwrap();
        assert!(matches!(
            col.insert("js1", site("js1")),
            Err(StoreError::AlreadyExists(_))
        ));
    }

    #[test]
    fn test_update_checks_version() {
        let col = Collection::<JobSite>::default();
        col.insert("js1", site("js1")).unwrap();
        let (v, doc) = col.get_versioned("js1").unwrap();
        assert_eq!(v, 1);

        let new_v = col.update("js1", v, doc.clone()).unwrap();
        assert_eq!(new_v, 2);

        // Stale writer loses
        let err = col.update("js1", v, doc).unwrap_err();
        assert!(matches!(err, StoreError::VersionConflict { .. }));
    }

    #[test]
    fn test_mutate_is_all_or_nothing() {
        let col = Collection::<JobSite>::default();
        col.insert("js1", site("js1")).unwrap();

        let res: Result<(), StoreError> = col.mutate("js1", |s| {
            s.buyers.push("p2".into());
            Err(StoreError::NotFound("forced".into()))
        });
        assert!(res.is_err());

        // Failed mutation did not leak partial changes
        assert_eq!(col.get("js1").unwrap().buyers, vec!["p1".to_string()]);
    }

    #[test]
    fn test_mutate_bumps_version() {
        let col = Collection::<JobSite>::default();
        col.insert("js1", site("js1")).unwrap();
        let _: Result<(), StoreError> = col.mutate("js1", |s| {
            s.buyers.push("p2".into());
            Ok(())
        });
        let (v, doc) = col.get_versioned("js1").unwrap();
        assert_eq!(v, 2);
        assert_eq!(doc.buyers.len(), 2);
    }
}
