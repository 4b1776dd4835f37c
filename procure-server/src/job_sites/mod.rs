//! Job site membership and invitation service
//!
//! Job sites are owned by one buyer profile and shared with others via
//! single-use, time-limited invitation tokens. Expiry is evaluated at
//! use-time; no background sweep marks invitations expired. The
//! pending-to-accepted flip happens inside one entry mutation, so a
//! token can be redeemed at most once even under concurrent acceptors.

use crate::collaborators::{CollaboratorError, NotificationDispatcher, QrRenderer};
use crate::config::Config;
use crate::store::{Store, StoreError};
use chrono::{Duration, Utc};
use shared::error::{AppError, ErrorCode};
use shared::models::{
    Address, InvitationStatus, JobSite, JobSiteInvitation, JobSiteStatus, NotificationKind,
};
use shared::types::{generate_token, new_entity_id};
use std::sync::Arc;
use thiserror::Error;

/// Token length (bytes of entropy) for invitation tokens
const INVITATION_TOKEN_BYTES: usize = 32;

/// Accepted range for a caller-supplied invitation expiry, in hours
const EXPIRY_HOURS_RANGE: std::ops::RangeInclusive<i64> = 24..=72;

/// Job site service errors
#[derive(Debug, Error)]
pub enum JobSiteError {
    #[error("job site not found: {0}")]
    NotFound(String),

    #[error("profile not found: {0}")]
    ProfileNotFound(String),

    #[error("only the job site owner may perform this action")]
    OwnerRequired,

    #[error("buyer {0} already has access to this job site")]
    BuyerAlreadyAdded(String),

    #[error("buyer {0} does not have access to this job site")]
    BuyerNotInJobSite(String),

    #[error("buyer {0} has orders at this job site")]
    BuyerHasOrders(String),

    #[error("job site has orders and cannot be removed")]
    HasOrders,

    #[error("invitation not found")]
    InvitationNotFound,

    #[error("invitation has expired")]
    InvitationExpired,

    #[error("invitation was already accepted")]
    InvitationAlreadyAccepted,

    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    External(#[from] CollaboratorError),
}

impl From<JobSiteError> for AppError {
    fn from(err: JobSiteError) -> Self {
        match err {
            JobSiteError::NotFound(id) => {
                AppError::new(ErrorCode::JobSiteNotFound).with_detail("id", id)
            }
            JobSiteError::ProfileNotFound(id) => {
                AppError::new(ErrorCode::ProfileNotFound).with_detail("id", id)
            }
            JobSiteError::OwnerRequired => AppError::new(ErrorCode::OwnerRequired),
            JobSiteError::BuyerAlreadyAdded(id) => {
                AppError::new(ErrorCode::BuyerAlreadyAdded).with_detail("profile_id", id)
            }
            JobSiteError::BuyerNotInJobSite(id) => {
                AppError::new(ErrorCode::BuyerNotInJobSite).with_detail("profile_id", id)
            }
            JobSiteError::BuyerHasOrders(id) => {
                AppError::new(ErrorCode::BuyerHasOrders).with_detail("profile_id", id)
            }
            JobSiteError::HasOrders => AppError::new(ErrorCode::JobSiteHasOrders),
            JobSiteError::InvitationNotFound => AppError::new(ErrorCode::InvitationNotFound),
            JobSiteError::InvitationExpired => AppError::new(ErrorCode::InvitationExpired),
            JobSiteError::InvitationAlreadyAccepted => {
                AppError::new(ErrorCode::InvitationAlreadyAccepted)
            }
            JobSiteError::Validation(msg) => AppError::validation(msg),
            JobSiteError::Storage(e) => e.into(),
            JobSiteError::External(e) => e.into(),
        }
    }
}

pub type JobSiteResult<T> = Result<T, JobSiteError>;

/// A freshly created invitation plus the artifacts handed to the inviter
#[derive(Debug, Clone)]
pub struct InvitationBundle {
    pub invitation: JobSiteInvitation,
    /// Join link carrying the token
    pub link: String,
    /// Rendered QR payload for the link
    pub qr_code: String,
}

/// Job site membership and invitation service
pub struct JobSiteService {
    store: Arc<Store>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    qr: Arc<dyn QrRenderer>,
    config: Arc<Config>,
}

impl JobSiteService {
    pub fn new(
        store: Arc<Store>,
        dispatcher: Arc<dyn NotificationDispatcher>,
        qr: Arc<dyn QrRenderer>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            store,
            dispatcher,
            qr,
            config,
        }
    }

    fn owned_site(&self, job_site_id: &str, owner_profile_id: &str) -> JobSiteResult<JobSite> {
        let site = self
            .store
            .job_sites
            .get(job_site_id)
            .ok_or_else(|| JobSiteError::NotFound(job_site_id.to_string()))?;
        if site.owner_profile_id != owner_profile_id {
            return Err(JobSiteError::OwnerRequired);
        }
        Ok(site)
    }

    /// Create a job site owned by `owner_profile_id`.
    ///
    /// The owner is always the first buyer.
    pub fn create_job_site(
        &self,
        owner_profile_id: &str,
        name: &str,
        address: Option<Address>,
    ) -> JobSiteResult<JobSite> {
        if name.trim().is_empty() {
            return Err(JobSiteError::Validation("job site name is required".into()));
        }
        if !self.store.profiles.contains(owner_profile_id) {
            return Err(JobSiteError::ProfileNotFound(owner_profile_id.to_string()));
        }

        let site = JobSite {
            id: new_entity_id(),
            name: name.to_string(),
            owner_profile_id: owner_profile_id.to_string(),
            address,
            buyers: vec![owner_profile_id.to_string()],
            status: JobSiteStatus::Active,
            created_at: Utc::now(),
        };
        self.store.job_sites.insert(site.id.clone(), site.clone())?;
        tracing::info!(job_site = %site.id, owner = owner_profile_id, "job site created");
        Ok(site)
    }

    /// All job sites a buyer has access to
    pub fn find_for_buyer(&self, profile_id: &str) -> Vec<JobSite> {
        let mut sites = self.store.job_sites.filter(|s| s.has_buyer(profile_id));
        sites.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        sites
    }

    /// Grant a buyer access to a job site (owner only)
    pub fn add_buyer(
        &self,
        job_site_id: &str,
        owner_profile_id: &str,
        buyer_profile_id: &str,
    ) -> JobSiteResult<JobSite> {
        self.owned_site(job_site_id, owner_profile_id)?;
        if !self.store.profiles.contains(buyer_profile_id) {
            return Err(JobSiteError::ProfileNotFound(buyer_profile_id.to_string()));
        }
        self.store.job_sites.mutate(job_site_id, |site| {
            if site.has_buyer(buyer_profile_id) {
                return Err(JobSiteError::BuyerAlreadyAdded(buyer_profile_id.to_string()));
            }
            site.buyers.push(buyer_profile_id.to_string());
            Ok(site.clone())
        })
    }

    /// Revoke a buyer's access (owner only).
    ///
    /// The owner cannot be removed, and a buyer with orders at the site
    /// keeps access until those orders are gone.
    pub fn remove_buyer(
        &self,
        job_site_id: &str,
        owner_profile_id: &str,
        buyer_profile_id: &str,
    ) -> JobSiteResult<JobSite> {
        let site = self.owned_site(job_site_id, owner_profile_id)?;
        if buyer_profile_id == site.owner_profile_id {
            return Err(JobSiteError::Validation(
                "the owner cannot be removed from their job site".into(),
            ));
        }
        let has_orders = self
            .store
            .orders
            .find(|o| o.job_site_id == job_site_id && o.buyer_profile_id == buyer_profile_id)
            .is_some();
        if has_orders {
            return Err(JobSiteError::BuyerHasOrders(buyer_profile_id.to_string()));
        }
        self.store.job_sites.mutate(job_site_id, |site| {
            if !site.has_buyer(buyer_profile_id) {
                return Err(JobSiteError::BuyerNotInJobSite(buyer_profile_id.to_string()));
            }
            site.buyers.retain(|b| b != buyer_profile_id);
            Ok(site.clone())
        })
    }

    /// Delete a job site (owner only); refused while any order references it
    pub fn remove_job_site(&self, job_site_id: &str, owner_profile_id: &str) -> JobSiteResult<()> {
        self.owned_site(job_site_id, owner_profile_id)?;
        if self
            .store
            .orders
            .find(|o| o.job_site_id == job_site_id)
            .is_some()
        {
            return Err(JobSiteError::HasOrders);
        }
        // Invitations for the site die with it
        for inv in self
            .store
            .invitations
            .filter(|i| i.job_site_id == job_site_id)
        {
            self.store.invitations.remove(&inv.id);
        }
        self.store.job_sites.remove(job_site_id);
        Ok(())
    }

    /// Issue an invitation to join a job site (owner only).
    ///
    /// The returned bundle carries the join link and a rendered QR
    /// payload. `expiry_hours` defaults from configuration and must stay
    /// within the accepted range.
    pub async fn create_invitation(
        &self,
        job_site_id: &str,
        inviter_profile_id: &str,
        expiry_hours: Option<i64>,
    ) -> JobSiteResult<InvitationBundle> {
        self.owned_site(job_site_id, inviter_profile_id)?;
        let hours = expiry_hours.unwrap_or(self.config.invitation_expiry_hours);
        if !EXPIRY_HOURS_RANGE.contains(&hours) {
            return Err(JobSiteError::Validation(format!(
                "invitation expiry must be between {} and {} hours",
                EXPIRY_HOURS_RANGE.start(),
                EXPIRY_HOURS_RANGE.end()
            )));
        }

        let now = Utc::now();
        let invitation = JobSiteInvitation {
            id: new_entity_id(),
            job_site_id: job_site_id.to_string(),
            inviter_profile_id: inviter_profile_id.to_string(),
            token: generate_token(INVITATION_TOKEN_BYTES),
            expires_at: now + Duration::hours(hours),
            status: InvitationStatus::Pending,
            accepted_by_profile_id: None,
            accepted_at: None,
            created_at: now,
        };
        let link = format!(
            "{}/job-sites/join/{}",
            self.config.base_url, invitation.token
        );
        // External rendering first; nothing is persisted if it fails
        let qr_code = self.qr.render(&link).await?;

        self.store
            .invitations
            .insert(invitation.id.clone(), invitation.clone())?;
        tracing::info!(
            job_site = job_site_id,
            invitation = %invitation.id,
            expires_at = %invitation.expires_at,
            "invitation created"
        );

        Ok(InvitationBundle {
            invitation,
            link,
            qr_code,
        })
    }

    /// Redeem an invitation token for `acceptor_profile_id`.
    ///
    /// The pending-to-accepted flip is atomic per invitation, so a token
    /// is redeemed at most once. Membership addition is idempotent: an
    /// acceptor who already has access keeps it without duplication.
    pub async fn accept_invitation(
        &self,
        token: &str,
        acceptor_profile_id: &str,
    ) -> JobSiteResult<JobSite> {
        if !self.store.profiles.contains(acceptor_profile_id) {
            return Err(JobSiteError::ProfileNotFound(
                acceptor_profile_id.to_string(),
            ));
        }
        let invitation = self
            .store
            .invitation_by_token(token)
            .ok_or(JobSiteError::InvitationNotFound)?;

        let now = Utc::now();
        let invitation_id = invitation.id.clone();
        let flipped = self.store.invitations.mutate(&invitation_id, |inv| {
            match inv.status {
                InvitationStatus::Accepted => return Err(JobSiteError::InvitationAlreadyAccepted),
                InvitationStatus::Expired => return Err(JobSiteError::InvitationExpired),
                InvitationStatus::Pending => {}
            }
            if inv.is_expired(now) {
                return Err(JobSiteError::InvitationExpired);
            }
            inv.status = InvitationStatus::Accepted;
            inv.accepted_by_profile_id = Some(acceptor_profile_id.to_string());
            inv.accepted_at = Some(now);
            Ok(inv.clone())
        });
        let invitation = match flipped {
            Ok(inv) => inv,
            Err(JobSiteError::InvitationExpired) => {
                // Lazy expiry: the first use after the deadline marks it
                let _ = self.store.invitations.mutate(&invitation_id, |inv| {
                    if inv.status == InvitationStatus::Pending {
                        inv.status = InvitationStatus::Expired;
                    }
                    Ok::<_, StoreError>(())
                });
                return Err(JobSiteError::InvitationExpired);
            }
            Err(e) => return Err(e),
        };

        let site = self.store.job_sites.mutate(&invitation.job_site_id, |site| {
            if !site.has_buyer(acceptor_profile_id) {
                site.buyers.push(acceptor_profile_id.to_string());
            }
            Ok::<_, JobSiteError>(site.clone())
        })?;

        self.dispatcher
            .notify(
                &site.owner_profile_id,
                NotificationKind::JobSiteUpdate,
                "Invitation accepted",
                &format!(
                    "Profile {} joined job site {}",
                    acceptor_profile_id, site.name
                ),
                None,
            )
            .await;
        tracing::info!(
            job_site = %site.id,
            acceptor = acceptor_profile_id,
            "invitation accepted"
        );

        Ok(site)
    }

    /// Expire a pending invitation early (owner only).
    ///
    /// An accepted invitation cannot be revoked; membership is removed
    /// via `remove_buyer` instead.
    pub fn revoke_invitation(
        &self,
        invitation_id: &str,
        owner_profile_id: &str,
    ) -> JobSiteResult<JobSiteInvitation> {
        let invitation = self
            .store
            .invitations
            .get(invitation_id)
            .ok_or(JobSiteError::InvitationNotFound)?;
        self.owned_site(&invitation.job_site_id, owner_profile_id)?;

        self.store.invitations.mutate(invitation_id, |inv| {
            if inv.status == InvitationStatus::Accepted {
                return Err(JobSiteError::InvitationAlreadyAccepted);
            }
            inv.status = InvitationStatus::Expired;
            Ok(inv.clone())
        })
    }

    /// All invitations for a job site, newest first (owner only)
    pub fn list_invitations(
        &self,
        job_site_id: &str,
        owner_profile_id: &str,
    ) -> JobSiteResult<Vec<JobSiteInvitation>> {
        self.owned_site(job_site_id, owner_profile_id)?;
        let mut invitations = self
            .store
            .invitations
            .filter(|i| i.job_site_id == job_site_id);
        invitations.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(invitations)
    }
}
