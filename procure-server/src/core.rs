//! Core facade
//!
//! Wires the store, the quota ledger and the three services together
//! over one set of collaborators. Embedders construct a [`Core`] and
//! reach the services through it; tests swap collaborators for the
//! in-process implementations.

use crate::bootstrap;
use crate::collaborators::{
    FileStore, InMemoryFileStore, InProcessGateway, InlineQrRenderer, NotificationDispatcher,
    PaymentGateway, QrRenderer, TracingDispatcher,
};
use crate::config::Config;
use crate::job_sites::JobSiteService;
use crate::orders::OrderManager;
use crate::quotations::QuotationEngine;
use crate::store::Store;
use crate::subscription::QuotaLedger;
use shared::error::AppResult;
use std::sync::Arc;

/// Collaborator set used to construct a [`Core`]
pub struct Collaborators {
    pub payments: Arc<dyn PaymentGateway>,
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub files: Arc<dyn FileStore>,
    pub qr: Arc<dyn QrRenderer>,
}

impl Collaborators {
    /// In-process collaborator set for tests and local runs
    pub fn in_process() -> Self {
        Self {
            payments: Arc::new(InProcessGateway::new()),
            dispatcher: Arc::new(TracingDispatcher),
            files: Arc::new(InMemoryFileStore::new()),
            qr: Arc::new(InlineQrRenderer),
        }
    }
}

/// The procurement core: one store, one ledger, three services
pub struct Core {
    pub store: Arc<Store>,
    pub ledger: QuotaLedger,
    pub orders: OrderManager,
    pub quotations: QuotationEngine,
    pub job_sites: JobSiteService,
    pub config: Arc<Config>,
}

impl Core {
    pub fn new(config: Config, collaborators: Collaborators) -> Self {
        let config = Arc::new(config);
        let store = Arc::new(Store::new());
        let ledger = QuotaLedger::new(store.clone());

        let orders = OrderManager::new(
            store.clone(),
            ledger.clone(),
            collaborators.payments,
            collaborators.dispatcher.clone(),
            collaborators.files.clone(),
            config.clone(),
        );
        let quotations = QuotationEngine::new(
            store.clone(),
            ledger.clone(),
            collaborators.dispatcher.clone(),
            collaborators.files,
            config.clone(),
        );
        let job_sites = JobSiteService::new(
            store.clone(),
            collaborators.dispatcher,
            collaborators.qr,
            config.clone(),
        );

        Self {
            store,
            ledger,
            orders,
            quotations,
            job_sites,
            config,
        }
    }

    /// Construct a core and run first-time bootstrap against it
    pub fn initialize(config: Config, collaborators: Collaborators) -> AppResult<Self> {
        let core = Self::new(config, collaborators);
        bootstrap::ensure_default_admin(&core.store, &core.config)?;
        Ok(core)
    }
}

/// Install the global tracing subscriber.
///
/// Filter comes from `RUST_LOG`, defaulting to `info`. Safe to call
/// once per process; embedders that install their own subscriber skip
/// this.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}
