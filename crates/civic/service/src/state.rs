//! Application state shared by all handlers

use crate::config::{AttachmentConfig, ServiceConfig, StorageConfig};
use crate::error::ServiceResult;
use chrono::{DateTime, Utc};
use civic_assignment::{AssignmentBalancer, WorkloadLedger};
use civic_identity::IdentityRegistry;
use civic_lifecycle::LifecycleEngine;
use civic_notify::{BroadcastEmitter, FanoutEmitter, InboxEmitter, TracingEmitter};
use civic_storage::memory::InMemoryCivicStorage;
use civic_storage::{
    AttachmentStore, CivicStorage, ComplaintStore, FsAttachmentStore, InMemoryAttachmentStore,
};
use std::sync::Arc;

/// Application state
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServiceConfig>,
    pub storage: Arc<dyn CivicStorage>,
    pub attachments: Arc<dyn AttachmentStore>,
    pub identity: Arc<IdentityRegistry>,
    pub engine: Arc<LifecycleEngine>,
    pub balancer: Arc<AssignmentBalancer>,
    pub ledger: Arc<WorkloadLedger>,
    pub inbox: Arc<InboxEmitter>,
    pub broadcast: Arc<BroadcastEmitter>,
    pub version: String,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Open the configured backends and wire the lifecycle around them.
    pub async fn bootstrap(config: &ServiceConfig) -> ServiceResult<Self> {
        let storage = open_storage(&config.storage).await?;
        let attachments = open_attachments(&config.attachments).await?;
        Self::assemble(config.clone(), storage, attachments).await
    }

    /// Wire state around already-open backends.
    pub async fn assemble(
        config: ServiceConfig,
        storage: Arc<dyn CivicStorage>,
        attachments: Arc<dyn AttachmentStore>,
    ) -> ServiceResult<Self> {
        let inbox = Arc::new(InboxEmitter::with_capacity(config.notifications.inbox_capacity));
        let broadcast = Arc::new(BroadcastEmitter::new(config.notifications.broadcast_capacity));
        let emitter = FanoutEmitter::new()
            .with_sink(inbox.clone())
            .with_sink(broadcast.clone())
            .with_sink(Arc::new(TracingEmitter));

        let ledger = Arc::new(WorkloadLedger::new());
        ledger.rebuild(storage.as_ref()).await?;

        let engine = Arc::new(
            LifecycleEngine::new(storage.clone(), Arc::new(emitter), config.lifecycle.clone())
                .with_observer(ledger.clone()),
        );
        let balancer = Arc::new(AssignmentBalancer::new(engine.clone(), ledger.clone()));
        let identity = Arc::new(IdentityRegistry::new(storage.clone()));

        tracing::info!(
            storage = storage.backend_name(),
            min_description_words = config.lifecycle.min_description_words,
            min_images = config.lifecycle.min_images,
            "Service state initialised"
        );

        Ok(Self {
            config: Arc::new(config),
            storage,
            attachments,
            identity,
            engine,
            balancer,
            ledger,
            inbox,
            broadcast,
            version: env!("CARGO_PKG_VERSION").to_string(),
            started_at: Utc::now(),
        })
    }

    /// Get uptime as a human-readable string
    pub fn uptime(&self) -> String {
        let duration = Utc::now().signed_duration_since(self.started_at);
        let secs = duration.num_seconds().max(0);
        let hours = secs / 3600;
        let mins = (secs % 3600) / 60;
        let secs = secs % 60;
        format!("{}h {}m {}s", hours, mins, secs)
    }
}

async fn open_storage(config: &StorageConfig) -> ServiceResult<Arc<dyn CivicStorage>> {
    match config {
        StorageConfig::Memory => Ok(Arc::new(InMemoryCivicStorage::new())),
        #[cfg(feature = "postgres")]
        StorageConfig::Postgres {
            url,
            max_connections,
            connect_timeout_secs,
        } => {
            let store = civic_storage::postgres::PostgresCivicStorage::connect_with_options(
                url,
                *max_connections,
                *connect_timeout_secs,
            )
            .await?;
            Ok(Arc::new(store))
        }
        #[cfg(not(feature = "postgres"))]
        StorageConfig::Postgres { .. } => Err(crate::error::ServiceError::Config(
            "postgres storage requires civicd built with the `postgres` feature".to_string(),
        )),
    }
}

async fn open_attachments(config: &AttachmentConfig) -> ServiceResult<Arc<dyn AttachmentStore>> {
    match config {
        AttachmentConfig::Memory => Ok(Arc::new(InMemoryAttachmentStore::new())),
        AttachmentConfig::Filesystem { root } => {
            tracing::info!(root = %root.display(), "Using filesystem attachment store");
            Ok(Arc::new(FsAttachmentStore::open(root).await?))
        }
    }
}
