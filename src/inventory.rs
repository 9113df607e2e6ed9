// Per-kind snapshot cache over the engine, refresh contract and operation execution

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tracing::{debug, info, instrument, warn};

use crate::engine_repo::{CancelToken, EngineRepo};
use crate::error::EngineError;
use crate::models::{Container, EntityKind, Image, InventorySnapshot, Network, Volume};
use crate::operations::{DEFAULT_LOGS_TAIL, Operation, OperationRequest};
use crate::policy;

pub const DEFAULT_EVENT_CAPACITY: usize = 64;

type Slot<T> = RwLock<Option<Arc<InventorySnapshot<T>>>>;

/// Published whenever a slot changes or a refresh fails.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum InventoryEvent {
    SnapshotReplaced {
        kind: EntityKind,
        fetched_at: DateTime<Utc>,
        count: usize,
    },
    RefreshFailed {
        kind: EntityKind,
        error: String,
    },
}

/// A snapshot of any kind, as returned by the kind-generic `refresh`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum KindSnapshot {
    Containers(Arc<InventorySnapshot<Container>>),
    Images(Arc<InventorySnapshot<Image>>),
    Networks(Arc<InventorySnapshot<Network>>),
    Volumes(Arc<InventorySnapshot<Volume>>),
}

impl KindSnapshot {
    pub fn kind(&self) -> EntityKind {
        match self {
            KindSnapshot::Containers(_) => EntityKind::Containers,
            KindSnapshot::Images(_) => EntityKind::Images,
            KindSnapshot::Networks(_) => EntityKind::Networks,
            KindSnapshot::Volumes(_) => EntityKind::Volumes,
        }
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        match self {
            KindSnapshot::Containers(s) => s.fetched_at,
            KindSnapshot::Images(s) => s.fetched_at,
            KindSnapshot::Networks(s) => s.fetched_at,
            KindSnapshot::Volumes(s) => s.fetched_at,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            KindSnapshot::Containers(s) => s.len(),
            KindSnapshot::Images(s) => s.len(),
            KindSnapshot::Networks(s) => s.len(),
            KindSnapshot::Volumes(s) => s.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Result of refreshing one kind inside `refresh_all`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct KindRefresh {
    pub kind: EntityKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "optional_error_text"
    )]
    pub error: Option<EngineError>,
}

impl KindRefresh {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RefreshFailure {
    pub kind: EntityKind,
    #[serde(serialize_with = "error_text")]
    pub error: EngineError,
}

// Errors go over the wire as their display text.
fn error_text<S: Serializer>(error: &EngineError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

fn optional_error_text<S: Serializer>(
    error: &Option<EngineError>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match error {
        Some(e) => serializer.collect_str(e),
        None => serializer.serialize_none(),
    }
}

/// Result of a successful `execute`. A failed post-effect refresh does not undo
/// the operation; it is reported in `refresh_errors`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Outcome {
    pub operation: Operation,
    pub success: bool,
    pub message: String,
    /// Raw engine stdout (logs text, inspect JSON, pruned IDs).
    pub output: String,
    pub refreshed: Vec<EntityKind>,
    pub refresh_errors: Vec<RefreshFailure>,
}

/// One slot per kind, empty until the first refresh.
///
/// A successful refresh replaces the slot whole; a failed one leaves it as it
/// was. Concurrent refreshes of one kind are last-write-wins.
pub struct Inventory {
    repo: EngineRepo,
    logs_tail: usize,
    containers: Slot<Container>,
    images: Slot<Image>,
    networks: Slot<Network>,
    volumes: Slot<Volume>,
    events: broadcast::Sender<InventoryEvent>,
}

impl Inventory {
    pub fn new(repo: EngineRepo) -> Self {
        Self::with_event_capacity(repo, DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_event_capacity(repo: EngineRepo, capacity: usize) -> Self {
        let (events, _) = broadcast::channel(capacity.max(1));
        Self {
            repo,
            logs_tail: DEFAULT_LOGS_TAIL,
            containers: RwLock::new(None),
            images: RwLock::new(None),
            networks: RwLock::new(None),
            volumes: RwLock::new(None),
            events,
        }
    }

    pub fn with_logs_tail(mut self, logs_tail: usize) -> Self {
        self.logs_tail = logs_tail;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<InventoryEvent> {
        self.events.subscribe()
    }

    pub fn receiver_count(&self) -> usize {
        self.events.receiver_count()
    }

    // Cached snapshots, no engine call.

    pub async fn cached_containers(&self) -> Option<Arc<InventorySnapshot<Container>>> {
        self.containers.read().await.clone()
    }

    pub async fn cached_images(&self) -> Option<Arc<InventorySnapshot<Image>>> {
        self.images.read().await.clone()
    }

    pub async fn cached_networks(&self) -> Option<Arc<InventorySnapshot<Network>>> {
        self.networks.read().await.clone()
    }

    pub async fn cached_volumes(&self) -> Option<Arc<InventorySnapshot<Volume>>> {
        self.volumes.read().await.clone()
    }

    pub async fn cached(&self, kind: EntityKind) -> Option<KindSnapshot> {
        match kind {
            EntityKind::Containers => self.cached_containers().await.map(KindSnapshot::Containers),
            EntityKind::Images => self.cached_images().await.map(KindSnapshot::Images),
            EntityKind::Networks => self.cached_networks().await.map(KindSnapshot::Networks),
            EntityKind::Volumes => self.cached_volumes().await.map(KindSnapshot::Volumes),
        }
    }

    // Cached snapshot, fetched on first use.

    pub async fn list_containers(&self) -> Result<Arc<InventorySnapshot<Container>>, EngineError> {
        match self.cached_containers().await {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_containers(&CancelToken::new()).await,
        }
    }

    pub async fn list_images(&self) -> Result<Arc<InventorySnapshot<Image>>, EngineError> {
        match self.cached_images().await {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_images(&CancelToken::new()).await,
        }
    }

    pub async fn list_networks(&self) -> Result<Arc<InventorySnapshot<Network>>, EngineError> {
        match self.cached_networks().await {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_networks(&CancelToken::new()).await,
        }
    }

    pub async fn list_volumes(&self) -> Result<Arc<InventorySnapshot<Volume>>, EngineError> {
        match self.cached_volumes().await {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh_volumes(&CancelToken::new()).await,
        }
    }

    pub async fn list(&self, kind: EntityKind) -> Result<KindSnapshot, EngineError> {
        match self.cached(kind).await {
            Some(snapshot) => Ok(snapshot),
            None => self.refresh(kind).await,
        }
    }

    // Full re-fetch, replacing the slot on success.

    pub async fn refresh_containers(
        &self,
        cancel: &CancelToken,
    ) -> Result<Arc<InventorySnapshot<Container>>, EngineError> {
        let fetched = self
            .repo
            .list_containers(cancel)
            .await
            .map(policy::order_containers);
        self.store(EntityKind::Containers, &self.containers, fetched)
            .await
    }

    pub async fn refresh_images(
        &self,
        cancel: &CancelToken,
    ) -> Result<Arc<InventorySnapshot<Image>>, EngineError> {
        let fetched = self.repo.list_images(cancel).await.map(policy::sort_images);
        self.store(EntityKind::Images, &self.images, fetched).await
    }

    pub async fn refresh_networks(
        &self,
        cancel: &CancelToken,
    ) -> Result<Arc<InventorySnapshot<Network>>, EngineError> {
        let fetched = self
            .repo
            .list_networks(cancel)
            .await
            .map(policy::sort_networks);
        self.store(EntityKind::Networks, &self.networks, fetched)
            .await
    }

    pub async fn refresh_volumes(
        &self,
        cancel: &CancelToken,
    ) -> Result<Arc<InventorySnapshot<Volume>>, EngineError> {
        let fetched = self.repo.list_volumes(cancel).await.map(policy::sort_volumes);
        self.store(EntityKind::Volumes, &self.volumes, fetched).await
    }

    pub async fn refresh(&self, kind: EntityKind) -> Result<KindSnapshot, EngineError> {
        self.refresh_cancellable(kind, &CancelToken::new()).await
    }

    #[instrument(skip(self, cancel), fields(operation = "refresh", kind = %kind))]
    pub async fn refresh_cancellable(
        &self,
        kind: EntityKind,
        cancel: &CancelToken,
    ) -> Result<KindSnapshot, EngineError> {
        Ok(match kind {
            EntityKind::Containers => KindSnapshot::Containers(self.refresh_containers(cancel).await?),
            EntityKind::Images => KindSnapshot::Images(self.refresh_images(cancel).await?),
            EntityKind::Networks => KindSnapshot::Networks(self.refresh_networks(cancel).await?),
            EntityKind::Volumes => KindSnapshot::Volumes(self.refresh_volumes(cancel).await?),
        })
    }

    /// Refreshes the four kinds one after another; a failing kind does not stop the rest.
    pub async fn refresh_all(&self) -> Vec<KindRefresh> {
        self.refresh_all_cancellable(&CancelToken::new()).await
    }

    pub async fn refresh_all_cancellable(&self, cancel: &CancelToken) -> Vec<KindRefresh> {
        let mut report = Vec::with_capacity(EntityKind::ALL.len());
        for kind in EntityKind::ALL {
            let entry = match self.refresh_cancellable(kind, cancel).await {
                Ok(snapshot) => KindRefresh {
                    kind,
                    count: Some(snapshot.len()),
                    fetched_at: Some(snapshot.fetched_at()),
                    error: None,
                },
                Err(e) => KindRefresh {
                    kind,
                    count: None,
                    fetched_at: None,
                    error: Some(e),
                },
            };
            report.push(entry);
        }
        report
    }

    pub async fn execute(&self, request: &OperationRequest) -> Result<Outcome, EngineError> {
        self.execute_cancellable(request, &CancelToken::new()).await
    }

    /// Runs one operation, then refreshes the kinds it affects.
    ///
    /// Unconfirmed destructive requests and bad arguments are rejected before
    /// the engine is invoked. An engine failure skips the refresh.
    #[instrument(
        skip(self, request, cancel),
        fields(operation = %request.operation, identifier = %request.identifier.trim())
    )]
    pub async fn execute_cancellable(
        &self,
        request: &OperationRequest,
        cancel: &CancelToken,
    ) -> Result<Outcome, EngineError> {
        let args = request.engine_args(self.logs_tail)?;
        let output = self.repo.run(&args, cancel).await.inspect_err(|e| {
            warn!(error = %e, "operation failed");
        })?;
        info!("operation succeeded");

        let mut refreshed = Vec::new();
        let mut refresh_errors = Vec::new();
        for &kind in request.operation.affected_kinds() {
            match self.refresh_cancellable(kind, cancel).await {
                Ok(_) => refreshed.push(kind),
                Err(error) => refresh_errors.push(RefreshFailure { kind, error }),
            }
        }

        Ok(Outcome {
            operation: request.operation,
            success: true,
            message: request.success_message(self.logs_tail),
            output,
            refreshed,
            refresh_errors,
        })
    }

    async fn store<T>(
        &self,
        kind: EntityKind,
        slot: &Slot<T>,
        fetched: Result<Vec<T>, EngineError>,
    ) -> Result<Arc<InventorySnapshot<T>>, EngineError> {
        match fetched {
            Ok(items) => {
                let snapshot = Arc::new(InventorySnapshot::new(items, Utc::now()));
                *slot.write().await = Some(snapshot.clone());
                debug!(kind = %kind, count = snapshot.len(), "snapshot replaced");
                self.publish(InventoryEvent::SnapshotReplaced {
                    kind,
                    fetched_at: snapshot.fetched_at,
                    count: snapshot.len(),
                });
                Ok(snapshot)
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "refresh failed, keeping previous snapshot");
                self.publish(InventoryEvent::RefreshFailed {
                    kind,
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn publish(&self, event: InventoryEvent) {
        // No subscribers is normal outside `serve`.
        let _ = self.events.send(event);
    }
}
