//! Intent manager service implementation.
//!
//! This module provides the `IntentService` trait and the `IntentManager`
//! implementation that turns requests into reconciliations: it versions each
//! request, serializes reconciliations per key, runs the phase chain on the
//! worker pool, persists the outcome and publishes events.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use netintent_core::{CoreError, Intent, Key};
use netintent_store::{IntentData, IntentState, Request, Store, StoreError, Version};
use tokio::sync::{broadcast, Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use crate::error::{ControlError, Result};
use crate::events::{EventBus, IntentEvent, IntentEventKind};
use crate::phase::FinalIntentProcessPhase;
use crate::processor::{IntentProcessor, PhaseContext, UninstallCoordinator};
use crate::types::ManagerConfig;
use crate::worker::{IntentWorker, WorkerPool};

/// Trait defining the intent manager operations.
#[async_trait]
pub trait IntentService: Send + Sync {
    // =========================================================================
    // Requests
    // =========================================================================

    /// Install an intent, or reinstall it if its key is already known.
    ///
    /// Returns the record the reconciliation landed on.
    ///
    /// # Errors
    ///
    /// Returns `ControlError::InstallableSubmitted` for installable intents.
    async fn submit(&self, intent: Intent) -> Result<IntentData>;

    /// Withdraw an intent.
    async fn withdraw(&self, intent: Intent) -> Result<IntentData>;

    /// Delete the record of a withdrawn or failed intent.
    ///
    /// A purge of any other record is rejected; the stored record is
    /// returned unchanged.
    async fn purge(&self, intent: Intent) -> Result<IntentData>;

    /// Install `intent` in place of the installed intent under `old_key`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::IntentNotFound` if nothing is stored under
    /// `old_key`, and `ControlError::InvalidReplace` if it is not installed.
    async fn replace(&self, old_key: &Key, intent: Intent) -> Result<IntentData>;

    /// Run several requests concurrently. Results are in request order.
    async fn execute_batch(&self, requests: Vec<(Intent, Request)>) -> Vec<Result<IntentData>>;

    // =========================================================================
    // Queries
    // =========================================================================

    /// Get the intent stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::IntentNotFound` if nothing is stored under `key`.
    async fn get_intent(&self, key: &Key) -> Result<Intent>;

    /// Get the full record stored under `key`.
    async fn get_intent_data(&self, key: &Key) -> Result<Option<IntentData>>;

    /// Get the state of the record stored under `key`.
    async fn get_state(&self, key: &Key) -> Result<Option<IntentState>>;

    /// Get the installables of the record stored under `key`. Empty when
    /// nothing is stored.
    async fn get_installables(&self, key: &Key) -> Result<Vec<Intent>>;

    /// List every stored intent.
    async fn list_intents(&self) -> Result<Vec<Intent>>;

    /// Number of stored records.
    async fn intent_count(&self) -> Result<u64>;

    /// Subscribe to lifecycle events.
    fn subscribe(&self) -> broadcast::Receiver<IntentEvent>;
}

/// Per-key async locks. At most one reconciliation runs per key.
#[derive(Debug, Default)]
struct KeyLocks {
    locks: parking_lot::Mutex<HashMap<Key, Arc<AsyncMutex<()>>>>,
}

impl KeyLocks {
    /// Idle entries are dropped once the table grows past this size.
    const PRUNE_THRESHOLD: usize = 1024;

    async fn lock(&self, key: Key) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock();
            if locks.len() > Self::PRUNE_THRESHOLD {
                locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            }
            Arc::clone(locks.entry(key).or_default())
        };
        lock.lock_owned().await
    }

    /// Lock two distinct keys in key order.
    async fn lock_pair(&self, a: Key, b: Key) -> (OwnedMutexGuard<()>, OwnedMutexGuard<()>) {
        let (first, second) = if a <= b { (a, b) } else { (b, a) };
        let first = self.lock(first).await;
        let second = self.lock(second).await;
        (first, second)
    }
}

/// The intent manager.
pub struct IntentManager<S: Store> {
    store: Arc<S>,
    ctx: PhaseContext,
    pool: WorkerPool,
    events: EventBus,
    locks: KeyLocks,
    sequence: AtomicU64,
    config: ManagerConfig,
}

impl<S: Store> IntentManager<S> {
    /// Create a new intent manager.
    #[must_use]
    pub fn new(store: Arc<S>, processor: Arc<dyn IntentProcessor>, config: ManagerConfig) -> Self {
        let seed = Utc::now()
            .timestamp_nanos_opt()
            .and_then(|nanos| u64::try_from(nanos).ok())
            .unwrap_or(0);
        Self {
            store,
            ctx: PhaseContext::new(processor),
            pool: WorkerPool::new(config.worker_threads),
            events: EventBus::new(config.event_capacity),
            locks: KeyLocks::default(),
            sequence: AtomicU64::new(seed),
            config,
        }
    }

    /// Create with default configuration.
    #[must_use]
    pub fn with_defaults(store: Arc<S>, processor: Arc<dyn IntentProcessor>) -> Self {
        Self::new(store, processor, ManagerConfig::default())
    }

    /// Route withdrawals through `coordinator`.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<dyn UninstallCoordinator>) -> Self {
        self.ctx = self.ctx.with_coordinator(coordinator);
        self
    }

    /// Get a reference to the store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Get the configuration.
    #[must_use]
    pub const fn config(&self) -> &ManagerConfig {
        &self.config
    }

    /// Number of stored records per resting state.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    pub fn state_counts(&self) -> Result<Vec<(IntentState, usize)>> {
        IntentState::all()
            .into_iter()
            .filter(|state| state.is_terminal())
            .map(|state| -> Result<(IntentState, usize)> {
                Ok((state, self.store.list_intent_data_by_state(state)?.len()))
            })
            .collect()
    }

    /// Resubmit the request a stored record was driving.
    ///
    /// # Errors
    ///
    /// Same as the original request.
    pub async fn resubmit(&self, data: &IntentData) -> Result<IntentData> {
        self.reconcile(data.intent.clone(), data.request).await
    }

    /// Allocate a version newer than every record in `seen`.
    fn next_version<'a>(&self, seen: impl IntoIterator<Item = &'a IntentData>) -> Version {
        for data in seen {
            self.sequence
                .fetch_max(data.version.value().saturating_add(1), Ordering::SeqCst);
        }
        Version::new(self.sequence.fetch_add(1, Ordering::SeqCst))
    }

    async fn reconcile(&self, intent: Intent, request: Request) -> Result<IntentData> {
        if request == Request::Install && intent.is_installable() {
            return Err(ControlError::InstallableSubmitted(intent.key()));
        }

        let key = intent.key();
        let _guard = self.locks.lock(key).await;

        let stored = self.store.get_intent_data(&key)?;
        let data = IntentData::new(intent, request, self.next_version(stored.iter()));
        info!(
            key = %key,
            request = %request,
            version = %data.version,
            "Reconciling intent"
        );

        if request == Request::Install {
            self.events.emit(IntentEventKind::Submitted, &data.intent);
        }

        let done = self
            .pool
            .run(IntentWorker::new(self.ctx.clone(), data, stored))
            .await?;
        self.persist(done)
    }

    /// Write the outcome of a chain and announce it.
    fn persist(&self, done: FinalIntentProcessPhase) -> Result<IntentData> {
        if let Some(retired) = done.retired() {
            if self.store.write_intent_data(retired)? {
                self.events.emit(IntentEventKind::Withdrawn, &retired.intent);
            }
        }

        let purge = match &done {
            FinalIntentProcessPhase::PurgeRequest(phase) => Some(phase.is_accepted()),
            _ => None,
        };
        let data = done.into_data();

        match purge {
            Some(false) => Ok(data),
            Some(true) => {
                match self.store.delete_intent_data(&data.key()) {
                    Ok(()) => {
                        info!(key = %data.key(), "Purged intent");
                        self.events.emit(IntentEventKind::Purged, &data.intent);
                    }
                    Err(StoreError::NotFound(_)) => {
                        debug!(key = %data.key(), "Nothing to purge");
                    }
                    Err(e) => return Err(e.into()),
                }
                Ok(data)
            }
            None => {
                if self.store.write_intent_data(&data)? {
                    info!(key = %data.key(), state = %data.state, "Intent reconciled");
                    if let Some(kind) = IntentEventKind::for_state(data.state) {
                        self.events.emit(kind, &data.intent);
                    }
                } else {
                    warn!(
                        key = %data.key(),
                        version = %data.version,
                        state = %data.state,
                        "Discarded stale reconciliation result"
                    );
                }
                Ok(data)
            }
        }
    }
}

#[async_trait]
impl<S: Store + 'static> IntentService for IntentManager<S> {
    // =========================================================================
    // Requests
    // =========================================================================

    async fn submit(&self, intent: Intent) -> Result<IntentData> {
        self.reconcile(intent, Request::Install).await
    }

    async fn withdraw(&self, intent: Intent) -> Result<IntentData> {
        self.reconcile(intent, Request::Withdraw).await
    }

    async fn purge(&self, intent: Intent) -> Result<IntentData> {
        self.reconcile(intent, Request::Purge).await
    }

    async fn replace(&self, old_key: &Key, intent: Intent) -> Result<IntentData> {
        if intent.is_installable() {
            return Err(ControlError::InstallableSubmitted(intent.key()));
        }

        let key = intent.key();
        if key == *old_key {
            return self.submit(intent).await;
        }

        let _guards = self.locks.lock_pair(*old_key, key).await;

        let replaced = self
            .store
            .get_intent_data(old_key)?
            .ok_or(CoreError::IntentNotFound(*old_key))?;
        if replaced.state != IntentState::Installed {
            return Err(ControlError::InvalidReplace {
                key: *old_key,
                state: replaced.state,
            });
        }

        let stored = self.store.get_intent_data(&key)?;
        let version = self.next_version(stored.iter().chain([&replaced]));
        let data = IntentData::new(intent, Request::Install, version);
        info!(
            key = %key,
            replaced = %old_key,
            version = %version,
            "Replacing intent"
        );
        self.events.emit(IntentEventKind::Submitted, &data.intent);

        let done = self
            .pool
            .run(IntentWorker::replacing(
                self.ctx.clone(),
                data,
                stored,
                replaced,
            ))
            .await?;
        self.persist(done)
    }

    async fn execute_batch(&self, requests: Vec<(Intent, Request)>) -> Vec<Result<IntentData>> {
        debug!(requests = requests.len(), "Executing batch");
        futures::future::join_all(
            requests
                .into_iter()
                .map(|(intent, request)| self.reconcile(intent, request)),
        )
        .await
    }

    // =========================================================================
    // Queries
    // =========================================================================

    async fn get_intent(&self, key: &Key) -> Result<Intent> {
        self.store
            .get_intent_data(key)?
            .map(|data| data.intent)
            .ok_or_else(|| CoreError::IntentNotFound(*key).into())
    }

    async fn get_intent_data(&self, key: &Key) -> Result<Option<IntentData>> {
        Ok(self.store.get_intent_data(key)?)
    }

    async fn get_state(&self, key: &Key) -> Result<Option<IntentState>> {
        Ok(self.store.get_intent_data(key)?.map(|data| data.state))
    }

    async fn get_installables(&self, key: &Key) -> Result<Vec<Intent>> {
        Ok(self
            .store
            .get_intent_data(key)?
            .map(|data| data.installables)
            .unwrap_or_default())
    }

    async fn list_intents(&self) -> Result<Vec<Intent>> {
        Ok(self
            .store
            .list_intent_data()?
            .into_iter()
            .map(|data| data.intent)
            .collect())
    }

    async fn intent_count(&self) -> Result<u64> {
        Ok(self.store.count_intent_data()?)
    }

    fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.events.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{CompileError, InstallError};
    use crate::mock::{MockCall, MockProcessor};
    use netintent_core::{ApplicationId, ConnectPoint, IntentKind};
    use netintent_store::{MemoryStore, RocksStore};
    use tempfile::TempDir;

    fn app() -> ApplicationId {
        ApplicationId::new(1, "org.example.fwd")
    }

    fn intent(name: &str) -> Intent {
        Intent::new(
            app(),
            Key::of(name, &app()),
            IntentKind::PointToPoint {
                ingress: ConnectPoint::new("of:1", 1),
                egress: ConnectPoint::new("of:2", 1),
            },
        )
    }

    fn manager() -> (IntentManager<MemoryStore>, Arc<MockProcessor>) {
        let mock = Arc::new(MockProcessor::new());
        let manager = IntentManager::with_defaults(Arc::new(MemoryStore::new()), mock.clone());
        (manager, mock)
    }

    #[tokio::test]
    async fn submit_installs_and_stores() {
        let (manager, _) = manager();
        let intent = intent("a");

        let data = manager.submit(intent.clone()).await.unwrap();
        assert_eq!(data.state, IntentState::Installed);
        assert_eq!(
            manager.get_state(&intent.key()).await.unwrap(),
            Some(IntentState::Installed)
        );
        assert_eq!(manager.get_intent(&intent.key()).await.unwrap(), intent);
        assert_eq!(manager.get_installables(&intent.key()).await.unwrap().len(), 1);
        assert_eq!(manager.intent_count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn installable_submission_rejected() {
        let (manager, _) = manager();
        let path = intent("a").derive(IntentKind::Path { links: vec![] });
        assert!(matches!(
            manager.submit(path).await,
            Err(ControlError::InstallableSubmitted(_))
        ));
    }

    #[tokio::test]
    async fn get_missing_intent() {
        let (manager, _) = manager();
        let key = Key::of("missing", &app());
        assert!(matches!(
            manager.get_intent(&key).await,
            Err(ControlError::Core(CoreError::IntentNotFound(k))) if k == key
        ));
        assert!(manager.get_intent_data(&key).await.unwrap().is_none());
        assert!(manager.get_installables(&key).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn versions_increase_per_request() {
        let (manager, _) = manager();
        let intent = intent("a");
        let first = manager.submit(intent.clone()).await.unwrap();
        let second = manager.withdraw(intent).await.unwrap();
        assert!(second.version > first.version);
        assert_eq!(second.state, IntentState::Withdrawn);
    }

    #[tokio::test]
    async fn purge_rules() {
        let (manager, _) = manager();
        let intent = intent("a");
        manager.submit(intent.clone()).await.unwrap();

        let rejected = manager.purge(intent.clone()).await.unwrap();
        assert_eq!(rejected.state, IntentState::Installed);
        assert_eq!(manager.intent_count().await.unwrap(), 1);

        manager.withdraw(intent.clone()).await.unwrap();
        let accepted = manager.purge(intent.clone()).await.unwrap();
        assert_eq!(accepted.state, IntentState::PurgeReq);
        assert_eq!(manager.get_state(&intent.key()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn failures_accumulate_across_resubmits() {
        let (manager, mock) = manager();
        mock.fail_apply(InstallError::Unreachable("of:2".into()));
        let intent = intent("a");

        assert_eq!(manager.submit(intent.clone()).await.unwrap().error_count, 1);
        assert_eq!(manager.submit(intent.clone()).await.unwrap().error_count, 2);

        let stored = manager.get_intent_data(&intent.key()).await.unwrap().unwrap();
        let resubmitted = manager.resubmit(&stored).await.unwrap();
        assert_eq!(resubmitted.error_count, 3);

        mock.succeed();
        let withdrawn = manager.withdraw(intent).await.unwrap();
        assert_eq!(withdrawn.error_count, 0);
    }

    #[tokio::test]
    async fn replace_retires_old_intent() {
        let (manager, mock) = manager();
        let old = intent("old");
        let new = intent("new");
        manager.submit(old.clone()).await.unwrap();

        let installed = manager.replace(&old.key(), new.clone()).await.unwrap();
        assert_eq!(installed.state, IntentState::Installed);
        assert_eq!(
            manager.get_state(&old.key()).await.unwrap(),
            Some(IntentState::Withdrawn)
        );
        assert!(mock.calls().contains(&MockCall::Uninstall(old.key())));
    }

    #[tokio::test]
    async fn replace_requires_installed_target() {
        let (manager, mock) = manager();
        let old = intent("old");

        assert!(matches!(
            manager.replace(&old.key(), intent("new")).await,
            Err(ControlError::Core(CoreError::IntentNotFound(_)))
        ));

        mock.fail_compile(CompileError::Failed("no path".into()));
        manager.submit(old.clone()).await.unwrap();
        assert!(matches!(
            manager.replace(&old.key(), intent("new")).await,
            Err(ControlError::InvalidReplace {
                state: IntentState::Failed,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn coordinated_withdraw_through_manager() {
        let mock = Arc::new(MockProcessor::new());
        let manager = IntentManager::with_defaults(Arc::new(MemoryStore::new()), mock.clone())
            .with_coordinator(mock.clone());
        let intent = intent("a");

        manager.submit(intent.clone()).await.unwrap();
        let withdrawn = manager.withdraw(intent).await.unwrap();
        assert_eq!(withdrawn.state, IntentState::Withdrawn);
        assert!(mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::ApplyCoordinated(1))));
    }

    #[tokio::test]
    async fn batch_preserves_order() {
        let (manager, _) = manager();
        let a = intent("a");
        let b = intent("b");
        manager.submit(b.clone()).await.unwrap();

        let results = manager
            .execute_batch(vec![
                (a.clone(), Request::Install),
                (b.clone(), Request::Withdraw),
            ])
            .await;
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].as_ref().unwrap().key(), a.key());
        assert_eq!(results[0].as_ref().unwrap().state, IntentState::Installed);
        assert_eq!(results[1].as_ref().unwrap().state, IntentState::Withdrawn);
    }

    #[tokio::test]
    async fn state_counts_cover_resting_states() {
        let (manager, mock) = manager();
        manager.submit(intent("a")).await.unwrap();
        manager.submit(intent("b")).await.unwrap();
        mock.fail_compile(CompileError::Failed("no path".into()));
        manager.submit(intent("c")).await.unwrap();

        let counts = manager.state_counts().unwrap();
        assert_eq!(counts.len(), 5);
        assert!(counts.contains(&(IntentState::Installed, 2)));
        assert!(counts.contains(&(IntentState::Failed, 1)));
    }

    #[tokio::test]
    async fn rocks_backed_manager() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(RocksStore::open(dir.path()).unwrap());
        let manager = IntentManager::with_defaults(store, Arc::new(MockProcessor::new()));
        let intent = intent("a");

        manager.submit(intent.clone()).await.unwrap();
        manager.withdraw(intent.clone()).await.unwrap();
        assert_eq!(
            manager.get_state(&intent.key()).await.unwrap(),
            Some(IntentState::Withdrawn)
        );
        manager.purge(intent).await.unwrap();
        assert_eq!(manager.intent_count().await.unwrap(), 0);
    }
}
