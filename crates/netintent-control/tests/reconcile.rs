//! End-to-end reconciliation through the public manager API.
//!
//! Uses the default processor with a path compiler and a scripted installer,
//! and checks the resulting records and the event stream.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use netintent_control::{
    CompileError, DefaultIntentProcessor, InstallError, IntentCompiler, IntentEvent,
    IntentEventKind, IntentInstaller, IntentManager, IntentService, IntentState,
};
use netintent_core::{ApplicationId, ConnectPoint, Intent, IntentKind, Key, Link};
use netintent_store::{IntentData, MemoryStore, Request, Store, Version};
use tokio::sync::broadcast;

// =============================================================================
// Fixtures
// =============================================================================

/// Routes point-to-point intents over a single link, or fails when told to.
#[derive(Default)]
struct PathCompiler {
    fail: AtomicBool,
}

impl IntentCompiler for PathCompiler {
    fn compile(&self, intent: &Intent, _: &[Intent]) -> Result<Vec<Intent>, CompileError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(CompileError::Failed("no route".into()));
        }
        let IntentKind::PointToPoint { ingress, egress } = intent.kind() else {
            return Err(CompileError::Failed("unexpected shape".into()));
        };
        let link = Link::new(ingress.clone(), egress.clone());
        Ok(vec![intent.derive(IntentKind::Path { links: vec![link] })])
    }
}

#[derive(Default)]
struct FlakyInstaller {
    fail: AtomicBool,
    installed: AtomicUsize,
}

impl FlakyInstaller {
    fn check(&self, installable: &Intent) -> Result<(), InstallError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(InstallError::DeviceRejected {
                device: "of:1".into(),
                reason: format!("table full for {}", installable.id()),
            });
        }
        Ok(())
    }
}

impl IntentInstaller for FlakyInstaller {
    fn install(&self, installable: &Intent) -> Result<(), InstallError> {
        self.check(installable)?;
        self.installed.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn uninstall(&self, installable: &Intent) -> Result<(), InstallError> {
        self.check(installable)
    }
}

struct Harness {
    manager: IntentManager<MemoryStore>,
    store: Arc<MemoryStore>,
    compiler: Arc<PathCompiler>,
    installer: Arc<FlakyInstaller>,
    events: broadcast::Receiver<IntentEvent>,
}

impl Harness {
    fn new() -> Self {
        let compiler = Arc::new(PathCompiler::default());
        let installer = Arc::new(FlakyInstaller::default());
        let processor = Arc::new(DefaultIntentProcessor::new(installer.clone()));
        processor
            .compilers()
            .register("point_to_point", compiler.clone());
        let store = Arc::new(MemoryStore::new());
        let manager = IntentManager::with_defaults(Arc::clone(&store), processor);
        let events = manager.subscribe();
        Self {
            manager,
            store,
            compiler,
            installer,
            events,
        }
    }

    /// Events emitted since the last drain.
    fn drain(&mut self) -> Vec<IntentEventKind> {
        let mut kinds = Vec::new();
        while let Ok(event) = self.events.try_recv() {
            kinds.push(event.kind);
        }
        kinds
    }
}

fn app() -> ApplicationId {
    ApplicationId::new(7, "org.example.reconcile")
}

fn intent(name: &str, egress: &str) -> Intent {
    Intent::new(
        app(),
        Key::of(name, &app()),
        IntentKind::PointToPoint {
            ingress: ConnectPoint::new("of:1", 1),
            egress: ConnectPoint::new(egress, 1),
        },
    )
}

fn is_resting(state: IntentState) -> bool {
    matches!(
        state,
        IntentState::Installed | IntentState::Withdrawn | IntentState::Failed | IntentState::Corrupt
    )
}

// =============================================================================
// Install and withdraw
// =============================================================================

#[tokio::test]
async fn install_then_withdraw() {
    let mut h = Harness::new();
    let intent = intent("h1-h2", "of:2");

    let data = h.manager.submit(intent.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Installed);
    assert_eq!(data.installables.len(), 1);
    assert_eq!(
        h.drain(),
        vec![IntentEventKind::Submitted, IntentEventKind::Installed]
    );

    let data = h.manager.withdraw(intent.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Withdrawn);
    assert!(data.installables.is_empty());
    assert_eq!(h.drain(), vec![IntentEventKind::Withdrawn]);
}

#[tokio::test]
async fn withdraw_of_unknown_intent_is_withdrawn() {
    let mut h = Harness::new();
    let data = h.manager.withdraw(intent("ghost", "of:2")).await.unwrap();

    assert_eq!(data.state, IntentState::Withdrawn);
    assert_eq!(data.error_count, 0);
    assert_eq!(h.drain(), vec![IntentEventKind::Withdrawn]);
}

#[tokio::test]
async fn compile_failure_reports_failed() {
    let mut h = Harness::new();
    h.compiler.fail.store(true, Ordering::SeqCst);

    let data = h.manager.submit(intent("a", "of:2")).await.unwrap();
    assert_eq!(data.state, IntentState::Failed);
    assert_eq!(data.error_count, 1);
    assert!(data.last_error.is_some());
    assert_eq!(
        h.drain(),
        vec![IntentEventKind::Submitted, IntentEventKind::Failed]
    );
}

#[tokio::test]
async fn install_failure_reports_failed() {
    let mut h = Harness::new();
    h.installer.fail.store(true, Ordering::SeqCst);

    let data = h.manager.submit(intent("a", "of:2")).await.unwrap();
    assert_eq!(data.state, IntentState::Failed);
    assert_eq!(data.error_count, 1);
    assert_eq!(
        h.drain(),
        vec![IntentEventKind::Submitted, IntentEventKind::Failed]
    );
}

#[tokio::test]
async fn withdraw_failure_reports_corrupt() {
    let mut h = Harness::new();
    let intent = intent("a", "of:2");
    h.manager.submit(intent.clone()).await.unwrap();
    h.drain();

    h.installer.fail.store(true, Ordering::SeqCst);
    let data = h.manager.withdraw(intent).await.unwrap();
    assert_eq!(data.state, IntentState::Corrupt);
    assert_eq!(data.installables.len(), 1);
    assert_eq!(h.drain(), vec![IntentEventKind::Corrupt]);
}

#[tokio::test]
async fn retry_after_install_failure_programs_devices() {
    let mut h = Harness::new();
    let intent = intent("a", "of:2");
    h.installer.fail.store(true, Ordering::SeqCst);
    let data = h.manager.submit(intent.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Failed);
    assert_eq!(h.installer.installed.load(Ordering::SeqCst), 0);
    h.drain();

    h.installer.fail.store(false, Ordering::SeqCst);
    let data = h.manager.submit(intent).await.unwrap();
    assert_eq!(data.state, IntentState::Installed);
    assert_eq!(h.installer.installed.load(Ordering::SeqCst), 1);
    assert_eq!(
        h.drain(),
        vec![IntentEventKind::Submitted, IntentEventKind::Installed]
    );
}

#[tokio::test]
async fn resubmitting_an_installed_intent_leaves_devices_alone() {
    let h = Harness::new();
    let intent = intent("a", "of:2");
    h.manager.submit(intent.clone()).await.unwrap();
    h.manager.submit(intent).await.unwrap();
    assert_eq!(h.installer.installed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn withdraw_during_pending_install_fails() {
    let mut h = Harness::new();
    let intent = intent("a", "of:2");
    let pending = IntentData::new(intent.clone(), Request::Install, Version::new(1));
    assert!(h.store.write_intent_data(&pending).unwrap());

    let data = h.manager.withdraw(intent.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Failed);
    assert_eq!(data.error_count, 1);
    assert_eq!(h.drain(), vec![IntentEventKind::Failed]);
    assert_eq!(
        h.manager.get_state(&intent.key()).await.unwrap(),
        Some(IntentState::Failed)
    );
}

// =============================================================================
// Error counting
// =============================================================================

#[tokio::test]
async fn error_count_follows_the_request() {
    let h = Harness::new();
    let intent = intent("a", "of:2");
    h.compiler.fail.store(true, Ordering::SeqCst);

    assert_eq!(h.manager.submit(intent.clone()).await.unwrap().error_count, 1);
    assert_eq!(h.manager.submit(intent.clone()).await.unwrap().error_count, 2);

    // A different request starts counting from zero.
    let data = h.manager.withdraw(intent.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Withdrawn);
    assert_eq!(data.error_count, 0);

    h.compiler.fail.store(false, Ordering::SeqCst);
    let data = h.manager.submit(intent).await.unwrap();
    assert_eq!(data.state, IntentState::Installed);
    assert_eq!(data.error_count, 0);
}

// =============================================================================
// Purge
// =============================================================================

#[tokio::test]
async fn purge_requires_a_resting_record() {
    let mut h = Harness::new();
    let intent = intent("a", "of:2");
    h.manager.submit(intent.clone()).await.unwrap();
    h.drain();

    let data = h.manager.purge(intent.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Installed);
    assert!(h.drain().is_empty());
    assert!(h.manager.get_intent_data(&intent.key()).await.unwrap().is_some());

    h.manager.withdraw(intent.clone()).await.unwrap();
    h.manager.purge(intent.clone()).await.unwrap();
    assert_eq!(
        h.drain(),
        vec![IntentEventKind::Withdrawn, IntentEventKind::Purged]
    );
    assert!(h.manager.get_intent_data(&intent.key()).await.unwrap().is_none());
    assert_eq!(h.manager.intent_count().await.unwrap(), 0);
}

// =============================================================================
// Replacement
// =============================================================================

#[tokio::test]
async fn replace_retires_the_old_intent() {
    let mut h = Harness::new();
    let old = intent("old", "of:2");
    let new = intent("new", "of:3");
    h.manager.submit(old.clone()).await.unwrap();
    h.drain();

    let data = h.manager.replace(&old.key(), new.clone()).await.unwrap();
    assert_eq!(data.state, IntentState::Installed);
    assert_eq!(
        h.drain(),
        vec![
            IntentEventKind::Submitted,
            IntentEventKind::Withdrawn,
            IntentEventKind::Installed
        ]
    );
    assert_eq!(
        h.manager.get_state(&old.key()).await.unwrap(),
        Some(IntentState::Withdrawn)
    );
    assert!(h.manager.get_installables(&old.key()).await.unwrap().is_empty());
}

// =============================================================================
// Batches
// =============================================================================

#[tokio::test]
async fn every_outcome_is_a_resting_state() {
    let h = Harness::new();
    let intents: Vec<Intent> = (0..8)
        .map(|i| intent(&format!("batch-{i}"), &format!("of:{}", i + 2)))
        .collect();

    for intent in &intents {
        h.manager.submit(intent.clone()).await.unwrap();
    }
    h.installer.fail.store(true, Ordering::SeqCst);
    for intent in intents.iter().step_by(2) {
        h.manager.withdraw(intent.clone()).await.unwrap();
    }

    assert_eq!(h.manager.intent_count().await.unwrap(), 8);
    for intent in &intents {
        let state = h.manager.get_state(&intent.key()).await.unwrap().unwrap();
        assert!(is_resting(state), "{state} is not a resting state");
    }
}
