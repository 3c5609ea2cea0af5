//! Intent reconciliation for netintent.
//!
//! This crate drives each intent request through a chain of processing phases
//! until the intent's compiled installables are programmed on devices,
//! withdrawn, purged, or marked failed. It coordinates between the storage
//! layer and the compilers and installers that touch the network.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       IntentManager                         │
//! │   versioning · per-key locks · persistence · events         │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  WorkerPool / IntentWorker                  │
//! │  ┌───────────────┐   ┌───────────┐   ┌──────────────────┐   │
//! │  │ InstallRequest│──▶│ Compiling │──▶│ Installing       │   │
//! │  └───────────────┘   └───────────┘   └──────────────────┘   │
//! │  ┌───────────────┐   ┌──────────────────────────────────┐   │
//! │  │WithdrawRequest│──▶│ Withdrawing / Withdrawn / Failed │   │
//! │  └───────────────┘   └──────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!               ┌──────────────┼──────────────┐
//!               ▼              ▼              ▼
//!        ┌──────────┐   ┌──────────┐   ┌───────────┐
//!        │  Store   │   │ Compilers│   │ Installers│
//!        │ (RocksDB)│   │          │   │ (devices) │
//!        └──────────┘   └──────────┘   └───────────┘
//! ```
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use netintent_control::{
//!     DefaultIntentProcessor, IntentManager, IntentService, LoggingInstaller,
//! };
//! use netintent_core::{ApplicationId, ConnectPoint, Intent, IntentKind, Key};
//! use netintent_store::RocksStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(RocksStore::open("/tmp/netintent")?);
//! let processor = Arc::new(DefaultIntentProcessor::new(Arc::new(LoggingInstaller)));
//! let manager = IntentManager::with_defaults(store, processor);
//!
//! let app = ApplicationId::new(1, "org.example.fwd");
//! let intent = Intent::new(
//!     app.clone(),
//!     Key::of("h1-h2", &app),
//!     IntentKind::PointToPoint {
//!         ingress: ConnectPoint::new("of:1", 1),
//!         egress: ConnectPoint::new("of:2", 1),
//!     },
//! );
//! let data = manager.submit(intent).await?;
//! println!("intent {} is {}", data.key(), data.state);
//! # Ok(())
//! # }
//! ```
//!
//! # Phases
//!
//! - `InstallRequest` → `Compiling`
//! - `Compiling` → `Installing`, `Replacing`, `Withdrawing` (orphan cleanup) or `Failed`
//! - `Replacing` → `Installing` or `ReplaceFailed`
//! - `WithdrawRequest` → `WithdrawCoordinating`, `Withdrawing`, `Withdrawn` or `Failed`
//! - `WithdrawCoordinating` → `Withdrawing` or `WithdrawingFailed`
//! - `PurgeRequest` is final on its own
//!
//! See the [`phase`] module for the individual phases.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod cleanup;
pub mod compiler;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod phase;
pub mod processor;
pub mod service;
pub mod types;
pub mod worker;

#[cfg(any(test, feature = "test-utils"))]
pub mod mock;

pub use cleanup::{CleanupReport, IntentCleanup};
pub use compiler::{
    CompilerRegistry, DefaultIntentProcessor, IntentCompiler, IntentInstaller, LoggingInstaller,
};
pub use dispatch::{dispatch, new_initial_phase, new_replace_phase, process};
pub use error::{CompileError, ControlError, InstallError, Result};
pub use events::{EventBus, IntentEvent, IntentEventKind};
pub use phase::{FinalIntentProcessPhase, IntentProcessPhase};
pub use processor::{
    IntentProcessor, Operation, OperationKind, OperationSet, PhaseContext, UninstallCoordinator,
};
pub use service::{IntentManager, IntentService};
pub use types::ManagerConfig;
pub use worker::{IntentWorker, WorkerPool};

// Re-export commonly used types from dependencies for convenience
pub use netintent_core::{ApplicationId, Intent, IntentId, Key};
pub use netintent_store::{IntentData, IntentState, Request, Version};
