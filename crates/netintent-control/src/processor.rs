//! Collaborator contracts consumed by the phase machine.
//!
//! These traits abstract compilation and device programming, allowing the
//! phases to be driven against real drivers or mock implementations in
//! tests. Every method may block; phases call them synchronously.

use std::fmt;
use std::sync::Arc;

use netintent_core::Intent;
use netintent_store::IntentData;

use crate::error::{CompileError, InstallError};

/// Compiles intents and programs their installables on devices.
pub trait IntentProcessor: Send + Sync {
    /// Compile an intent into installable intents.
    ///
    /// `previous` holds the installables of the last successful compilation
    /// for the same key, so compilers can prefer stable results. Must not
    /// touch device state.
    ///
    /// # Errors
    ///
    /// Returns a `CompileError` if the intent cannot currently be realized.
    fn compile(&self, intent: &Intent, previous: &[Intent]) -> Result<Vec<Intent>, CompileError>;

    /// Move devices from `old`'s installed state to `new`'s.
    ///
    /// `old` is absent on first install, `new` is absent on full withdrawal.
    ///
    /// # Errors
    ///
    /// Returns an `InstallError` if device programming fails.
    fn apply(&self, old: Option<&IntentData>, new: Option<&IntentData>)
        -> Result<(), InstallError>;

    /// Remove the device state of a previously installed record.
    ///
    /// # Errors
    ///
    /// Returns an `InstallError` if device programming fails.
    fn uninstall(&self, data: &IntentData) -> Result<(), InstallError>;
}

/// Computes a withdrawal as one combined operation set ahead of time.
pub trait UninstallCoordinator: Send + Sync {
    /// Build the operations that take devices from `current`'s installed
    /// state to nothing, on behalf of the `pending` withdraw request.
    ///
    /// # Errors
    ///
    /// Returns an `InstallError` if the operations cannot be computed.
    fn uninstall_coordinate(
        &self,
        current: &IntentData,
        pending: &IntentData,
    ) -> Result<OperationSet, InstallError>;

    /// Push a previously computed operation set to devices.
    ///
    /// # Errors
    ///
    /// Returns an `InstallError` if device programming fails.
    fn apply_coordinated(&self, operations: &OperationSet) -> Result<(), InstallError>;
}

/// Direction of a device operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Program the installable.
    Add,
    /// Remove the installable.
    Remove,
}

/// One device-programming step for one installable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// What to do.
    pub kind: OperationKind,
    /// The installable it applies to.
    pub installable: Intent,
}

/// Staged device operations. Stages run in order; operations within a stage
/// are independent of each other.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationSet {
    stages: Vec<Vec<Operation>>,
}

impl OperationSet {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A single stage removing every given installable.
    #[must_use]
    pub fn removing(installables: &[Intent]) -> Self {
        Self::new().stage(
            installables
                .iter()
                .map(|installable| Operation {
                    kind: OperationKind::Remove,
                    installable: installable.clone(),
                })
                .collect(),
        )
    }

    /// Append a stage. Empty stages are dropped.
    #[must_use]
    pub fn stage(mut self, operations: Vec<Operation>) -> Self {
        if !operations.is_empty() {
            self.stages.push(operations);
        }
        self
    }

    /// The stages in execution order.
    #[must_use]
    pub fn stages(&self) -> &[Vec<Operation>] {
        &self.stages
    }

    /// Total number of operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.stages.iter().map(Vec::len).sum()
    }

    /// True if there is nothing to do.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }
}

/// The collaborators a phase chain runs against.
///
/// Cloning is cheap; every phase holds its own handle.
#[derive(Clone)]
pub struct PhaseContext {
    processor: Arc<dyn IntentProcessor>,
    coordinator: Option<Arc<dyn UninstallCoordinator>>,
}

impl PhaseContext {
    /// Create a context with only a processor. Withdrawals go straight to
    /// `Withdrawing`.
    #[must_use]
    pub fn new(processor: Arc<dyn IntentProcessor>) -> Self {
        Self {
            processor,
            coordinator: None,
        }
    }

    /// Route withdrawals through `WithdrawCoordinating` using `coordinator`.
    #[must_use]
    pub fn with_coordinator(mut self, coordinator: Arc<dyn UninstallCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    /// The processor.
    #[must_use]
    pub fn processor(&self) -> &dyn IntentProcessor {
        self.processor.as_ref()
    }

    /// The withdrawal coordinator, if configured.
    #[must_use]
    pub fn coordinator(&self) -> Option<&Arc<dyn UninstallCoordinator>> {
        self.coordinator.as_ref()
    }
}

impl fmt::Debug for PhaseContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PhaseContext")
            .field("coordinated", &self.coordinator.is_some())
            .finish_non_exhaustive()
    }
}
