//! Scriptable processor for tests.
//!
//! [`MockProcessor`] compiles every user intent into a single path installable
//! and succeeds at every device step unless told to fail. It records each call
//! so tests can assert on the exact collaborator traffic.

use netintent_core::{ConnectPoint, Intent, IntentKind, Key, Link};
use netintent_store::{IntentData, Version};
use parking_lot::Mutex;

use crate::error::{CompileError, InstallError};
use crate::processor::{IntentProcessor, OperationSet, UninstallCoordinator};

/// A collaborator call observed by [`MockProcessor`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockCall {
    /// `compile` for the intent with this key.
    Compile(Key),
    /// `apply` with the versions of the old and new records.
    Apply {
        /// Version of the record being superseded.
        old: Option<Version>,
        /// Version of the record being installed.
        new: Option<Version>,
    },
    /// `uninstall` of the record with this key.
    Uninstall(Key),
    /// `uninstall_coordinate` for the record with this key.
    Coordinate(Key),
    /// `apply_coordinated` with this many operations.
    ApplyCoordinated(usize),
}

/// Mock processor and withdrawal coordinator.
#[derive(Debug, Default)]
pub struct MockProcessor {
    compile_error: Mutex<Option<CompileError>>,
    apply_error: Mutex<Option<InstallError>>,
    uninstall_error: Mutex<Option<InstallError>>,
    coordinate_error: Mutex<Option<InstallError>>,
    calls: Mutex<Vec<MockCall>>,
}

impl MockProcessor {
    /// Create a processor that always succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `compile` fail with `error`.
    pub fn fail_compile(&self, error: CompileError) {
        *self.compile_error.lock() = Some(error);
    }

    /// Make `apply` and `apply_coordinated` fail with `error`.
    pub fn fail_apply(&self, error: InstallError) {
        *self.apply_error.lock() = Some(error);
    }

    /// Make `uninstall` fail with `error`.
    pub fn fail_uninstall(&self, error: InstallError) {
        *self.uninstall_error.lock() = Some(error);
    }

    /// Make `uninstall_coordinate` fail with `error`.
    pub fn fail_coordinate(&self, error: InstallError) {
        *self.coordinate_error.lock() = Some(error);
    }

    /// Clear every scripted failure.
    pub fn succeed(&self) {
        *self.compile_error.lock() = None;
        *self.apply_error.lock() = None;
        *self.uninstall_error.lock() = None;
        *self.coordinate_error.lock() = None;
    }

    /// Calls observed so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().clone()
    }

    /// Forget observed calls.
    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: MockCall) {
        self.calls.lock().push(call);
    }

    fn scripted<E: Clone>(slot: &Mutex<Option<E>>) -> Result<(), E> {
        slot.lock().clone().map_or(Ok(()), Err)
    }
}

impl IntentProcessor for MockProcessor {
    fn compile(
        &self,
        intent: &Intent,
        _previous: &[Intent],
    ) -> Result<Vec<Intent>, CompileError> {
        self.record(MockCall::Compile(intent.key()));
        Self::scripted(&self.compile_error)?;

        if intent.is_installable() {
            return Ok(vec![intent.clone()]);
        }
        let link = Link::new(ConnectPoint::new("of:1", 1), ConnectPoint::new("of:2", 1));
        Ok(vec![intent.derive(IntentKind::Path { links: vec![link] })])
    }

    fn apply(
        &self,
        old: Option<&IntentData>,
        new: Option<&IntentData>,
    ) -> Result<(), InstallError> {
        self.record(MockCall::Apply {
            old: old.map(|d| d.version),
            new: new.map(|d| d.version),
        });
        Self::scripted(&self.apply_error)
    }

    fn uninstall(&self, data: &IntentData) -> Result<(), InstallError> {
        self.record(MockCall::Uninstall(data.key()));
        Self::scripted(&self.uninstall_error)
    }
}

impl UninstallCoordinator for MockProcessor {
    fn uninstall_coordinate(
        &self,
        current: &IntentData,
        _pending: &IntentData,
    ) -> Result<OperationSet, InstallError> {
        self.record(MockCall::Coordinate(current.key()));
        Self::scripted(&self.coordinate_error)?;
        Ok(OperationSet::removing(&current.installables))
    }

    fn apply_coordinated(&self, operations: &OperationSet) -> Result<(), InstallError> {
        self.record(MockCall::ApplyCoordinated(operations.len()));
        Self::scripted(&self.apply_error)
    }
}
