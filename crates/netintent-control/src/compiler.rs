//! Compiler registry and the default processor built on it.
//!
//! Compilers are registered per intent shape. Compilation is recursive: each
//! compiler may emit intents of other shapes, which are compiled in turn until
//! only installable intents remain. Installable intents compile to themselves.
//! Installed state is programmed per installable by an [`IntentInstaller`].

use std::collections::HashMap;
use std::sync::Arc;

use netintent_core::Intent;
use netintent_store::{IntentData, IntentState};
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{CompileError, InstallError};
use crate::processor::{IntentProcessor, OperationKind, OperationSet, UninstallCoordinator};

/// Maximum nesting of compiler outputs before compilation is abandoned.
pub const MAX_COMPILE_DEPTH: usize = 8;

/// Compiles one intent shape one level down.
pub trait IntentCompiler: Send + Sync {
    /// Compile `intent`. `previous` holds the installables of the last
    /// successful compilation for the same key.
    ///
    /// # Errors
    ///
    /// Returns a `CompileError` if the intent cannot currently be realized.
    fn compile(&self, intent: &Intent, previous: &[Intent]) -> Result<Vec<Intent>, CompileError>;
}

/// Programs installable intents on devices.
pub trait IntentInstaller: Send + Sync {
    /// Program one installable.
    ///
    /// # Errors
    ///
    /// Returns an `InstallError` if device programming fails.
    fn install(&self, installable: &Intent) -> Result<(), InstallError>;

    /// Remove one installable.
    ///
    /// # Errors
    ///
    /// Returns an `InstallError` if device programming fails.
    fn uninstall(&self, installable: &Intent) -> Result<(), InstallError>;
}

/// Per-shape compiler table.
#[derive(Default)]
pub struct CompilerRegistry {
    compilers: RwLock<HashMap<&'static str, Arc<dyn IntentCompiler>>>,
}

impl CompilerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `compiler` for intents whose shape is named `kind`, replacing
    /// any previous registration.
    pub fn register(&self, kind: &'static str, compiler: Arc<dyn IntentCompiler>) {
        debug!(kind, "Registered intent compiler");
        self.compilers.write().insert(kind, compiler);
    }

    /// Remove the compiler for `kind`. Returns true if one was registered.
    pub fn unregister(&self, kind: &str) -> bool {
        self.compilers.write().remove(kind).is_some()
    }

    /// Shapes with a registered compiler.
    #[must_use]
    pub fn kinds(&self) -> Vec<&'static str> {
        let mut kinds: Vec<_> = self.compilers.read().keys().copied().collect();
        kinds.sort_unstable();
        kinds
    }

    /// Compile `intent` all the way down to installable intents.
    ///
    /// # Errors
    ///
    /// Returns `CompileError::NoCompiler` if some shape on the way has no
    /// compiler, or the first error a compiler reports.
    pub fn compile(
        &self,
        intent: &Intent,
        previous: &[Intent],
    ) -> Result<Vec<Intent>, CompileError> {
        let mut installables = Vec::new();
        self.compile_into(intent, previous, 0, &mut installables)?;
        Ok(installables)
    }

    fn compile_into(
        &self,
        intent: &Intent,
        previous: &[Intent],
        depth: usize,
        out: &mut Vec<Intent>,
    ) -> Result<(), CompileError> {
        if intent.is_installable() {
            out.push(intent.clone());
            return Ok(());
        }
        if depth >= MAX_COMPILE_DEPTH {
            return Err(CompileError::Failed(format!(
                "{} did not reduce to installable intents within {MAX_COMPILE_DEPTH} steps",
                intent.kind().name()
            )));
        }

        let kind = intent.kind().name();
        let compiler = self
            .compilers
            .read()
            .get(kind)
            .cloned()
            .ok_or(CompileError::NoCompiler(kind))?;

        for child in compiler.compile(intent, previous)? {
            self.compile_into(&child, previous, depth + 1, out)?;
        }
        Ok(())
    }
}

/// Processor combining a [`CompilerRegistry`] with an [`IntentInstaller`].
///
/// `apply` removes the old record's installables that the new record no
/// longer has, then programs the new ones that were not already in place.
/// Installables are matched by shape, so recompiling to the same path leaves
/// devices untouched.
///
/// Only an INSTALLED or WITHDRAWING old record is trusted to describe device
/// state. Any other old record is fully uninstalled and the new installables
/// are programmed from scratch.
pub struct DefaultIntentProcessor {
    compilers: CompilerRegistry,
    installer: Arc<dyn IntentInstaller>,
}

impl DefaultIntentProcessor {
    /// Create a processor with an empty registry.
    #[must_use]
    pub fn new(installer: Arc<dyn IntentInstaller>) -> Self {
        Self {
            compilers: CompilerRegistry::new(),
            installer,
        }
    }

    /// The compiler registry.
    #[must_use]
    pub const fn compilers(&self) -> &CompilerRegistry {
        &self.compilers
    }
}

fn missing_from<'a>(
    from: &'a [Intent],
    other: &'a [Intent],
) -> impl Iterator<Item = &'a Intent> {
    from.iter()
        .filter(move |i| !other.iter().any(|o| o.kind() == i.kind()))
}

/// True if `data`'s installables are known to be programmed on devices.
const fn is_programmed(data: &IntentData) -> bool {
    matches!(data.state, IntentState::Installed | IntentState::Withdrawing)
}

impl IntentProcessor for DefaultIntentProcessor {
    fn compile(&self, intent: &Intent, previous: &[Intent]) -> Result<Vec<Intent>, CompileError> {
        self.compilers.compile(intent, previous)
    }

    fn apply(
        &self,
        old: Option<&IntentData>,
        new: Option<&IntentData>,
    ) -> Result<(), InstallError> {
        let new = new.map_or(&[][..], |d| d.installables.as_slice());
        let Some(old) = old else {
            return new.iter().try_for_each(|i| self.installer.install(i));
        };

        if !is_programmed(old) {
            debug!(
                key = %old.key(),
                state = %old.state,
                "Reprogramming from an unconfirmed record"
            );
            old.installables
                .iter()
                .try_for_each(|i| self.installer.uninstall(i))?;
            return new.iter().try_for_each(|i| self.installer.install(i));
        }

        let old = old.installables.as_slice();
        for installable in missing_from(old, new) {
            self.installer.uninstall(installable)?;
        }
        for installable in missing_from(new, old) {
            self.installer.install(installable)?;
        }
        Ok(())
    }

    fn uninstall(&self, data: &IntentData) -> Result<(), InstallError> {
        data.installables
            .iter()
            .try_for_each(|installable| self.installer.uninstall(installable))
    }
}

impl UninstallCoordinator for DefaultIntentProcessor {
    fn uninstall_coordinate(
        &self,
        current: &IntentData,
        _pending: &IntentData,
    ) -> Result<OperationSet, InstallError> {
        Ok(OperationSet::removing(&current.installables))
    }

    fn apply_coordinated(&self, operations: &OperationSet) -> Result<(), InstallError> {
        for stage in operations.stages() {
            for op in stage {
                match op.kind {
                    OperationKind::Add => self.installer.install(&op.installable)?,
                    OperationKind::Remove => self.installer.uninstall(&op.installable)?,
                }
            }
        }
        Ok(())
    }
}

/// Installer that only logs. Used when no device drivers are configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingInstaller;

impl IntentInstaller for LoggingInstaller {
    fn install(&self, installable: &Intent) -> Result<(), InstallError> {
        info!(
            intent = %installable,
            resources = installable.resources().len(),
            "Installing"
        );
        Ok(())
    }

    fn uninstall(&self, installable: &Intent) -> Result<(), InstallError> {
        info!(intent = %installable, "Uninstalling");
        Ok(())
    }
}
