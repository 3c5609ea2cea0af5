//! Error types for the control plane.
//!
//! [`CompileError`] and [`InstallError`] are returned by collaborators and are
//! always converted into a phase transition; they never escape the phase
//! machine. [`ControlError`] covers failures of the surrounding manager.

use netintent_core::{CoreError, Key};
use netintent_store::IntentState;
use thiserror::Error;

/// A result type using `ControlError`.
pub type Result<T> = std::result::Result<T, ControlError>;

/// An intent cannot currently be realized.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CompileError {
    /// No compiler is registered for the intent's shape.
    #[error("no compiler registered for {0} intents")]
    NoCompiler(&'static str),

    /// No path satisfies the intent.
    #[error("no path from {src} to {dst}")]
    PathNotFound {
        /// Ingress description.
        src: String,
        /// Egress description.
        dst: String,
    },

    /// A resource the intent needs is exhausted.
    #[error("resource exhausted: {0}")]
    ResourceExhausted(String),

    /// Any other compilation failure.
    #[error("compilation failed: {0}")]
    Failed(String),
}

/// Device programming failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstallError {
    /// No installer handles the installable's shape.
    #[error("no installer registered for {0} intents")]
    NoInstaller(&'static str),

    /// A device refused an operation.
    #[error("device {device} rejected operation: {reason}")]
    DeviceRejected {
        /// Device URI.
        device: String,
        /// Reason reported by the device.
        reason: String,
    },

    /// A device could not be reached.
    #[error("device {0} unreachable")]
    Unreachable(String),

    /// Any other programming failure.
    #[error("installation failed: {0}")]
    Failed(String),
}

/// Errors that can occur in intent manager operations.
#[derive(Debug, Error)]
pub enum ControlError {
    /// A core-level failure, e.g. a missing intent.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Installable intents are produced by compilation, never submitted.
    #[error("intent {0} is installable and cannot be submitted directly")]
    InstallableSubmitted(Key),

    /// The intent to be replaced is not installed.
    #[error("cannot replace intent {key}: it is {state}, not INSTALLED")]
    InvalidReplace {
        /// Key of the intent being replaced.
        key: Key,
        /// Its stored state.
        state: IntentState,
    },

    /// Storage layer error.
    #[error("storage error: {0}")]
    Store(#[from] netintent_store::StoreError),

    /// A worker could not be scheduled or panicked.
    #[error("worker failed: {0}")]
    Worker(String),

    /// Internal error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ControlError {
    /// Returns true if this error might be resolved by retrying.
    #[must_use]
    pub const fn is_retriable(&self) -> bool {
        matches!(self, Self::Store(_) | Self::Worker(_) | Self::Internal(_))
    }
}
