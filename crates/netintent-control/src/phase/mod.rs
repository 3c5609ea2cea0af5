//! The intent processing phase machine.
//!
//! A reconciliation is a chain of phases. Each non-final phase performs one
//! step against the collaborators in its [`PhaseContext`] and yields the next
//! phase. The chain always ends in a [`FinalIntentProcessPhase`], whose record
//! is the outcome to persist.
//!
//! Every phase exclusively owns the [`IntentData`] it works on and labels it
//! with its own state before doing anything else, so the record always
//! reflects the last phase that executed.
//!
//! [`PhaseContext`]: crate::processor::PhaseContext

mod install;
mod terminal;
mod withdraw;

pub use install::{Compiling, InstallRequest, Installing, Replacing};
pub use terminal::{Corrupt, Failed, PurgeRequest, ReplaceFailed, Withdrawn, WithdrawingFailed};
pub use withdraw::{WithdrawCoordinating, WithdrawRequest, Withdrawing};

use netintent_store::IntentData;

/// A phase that still has work to do, or the final phase that ends a chain.
#[derive(Debug)]
pub enum IntentProcessPhase {
    /// Entry point for install requests.
    InstallRequest(InstallRequest),
    /// Compiling the intent into installables.
    Compiling(Compiling),
    /// Entry point for withdraw requests.
    WithdrawRequest(WithdrawRequest),
    /// Computing a combined withdrawal.
    WithdrawCoordinating(WithdrawCoordinating),
    /// Removing the replaced intent before installing its successor.
    Replacing(Replacing),
    /// The chain has reached its final phase.
    Final(FinalIntentProcessPhase),
}

/// Result of executing one phase.
#[derive(Debug)]
pub enum Transition {
    /// Continue with this phase.
    Next(IntentProcessPhase),
    /// The chain is complete.
    Done(FinalIntentProcessPhase),
}

impl IntentProcessPhase {
    /// Execute this phase.
    ///
    /// Non-final phases yield their successor. The final phase runs its own
    /// device step exactly once and completes the chain.
    #[must_use]
    pub fn execute(self) -> Transition {
        match self {
            Self::InstallRequest(phase) => Transition::Next(phase.execute()),
            Self::Compiling(phase) => Transition::Next(phase.execute()),
            Self::WithdrawRequest(phase) => Transition::Next(phase.execute()),
            Self::WithdrawCoordinating(phase) => Transition::Next(phase.execute()),
            Self::Replacing(phase) => Transition::Next(phase.execute()),
            Self::Final(phase) => Transition::Done(phase.complete()),
        }
    }

    /// The record this phase is working on.
    #[must_use]
    pub fn data(&self) -> &IntentData {
        match self {
            Self::InstallRequest(phase) => phase.data(),
            Self::Compiling(phase) => phase.data(),
            Self::WithdrawRequest(phase) => phase.data(),
            Self::WithdrawCoordinating(phase) => phase.data(),
            Self::Replacing(phase) => phase.data(),
            Self::Final(phase) => phase.data(),
        }
    }

    /// Short phase name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::InstallRequest(_) => "install_request",
            Self::Compiling(_) => "compiling",
            Self::WithdrawRequest(_) => "withdraw_request",
            Self::WithdrawCoordinating(_) => "withdraw_coordinating",
            Self::Replacing(_) => "replacing",
            Self::Final(phase) => phase.name(),
        }
    }
}

impl From<FinalIntentProcessPhase> for IntentProcessPhase {
    fn from(phase: FinalIntentProcessPhase) -> Self {
        Self::Final(phase)
    }
}

/// A phase that ends a chain.
///
/// `Installing` and `Withdrawing` still touch devices when completed; the
/// remaining variants only carry their record.
#[derive(Debug)]
pub enum FinalIntentProcessPhase {
    /// Programming compiled installables.
    Installing(Installing),
    /// Removing device state.
    Withdrawing(Withdrawing),
    /// Nothing was installed; the intent is withdrawn.
    Withdrawn(Withdrawn),
    /// Purge decision.
    PurgeRequest(PurgeRequest),
    /// Device state may be inconsistent.
    Corrupt(Corrupt),
    /// The request failed.
    Failed(Failed),
    /// The replaced intent could not be removed.
    ReplaceFailed(ReplaceFailed),
    /// The combined withdrawal could not be computed.
    WithdrawingFailed(WithdrawingFailed),
}

impl FinalIntentProcessPhase {
    /// Run the device step of this phase, if it has one.
    ///
    /// A failed device step hands its record to the matching failure phase.
    #[must_use]
    pub fn complete(self) -> Self {
        match self {
            Self::Installing(phase) => phase.complete(),
            Self::Withdrawing(phase) => phase.complete(),
            Self::PurgeRequest(phase) => Self::PurgeRequest(phase.complete()),
            other => other,
        }
    }

    /// The record to persist.
    #[must_use]
    pub fn data(&self) -> &IntentData {
        match self {
            Self::Installing(phase) => phase.data(),
            Self::Withdrawing(phase) => phase.data(),
            Self::Withdrawn(phase) => phase.data(),
            Self::PurgeRequest(phase) => phase.data(),
            Self::Corrupt(phase) => phase.data(),
            Self::Failed(phase) => phase.data(),
            Self::ReplaceFailed(phase) => phase.data(),
            Self::WithdrawingFailed(phase) => phase.data(),
        }
    }

    /// Take ownership of the record to persist.
    #[must_use]
    pub fn into_data(self) -> IntentData {
        match self {
            Self::Installing(phase) => phase.into_data(),
            Self::Withdrawing(phase) => phase.into_data(),
            Self::Withdrawn(phase) => phase.into_data(),
            Self::PurgeRequest(phase) => phase.into_data(),
            Self::Corrupt(phase) => phase.into_data(),
            Self::Failed(phase) => phase.into_data(),
            Self::ReplaceFailed(phase) => phase.into_data(),
            Self::WithdrawingFailed(phase) => phase.into_data(),
        }
    }

    /// The record of an intent retired by a replacement, if any.
    #[must_use]
    pub fn retired(&self) -> Option<&IntentData> {
        match self {
            Self::Installing(phase) => phase.retired(),
            _ => None,
        }
    }

    /// Short phase name for logging.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Installing(_) => "installing",
            Self::Withdrawing(_) => "withdrawing",
            Self::Withdrawn(_) => "withdrawn",
            Self::PurgeRequest(_) => "purge_request",
            Self::Corrupt(_) => "corrupt",
            Self::Failed(_) => "failed",
            Self::ReplaceFailed(_) => "replace_failed",
            Self::WithdrawingFailed(_) => "withdrawing_failed",
        }
    }
}
