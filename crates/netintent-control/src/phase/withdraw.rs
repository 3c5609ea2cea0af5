//! Withdraw-side phases.

use std::fmt;
use std::sync::Arc;

use netintent_store::{IntentData, IntentState, Request};
use tracing::debug;

use super::terminal::{Corrupt, Failed, Withdrawn, WithdrawingFailed};
use super::{FinalIntentProcessPhase, IntentProcessPhase};
use crate::processor::{OperationSet, PhaseContext, UninstallCoordinator};

/// Entry point for a withdraw request.
#[derive(Debug)]
pub struct WithdrawRequest {
    ctx: PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
}

impl WithdrawRequest {
    /// Create the phase for `data`, given the currently stored record.
    #[must_use]
    pub fn new(ctx: PhaseContext, mut data: IntentData, stored: Option<IntentData>) -> Self {
        data.state = IntentState::WithdrawReq;
        Self { ctx, data, stored }
    }

    /// The record.
    #[must_use]
    pub const fn data(&self) -> &IntentData {
        &self.data
    }

    /// Decide how to withdraw.
    ///
    /// Withdrawal needs installables to remove. Without any, a stored record
    /// whose install has not yet settled fails the withdraw, anything else is
    /// simply withdrawn.
    #[must_use]
    pub fn execute(self) -> IntentProcessPhase {
        let Self {
            ctx,
            mut data,
            stored,
        } = self;

        data.carry_error_count(stored.as_ref());
        let install_in_flight = stored
            .as_ref()
            .is_some_and(|s| s.request == Request::Install && !s.state.is_terminal());

        let Some(current) = stored.filter(|s| !s.installables.is_empty()) else {
            let phase = if install_in_flight {
                FinalIntentProcessPhase::Failed(Failed::new(
                    data,
                    "withdraw requested while an install is in flight",
                ))
            } else {
                FinalIntentProcessPhase::Withdrawn(Withdrawn::new(data))
            };
            return phase.into();
        };

        let coordinator = ctx.coordinator().cloned();
        match coordinator {
            Some(coordinator) => IntentProcessPhase::WithdrawCoordinating(
                WithdrawCoordinating::new(ctx, coordinator, current, data),
            ),
            None => {
                data.installables = current.installables;
                FinalIntentProcessPhase::Withdrawing(Withdrawing::new(ctx, data)).into()
            }
        }
    }
}

/// Computes the withdrawal as one operation set before touching devices.
#[derive(Debug)]
pub struct WithdrawCoordinating {
    ctx: PhaseContext,
    coordinator: Coordinator,
    current: IntentData,
    pending: IntentData,
}

impl WithdrawCoordinating {
    /// Create the phase that withdraws `current` on behalf of `pending`.
    #[must_use]
    pub fn new(
        ctx: PhaseContext,
        coordinator: Arc<dyn UninstallCoordinator>,
        current: IntentData,
        pending: IntentData,
    ) -> Self {
        Self {
            ctx,
            coordinator: Coordinator(coordinator),
            current,
            pending,
        }
    }

    /// The pending withdraw record.
    #[must_use]
    pub const fn data(&self) -> &IntentData {
        &self.pending
    }

    /// Compute the operation set.
    #[must_use]
    pub fn execute(self) -> IntentProcessPhase {
        let Self {
            ctx,
            coordinator,
            current,
            mut pending,
        } = self;

        match coordinator.0.uninstall_coordinate(&current, &pending) {
            Ok(operations) => {
                debug!(
                    key = %pending.key(),
                    operations = operations.len(),
                    "Coordinated withdrawal"
                );
                pending.installables = current.installables;
                FinalIntentProcessPhase::Withdrawing(Withdrawing::coordinated(
                    ctx,
                    pending,
                    coordinator.0,
                    operations,
                ))
                .into()
            }
            Err(e) => FinalIntentProcessPhase::WithdrawingFailed(WithdrawingFailed::new(
                pending,
                current.installables,
                e,
            ))
            .into(),
        }
    }
}

/// Removes device state.
#[derive(Debug)]
pub struct Withdrawing {
    ctx: PhaseContext,
    data: IntentData,
    removal: Removal,
    landing: IntentState,
}

#[derive(Debug)]
enum Removal {
    Apply,
    Coordinated {
        coordinator: Coordinator,
        operations: OperationSet,
    },
}

struct Coordinator(Arc<dyn UninstallCoordinator>);

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Coordinator")
    }
}

impl Withdrawing {
    /// Withdraw the installables carried by `data`.
    #[must_use]
    pub fn new(ctx: PhaseContext, data: IntentData) -> Self {
        Self::build(ctx, data, Removal::Apply, IntentState::Withdrawn)
    }

    /// Push a coordinated operation set instead of diffing records.
    #[must_use]
    pub fn coordinated(
        ctx: PhaseContext,
        data: IntentData,
        coordinator: Arc<dyn UninstallCoordinator>,
        operations: OperationSet,
    ) -> Self {
        let removal = Removal::Coordinated {
            coordinator: Coordinator(coordinator),
            operations,
        };
        Self::build(ctx, data, removal, IntentState::Withdrawn)
    }

    /// Remove installables orphaned by a failed recompilation. The record
    /// lands FAILED once the devices are clean.
    #[must_use]
    pub fn cleanup(ctx: PhaseContext, data: IntentData) -> Self {
        Self::build(ctx, data, Removal::Apply, IntentState::Failed)
    }

    fn build(
        ctx: PhaseContext,
        mut data: IntentData,
        removal: Removal,
        landing: IntentState,
    ) -> Self {
        data.state = IntentState::Withdrawing;
        Self {
            ctx,
            data,
            removal,
            landing,
        }
    }

    /// The record.
    #[must_use]
    pub const fn data(&self) -> &IntentData {
        &self.data
    }

    /// Take the record.
    #[must_use]
    pub fn into_data(self) -> IntentData {
        self.data
    }

    /// Remove device state. Failure lands CORRUPT.
    pub(super) fn complete(mut self) -> FinalIntentProcessPhase {
        let result = match &self.removal {
            Removal::Apply => self.ctx.processor().apply(Some(&self.data), None),
            Removal::Coordinated {
                coordinator,
                operations,
            } => coordinator.0.apply_coordinated(operations),
        };

        match result {
            Ok(()) => {
                self.data.state = self.landing;
                self.data.installables.clear();
                debug!(
                    key = %self.data.key(),
                    state = %self.data.state,
                    "Device state removed"
                );
                FinalIntentProcessPhase::Withdrawing(self)
            }
            // Orphan cleanup already counted the compile failure.
            Err(e) if self.landing == IntentState::Failed => {
                FinalIntentProcessPhase::Corrupt(Corrupt::after_failure(self.data, e))
            }
            Err(e) => FinalIntentProcessPhase::Corrupt(Corrupt::new(self.data, e)),
        }
    }
}
