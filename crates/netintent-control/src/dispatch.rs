//! Chain construction and execution.

use netintent_store::{IntentData, Request};
use tracing::debug;

use crate::phase::{
    Compiling, FinalIntentProcessPhase, InstallRequest, IntentProcessPhase, PurgeRequest,
    Transition, WithdrawRequest,
};
use crate::processor::PhaseContext;

/// Build the first phase for a newly accepted request.
#[must_use]
pub fn new_initial_phase(
    ctx: &PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
) -> IntentProcessPhase {
    match data.request {
        Request::Install => {
            IntentProcessPhase::InstallRequest(InstallRequest::new(ctx.clone(), data, stored))
        }
        Request::Withdraw => {
            IntentProcessPhase::WithdrawRequest(WithdrawRequest::new(ctx.clone(), data, stored))
        }
        Request::Purge => {
            FinalIntentProcessPhase::PurgeRequest(PurgeRequest::new(data, stored)).into()
        }
    }
}

/// Build the first phase for installing `data` in place of the installed
/// record `replaced`.
#[must_use]
pub fn new_replace_phase(
    ctx: &PhaseContext,
    mut data: IntentData,
    stored: Option<IntentData>,
    replaced: IntentData,
) -> IntentProcessPhase {
    data.carry_error_count(stored.as_ref());
    IntentProcessPhase::Compiling(Compiling::replacing(ctx.clone(), data, stored, replaced))
}

/// Run a chain from `initial` until its final phase has completed.
#[must_use]
pub fn process(initial: IntentProcessPhase) -> FinalIntentProcessPhase {
    let mut current = initial;
    loop {
        debug!(
            key = %current.data().key(),
            phase = current.name(),
            state = %current.data().state,
            "Executing phase"
        );
        match current.execute() {
            Transition::Next(next) => current = next,
            Transition::Done(done) => return done,
        }
    }
}

/// Drive one request against `stored` and return the completed final phase.
#[must_use]
pub fn dispatch(
    ctx: &PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
) -> FinalIntentProcessPhase {
    process(new_initial_phase(ctx, data, stored))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::error::CompileError;
    use crate::mock::MockProcessor;
    use netintent_core::{ApplicationId, ConnectPoint, Intent, IntentKind, Key};
    use netintent_store::{IntentState, Version};

    fn intent() -> Intent {
        let app = ApplicationId::new(7, "org.example.dispatch");
        Intent::new(
            app.clone(),
            Key::of("h1-h2", &app),
            IntentKind::PointToPoint {
                ingress: ConnectPoint::new("of:1", 1),
                egress: ConnectPoint::new("of:3", 2),
            },
        )
    }

    fn ctx() -> (Arc<MockProcessor>, PhaseContext) {
        let mock = Arc::new(MockProcessor::new());
        (mock.clone(), PhaseContext::new(mock))
    }

    #[test]
    fn initial_phase_per_request() {
        let (_, ctx) = ctx();
        let phase = |request| {
            new_initial_phase(&ctx, IntentData::new(intent(), request, Version::new(1)), None)
        };

        assert!(matches!(
            phase(Request::Install),
            IntentProcessPhase::InstallRequest(_)
        ));
        assert!(matches!(
            phase(Request::Withdraw),
            IntentProcessPhase::WithdrawRequest(_)
        ));
        assert!(matches!(
            phase(Request::Purge),
            IntentProcessPhase::Final(FinalIntentProcessPhase::PurgeRequest(_))
        ));
    }

    #[test]
    fn every_chain_ends_terminal() {
        let (mock, ctx) = ctx();
        let shared = intent();

        let installed = dispatch(
            &ctx,
            IntentData::new(shared.clone(), Request::Install, Version::new(1)),
            None,
        )
        .into_data();
        assert_eq!(installed.state, IntentState::Installed);

        let withdrawn = dispatch(
            &ctx,
            IntentData::new(shared.clone(), Request::Withdraw, Version::new(2)),
            Some(installed),
        )
        .into_data();
        assert_eq!(withdrawn.state, IntentState::Withdrawn);

        mock.fail_compile(CompileError::NoCompiler("point_to_point"));
        let failed = dispatch(
            &ctx,
            IntentData::new(shared.clone(), Request::Install, Version::new(3)),
            Some(withdrawn),
        )
        .into_data();
        assert_eq!(failed.state, IntentState::Failed);

        let purged = dispatch(
            &ctx,
            IntentData::new(shared, Request::Purge, Version::new(4)),
            Some(failed),
        );
        assert!(
            matches!(&purged, FinalIntentProcessPhase::PurgeRequest(p) if p.is_accepted())
        );
        assert!(purged.data().state.is_terminal());
    }

    #[test]
    fn withdraw_while_install_is_pending_fails() {
        let (mock, ctx) = ctx();
        let shared = intent();
        for state in [IntentState::InstallReq, IntentState::Compiling, IntentState::Installing] {
            let mut pending = IntentData::new(shared.clone(), Request::Install, Version::new(1));
            pending.state = state;

            let done = dispatch(
                &ctx,
                IntentData::new(shared.clone(), Request::Withdraw, Version::new(2)),
                Some(pending),
            );
            assert!(matches!(done, FinalIntentProcessPhase::Failed(_)), "from {state}");
            assert_eq!(done.data().state, IntentState::Failed);
        }
        assert!(mock.calls().is_empty());
    }

    #[test]
    fn replace_phase_carries_error_count() {
        let (_, ctx) = ctx();
        let shared = intent();
        let mut stored = IntentData::new(shared.clone(), Request::Install, Version::new(1));
        stored.state = IntentState::Failed;
        stored.error_count = 2;

        let mut replaced = IntentData::new(intent(), Request::Install, Version::new(1));
        replaced.state = IntentState::Installed;

        let phase = new_replace_phase(
            &ctx,
            IntentData::new(shared, Request::Install, Version::new(2)),
            Some(stored),
            replaced,
        );
        assert!(matches!(phase, IntentProcessPhase::Compiling(_)));
        assert_eq!(phase.data().error_count, 2);
        assert_eq!(process(phase).data().state, IntentState::Installed);
    }
}
