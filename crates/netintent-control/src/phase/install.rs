//! Install-side phases: request, compilation, replacement and installation.

use netintent_store::{IntentData, IntentState, Request};
use tracing::{debug, warn};

use super::terminal::{Failed, ReplaceFailed};
use super::withdraw::Withdrawing;
use super::{FinalIntentProcessPhase, IntentProcessPhase};
use crate::processor::PhaseContext;

/// Entry point for an install request.
#[derive(Debug)]
pub struct InstallRequest {
    ctx: PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
}

impl InstallRequest {
    /// Create the phase for `data`, given the currently stored record.
    #[must_use]
    pub fn new(ctx: PhaseContext, mut data: IntentData, stored: Option<IntentData>) -> Self {
        data.state = IntentState::InstallReq;
        Self { ctx, data, stored }
    }

    /// The record.
    #[must_use]
    pub const fn data(&self) -> &IntentData {
        &self.data
    }

    /// Carry the error count forward and move on to compilation.
    #[must_use]
    pub fn execute(mut self) -> IntentProcessPhase {
        self.data.carry_error_count(self.stored.as_ref());
        IntentProcessPhase::Compiling(Compiling::new(self.ctx, self.data, self.stored))
    }
}

/// Compiles the intent into installables.
#[derive(Debug)]
pub struct Compiling {
    ctx: PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
    replaced: Option<IntentData>,
}

impl Compiling {
    /// Compile `data`, reusing `stored`'s installables as the previous result.
    #[must_use]
    pub fn new(ctx: PhaseContext, data: IntentData, stored: Option<IntentData>) -> Self {
        Self::build(ctx, data, stored, None)
    }

    /// Compile `data` as the successor of the installed record `replaced`.
    #[must_use]
    pub fn replacing(
        ctx: PhaseContext,
        data: IntentData,
        stored: Option<IntentData>,
        replaced: IntentData,
    ) -> Self {
        Self::build(ctx, data, stored, Some(replaced))
    }

    fn build(
        ctx: PhaseContext,
        mut data: IntentData,
        stored: Option<IntentData>,
        replaced: Option<IntentData>,
    ) -> Self {
        data.state = IntentState::Compiling;
        debug!(key = %data.key(), version = %data.version, "Compiling intent");
        Self {
            ctx,
            data,
            stored,
            replaced,
        }
    }

    /// The record.
    #[must_use]
    pub const fn data(&self) -> &IntentData {
        &self.data
    }

    /// Compile and choose the next phase.
    ///
    /// On failure, installables left on devices by the stored record are
    /// withdrawn so they do not outlive the intent that produced them.
    #[must_use]
    pub fn execute(self) -> IntentProcessPhase {
        let Self {
            ctx,
            mut data,
            stored,
            replaced,
        } = self;

        let previous = stored
            .as_ref()
            .map_or(&[][..], |s| s.installables.as_slice());

        match ctx.processor().compile(&data.intent, previous) {
            Ok(installables) => {
                debug!(
                    key = %data.key(),
                    installables = installables.len(),
                    "Compiled intent"
                );
                data.installables = installables;
                match replaced {
                    Some(replaced) => IntentProcessPhase::Replacing(Replacing::new(
                        ctx, data, stored, replaced,
                    )),
                    None => {
                        FinalIntentProcessPhase::Installing(Installing::new(ctx, data, stored))
                            .into()
                    }
                }
            }
            Err(e) => {
                warn!(key = %data.key(), error = %e, "Unable to compile intent");
                match stored {
                    Some(stored) if replaced.is_none() && !stored.installables.is_empty() => {
                        data.installables = stored.installables;
                        data.record_failure(&e);
                        FinalIntentProcessPhase::Withdrawing(Withdrawing::cleanup(ctx, data))
                            .into()
                    }
                    _ => FinalIntentProcessPhase::Failed(Failed::new(data, e)).into(),
                }
            }
        }
    }
}

/// Removes the replaced intent before its successor is installed.
#[derive(Debug)]
pub struct Replacing {
    ctx: PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
    replaced: IntentData,
}

impl Replacing {
    /// Create the phase for the compiled successor `data` of `replaced`.
    #[must_use]
    pub fn new(
        ctx: PhaseContext,
        data: IntentData,
        stored: Option<IntentData>,
        replaced: IntentData,
    ) -> Self {
        debug!(
            key = %data.key(),
            replaced = %replaced.key(),
            "Replacing intent"
        );
        Self {
            ctx,
            data,
            stored,
            replaced,
        }
    }

    /// The successor's record.
    #[must_use]
    pub const fn data(&self) -> &IntentData {
        &self.data
    }

    /// Uninstall the replaced intent, then install the successor.
    #[must_use]
    pub fn execute(self) -> IntentProcessPhase {
        let Self {
            ctx,
            data,
            stored,
            replaced,
        } = self;

        match ctx.processor().uninstall(&replaced) {
            Ok(()) => {
                let mut retired = replaced;
                retired.request = Request::Withdraw;
                retired.state = IntentState::Withdrawn;
                retired.installables.clear();
                retired.error_count = 0;
                retired.last_error = None;
                retired.version = data.version;
                FinalIntentProcessPhase::Installing(Installing::replacing(
                    ctx, data, stored, retired,
                ))
                .into()
            }
            Err(e) => FinalIntentProcessPhase::ReplaceFailed(ReplaceFailed::new(data, e)).into(),
        }
    }
}

/// Programs the compiled installables.
#[derive(Debug)]
pub struct Installing {
    ctx: PhaseContext,
    data: IntentData,
    stored: Option<IntentData>,
    retired: Option<IntentData>,
}

impl Installing {
    /// Create the phase for the compiled `data`. `stored` is the record whose
    /// device state is being superseded.
    #[must_use]
    pub fn new(ctx: PhaseContext, mut data: IntentData, stored: Option<IntentData>) -> Self {
        data.state = IntentState::Installing;
        Self {
            ctx,
            data,
            stored,
            retired: None,
        }
    }

    fn replacing(
        ctx: PhaseContext,
        data: IntentData,
        stored: Option<IntentData>,
        retired: IntentData,
    ) -> Self {
        Self {
            retired: Some(retired),
            ..Self::new(ctx, data, stored)
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

    /// The record of the intent this installation replaced, now withdrawn.
    #[must_use]
    pub const fn retired(&self) -> Option<&IntentData> {
        self.retired.as_ref()
    }

    /// Program devices. Success lands INSTALLED, failure lands FAILED.
    pub(super) fn complete(mut self) -> FinalIntentProcessPhase {
        match self
            .ctx
            .processor()
            .apply(self.stored.as_ref(), Some(&self.data))
        {
            Ok(()) => {
                self.data.state = IntentState::Installed;
                debug!(
                    key = %self.data.key(),
                    version = %self.data.version,
                    "Intent installed"
                );
                FinalIntentProcessPhase::Installing(self)
            }
            Err(e) => FinalIntentProcessPhase::Failed(Failed::new(self.data, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::dispatch::process;
    use crate::error::{CompileError, InstallError};
    use crate::mock::{MockCall, MockProcessor};
    use netintent_core::{ApplicationId, ConnectPoint, Intent, IntentKind, Key};
    use netintent_store::Version;

    fn intent(name: &str) -> Intent {
        let app = ApplicationId::new(1, "org.example.test");
        Intent::new(
            app.clone(),
            Key::of(name, &app),
            IntentKind::PointToPoint {
                ingress: ConnectPoint::new("of:1", 1),
                egress: ConnectPoint::new("of:2", 1),
            },
        )
    }

    fn setup() -> (Arc<MockProcessor>, PhaseContext) {
        let mock = Arc::new(MockProcessor::new());
        let ctx = PhaseContext::new(mock.clone());
        (mock, ctx)
    }

    fn installed(intent: Intent, version: u64) -> IntentData {
        let mut data = IntentData::new(intent, Request::Install, Version::new(version));
        data.installables = vec![data.intent.derive(IntentKind::Path { links: vec![] })];
        data.state = IntentState::Installed;
        data
    }

    #[test]
    fn install_request_labels_and_compiles() {
        let (_mock, ctx) = setup();
        let data = IntentData::new(intent("a"), Request::Install, Version::new(1));
        let phase = InstallRequest::new(ctx, data, None);
        assert_eq!(phase.data().state, IntentState::InstallReq);

        let next = phase.execute();
        assert!(matches!(next, IntentProcessPhase::Compiling(_)));
        assert_eq!(next.data().state, IntentState::Compiling);
    }

    #[test]
    fn compiled_intent_is_installed() {
        let (mock, ctx) = setup();
        let data = IntentData::new(intent("a"), Request::Install, Version::new(1));

        let done = process(IntentProcessPhase::InstallRequest(InstallRequest::new(
            ctx, data, None,
        )));
        assert!(matches!(done, FinalIntentProcessPhase::Installing(_)));
        let out = done.into_data();
        assert_eq!(out.state, IntentState::Installed);
        assert!(!out.installables.is_empty());
        assert!(out.installables.iter().all(Intent::is_installable));
        assert_eq!(mock.calls().len(), 2);
    }

    #[test]
    fn compile_failure_without_installables_fails() {
        let (mock, ctx) = setup();
        mock.fail_compile(CompileError::Failed("no path".into()));
        let data = IntentData::new(intent("a"), Request::Install, Version::new(1));

        let done = process(IntentProcessPhase::InstallRequest(InstallRequest::new(
            ctx, data, None,
        )));
        assert!(matches!(done, FinalIntentProcessPhase::Failed(_)));
        let out = done.into_data();
        assert_eq!(out.state, IntentState::Failed);
        assert_eq!(out.error_count, 1);
        assert!(!mock
            .calls()
            .iter()
            .any(|c| matches!(c, MockCall::Apply { .. })));
    }

    #[test]
    fn compile_failure_withdraws_orphaned_installables() {
        let (mock, ctx) = setup();
        mock.fail_compile(CompileError::Failed("no path".into()));
        let shared = intent("a");
        let stored = installed(shared.clone(), 1);
        let data = IntentData::new(shared, Request::Install, Version::new(2));

        let done = process(IntentProcessPhase::InstallRequest(InstallRequest::new(
            ctx,
            data,
            Some(stored),
        )));
        assert!(matches!(done, FinalIntentProcessPhase::Withdrawing(_)));
        let out = done.into_data();
        assert_eq!(out.state, IntentState::Failed);
        assert!(out.installables.is_empty());
        assert!(mock.calls().contains(&MockCall::Apply {
            old: Some(Version::new(2)),
            new: None
        }));
    }

    #[test]
    fn failed_orphan_cleanup_counts_once() {
        let (mock, ctx) = setup();
        mock.fail_compile(CompileError::Failed("no path".into()));
        mock.fail_apply(InstallError::Unreachable("of:1".into()));
        let shared = intent("a");
        let stored = installed(shared.clone(), 1);
        let data = IntentData::new(shared, Request::Install, Version::new(2));

        let phase = InstallRequest::new(ctx, data, Some(stored));
        let done = process(IntentProcessPhase::InstallRequest(phase));
        assert!(matches!(done, FinalIntentProcessPhase::Corrupt(_)));
        let out = done.into_data();
        assert_eq!(out.state, IntentState::Corrupt);
        assert_eq!(out.error_count, 1);
        assert_eq!(out.last_error.as_deref(), Some("compilation failed: no path"));
        assert_eq!(out.installables.len(), 1);
    }

    #[test]
    fn install_failure_fails_and_counts() {
        let (mock, ctx) = setup();
        mock.fail_apply(InstallError::Unreachable("of:2".into()));
        let shared = intent("a");
        let mut stored = IntentData::new(shared.clone(), Request::Install, Version::new(1));
        stored.state = IntentState::Failed;
        stored.error_count = 3;
        let data = IntentData::new(shared, Request::Install, Version::new(2));

        let phase = InstallRequest::new(ctx, data, Some(stored));
        let out = process(IntentProcessPhase::InstallRequest(phase)).into_data();
        assert_eq!(out.state, IntentState::Failed);
        assert_eq!(out.error_count, 4);
        assert_eq!(out.last_error.as_deref(), Some("device of:2 unreachable"));
    }

    #[test]
    fn replacement_retires_old_intent() {
        let (mock, ctx) = setup();
        let old = installed(intent("old"), 1);
        let data = IntentData::new(intent("new"), Request::Install, Version::new(5));

        let done = process(IntentProcessPhase::Compiling(Compiling::replacing(
            ctx,
            data,
            None,
            old.clone(),
        )));
        let retired = done.retired().cloned().unwrap();
        assert_eq!(retired.key(), old.key());
        assert_eq!(retired.state, IntentState::Withdrawn);
        assert_eq!(retired.version, Version::new(5));
        assert_eq!(done.data().state, IntentState::Installed);
        assert!(mock.calls().contains(&MockCall::Uninstall(old.key())));
    }

    #[test]
    fn replacement_uninstall_failure() {
        let (mock, ctx) = setup();
        mock.fail_uninstall(InstallError::Failed("busy".into()));
        let old = installed(intent("old"), 1);
        let data = IntentData::new(intent("new"), Request::Install, Version::new(5));

        let done = process(IntentProcessPhase::Compiling(Compiling::replacing(
            ctx, data, None, old,
        )));
        assert!(matches!(done, FinalIntentProcessPhase::ReplaceFailed(_)));
        assert!(done.retired().is_none());
        let out = done.into_data();
        assert_eq!(out.state, IntentState::Failed);
        assert!(out.installables.is_empty());
    }
}
