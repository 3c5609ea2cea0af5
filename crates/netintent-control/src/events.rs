//! Intent lifecycle events.
//!
//! Events are broadcast to every subscriber. Sending never blocks the
//! manager; slow subscribers lag and miss events.

use chrono::{DateTime, Utc};
use netintent_core::Intent;
use netintent_store::IntentState;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// What happened to an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IntentEventKind {
    /// An install request was accepted.
    Submitted,
    /// The intent is installed.
    Installed,
    /// The intent is withdrawn.
    Withdrawn,
    /// The request failed.
    Failed,
    /// Device state may be inconsistent.
    Corrupt,
    /// The intent's record was deleted.
    Purged,
}

impl IntentEventKind {
    /// The event announcing a record that landed in `state`, if any.
    #[must_use]
    pub const fn for_state(state: IntentState) -> Option<Self> {
        match state {
            IntentState::InstallReq => Some(Self::Submitted),
            IntentState::Installed => Some(Self::Installed),
            IntentState::Withdrawn => Some(Self::Withdrawn),
            IntentState::Failed => Some(Self::Failed),
            IntentState::Corrupt => Some(Self::Corrupt),
            IntentState::PurgeReq => Some(Self::Purged),
            IntentState::Compiling
            | IntentState::Installing
            | IntentState::WithdrawReq
            | IntentState::Withdrawing => None,
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentEvent {
    /// What happened.
    pub kind: IntentEventKind,
    /// The intent it happened to.
    pub intent: Intent,
    /// When it happened.
    pub timestamp: DateTime<Utc>,
}

/// Broadcast channel for intent events.
#[derive(Debug)]
pub struct EventBus {
    sender: broadcast::Sender<IntentEvent>,
}

impl EventBus {
    /// Create a bus buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Subscribe to events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<IntentEvent> {
        self.sender.subscribe()
    }

    /// Publish an event for `intent`.
    pub fn emit(&self, kind: IntentEventKind, intent: &Intent) {
        let event = IntentEvent {
            kind,
            intent: intent.clone(),
            timestamp: Utc::now(),
        };
        tracing::trace!(kind = ?kind, key = %intent.key(), "Intent event");
        // No subscribers is fine.
        let _ = self.sender.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use netintent_core::{ApplicationId, ConnectPoint, IntentKind, Key};

    fn intent() -> Intent {
        let app = ApplicationId::new(1, "org.example.events");
        Intent::new(
            app.clone(),
            Key::of("e", &app),
            IntentKind::PointToPoint {
                ingress: ConnectPoint::new("of:1", 1),
                egress: ConnectPoint::new("of:2", 1),
            },
        )
    }

    #[test]
    fn only_resting_states_have_events() {
        assert_eq!(
            IntentEventKind::for_state(IntentState::Installed),
            Some(IntentEventKind::Installed)
        );
        assert_eq!(
            IntentEventKind::for_state(IntentState::PurgeReq),
            Some(IntentEventKind::Purged)
        );
        assert_eq!(IntentEventKind::for_state(IntentState::Compiling), None);
        assert_eq!(IntentEventKind::for_state(IntentState::Withdrawing), None);
        assert_eq!(IntentEventKind::for_state(IntentState::WithdrawReq), None);
    }

    #[tokio::test]
    async fn subscribers_receive_events() {
        let bus = EventBus::new(8);
        let mut rx = bus.subscribe();
        let intent = intent();

        bus.emit(IntentEventKind::Submitted, &intent);
        bus.emit(IntentEventKind::Installed, &intent);

        assert_eq!(rx.recv().await.unwrap().kind, IntentEventKind::Submitted);
        let installed = rx.recv().await.unwrap();
        assert_eq!(installed.kind, IntentEventKind::Installed);
        assert_eq!(installed.intent, intent);
    }

    #[test]
    fn emit_without_subscribers() {
        let bus = EventBus::new(1);
        bus.emit(IntentEventKind::Failed, &intent());
    }

    #[test]
    fn kind_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&IntentEventKind::Submitted).unwrap(),
            "\"SUBMITTED\""
        );
    }
}
