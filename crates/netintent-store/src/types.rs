//! Domain types stored in the database.
//!
//! [`IntentData`] is the processing record for one intent key: the intent,
//! the operation currently being driven, the lifecycle state, the compiled
//! installables and the error count. Only terminal records are persisted.

use std::fmt;

use netintent_core::{Intent, Key};
use serde::{Deserialize, Serialize};

/// Lifecycle states for an intent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u8)]
pub enum IntentState {
    /// Install has been requested and accepted.
    InstallReq = 1,
    /// The intent is being compiled into installables.
    Compiling = 2,
    /// Installables are being programmed on devices.
    Installing = 3,
    /// Device state matches the compiled installables.
    Installed = 4,
    /// Withdrawal has been requested and accepted.
    WithdrawReq = 5,
    /// Device state is being removed.
    Withdrawing = 6,
    /// No device state remains for the intent.
    Withdrawn = 7,
    /// Compilation or installation failed.
    Failed = 8,
    /// Device state may be inconsistent with any known record.
    Corrupt = 9,
    /// Purge accepted; the record is to be deleted.
    PurgeReq = 10,
}

impl IntentState {
    /// Convert the state to its numeric representation.
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Try to convert a numeric value to an `IntentState`.
    #[must_use]
    pub const fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(Self::InstallReq),
            2 => Some(Self::Compiling),
            3 => Some(Self::Installing),
            4 => Some(Self::Installed),
            5 => Some(Self::WithdrawReq),
            6 => Some(Self::Withdrawing),
            7 => Some(Self::Withdrawn),
            8 => Some(Self::Failed),
            9 => Some(Self::Corrupt),
            10 => Some(Self::PurgeReq),
            _ => None,
        }
    }

    /// Returns true for states a reconciliation may end in.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Installed | Self::Withdrawn | Self::Failed | Self::Corrupt | Self::PurgeReq
        )
    }

    /// Returns true if a purge request may be honoured from this state.
    #[must_use]
    pub const fn is_purgeable(self) -> bool {
        matches!(self, Self::Withdrawn | Self::Failed)
    }

    /// All states, in numeric order.
    #[must_use]
    pub const fn all() -> [Self; 10] {
        [
            Self::InstallReq,
            Self::Compiling,
            Self::Installing,
            Self::Installed,
            Self::WithdrawReq,
            Self::Withdrawing,
            Self::Withdrawn,
            Self::Failed,
            Self::Corrupt,
            Self::PurgeReq,
        ]
    }
}

impl fmt::Display for IntentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::InstallReq => "INSTALL_REQ",
            Self::Compiling => "COMPILING",
            Self::Installing => "INSTALLING",
            Self::Installed => "INSTALLED",
            Self::WithdrawReq => "WITHDRAW_REQ",
            Self::Withdrawing => "WITHDRAWING",
            Self::Withdrawn => "WITHDRAWN",
            Self::Failed => "FAILED",
            Self::Corrupt => "CORRUPT",
            Self::PurgeReq => "PURGE_REQ",
        };
        f.write_str(label)
    }
}

/// The operation a record is driving.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Request {
    /// Compile and program the intent.
    Install,
    /// Remove the intent's device state.
    Withdraw,
    /// Delete the record of a withdrawn or failed intent.
    Purge,
}

impl Request {
    /// The state a freshly accepted request starts in.
    #[must_use]
    pub const fn pending_state(self) -> IntentState {
        match self {
            Self::Install => IntentState::InstallReq,
            Self::Withdraw => IntentState::WithdrawReq,
            Self::Purge => IntentState::PurgeReq,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Install => f.write_str("INSTALL"),
            Self::Withdraw => f.write_str("WITHDRAW"),
            Self::Purge => f.write_str("PURGE"),
        }
    }
}

/// Logical version of a record. Later requests carry larger versions.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// Create a version from a raw counter value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// The raw counter value.
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// The processing record for one intent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntentData {
    /// The intent being processed.
    pub intent: Intent,
    /// The operation currently being driven.
    pub request: Request,
    /// Label of the last phase that executed.
    pub state: IntentState,
    /// Compiled installables; empty until compiled.
    pub installables: Vec<Intent>,
    /// Failures accumulated for this (intent, request) pair.
    pub error_count: u32,
    /// Version assigned when the request was accepted.
    pub version: Version,
    /// Description of the most recent failure, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
}

impl IntentData {
    /// Create the record for a newly accepted request.
    #[must_use]
    pub fn new(intent: Intent, request: Request, version: Version) -> Self {
        Self {
            intent,
            request,
            state: request.pending_state(),
            installables: Vec::new(),
            error_count: 0,
            version,
            last_error: None,
        }
    }

    /// The key this record is stored under.
    #[must_use]
    pub const fn key(&self) -> Key {
        self.intent.key()
    }

    /// Carry the error count forward from the stored record.
    ///
    /// The count is copied when the stored record drives the same request for
    /// the same intent, and reset to zero otherwise (including when nothing
    /// is stored).
    pub fn carry_error_count(&mut self, stored: Option<&Self>) {
        self.error_count = match stored {
            Some(prev) if prev.intent == self.intent && prev.request == self.request => {
                prev.error_count
            }
            _ => 0,
        };
    }

    /// Record a failure: bump the error count and keep a description.
    pub fn record_failure(&mut self, error: impl fmt::Display) {
        self.error_count = self.error_count.saturating_add(1);
        self.last_error = Some(error.to_string());
    }

    /// Decide whether `new` may overwrite `current` in the store.
    ///
    /// Newer versions always win and older versions always lose. For equal
    /// versions only forward moves are accepted, so a replayed or reordered
    /// write can never move a record backwards.
    #[must_use]
    pub fn is_update_acceptable(current: Option<&Self>, new: &Self) -> bool {
        use IntentState::{
            Compiling, Corrupt, Failed, InstallReq, Installed, Installing, PurgeReq, WithdrawReq,
            Withdrawing, Withdrawn,
        };

        let Some(current) = current else {
            return true;
        };
        if current.version < new.version {
            return true;
        }
        if current.version > new.version {
            return false;
        }

        match new.state {
            Installing | Installed => {
                if current.state == new.state {
                    return false;
                }
                if new.state == Installed && current.state == Installing {
                    return true;
                }
                !matches!(current.state, Installed | Withdrawing | Withdrawn | PurgeReq)
            }
            Withdrawing | Withdrawn => {
                if current.state == new.state {
                    return false;
                }
                if new.state == Withdrawn && current.state == Withdrawing {
                    return true;
                }
                !matches!(current.state, Installing | Installed | Withdrawn | PurgeReq)
            }
            Failed | Corrupt => current.state != new.state,
            PurgeReq => true,
            Compiling | InstallReq | WithdrawReq => false,
        }
    }
}
