//! Final phases that only carry their record.

use std::fmt;

use netintent_store::{IntentData, IntentState};
use tracing::{debug, warn};

/// Nothing is installed for the intent.
#[derive(Debug)]
pub struct Withdrawn {
    data: IntentData,
}

impl Withdrawn {
    /// Label `data` WITHDRAWN.
    #[must_use]
    pub fn new(mut data: IntentData) -> Self {
        data.state = IntentState::Withdrawn;
        data.installables.clear();
        debug!(key = %data.key(), version = %data.version, "Intent withdrawn");
        Self { data }
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
}

/// Decides whether a purge may delete the stored record.
///
/// A purge is accepted when nothing is stored for the key, or when the stored
/// record is WITHDRAWN or FAILED. A rejected purge leaves the stored record in
/// place and reports it unchanged.
#[derive(Debug)]
pub struct PurgeRequest {
    data: IntentData,
    stored: Option<IntentData>,
    accepted: bool,
}

impl PurgeRequest {
    /// Evaluate a purge of `stored` on behalf of `data`.
    #[must_use]
    pub fn new(mut data: IntentData, stored: Option<IntentData>) -> Self {
        data.state = IntentState::PurgeReq;
        let accepted = stored.as_ref().map_or(true, |s| s.state.is_purgeable());
        Self {
            data,
            stored,
            accepted,
        }
    }

    pub(super) fn complete(self) -> Self {
        match &self.stored {
            Some(stored) if !self.accepted => warn!(
                key = %stored.key(),
                state = %stored.state,
                "Purge rejected: intent is neither withdrawn nor failed"
            ),
            _ => debug!(key = %self.data.key(), "Purge accepted"),
        }
        self
    }

    /// True if the record may be deleted.
    #[must_use]
    pub const fn is_accepted(&self) -> bool {
        self.accepted
    }

    /// The purge record when accepted, the untouched stored record otherwise.
    #[must_use]
    pub fn data(&self) -> &IntentData {
        match &self.stored {
            Some(stored) if !self.accepted => stored,
            _ => &self.data,
        }
    }

    /// Take the record described by [`Self::data`].
    #[must_use]
    pub fn into_data(self) -> IntentData {
        match self.stored {
            Some(stored) if !self.accepted => stored,
            _ => self.data,
        }
    }
}

/// Device state may not match any known record.
#[derive(Debug)]
pub struct Corrupt {
    data: IntentData,
}

impl Corrupt {
    /// Label `data` CORRUPT and record `error`.
    #[must_use]
    pub fn new(mut data: IntentData, error: impl fmt::Display) -> Self {
        data.state = IntentState::Corrupt;
        data.record_failure(&error);
        warn!(
            key = %data.key(),
            errors = data.error_count,
            error = %error,
            "Intent corrupt"
        );
        Self { data }
    }

    /// Label `data` CORRUPT when the failure that led here is already
    /// recorded on it. `error` is logged but not counted.
    #[must_use]
    pub fn after_failure(mut data: IntentData, error: impl fmt::Display) -> Self {
        data.state = IntentState::Corrupt;
        warn!(
            key = %data.key(),
            errors = data.error_count,
            error = %error,
            "Intent corrupt after failed cleanup"
        );
        Self { data }
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
}

/// The request failed; nothing further happens.
#[derive(Debug)]
pub struct Failed {
    data: IntentData,
}

impl Failed {
    /// Label `data` FAILED and record `reason`.
    #[must_use]
    pub fn new(mut data: IntentData, reason: impl fmt::Display) -> Self {
        data.state = IntentState::Failed;
        data.record_failure(&reason);
        warn!(
            key = %data.key(),
            request = %data.request,
            errors = data.error_count,
            reason = %reason,
            "Intent failed"
        );
        Self { data }
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
}

/// The replaced intent could not be uninstalled; its successor was not
/// installed and the replaced record stays as it is.
#[derive(Debug)]
pub struct ReplaceFailed {
    data: IntentData,
}

impl ReplaceFailed {
    /// Label the successor's `data` FAILED and record `error`.
    #[must_use]
    pub fn new(mut data: IntentData, error: impl fmt::Display) -> Self {
        data.state = IntentState::Failed;
        data.installables.clear();
        data.record_failure(&error);
        warn!(key = %data.key(), error = %error, "Replacement failed");
        Self { data }
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
}

/// The combined withdrawal could not be computed. Devices were not touched,
/// so the record keeps the installables still in place.
#[derive(Debug)]
pub struct WithdrawingFailed {
    data: IntentData,
}

impl WithdrawingFailed {
    /// Label `data` FAILED, keep `installed` on it and record `error`.
    #[must_use]
    pub fn new(
        mut data: IntentData,
        installed: Vec<netintent_core::Intent>,
        error: impl fmt::Display,
    ) -> Self {
        data.state = IntentState::Failed;
        data.installables = installed;
        data.record_failure(&error);
        warn!(key = %data.key(), error = %error, "Withdrawal coordination failed");
        Self { data }
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
}
