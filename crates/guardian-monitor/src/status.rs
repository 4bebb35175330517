//! Vehicle safety status record.
//!
//! The record has exactly one writer (the monitor that owns the
//! [`StatusWriter`]) and any number of readers holding a [`StatusReader`].
//! Every update runs under a single write lock, so readers always see a
//! complete snapshot: the passenger message, trigger time and emergency-stop
//! flag change together or not at all.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use guardian_types::GuardianError;
use serde::{Deserialize, Serialize};

/// Health level reported for a monitored component.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusLevel {
    #[default]
    Unknown,
    Ok,
    Warn,
    Error,
    Fatal,
}

/// Status of one monitored component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ComponentStatus {
    pub status: StatusLevel,
    pub message: String,
}

impl ComponentStatus {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn set(&mut self, status: StatusLevel, message: impl Into<String>) {
        self.status = status;
        self.message = message.into();
    }
}

/// Process-wide safety state read by actuation and UI consumers.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemStatus {
    /// Message shown to passengers while a safety action is active.
    pub passenger_msg: Option<String>,
    /// Time (seconds since the Unix epoch) the safety mode was last asserted.
    pub safety_mode_trigger_time: Option<f64>,
    /// Downstream braking must engage while this is set.
    pub require_emergency_stop: bool,
    /// Monitored components by name.
    pub components: BTreeMap<String, ComponentStatus>,
}

impl SystemStatus {
    /// Reset the safety-action fields.  Components are left untouched.
    pub fn clear_safety_action(&mut self) {
        self.passenger_msg = None;
        self.safety_mode_trigger_time = None;
        self.require_emergency_stop = false;
    }
}

/// Create a status record with `components` registered in `Unknown` state.
///
/// Returns the single writer and a reader that can be cloned freely.
pub fn status_store<I, S>(components: I) -> (StatusWriter, StatusReader)
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let status = SystemStatus {
        components: components
            .into_iter()
            .map(|name| (name.into(), ComponentStatus::default()))
            .collect(),
        ..SystemStatus::default()
    };
    let inner = Arc::new(RwLock::new(status));
    (
        StatusWriter {
            inner: Arc::clone(&inner),
        },
        StatusReader { inner },
    )
}

/// Exclusive write handle.  Deliberately not `Clone`.
#[derive(Debug)]
pub struct StatusWriter {
    inner: Arc<RwLock<SystemStatus>>,
}

impl StatusWriter {
    /// Apply `f` to the record under the write lock.
    pub fn update<F, R>(&self, f: F) -> Result<R, GuardianError>
    where
        F: FnOnce(&mut SystemStatus) -> R,
    {
        let mut guard = self.inner.write().map_err(|_| GuardianError::StatusPoisoned)?;
        Ok(f(&mut guard))
    }

    /// A new read handle onto the same record.
    pub fn reader(&self) -> StatusReader {
        StatusReader {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Shared read-only handle.
#[derive(Debug, Clone)]
pub struct StatusReader {
    inner: Arc<RwLock<SystemStatus>>,
}

impl StatusReader {
    /// A consistent copy of the current record.
    pub fn snapshot(&self) -> Result<SystemStatus, GuardianError> {
        self.inner
            .read()
            .map(|guard| guard.clone())
            .map_err(|_| GuardianError::StatusPoisoned)
    }

    /// Shortcut for `snapshot()?.require_emergency_stop`.
    pub fn emergency_stop_required(&self) -> Result<bool, GuardianError> {
        self.inner
            .read()
            .map(|guard| guard.require_emergency_stop)
            .map_err(|_| GuardianError::StatusPoisoned)
    }
}
