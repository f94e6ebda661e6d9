// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Shared state between the control thread and the HTTP surface.
//!
//! There is exactly one controller per process, so its state is a single
//! record behind a single mutex. The control thread holds the lock for the
//! full body of a tick; HTTP handlers hold it for the duration of one
//! mutation or one snapshot read. Nothing else synchronises the two sides,
//! which is what makes the "a write completed before a tick begins is seen
//! by that tick" guarantee hold.

use std::sync::{Arc, Mutex, MutexGuard};

use euf_engine_client::SessionSnapshot;
use euf_model::Configuration;

/// The controller's mutable state.
#[derive(Debug, Default)]
pub struct ControllerState {
    /// Desired mode: `false` forces the synthetic maximum configuration.
    pub enabled: bool,
    /// Raised by the HTTP surface, consumed at the next tick boundary.
    pub pending_update: bool,
    /// The configuration most recently committed to the engine.
    pub active_config: Option<Configuration>,
    /// The candidate set the selector currently chooses from.
    pub current_candidates: Vec<Configuration>,
    /// The unreduced candidate set, kept for visualisation.
    pub all_candidates: Vec<Configuration>,
    /// The most recent benchmark state snapshot.
    pub last_state: Option<SessionSnapshot>,
}

/// Immutable facts the HTTP surface needs alongside the state.
#[derive(Debug, Clone)]
struct SharedInfo {
    session: String,
    min_freq_khz: u64,
    max_freq_khz: u64,
}

/// Coherent point-in-time view of the controller, taken under the lock.
#[derive(Debug, Clone)]
pub struct ControllerStatus {
    /// Desired mode.
    pub enabled: bool,
    /// The configuration most recently committed to the engine.
    pub active_config: Option<Configuration>,
    /// The candidate set the selector currently chooses from.
    pub current_candidates: Vec<Configuration>,
    /// The unreduced candidate set.
    pub all_candidates: Vec<Configuration>,
    /// Name of the managed engine session.
    pub session: String,
    /// Lowest frequency of the tuning axes, kHz.
    pub min_freq_khz: u64,
    /// Highest frequency of the tuning axes, kHz.
    pub max_freq_khz: u64,
}

/// Cloneable handle to the one controller state of this process.
///
/// Handed to the HTTP surface by dependency injection; there is no
/// process-level singleton.
#[derive(Debug, Clone)]
pub struct ControllerHandle {
    info: SharedInfo,
    state: Arc<Mutex<ControllerState>>,
}

impl ControllerHandle {
    /// A fresh handle; the controller starts enabled with nothing
    /// committed.
    pub fn new(session: impl Into<String>, min_freq_khz: u64, max_freq_khz: u64) -> Self {
        Self {
            info: SharedInfo {
                session: session.into(),
                min_freq_khz,
                max_freq_khz,
            },
            state: Arc::new(Mutex::new(ControllerState {
                enabled: true,
                ..ControllerState::default()
            })),
        }
    }

    /// Locks the state for a full tick body or a short mutation.
    pub fn lock(&self) -> MutexGuard<'_, ControllerState> {
        self.state.lock().expect("controller state lock poisoned")
    }

    /// Sets the desired mode and schedules a reselection.
    pub fn set_enabled(&self, enabled: bool) {
        let mut state = self.lock();
        state.enabled = enabled;
        state.pending_update = true;
    }

    /// Schedules a reselection without changing the mode.
    pub fn request_reselect(&self) {
        self.lock().pending_update = true;
    }

    /// Name of the managed engine session.
    pub fn session(&self) -> &str {
        &self.info.session
    }

    /// Takes a coherent snapshot for the HTTP surface.
    pub fn status(&self) -> ControllerStatus {
        let state = self.lock();
        ControllerStatus {
            enabled: state.enabled,
            active_config: state.active_config.clone(),
            current_candidates: state.current_candidates.clone(),
            all_candidates: state.all_candidates.clone(),
            session: self.info.session.clone(),
            min_freq_khz: self.info.min_freq_khz,
            max_freq_khz: self.info.max_freq_khz,
        }
    }
}
