// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Edge detection over the engine's benchmark states.

use euf_engine_client::SessionSnapshot;

/// Result of one observation: the snapshot itself and whether anything
/// changed since the previous one.
#[derive(Debug, Clone)]
pub struct StateEdges {
    /// True when this snapshot differs from the previous observation. The
    /// first observation after startup is always a change.
    pub changed: bool,
    /// The observed session state.
    pub snapshot: SessionSnapshot,
}

/// Remembers the previously observed session state and reports edges.
#[derive(Debug, Default)]
pub struct BenchmarkStateWatcher {
    previous: Option<SessionSnapshot>,
}

impl BenchmarkStateWatcher {
    /// A watcher that has seen nothing yet.
    pub fn new() -> Self {
        Self::default()
    }

    /// Compares `snapshot` against the previous observation and remembers
    /// it.
    pub fn observe(&mut self, snapshot: SessionSnapshot) -> StateEdges {
        let changed = self.previous.as_ref() != Some(&snapshot);
        self.previous = Some(snapshot.clone());
        StateEdges { changed, snapshot }
    }
}
