// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Client contract for the managed task-processing engine.
//!
//! The controller treats the engine as an opaque service: workers can be
//! enabled, disabled, and clocked; task counters can be sampled; sessions
//! expose their benchmarks and profiles. [`EngineClient`] is the one seam
//! between the control loop and the wire; the production implementation is
//! [`http::HttpEngineClient`], and a scriptable [`mock::MockEngine`] backs
//! the test suites (enable the `testing` feature outside of this crate).

pub mod error;
pub mod http;
#[cfg(any(test, feature = "testing"))]
pub mod mock;

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;

pub use error::Error;

/// Well-known task counter names exported by the engine.
pub mod counters {
    /// Tasks handed to the engine per second.
    pub const TASKS_STARTED: &str = "Tasks.Started";
    /// Tasks currently being processed per second.
    pub const TASKS_ACTIVE: &str = "Tasks.Active";
    /// Tasks completed per second.
    pub const TASKS_FINISHED: &str = "Tasks.Finished";
    /// Average task latency.
    pub const TASKS_AVG_LATENCY: &str = "Tasks.AvgLatency";
}

/// Lifecycle of a benchmark inside an engine session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BenchmarkLifecycle {
    /// Input data is being staged.
    Loading,
    /// The benchmark is processing tasks.
    Running,
    /// Staged and waiting to be started.
    Ready,
    /// Completed.
    Finished,
    /// Aborted by the engine.
    Failed,
    /// Any state this client version does not know.
    #[serde(other)]
    Unknown,
}

/// State of one benchmark inside a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct BenchmarkStatus {
    /// Current lifecycle state.
    pub state: BenchmarkLifecycle,
    /// Whether the benchmark is the session's active one.
    pub active: bool,
}

/// Point-in-time view of one engine session.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    /// All benchmarks of the session and their states.
    pub benchmarks: BTreeMap<String, BenchmarkStatus>,
    /// Profile names selectable for the session.
    pub profiles: Vec<String>,
}

impl SessionSnapshot {
    /// Whether any benchmark is currently loading.
    pub fn any_loading(&self) -> bool {
        self.benchmarks
            .values()
            .any(|b| b.state == BenchmarkLifecycle::Loading)
    }

    /// Names of all currently running benchmarks.
    pub fn running(&self) -> Vec<&str> {
        self.benchmarks
            .iter()
            .filter(|(_, b)| b.state == BenchmarkLifecycle::Running)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

/// One timestamped counter reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CounterSample {
    /// When the engine recorded the value.
    pub at: DateTime<Utc>,
    /// The counter value.
    pub value: f64,
}

/// The engine seen from the controller.
///
/// All calls are synchronous; they run inline on the control thread and
/// inherit the transport's default timeout. Implementations must be safe to
/// share between the control thread and the HTTP surface.
pub trait EngineClient: Send + Sync {
    /// Local IDs of all engine workers.
    fn worker_ids(&self) -> Result<Vec<u32>, Error>;

    /// Enables one worker.
    fn enable_worker(&self, worker: u32) -> Result<(), Error>;

    /// Disables one worker.
    fn disable_worker(&self, worker: u32) -> Result<(), Error>;

    /// Sets one worker's core frequency in kHz.
    fn set_worker_frequency(&self, worker: u32, freq_khz: u64) -> Result<(), Error>;

    /// Distinguished names of all exported counters.
    fn counter_names(&self) -> Result<Vec<String>, Error>;

    /// Ordered readings of one counter; `refresh` forces the engine to
    /// sample before answering.
    fn counter_values(&self, counter: &str, refresh: bool) -> Result<Vec<CounterSample>, Error>;

    /// Snapshot of one session's benchmarks and profiles.
    fn session(&self, session: &str) -> Result<SessionSnapshot, Error>;

    /// Forces the engine to refresh the session's state.
    fn refresh_session(&self, session: &str) -> Result<(), Error>;

    /// Makes `benchmark` the session's active benchmark.
    fn activate_benchmark(&self, session: &str, benchmark: &str) -> Result<(), Error>;

    /// Switches the session to `profile`.
    fn activate_profile(&self, session: &str, profile: &str) -> Result<(), Error>;

    /// Configures the engine's built-in energy management. The controller
    /// calls this with `(false, false)` at startup so that exactly one
    /// party issues hardware commands.
    fn energy_management(&self, loop_enabled: bool, adapt_enabled: bool) -> Result<(), Error>;
}

/// Latest value of a counter, if the engine has recorded any.
pub fn latest_value(samples: &[CounterSample]) -> Option<f64> {
    samples.last().map(|s| s.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lifecycle_parses_known_and_unknown_states() {
        let parsed: BenchmarkLifecycle = serde_json::from_str(r#""running""#).unwrap();
        assert_eq!(parsed, BenchmarkLifecycle::Running);
        let parsed: BenchmarkLifecycle = serde_json::from_str(r#""defrosting""#).unwrap();
        assert_eq!(parsed, BenchmarkLifecycle::Unknown);
    }

    #[test]
    fn snapshot_predicates() {
        let mut snapshot = SessionSnapshot::default();
        let _ = snapshot.benchmarks.insert(
            "a".to_owned(),
            BenchmarkStatus { state: BenchmarkLifecycle::Running, active: true },
        );
        let _ = snapshot.benchmarks.insert(
            "b".to_owned(),
            BenchmarkStatus { state: BenchmarkLifecycle::Loading, active: false },
        );
        assert!(snapshot.any_loading());
        assert_eq!(snapshot.running(), vec!["a"]);
    }

    #[test]
    fn latest_value_takes_the_newest_sample() {
        use chrono::TimeZone as _;
        let at = |s| Utc.timestamp_opt(s, 0).single().unwrap();
        let samples = vec![
            CounterSample { at: at(1), value: 10.0 },
            CounterSample { at: at(2), value: 20.0 },
        ];
        assert_eq!(latest_value(&samples), Some(20.0));
        assert_eq!(latest_value(&[]), None);
    }
}
