// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! The energy-utility feedback control loop.
//!
//! One controller per process drives one engine. Every second the loop
//! snapshots the engine's benchmark states, decides which candidate set
//! applies (the per-benchmark Pareto frontier while a benchmark runs,
//! synthetic records otherwise), selects an operating point, and pushes
//! worker enable/disable and frequency commands when the selection differs
//! from what is already committed. Between reselections it watches the
//! offered task rate and adapts along the frontier when the active
//! configuration misses it by more than the tolerance.
//!
//! The loop is best-effort and self-healing: every recoverable failure is
//! absorbed at the tick boundary and retried on the next one. Only startup
//! wiring errors ever propagate out of this crate.

pub mod error;
pub mod select;
pub mod thread_task;
pub mod watcher;

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use euf_engine_client::{EngineClient, SessionSnapshot, counters, latest_value};
use euf_model::{Configuration, ConfigurationCache, TuningAxes};
use euf_state::{ControllerHandle, ControllerState};
use euf_telemetry::{ActiveEstimates, TelemetryPuller};

pub use error::Error;
pub use select::select;
pub use thread_task::{AdminServerHandle, spawn_admin_server};
pub use watcher::{BenchmarkStateWatcher, StateEdges};

/// Relative deviation of offered load from the active configuration's
/// modelled throughput that triggers an adaptation.
const ADAPT_TOLERANCE: f64 = 0.05;

/// The tick-driven feedback controller.
pub struct Controller {
    engine: Arc<dyn EngineClient>,
    handle: ControllerHandle,
    cache: ConfigurationCache,
    watcher: BenchmarkStateWatcher,
    puller: TelemetryPuller,
    synth_max: Configuration,
    synth_idle: Configuration,
    max_physical_cores: u32,
    tick_interval: Duration,
}

impl Controller {
    /// Wires a controller against an engine and a pre-built configuration
    /// cache.
    pub fn new(
        engine: Arc<dyn EngineClient>,
        handle: ControllerHandle,
        cache: ConfigurationCache,
        axes: &TuningAxes,
        puller: TelemetryPuller,
        tick_interval: Duration,
    ) -> Self {
        Self {
            engine,
            handle,
            cache,
            watcher: BenchmarkStateWatcher::new(),
            puller,
            synth_max: Configuration::synthetic_max(axes),
            synth_idle: Configuration::synthetic_idle(axes),
            max_physical_cores: axes.max_cores(),
            tick_interval,
        }
    }

    /// Runs the control loop until `shutdown` fires or its sender drops.
    ///
    /// The receiver doubles as the interruptible tick sleep, so a shutdown
    /// request ends the loop without waiting out the current interval.
    pub fn run(mut self, shutdown: &Receiver<()>) {
        info!(tick_s = self.tick_interval.as_secs_f64(), "control loop started");
        loop {
            self.tick(Utc::now());
            match shutdown.recv_timeout(self.tick_interval) {
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                Err(RecvTimeoutError::Timeout) => {}
            }
        }
        info!("control loop stopped");
    }

    /// One tick: state refresh, reselection, adaptation check, telemetry
    /// pull. Runs with the controller state locked throughout so that the
    /// HTTP surface only ever observes tick boundaries.
    fn tick(&mut self, now: DateTime<Utc>) {
        let snapshot = match self.engine.session(self.handle.session()) {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(error = %e, "benchmark states unavailable, skipping tick");
                return;
            }
        };
        let edges = self.watcher.observe(snapshot);

        let handle = self.handle.clone();
        let mut state = handle.lock();
        state.last_state = Some(edges.snapshot.clone());

        if edges.changed || state.pending_update {
            let (current, all) =
                self.candidate_sets(state.enabled, &edges.snapshot, state.active_config.as_ref());
            state.current_candidates = current;
            state.all_candidates = all;
            if let Some(best) = select(&state.current_candidates, None, None) {
                self.commit(&mut state, best);
            }
            state.pending_update = false;
        }

        self.adapt(&mut state);

        let estimates = state.active_config.as_ref().map(|c| ActiveEstimates {
            tps: c.tps,
            power_w: c.power_w,
        });
        self.puller.maybe_pull(now, self.engine.as_ref(), estimates);
    }

    /// The mode table: which candidates are selectable right now, and
    /// which make up the visualisation set.
    fn candidate_sets(
        &self,
        enabled: bool,
        snapshot: &SessionSnapshot,
        active: Option<&Configuration>,
    ) -> (Vec<Configuration>, Vec<Configuration>) {
        if !enabled {
            let synth = vec![self.synth_max.clone()];
            return (synth.clone(), synth);
        }
        if snapshot.any_loading() {
            let synth = vec![self.synth_max.clone()];
            return (synth.clone(), synth);
        }

        match snapshot.running().as_slice() {
            [] => {
                let mut idle = vec![self.synth_idle.clone()];
                if let Some(active) = active {
                    if *active != self.synth_idle {
                        idle.push(active.clone());
                    }
                }
                (idle.clone(), idle)
            }
            [benchmark] => match self.cache.get(benchmark) {
                Some(entry) => (entry.pareto.clone(), entry.all.clone()),
                None => {
                    warn!(benchmark, "no generated configuration space, forcing maximum");
                    let synth = vec![self.synth_max.clone()];
                    (synth.clone(), synth)
                }
            },
            running => {
                // The per-benchmark model cannot describe a blended
                // workload.
                warn!(count = running.len(), "multiple benchmarks running, forcing maximum");
                let synth = vec![self.synth_max.clone()];
                (synth.clone(), synth)
            }
        }
    }

    /// Reselects along the current candidates when the offered task rate
    /// deviates too far from the active configuration's throughput.
    fn adapt(&self, state: &mut ControllerState) {
        let Some(active) = state.active_config.clone() else {
            return;
        };
        if state.current_candidates.len() <= 1 {
            return;
        }
        let Some(needed) = self.offered_load() else {
            return;
        };
        if (needed - active.tps).abs() <= ADAPT_TOLERANCE * needed {
            return;
        }

        debug!(needed, modelled = active.tps, "offered load diverged, adapting");
        if let Some(best) = select(&state.current_candidates, Some(needed), Some(&active)) {
            self.commit(state, best);
        }
    }

    /// The task rate the engine currently has to sustain: the larger of
    /// the started and active counters' latest readings.
    fn offered_load(&self) -> Option<f64> {
        let started = self.latest_counter(counters::TASKS_STARTED);
        let active = self.latest_counter(counters::TASKS_ACTIVE);
        match (started, active) {
            (None, None) => None,
            (a, b) => Some(a.unwrap_or(0.0).max(b.unwrap_or(0.0))),
        }
    }

    fn latest_counter(&self, counter: &str) -> Option<f64> {
        self.engine
            .counter_values(counter, true)
            .ok()
            .and_then(|values| latest_value(&values))
    }

    /// Commits a selection to the engine.
    ///
    /// Committing the already-active triple issues no engine commands. A
    /// failed push leaves the active configuration untouched and raises
    /// `pending_update` so the next tick reselects and retries.
    fn commit(&self, state: &mut ControllerState, new: Configuration) {
        if state.active_config.as_ref() == Some(&new) {
            state.active_config = Some(new);
            return;
        }

        match self.push_configuration(&new) {
            Ok(()) => {
                info!(
                    freq_khz = new.freq_khz,
                    cores = new.cores,
                    ht = new.ht,
                    "configuration committed"
                );
                state.active_config = Some(new);
            }
            Err(e) => {
                warn!(error = %e, "configuration commit failed, retrying next tick");
                state.pending_update = true;
            }
        }
    }

    fn push_configuration(&self, new: &Configuration) -> Result<(), euf_engine_client::Error> {
        let enabled = enabled_worker_ids(new.cores, new.ht, self.max_physical_cores);
        for worker in self.engine.worker_ids()? {
            self.engine.set_worker_frequency(worker, new.freq_khz)?;
            if enabled.contains(&worker) {
                self.engine.enable_worker(worker)?;
            } else {
                self.engine.disable_worker(worker)?;
            }
        }
        Ok(())
    }
}

/// Worker IDs that stay enabled for a configuration: the first `cores`
/// physical cores, plus their SMT siblings when hyperthreading is on.
/// Sibling IDs follow the engine's layout of physical cores first, then
/// their siblings in the same order.
pub fn enabled_worker_ids(cores: u32, ht: bool, max_physical_cores: u32) -> BTreeSet<u32> {
    let mut ids: BTreeSet<u32> = (0..cores).collect();
    if ht {
        ids.extend((0..cores).map(|core| core + max_physical_cores));
    }
    ids
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use euf_engine_client::mock::{EngineCommand, MockEngine};
    use euf_engine_client::{BenchmarkLifecycle, SessionSnapshot};
    use euf_model::hardware::HardwareModel;
    use euf_model::workload::{CpuTopology, WorkloadDescriptor, WorkloadModel};

    const SESSION: &str = "default";
    const BENCH: &str = "b";

    /// Aggregate IPC equal to the logical CPU count; all power linear in
    /// cpus and frequency. Keeps the scenario arithmetic obvious.
    struct StubHardware {
        axes: TuningAxes,
    }

    impl HardwareModel for StubHardware {
        fn axes(&self) -> &TuningAxes {
            &self.axes
        }
        fn ipc(&self, _d: &WorkloadDescriptor, cpus: u32, _f: u64, _ht: bool) -> f64 {
            f64::from(cpus)
        }
        fn package_power(&self, _d: &WorkloadDescriptor, cpus: u32, freq_khz: u64, _ht: bool) -> f64 {
            f64::from(cpus) * 0.5 * (freq_khz as f64 / 2_400_000.0)
        }
        fn core_power(&self, d: &WorkloadDescriptor, cpus: u32, freq_khz: u64, ht: bool) -> f64 {
            self.package_power(d, cpus, freq_khz, ht)
        }
        fn dram_power(&self, _d: &WorkloadDescriptor, _c: u32, _f: u64, _ht: bool) -> f64 {
            1.0
        }
    }

    struct StubWorkload;

    impl WorkloadModel for StubWorkload {
        fn descriptor(
            &self,
            benchmark: &str,
            _topology: &CpuTopology,
        ) -> Result<WorkloadDescriptor, euf_model::Error> {
            if benchmark != BENCH {
                return Err(euf_model::Error::UnknownBenchmark {
                    name: benchmark.to_owned(),
                });
            }
            Ok(WorkloadDescriptor {
                memory_heaviness: 0.0,
                nomemory_heaviness: 1.0,
                avx_heaviness: 0.0,
                branch_heaviness: 0.0,
                compute_heaviness: 1.0,
                cache_heaviness: 0.0,
                ipt: 10_000.0,
            })
        }
        fn benchmark_names(&self) -> Vec<String> {
            vec![BENCH.to_owned()]
        }
    }

    fn axes() -> TuningAxes {
        TuningAxes::new(vec![1_200_000, 2_400_000], vec![2, 4], vec![false, true]).unwrap()
    }

    struct Rig {
        mock: Arc<MockEngine>,
        handle: ControllerHandle,
        controller: Controller,
    }

    fn rig() -> Rig {
        let mock = Arc::new(MockEngine::with_workers(8));
        mock.stage_session(SESSION, SessionSnapshot::default());
        mock.stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Ready, false);

        let axes = axes();
        let hardware = StubHardware { axes: axes.clone() };
        let cache = ConfigurationCache::build(&hardware, &StubWorkload, [BENCH]);

        let handle = ControllerHandle::new(SESSION, axes.min_freq_khz(), axes.max_freq_khz());
        let puller = TelemetryPuller::new(
            Duration::from_secs(1),
            Duration::from_secs(300),
            None,
        );
        let controller = Controller::new(
            mock.clone(),
            handle.clone(),
            cache,
            &axes,
            puller,
            Duration::from_secs(1),
        );
        Rig { mock, handle, controller }
    }

    fn now(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn active_triple(handle: &ControllerHandle) -> (u64, u32, bool) {
        let state = handle.lock();
        let active = state.active_config.as_ref().expect("no active config");
        (active.freq_khz, active.cores, active.ht)
    }

    #[test]
    fn first_tick_commits_the_idle_configuration() {
        let mut rig = rig();
        rig.controller.tick(now(0));

        // SYNTH_IDLE: lowest frequency, fewest cores, no HT.
        assert_eq!(active_triple(&rig.handle), (1_200_000, 2, false));

        let commands = rig.mock.take_commands();
        let enables: Vec<u32> = commands
            .iter()
            .filter_map(|c| match c {
                EngineCommand::Enable(w) => Some(*w),
                _ => None,
            })
            .collect();
        let disables: Vec<u32> = commands
            .iter()
            .filter_map(|c| match c {
                EngineCommand::Disable(w) => Some(*w),
                _ => None,
            })
            .collect();
        assert_eq!(enables, vec![0, 1]);
        assert_eq!(disables, vec![2, 3, 4, 5, 6, 7]);
        assert!(
            commands
                .iter()
                .filter(|c| matches!(c, EngineCommand::Frequency(_, 1_200_000)))
                .count()
                == 8
        );
    }

    #[test]
    fn disabling_the_loop_commits_maximum_performance() {
        let mut rig = rig();
        rig.controller.tick(now(0));
        let _ = rig.mock.take_commands();

        rig.handle.set_enabled(false);
        rig.controller.tick(now(1));

        assert_eq!(active_triple(&rig.handle), (2_400_000, 4, true));
        let commands = rig.mock.take_commands();
        assert!(!commands.iter().any(|c| matches!(c, EngineCommand::Disable(_))));
        assert_eq!(
            commands
                .iter()
                .filter(|c| matches!(c, EngineCommand::Enable(_)))
                .count(),
            8
        );
    }

    #[test]
    fn disabled_mode_wins_over_a_running_benchmark() {
        let mut rig = rig();
        rig.handle.set_enabled(false);
        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Running, true);
        rig.controller.tick(now(0));

        assert_eq!(active_triple(&rig.handle), (2_400_000, 4, true));
        assert_eq!(rig.handle.lock().current_candidates.len(), 1);
    }

    #[test]
    fn running_benchmark_selects_the_cheapest_frontier_point() {
        let mut rig = rig();
        rig.controller.tick(now(0));
        let _ = rig.mock.take_commands();

        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Running, true);
        rig.controller.tick(now(1));

        // Cheapest frontier point of the stub space: 2 cores, no HT, low
        // clock (power 1.5, 240k tasks/s).
        assert_eq!(active_triple(&rig.handle), (1_200_000, 2, false));

        let state = rig.handle.lock();
        assert!(state.current_candidates.len() > 1);
        assert_eq!(state.all_candidates.len(), 8);
    }

    #[test]
    fn adaptation_climbs_when_offered_load_exceeds_the_model() {
        let mut rig = rig();
        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Running, true);
        rig.controller.tick(now(0));
        assert_eq!(active_triple(&rig.handle), (1_200_000, 2, false));
        let _ = rig.mock.take_commands();

        // 500k offered against 240k modelled: reselect with the target.
        rig.mock.stage_counter(counters::TASKS_STARTED, 500_000.0);
        rig.mock.stage_counter(counters::TASKS_ACTIVE, 100_000.0);
        rig.controller.tick(now(1));

        let state = rig.handle.lock();
        let active = state.active_config.clone().unwrap();
        assert!(active.tps >= 500_000.0);
        // Cheapest sustaining point: 4 cores with HT at the low clock
        // (960k tasks/s at 3 W rather than the 5 W full-speed point).
        assert_eq!((active.freq_khz, active.cores, active.ht), (1_200_000, 4, true));
    }

    #[test]
    fn adaptation_tolerates_small_deviations() {
        let mut rig = rig();
        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Running, true);
        rig.controller.tick(now(0));
        let _ = rig.mock.take_commands();

        // 4% off the modelled 240k: inside the tolerance band.
        rig.mock.stage_counter(counters::TASKS_STARTED, 249_000.0);
        rig.controller.tick(now(1));

        assert_eq!(active_triple(&rig.handle), (1_200_000, 2, false));
        assert!(rig.mock.take_commands().is_empty());
    }

    #[test]
    fn loading_benchmark_forces_maximum_within_one_tick() {
        let mut rig = rig();
        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Running, true);
        rig.controller.tick(now(0));

        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Loading, true);
        rig.controller.tick(now(1));

        assert_eq!(active_triple(&rig.handle), (2_400_000, 4, true));
        let state = rig.handle.lock();
        assert_eq!(state.current_candidates.len(), 1);
    }

    #[test]
    fn recommitting_the_same_triple_issues_no_commands() {
        let mut rig = rig();
        rig.controller.tick(now(0));
        assert!(!rig.mock.take_commands().is_empty());

        // Nothing changed, but force a reselection anyway.
        rig.handle.request_reselect();
        rig.controller.tick(now(1));

        assert!(rig.mock.take_commands().is_empty());
        assert_eq!(active_triple(&rig.handle), (1_200_000, 2, false));
    }

    #[test]
    fn failed_commit_is_retried_on_the_next_tick() {
        let mut rig = rig();
        rig.mock.fail_commands(true);
        rig.controller.tick(now(0));

        {
            let state = rig.handle.lock();
            assert!(state.active_config.is_none());
            assert!(state.pending_update);
        }

        rig.mock.fail_commands(false);
        rig.controller.tick(now(1));
        assert_eq!(active_triple(&rig.handle), (1_200_000, 2, false));
    }

    #[test]
    fn engine_outage_skips_the_tick_entirely() {
        let mut rig = rig();
        rig.controller.tick(now(0));
        let committed = active_triple(&rig.handle);

        // Replace the session with nothing: session reads now fail.
        let broken = MockEngine::with_workers(8);
        rig.controller.engine = Arc::new(broken);
        rig.controller.tick(now(1));

        assert_eq!(active_triple(&rig.handle), committed);
    }

    #[test]
    fn finished_benchmark_returns_to_idle_keeping_the_old_point() {
        let mut rig = rig();
        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Running, true);
        rig.controller.tick(now(0));

        // Adapt away from the idle triple first so the old point stays
        // distinct.
        rig.mock.stage_counter(counters::TASKS_STARTED, 500_000.0);
        rig.controller.tick(now(1));
        assert_eq!(active_triple(&rig.handle), (1_200_000, 4, true));

        rig.mock.drop_counter(counters::TASKS_STARTED);
        rig.mock
            .stage_benchmark(SESSION, BENCH, BenchmarkLifecycle::Finished, false);
        rig.controller.tick(now(2));

        let state = rig.handle.lock();
        // Idle candidate plus the previously active point, with the
        // cheaper idle one committed.
        assert_eq!(state.current_candidates.len(), 2);
        let active = state.active_config.clone().unwrap();
        assert_eq!((active.freq_khz, active.cores, active.ht), (1_200_000, 2, false));
    }

    #[test]
    fn worker_plan_covers_smt_siblings() {
        assert_eq!(enabled_worker_ids(2, false, 4), BTreeSet::from([0, 1]));
        assert_eq!(enabled_worker_ids(2, true, 4), BTreeSet::from([0, 1, 4, 5]));
        assert_eq!(
            enabled_worker_ids(4, true, 4),
            BTreeSet::from([0, 1, 2, 3, 4, 5, 6, 7])
        );
    }
}
