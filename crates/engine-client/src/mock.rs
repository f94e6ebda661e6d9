// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Scriptable in-memory engine for tests.
//!
//! Records every command the controller issues and lets tests stage
//! counter readings and session states.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use chrono::Utc;

use crate::error::Error;
use crate::{BenchmarkLifecycle, BenchmarkStatus, CounterSample, EngineClient, SessionSnapshot};

/// One hardware command observed by the mock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineCommand {
    /// A worker was enabled.
    Enable(u32),
    /// A worker was disabled.
    Disable(u32),
    /// A worker's frequency was set (worker, kHz).
    Frequency(u32, u64),
}

#[derive(Debug, Default)]
struct Inner {
    workers: Vec<u32>,
    counters: HashMap<String, Vec<CounterSample>>,
    sessions: HashMap<String, SessionSnapshot>,
    commands: Vec<EngineCommand>,
    benchmark_activations: Vec<(String, String)>,
    profile_activations: Vec<(String, String)>,
    energy_management_calls: Vec<(bool, bool)>,
    fail_commands: bool,
}

/// In-memory engine double.
#[derive(Debug, Default)]
pub struct MockEngine {
    inner: Mutex<Inner>,
}

impl MockEngine {
    /// An engine with workers `0..worker_count`.
    pub fn with_workers(worker_count: u32) -> Self {
        let engine = Self::default();
        engine.lock().workers = (0..worker_count).collect();
        engine
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("mock engine lock poisoned")
    }

    /// Stages a counter so that its latest value is `value`.
    pub fn stage_counter(&self, counter: &str, value: f64) {
        let sample = CounterSample { at: Utc::now(), value };
        self.lock()
            .counters
            .entry(counter.to_owned())
            .or_default()
            .push(sample);
    }

    /// Removes a counter entirely, simulating an engine without it.
    pub fn drop_counter(&self, counter: &str) {
        let _ = self.lock().counters.remove(counter);
    }

    /// Creates or replaces a session.
    pub fn stage_session(&self, session: &str, snapshot: SessionSnapshot) {
        let _ = self.lock().sessions.insert(session.to_owned(), snapshot);
    }

    /// Sets the state of one benchmark inside an existing session,
    /// creating the session when needed.
    pub fn stage_benchmark(
        &self,
        session: &str,
        benchmark: &str,
        state: BenchmarkLifecycle,
        active: bool,
    ) {
        let mut inner = self.lock();
        let snapshot = inner.sessions.entry(session.to_owned()).or_default();
        let _ = snapshot
            .benchmarks
            .insert(benchmark.to_owned(), BenchmarkStatus { state, active });
    }

    /// Makes every subsequent worker command fail.
    pub fn fail_commands(&self, fail: bool) {
        self.lock().fail_commands = fail;
    }

    /// Drains and returns all recorded worker commands.
    pub fn take_commands(&self) -> Vec<EngineCommand> {
        std::mem::take(&mut self.lock().commands)
    }

    /// All benchmark activations seen so far, as `(session, benchmark)`.
    pub fn benchmark_activations(&self) -> Vec<(String, String)> {
        self.lock().benchmark_activations.clone()
    }

    /// All profile activations seen so far, as `(session, profile)`.
    pub fn profile_activations(&self) -> Vec<(String, String)> {
        self.lock().profile_activations.clone()
    }

    /// All `energy_management` calls seen so far.
    pub fn energy_management_calls(&self) -> Vec<(bool, bool)> {
        self.lock().energy_management_calls.clone()
    }

    fn command(&self, command: EngineCommand) -> Result<(), Error> {
        let mut inner = self.lock();
        if inner.fail_commands {
            return Err(Error::Rejected {
                operation: format!("{command:?}"),
                details: "mock engine is scripted to fail".to_owned(),
            });
        }
        inner.commands.push(command);
        Ok(())
    }
}

impl EngineClient for MockEngine {
    fn worker_ids(&self) -> Result<Vec<u32>, Error> {
        Ok(self.lock().workers.clone())
    }

    fn enable_worker(&self, worker: u32) -> Result<(), Error> {
        self.command(EngineCommand::Enable(worker))
    }

    fn disable_worker(&self, worker: u32) -> Result<(), Error> {
        self.command(EngineCommand::Disable(worker))
    }

    fn set_worker_frequency(&self, worker: u32, freq_khz: u64) -> Result<(), Error> {
        self.command(EngineCommand::Frequency(worker, freq_khz))
    }

    fn counter_names(&self) -> Result<Vec<String>, Error> {
        Ok(self.lock().counters.keys().cloned().collect())
    }

    fn counter_values(&self, counter: &str, _refresh: bool) -> Result<Vec<CounterSample>, Error> {
        self.lock()
            .counters
            .get(counter)
            .cloned()
            .ok_or_else(|| Error::Rejected {
                operation: format!("read counter '{counter}'"),
                details: "no such counter".to_owned(),
            })
    }

    fn session(&self, session: &str) -> Result<SessionSnapshot, Error> {
        self.lock()
            .sessions
            .get(session)
            .cloned()
            .ok_or_else(|| Error::Rejected {
                operation: format!("snapshot session '{session}'"),
                details: "no such session".to_owned(),
            })
    }

    fn refresh_session(&self, session: &str) -> Result<(), Error> {
        let inner = self.lock();
        if inner.sessions.contains_key(session) {
            Ok(())
        } else {
            Err(Error::Rejected {
                operation: format!("refresh session '{session}'"),
                details: "no such session".to_owned(),
            })
        }
    }

    fn activate_benchmark(&self, session: &str, benchmark: &str) -> Result<(), Error> {
        let mut inner = self.lock();
        let known = inner
            .sessions
            .get(session)
            .is_some_and(|s| s.benchmarks.contains_key(benchmark));
        if !known {
            return Err(Error::Rejected {
                operation: format!("activate benchmark '{benchmark}'"),
                details: format!("unknown in session '{session}'"),
            });
        }
        inner
            .benchmark_activations
            .push((session.to_owned(), benchmark.to_owned()));
        Ok(())
    }

    fn activate_profile(&self, session: &str, profile: &str) -> Result<(), Error> {
        let mut inner = self.lock();
        let known = inner
            .sessions
            .get(session)
            .is_some_and(|s| s.profiles.iter().any(|p| p == profile));
        if !known {
            return Err(Error::Rejected {
                operation: format!("activate profile '{profile}'"),
                details: format!("unknown in session '{session}'"),
            });
        }
        inner
            .profile_activations
            .push((session.to_owned(), profile.to_owned()));
        Ok(())
    }

    fn energy_management(&self, loop_enabled: bool, adapt_enabled: bool) -> Result<(), Error> {
        self.lock()
            .energy_management_calls
            .push((loop_enabled, adapt_enabled));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn records_commands_in_order() {
        let engine = MockEngine::with_workers(4);
        engine.set_worker_frequency(0, 1_200_000).unwrap();
        engine.enable_worker(0).unwrap();
        engine.disable_worker(3).unwrap();
        assert_eq!(
            engine.take_commands(),
            vec![
                EngineCommand::Frequency(0, 1_200_000),
                EngineCommand::Enable(0),
                EngineCommand::Disable(3),
            ]
        );
        assert!(engine.take_commands().is_empty());
    }

    #[test]
    fn scripted_failures_reject_commands() {
        let engine = MockEngine::with_workers(2);
        engine.fail_commands(true);
        assert!(engine.enable_worker(0).is_err());
        assert!(engine.take_commands().is_empty());
    }

    #[test]
    fn activation_requires_a_known_benchmark() {
        let engine = MockEngine::with_workers(1);
        engine.stage_benchmark("default", "linpack", BenchmarkLifecycle::Ready, false);
        assert!(engine.activate_benchmark("default", "linpack").is_ok());
        assert!(engine.activate_benchmark("default", "no-such").is_err());
        assert_eq!(
            engine.benchmark_activations(),
            vec![("default".to_owned(), "linpack".to_owned())]
        );
    }
}
