// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Cadence-driven telemetry collection.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use tracing::debug;

use euf_engine_client::{EngineClient, counters, latest_value};

use crate::rapl::{DRAM, PACKAGE_0, RaplReader, RaplSnapshot};
use crate::series::{SampleSeries, TelemetrySample};

/// The model's predictions for the currently committed configuration.
#[derive(Debug, Clone, Copy, Default)]
pub struct ActiveEstimates {
    /// Predicted tasks per second.
    pub tps: f64,
    /// Predicted package + DRAM watts.
    pub power_w: f64,
}

/// Pulls engine and RAPL counters on a fixed cadence and feeds the two
/// sample series.
///
/// All failures are absorbed: a counter that cannot be read simply
/// produces no sample, a machine without RAPL produces zero-valued power
/// readings.
pub struct TelemetryPuller {
    refresh_interval: TimeDelta,
    last_pull: Option<DateTime<Utc>>,
    rapl: Option<RaplReader>,
    last_rapl: Option<RaplSnapshot>,
    power: SampleSeries,
    throughput: SampleSeries,
}

impl TelemetryPuller {
    /// A puller sampling every `refresh_interval`, retaining
    /// `history_window` of samples.
    pub fn new(refresh_interval: Duration, history_window: Duration, rapl: Option<RaplReader>) -> Self {
        Self {
            refresh_interval: TimeDelta::from_std(refresh_interval).unwrap_or(TimeDelta::MAX),
            last_pull: None,
            rapl,
            last_rapl: None,
            power: SampleSeries::new(history_window),
            throughput: SampleSeries::new(history_window),
        }
    }

    /// The power series (actual RAPL watts vs modelled watts).
    pub fn power(&self) -> &SampleSeries {
        &self.power
    }

    /// The throughput series (finished tasks vs modelled tasks/second).
    pub fn throughput(&self) -> &SampleSeries {
        &self.throughput
    }

    /// Pulls both series if the cadence says it is due; a no-op otherwise.
    pub fn maybe_pull(
        &mut self,
        now: DateTime<Utc>,
        engine: &dyn EngineClient,
        estimates: Option<ActiveEstimates>,
    ) {
        if self
            .last_pull
            .is_some_and(|last| now - last < self.refresh_interval)
        {
            return;
        }
        self.last_pull = Some(now);
        let estimates = estimates.unwrap_or_default();

        self.pull_throughput(now, engine, estimates.tps);
        self.pull_power(now, estimates.power_w);
    }

    fn pull_throughput(&mut self, now: DateTime<Utc>, engine: &dyn EngineClient, estimated: f64) {
        match engine.counter_values(counters::TASKS_FINISHED, true) {
            Ok(values) => {
                if let Some(actual) = latest_value(&values) {
                    self.throughput
                        .push(TelemetrySample { at: now, actual, estimated });
                }
            }
            Err(e) => {
                // Missing counters are an expected engine condition.
                debug!(error = %e, "throughput counter unavailable");
            }
        }
    }

    fn pull_power(&mut self, now: DateTime<Utc>, estimated: f64) {
        let Some(reader) = &self.rapl else {
            self.power
                .push(TelemetrySample { at: now, actual: 0.0, estimated });
            return;
        };

        match reader.snapshot() {
            Ok(snapshot) => {
                if let Some(previous) = &self.last_rapl {
                    let delta = snapshot.delta_since(previous);
                    let actual = delta.watts(PACKAGE_0) + delta.watts(DRAM);
                    self.power
                        .push(TelemetrySample { at: delta.at, actual, estimated });
                }
                self.last_rapl = Some(snapshot);
            }
            Err(e) => {
                debug!(error = %e, "RAPL read failed");
                self.power
                    .push(TelemetrySample { at: now, actual: 0.0, estimated });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone as _;
    use euf_engine_client::mock::MockEngine;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).single().unwrap()
    }

    fn puller() -> TelemetryPuller {
        TelemetryPuller::new(Duration::from_secs(1), Duration::from_secs(300), None)
    }

    #[test]
    fn respects_the_refresh_cadence() {
        let engine = MockEngine::with_workers(1);
        engine.stage_counter(counters::TASKS_FINISHED, 100.0);

        let mut puller = puller();
        puller.maybe_pull(at(0), &engine, None);
        puller.maybe_pull(at(0), &engine, None);
        assert_eq!(puller.throughput().len(), 1);

        puller.maybe_pull(at(1), &engine, None);
        assert_eq!(puller.throughput().len(), 2);
    }

    #[test]
    fn pairs_actual_with_estimate() {
        let engine = MockEngine::with_workers(1);
        engine.stage_counter(counters::TASKS_FINISHED, 120_000.0);

        let mut puller = puller();
        let estimates = ActiveEstimates { tps: 118_000.0, power_w: 14.0 };
        puller.maybe_pull(at(0), &engine, Some(estimates));

        let sample = puller.throughput().latest().unwrap();
        assert_eq!(sample.actual, 120_000.0);
        assert_eq!(sample.estimated, 118_000.0);
    }

    #[test]
    fn missing_counter_skips_the_sample() {
        let engine = MockEngine::with_workers(1);

        let mut puller = puller();
        puller.maybe_pull(at(0), &engine, None);
        assert!(puller.throughput().is_empty());
    }

    #[test]
    fn no_rapl_appends_zero_power() {
        let engine = MockEngine::with_workers(1);
        engine.stage_counter(counters::TASKS_FINISHED, 1.0);

        let mut puller = puller();
        let estimates = ActiveEstimates { tps: 1.0, power_w: 9.5 };
        puller.maybe_pull(at(0), &engine, Some(estimates));

        let sample = puller.power().latest().unwrap();
        assert_eq!(sample.actual, 0.0);
        assert_eq!(sample.estimated, 9.5);
    }
}
