// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Bounded actual-vs-estimated sample series.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// One telemetry reading paired with the model's estimate at that time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// When the reading was taken.
    pub at: DateTime<Utc>,
    /// The measured value.
    pub actual: f64,
    /// The model's prediction for the active configuration.
    pub estimated: f64,
}

/// An ordered series of samples bounded by a history window.
///
/// Samples older than the window are evicted on push; reads additionally
/// filter by age so that an idle series never serves stale entries.
#[derive(Debug)]
pub struct SampleSeries {
    window: TimeDelta,
    samples: VecDeque<TelemetrySample>,
}

impl SampleSeries {
    /// A series keeping `window` worth of history.
    pub fn new(window: Duration) -> Self {
        Self {
            window: TimeDelta::from_std(window).unwrap_or(TimeDelta::MAX),
            samples: VecDeque::new(),
        }
    }

    /// Appends a sample and evicts everything that has aged out relative
    /// to it.
    pub fn push(&mut self, sample: TelemetrySample) {
        self.samples.push_back(sample);
        let horizon = sample.at - self.window;
        while self.samples.front().is_some_and(|s| s.at < horizon) {
            let _ = self.samples.pop_front();
        }
    }

    /// All samples still inside the window as of `now`, oldest first.
    pub fn samples_at(&self, now: DateTime<Utc>) -> impl Iterator<Item = &TelemetrySample> {
        let horizon = now - self.window;
        self.samples.iter().filter(move |s| s.at >= horizon)
    }

    /// Number of retained samples, including ones an age-filtered read
    /// would skip.
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Whether the series holds no samples at all.
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// The most recent sample.
    pub fn latest(&self) -> Option<&TelemetrySample> {
        self.samples.back()
    }
}
