// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Live telemetry for the control loop.
//!
//! Two bounded series pair what the engine and the CPU actually did with
//! what the model predicted: one for power (RAPL package + DRAM watts) and
//! one for throughput (the engine's finished-tasks counter). The
//! [`puller::TelemetryPuller`] appends to both on a fixed cadence; nothing
//! here is ever fatal, a failed read just means a missing sample.

pub mod puller;
pub mod rapl;
pub mod series;

pub use puller::{ActiveEstimates, TelemetryPuller};
pub use rapl::{RaplDelta, RaplReader, RaplSnapshot};
pub use series::{SampleSeries, TelemetrySample};
