// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Analytical hardware/workload model and configuration search space.
//!
//! This crate is the pure, side-effect-free half of the controller: given a
//! calibrated model file it can
//!
//! - evaluate IPC and power curves for any point of the tuning space
//!   ([`HardwareModel`]),
//! - describe a benchmark's instruction mix ([`WorkloadModel`]),
//! - enumerate the full `freqs x cores x hts` candidate space
//!   ([`generator::generate`]),
//! - reduce candidates to the power/throughput Pareto frontier
//!   ([`pareto::pareto_front`]),
//! - memoise the result per benchmark ([`cache::ConfigurationCache`]).
//!
//! Nothing in this crate talks to the engine or to the operating system
//! beyond reading the model file once at startup.

pub mod cache;
pub mod configuration;
pub mod error;
pub mod file;
pub mod generator;
pub mod hardware;
pub mod pareto;
pub mod workload;

pub use cache::{CacheEntry, ConfigurationCache};
pub use configuration::Configuration;
pub use error::Error;
pub use file::ModelFile;
pub use hardware::{CalibratedHardwareModel, HardwareModel, TuningAxes};
pub use pareto::{Objective, Polarity};
pub use workload::{CpuTopology, TableWorkloadModel, WorkloadDescriptor, WorkloadModel};
