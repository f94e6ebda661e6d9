// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Workload model: per-benchmark instruction-mix descriptors.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::Error;

/// The CPU topology a descriptor is requested for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuTopology {
    /// Enabled physical cores.
    pub cores: u32,
    /// Whether SMT siblings are enabled.
    pub ht: bool,
}

impl CpuTopology {
    /// Effective logical CPUs of this topology.
    pub fn cpus(&self) -> u32 {
        if self.ht { 2 * self.cores } else { self.cores }
    }
}

/// Instruction-mix description of one benchmark, consumed by the hardware
/// model. Heaviness values are fractions in `[0, 1]`; `ipt` is instructions
/// per task.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WorkloadDescriptor {
    /// Share of instructions stalled on main memory.
    pub memory_heaviness: f64,
    /// Complement of `memory_heaviness` as calibrated.
    pub nomemory_heaviness: f64,
    /// Share of vector (AVX) instructions.
    pub avx_heaviness: f64,
    /// Share of hard-to-predict branches.
    pub branch_heaviness: f64,
    /// Share of plain ALU work.
    pub compute_heaviness: f64,
    /// Pressure on the shared last-level cache.
    pub cache_heaviness: f64,
    /// Instructions per task.
    pub ipt: f64,
}

/// Calibrated per-benchmark profile as stored in the model file.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BenchmarkProfile {
    /// The single-threaded baseline descriptor.
    pub descriptor: WorkloadDescriptor,
    /// How strongly additional threads inflate cache pressure.
    #[serde(default)]
    pub cache_pressure: f64,
}

/// Maps a benchmark name and topology to a workload descriptor.
pub trait WorkloadModel: Send + Sync {
    /// Descriptor for `benchmark` when run on `topology`.
    ///
    /// Fails with [`Error::UnknownBenchmark`] for names the model was not
    /// calibrated for.
    fn descriptor(
        &self,
        benchmark: &str,
        topology: &CpuTopology,
    ) -> Result<WorkloadDescriptor, Error>;

    /// All benchmark names this model knows.
    fn benchmark_names(&self) -> Vec<String>;
}

/// The production workload model: a table of calibrated profiles.
#[derive(Debug, Clone, Default)]
pub struct TableWorkloadModel {
    profiles: BTreeMap<String, BenchmarkProfile>,
}

impl TableWorkloadModel {
    /// Builds a model from calibrated profiles.
    pub fn new(profiles: BTreeMap<String, BenchmarkProfile>) -> Self {
        Self { profiles }
    }
}

impl WorkloadModel for TableWorkloadModel {
    fn descriptor(
        &self,
        benchmark: &str,
        topology: &CpuTopology,
    ) -> Result<WorkloadDescriptor, Error> {
        let profile = self
            .profiles
            .get(benchmark)
            .ok_or_else(|| Error::UnknownBenchmark {
                name: benchmark.to_owned(),
            })?;

        // More threads share the LLC; scale the cache term accordingly.
        let mut desc = profile.descriptor;
        let extra_threads = f64::from(topology.cpus().saturating_sub(1));
        desc.cache_heaviness =
            (desc.cache_heaviness * (1.0 + profile.cache_pressure * extra_threads)).min(1.0);
        Ok(desc)
    }

    fn benchmark_names(&self) -> Vec<String> {
        self.profiles.keys().cloned().collect()
    }
}
