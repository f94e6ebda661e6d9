// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Per-benchmark memoisation of the generated configuration space.

use std::collections::HashMap;

use tracing::{info, warn};

use crate::configuration::Configuration;
use crate::generator::{generate, power_tps_objectives};
use crate::hardware::HardwareModel;
use crate::pareto::pareto_front;
use crate::workload::WorkloadModel;

/// The generated candidate space of one benchmark.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Every point of the tuning space.
    pub all: Vec<Configuration>,
    /// The power/throughput Pareto frontier of `all`.
    pub pareto: Vec<Configuration>,
}

/// Startup-built, read-only map from benchmark name to its candidate space.
///
/// Entries are never invalidated during a run; a benchmark unknown to the
/// workload model simply has no entry, and the controller falls back to the
/// synthetic maximum configuration for it.
#[derive(Debug, Default)]
pub struct ConfigurationCache {
    entries: HashMap<String, CacheEntry>,
}

impl ConfigurationCache {
    /// Generates and reduces the configuration space for every benchmark
    /// name, skipping (with a warning) the ones the model does not know.
    pub fn build<I, S>(hardware: &dyn HardwareModel, workload: &dyn WorkloadModel, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let objectives = power_tps_objectives();
        let mut entries = HashMap::new();

        for name in names {
            let name = name.as_ref();
            match generate(hardware, workload, name) {
                Ok(all) => {
                    let pareto = pareto_front(&all, &objectives);
                    info!(
                        benchmark = name,
                        candidates = all.len(),
                        frontier = pareto.len(),
                        "generated configuration space"
                    );
                    let _ = entries.insert(name.to_owned(), CacheEntry { all, pareto });
                }
                Err(e) => {
                    warn!(benchmark = name, error = %e, "skipping benchmark");
                }
            }
        }

        Self { entries }
    }

    /// The candidate space of `benchmark`, if it was generated.
    pub fn get(&self, benchmark: &str) -> Option<&CacheEntry> {
        self.entries.get(benchmark)
    }

    /// Number of cached benchmarks.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no benchmark could be cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
