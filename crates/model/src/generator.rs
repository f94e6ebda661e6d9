// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Enumeration of the full configuration space for one benchmark.

use tracing::trace;

use crate::configuration::Configuration;
use crate::error::Error;
use crate::hardware::HardwareModel;
use crate::pareto::{Objective, Polarity};
use crate::workload::{CpuTopology, WorkloadModel};

/// The controller's objective vector: spend as little power as possible for
/// as much throughput as possible.
pub fn power_tps_objectives() -> [Objective<Configuration>; 2] {
    [
        Objective { value: |c: &Configuration| c.power_w, polarity: Polarity::Min },
        Objective { value: |c: &Configuration| c.tps, polarity: Polarity::Max },
    ]
}

/// Evaluates the model over the Cartesian product of the tuning axes and
/// returns one [`Configuration`] per point.
///
/// Enumeration order is unspecified; consumers must not rely on it. Fails
/// with [`Error::UnknownBenchmark`] when the workload model has no entry
/// for `benchmark`.
pub fn generate(
    hardware: &dyn HardwareModel,
    workload: &dyn WorkloadModel,
    benchmark: &str,
) -> Result<Vec<Configuration>, Error> {
    let axes = hardware.axes();
    let mut candidates =
        Vec::with_capacity(axes.freqs_khz.len() * axes.cores.len() * axes.hts.len());

    for &freq_khz in &axes.freqs_khz {
        for &cores in &axes.cores {
            for &ht in &axes.hts {
                let topology = CpuTopology { cores, ht };
                let cpus = topology.cpus();
                let desc = workload.descriptor(benchmark, &topology)?;

                let ipc = hardware.ipc(&desc, cpus, freq_khz, ht);
                let p_pkg = hardware.package_power(&desc, cpus, freq_khz, ht);
                let p_core = hardware.core_power(&desc, cpus, freq_khz, ht);
                let p_ram = hardware.dram_power(&desc, cpus, freq_khz, ht);

                // Cycles per second times instructions per cycle, divided by
                // instructions per task.
                let tps = (freq_khz as f64) * 1000.0 / (desc.ipt / ipc);
                let power_w = p_pkg + p_ram;
                let epr = power_w / tps;

                trace!(
                    benchmark,
                    freq_khz,
                    cores,
                    ht,
                    ipc,
                    p_pkg,
                    p_core,
                    p_ram,
                    tps,
                    "evaluated configuration"
                );

                candidates.push(Configuration {
                    freq_khz,
                    cores,
                    ht,
                    cpus,
                    ipc,
                    power_w,
                    tps,
                    epr,
                });
            }
        }
    }

    Ok(candidates)
}
