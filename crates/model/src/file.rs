// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! On-disk model file: calibration data for one machine.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Deserialize;

use crate::error::Error;
use crate::hardware::{CalibratedHardwareModel, HardwareCurves, TuningAxes};
use crate::workload::{BenchmarkProfile, TableWorkloadModel};

/// Parsed model file: tuning axes, hardware curves, and the benchmark
/// table, exactly as calibrated offline.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ModelFile {
    /// The machine's discrete tuning axes.
    pub axes: TuningAxes,
    /// Calibrated hardware curve coefficients.
    pub hardware: HardwareCurves,
    /// Calibrated workload profiles, keyed by benchmark name.
    pub benchmarks: BTreeMap<String, BenchmarkProfile>,
}

impl ModelFile {
    /// Reads and validates a model file.
    pub fn load(path: &Path) -> Result<Self, Error> {
        let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
            path: path.display().to_string(),
            source,
        })?;
        let file: Self = serde_json::from_str(&text).map_err(|source| Error::Parse {
            path: path.display().to_string(),
            source,
        })?;
        file.validate()?;
        Ok(file)
    }

    /// Checks the parsed file for values the curves cannot work with.
    pub fn validate(&self) -> Result<(), Error> {
        self.axes.validate()?;
        if self.hardware.ref_freq_khz == 0 {
            return Err(Error::InvalidModel {
                reason: "reference frequency is 0 kHz".to_owned(),
            });
        }
        for (name, profile) in &self.benchmarks {
            if profile.descriptor.ipt <= 0.0 {
                return Err(Error::InvalidModel {
                    reason: format!("benchmark '{name}' has non-positive instructions per task"),
                });
            }
        }
        Ok(())
    }

    /// Splits the file into the two model halves.
    pub fn into_models(self) -> (CalibratedHardwareModel, TableWorkloadModel) {
        (
            CalibratedHardwareModel::new(self.axes, self.hardware),
            TableWorkloadModel::new(self.benchmarks),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workload::{CpuTopology, WorkloadModel};
    use std::io::Write;

    pub(crate) const SAMPLE: &str = r#"{
        "axes": {
            "freqs_khz": [1200000, 1800000, 2400000],
            "cores": [2, 4],
            "hts": [false, true]
        },
        "hardware": {
            "ref_freq_khz": 2400000,
            "ipc_peak": 2.0,
            "smt_yield": 0.3,
            "membw_ipc_ceiling": 12.0,
            "branch_penalty": 0.4,
            "cache_penalty": 0.3,
            "avx_boost": 0.5,
            "pkg_idle_w": 8.0,
            "core_dynamic_w": 3.0,
            "freq_exponent": 2.2,
            "smt_power_factor": 0.15,
            "avx_power_factor": 0.4,
            "dram_idle_w": 1.5,
            "dram_access_w": 0.8
        },
        "benchmarks": {
            "stream-triad": {
                "descriptor": {
                    "memory_heaviness": 0.8,
                    "nomemory_heaviness": 0.2,
                    "avx_heaviness": 0.3,
                    "branch_heaviness": 0.05,
                    "compute_heaviness": 0.3,
                    "cache_heaviness": 0.4,
                    "ipt": 12000.0
                },
                "cache_pressure": 0.03
            }
        }
    }"#;

    #[test]
    fn parses_and_splits() {
        let file: ModelFile = serde_json::from_str(SAMPLE).unwrap();
        file.validate().unwrap();
        let (hardware, workload) = file.into_models();

        use crate::hardware::HardwareModel as _;
        assert_eq!(hardware.axes().max_freq_khz(), 2_400_000);
        let desc = workload
            .descriptor("stream-triad", &CpuTopology { cores: 2, ht: false })
            .unwrap();
        assert!((desc.ipt - 12_000.0).abs() < f64::EPSILON);
    }

    #[test]
    fn load_reads_from_disk() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(SAMPLE.as_bytes()).unwrap();
        let file = ModelFile::load(tmp.path()).unwrap();
        assert_eq!(file.benchmarks.len(), 1);
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = ModelFile::load(Path::new("/nonexistent/model.json")).unwrap_err();
        assert!(matches!(err, Error::Io { .. }));
    }

    #[test]
    fn garbage_is_a_parse_error() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"{ not json").unwrap();
        let err = ModelFile::load(tmp.path()).unwrap_err();
        assert!(matches!(err, Error::Parse { .. }));
    }

    #[test]
    fn non_positive_ipt_is_rejected() {
        let mut file: ModelFile = serde_json::from_str(SAMPLE).unwrap();
        if let Some(profile) = file.benchmarks.get_mut("stream-triad") {
            profile.descriptor.ipt = 0.0;
        }
        let err = file.validate().unwrap_err();
        assert!(matches!(err, Error::InvalidModel { .. }));
    }
}
