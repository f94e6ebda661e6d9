// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! RAPL energy counters via the Linux powercap sysfs interface.
//!
//! Each powercap domain exposes a monotonically increasing energy counter
//! in microjoules that wraps at `max_energy_range_uj`. Power is only
//! defined as the difference of two snapshots.

use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

/// Domain name of the first CPU package.
pub const PACKAGE_0: &str = "package-0";
/// Domain name of the DRAM plane.
pub const DRAM: &str = "dram";

const POWERCAP_ROOT: &str = "/sys/class/powercap";

#[derive(Debug, Clone)]
struct Domain {
    name: String,
    energy_path: PathBuf,
    max_energy_uj: u64,
}

/// Reader over all RAPL domains found on this machine.
#[derive(Debug)]
pub struct RaplReader {
    domains: Vec<Domain>,
}

/// Energy counters of all domains at one instant.
#[derive(Debug, Clone)]
pub struct RaplSnapshot {
    /// When the counters were read.
    pub at: DateTime<Utc>,
    readings: BTreeMap<String, (u64, u64)>,
}

/// Average power per domain between two snapshots.
#[derive(Debug, Clone)]
pub struct RaplDelta {
    /// Timestamp of the later snapshot.
    pub at: DateTime<Utc>,
    watts: BTreeMap<String, f64>,
}

impl RaplReader {
    /// Probes the default powercap root. `None` when this machine exposes
    /// no RAPL domains, which is never fatal for the controller.
    pub fn probe() -> Option<Self> {
        Self::probe_at(Path::new(POWERCAP_ROOT))
    }

    /// Probes an alternative powercap root.
    pub fn probe_at(root: &Path) -> Option<Self> {
        let entries = match std::fs::read_dir(root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(root = %root.display(), error = %e, "powercap not available");
                return None;
            }
        };

        let mut domains = Vec::new();
        for entry in entries.flatten() {
            let dir = entry.path();
            let Some(file_name) = dir.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !file_name.starts_with("intel-rapl:") {
                continue;
            }
            let Ok(name) = std::fs::read_to_string(dir.join("name")) else {
                continue;
            };
            let energy_path = dir.join("energy_uj");
            if !energy_path.exists() {
                continue;
            }
            let max_energy_uj = std::fs::read_to_string(dir.join("max_energy_range_uj"))
                .ok()
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(u64::MAX);
            domains.push(Domain {
                name: name.trim().to_owned(),
                energy_path,
                max_energy_uj,
            });
        }

        if domains.is_empty() {
            debug!(root = %root.display(), "no RAPL domains found");
            return None;
        }
        debug!(domains = domains.len(), "RAPL domains discovered");
        Some(Self { domains })
    }

    /// Reads every domain's energy counter.
    pub fn snapshot(&self) -> io::Result<RaplSnapshot> {
        let mut readings = BTreeMap::new();
        for domain in &self.domains {
            let raw = std::fs::read_to_string(&domain.energy_path)?;
            let energy_uj: u64 = raw
                .trim()
                .parse()
                .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, format!("{e}")))?;
            let _ = readings.insert(domain.name.clone(), (energy_uj, domain.max_energy_uj));
        }
        Ok(RaplSnapshot { at: Utc::now(), readings })
    }
}

impl RaplSnapshot {
    /// A snapshot built from raw `(domain, energy_uj, max_energy_uj)`
    /// readings; the reader produces these, tests can too.
    pub fn from_readings(at: DateTime<Utc>, raw: &[(&str, u64, u64)]) -> Self {
        let readings = raw
            .iter()
            .map(|(name, energy, max)| ((*name).to_owned(), (*energy, *max)))
            .collect();
        Self { at, readings }
    }

    /// Average power between `earlier` and this snapshot.
    pub fn delta_since(&self, earlier: &Self) -> RaplDelta {
        let elapsed = (self.at - earlier.at).num_microseconds().unwrap_or(0);
        let mut watts = BTreeMap::new();

        if elapsed > 0 {
            for (name, (now_uj, max_uj)) in &self.readings {
                let Some((then_uj, _)) = earlier.readings.get(name) else {
                    continue;
                };
                let consumed_uj = if now_uj >= then_uj {
                    now_uj - then_uj
                } else {
                    // Counter wrapped at max_energy_range_uj.
                    max_uj - then_uj + now_uj
                };
                let _ = watts.insert(name.clone(), consumed_uj as f64 / elapsed as f64);
            }
        } else {
            warn!("non-positive interval between RAPL snapshots");
        }

        RaplDelta { at: self.at, watts }
    }
}

impl RaplDelta {
    /// Average watts of one domain, `0` when the domain is absent.
    pub fn watts(&self, domain: &str) -> f64 {
        self.watts.get(domain).copied().unwrap_or(0.0)
    }
}
