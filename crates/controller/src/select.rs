// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Operating-point selection.

use euf_model::Configuration;

/// Picks the configuration to run from `candidates`.
///
/// Without a target the cheapest candidate wins, with ties keeping the
/// incumbent for stability. With a target the rule is: above the target,
/// minimise power; below it, climb throughput greedily. A candidate that
/// sustains the target always displaces an incumbent that does not.
///
/// `seed` is the starting incumbent, usually the currently active
/// configuration. A singleton candidate set short-circuits.
pub fn select(
    candidates: &[Configuration],
    target_tps: Option<f64>,
    seed: Option<&Configuration>,
) -> Option<Configuration> {
    if candidates.len() == 1 {
        return candidates.first().cloned();
    }

    let mut best = seed;
    for candidate in candidates {
        let Some(incumbent) = best else {
            best = Some(candidate);
            continue;
        };
        match target_tps {
            None => {
                if candidate.power_w < incumbent.power_w {
                    best = Some(candidate);
                }
            }
            Some(target) => {
                if candidate.tps >= target {
                    if incumbent.tps < target || candidate.power_w < incumbent.power_w {
                        best = Some(candidate);
                    }
                } else if candidate.tps >= incumbent.tps {
                    best = Some(candidate);
                }
            }
        }
    }
    best.cloned()
}
