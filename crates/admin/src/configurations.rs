// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Candidate listing for dashboards.
//!
//! - GET `/configurations` - all generated candidates of the current mode,
//!   scaled to 0-100 for plotting, with the committed one marked active

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;

use euf_model::Configuration;
use euf_state::ControllerStatus;

use crate::AppState;

const UNCORE_FREQ_KHZ: u64 = 2_400_000;

pub(crate) fn routes() -> Router<AppState> {
    Router::new().route("/configurations", get(list_configurations))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ConfigurationsResponse {
    sockets: Vec<SocketDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SocketDto {
    logical_id: u32,
    adapting: bool,
    reeval_left: u32,
    configurations: Vec<CandidateDto>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CandidateDto {
    cpu_count: u32,
    avg_core_frequency: u64,
    avg_core_frequency_level: f64,
    uncore_frequency: u64,
    uncore_frequency_level: f64,
    relative_performance: f64,
    #[serde(rename = "relativeEE")]
    relative_ee: f64,
    active: bool,
}

async fn list_configurations(State(state): State<AppState>) -> Json<ConfigurationsResponse> {
    let status = state.handle.status();
    Json(ConfigurationsResponse {
        sockets: vec![SocketDto {
            logical_id: 0,
            adapting: false,
            reeval_left: 0,
            configurations: candidates(&status),
        }],
    })
}

fn candidates(status: &ControllerStatus) -> Vec<CandidateDto> {
    // The visualisation set: unreduced when a benchmark runs, otherwise
    // identical to the selectable candidates.
    let list = &status.all_candidates;

    let max_tps = list.iter().map(|c| c.tps).fold(0.0_f64, f64::max);
    let max_ee = list.iter().map(efficiency).fold(0.0_f64, f64::max);

    list.iter()
        .map(|c| CandidateDto {
            cpu_count: c.cpus,
            avg_core_frequency: c.freq_khz,
            avg_core_frequency_level: frequency_level(
                c.freq_khz,
                status.min_freq_khz,
                status.max_freq_khz,
            ),
            uncore_frequency: UNCORE_FREQ_KHZ,
            uncore_frequency_level: 100.0,
            relative_performance: percent_of(c.tps, max_tps),
            relative_ee: percent_of(efficiency(c), max_ee),
            active: status.active_config.as_ref() == Some(c),
        })
        .collect()
}

/// Energy efficiency: requests per joule.
fn efficiency(c: &Configuration) -> f64 {
    if c.epr > 0.0 { 1.0 / c.epr } else { 0.0 }
}

fn percent_of(value: f64, max: f64) -> f64 {
    if max > 0.0 { 100.0 * value / max } else { 0.0 }
}

fn frequency_level(freq_khz: u64, min_khz: u64, max_khz: u64) -> f64 {
    if max_khz > min_khz {
        100.0 * (freq_khz.saturating_sub(min_khz)) as f64 / (max_khz - min_khz) as f64
    } else {
        100.0
    }
}
