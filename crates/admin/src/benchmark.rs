// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Benchmark and profile selection.
//!
//! - GET `/benchmark/sessions` - the managed session
//! - POST `/benchmark/setbenchmark/{session}/{benchmark}` - activate a benchmark
//! - POST `/benchmark/setprofile/{session}/{profile}` - activate a profile
//!
//! Activation goes to the engine outside the controller lock; on success
//! the handler schedules a reselection so the next tick picks up the new
//! workload.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::{info, warn};

use crate::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/benchmark/sessions", get(list_sessions))
        .route("/benchmark/setbenchmark/{session}/{benchmark}", post(set_benchmark))
        .route("/benchmark/setprofile/{session}/{profile}", post(set_profile))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionsResponse {
    managed_benchmarks: Vec<SessionName>,
}

#[derive(Serialize)]
struct SessionName {
    name: String,
}

async fn list_sessions(State(state): State<AppState>) -> Json<SessionsResponse> {
    Json(SessionsResponse {
        managed_benchmarks: vec![SessionName {
            name: state.handle.session().to_owned(),
        }],
    })
}

async fn set_benchmark(
    State(state): State<AppState>,
    Path((session, benchmark)): Path<(String, String)>,
) -> StatusCode {
    let engine = state.engine.clone();
    let what = benchmark.clone();
    let outcome = blocking_engine_call(move || {
        engine.activate_benchmark(&session, &benchmark)?;
        // Force a state refresh so the next tick sees the switch.
        engine.refresh_session(&session)
    })
    .await;
    match outcome {
        Ok(()) => {
            info!(benchmark = what, "benchmark activated");
            state.handle.request_reselect();
            StatusCode::OK
        }
        Err(e) => {
            warn!(benchmark = what, error = %e, "benchmark activation refused");
            StatusCode::BAD_REQUEST
        }
    }
}

async fn set_profile(
    State(state): State<AppState>,
    Path((session, profile)): Path<(String, String)>,
) -> StatusCode {
    let engine = state.engine.clone();
    let what = profile.clone();
    let outcome = blocking_engine_call(move || {
        engine.activate_profile(&session, &profile)?;
        engine.refresh_session(&session)
    })
    .await;
    match outcome {
        Ok(()) => {
            info!(profile = what, "profile activated");
            state.handle.request_reselect();
            StatusCode::OK
        }
        Err(e) => {
            warn!(profile = what, error = %e, "profile activation refused");
            StatusCode::BAD_REQUEST
        }
    }
}

/// Runs one blocking engine call off the server's runtime thread.
async fn blocking_engine_call<F>(call: F) -> Result<(), euf_engine_client::Error>
where
    F: FnOnce() -> Result<(), euf_engine_client::Error> + Send + 'static,
{
    match tokio::task::spawn_blocking(call).await {
        Ok(result) => result,
        Err(e) => Err(euf_engine_client::Error::Rejected {
            operation: "dispatch engine call".to_owned(),
            details: e.to_string(),
        }),
    }
}
