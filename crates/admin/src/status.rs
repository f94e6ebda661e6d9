// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Service status and mode toggles.
//!
//! - GET `/` - redirect to the status document
//! - GET `/servicestatus` - current controller mode
//! - POST `/services/eclon/{0|1}` - enable or disable the control loop
//! - POST `/services/adapton/{0|1}` - reserved, accepted and ignored

use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tracing::info;

use crate::AppState;

pub(crate) fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(root))
        .route("/servicestatus", get(service_status))
        .route("/services/eclon/{flag}", post(set_eclon))
        .route("/services/adapton/{flag}", post(set_adapton))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ServiceStatus {
    adapt_on: bool,
    ecl_on: bool,
}

async fn root() -> Response {
    (StatusCode::FOUND, [(header::LOCATION, "/servicestatus")]).into_response()
}

async fn service_status(State(state): State<AppState>) -> Json<ServiceStatus> {
    Json(ServiceStatus {
        // The engine-side adaptation stays disabled for the whole run.
        adapt_on: false,
        ecl_on: state.handle.status().enabled,
    })
}

/// `0`/`1` path segment; anything else is a bad request.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw {
        "0" => Some(false),
        "1" => Some(true),
        _ => None,
    }
}

async fn set_eclon(State(state): State<AppState>, Path(flag): Path<String>) -> StatusCode {
    match parse_flag(&flag) {
        Some(enabled) => {
            info!(enabled, "control loop mode requested");
            state.handle.set_enabled(enabled);
            StatusCode::OK
        }
        None => StatusCode::BAD_REQUEST,
    }
}

async fn set_adapton(Path(flag): Path<String>) -> StatusCode {
    match parse_flag(&flag) {
        Some(_) => StatusCode::OK,
        None => StatusCode::BAD_REQUEST,
    }
}
