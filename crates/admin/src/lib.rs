// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! HTTP server for the operator control surface.
//!
//! Everything here mutates or reads controller state exclusively through
//! the injected [`ControllerHandle`], so every request serialises with the
//! control loop's tick at the one mutex both sides share.

pub mod error;

mod benchmark;
mod configurations;
mod status;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tracing::info;

use euf_engine_client::EngineClient;
use euf_state::ControllerHandle;

use crate::error::Error;

/// Shared state for the HTTP control surface.
#[derive(Clone)]
struct AppState {
    /// Handle to the one controller state of this process.
    handle: ControllerHandle,

    /// The engine, for benchmark/profile activation requests.
    engine: Arc<dyn EngineClient>,
}

fn app(state: AppState) -> Router {
    Router::new()
        .merge(status::routes())
        .merge(configurations::routes())
        .merge(benchmark::routes())
        .layer(ServiceBuilder::new())
        .with_state(state)
}

/// A control surface that has bound its listening socket but is not
/// serving yet. Bind failures therefore surface to the spawning thread
/// before the server detaches.
pub struct BoundControlSurface {
    addr: SocketAddr,
    listener: TcpListener,
    router: Router,
}

/// Binds the control surface socket.
pub async fn bind(
    bind_address: &str,
    handle: ControllerHandle,
    engine: Arc<dyn EngineClient>,
) -> Result<BoundControlSurface, Error> {
    let router = app(AppState { handle, engine });

    let addr = bind_address
        .parse::<SocketAddr>()
        .map_err(|e| Error::InvalidBindAddress {
            bind_address: bind_address.to_owned(),
            details: format!("{e}"),
        })?;

    let listener = TcpListener::bind(&addr)
        .await
        .map_err(|e| Error::BindFailed {
            addr: addr.to_string(),
            details: format!("{e}"),
        })?;

    info!(endpoint = %addr, "control surface listening");
    Ok(BoundControlSurface { addr, listener, router })
}

impl BoundControlSurface {
    /// The address the socket actually bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr().unwrap_or(self.addr)
    }

    /// Serves until `cancel` fires; in-flight handlers are allowed to
    /// complete.
    pub async fn serve(self, cancel: CancellationToken) -> Result<(), Error> {
        axum::serve(self.listener, self.router)
            .with_graceful_shutdown(async move {
                cancel.cancelled().await;
            })
            .await
            .map_err(|e| Error::ServerError {
                addr: self.addr.to_string(),
                details: format!("{e}"),
            })
    }
}
