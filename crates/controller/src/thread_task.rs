// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Runs the control surface on its own OS thread.
//!
//! The server is async but deliberately lives on one dedicated thread with
//! a single-threaded runtime: the rest of the process is synchronous, and
//! handler work is bounded by the controller mutex anyway. The spawner
//! waits for the socket to bind, so a dead port fails startup instead of
//! being discovered at shutdown.

use std::sync::Arc;
use std::sync::mpsc;
use std::thread;

use tokio::runtime::Builder as RtBuilder;
use tokio::task::LocalSet;
use tokio_util::sync::CancellationToken;
use tracing::info;

use euf_engine_client::EngineClient;
use euf_state::ControllerHandle;

use crate::error::Error;

const THREAD_NAME: &str = "http-admin";

/// Handle to the running control surface thread.
///
/// Cancelling closes the listening socket; joining waits for in-flight
/// handlers to complete.
pub struct AdminServerHandle {
    cancel: CancellationToken,
    join: Option<thread::JoinHandle<Result<(), Error>>>,
}

impl AdminServerHandle {
    /// Requests shutdown and waits for the server thread to finish.
    pub fn shutdown_and_join(mut self) -> Result<(), Error> {
        self.cancel.cancel();
        match self.join.take().map(thread::JoinHandle::join) {
            None | Some(Ok(Ok(()))) => Ok(()),
            Some(Ok(Err(e))) => Err(e),
            Some(Err(panic)) => Err(Error::ThreadJoinPanic {
                thread_name: THREAD_NAME.to_owned(),
                panic_message: format!("{panic:?}"),
            }),
        }
    }
}

/// Spawns the control surface on a dedicated thread and waits until its
/// socket is bound.
pub fn spawn_admin_server(
    bind_address: String,
    handle: ControllerHandle,
    engine: Arc<dyn EngineClient>,
) -> Result<AdminServerHandle, Error> {
    let cancel = CancellationToken::new();
    let server_cancel = cancel.clone();
    let (startup_tx, startup_rx) = mpsc::sync_channel::<Result<(), Error>>(1);

    let join = thread::Builder::new()
        .name(THREAD_NAME.to_owned())
        .spawn(move || {
            let rt = RtBuilder::new_current_thread()
                .enable_all()
                .build()
                .map_err(|source| Error::RuntimeBuild {
                    thread_name: THREAD_NAME.to_owned(),
                    source,
                });
            let rt = match rt {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = startup_tx.send(Err(e));
                    return Ok(());
                }
            };

            let local = LocalSet::new();
            rt.block_on(local.run_until(async move {
                let surface = match euf_admin::bind(&bind_address, handle, engine).await {
                    Ok(surface) => surface,
                    Err(e) => {
                        let _ = startup_tx.send(Err(e.into()));
                        return Ok(());
                    }
                };
                let _ = startup_tx.send(Ok(()));
                surface.serve(server_cancel).await.map_err(Error::from)
            }))
        })
        .map_err(|source| Error::ThreadSpawnError {
            thread_name: THREAD_NAME.to_owned(),
            source,
        })?;

    // Surface bind/runtime failures to the caller while the thread winds
    // itself down.
    match startup_rx.recv() {
        Ok(Ok(())) => {
            info!(thread = THREAD_NAME, "control surface thread started");
            Ok(AdminServerHandle {
                cancel,
                join: Some(join),
            })
        }
        Ok(Err(e)) => {
            let _ = join.join();
            Err(e)
        }
        Err(_) => {
            // The thread died before signalling; join to recover the panic.
            match join.join() {
                Ok(result) => result.and(Err(Error::ThreadJoinPanic {
                    thread_name: THREAD_NAME.to_owned(),
                    panic_message: "startup signal lost".to_owned(),
                })),
                Err(panic) => Err(Error::ThreadJoinPanic {
                    thread_name: THREAD_NAME.to_owned(),
                    panic_message: format!("{panic:?}"),
                }),
            }
        }
    }
}
