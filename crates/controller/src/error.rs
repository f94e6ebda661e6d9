// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the controller crate.

use miette::Diagnostic;

/// Errors that can occur while wiring or shutting down the control loop.
///
/// Everything that happens inside a tick is absorbed there; these variants
/// only surface for startup wiring and teardown.
#[derive(thiserror::Error, Debug, Diagnostic)]
pub enum Error {
    /// An error originating from the control surface.
    #[error("Control surface error: {0}")]
    AdminError(#[from] euf_admin::error::Error),

    /// Failed to spawn an OS thread.
    #[error("Failed to spawn thread '{thread_name}': {source}")]
    ThreadSpawnError {
        /// Name of the thread we attempted to spawn.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// Failed to build the single-threaded runtime for a dedicated thread.
    #[error("Failed to build runtime for thread '{thread_name}': {source}")]
    RuntimeBuild {
        /// Name of the thread the runtime was meant for.
        thread_name: String,
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },

    /// A dedicated thread panicked instead of returning.
    #[error("Thread '{thread_name}' panicked: {panic_message}")]
    ThreadJoinPanic {
        /// The thread name that panicked.
        thread_name: String,
        /// Panic message.
        panic_message: String,
    },
}
