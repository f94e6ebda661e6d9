// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the engine client.

use thiserror::Error;

/// Errors that can occur while talking to the engine.
#[derive(Error, Debug)]
pub enum Error {
    /// The engine could not be reached at all.
    #[error("Engine unreachable at '{endpoint}': {details}")]
    Transport {
        /// The endpoint that failed.
        endpoint: String,
        /// Human-readable transport failure.
        details: String,
    },

    /// The engine answered with a non-success status.
    #[error("Engine rejected '{endpoint}' with HTTP {status}")]
    Http {
        /// HTTP status code of the response.
        status: u16,
        /// The endpoint that was called.
        endpoint: String,
    },

    /// The engine's answer could not be decoded.
    #[error("Failed to decode engine response from '{endpoint}': {details}")]
    Decode {
        /// The endpoint that was called.
        endpoint: String,
        /// Human-readable decoding failure.
        details: String,
    },

    /// The engine refused an operation that is syntactically valid.
    #[error("Engine refused to {operation}: {details}")]
    Rejected {
        /// What was attempted.
        operation: String,
        /// Why the engine refused.
        details: String,
    },
}
