// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Errors for the model crate.

use thiserror::Error;

/// Errors that can occur while loading or evaluating the model.
#[derive(Error, Debug)]
pub enum Error {
    /// The workload model has no entry for the requested benchmark.
    #[error("Unknown benchmark '{name}'")]
    UnknownBenchmark {
        /// The benchmark name that was looked up.
        name: String,
    },

    /// The model file could not be read.
    #[error("Failed to read model file '{path}': {source}")]
    Io {
        /// Path of the model file.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The model file could not be parsed.
    #[error("Failed to parse model file '{path}': {source}")]
    Parse {
        /// Path of the model file.
        path: String,
        /// Underlying JSON error.
        #[source]
        source: serde_json::Error,
    },

    /// The model file parsed but describes an unusable model.
    #[error("Invalid model: {reason}")]
    InvalidModel {
        /// Human-readable description of the defect.
        reason: String,
    },
}
