// Copyright The EUF Authors
// SPDX-License-Identifier: Apache-2.0

//! Blocking HTTP implementation of the engine contract.
//!
//! Talks to the engine's management REST surface. All requests inherit the
//! transport's default timeout; the controller treats slow calls as
//! ordinary blocking.

use std::collections::BTreeMap;

use chrono::DateTime;
use reqwest::blocking::{Client, RequestBuilder};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, info};
use url::Url;

use crate::error::Error;
use crate::{BenchmarkStatus, CounterSample, EngineClient, SessionSnapshot};

/// HTTP client for one engine instance.
pub struct HttpEngineClient {
    http: Client,
    base: Url,
    credentials: Option<(String, String)>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkerDto {
    local_id: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CounterDto {
    dist_name: String,
}

#[derive(Debug, Deserialize)]
struct SessionDto {
    benchmarks: BTreeMap<String, BenchmarkStatus>,
    #[serde(default)]
    profiles: Vec<String>,
}

impl HttpEngineClient {
    /// Connects to the engine and verifies it answers.
    ///
    /// The probe enumerates the engine's workers; any transport or protocol
    /// failure here means the engine is unavailable.
    pub fn connect(base: Url, credentials: Option<(String, String)>) -> Result<Self, Error> {
        let client = Self {
            http: Client::new(),
            base: normalise(base),
            credentials,
        };
        let workers = client.worker_ids()?;
        info!(
            engine = %client.base,
            workers = workers.len(),
            "connected to engine"
        );
        Ok(client)
    }

    fn endpoint(&self, path: &str) -> Result<Url, Error> {
        self.base.join(path).map_err(|e| Error::Transport {
            endpoint: format!("{}{path}", self.base),
            details: e.to_string(),
        })
    }

    fn authed(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Some((user, passwd)) => builder.basic_auth(user, Some(passwd)),
            None => builder,
        }
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, Error> {
        let endpoint = url.to_string();
        let response = self
            .authed(self.http.get(url))
            .send()
            .map_err(|e| Error::Transport {
                endpoint: endpoint.clone(),
                details: e.to_string(),
            })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                endpoint,
            });
        }
        response.json().map_err(|e| Error::Decode {
            endpoint,
            details: e.to_string(),
        })
    }

    fn post(&self, url: Url, body: Option<serde_json::Value>) -> Result<(), Error> {
        let endpoint = url.to_string();
        let mut builder = self.authed(self.http.post(url));
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = builder.send().map_err(|e| Error::Transport {
            endpoint: endpoint.clone(),
            details: e.to_string(),
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(Error::Http {
                status: status.as_u16(),
                endpoint,
            });
        }
        debug!(endpoint, "engine command accepted");
        Ok(())
    }
}

impl EngineClient for HttpEngineClient {
    fn worker_ids(&self) -> Result<Vec<u32>, Error> {
        let workers: Vec<WorkerDto> = self.get_json(self.endpoint("workers")?)?;
        Ok(workers.into_iter().map(|w| w.local_id).collect())
    }

    fn enable_worker(&self, worker: u32) -> Result<(), Error> {
        self.post(self.endpoint(&format!("workers/{worker}/enable"))?, None)
    }

    fn disable_worker(&self, worker: u32) -> Result<(), Error> {
        self.post(self.endpoint(&format!("workers/{worker}/disable"))?, None)
    }

    fn set_worker_frequency(&self, worker: u32, freq_khz: u64) -> Result<(), Error> {
        self.post(
            self.endpoint(&format!("workers/{worker}/frequency"))?,
            Some(serde_json::json!({ "kHz": freq_khz })),
        )
    }

    fn counter_names(&self) -> Result<Vec<String>, Error> {
        let counters: Vec<CounterDto> = self.get_json(self.endpoint("counters")?)?;
        Ok(counters.into_iter().map(|c| c.dist_name).collect())
    }

    fn counter_values(&self, counter: &str, refresh: bool) -> Result<Vec<CounterSample>, Error> {
        let mut url = self.endpoint(&format!("counters/{counter}/values"))?;
        if refresh {
            let _ = url.query_pairs_mut().append_pair("refresh", "true");
        }
        let endpoint = url.to_string();
        let raw: Vec<(i64, f64)> = self.get_json(url)?;
        raw.into_iter()
            .map(|(millis, value)| {
                let at = DateTime::from_timestamp_millis(millis).ok_or_else(|| Error::Decode {
                    endpoint: endpoint.clone(),
                    details: format!("timestamp {millis} out of range"),
                })?;
                Ok(CounterSample { at, value })
            })
            .collect()
    }

    fn session(&self, session: &str) -> Result<SessionSnapshot, Error> {
        let dto: SessionDto = self.get_json(self.endpoint(&format!("sessions/{session}"))?)?;
        Ok(SessionSnapshot {
            benchmarks: dto.benchmarks,
            profiles: dto.profiles,
        })
    }

    fn refresh_session(&self, session: &str) -> Result<(), Error> {
        self.post(self.endpoint(&format!("sessions/{session}/refresh"))?, None)
    }

    fn activate_benchmark(&self, session: &str, benchmark: &str) -> Result<(), Error> {
        self.post(
            self.endpoint(&format!("sessions/{session}/benchmarks/{benchmark}/activate"))?,
            None,
        )
    }

    fn activate_profile(&self, session: &str, profile: &str) -> Result<(), Error> {
        self.post(
            self.endpoint(&format!("sessions/{session}/profiles/{profile}/activate"))?,
            None,
        )
    }

    fn energy_management(&self, loop_enabled: bool, adapt_enabled: bool) -> Result<(), Error> {
        self.post(
            self.endpoint("energy-management")?,
            Some(serde_json::json!({ "loop": loop_enabled, "adapt": adapt_enabled })),
        )
    }
}

/// Guarantees a trailing slash so that joining relative paths appends
/// instead of replacing the last segment.
fn normalise(mut base: Url) -> Url {
    if !base.path().ends_with('/') {
        let path = format!("{}/", base.path());
        base.set_path(&path);
    }
    base
}
