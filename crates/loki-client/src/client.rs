// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, Response, StatusCode, Url};
use tracing::{debug, warn};

use crate::clock::{Clock, ManualClock};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::push::{build_push_request, format_timestamp, LabelSet};
use crate::response::{LabelResponse, QueryEnvelope, QueryResponse};
use crate::transport::AuthenticatingTransport;

const PUSH_ENDPOINT: &str = "/loki/api/v1/push";
const QUERY_ENDPOINT: &str = "/loki/api/v1/query";
const QUERY_RANGE_ENDPOINT: &str = "/loki/api/v1/query_range";
const LABELS_ENDPOINT: &str = "/loki/api/v1/labels";
const LABEL_ENDPOINT: &str = "/loki/api/v1/label";
const METRICS_ENDPOINT: &str = "/metrics";
const FLUSH_ENDPOINT: &str = "/flush";

/// How far past the reference time instant and range queries reach.
const QUERY_END_OFFSET: Duration = Duration::from_secs(1);
/// How far before the reference time range queries start.
const RANGE_QUERY_LOOKBACK: Duration = Duration::from_secs(2 * 60 * 60);

/// Tenant-scoped client for one Loki deployment.
///
/// Cloning is cheap and clones share the connection pool.
#[derive(Debug, Clone)]
pub struct Client {
    transport: AuthenticatingTransport,
    base_url: Url,
    clock: Arc<dyn Clock>,
}

impl Client {
    /// Creates a client whose reference time is pinned to now.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_clock(config, Arc::new(ManualClock::new()))
    }

    /// Creates a client reading its reference time from `clock`.
    pub fn with_clock(config: ClientConfig, clock: Arc<dyn Clock>) -> Result<Self, ClientError> {
        config.validate()?;
        let base_url = config.parsed_base_url()?;
        let transport = AuthenticatingTransport::from_config(&config)?;
        Ok(Self {
            transport,
            base_url,
            clock,
        })
    }

    pub fn tenant_id(&self) -> &str {
        self.transport.auth().tenant_id()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Pushes `line` stamped with the client's reference time.
    pub async fn push_log_line(
        &self,
        line: &str,
        extra_labels: &[LabelSet],
    ) -> Result<(), ClientError> {
        self.push_log_line_with_timestamp(line, self.clock.now(), extra_labels)
            .await
    }

    /// Pushes `line` stamped with `timestamp`.
    ///
    /// The line goes into a single stream labelled `job="varlog"` overlaid
    /// with each mapping of `extra_labels` in order.
    pub async fn push_log_line_with_timestamp(
        &self,
        line: &str,
        timestamp: SystemTime,
        extra_labels: &[LabelSet],
    ) -> Result<(), ClientError> {
        let url = endpoint_url(&self.base_url, PUSH_ENDPOINT);
        let payload = build_push_request(line, timestamp, extra_labels);
        let body = serde_json::to_vec(&payload).map_err(ClientError::Serialize)?;

        let request = self
            .transport
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        let response = self.transport.send(request).await?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        match response.text().await {
            Ok(body) => {
                warn!(status = %status, body = %body, "push rejected");
                Err(ClientError::Status {
                    status: status.as_u16(),
                    body,
                })
            }
            Err(source) => Err(ClientError::BodyRead {
                status: status.as_u16(),
                source,
            }),
        }
    }

    /// Returns the server's `/metrics` text verbatim.
    ///
    /// Unlike every other call this one is sent without tenant scope or
    /// credentials.
    pub async fn metrics(&self) -> Result<String, ClientError> {
        let url = endpoint_url(&self.base_url, METRICS_ENDPOINT);
        let request = self.transport.request(Method::GET, url);
        let response = self.transport.send_unauthenticated(request).await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|source| ClientError::BodyRead {
                status: status.as_u16(),
                source,
            })?;
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }
        Ok(body)
    }

    /// Asks the ingesters to flush in-memory chunks to the backing store.
    pub async fn flush(&self) -> Result<(), ClientError> {
        let url = endpoint_url(&self.base_url, FLUSH_ENDPOINT);
        let request = self
            .transport
            .request(Method::POST, url)
            .header(CONTENT_TYPE, "application/json");
        let response = self.transport.send(request).await?;

        let status = response.status();
        if status.is_success() {
            debug!("flush accepted");
            return Ok(());
        }
        Err(ClientError::UnexpectedStatus(status.as_u16()))
    }

    /// Runs an instant query evaluated one second past the reference time.
    pub async fn run_query(&self, query: &str) -> Result<QueryResponse, ClientError> {
        let url = instant_query_url(&self.base_url, query, self.clock.now());
        let (body, status) = self.run(url).await?;
        parse_response(&body, status)
    }

    /// Runs a range query over the two hours before the reference time.
    pub async fn run_range_query(&self, query: &str) -> Result<QueryResponse, ClientError> {
        let url = range_query_url(&self.base_url, query, self.clock.now());
        let (body, status) = self.run(url).await?;
        parse_response(&body, status)
    }

    pub async fn label_names(&self) -> Result<Vec<String>, ClientError> {
        let url = endpoint_url(&self.base_url, LABELS_ENDPOINT);
        self.fetch_labels(url).await
    }

    /// Lists the values seen for label `name`.
    pub async fn label_values(&self, name: &str) -> Result<Vec<String>, ClientError> {
        let mut url = endpoint_url(&self.base_url, LABEL_ENDPOINT);
        url.path_segments_mut()
            .map_err(|()| ClientError::InvalidUrl(self.base_url.to_string()))?
            .push(name)
            .push("values");
        self.fetch_labels(url).await
    }

    /// Sends an authenticated GET for `path` (relative to the base URL) and
    /// hands back the raw response. `path` may carry its own query string.
    pub async fn get(&self, path: &str) -> Result<Response, ClientError> {
        let url = raw_path_url(&self.base_url, path);
        let request = self.transport.request(Method::GET, url);
        self.transport.send(request).await
    }

    async fn fetch_labels(&self, url: Url) -> Result<Vec<String>, ClientError> {
        let request = self.transport.request(Method::GET, url);
        let response = self.transport.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::UnexpectedStatus(status.as_u16()));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|source| ClientError::BodyRead {
                status: status.as_u16(),
                source,
            })?;
        let labels: LabelResponse =
            serde_json::from_slice(&bytes).map_err(ClientError::Decode)?;
        Ok(labels.data)
    }

    /// GETs `url` and buffers the whole body, whatever the status.
    async fn run(&self, url: Url) -> Result<(Vec<u8>, StatusCode), ClientError> {
        let request = self.transport.request(Method::GET, url);
        let response = self.transport.send(request).await?;

        let status = response.status();
        let body = response
            .bytes()
            .await
            .map_err(|source| ClientError::BodyRead {
                status: status.as_u16(),
                source,
            })?;
        debug!(status = %status, body_len = body.len(), "query answered");
        Ok((body.to_vec(), status))
    }
}

/// Decodes a query answer.
///
/// The body is decoded before the status is looked at, so a malformed body
/// is reported as a decode error even when the status is not 2xx. Error
/// envelopes without `data` decode, and with a non-2xx status come back as
/// [`ClientError::Status`] carrying the body. A 2xx answer must carry `data`.
pub fn parse_response(body: &[u8], status: StatusCode) -> Result<QueryResponse, ClientError> {
    let envelope: QueryEnvelope = serde_json::from_slice(body).map_err(ClientError::Decode)?;

    if !status.is_success() {
        return Err(ClientError::Status {
            status: status.as_u16(),
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }
    envelope.into_response().map_err(ClientError::Decode)
}

/// URL of an instant query evaluated at `now` + 1s.
pub fn instant_query_url(base_url: &Url, query: &str, now: SystemTime) -> Url {
    let mut url = endpoint_url(base_url, QUERY_ENDPOINT);
    url.query_pairs_mut()
        .append_pair("query", query)
        .append_pair("time", &format_timestamp(query_end(now)));
    url
}

/// URL of a range query from `now` - 2h to `now` + 1s.
pub fn range_query_url(base_url: &Url, query: &str, now: SystemTime) -> Url {
    let mut url = endpoint_url(base_url, QUERY_RANGE_ENDPOINT);
    url.query_pairs_mut()
        .append_pair("end", &format_timestamp(query_end(now)))
        .append_pair("query", query)
        .append_pair("start", &format_timestamp(range_query_start(now)));
    url
}

fn query_end(now: SystemTime) -> SystemTime {
    now.checked_add(QUERY_END_OFFSET).unwrap_or(now)
}

fn range_query_start(now: SystemTime) -> SystemTime {
    now.checked_sub(RANGE_QUERY_LOOKBACK).unwrap_or(now)
}

/// Like [`endpoint_url`] but `path` may include a query string, which is
/// kept as given.
fn raw_path_url(base_url: &Url, path: &str) -> Url {
    let (path, query) = match path.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path, None),
    };
    let mut url = endpoint_url(base_url, path);
    url.set_query(query);
    url
}

/// Appends `path` to the base URL's own path, dropping any query or fragment.
fn endpoint_url(base_url: &Url, path: &str) -> Url {
    let mut url = base_url.clone();
    let joined = format!("{}{}", base_url.path().trim_end_matches('/'), path);
    url.set_path(&joined);
    url.set_query(None);
    url.set_fragment(None);
    url
}
