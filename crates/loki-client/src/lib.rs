// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client for a multi-tenant Loki deployment.
//!
//! [`Client`] pushes log lines, runs instant and range LogQL queries, lists
//! labels and label values, scrapes `/metrics` and triggers `/flush`. Every
//! request except the metrics scrape is scoped to the configured tenant via
//! `X-Scope-OrgID`, with basic auth added when a credential is configured.
//!
//! ```no_run
//! use loki_client::{Client, ClientConfig, LabelSet};
//!
//! # async fn run() -> Result<(), loki_client::ClientError> {
//! let client = Client::new(ClientConfig::new("tenant-1", "s3cret", "http://localhost:3100"))?;
//! let labels = LabelSet::from([("env".to_string(), "dev".to_string())]);
//! client.push_log_line("hello", &[labels]).await?;
//! let response = client.run_range_query(r#"{job="varlog"}"#).await?;
//! for stream in response.data.streams() {
//!     println!("{:?}: {} lines", stream.stream, stream.values.len());
//! }
//! # Ok(())
//! # }
//! ```

#![cfg_attr(not(test), deny(clippy::panic))]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]
#![cfg_attr(not(test), deny(clippy::todo))]
#![cfg_attr(not(test), deny(clippy::unimplemented))]

pub mod client;
pub mod clock;
pub mod config;
pub mod error;
pub mod push;
pub mod response;
pub mod transport;

pub use client::{instant_query_url, parse_response, range_query_url, Client};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ClientConfig;
pub use error::ClientError;
pub use push::{build_push_request, format_timestamp, LabelSet, PushRequest, PushStream};
pub use response::{
    LabelResponse, MatrixValues, QueryData, QueryResponse, ResultType, StreamValues, VectorValues,
};
pub use transport::{AuthenticatingTransport, TenantAuth, SCOPE_ORG_ID_HEADER};
