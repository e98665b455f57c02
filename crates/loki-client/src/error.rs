// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

use reqwest::StatusCode;

/// Errors surfaced by [`crate::Client`] operations.
///
/// Every failure is returned to the caller as-is; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// Sending the request failed (DNS, connect, TLS, timeout).
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// Headers arrived but the body could not be read.
    #[error("reading request failed with status code {status}: {source}")]
    BodyRead {
        status: u16,
        #[source]
        source: reqwest::Error,
    },

    /// Non-2xx response, carrying the raw body text.
    #[error("request failed with status code {status}: {body}")]
    Status { status: u16, body: String },

    /// Non-2xx response on an endpoint whose body is not reported.
    #[error("unexpected status code of {0}")]
    UnexpectedStatus(u16),

    #[error("error parsing response data: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("failed to encode push payload: {0}")]
    Serialize(#[source] serde_json::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid request url: {0}")]
    InvalidUrl(String),
}

impl ClientError {
    /// Status code attached to the error, if the server answered at all.
    pub fn status(&self) -> Option<StatusCode> {
        let code = match self {
            Self::BodyRead { status, .. } | Self::Status { status, .. } => *status,
            Self::UnexpectedStatus(status) => *status,
            Self::Transport(err) => return err.status(),
            _ => return None,
        };
        StatusCode::from_u16(code).ok()
    }
}
