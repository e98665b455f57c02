// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client configuration and environment loading.

use std::collections::HashMap;
use std::env;
use std::time::Duration;

use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;

use crate::error::ClientError;

/// Base URL of the Loki deployment (scheme + host, optional path prefix).
const ENV_ADDR: &str = "LOKI_ADDR";
/// Tenant ID sent as `X-Scope-OrgID` and used as the basic auth username.
const ENV_ORG_ID: &str = "LOKI_ORG_ID";
/// Basic auth password. Leaving it unset disables basic auth.
const ENV_PASSWORD: &str = "LOKI_PASSWORD";
/// Request timeout in whole seconds.
const ENV_HTTP_TIMEOUT: &str = "LOKI_HTTP_TIMEOUT";
const ENV_HTTPS_PROXY: &str = "LOKI_HTTPS_PROXY";
const ENV_HTTPS_PROXY_FALLBACK: &str = "HTTPS_PROXY";

const DEFAULT_ADDR: &str = "http://localhost:3100";
/// Tenant Loki assigns to requests when multi-tenancy is disabled.
const DEFAULT_ORG_ID: &str = "fake";

/// Configuration for a [`crate::Client`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Tenant ID sent on every authenticated request
    pub tenant_id: String,
    /// Basic auth password; `None` or empty disables basic auth
    pub token: Option<String>,
    /// Base URL every endpoint path is appended to
    pub base_url: String,
    /// Extra headers appended to every authenticated request, in order
    pub inject_headers: Vec<(String, String)>,
    /// Overall request timeout; `None` keeps reqwest's default (no timeout)
    pub timeout: Option<Duration>,
    /// HTTPS proxy URL
    pub https_proxy: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            tenant_id: DEFAULT_ORG_ID.to_string(),
            token: None,
            base_url: DEFAULT_ADDR.to_string(),
            inject_headers: Vec::new(),
            timeout: None,
            https_proxy: None,
        }
    }
}

impl ClientConfig {
    pub fn new(
        tenant_id: impl Into<String>,
        token: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Self {
        let token = token.into();
        Self {
            tenant_id: tenant_id.into(),
            token: (!token.is_empty()).then_some(token),
            base_url: base_url.into(),
            ..Default::default()
        }
    }

    /// Appends one extra header. Calling this twice with the same name sends
    /// both values.
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.inject_headers.push((name.into(), value.into()));
        self
    }

    /// Builds settings from the current process environment.
    pub fn from_os_env() -> Result<Self, ClientError> {
        Self::from_env_iter(env::vars())
    }

    /// Builds settings from an iterator of key/value pairs (typically for tests).
    pub fn from_env_iter<I, K, V>(iter: I) -> Result<Self, ClientError>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let map: HashMap<String, String> = iter
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        let get = |key: &str| {
            map.get(key)
                .map(|value| value.trim())
                .filter(|value| !value.is_empty())
                .map(str::to_string)
        };

        let timeout = match get(ENV_HTTP_TIMEOUT) {
            Some(raw) => Some(Duration::from_secs(raw.parse::<u64>().map_err(|_| {
                ClientError::InvalidConfig(format!(
                    "{ENV_HTTP_TIMEOUT} must be a whole number of seconds, got '{raw}'"
                ))
            })?)),
            None => None,
        };

        let config = Self {
            tenant_id: get(ENV_ORG_ID).unwrap_or_else(|| DEFAULT_ORG_ID.to_string()),
            token: get(ENV_PASSWORD),
            base_url: get(ENV_ADDR).unwrap_or_else(|| DEFAULT_ADDR.to_string()),
            inject_headers: Vec::new(),
            timeout,
            https_proxy: get(ENV_HTTPS_PROXY).or_else(|| get(ENV_HTTPS_PROXY_FALLBACK)),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ClientError> {
        if self.tenant_id.trim().is_empty() {
            return Err(ClientError::InvalidConfig(
                "tenant ID cannot be empty".to_string(),
            ));
        }

        self.parsed_base_url()?;

        if self.timeout == Some(Duration::ZERO) {
            return Err(ClientError::InvalidConfig(
                "timeout must be greater than 0".to_string(),
            ));
        }

        for (name, value) in &self.inject_headers {
            HeaderName::from_bytes(name.as_bytes()).map_err(|_| {
                ClientError::InvalidConfig(format!("invalid header name '{name}'"))
            })?;
            HeaderValue::from_str(value).map_err(|_| {
                ClientError::InvalidConfig(format!("invalid value for header '{name}'"))
            })?;
        }

        Ok(())
    }

    pub(crate) fn parsed_base_url(&self) -> Result<Url, ClientError> {
        let url = Url::parse(&self.base_url).map_err(|err| {
            ClientError::InvalidConfig(format!("invalid base URL '{}': {err}", self.base_url))
        })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ClientError::InvalidConfig(format!(
                "base URL must use http or https, got '{other}'"
            ))),
        }
    }
}
