// Copyright 2023-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Tenant-scoped request dispatch.
//!
//! [`TenantAuth`] is the single place that decides which credentials and
//! scope headers a request carries. Endpoint methods build plain requests and
//! hand them to [`AuthenticatingTransport::send`], which decorates them right
//! before dispatch. Failures from reqwest are returned unchanged; there is no
//! retry or timeout logic here beyond what the underlying client enforces.

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use tracing::{debug, trace};

use crate::config::ClientConfig;
use crate::error::ClientError;

/// Header carrying the tenant the request is scoped to.
pub const SCOPE_ORG_ID_HEADER: &str = "X-Scope-OrgID";

/// Header injection policy shared by every authenticated endpoint.
#[derive(Debug, Clone)]
pub struct TenantAuth {
    tenant_id: String,
    /// Tenant scope and credentials; these replace caller-supplied values.
    scope_headers: HeaderMap,
    inject_headers: HeaderMap,
}

impl TenantAuth {
    pub fn new(
        tenant_id: impl Into<String>,
        token: Option<String>,
        inject_headers: &[(String, String)],
    ) -> Result<Self, ClientError> {
        let mut headers = HeaderMap::new();
        for (name, value) in inject_headers {
            let header_name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ClientError::InvalidConfig(format!("invalid header name '{name}'")))?;
            let header_value = HeaderValue::from_str(value).map_err(|_| {
                ClientError::InvalidConfig(format!("invalid value for header '{name}'"))
            })?;
            headers.append(header_name, header_value);
        }

        let tenant_id = tenant_id.into();
        let mut scope_headers = HeaderMap::new();
        let tenant_value = HeaderValue::from_str(&tenant_id).map_err(|_| {
            ClientError::InvalidConfig(format!("invalid tenant id '{tenant_id}'"))
        })?;
        scope_headers.insert(SCOPE_ORG_ID_HEADER, tenant_value);
        if let Some(token) = token.filter(|token| !token.is_empty()) {
            scope_headers.insert(AUTHORIZATION, basic_auth_value(&tenant_id, &token)?);
        }

        Ok(Self {
            tenant_id,
            scope_headers,
            inject_headers: headers,
        })
    }

    pub fn tenant_id(&self) -> &str {
        &self.tenant_id
    }

    pub fn has_credential(&self) -> bool {
        self.scope_headers.contains_key(AUTHORIZATION)
    }

    /// Sets the tenant header and, when a credential is configured, basic
    /// auth, replacing any values the builder already carries. Injected
    /// header values are then appended, so existing values under the same
    /// name are kept.
    pub fn decorate(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder.headers(self.scope_headers.clone());

        for name in self.inject_headers.keys() {
            let values = self.inject_headers.get_all(name);
            for value in values.iter() {
                builder = builder.header(name.clone(), value.clone());
            }
            trace!(header = %name, values = ?values, "injected header");
        }

        builder
    }
}

/// A reqwest client wrapped with a [`TenantAuth`] policy.
#[derive(Debug, Clone)]
pub struct AuthenticatingTransport {
    client: Client,
    auth: TenantAuth,
}

impl AuthenticatingTransport {
    pub fn new(client: Client, auth: TenantAuth) -> Self {
        Self { client, auth }
    }

    /// Builds the underlying reqwest client from the proxy and timeout
    /// settings of `config`.
    pub fn from_config(config: &ClientConfig) -> Result<Self, ClientError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        if let Some(proxy) = &config.https_proxy {
            let proxy = reqwest::Proxy::https(proxy).map_err(|err| {
                ClientError::InvalidConfig(format!("invalid HTTPS proxy '{proxy}': {err}"))
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build().map_err(ClientError::Transport)?;

        let auth = TenantAuth::new(
            config.tenant_id.clone(),
            config.token.clone(),
            &config.inject_headers,
        )?;
        Ok(Self::new(client, auth))
    }

    pub fn auth(&self) -> &TenantAuth {
        &self.auth
    }

    /// Starts an undecorated request; pass it to [`Self::send`] to dispatch.
    pub fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Decorates and dispatches a request built by [`Self::request`].
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        self.dispatch(self.auth.decorate(builder)).await
    }

    /// Dispatches a request without tenant scope or credentials.
    pub async fn send_unauthenticated(
        &self,
        builder: RequestBuilder,
    ) -> Result<Response, ClientError> {
        self.dispatch(builder).await
    }

    async fn dispatch(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let request = builder.build()?;
        debug!(
            method = %request.method(),
            url = %request.url(),
            headers = ?redact_headers(request.headers()),
            "loki HTTP request"
        );

        let method = request.method().clone();
        let url = request.url().clone();
        let response = self.client.execute(request).await?;
        debug!(
            method = %method,
            url = %url,
            status = %response.status(),
            "loki HTTP response"
        );
        Ok(response)
    }
}

/// `Basic base64(user:password)`, marked sensitive.
fn basic_auth_value(user: &str, password: &str) -> Result<HeaderValue, ClientError> {
    let encoded = base64::engine::general_purpose::STANDARD.encode(format!("{user}:{password}"));
    let mut value = HeaderValue::from_str(&format!("Basic {encoded}"))
        .map_err(|_| ClientError::InvalidConfig("invalid basic auth credentials".to_string()))?;
    value.set_sensitive(true);
    Ok(value)
}

/// Returns a redacted view of request headers suitable for debug logging.
fn redact_headers(headers: &HeaderMap) -> Vec<(String, String)> {
    headers
        .iter()
        .map(|(name, value)| {
            let display = if *name == AUTHORIZATION {
                "<redacted>".to_string()
            } else {
                value
                    .to_str()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|_| "<non-utf8>".to_string())
            };
            (name.as_str().to_string(), display)
        })
        .collect()
}
