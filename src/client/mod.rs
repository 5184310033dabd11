//! Remote resource access: authenticated JSON calls against the automation server.
//!
//! Every call carries the bearer token, is bounded by the configured request
//! timeout, and is never retried here. Any response outside 2xx surfaces as
//! [`Error::RemoteRequest`] with the status and body the server sent.

pub mod workitem;
pub mod workqueue;

use crate::active::ActiveWorkItem;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::model::{Asset, Credential, Process, Session};
use crate::telemetry::audit::AuditLogRecord;
use crate::telemetry::metrics;
use opentelemetry::KeyValue;
use reqwest::{Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;

/// Target for per-request trace events. The audit log layer never ships these.
pub(crate) const HTTP_TARGET: &str = "ats_client::http";

/// Handle to the automation server. Cheap to clone; clones share the
/// connection pool and the active work item slot.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    active: ActiveWorkItem,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.inner.base_url)
            .finish_non_exhaustive()
    }
}

impl Client {
    /// Build a client with its own active work item slot.
    pub fn new(config: &Config) -> Result<Self> {
        Self::with_active(config, ActiveWorkItem::new())
    }

    /// Build a client that tags work items into an existing slot.
    pub fn with_active(config: &Config, active: ActiveWorkItem) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url: config.url.clone(),
                token: SecretString::from(config.token.expose_secret().to_string()),
                active,
            }),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.inner.base_url
    }

    /// The slot holding the work item currently being processed.
    pub fn active(&self) -> &ActiveWorkItem {
        &self.inner.active
    }

    pub async fn get_session(&self, id: i64) -> Result<Session> {
        self.get_json(&format!("/sessions/{id}")).await
    }

    pub async fn get_process(&self, id: i64) -> Result<Process> {
        self.get_json(&format!("/processes/{id}")).await
    }

    /// Fetch a credential by name. The name is URL-encoded.
    pub async fn get_credential(&self, name: &str) -> Result<Credential> {
        self.get_json(&format!("/credentials/by_name/{}", urlencoding::encode(name)))
            .await
    }

    /// Fetch an asset by name. The name is URL-encoded.
    pub async fn get_asset(&self, name: &str) -> Result<Asset> {
        self.get_json(&format!("/assets/by_name/{}", urlencoding::encode(name)))
            .await
    }

    /// Ship one audit log record. Callers on the logging path swallow the error.
    pub async fn post_audit_log(&self, record: &AuditLogRecord) -> Result<()> {
        self.send(self.request(Method::POST, "/audit-logs").json(record))
            .await?;
        Ok(())
    }

    pub(crate) fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.inner
            .http
            .request(method, format!("{}{path}", self.inner.base_url))
            .bearer_auth(self.inner.token.expose_secret())
    }

    pub(crate) async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let response = self.send(self.request(Method::GET, path)).await?;
        decode(response).await
    }

    /// Execute and require a 2xx response.
    pub(crate) async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let (method, response) = self.execute(request).await?;
        if response.status().is_success() {
            Ok(response)
        } else {
            Err(remote_failure(&method, response).await)
        }
    }

    /// Execute without judging the status. Transport failures and timeouts
    /// still surface as [`Error::Http`].
    pub(crate) async fn execute(&self, request: RequestBuilder) -> Result<(Method, Response)> {
        let request = request.build()?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let start = Instant::now();
        let response = self.inner.http.execute(request).await?;
        let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

        let status = response.status().as_u16();
        tracing::debug!(
            target: HTTP_TARGET,
            %method,
            %path,
            status,
            elapsed_ms,
            "server request"
        );
        metrics::request_duration_ms().record(
            elapsed_ms,
            &[
                KeyValue::new("method", method.to_string()),
                KeyValue::new("status", i64::from(status)),
            ],
        );

        Ok((method, response))
    }
}

/// Turn a non-2xx response into [`Error::RemoteRequest`], keeping the body.
pub(crate) async fn remote_failure(method: &Method, response: Response) -> Error {
    let status = response.status().as_u16();
    let url = response.url().to_string();
    let body = response.text().await.unwrap_or_default();
    Error::RemoteRequest {
        method: method.to_string(),
        url,
        status,
        body,
    }
}

pub(crate) async fn decode<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}
