//! Authenticated remote-call client.
//!
//! # Responsibilities
//! - Sign every call with an [`Auth`] envelope carried in the `token` header
//! - `POST {base_url}/{fn}` with the JSON params as the body
//! - Classify responses into JSON, drained stream, text or a typed error
//!
//! # Design Decisions
//! - No caching and no retries; callers decide whether to try again
//! - Every failure is logged and returned unchanged in kind

use std::time::{Duration, Instant};

use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::{json, Value};
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

use crate::auth::Auth;
use crate::config::RpcConfig;
use crate::observability::metrics;
use crate::rpc::stream::drain_event_stream;
use crate::rpc::types::{CallOutput, ClientError, ClientResult};

/// Header carrying the encoded auth envelope.
pub const TOKEN_HEADER: &str = "token";

/// Header carrying the per-call correlation ID.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Client for one module server, signing as one key holder.
#[derive(Debug, Clone)]
pub struct Client {
    http: reqwest::Client,
    base_url: Url,
    auth: Auth,
}

impl Client {
    /// Create a client for `config.base_url` that signs with `auth`.
    pub fn new(config: &RpcConfig, auth: Auth) -> ClientResult<Self> {
        let resolved = config.resolved_base_url();
        let base_url = Url::parse(&resolved)
            .map_err(|e| ClientError::InvalidUrl(format!("{}: {}", resolved, e)))?;
        if !matches!(base_url.scheme(), "http" | "https") {
            return Err(ClientError::InvalidUrl(format!(
                "{}: unsupported scheme '{}'",
                resolved,
                base_url.scheme()
            )));
        }

        let mut builder = reqwest::Client::builder();
        if config.request_timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(config.request_timeout_secs));
        }
        let http = builder.build()?;

        tracing::info!(base_url = %base_url, key = %auth.address(), "Client initialized");

        Ok(Self {
            http,
            base_url,
            auth,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn auth(&self) -> &Auth {
        &self.auth
    }

    /// Address a call to `function` resolves to.
    pub fn endpoint(&self, function: &str) -> ClientResult<Url> {
        let url = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            function.trim_start_matches('/')
        );
        Url::parse(&url).map_err(|e| ClientError::InvalidUrl(format!("{}: {}", url, e)))
    }

    /// Call `function` with `params`, declaring `cost` in the envelope.
    pub async fn call(&self, function: &str, params: &Value, cost: u64) -> ClientResult<CallOutput> {
        let started = Instant::now();
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!("rpc_call", fn_name = %function, request_id = %request_id);

        let result = self
            .dispatch(function, params, cost, request_id)
            .instrument(span.clone())
            .await;

        let _entered = span.enter();
        match &result {
            Ok(_) => {
                tracing::debug!(elapsed_ms = started.elapsed().as_millis() as u64, "Call completed");
            }
            Err(ClientError::Transport(e)) => {
                tracing::error!(error = %e, "Request failed");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Call failed");
            }
        }
        metrics::record_rpc_call(
            function,
            result.as_ref().map_or_else(ClientError::kind, |_| "ok"),
            started.elapsed(),
        );

        result
    }

    async fn dispatch(
        &self,
        function: &str,
        params: &Value,
        cost: u64,
        request_id: Uuid,
    ) -> ClientResult<CallOutput> {
        let headers = self
            .auth
            .generate(&json!({ "fn": function, "params": params }), cost)?;
        let url = self.endpoint(function)?;

        let response = self
            .http
            .post(url)
            .header(TOKEN_HEADER, headers.token)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .header(REQUEST_ID_HEADER, request_id.to_string())
            .json(params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ClientError::from_status(status));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_ascii_lowercase();

        if content_type.contains("text/event-stream") {
            let summary = drain_event_stream(response).await?;
            tracing::debug!(chunks = summary.chunks, bytes = summary.bytes, "Stream closed");
            return Ok(CallOutput::Stream(summary));
        }

        if content_type.contains("application/json") {
            let body: Value = response.json().await?;
            if body.get("success") == Some(&Value::Bool(false)) {
                return Err(ClientError::ApiError(body));
            }
            return Ok(CallOutput::Json(body));
        }

        Ok(CallOutput::Text(response.text().await?))
    }
}
