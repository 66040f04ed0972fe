//! HTTPS appliance session
//!
//! Real `ApplianceSession` implementation speaking the appliance's
//! structured-command API over authenticated HTTPS: GET `/api/` with
//! `type=op`, `cmd=<command>` and `key=<api key>` query parameters, answered
//! by a JSON envelope `{"status": "success"|"error", ...}`.
//!
//! # Session lifecycle
//!
//! `connect()` authenticates eagerly by issuing a system-info probe; a
//! session that constructs successfully is known to hold a working
//! credential. There is no re-authentication mid-lifetime: a credential
//! revoked later surfaces as per-operation failures until the caller
//! rebuilds the session.

use std::time::Duration;

use reqwest::StatusCode;
use serde_json::Value;

use crate::config::TargetConfig;
use crate::logger;
use crate::models::ApiKey;
use crate::utils::{retry_with_fixed_delay, ApplianceError, RetryConfig};

use super::session::{ApplianceSession, SYSTEM_INFO_CMD};

/// Production session bound to one appliance
pub struct HttpApplianceSession {
    target_id: String,
    host: String,
    api_key: ApiKey,
    retry: RetryConfig,
    timeout: Duration,
    client: reqwest::Client,
    base_url: String,
}

impl HttpApplianceSession {
    /// Build and eagerly authenticate a session for one target.
    ///
    /// Fails with `Configuration` (missing required fields),
    /// `Authentication` (credential rejected by the appliance) or
    /// `Connection` (unreachable).
    pub async fn connect(
        target_id: &str,
        config: &TargetConfig,
        retry: RetryConfig,
    ) -> Result<Self, ApplianceError> {
        if config.host.trim().is_empty() {
            return Err(ApplianceError::Configuration(
                "Target host must be specified".to_string(),
            ));
        }

        let tag = logger::target_tag(target_id, &config.host);

        if !config.verify_ssl {
            logger::log_warn(&format!(
                "{} SSL verification is disabled - this is not recommended for production use",
                tag
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout_duration())
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| {
                ApplianceError::Configuration(format!("Failed to build HTTP client: {}", e))
            })?;

        let session = Self {
            target_id: target_id.to_string(),
            host: config.host.clone(),
            api_key: config.api_key.clone(),
            retry,
            timeout: config.timeout_duration(),
            client,
            base_url: format!("https://{}:{}", config.host, config.port),
        };

        // Eager authentication: the probe proves both reachability and a
        // working credential. A protocol-level rejection of the probe can
        // only mean the key was not accepted.
        match session.request(SYSTEM_INFO_CMD, &session.retry).await {
            Ok(_) => {
                logger::log_info(&format!("{} Authenticated successfully", tag));
                Ok(session)
            }
            Err(ApplianceError::Api(msg)) => Err(ApplianceError::Authentication(msg)),
            Err(e) => Err(e),
        }
    }

    fn tag(&self) -> String {
        logger::target_tag(&self.target_id, &self.host)
    }

    /// One HTTP attempt: no retries, transport errors mapped to the typed
    /// taxonomy.
    async fn request_once(&self, cmd: &str) -> Result<Value, ApplianceError> {
        let url = format!("{}/api/", self.base_url);
        logger::log_debug(&format!(
            "{} GET {} cmd={:?} (timeout {:?})",
            self.tag(),
            url,
            cmd,
            self.timeout
        ));

        let response = self
            .client
            .get(&url)
            .query(&[("type", "op"), ("cmd", cmd), ("key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ApplianceError::Connection(redact_key(&e.to_string())))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApplianceError::Authentication(format!(
                "Appliance rejected credential (HTTP {})",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ApplianceError::Connection(format!(
                "HTTP {} from appliance",
                status.as_u16()
            )));
        }

        let body = response
            .text()
            .await
            .map_err(|e| ApplianceError::Connection(redact_key(&e.to_string())))?;

        parse_api_response(&body)
    }

    /// Full request path: retry wrapper around single attempts. Only
    /// transport failures are retried.
    async fn request(&self, cmd: &str, retry: &RetryConfig) -> Result<Value, ApplianceError> {
        let result = retry_with_fixed_delay(
            retry,
            || self.request_once(cmd),
            |e: &ApplianceError| e.is_transient(),
        )
        .await;

        if let Err(e) = &result {
            logger::log_error(&format!("{} Request failed: {}", self.tag(), e));
        }
        result
    }
}

#[async_trait::async_trait]
impl ApplianceSession for HttpApplianceSession {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn host(&self) -> &str {
        &self.host
    }

    async fn execute_query(&self, cmd: &str) -> Result<Value, ApplianceError> {
        logger::log_info(&format!(
            "{} Executing operational command: {}",
            self.tag(),
            cmd
        ));
        self.request(cmd, &self.retry).await
    }

    async fn test_authentication(&self) -> bool {
        match self.request(SYSTEM_INFO_CMD, &RetryConfig::no_retry()).await {
            Ok(_) => true,
            Err(e) => {
                logger::log_error(&format!("{} Authentication test failed: {}", self.tag(), e));
                false
            }
        }
    }
}

/// Parse the JSON response envelope and extract the result payload.
///
/// A body with `status: error` is an `Api` error: the appliance understood
/// the request and rejected it, so the failure is deterministic.
fn parse_api_response(raw: &str) -> Result<Value, ApplianceError> {
    let parsed: Value = serde_json::from_str(raw)
        .map_err(|e| ApplianceError::Api(format!("Failed to parse response: {}", e)))?;

    match parsed.get("status").and_then(Value::as_str) {
        Some("success") => Ok(parsed.get("result").cloned().unwrap_or(Value::Null)),
        Some("error") => {
            let msg = parsed
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error");
            Err(ApplianceError::Api(format!("API error: {}", msg)))
        }
        Some(other) => Err(ApplianceError::Api(format!(
            "Unexpected response status: {}",
            other
        ))),
        None => Err(ApplianceError::Api("Invalid response format".to_string())),
    }
}

/// Strips the `key=` query parameter from transport error text.
///
/// reqwest error messages can embed the full request URL, which carries the
/// API key.
fn redact_key(message: &str) -> String {
    match message.find("key=") {
        Some(start) => {
            let rest = &message[start + 4..];
            let end = rest
                .find(|c: char| c == '&' || c.is_whitespace())
                .map(|i| start + 4 + i)
                .unwrap_or(message.len());
            format!("{}key=<redacted>{}", &message[..start], &message[end..])
        }
        None => message.to_string(),
    }
}
