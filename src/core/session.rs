//! Appliance session abstraction
//!
//! This trait allows testing without real appliances by supporting mock
//! implementations. The production HTTPS implementation is in
//! `core/http_session.rs`.

use std::sync::Arc;

use serde_json::Value;

use crate::utils::ApplianceError;

/// Operational command used for authentication probes and hostname refresh.
///
/// Every appliance answers this read-only command, which makes it the
/// cheapest way to prove a credential works and to learn the appliance's
/// self-reported name.
pub const SYSTEM_INFO_CMD: &str = "show system info";

/// Shared handle to a session, as handed to dispatch operations.
pub type SharedSession = Arc<dyn ApplianceSession>;

/// One authenticated connection profile for a single appliance
///
/// Sessions execute read-only queries only. Auth state is established at
/// construction and treated as read-only afterwards; sessions are never
/// shared mutably across workers.
#[async_trait::async_trait]
pub trait ApplianceSession: Send + Sync {
    /// Configuration name of the target this session is bound to
    fn target_id(&self) -> &str;

    /// Network address the session connects to
    fn host(&self) -> &str;

    /// Execute a read-only operational command and return the structured
    /// result payload.
    ///
    /// Transport failures are retried per the session's retry policy and
    /// surface as `Connection` once exhausted; a response the appliance
    /// answered with a protocol-level error surfaces as `Api` immediately.
    async fn execute_query(&self, cmd: &str) -> Result<Value, ApplianceError>;

    /// Check whether the session's credential is still accepted.
    ///
    /// Never fails: used for health checks where a failure must not abort
    /// the caller. Makes a single attempt with no retries.
    async fn test_authentication(&self) -> bool;

    /// Query the appliance's self-reported hostname.
    async fn fetch_hostname(&self) -> Result<String, ApplianceError> {
        let result = self.execute_query(SYSTEM_INFO_CMD).await?;
        result
            .pointer("/system/hostname")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| {
                ApplianceError::Api("No hostname found in system info".to_string())
            })
    }
}
