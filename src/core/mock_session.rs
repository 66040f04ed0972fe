//! Mock appliance session for testing without real appliances
//!
//! Provides scripted behaviors matching the failure classes the dispatcher
//! and cache must isolate: healthy, persistently unreachable, deterministic
//! protocol error, and transient-then-healthy. Call counters let tests
//! assert attempt counts (retry bounds, cache idempotence).

use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use serde_json::{json, Value};

use crate::utils::{retry_with_fixed_delay, ApplianceError, RetryConfig};

use super::session::{ApplianceSession, SYSTEM_INFO_CMD};

/// Scripted behavior for a mock session
#[derive(Debug, Clone, Copy)]
pub enum MockBehavior {
    /// Every query succeeds
    Healthy,
    /// Every transport attempt fails with a connection error
    Unreachable,
    /// The appliance answers every query with a protocol-level error
    ProtocolError,
    /// The first N transport attempts fail with a connection error, then
    /// attempts succeed
    FlakyThenHealthy(u32),
}

/// Mock appliance session with scripted behavior and attempt counters
pub struct MockApplianceSession {
    target_id: String,
    hostname: String,
    behavior: MockBehavior,
    retry: RetryConfig,
    /// Transport attempts, including retries
    attempts: AtomicU32,
    /// `execute_query` calls (one per logical query, regardless of retries)
    queries: AtomicU32,
}

impl MockApplianceSession {
    pub fn new(target_id: impl Into<String>, behavior: MockBehavior, retry: RetryConfig) -> Self {
        let target_id = target_id.into();
        Self {
            hostname: format!("{}-hostname", target_id),
            target_id,
            behavior,
            retry,
            attempts: AtomicU32::new(0),
            queries: AtomicU32::new(0),
        }
    }

    /// Fast retry config so tests exercising retry bounds stay quick
    pub fn fast_retry(max_retries: u32) -> RetryConfig {
        RetryConfig::new(max_retries, Duration::from_millis(5))
    }

    pub fn healthy(target_id: impl Into<String>) -> Self {
        Self::new(target_id, MockBehavior::Healthy, Self::fast_retry(2))
    }

    pub fn unreachable(target_id: impl Into<String>) -> Self {
        Self::new(target_id, MockBehavior::Unreachable, Self::fast_retry(2))
    }

    pub fn protocol_error(target_id: impl Into<String>) -> Self {
        Self::new(target_id, MockBehavior::ProtocolError, Self::fast_retry(2))
    }

    /// Total transport attempts made so far
    pub fn attempt_count(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Total `execute_query` calls made so far
    pub fn query_count(&self) -> u32 {
        self.queries.load(Ordering::SeqCst)
    }

    async fn attempt_once(&self, cmd: &str) -> Result<Value, ApplianceError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;

        match self.behavior {
            MockBehavior::Healthy => Ok(self.canned_response(cmd)),
            MockBehavior::Unreachable => Err(ApplianceError::Connection(
                "connection timed out".to_string(),
            )),
            MockBehavior::ProtocolError => {
                Err(ApplianceError::Api("API error: Unknown command".to_string()))
            }
            MockBehavior::FlakyThenHealthy(failures) => {
                if attempt <= failures {
                    Err(ApplianceError::Connection("connection refused".to_string()))
                } else {
                    Ok(self.canned_response(cmd))
                }
            }
        }
    }

    fn canned_response(&self, cmd: &str) -> Value {
        if cmd == SYSTEM_INFO_CMD {
            json!({
                "system": {
                    "hostname": self.hostname,
                    "model": "PA-MOCK",
                    "sw-version": "11.0.3",
                    "uptime": "12 days, 4:30:12"
                }
            })
        } else {
            json!({ "cmd": cmd, "entries": [] })
        }
    }
}

#[async_trait::async_trait]
impl ApplianceSession for MockApplianceSession {
    fn target_id(&self) -> &str {
        &self.target_id
    }

    fn host(&self) -> &str {
        "192.0.2.1"
    }

    async fn execute_query(&self, cmd: &str) -> Result<Value, ApplianceError> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        retry_with_fixed_delay(
            &self.retry,
            || self.attempt_once(cmd),
            |e: &ApplianceError| e.is_transient(),
        )
        .await
    }

    async fn test_authentication(&self) -> bool {
        self.attempt_once(SYSTEM_INFO_CMD).await.is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::session::ApplianceSession;

    #[tokio::test]
    async fn test_healthy_mock_reports_hostname() {
        let session = MockApplianceSession::healthy("fw-a");
        let hostname = session.fetch_hostname().await.unwrap();
        assert_eq!(hostname, "fw-a-hostname");
    }

    #[tokio::test]
    async fn test_unreachable_mock_exhausts_retries() {
        let session = MockApplianceSession::unreachable("fw-b");
        let err = session.execute_query("show counters").await.unwrap_err();
        assert!(matches!(err, ApplianceError::Connection(_)));
        assert_eq!(session.attempt_count(), 3); // initial + 2 retries
    }

    #[tokio::test]
    async fn test_protocol_error_mock_fails_once() {
        let session = MockApplianceSession::protocol_error("fw-c");
        let err = session.execute_query("show counters").await.unwrap_err();
        assert!(matches!(err, ApplianceError::Api(_)));
        assert_eq!(session.attempt_count(), 1);
    }

    #[tokio::test]
    async fn test_flaky_mock_recovers_within_budget() {
        let session = MockApplianceSession::new(
            "fw-d",
            MockBehavior::FlakyThenHealthy(2),
            MockApplianceSession::fast_retry(2),
        );
        let result = session.execute_query("show counters").await;
        assert!(result.is_ok());
        assert_eq!(session.attempt_count(), 3);
    }
}
