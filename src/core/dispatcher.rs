//! Concurrent fan-out dispatch across a fleet of appliance sessions
//!
//! One caller-supplied operation runs against every target, each on its own
//! worker inside a bounded pool. Failures are isolated per target: whatever
//! happens inside one target's task — a typed error, a timeout, even a
//! panic — is converted into that target's failure envelope and never
//! disturbs the other targets or the caller.
//!
//! A mixed success/failure map is the dispatcher's normal terminal state.
//! `fan_out` itself errors only on programmer error (an empty target set).
//! The result map is keyed by target id with no ordering guarantee.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::logger;
use crate::utils::ApplianceError;

use super::hostname_cache::HostnameCache;
use super::session::SharedSession;

/// Uniform per-target result envelope
///
/// Invariant: `success` implies `data` is present and `error` absent, and
/// vice versa. The constructors are the only way the crate builds envelopes.
/// Exactly one envelope is produced per target per dispatch call.
#[derive(Debug, Clone, Serialize)]
pub struct QueryOutcome<T> {
    pub target_id: String,
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
    /// Appliance's self-reported hostname, or the target id when unresolved
    pub hostname: String,
}

impl<T> QueryOutcome<T> {
    pub fn success(target_id: impl Into<String>, data: T, hostname: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            success: true,
            data: Some(data),
            error: None,
            hostname: hostname.into(),
        }
    }

    pub fn failure(
        target_id: impl Into<String>,
        error: impl Into<String>,
        hostname: impl Into<String>,
    ) -> Self {
        Self {
            target_id: target_id.into(),
            success: false,
            data: None,
            error: Some(error.into()),
            hostname: hostname.into(),
        }
    }
}

/// Run `operation` against every session, with at most `max_workers` running
/// concurrently and each bounded by `per_target_timeout`.
///
/// A single-session set is invoked inline on the caller's task; a larger set
/// fans out onto workers. After each outcome is known the target's hostname
/// is resolved through the cache and attached, success or failure alike.
pub(crate) async fn fan_out<T, F, Fut>(
    sessions: &HashMap<String, SharedSession>,
    cache: &HostnameCache,
    max_workers: usize,
    per_target_timeout: Duration,
    operation: F,
) -> Result<HashMap<String, QueryOutcome<T>>, ApplianceError>
where
    F: Fn(SharedSession) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<T, ApplianceError>> + Send + 'static,
    T: Send + 'static,
{
    if sessions.is_empty() {
        return Err(ApplianceError::Configuration(
            "Cannot dispatch to an empty target set".to_string(),
        ));
    }

    let mut results = HashMap::with_capacity(sessions.len());

    // Single-target mode: invoke inline, no worker machinery.
    if sessions.len() == 1 {
        let (target_id, session) = sessions
            .iter()
            .next()
            .map(|(id, s)| (id.clone(), s.clone()))
            .ok_or_else(|| {
                ApplianceError::Configuration("Cannot dispatch to an empty target set".to_string())
            })?;

        let outcome = run_bounded(operation, session, per_target_timeout).await;
        let envelope = build_envelope(sessions, cache, target_id.clone(), outcome).await;
        results.insert(target_id, envelope);
        return Ok(results);
    }

    let semaphore = Arc::new(Semaphore::new(max_workers));
    let mut join_set = JoinSet::new();
    // Task id -> target id, so a panicked worker can still be attributed.
    let mut pending: HashMap<tokio::task::Id, String> = HashMap::with_capacity(sessions.len());

    for (target_id, session) in sessions {
        let op = operation.clone();
        let semaphore = semaphore.clone();
        let session = session.clone();
        let target_id_task = target_id.clone();

        let handle = join_set.spawn(async move {
            let permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => {
                    return (
                        target_id_task,
                        Err("Worker pool closed before dispatch".to_string()),
                    )
                }
            };
            let outcome = run_bounded(op, session, per_target_timeout).await;
            drop(permit);
            (target_id_task, outcome)
        });
        pending.insert(handle.id(), target_id.clone());
    }

    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((task_id, (target_id, outcome))) => {
                pending.remove(&task_id);
                let envelope = build_envelope(sessions, cache, target_id.clone(), outcome).await;
                results.insert(target_id, envelope);
            }
            Err(join_err) => {
                // A worker panicked. Attribute it via the task id map and
                // keep collecting the other targets.
                match pending.remove(&join_err.id()) {
                    Some(target_id) => {
                        logger::log_error(&format!(
                            "Dispatch worker for {} panicked: {}",
                            target_id, join_err
                        ));
                        let outcome = Err(format!("Operation panicked: {}", join_err));
                        let envelope =
                            build_envelope(sessions, cache, target_id.clone(), outcome).await;
                        results.insert(target_id, envelope);
                    }
                    None => {
                        logger::log_error(&format!(
                            "Dispatch worker with unknown task id failed: {}",
                            join_err
                        ));
                    }
                }
            }
        }
    }

    Ok(results)
}

/// One target's operation with its timeout applied. A timed-out future is
/// simply dropped; there is no cooperative cancellation signal.
async fn run_bounded<T, F, Fut>(
    operation: F,
    session: SharedSession,
    per_target_timeout: Duration,
) -> Result<T, String>
where
    F: Fn(SharedSession) -> Fut,
    Fut: Future<Output = Result<T, ApplianceError>>,
{
    match tokio::time::timeout(per_target_timeout, operation(session)).await {
        Ok(Ok(data)) => Ok(data),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "Operation timed out after {:?}",
            per_target_timeout
        )),
    }
}

/// Resolve the target's hostname and wrap the outcome into its envelope.
async fn build_envelope<T>(
    sessions: &HashMap<String, SharedSession>,
    cache: &HostnameCache,
    target_id: String,
    outcome: Result<T, String>,
) -> QueryOutcome<T> {
    let hostname = match sessions.get(&target_id) {
        Some(session) => cache.get_hostname(&target_id, session.as_ref()).await,
        None => target_id.clone(),
    };

    match outcome {
        Ok(data) => {
            logger::log_debug(&format!(
                "Operation completed successfully for {}",
                target_id
            ));
            QueryOutcome::success(target_id, data, hostname)
        }
        Err(error) => {
            logger::log_error(&format!("Operation failed for {}: {}", target_id, error));
            QueryOutcome::failure(target_id, error, hostname)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CacheSettings;
    use crate::core::mock_session::{MockApplianceSession, MockBehavior};
    use crate::core::session::{ApplianceSession, SYSTEM_INFO_CMD};
    use tempfile::tempdir;

    fn cache_in(dir: &std::path::Path) -> HostnameCache {
        HostnameCache::new(&CacheSettings {
            enabled: true,
            ttl_hours: 6,
            cache_file: dir.join("hostname_cache.json"),
        })
    }

    fn fleet(sessions: Vec<MockApplianceSession>) -> HashMap<String, SharedSession> {
        sessions
            .into_iter()
            .map(|s| (s.target_id().to_string(), Arc::new(s) as SharedSession))
            .collect()
    }

    #[tokio::test]
    async fn test_empty_target_set_is_configuration_error() {
        let dir = tempdir().unwrap();
        let sessions: HashMap<String, SharedSession> = HashMap::new();
        let err = fan_out(
            &sessions,
            &cache_in(dir.path()),
            5,
            Duration::from_secs(1),
            |s: SharedSession| async move { s.execute_query("show counters").await },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ApplianceError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_single_target_success_envelope() {
        let dir = tempdir().unwrap();
        let sessions = fleet(vec![MockApplianceSession::healthy("fw-a")]);

        let results = fan_out(
            &sessions,
            &cache_in(dir.path()),
            5,
            Duration::from_secs(5),
            |s: SharedSession| async move { s.execute_query("show counters").await },
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 1);
        let outcome = &results["fw-a"];
        assert!(outcome.success);
        assert!(outcome.data.is_some());
        assert!(outcome.error.is_none());
        assert_eq!(outcome.hostname, "fw-a-hostname");
    }

    #[tokio::test]
    async fn test_mixed_fleet_isolates_failures() {
        // A healthy, B times out at transport, C gets a protocol error.
        let dir = tempdir().unwrap();
        let sessions = fleet(vec![
            MockApplianceSession::healthy("fw-a"),
            MockApplianceSession::unreachable("fw-b"),
            MockApplianceSession::protocol_error("fw-c"),
        ]);

        let results = fan_out(
            &sessions,
            &cache_in(dir.path()),
            5,
            Duration::from_secs(5),
            |s: SharedSession| async move { s.execute_query("show counters").await },
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 3);

        let a = &results["fw-a"];
        assert!(a.success);
        assert!(a.error.is_none());

        let b = &results["fw-b"];
        assert!(!b.success);
        assert!(b.data.is_none());
        assert!(b.error.as_deref().unwrap().contains("Connection failed"));

        let c = &results["fw-c"];
        assert!(!c.success);
        assert!(c.error.as_deref().unwrap().contains("API error"));

        // Every envelope carries a non-empty hostname even on failure.
        for outcome in results.values() {
            assert!(!outcome.hostname.is_empty());
        }
    }

    #[tokio::test]
    async fn test_retry_bounds_per_failure_class() {
        let dir = tempdir().unwrap();
        let unreachable = Arc::new(MockApplianceSession::new(
            "fw-b",
            MockBehavior::Unreachable,
            MockApplianceSession::fast_retry(2),
        ));
        let protocol = Arc::new(MockApplianceSession::protocol_error("fw-c"));

        let mut sessions: HashMap<String, SharedSession> = HashMap::new();
        sessions.insert("fw-b".into(), unreachable.clone());
        sessions.insert("fw-c".into(), protocol.clone());

        fan_out(
            &sessions,
            &cache_in(dir.path()),
            5,
            Duration::from_secs(5),
            |s: SharedSession| async move { s.execute_query("show counters").await },
        )
        .await
        .unwrap();

        // Unreachable: the dispatched operation makes initial + 2 retries,
        // then the hostname refresh makes another 3. Two logical queries.
        assert_eq!(unreachable.query_count(), 2);
        assert_eq!(unreachable.attempt_count(), 6);
        // Protocol error: deterministic, never retried. One attempt for the
        // operation, one for the hostname refresh.
        assert_eq!(protocol.query_count(), 2);
        assert_eq!(protocol.attempt_count(), 2);
    }

    #[tokio::test]
    async fn test_panicking_operation_becomes_failure_envelope() {
        let dir = tempdir().unwrap();
        let sessions = fleet(vec![
            MockApplianceSession::healthy("fw-a"),
            MockApplianceSession::healthy("fw-b"),
        ]);

        let results = fan_out(
            &sessions,
            &cache_in(dir.path()),
            5,
            Duration::from_secs(5),
            |s: SharedSession| async move {
                if s.target_id() == "fw-b" {
                    panic!("boom");
                }
                s.execute_query("show counters").await
            },
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 2);
        assert!(results["fw-a"].success);
        let b = &results["fw-b"];
        assert!(!b.success);
        assert!(b.error.as_deref().unwrap().contains("panicked"));
        assert!(!b.hostname.is_empty());
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let dir = tempdir().unwrap();
        let sessions = fleet(vec![
            MockApplianceSession::healthy("fw-a"),
            MockApplianceSession::healthy("fw-slow"),
        ]);

        let results = fan_out(
            &sessions,
            &cache_in(dir.path()),
            5,
            Duration::from_millis(200),
            |s: SharedSession| async move {
                if s.target_id() == "fw-slow" {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                }
                s.execute_query("show counters").await
            },
        )
        .await
        .unwrap();

        assert!(results["fw-a"].success);
        let slow = &results["fw-slow"];
        assert!(!slow.success);
        assert!(slow.error.as_deref().unwrap().contains("timed out"));
    }

    #[tokio::test]
    async fn test_bounded_worker_pool_completes_whole_fleet() {
        let dir = tempdir().unwrap();
        let sessions = fleet(
            (0..12)
                .map(|i| MockApplianceSession::healthy(format!("fw-{:02}", i)))
                .collect(),
        );

        // Pool of 2 workers still produces exactly one envelope per target.
        let results = fan_out(
            &sessions,
            &cache_in(dir.path()),
            2,
            Duration::from_secs(5),
            |s: SharedSession| async move { s.execute_query("show counters").await },
        )
        .await
        .unwrap();

        assert_eq!(results.len(), 12);
        assert!(results.values().all(|o| o.success));
    }

    #[tokio::test]
    async fn test_hostname_attached_from_cache_without_requery() {
        let dir = tempdir().unwrap();
        let cache = cache_in(dir.path());
        let session = Arc::new(MockApplianceSession::healthy("fw-a"));
        let mut sessions: HashMap<String, SharedSession> = HashMap::new();
        sessions.insert("fw-a".into(), session.clone());

        // Prime the cache, then dispatch twice: only the priming lookup
        // issues a system-info query.
        cache.get_hostname("fw-a", session.as_ref()).await;
        let before = session.query_count();

        for _ in 0..2 {
            fan_out(
                &sessions,
                &cache,
                5,
                Duration::from_secs(5),
                |s: SharedSession| async move { s.execute_query(SYSTEM_INFO_CMD).await },
            )
            .await
            .unwrap();
        }

        // Two dispatched operations, zero extra hostname refreshes.
        assert_eq!(session.query_count(), before + 2);
    }
}
