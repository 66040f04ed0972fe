//! Fleet registry: the crate's main entry point
//!
//! Owns the authenticated sessions for a run plus the shared hostname cache,
//! and exposes the fleet-level operations built on them: dispatching a query
//! to every target (or a named subset), validating credentials across the
//! fleet, and summarizing the configured inventory.
//!
//! # Construction modes
//!
//! `FleetSelection::Single` binds one named target and propagates its
//! connection error to the caller. `FleetSelection::All` connects every
//! enabled target, dropping (and logging) the ones that fail so a dead
//! appliance cannot block the rest of the fleet; it only errors when no
//! target at all could be connected.

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value;

use crate::config::Settings;
use crate::constants::DEFAULT_DISPATCH_TIMEOUT;
use crate::logger;
use crate::utils::ApplianceError;

use super::dispatcher::{fan_out, QueryOutcome};
use super::hostname_cache::HostnameCache;
use super::http_session::HttpApplianceSession;
use super::session::{ApplianceSession, SharedSession, SYSTEM_INFO_CMD};

/// Which targets a registry binds at construction
#[derive(Debug, Clone)]
pub enum FleetSelection {
    /// Every target with `enabled: true`
    All,
    /// One named target, looked up by its configuration name. Selecting a
    /// target by name overrides its `enabled` flag.
    Single(String),
}

/// Per-target credential validation result
#[derive(Debug, Clone, Serialize)]
pub struct TargetValidation {
    pub target_id: String,
    pub hostname: String,
    pub valid: bool,
    pub errors: Vec<String>,
}

/// Connection profile snapshot for one configured target
#[derive(Debug, Clone, Serialize)]
pub struct TargetSummary {
    pub host: String,
    pub port: u16,
    pub description: String,
    pub location: String,
    pub verify_ssl: bool,
    pub timeout: u64,
    pub enabled: bool,
    /// Whether this registry holds a live session for the target
    pub connected: bool,
}

/// Inventory overview across every configured target, including the ones the
/// registry is not connected to
#[derive(Debug, Clone, Serialize)]
pub struct FleetSummary {
    pub total: usize,
    pub enabled: usize,
    pub disabled: usize,
    pub connected: usize,
    pub targets: BTreeMap<String, TargetSummary>,
}

/// Authenticated sessions for a run, plus the shared hostname cache
pub struct FleetRegistry {
    settings: Settings,
    sessions: HashMap<String, SharedSession>,
    cache: HostnameCache,
}

impl std::fmt::Debug for FleetRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetRegistry")
            .field("settings", &self.settings)
            .field("sessions", &self.sessions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

impl FleetRegistry {
    /// Connect sessions for the selected targets and return the registry.
    ///
    /// Single mode is all-or-nothing. Fleet mode is best-effort per target
    /// and fails only when zero targets could be connected.
    pub async fn connect(
        settings: Settings,
        selection: FleetSelection,
    ) -> Result<Self, ApplianceError> {
        let cache = HostnameCache::new(&settings.hostname_cache);
        let mut sessions: HashMap<String, SharedSession> = HashMap::new();

        match &selection {
            FleetSelection::Single(name) => {
                let target = settings.get_target(name).ok_or_else(|| {
                    ApplianceError::Configuration(format!(
                        "Target '{}' not found in configuration",
                        name
                    ))
                })?;
                if !target.enabled {
                    logger::log_warn(&format!(
                        "Target '{}' is disabled in configuration but was selected by name",
                        name
                    ));
                }
                let retry = settings.retry_config_for(target);
                let session = HttpApplianceSession::connect(name, target, retry).await?;
                sessions.insert(name.clone(), std::sync::Arc::new(session));
            }
            FleetSelection::All => {
                for (name, _) in settings.disabled_targets() {
                    logger::log_info(&format!("Skipping disabled target '{}'", name));
                }

                for (name, target) in settings.enabled_targets() {
                    let retry = settings.retry_config_for(target);
                    match HttpApplianceSession::connect(name, target, retry).await {
                        Ok(session) => {
                            sessions.insert(name.to_string(), std::sync::Arc::new(session));
                        }
                        Err(e) => {
                            logger::log_error(&format!(
                                "{} Dropping target from fleet: {}",
                                logger::target_tag(name, &target.host),
                                e
                            ));
                        }
                    }
                }

                if sessions.is_empty() {
                    return Err(ApplianceError::Configuration(
                        "No targets could be connected".to_string(),
                    ));
                }
            }
        }

        logger::log_info(&format!(
            "Fleet registry ready with {} connected target(s)",
            sessions.len()
        ));

        Ok(Self {
            settings,
            sessions,
            cache,
        })
    }

    /// Names of the targets this registry holds live sessions for, sorted.
    pub fn target_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.sessions.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Run `operation` against every connected target with the default
    /// per-target timeout.
    pub async fn dispatch<T, F, Fut>(
        &self,
        operation: F,
    ) -> Result<HashMap<String, QueryOutcome<T>>, ApplianceError>
    where
        F: Fn(SharedSession) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, ApplianceError>> + Send + 'static,
        T: Send + 'static,
    {
        self.dispatch_with_timeout(DEFAULT_DISPATCH_TIMEOUT, operation)
            .await
    }

    /// Run `operation` against every connected target, bounding each target
    /// by `per_target_timeout`.
    pub async fn dispatch_with_timeout<T, F, Fut>(
        &self,
        per_target_timeout: Duration,
        operation: F,
    ) -> Result<HashMap<String, QueryOutcome<T>>, ApplianceError>
    where
        F: Fn(SharedSession) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, ApplianceError>> + Send + 'static,
        T: Send + 'static,
    {
        fan_out(
            &self.sessions,
            &self.cache,
            self.settings.query.max_workers,
            per_target_timeout,
            operation,
        )
        .await
    }

    /// Run `operation` against a named subset of the connected targets.
    ///
    /// Names without a live session are logged and skipped; an empty
    /// surviving subset is a `Configuration` error.
    pub async fn dispatch_to<T, F, Fut>(
        &self,
        names: &[&str],
        operation: F,
    ) -> Result<HashMap<String, QueryOutcome<T>>, ApplianceError>
    where
        F: Fn(SharedSession) -> Fut + Clone + Send + 'static,
        Fut: Future<Output = Result<T, ApplianceError>> + Send + 'static,
        T: Send + 'static,
    {
        let mut subset: HashMap<String, SharedSession> = HashMap::new();
        for name in names {
            match self.sessions.get(*name) {
                Some(session) => {
                    subset.insert((*name).to_string(), session.clone());
                }
                None => {
                    logger::log_warn(&format!(
                        "dispatch_to: no connected session named '{}', skipping",
                        name
                    ));
                }
            }
        }

        fan_out(
            &subset,
            &self.cache,
            self.settings.query.max_workers,
            DEFAULT_DISPATCH_TIMEOUT,
            operation,
        )
        .await
    }

    /// Execute one operational command across the fleet.
    ///
    /// Convenience wrapper over [`dispatch`](Self::dispatch) for the common
    /// case of running the same command everywhere.
    pub async fn run_command(
        &self,
        cmd: &str,
    ) -> Result<HashMap<String, QueryOutcome<Value>>, ApplianceError> {
        let cmd = cmd.to_string();
        self.dispatch(move |session: SharedSession| {
            let cmd = cmd.clone();
            async move { session.execute_query(&cmd).await }
        })
        .await
    }

    /// Re-check every connected target's credential and API reachability.
    ///
    /// Builds on the dispatcher, so a hung or panicking target cannot block
    /// validation of the rest.
    pub async fn validate_all(
        &self,
    ) -> Result<HashMap<String, TargetValidation>, ApplianceError> {
        let results = self
            .dispatch(|session: SharedSession| async move {
                if !session.test_authentication().await {
                    return Err(ApplianceError::Authentication(
                        "Credential no longer accepted".to_string(),
                    ));
                }
                session.execute_query(SYSTEM_INFO_CMD).await
            })
            .await?;

        Ok(results
            .into_iter()
            .map(|(target_id, outcome)| {
                let validation = TargetValidation {
                    target_id: target_id.clone(),
                    hostname: outcome.hostname,
                    valid: outcome.success,
                    errors: outcome.error.into_iter().collect(),
                };
                (target_id, validation)
            })
            .collect())
    }

    /// Snapshot of the configured inventory, disabled targets included.
    pub fn summary(&self) -> FleetSummary {
        let targets: BTreeMap<String, TargetSummary> = self
            .settings
            .targets
            .iter()
            .map(|(name, t)| {
                let summary = TargetSummary {
                    host: t.host.clone(),
                    port: t.port,
                    description: t.description.clone(),
                    location: t.location.clone(),
                    verify_ssl: t.verify_ssl,
                    timeout: t.timeout,
                    enabled: t.enabled,
                    connected: self.sessions.contains_key(name),
                };
                (name.clone(), summary)
            })
            .collect();

        FleetSummary {
            total: targets.len(),
            enabled: targets.values().filter(|t| t.enabled).count(),
            disabled: targets.values().filter(|t| !t.enabled).count(),
            connected: self.sessions.len(),
            targets,
        }
    }

    /// Assemble a registry from already-built sessions. Tests use this to
    /// inject mock sessions without any network.
    #[cfg(test)]
    pub(crate) fn from_parts(
        settings: Settings,
        sessions: HashMap<String, SharedSession>,
        cache: HostnameCache,
    ) -> Self {
        Self {
            settings,
            sessions,
            cache,
        }
    }
}
