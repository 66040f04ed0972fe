//! # Application-Wide Constants
//!
//! Centralized default values used throughout pa-query. Most of these can be
//! overridden per target or globally in the configuration file; the constants
//! are the fallbacks applied when a setting is absent.

use std::time::Duration;

// ============================================================================
// Network Defaults
// ============================================================================

/// Default HTTPS port for the appliance API
pub const DEFAULT_API_PORT: u16 = 443;

/// Default per-request timeout (seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// Retry Policy
// ============================================================================

/// Default maximum retry attempts for transient transport failures
/// (not counting the initial attempt)
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default fixed delay between retry attempts (seconds)
pub const DEFAULT_RETRY_DELAY_SECS: u64 = 5;

// ============================================================================
// Fan-Out Dispatch
// ============================================================================

/// Default worker budget for concurrent multi-target dispatch
///
/// Five workers keeps fleet queries fast for typical deployments without
/// hammering a management network when every target retries at once.
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Default per-target operation timeout for dispatch calls
pub const DEFAULT_DISPATCH_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// Hostname Cache
// ============================================================================

/// Default time-to-live for cached hostnames (hours)
pub const DEFAULT_CACHE_TTL_HOURS: i64 = 6;

/// Default on-disk location of the hostname cache store
pub const DEFAULT_CACHE_FILE: &str = "config/hostname_cache.json";

// ============================================================================
// Logging
// ============================================================================

/// Log file size cap before rotation (bytes)
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;
