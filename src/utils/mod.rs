//! # Utilities Module
//!
//! Cross-cutting concerns shared throughout the crate.
//!
//! ## Modules
//!
//! - [`errors`]: Typed error hierarchy using `thiserror` for domain-specific errors
//! - [`retry`]: Fixed-delay retry logic for transient network failures
//!
//! ## Design Notes
//!
//! Error types live here to avoid circular dependencies between the `core`
//! and `config` modules. Retryability is decided by error variant
//! (`ApplianceError::is_transient`), never by string matching: transport
//! failures are retried with a fixed inter-attempt delay, while protocol and
//! authentication failures fail immediately.

pub mod errors;
pub mod retry;

pub use errors::ApplianceError;
pub use retry::{retry_with_fixed_delay, RetryConfig};
