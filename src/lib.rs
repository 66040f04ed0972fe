//! Read-only fleet statistics query core for Palo Alto appliances
//!
//! Connects to one or many appliances over their authenticated HTTPS API and
//! runs read-only operational commands against them, concurrently and with
//! per-target fault isolation. Each target answers with a uniform result
//! envelope labeled with the appliance's self-reported hostname, resolved
//! through a disk-persisted TTL cache.
//!
//! ```no_run
//! use pa_query::{FleetRegistry, FleetSelection, Settings};
//!
//! # async fn run() -> Result<(), pa_query::ApplianceError> {
//! let settings = Settings::load("config/settings.yaml")?;
//! let fleet = FleetRegistry::connect(settings, FleetSelection::All).await?;
//!
//! let results = fleet.run_command("show session info").await?;
//! for (target, outcome) in &results {
//!     if outcome.success {
//!         println!("{} ({}): ok", target, outcome.hostname);
//!     } else {
//!         eprintln!("{}: {}", target, outcome.error.as_deref().unwrap_or("?"));
//!     }
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod constants;
pub mod core;
pub mod logger;
pub mod models;
pub mod utils;

pub use config::{CacheSettings, QuerySettings, Settings, TargetConfig};
pub use core::{
    ApplianceSession, FleetRegistry, FleetSelection, FleetSummary, HostnameCache,
    HttpApplianceSession, QueryOutcome, SharedSession, TargetValidation,
};
pub use models::ApiKey;
pub use utils::{ApplianceError, RetryConfig};
