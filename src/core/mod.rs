//! Core fleet query functionality

pub mod dispatcher;
pub mod hostname_cache;
pub mod http_session;
pub mod registry;
pub mod session;

#[cfg(test)]
pub mod mock_session;

pub use dispatcher::QueryOutcome;
pub use hostname_cache::{CacheEntry, HostnameCache};
pub use http_session::HttpApplianceSession;
pub use registry::{FleetRegistry, FleetSelection, FleetSummary, TargetSummary, TargetValidation};
pub use session::{ApplianceSession, SharedSession, SYSTEM_INFO_CMD};
