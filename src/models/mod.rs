//! Domain model types for pa-query
//!
//! SECURITY: Credential types implement Drop to clear sensitive data.

pub mod api_key;

pub use api_key::ApiKey;
