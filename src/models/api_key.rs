//! Credential model types
//!
//! SECURITY: `ApiKey` implements Drop to clear sensitive data and never
//! reveals its contents through Debug or Display.

use std::fmt;

use serde::Deserialize;

use crate::utils::ApplianceError;

/// Appliance API key that zeros memory on drop
///
/// SECURITY: This type never implements Display or Debug in a way that
/// reveals the key material.
#[derive(Deserialize)]
#[serde(try_from = "String")]
pub struct ApiKey(String);

impl Clone for ApiKey {
    fn clone(&self) -> Self {
        ApiKey(self.0.clone())
    }
}

impl ApiKey {
    /// Create a new API key after validation
    pub fn new(key: impl Into<String>) -> Result<Self, ApplianceError> {
        let key = key.into();

        if key.trim().is_empty() {
            return Err(ApplianceError::Configuration(
                "API key cannot be empty".to_string(),
            ));
        }

        Ok(ApiKey(key))
    }

    /// Get the key as a string slice
    ///
    /// Use this sparingly and only when building the authenticated request.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for ApiKey {
    type Error = ApplianceError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        ApiKey::new(value)
    }
}

impl Drop for ApiKey {
    fn drop(&mut self) {
        // Zero the memory
        // SAFETY: We own this String and are zeroing it before drop
        unsafe {
            let bytes = self.0.as_bytes_mut();
            for byte in bytes {
                std::ptr::write_volatile(byte, 0);
            }
        }
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // SECURITY: Never reveal the key content
        write!(f, "ApiKey(*** {} bytes ***)", self.0.len())
    }
}
