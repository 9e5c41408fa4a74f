//! External verification provider adapters
//!
//! One module per provider. Each adapter owns its HTTP client and wire
//! shapes, and normalizes everything into [`crate::types::ProviderOutcome`]
//! before returning; no provider-specific field crosses this boundary.

pub mod smarty_client;
pub mod usps_client;

pub use smarty_client::{SmartyClient, SmartyConfig};
pub use usps_client::{UspsClient, UspsConfig};

use crate::types::{Address, ProviderError};

/// User agent sent on all provider requests
pub(crate) const USER_AGENT: &str = "Parcelbay/0.1.0 (https://github.com/parcelbay/parcelbay)";

/// Default per-request guard timeout on the HTTP client
///
/// The chain enforces the real per-tier timeout; this is a backstop so a
/// wedged connection cannot outlive the caller by much.
pub(crate) const HTTP_TIMEOUT_SECS: u64 = 30;

/// Reject input a provider could not route, before any network call
///
/// Quota-limited requests are never spent on an address the provider would
/// bounce anyway.
pub(crate) fn reject_unroutable(address: &Address) -> Result<(), ProviderError> {
    if address.is_provider_ready() {
        Ok(())
    } else {
        Err(ProviderError::InvalidInput(
            "address needs a street line plus a postal code or city/state".to_string(),
        ))
    }
}
