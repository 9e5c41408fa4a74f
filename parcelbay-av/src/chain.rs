//! Tiered verification chain
//!
//! Orchestrates the fallback protocol: Primary → Secondary → static rules.
//! The first tier to produce a non-error outcome wins entirely; tiers are
//! never run in parallel and results are never merged. Every tier gets its
//! own independent timeout: a slow primary does not shorten the
//! secondary's allowance. The static tier cannot fail, so `verify` is
//! total for any well-formed address.
//!
//! The chain owns no per-call state and is safe to share across
//! concurrent verification calls.

use crate::config::VerifierConfig;
use crate::providers::{SmartyClient, UspsClient};
use crate::static_validator;
use crate::types::{Address, ProviderAdapter, ProviderError, ProviderTier, VerificationOutcome};
use std::sync::Arc;
use std::time::Duration;

/// Chain behavior settings
#[derive(Debug, Clone)]
pub struct ChainConfig {
    /// Timeout for the primary tier
    pub primary_timeout: Duration,
    /// Timeout for the secondary tier (independent of primary's)
    pub secondary_timeout: Duration,
    /// Retry a tier once on a transient error before falling through.
    /// Off by default: a single transient failure falls through
    /// immediately, bounding worst-case latency.
    pub retry_transient: bool,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            primary_timeout: Duration::from_secs(5),
            secondary_timeout: Duration::from_secs(5),
            retry_transient: false,
        }
    }
}

/// Tiered address verification chain
pub struct VerificationChain {
    primary: Option<Arc<dyn ProviderAdapter>>,
    secondary: Option<Arc<dyn ProviderAdapter>>,
    config: ChainConfig,
}

impl VerificationChain {
    /// Build a chain from explicit adapters
    ///
    /// `None` for a tier means "unconfigured": the chain skips straight
    /// past it rather than treating it as an error.
    pub fn new(
        primary: Option<Arc<dyn ProviderAdapter>>,
        secondary: Option<Arc<dyn ProviderAdapter>>,
        config: ChainConfig,
    ) -> Self {
        Self {
            primary,
            secondary,
            config,
        }
    }

    /// Build a chain from resolved configuration
    ///
    /// A tier whose credentials are absent, or whose client fails to
    /// construct, is left unconfigured with a log line.
    pub fn from_config(config: &VerifierConfig) -> Self {
        let primary: Option<Arc<dyn ProviderAdapter>> = match &config.usps {
            Some(usps) => match UspsClient::new(usps.clone()) {
                Ok(client) => {
                    tracing::info!("USPS client initialized (primary tier)");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::warn!("USPS client not initialized: {}. Primary tier disabled.", e);
                    None
                }
            },
            None => {
                tracing::info!("USPS credentials not configured, primary tier disabled");
                None
            }
        };

        let secondary: Option<Arc<dyn ProviderAdapter>> = match &config.smarty {
            Some(smarty) => match SmartyClient::new(smarty.clone()) {
                Ok(client) => {
                    tracing::info!("Smarty client initialized (secondary tier)");
                    Some(Arc::new(client))
                }
                Err(e) => {
                    tracing::warn!(
                        "Smarty client not initialized: {}. Secondary tier disabled.",
                        e
                    );
                    None
                }
            },
            None => {
                tracing::info!("Smarty credentials not configured, secondary tier disabled");
                None
            }
        };

        Self::new(primary, secondary, config.chain.clone())
    }

    /// Verify a single address through the tier chain
    ///
    /// Total for well-formed input: provider errors and timeouts fall
    /// through tier by tier until the static rules produce the
    /// unconditional baseline outcome. The returned outcome records which
    /// tier produced it.
    pub async fn verify(&self, address: &Address) -> VerificationOutcome {
        if let Some(primary) = &self.primary {
            if let Some(outcome) = self
                .try_tier(
                    ProviderTier::Primary,
                    primary.as_ref(),
                    self.config.primary_timeout,
                    address,
                )
                .await
            {
                return outcome;
            }
        } else {
            tracing::debug!("Primary tier unconfigured, skipping");
        }

        if let Some(secondary) = &self.secondary {
            if let Some(outcome) = self
                .try_tier(
                    ProviderTier::Secondary,
                    secondary.as_ref(),
                    self.config.secondary_timeout,
                    address,
                )
                .await
            {
                return outcome;
            }
        } else {
            tracing::debug!("Secondary tier unconfigured, skipping");
        }

        tracing::debug!("All provider tiers exhausted, using static rules");
        static_validator::validate(address)
    }

    /// Run one tier under its timeout; `None` means fall through
    async fn try_tier(
        &self,
        tier: ProviderTier,
        adapter: &dyn ProviderAdapter,
        tier_timeout: Duration,
        address: &Address,
    ) -> Option<VerificationOutcome> {
        let attempts = if self.config.retry_transient { 2 } else { 1 };

        for attempt in 1..=attempts {
            match tokio::time::timeout(tier_timeout, adapter.verify(address)).await {
                Ok(Ok(outcome)) => {
                    tracing::info!(
                        provider = adapter.name(),
                        tier = %tier,
                        status = ?outcome.status,
                        "Provider tier produced an outcome"
                    );
                    return Some(VerificationOutcome::from_provider(tier, outcome));
                }
                Ok(Err(ProviderError::InvalidInput(reason))) => {
                    // Input will not improve on retry
                    tracing::debug!(
                        provider = adapter.name(),
                        reason = %reason,
                        "Provider rejected input locally, falling through"
                    );
                    return None;
                }
                Ok(Err(ProviderError::Permanent(reason))) => {
                    // Operator-actionable; retrying cannot help
                    tracing::error!(
                        provider = adapter.name(),
                        reason = %reason,
                        "Provider credential/config failure, falling through"
                    );
                    return None;
                }
                Ok(Err(ProviderError::Transient(reason))) => {
                    tracing::warn!(
                        provider = adapter.name(),
                        attempt,
                        reason = %reason,
                        "Transient provider error"
                    );
                }
                Err(_) => {
                    tracing::warn!(
                        provider = adapter.name(),
                        attempt,
                        timeout_ms = tier_timeout.as_millis() as u64,
                        "Provider tier timed out"
                    );
                }
            }
        }

        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_matches_documented_defaults() {
        let config = ChainConfig::default();
        assert_eq!(config.primary_timeout, Duration::from_secs(5));
        assert_eq!(config.secondary_timeout, Duration::from_secs(5));
        assert!(!config.retry_transient);
    }

    #[tokio::test]
    async fn test_empty_chain_uses_static_rules() {
        let chain = VerificationChain::new(None, None, ChainConfig::default());
        let address = Address {
            name: "Sam Okafor".to_string(),
            company: None,
            street1: "600 W Chicago Ave".to_string(),
            street2: None,
            city: "Chicago".to_string(),
            state: "IL".to_string(),
            postal_code: "60654".to_string(),
            country: "US".to_string(),
        };

        let outcome = chain.verify(&address).await;
        assert_eq!(outcome.provider, ProviderTier::StaticFallback);
        assert_eq!(outcome, static_validator::validate(&address));
    }
}
