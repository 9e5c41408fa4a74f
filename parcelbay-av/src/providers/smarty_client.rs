//! Smarty US Street Address API client (secondary verification tier)
//!
//! Static credential pair passed as query parameters, no token lifecycle.
//! Smarty answers with a JSON array of candidates; an empty array is the
//! provider's no-match signal, not an error. DPV analysis codes are mapped
//! into the shared flag vocabulary; signals without a counterpart are
//! dropped.

use crate::providers::{reject_unroutable, HTTP_TIMEOUT_SECS, USER_AGENT};
use crate::types::{
    Address, AddressFlag, ProviderAdapter, ProviderError, ProviderOutcome, ProviderStatus,
};
use serde::Deserialize;
use std::collections::BTreeSet;
use std::time::Duration;

const DEFAULT_ENDPOINT: &str = "https://us-street.api.smarty.com";

/// Smarty tier configuration
#[derive(Debug, Clone)]
pub struct SmartyConfig {
    /// Auth ID credential
    pub auth_id: String,
    /// Auth token credential
    pub auth_token: String,
    /// API base URL (overridable for tests)
    pub endpoint: String,
}

impl SmartyConfig {
    pub fn new(auth_id: impl Into<String>, auth_token: impl Into<String>) -> Self {
        Self {
            auth_id: auth_id.into(),
            auth_token: auth_token.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
struct SmartyCandidate {
    delivery_line_1: String,
    delivery_line_2: Option<String>,
    components: SmartyComponents,
    metadata: Option<SmartyMetadata>,
    analysis: Option<SmartyAnalysis>,
}

#[derive(Debug, Clone, Deserialize)]
struct SmartyComponents {
    city_name: Option<String>,
    state_abbreviation: Option<String>,
    zipcode: Option<String>,
    plus4_code: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SmartyMetadata {
    /// Residential delivery indicator: "Residential" or "Commercial"
    rdi: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct SmartyAnalysis {
    /// "Y" confirmed, "N" not confirmed, "S"/"D" partial confirmations
    dpv_match_code: Option<String>,
    /// "Y" when the delivery point is vacant
    dpv_vacant: Option<String>,
    /// Concatenated two-letter footnotes; "N1" marks a missing secondary
    dpv_footnotes: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

/// Smarty US Street Address API client
pub struct SmartyClient {
    http_client: reqwest::Client,
    config: SmartyConfig,
}

impl SmartyClient {
    pub fn new(config: SmartyConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            config,
        })
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for SmartyClient {
    fn name(&self) -> &'static str {
        "smarty"
    }

    async fn verify(&self, address: &Address) -> Result<ProviderOutcome, ProviderError> {
        reject_unroutable(address)?;

        let url = format!("{}/street-address", self.config.endpoint);
        let street = match &address.street2 {
            Some(s2) if !s2.trim().is_empty() => {
                format!("{} {}", address.street1.trim(), s2.trim())
            }
            _ => address.street1.trim().to_string(),
        };

        let params = [
            ("auth-id", self.config.auth_id.as_str()),
            ("auth-token", self.config.auth_token.as_str()),
            ("street", street.as_str()),
            ("city", address.city.trim()),
            ("state", address.state.trim()),
            ("zipcode", address.postal_code.trim()),
            ("candidates", "1"),
        ];

        tracing::debug!(street = %street, "Querying Smarty street-address API");

        let response = self
            .http_client
            .get(&url)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("lookup request failed: {}", e)))?;

        let status = response.status();

        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::PAYMENT_REQUIRED
        {
            return Err(ProviderError::Permanent(format!(
                "Smarty rejected credentials ({})",
                status
            )));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!(
                "lookup returned {}: {}",
                status, body
            )));
        }

        let candidates: Vec<SmartyCandidate> = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("lookup parse failed: {}", e)))?;

        // Empty candidate array is Smarty's no-match signal
        let Some(candidate) = candidates.into_iter().next() else {
            tracing::debug!(street = %address.street1, "Smarty found no match");
            return Ok(ProviderOutcome {
                status: ProviderStatus::Unverifiable,
                corrected: None,
                flags: BTreeSet::new(),
                message: Some("Smarty found no deliverable match for this address.".to_string()),
            });
        };

        Ok(normalize(address, candidate))
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Map a Smarty candidate into the canonical outcome
fn normalize(input: &Address, candidate: SmartyCandidate) -> ProviderOutcome {
    let components = &candidate.components;

    let zip = match (&components.zipcode, &components.plus4_code) {
        (Some(zip), Some(plus4)) if !plus4.is_empty() => format!("{}-{}", zip, plus4),
        (Some(zip), _) => zip.clone(),
        (None, _) => input.postal_code.trim().to_string(),
    };

    let standardized = Address {
        name: input.name.clone(),
        company: input.company.clone(),
        street1: candidate.delivery_line_1.clone(),
        street2: candidate.delivery_line_2.clone().filter(|s| !s.is_empty()),
        city: components
            .city_name
            .clone()
            .unwrap_or_else(|| input.city.trim().to_string()),
        state: components
            .state_abbreviation
            .clone()
            .unwrap_or_else(|| input.state.trim().to_uppercase()),
        postal_code: zip,
        country: "US".to_string(),
    };

    let mut flags = BTreeSet::new();
    let mut dpv_confirmed = true;

    if let Some(analysis) = &candidate.analysis {
        match analysis.dpv_match_code.as_deref() {
            Some("N") => dpv_confirmed = false,
            Some("D") => {
                flags.insert(AddressFlag::UnitMissing);
            }
            _ => {}
        }
        if analysis.dpv_vacant.as_deref() == Some("Y") {
            flags.insert(AddressFlag::Vacant);
        }
        if let Some(footnotes) = &analysis.dpv_footnotes {
            if footnotes.contains("N1") {
                flags.insert(AddressFlag::UnitMissing);
            }
        }
    }

    if let Some(metadata) = &candidate.metadata {
        if metadata.rdi.as_deref() == Some("Commercial") {
            flags.insert(AddressFlag::Commercial);
        }
    }

    if !dpv_confirmed {
        return ProviderOutcome {
            status: ProviderStatus::Unverifiable,
            corrected: Some(standardized),
            flags,
            message: Some("Smarty could not confirm this delivery point.".to_string()),
        };
    }

    let status = if address_differs(input, &standardized) {
        ProviderStatus::Corrected
    } else {
        ProviderStatus::Verified
    };

    tracing::info!(
        street = %standardized.street1,
        city = %standardized.city,
        status = ?status,
        "Smarty verification completed"
    );

    ProviderOutcome {
        status,
        corrected: (status == ProviderStatus::Corrected).then_some(standardized),
        flags,
        message: None,
    }
}

/// Whether standardization changed anything material
fn address_differs(input: &Address, standardized: &Address) -> bool {
    fn norm(s: &str) -> String {
        s.trim().to_uppercase()
    }

    let input_street = match &input.street2 {
        Some(s2) if !s2.trim().is_empty() => format!("{} {}", input.street1.trim(), s2.trim()),
        _ => input.street1.trim().to_string(),
    };
    let standardized_street = match &standardized.street2 {
        Some(s2) => format!("{} {}", standardized.street1, s2),
        None => standardized.street1.clone(),
    };

    norm(&input_street) != norm(&standardized_street)
        || norm(&input.city) != norm(&standardized.city)
        || norm(&input.state) != norm(&standardized.state)
        || norm(&input.postal_code) != norm(&standardized.postal_code)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> Address {
        Address {
            name: "Dana Ellis".to_string(),
            company: None,
            street1: "3785 Las Vegas Blvd S".to_string(),
            street2: None,
            city: "Las Vegas".to_string(),
            state: "NV".to_string(),
            postal_code: "89109".to_string(),
            country: "US".to_string(),
        }
    }

    fn candidate(
        line1: &str,
        analysis: Option<SmartyAnalysis>,
        metadata: Option<SmartyMetadata>,
    ) -> SmartyCandidate {
        SmartyCandidate {
            delivery_line_1: line1.to_string(),
            delivery_line_2: None,
            components: SmartyComponents {
                city_name: Some("Las Vegas".to_string()),
                state_abbreviation: Some("NV".to_string()),
                zipcode: Some("89109".to_string()),
                plus4_code: None,
            },
            metadata,
            analysis,
        }
    }

    #[test]
    fn test_exact_match_is_verified() {
        let outcome = normalize(&input(), candidate("3785 Las Vegas Blvd S", None, None));
        assert_eq!(outcome.status, ProviderStatus::Verified);
        assert!(outcome.corrected.is_none());
    }

    #[test]
    fn test_standardized_street_is_correction() {
        let outcome = normalize(
            &input(),
            candidate("3785 S Las Vegas Blvd", None, None),
        );
        assert_eq!(outcome.status, ProviderStatus::Corrected);
        assert_eq!(
            outcome.corrected.unwrap().street1,
            "3785 S Las Vegas Blvd"
        );
    }

    #[test]
    fn test_dpv_vacant_and_rdi_map_to_flags() {
        let outcome = normalize(
            &input(),
            candidate(
                "3785 Las Vegas Blvd S",
                Some(SmartyAnalysis {
                    dpv_match_code: Some("Y".to_string()),
                    dpv_vacant: Some("Y".to_string()),
                    dpv_footnotes: Some("AABBN1".to_string()),
                }),
                Some(SmartyMetadata {
                    rdi: Some("Commercial".to_string()),
                }),
            ),
        );
        assert!(outcome.flags.contains(&AddressFlag::Vacant));
        assert!(outcome.flags.contains(&AddressFlag::Commercial));
        assert!(outcome.flags.contains(&AddressFlag::UnitMissing));
    }

    #[test]
    fn test_dpv_no_match_is_unverifiable() {
        let outcome = normalize(
            &input(),
            candidate(
                "3785 Las Vegas Blvd S",
                Some(SmartyAnalysis {
                    dpv_match_code: Some("N".to_string()),
                    dpv_vacant: None,
                    dpv_footnotes: None,
                }),
                None,
            ),
        );
        assert_eq!(outcome.status, ProviderStatus::Unverifiable);
    }
}
