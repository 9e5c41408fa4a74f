//! USPS Addresses API client (primary verification tier)
//!
//! OAuth client-credentials flow: the access token is acquired lazily,
//! cached with its expiry, and re-acquired transparently on a 401 with at
//! most one retry of the original lookup. The cache mutex is held across
//! the refresh, so concurrent callers wait on a single refresh instead of
//! stampeding the token endpoint; the cache slot is written in one
//! assignment after a successful fetch, so a cancelled call can never
//! leave it half-updated.

use crate::providers::{reject_unroutable, HTTP_TIMEOUT_SECS, USER_AGENT};
use crate::types::{
    Address, AddressFlag, ProviderAdapter, ProviderError, ProviderOutcome, ProviderStatus,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

const DEFAULT_ENDPOINT: &str = "https://apis.usps.com";
/// Tokens are refreshed this long before their reported expiry
const TOKEN_REFRESH_SKEW_SECS: u64 = 60;

/// USPS tier configuration
#[derive(Debug, Clone)]
pub struct UspsConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// API base URL (overridable for tests)
    pub endpoint: String,
}

impl UspsConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
        }
    }
}

// ============================================================================
// Wire shapes
// ============================================================================

#[derive(Debug, Serialize)]
struct TokenRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    /// Validity window in seconds
    expires_in: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct UspsAddressResponse {
    address: UspsAddress,
    #[serde(rename = "additionalInfo")]
    additional_info: Option<UspsAdditionalInfo>,
}

#[derive(Debug, Clone, Deserialize)]
struct UspsAddress {
    #[serde(rename = "streetAddress")]
    street_address: String,
    #[serde(rename = "secondaryAddress")]
    secondary_address: Option<String>,
    city: String,
    state: String,
    #[serde(rename = "ZIPCode")]
    zip_code: String,
    #[serde(rename = "ZIPPlus4")]
    zip_plus4: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct UspsAdditionalInfo {
    /// Delivery-point validation: "Y" confirmed, "D" missing secondary,
    /// "S" secondary ignored, "N" not confirmed
    #[serde(rename = "DPVConfirmation")]
    dpv_confirmation: Option<String>,
    /// "Y" when the delivery point is a business
    business: Option<String>,
    /// "Y" when the delivery point is vacant
    vacant: Option<String>,
}

// ============================================================================
// Client
// ============================================================================

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: Instant,
}

/// USPS Addresses API client
pub struct UspsClient {
    http_client: reqwest::Client,
    config: UspsConfig,
    token_cache: Mutex<Option<CachedToken>>,
}

impl UspsClient {
    pub fn new(config: UspsConfig) -> Result<Self, ProviderError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(HTTP_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProviderError::Permanent(format!("HTTP client build failed: {}", e)))?;

        Ok(Self {
            http_client,
            config,
            token_cache: Mutex::new(None),
        })
    }

    /// Return a valid access token, refreshing if the cache is empty or stale
    ///
    /// Single-flight: the lock is held across the refresh, so concurrent
    /// callers either reuse the cached token or wait on the one refresh.
    async fn access_token(&self) -> Result<String, ProviderError> {
        let mut slot = self.token_cache.lock().await;

        if let Some(cached) = slot.as_ref() {
            if cached.expires_at > Instant::now() {
                return Ok(cached.token.clone());
            }
            tracing::debug!("USPS token expired, refreshing");
        }

        let fresh = self.fetch_token().await?;
        let token = fresh.token.clone();
        *slot = Some(fresh);
        Ok(token)
    }

    /// Drop the cached token so the next call re-acquires
    async fn invalidate_token(&self) {
        *self.token_cache.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<CachedToken, ProviderError> {
        let url = format!("{}/oauth2/v3/token", self.config.endpoint);
        let request = TokenRequest {
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            grant_type: "client_credentials",
        };

        tracing::debug!("Acquiring USPS access token");

        let response = self
            .http_client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("token request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ProviderError::Permanent(
                "USPS rejected client credentials".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!(
                "token endpoint returned {}: {}",
                status, body
            )));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("token parse failed: {}", e)))?;

        let validity = token
            .expires_in
            .saturating_sub(TOKEN_REFRESH_SKEW_SECS)
            .max(1);

        tracing::info!(expires_in = token.expires_in, "USPS access token acquired");

        Ok(CachedToken {
            token: token.access_token,
            expires_at: Instant::now() + Duration::from_secs(validity),
        })
    }

    async fn lookup(
        &self,
        address: &Address,
        token: &str,
    ) -> Result<reqwest::Response, ProviderError> {
        let url = format!("{}/addresses/v3/address", self.config.endpoint);

        let mut params = vec![
            ("streetAddress", address.street1.trim().to_string()),
            ("city", address.city.trim().to_string()),
            ("state", address.state.trim().to_uppercase()),
            ("ZIPCode", address.postal_code.trim().to_string()),
        ];
        if let Some(street2) = &address.street2 {
            if !street2.trim().is_empty() {
                params.push(("secondaryAddress", street2.trim().to_string()));
            }
        }

        self.http_client
            .get(&url)
            .bearer_auth(token)
            .query(&params)
            .send()
            .await
            .map_err(|e| ProviderError::Transient(format!("lookup request failed: {}", e)))
    }

    /// Map a non-401 lookup response into the normalized outcome
    async fn map_response(
        &self,
        address: &Address,
        response: reqwest::Response,
    ) -> Result<ProviderOutcome, ProviderError> {
        let status = response.status();

        // USPS signals "no deliverable match" as a 404, not a failure
        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(street = %address.street1, "USPS found no match");
            return Ok(ProviderOutcome {
                status: ProviderStatus::Unverifiable,
                corrected: None,
                flags: BTreeSet::new(),
                message: Some("USPS found no deliverable match for this address.".to_string()),
            });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Transient(format!(
                "lookup returned {}: {}",
                status, body
            )));
        }

        let parsed: UspsAddressResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Transient(format!("lookup parse failed: {}", e)))?;

        Ok(normalize(address, parsed))
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for UspsClient {
    fn name(&self) -> &'static str {
        "usps"
    }

    async fn verify(&self, address: &Address) -> Result<ProviderOutcome, ProviderError> {
        reject_unroutable(address)?;

        let token = self.access_token().await?;
        let response = self.lookup(address, &token).await?;

        // Stale/revoked token: re-acquire once and retry the original request
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            tracing::warn!("USPS lookup returned 401, refreshing token and retrying once");
            self.invalidate_token().await;
            let token = self.access_token().await?;
            let retry = self.lookup(address, &token).await?;
            if retry.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(ProviderError::Permanent(
                    "USPS rejected a freshly acquired token".to_string(),
                ));
            }
            return self.map_response(address, retry).await;
        }

        self.map_response(address, response).await
    }
}

// ============================================================================
// Normalization
// ============================================================================

/// Map the USPS response shape into the canonical outcome
fn normalize(input: &Address, response: UspsAddressResponse) -> ProviderOutcome {
    let usps = &response.address;

    let zip = match &usps.zip_plus4 {
        Some(plus4) if !plus4.is_empty() => format!("{}-{}", usps.zip_code, plus4),
        _ => usps.zip_code.clone(),
    };

    let standardized = Address {
        name: input.name.clone(),
        company: input.company.clone(),
        street1: usps.street_address.clone(),
        street2: usps.secondary_address.clone().filter(|s| !s.is_empty()),
        city: usps.city.clone(),
        state: usps.state.clone(),
        postal_code: zip,
        country: "US".to_string(),
    };

    let mut flags = BTreeSet::new();
    let mut dpv_confirmed = true;

    if let Some(info) = &response.additional_info {
        if info.vacant.as_deref() == Some("Y") {
            flags.insert(AddressFlag::Vacant);
        }
        if info.business.as_deref() == Some("Y") {
            flags.insert(AddressFlag::Commercial);
        }
        match info.dpv_confirmation.as_deref() {
            Some("D") => {
                flags.insert(AddressFlag::UnitMissing);
            }
            Some("N") => dpv_confirmed = false,
            _ => {}
        }
    }

    if !dpv_confirmed {
        return ProviderOutcome {
            status: ProviderStatus::Unverifiable,
            corrected: Some(standardized),
            flags,
            message: Some("USPS could not confirm this delivery point.".to_string()),
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
        "USPS verification completed"
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

    norm(&input.street1) != norm(&standardized.street1)
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
            street1: "600 w chicago ave".to_string(),
            street2: None,
            city: "Chicago".to_string(),
            state: "IL".to_string(),
            postal_code: "60654".to_string(),
            country: "US".to_string(),
        }
    }

    fn response(street: &str, plus4: Option<&str>, info: Option<UspsAdditionalInfo>) -> UspsAddressResponse {
        UspsAddressResponse {
            address: UspsAddress {
                street_address: street.to_string(),
                secondary_address: None,
                city: "CHICAGO".to_string(),
                state: "IL".to_string(),
                zip_code: "60654".to_string(),
                zip_plus4: plus4.map(String::from),
            },
            additional_info: info,
        }
    }

    #[test]
    fn test_exact_match_is_verified() {
        let outcome = normalize(&input(), response("600 W CHICAGO AVE", None, None));
        assert_eq!(outcome.status, ProviderStatus::Verified);
        assert!(outcome.corrected.is_none());
    }

    #[test]
    fn test_zip_plus4_extension_is_correction() {
        let outcome = normalize(&input(), response("600 W CHICAGO AVE", Some("7601"), None));
        assert_eq!(outcome.status, ProviderStatus::Corrected);
        assert_eq!(outcome.corrected.unwrap().postal_code, "60654-7601");
    }

    #[test]
    fn test_dpv_not_confirmed_is_unverifiable() {
        let info = UspsAdditionalInfo {
            dpv_confirmation: Some("N".to_string()),
            business: None,
            vacant: None,
        };
        let outcome = normalize(&input(), response("600 W CHICAGO AVE", None, Some(info)));
        assert_eq!(outcome.status, ProviderStatus::Unverifiable);
        assert!(outcome.message.is_some());
    }

    #[test]
    fn test_dpv_signals_map_to_flags() {
        let info = UspsAdditionalInfo {
            dpv_confirmation: Some("D".to_string()),
            business: Some("Y".to_string()),
            vacant: Some("Y".to_string()),
        };
        let outcome = normalize(&input(), response("600 W CHICAGO AVE", None, Some(info)));
        assert!(outcome.flags.contains(&AddressFlag::UnitMissing));
        assert!(outcome.flags.contains(&AddressFlag::Commercial));
        assert!(outcome.flags.contains(&AddressFlag::Vacant));
    }
}
