//! Core Types and Trait Definitions for Parcelbay-AV
//!
//! Defines the shared vocabulary of the verification pipeline:
//! - **Address**: the input record, one per verification call
//! - **ProviderAdapter**: the capability each external verification
//!   provider implements (one tier of the fallback chain)
//! - **VerificationOutcome**: the single canonical result shape every
//!   tier normalizes into before anything crosses a module boundary
//!
//! Adapters produce a [`ProviderOutcome`] whose status deliberately has no
//! `Invalid` variant: providers report "no match" rather than structural
//! invalidity, which only the local static rules can diagnose.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use thiserror::Error;

// ============================================================================
// Address
// ============================================================================

/// A postal address as it arrives from a shipment record
///
/// Free-text until validated; `country` defaults to `US` when absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    /// Recipient or sender name
    #[serde(default)]
    pub name: String,
    /// Company name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub company: Option<String>,
    /// Primary street line
    pub street1: String,
    /// Secondary street line (apartment, suite, unit)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    /// City name
    pub city: String,
    /// State or province code
    pub state: String,
    /// Postal code
    pub postal_code: String,
    /// ISO country code
    #[serde(default = "default_country")]
    pub country: String,
}

fn default_country() -> String {
    "US".to_string()
}

impl Address {
    /// Whether this address carries enough data for a provider lookup
    ///
    /// Providers need a street line plus either a postal code or a
    /// city/state pair to route the query. Anything less is rejected
    /// locally so a quota-limited remote request is never wasted.
    pub fn is_provider_ready(&self) -> bool {
        if self.street1.trim().is_empty() {
            return false;
        }
        !self.postal_code.trim().is_empty()
            || (!self.city.trim().is_empty() && !self.state.trim().is_empty())
    }
}

/// Which address on a shipment record is being verified
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AddressSlot {
    /// Ship From address
    ShipFrom,
    /// Ship To address
    ShipTo,
}

impl fmt::Display for AddressSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressSlot::ShipFrom => write!(f, "ship_from"),
            AddressSlot::ShipTo => write!(f, "ship_to"),
        }
    }
}

// ============================================================================
// Outcome vocabulary
// ============================================================================

/// Final verification status of an address
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// Confirmed deliverable as given
    Verified,
    /// Confirmed deliverable after standardization corrections
    VerifiedWithCorrections,
    /// Could not be confirmed (no match, or unresolved warnings)
    Unverifiable,
    /// Structurally invalid (missing/malformed fields)
    Invalid,
}

impl fmt::Display for VerificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VerificationStatus::Verified => "verified",
            VerificationStatus::VerifiedWithCorrections => "verified_with_corrections",
            VerificationStatus::Unverifiable => "unverifiable",
            VerificationStatus::Invalid => "invalid",
        };
        write!(f, "{}", s)
    }
}

/// Status a provider adapter may report
///
/// Providers never produce `Invalid`: a provider that cannot match an
/// address reports `Unverifiable`. Structural invalidity is a local
/// concern diagnosed by the static rules tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderStatus {
    /// Exact deliverable match
    Verified,
    /// Deliverable after corrections
    Corrected,
    /// No deliverable match
    Unverifiable,
}

impl From<ProviderStatus> for VerificationStatus {
    fn from(status: ProviderStatus) -> Self {
        match status {
            ProviderStatus::Verified => VerificationStatus::Verified,
            ProviderStatus::Corrected => VerificationStatus::VerifiedWithCorrections,
            ProviderStatus::Unverifiable => VerificationStatus::Unverifiable,
        }
    }
}

/// Which tier of the fallback chain produced an outcome
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderTier {
    /// First-priority external provider
    Primary,
    /// Second-priority external provider
    Secondary,
    /// Local static rules (unconditional last resort)
    StaticFallback,
}

impl fmt::Display for ProviderTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProviderTier::Primary => "primary",
            ProviderTier::Secondary => "secondary",
            ProviderTier::StaticFallback => "static_fallback",
        };
        write!(f, "{}", s)
    }
}

/// Qualitative warning attached to an outcome
///
/// Closed vocabulary shared across tiers. Provider-specific signals that
/// do not map onto one of these are dropped, not invented.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum AddressFlag {
    /// Delivery point reported vacant
    Vacant,
    /// Commercial delivery point
    Commercial,
    /// Secondary line (apartment/suite) required but missing
    UnitMissing,
    /// Stated state does not match the ZIP code's known range
    StateZipMismatch,
    /// Street line does not start with a number
    StreetNumberMissing,
    /// Street line looks like a PO Box
    PoBox,
    /// City name contains digits
    CityHasDigits,
}

impl fmt::Display for AddressFlag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            AddressFlag::Vacant => "vacant",
            AddressFlag::Commercial => "commercial",
            AddressFlag::UnitMissing => "unit-missing",
            AddressFlag::StateZipMismatch => "state-zip-mismatch",
            AddressFlag::StreetNumberMissing => "street-number-missing",
            AddressFlag::PoBox => "po-box",
            AddressFlag::CityHasDigits => "city-has-digits",
        };
        write!(f, "{}", s)
    }
}

// ============================================================================
// Outcome shapes
// ============================================================================

/// Normalized result from a provider adapter, before tier stamping
///
/// This is what crosses the adapter boundary: adapters map their native
/// wire shapes into this internally, so the chain never sees a
/// provider-specific field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderOutcome {
    /// Match status reported by the provider
    pub status: ProviderStatus,
    /// Standardized address when the provider corrected the input
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected: Option<Address>,
    /// Deliverability warnings mapped into the shared vocabulary
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<AddressFlag>,
    /// Human-readable explanation (always set for `Unverifiable`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Canonical verification outcome returned to callers
///
/// Immutable once constructed; the chain replaces outcomes, it never
/// mutates a prior tier's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationOutcome {
    /// Final status
    pub status: VerificationStatus,
    /// Standardized address when corrections were supplied
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub corrected: Option<Address>,
    /// Tier that produced this outcome
    pub provider: ProviderTier,
    /// Qualitative warnings (empty set allowed)
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub flags: BTreeSet<AddressFlag>,
    /// Human-readable explanation (always set for `Invalid`/`Unverifiable`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl VerificationOutcome {
    /// Stamp a provider outcome with the tier that produced it
    pub fn from_provider(tier: ProviderTier, outcome: ProviderOutcome) -> Self {
        Self {
            status: outcome.status.into(),
            corrected: outcome.corrected,
            provider: tier,
            flags: outcome.flags,
            message: outcome.message,
        }
    }
}

// ============================================================================
// Provider capability
// ============================================================================

/// Provider adapter errors
///
/// All three kinds cause the chain to fall through to the next tier; they
/// differ in how they are logged and whether a retry could ever help.
#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    /// Input too malformed for a provider query; no network call was made
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Network failure, timeout, rate limit, or 5xx-class response
    #[error("transient provider error: {0}")]
    Transient(String),

    /// Missing or rejected credentials; operator-actionable, never retried
    #[error("permanent provider error: {0}")]
    Permanent(String),
}

/// One tier of the external verification chain
///
/// Implementations translate the generic [`Address`] into their own wire
/// request, call the remote endpoint, and normalize the response into a
/// [`ProviderOutcome`]. A provider "no match" is a valid outcome
/// (`Unverifiable`), not an error.
#[async_trait::async_trait]
pub trait ProviderAdapter: Send + Sync {
    /// Provider name for logging and provenance
    fn name(&self) -> &'static str;

    /// Verify a single address against this provider
    ///
    /// # Errors
    /// Returns [`ProviderError`] on transport, credential, or input
    /// failures; the caller falls through to the next tier.
    async fn verify(&self, address: &Address) -> Result<ProviderOutcome, ProviderError>;
}

// ============================================================================
// Tests
// ============================================================================
