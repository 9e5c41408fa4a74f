//! Static address validation
//!
//! Local rule engine producing a baseline verification outcome with no
//! network, no I/O, and no failure mode. This is the unconditional bottom
//! of the fallback chain: whatever the external providers do, every
//! address gets at least this.
//!
//! Checks applied in order:
//! 1. Required fields present (street, city, state, ZIP)
//! 2. Valid US state abbreviation
//! 3. Valid ZIP code format (5 digits, or 5+4 with a hyphen)
//! 4. ZIP prefix matches the stated state (3-digit prefix ranges)
//! 5. Format sanity warnings (missing street number, PO Box, digits in city)

use crate::types::{
    Address, AddressFlag, ProviderTier, VerificationOutcome, VerificationStatus,
};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;

/// Valid US state and territory abbreviations
const VALID_STATES: [&str; 56] = [
    "AL", "AK", "AZ", "AR", "CA", "CO", "CT", "DE", "FL", "GA", "HI", "ID", "IL", "IN", "IA",
    "KS", "KY", "LA", "ME", "MD", "MA", "MI", "MN", "MS", "MO", "MT", "NE", "NV", "NH", "NJ",
    "NM", "NY", "NC", "ND", "OH", "OK", "OR", "PA", "RI", "SC", "SD", "TN", "TX", "UT", "VT",
    "VA", "WA", "WV", "WI", "WY", "DC", "PR", "VI", "GU", "AS", "MP",
];

/// ZIP prefix range → expected states (first 3 digits, half-open ranges)
///
/// Simplified national mapping; enough to catch a ZIP filed under the
/// wrong state without carrying full deliverability data.
const ZIP_STATE_RANGES: [(u16, u16, &[&str]); 42] = [
    (100, 150, &["NY", "NJ", "CT", "PA"]),
    (150, 200, &["PA", "DE", "MD", "DC"]),
    (200, 270, &["VA", "WV", "DC", "MD"]),
    (270, 290, &["NC"]),
    (290, 300, &["SC"]),
    (300, 320, &["GA"]),
    (320, 340, &["FL"]),
    (340, 350, &["FL"]),
    (350, 370, &["AL"]),
    (370, 386, &["TN"]),
    (386, 398, &["MS"]),
    (400, 428, &["KY"]),
    (430, 459, &["OH"]),
    (460, 480, &["IN"]),
    (480, 500, &["MI"]),
    (500, 529, &["IA"]),
    (530, 550, &["WI"]),
    (550, 568, &["MN"]),
    (570, 578, &["SD"]),
    (580, 589, &["ND"]),
    (590, 600, &["MT"]),
    (600, 630, &["IL"]),
    (630, 659, &["MO"]),
    (660, 680, &["KS"]),
    (680, 694, &["NE"]),
    (700, 715, &["LA"]),
    (716, 730, &["AR"]),
    (730, 750, &["OK"]),
    (750, 800, &["TX"]),
    (800, 816, &["CO"]),
    (820, 832, &["WY"]),
    (832, 839, &["ID"]),
    (840, 848, &["UT"]),
    (850, 866, &["AZ"]),
    (870, 885, &["NM"]),
    (889, 899, &["NV"]),
    (900, 935, &["CA"]),
    (935, 966, &["CA", "HI"]),
    (967, 969, &["HI"]),
    (970, 980, &["OR"]),
    (980, 995, &["WA"]),
    (995, 1000, &["AK"]),
];

static ZIP_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("ZIP pattern is valid"));
static STREET_NUMBER_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+\s").expect("street number pattern is valid"));
static PO_BOX_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^P\.?O\.?\s*BOX").expect("PO Box pattern is valid"));

/// Expected states for a 3-digit ZIP prefix, if known
fn states_for_zip_prefix(prefix: u16) -> Option<&'static [&'static str]> {
    ZIP_STATE_RANGES
        .iter()
        .find(|(start, end, _)| prefix >= *start && prefix < *end)
        .map(|(_, _, states)| *states)
}

/// Validate an address using static format checks
///
/// Total function: always returns an outcome, never blocks, no I/O. Same
/// input always yields the identical outcome, flags included.
///
/// Status rules: any hard error → `Invalid` (with a message naming the
/// problem); all checks pass with warnings → `Unverifiable` (correctness
/// cannot be confirmed without deliverability data); clean pass →
/// `Verified`. Case/whitespace normalization is surfaced through
/// `corrected` when it changes anything.
pub fn validate(address: &Address) -> VerificationOutcome {
    let street = address.street1.trim();
    let city = address.city.trim();
    let state = address.state.trim().to_uppercase();
    let zip = address.postal_code.trim();

    // Rule 1: required fields
    let mut missing = Vec::new();
    if street.is_empty() {
        missing.push("street");
    }
    if city.is_empty() {
        missing.push("city");
    }
    if address.state.trim().is_empty() {
        missing.push("state");
    }
    if zip.is_empty() {
        missing.push("postal code");
    }
    if !missing.is_empty() {
        return invalid(format!("Missing required field(s): {}.", missing.join(", ")));
    }

    // Rule 2: state abbreviation
    if !VALID_STATES.contains(&state.as_str()) {
        return invalid(format!(
            "\"{}\" is not a valid US state abbreviation.",
            address.state.trim()
        ));
    }

    // Rule 3: ZIP format
    if !ZIP_PATTERN.is_match(zip) {
        return invalid(format!(
            "ZIP code \"{}\" is not in valid format (expected 5 digits or 5+4).",
            zip
        ));
    }

    let mut flags = BTreeSet::new();
    let mut warnings = Vec::new();

    // Rule 4: ZIP-state cross check
    let zip_prefix: u16 = zip[..3].parse().unwrap_or(0);
    if let Some(expected) = states_for_zip_prefix(zip_prefix) {
        if !expected.contains(&state.as_str()) {
            flags.insert(AddressFlag::StateZipMismatch);
            warnings.push(format!(
                "ZIP code {} typically belongs to {}, not {}.",
                zip,
                expected.join(", "),
                state
            ));
        }
    }

    // Rule 5: format sanity warnings
    if PO_BOX_PATTERN.is_match(street) {
        flags.insert(AddressFlag::PoBox);
        warnings.push("Address is a PO Box.".to_string());
    } else if !STREET_NUMBER_PATTERN.is_match(street) {
        flags.insert(AddressFlag::StreetNumberMissing);
        warnings.push("Address may be missing a street number.".to_string());
    }

    if city.chars().any(|c| c.is_ascii_digit()) {
        flags.insert(AddressFlag::CityHasDigits);
        warnings.push("City name contains numbers.".to_string());
    }

    let corrected = normalized_address(address, street, city, &state, zip);

    let (status, message) = if flags.is_empty() {
        tracing::debug!(street = %street, city = %city, state = %state, zip = %zip,
            "Address passed static validation");
        (VerificationStatus::Verified, None)
    } else {
        tracing::debug!(street = %street, flags = ?flags,
            "Address passed static validation with warnings");
        (VerificationStatus::Unverifiable, Some(warnings.join(" ")))
    };

    VerificationOutcome {
        status,
        corrected,
        provider: ProviderTier::StaticFallback,
        flags,
        message,
    }
}

fn invalid(message: String) -> VerificationOutcome {
    tracing::debug!(message = %message, "Address failed static validation");
    VerificationOutcome {
        status: VerificationStatus::Invalid,
        corrected: None,
        provider: ProviderTier::StaticFallback,
        flags: BTreeSet::new(),
        message: Some(message),
    }
}

/// Trimmed, state-uppercased copy of the input when it differs
fn normalized_address(
    original: &Address,
    street: &str,
    city: &str,
    state: &str,
    zip: &str,
) -> Option<Address> {
    let normalized = Address {
        name: original.name.trim().to_string(),
        company: original.company.as_ref().map(|c| c.trim().to_string()),
        street1: street.to_string(),
        street2: original.street2.as_ref().map(|s| s.trim().to_string()),
        city: city.to_string(),
        state: state.to_string(),
        postal_code: zip.to_string(),
        country: original.country.trim().to_uppercase(),
    };
    (&normalized != original).then_some(normalized)
}
