//! Configuration resolution for parcelbay-av
//!
//! Provider credentials resolve with ENV → TOML priority. Absent
//! credentials for a tier mean "tier unconfigured" (the chain skips that
//! tier), never an error. Timeouts and bulk limits come from the TOML file
//! with documented defaults.

use crate::bulk::BulkConfig;
use crate::chain::ChainConfig;
use crate::providers::{SmartyConfig, UspsConfig};
use parcelbay_common::{config as common_config, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

const ENV_USPS_CLIENT_ID: &str = "PARCELBAY_USPS_CLIENT_ID";
const ENV_USPS_CLIENT_SECRET: &str = "PARCELBAY_USPS_CLIENT_SECRET";
const ENV_SMARTY_AUTH_ID: &str = "PARCELBAY_SMARTY_AUTH_ID";
const ENV_SMARTY_AUTH_TOKEN: &str = "PARCELBAY_SMARTY_AUTH_TOKEN";

// ============================================================================
// TOML file shape
// ============================================================================

/// On-disk configuration (`~/.config/parcelbay/av.toml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    /// USPS (primary tier) credentials
    pub usps: Option<UspsToml>,
    /// Smarty (secondary tier) credentials
    pub smarty: Option<SmartyToml>,
    /// Chain behavior
    pub chain: Option<ChainToml>,
    /// Bulk runner behavior
    pub bulk: Option<BulkToml>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UspsToml {
    pub client_id: String,
    pub client_secret: String,
    /// API base URL override (tests, sandbox environments)
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartyToml {
    pub auth_id: String,
    pub auth_token: String,
    pub endpoint: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainToml {
    pub primary_timeout_secs: Option<u64>,
    pub secondary_timeout_secs: Option<u64>,
    pub retry_transient: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BulkToml {
    pub max_concurrency: Option<usize>,
    pub batch_deadline_secs: Option<u64>,
}

// ============================================================================
// Resolved configuration
// ============================================================================

/// Fully resolved verifier configuration
///
/// `None` for a provider means that tier is unconfigured.
#[derive(Debug, Clone, Default)]
pub struct VerifierConfig {
    pub usps: Option<UspsConfig>,
    pub smarty: Option<SmartyConfig>,
    pub chain: ChainConfig,
    pub bulk: BulkConfig,
}

impl VerifierConfig {
    /// Load and resolve configuration from the standard location
    ///
    /// A missing file is fine (all tiers unconfigured, defaults
    /// everywhere); a file that exists but does not parse is an error.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let path = common_config::resolve_config_path("av", explicit_path);
        let toml_config = if path.exists() {
            info!(path = %path.display(), "Loading verifier config");
            common_config::read_toml(&path)?
        } else {
            info!(path = %path.display(), "No config file found, using defaults");
            TomlConfig::default()
        };
        Ok(Self::resolve(&toml_config))
    }

    /// Resolve the effective configuration from a parsed TOML file plus
    /// the environment
    pub fn resolve(toml_config: &TomlConfig) -> Self {
        Self {
            usps: resolve_usps_credentials(toml_config),
            smarty: resolve_smarty_credentials(toml_config),
            chain: resolve_chain(toml_config),
            bulk: resolve_bulk(toml_config),
        }
    }
}

/// Resolve USPS credentials with ENV → TOML priority
///
/// Both halves of the pair must come from the same source; a partial pair
/// is ignored with a warning.
fn resolve_usps_credentials(toml_config: &TomlConfig) -> Option<UspsConfig> {
    let env_pair = credential_pair_from_env(ENV_USPS_CLIENT_ID, ENV_USPS_CLIENT_SECRET, "USPS");
    let toml_entry = toml_config
        .usps
        .as_ref()
        .filter(|u| is_valid_key(&u.client_id) && is_valid_key(&u.client_secret));

    if env_pair.is_some() && toml_entry.is_some() {
        warn!("USPS credentials found in both environment and TOML. Using environment (highest priority).");
    }

    let endpoint = toml_config
        .usps
        .as_ref()
        .and_then(|u| u.endpoint.clone());

    if let Some((client_id, client_secret)) = env_pair {
        info!("USPS credentials loaded from environment");
        let mut config = UspsConfig::new(client_id, client_secret);
        if let Some(endpoint) = endpoint {
            config.endpoint = endpoint;
        }
        return Some(config);
    }

    if let Some(entry) = toml_entry {
        info!("USPS credentials loaded from TOML config");
        let mut config = UspsConfig::new(entry.client_id.clone(), entry.client_secret.clone());
        if let Some(endpoint) = &entry.endpoint {
            config.endpoint = endpoint.clone();
        }
        return Some(config);
    }

    None
}

/// Resolve Smarty credentials with ENV → TOML priority
fn resolve_smarty_credentials(toml_config: &TomlConfig) -> Option<SmartyConfig> {
    let env_pair = credential_pair_from_env(ENV_SMARTY_AUTH_ID, ENV_SMARTY_AUTH_TOKEN, "Smarty");
    let toml_entry = toml_config
        .smarty
        .as_ref()
        .filter(|s| is_valid_key(&s.auth_id) && is_valid_key(&s.auth_token));

    if env_pair.is_some() && toml_entry.is_some() {
        warn!("Smarty credentials found in both environment and TOML. Using environment (highest priority).");
    }

    let endpoint = toml_config
        .smarty
        .as_ref()
        .and_then(|s| s.endpoint.clone());

    if let Some((auth_id, auth_token)) = env_pair {
        info!("Smarty credentials loaded from environment");
        let mut config = SmartyConfig::new(auth_id, auth_token);
        if let Some(endpoint) = endpoint {
            config.endpoint = endpoint;
        }
        return Some(config);
    }

    if let Some(entry) = toml_entry {
        info!("Smarty credentials loaded from TOML config");
        let mut config = SmartyConfig::new(entry.auth_id.clone(), entry.auth_token.clone());
        if let Some(endpoint) = &entry.endpoint {
            config.endpoint = endpoint.clone();
        }
        return Some(config);
    }

    None
}

fn resolve_chain(toml_config: &TomlConfig) -> ChainConfig {
    let defaults = ChainConfig::default();
    let Some(chain) = &toml_config.chain else {
        return defaults;
    };
    ChainConfig {
        primary_timeout: chain
            .primary_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.primary_timeout),
        secondary_timeout: chain
            .secondary_timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(defaults.secondary_timeout),
        retry_transient: chain.retry_transient.unwrap_or(defaults.retry_transient),
    }
}

fn resolve_bulk(toml_config: &TomlConfig) -> BulkConfig {
    let defaults = BulkConfig::default();
    let Some(bulk) = &toml_config.bulk else {
        return defaults;
    };
    BulkConfig {
        max_concurrency: bulk.max_concurrency.unwrap_or(defaults.max_concurrency),
        batch_deadline: bulk
            .batch_deadline_secs
            .map(Duration::from_secs)
            .or(defaults.batch_deadline),
    }
}

/// Read a two-part credential from the environment
///
/// Returns `Some` only when both halves are present and non-blank; a
/// partial pair is a misconfiguration worth a warning.
fn credential_pair_from_env(
    first_var: &str,
    second_var: &str,
    provider: &str,
) -> Option<(String, String)> {
    let first = std::env::var(first_var).ok().filter(|v| is_valid_key(v));
    let second = std::env::var(second_var).ok().filter(|v| is_valid_key(v));

    match (first, second) {
        (Some(a), Some(b)) => Some((a, b)),
        (None, None) => None,
        _ => {
            warn!(
                "{} credentials partially set in environment ({} / {}); ignoring environment source.",
                provider, first_var, second_var
            );
            None
        }
    }
}

/// Validate a credential value (non-empty, non-whitespace)
fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}
