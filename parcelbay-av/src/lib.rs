//! parcelbay-av - Address Verification service library
//!
//! Tiered address verification with provider fallback:
//! - **Primary tier**: USPS Addresses API (OAuth token lifecycle)
//! - **Secondary tier**: Smarty US Street Address API
//! - **Static tier**: local rule engine, the unconditional last resort
//!
//! The [`chain::VerificationChain`] walks the tiers in priority order with
//! independent per-tier timeouts and short-circuits on the first non-error
//! outcome; [`bulk::BulkRunner`] fans the chain out over record batches
//! with bounded concurrency and per-record failure isolation.

pub mod bulk;
pub mod chain;
pub mod config;
pub mod providers;
pub mod static_validator;
pub mod types;

pub use bulk::{BatchEntry, BatchResult, BatchSummary, BulkConfig, BulkRunner, RecordResult};
pub use chain::{ChainConfig, VerificationChain};
pub use config::VerifierConfig;
pub use types::{
    Address, AddressFlag, AddressSlot, ProviderAdapter, ProviderError, ProviderOutcome,
    ProviderStatus, ProviderTier, VerificationOutcome, VerificationStatus,
};
