//! Bulk verification runner
//!
//! Fans the verification chain out over a batch of shipment records with
//! bounded concurrency. Per-record isolation is the contract: one record's
//! provider failure, timeout, or even panic never aborts or corrupts the
//! rest, and the result set is always a complete bijection with the input
//! keys: count in equals count out, no silent drops.

use crate::chain::VerificationChain;
use crate::static_validator;
use crate::types::{Address, AddressSlot, VerificationOutcome, VerificationStatus};
use futures::future::join_all;
use parcelbay_common::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use uuid::Uuid;

/// Bulk runner settings
#[derive(Debug, Clone)]
pub struct BulkConfig {
    /// Maximum verification calls in flight at once
    pub max_concurrency: usize,
    /// Overall wall-clock cap for a batch. Entries not dispatched by the
    /// deadline are marked not-attempted; entries in flight complete via
    /// the instantaneous static tier instead of blocking.
    pub batch_deadline: Option<Duration>,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            batch_deadline: None,
        }
    }
}

/// One batch entry: which address of which record to verify
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchEntry {
    /// Shipment record identifier
    pub record_id: Uuid,
    /// Which address slot on the record
    pub slot: AddressSlot,
    /// The address to verify
    pub address: Address,
}

/// Result key: a record's slot
pub type BatchKey = (Uuid, AddressSlot);

/// Per-record result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordResult {
    /// The chain produced an outcome for this entry
    Outcome(VerificationOutcome),
    /// The batch deadline passed before this entry was dispatched
    NotAttempted {
        /// Why the entry was skipped
        reason: String,
    },
}

/// Aggregate counts across a batch, one increment per input entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub verified: usize,
    pub corrected: usize,
    pub unverifiable: usize,
    pub invalid: usize,
    pub not_attempted: usize,
}

impl BatchSummary {
    /// Total entries accounted for; always equals the input length
    pub fn total(&self) -> usize {
        self.verified + self.corrected + self.unverifiable + self.invalid + self.not_attempted
    }

    fn count(&mut self, result: &RecordResult) {
        match result {
            RecordResult::Outcome(outcome) => match outcome.status {
                VerificationStatus::Verified => self.verified += 1,
                VerificationStatus::VerifiedWithCorrections => self.corrected += 1,
                VerificationStatus::Unverifiable => self.unverifiable += 1,
                VerificationStatus::Invalid => self.invalid += 1,
            },
            RecordResult::NotAttempted { .. } => self.not_attempted += 1,
        }
    }
}

/// Batch verification result
#[derive(Debug, Clone)]
pub struct BatchResult {
    /// Per-entry results, keyed by `(record_id, slot)`
    pub results: HashMap<BatchKey, RecordResult>,
    /// Aggregate counts
    pub summary: BatchSummary,
}

/// Bulk verification runner
///
/// Stateless apart from the shared chain; safe to reuse across batches.
pub struct BulkRunner {
    chain: Arc<VerificationChain>,
    config: BulkConfig,
}

impl BulkRunner {
    pub fn new(chain: Arc<VerificationChain>, config: BulkConfig) -> Self {
        Self { chain, config }
    }

    /// Verify every entry of a batch through the chain
    ///
    /// Fails only for structurally invalid input (empty batch, duplicate
    /// keys); per-record failures become record-level results.
    pub async fn run(&self, entries: Vec<BatchEntry>) -> Result<BatchResult> {
        if entries.is_empty() {
            return Err(Error::InvalidInput("batch contains no entries".to_string()));
        }

        let mut seen = HashSet::with_capacity(entries.len());
        for entry in &entries {
            if !seen.insert((entry.record_id, entry.slot)) {
                return Err(Error::InvalidInput(format!(
                    "duplicate batch entry for record {} slot {}",
                    entry.record_id, entry.slot
                )));
            }
        }

        let total = entries.len();
        let deadline = self
            .config
            .batch_deadline
            .map(|d| tokio::time::Instant::now() + d);
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        tracing::info!(
            entries = total,
            max_concurrency = self.config.max_concurrency,
            deadline = ?self.config.batch_deadline,
            "Starting bulk verification"
        );

        let mut handles = Vec::with_capacity(total);
        for entry in entries {
            let key = (entry.record_id, entry.slot);
            let chain = Arc::clone(&self.chain);
            let semaphore = Arc::clone(&semaphore);

            let handle = tokio::spawn(async move {
                let Ok(_permit) = semaphore.acquire_owned().await else {
                    // Semaphore only closes if the runner is torn down mid-batch
                    return RecordResult::NotAttempted {
                        reason: "batch was cancelled before this record was dispatched"
                            .to_string(),
                    };
                };

                match deadline {
                    Some(deadline) => {
                        if tokio::time::Instant::now() >= deadline {
                            return RecordResult::NotAttempted {
                                reason: "batch deadline passed before this record was attempted"
                                    .to_string(),
                            };
                        }
                        match tokio::time::timeout_at(deadline, chain.verify(&entry.address))
                            .await
                        {
                            Ok(outcome) => RecordResult::Outcome(outcome),
                            // Deadline hit mid-chain: the static tier is
                            // instantaneous, so the record still gets a
                            // definite outcome
                            Err(_) => RecordResult::Outcome(static_validator::validate(
                                &entry.address,
                            )),
                        }
                    }
                    None => RecordResult::Outcome(chain.verify(&entry.address).await),
                }
            });

            handles.push((key, handle));
        }

        let (keys, handles): (Vec<BatchKey>, Vec<_>) = handles.into_iter().unzip();
        let joined = join_all(handles).await;

        let mut results = HashMap::with_capacity(total);
        let mut summary = BatchSummary::default();

        for ((record_id, slot), join_result) in keys.into_iter().zip(joined) {
            let result = match join_result {
                Ok(result) => result,
                Err(e) => {
                    // A panicked task must still yield a result for its key
                    tracing::error!(
                        record_id = %record_id,
                        slot = %slot,
                        error = %e,
                        "Verification task failed; recording invalid outcome"
                    );
                    RecordResult::Outcome(VerificationOutcome {
                        status: VerificationStatus::Invalid,
                        corrected: None,
                        provider: crate::types::ProviderTier::StaticFallback,
                        flags: Default::default(),
                        message: Some("internal verification failure".to_string()),
                    })
                }
            };
            summary.count(&result);
            results.insert((record_id, slot), result);
        }

        tracing::info!(
            verified = summary.verified,
            corrected = summary.corrected,
            unverifiable = summary.unverifiable,
            invalid = summary.invalid,
            not_attempted = summary.not_attempted,
            "Bulk verification completed"
        );

        debug_assert_eq!(summary.total(), total);

        Ok(BatchResult { results, summary })
    }
}
