//! Bulk verification runner tests
//!
//! Covers the bijection guarantee, per-record isolation, the batch
//! deadline, and the concurrency bound.

mod common;

use common::{as_tier, good_address, StubAdapter, StubBehavior};
use parcelbay_av::{
    Address, AddressSlot, BatchEntry, BulkConfig, BulkRunner, ChainConfig, ProviderError,
    ProviderStatus, ProviderTier, RecordResult, VerificationChain, VerificationStatus,
};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

fn fast_config() -> ChainConfig {
    ChainConfig {
        primary_timeout: Duration::from_millis(200),
        secondary_timeout: Duration::from_millis(200),
        retry_transient: false,
    }
}

fn entry(slot: AddressSlot, address: Address) -> BatchEntry {
    BatchEntry {
        record_id: Uuid::new_v4(),
        slot,
        address,
    }
}

fn bad_address() -> Address {
    Address {
        street1: String::new(),
        ..good_address()
    }
}

#[tokio::test]
async fn bijection_with_mixed_validity() {
    let chain = Arc::new(VerificationChain::new(None, None, fast_config()));
    let runner = BulkRunner::new(chain, BulkConfig::default());

    let mut entries = Vec::new();
    for i in 0..10 {
        let address = if i % 3 == 0 { bad_address() } else { good_address() };
        entries.push(entry(AddressSlot::ShipTo, address));
    }
    let keys: Vec<_> = entries.iter().map(|e| (e.record_id, e.slot)).collect();

    let batch = runner.run(entries).await.unwrap();

    assert_eq!(batch.results.len(), 10, "One result per input entry");
    for key in &keys {
        assert!(batch.results.contains_key(key), "Missing result for {:?}", key);
    }
    assert_eq!(batch.summary.total(), 10, "Counts must sum to the input size");
    assert_eq!(batch.summary.invalid, 4, "Empty street records are invalid");
    assert_eq!(batch.summary.verified, 6);
}

#[tokio::test]
async fn record_failure_is_isolated_from_siblings() {
    // Primary fails permanently only for the marked record
    let primary = StubAdapter::new(StubBehavior::FailFor {
        marker: "POISON".to_string(),
        error: ProviderError::Permanent("credentials rejected".to_string()),
    });
    let chain = Arc::new(VerificationChain::new(
        as_tier(&primary),
        None,
        fast_config(),
    ));
    let runner = BulkRunner::new(Arc::clone(&chain), BulkConfig::default());

    let mut poisoned = good_address();
    poisoned.street1 = "600 POISON Ave".to_string();

    let healthy_entries: Vec<BatchEntry> =
        (0..4).map(|_| entry(AddressSlot::ShipTo, good_address())).collect();
    let poisoned_entry = entry(AddressSlot::ShipTo, poisoned.clone());

    // Solo baseline for a healthy record
    let solo = chain.verify(&good_address()).await;

    let mut entries = healthy_entries.clone();
    entries.push(poisoned_entry.clone());
    let batch = runner.run(entries).await.unwrap();

    for healthy in &healthy_entries {
        match &batch.results[&(healthy.record_id, healthy.slot)] {
            RecordResult::Outcome(outcome) => {
                assert_eq!(
                    outcome, &solo,
                    "Sibling outcome must equal its solo run despite the poisoned record"
                );
            }
            RecordResult::NotAttempted { .. } => panic!("Healthy record was not attempted"),
        }
    }

    // The poisoned record itself degraded to the static tier
    match &batch.results[&(poisoned_entry.record_id, poisoned_entry.slot)] {
        RecordResult::Outcome(outcome) => {
            assert_eq!(outcome.provider, ProviderTier::StaticFallback);
        }
        RecordResult::NotAttempted { .. } => panic!("Poisoned record was not attempted"),
    }
}

#[tokio::test]
async fn batch_deadline_marks_pending_records_not_attempted() {
    // Every provider call hangs; serial dispatch guarantees later entries
    // are still queued when the deadline passes
    let primary = StubAdapter::new(StubBehavior::Delay(
        Duration::from_secs(60),
        ProviderStatus::Verified,
    ));
    let chain = Arc::new(VerificationChain::new(
        as_tier(&primary),
        None,
        ChainConfig {
            primary_timeout: Duration::from_secs(30),
            ..fast_config()
        },
    ));
    let runner = BulkRunner::new(
        chain,
        BulkConfig {
            max_concurrency: 1,
            batch_deadline: Some(Duration::from_millis(100)),
        },
    );

    let entries: Vec<BatchEntry> =
        (0..5).map(|_| entry(AddressSlot::ShipTo, good_address())).collect();
    let keys: Vec<_> = entries.iter().map(|e| (e.record_id, e.slot)).collect();

    let batch = runner.run(entries).await.unwrap();

    // Bijection holds even under the deadline
    assert_eq!(batch.results.len(), 5);
    for key in &keys {
        assert!(batch.results.contains_key(key));
    }
    assert!(
        batch.summary.not_attempted >= 1,
        "Queued records past the deadline must be marked not attempted"
    );

    // In-flight record completed via the instantaneous static tier
    match &batch.results[&keys[0]] {
        RecordResult::Outcome(outcome) => {
            assert_eq!(outcome.provider, ProviderTier::StaticFallback);
            assert_eq!(outcome.status, VerificationStatus::Verified);
        }
        RecordResult::NotAttempted { .. } => {
            panic!("First record was dispatched before the deadline")
        }
    }
}

#[tokio::test]
async fn concurrency_stays_within_bound() {
    let primary = StubAdapter::new(StubBehavior::Delay(
        Duration::from_millis(30),
        ProviderStatus::Verified,
    ));
    let chain = Arc::new(VerificationChain::new(
        as_tier(&primary),
        None,
        fast_config(),
    ));
    let runner = BulkRunner::new(
        chain,
        BulkConfig {
            max_concurrency: 2,
            batch_deadline: None,
        },
    );

    let entries: Vec<BatchEntry> =
        (0..8).map(|_| entry(AddressSlot::ShipTo, good_address())).collect();

    let batch = runner.run(entries).await.unwrap();

    assert_eq!(batch.summary.verified, 8);
    assert!(
        primary.max_in_flight() <= 2,
        "Observed {} concurrent provider calls with a bound of 2",
        primary.max_in_flight()
    );
    assert_eq!(primary.calls(), 8);
}

#[tokio::test]
async fn large_batch_all_records_resolve() {
    let chain = Arc::new(VerificationChain::new(None, None, fast_config()));
    let runner = BulkRunner::new(chain, BulkConfig::default());

    let entries: Vec<BatchEntry> = (0..200)
        .map(|i| {
            let slot = if i % 2 == 0 { AddressSlot::ShipTo } else { AddressSlot::ShipFrom };
            entry(slot, good_address())
        })
        .collect();

    let batch = runner.run(entries).await.unwrap();

    assert_eq!(batch.results.len(), 200);
    assert_eq!(batch.summary.verified, 200);
    assert!(batch
        .results
        .values()
        .all(|r| matches!(r, RecordResult::Outcome(_))));
}
