//! Shared test helpers: stub provider adapters with call accounting
#![allow(dead_code)]

use parcelbay_av::{
    Address, ProviderAdapter, ProviderError, ProviderOutcome, ProviderStatus,
};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// What a stub adapter does when invoked
#[derive(Debug, Clone)]
pub enum StubBehavior {
    /// Return an outcome with this status
    Succeed(ProviderStatus),
    /// Return this error
    Fail(ProviderError),
    /// Sleep, then return an outcome (for timeout tests)
    Delay(Duration, ProviderStatus),
    /// Fail only for addresses whose street contains the marker
    FailFor {
        marker: String,
        error: ProviderError,
    },
}

/// Stub provider adapter with call and concurrency accounting
pub struct StubAdapter {
    behavior: StubBehavior,
    calls: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl StubAdapter {
    pub fn new(behavior: StubBehavior) -> Arc<Self> {
        Arc::new(Self {
            behavior,
            calls: AtomicUsize::new(0),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        })
    }

    /// Total verify() invocations
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Highest number of concurrently in-flight verify() calls observed
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }
}

/// Decrements the in-flight gauge even when the call future is dropped at
/// a timeout
struct InFlightGuard<'a>(&'a AtomicUsize);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait::async_trait]
impl ProviderAdapter for StubAdapter {
    fn name(&self) -> &'static str {
        "stub"
    }

    async fn verify(&self, address: &Address) -> Result<ProviderOutcome, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        let _guard = InFlightGuard(&self.in_flight);

        match &self.behavior {
            StubBehavior::Succeed(status) => Ok(stub_outcome(*status)),
            StubBehavior::Fail(error) => Err(error.clone()),
            StubBehavior::Delay(delay, status) => {
                tokio::time::sleep(*delay).await;
                Ok(stub_outcome(*status))
            }
            StubBehavior::FailFor { marker, error } => {
                if address.street1.contains(marker.as_str()) {
                    Err(error.clone())
                } else {
                    Ok(stub_outcome(ProviderStatus::Verified))
                }
            }
        }
    }
}

/// Wrap a stub for a chain tier slot
pub fn as_tier(adapter: &Arc<StubAdapter>) -> Option<Arc<dyn ProviderAdapter>> {
    Some(Arc::clone(adapter) as Arc<dyn ProviderAdapter>)
}

pub fn stub_outcome(status: ProviderStatus) -> ProviderOutcome {
    let message = matches!(status, ProviderStatus::Unverifiable)
        .then(|| "stub provider found no match".to_string());
    ProviderOutcome {
        status,
        corrected: None,
        flags: BTreeSet::new(),
        message,
    }
}

/// A deliverable Chicago address that passes the static rules cleanly
pub fn good_address() -> Address {
    Address {
        name: "Avery Brooks".to_string(),
        company: None,
        street1: "600 W Chicago Ave".to_string(),
        street2: None,
        city: "Chicago".to_string(),
        state: "IL".to_string(),
        postal_code: "60654".to_string(),
        country: "US".to_string(),
    }
}
