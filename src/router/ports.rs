//! Ports the router consumes, plus the simple adapters that ship with the crate.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::error::AnalyzerError;
use super::types::{AnalysisPayload, AnalyzeOptions, Tier};
use crate::domain::{HealthProfile, Product, StackItem};

/// Expensive delegated analysis (tier 3).
#[async_trait]
pub trait GenerativeAnalyzer: Send + Sync {
    async fn analyze(
        &self,
        product: &Product,
        stack: &[StackItem],
        profile: Option<&HealthProfile>,
        options: &AnalyzeOptions,
    ) -> Result<AnalysisPayload, AnalyzerError>;
}

pub trait NetworkStatus: Send + Sync {
    fn is_offline(&self) -> bool;
}

/// Fire-and-forget sink for per-request cost events.
pub trait CostTracker: Send + Sync {
    fn record(&self, tier: Tier, response_time: Duration, cost_savings: f64);
}

/// Connectivity flag flipped by the host (config, health check, or tests).
#[derive(Debug, Default)]
pub struct StaticNetworkStatus {
    offline: AtomicBool,
}

impl StaticNetworkStatus {
    pub fn new(offline: bool) -> Self {
        Self {
            offline: AtomicBool::new(offline),
        }
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::Release);
    }
}

impl NetworkStatus for StaticNetworkStatus {
    fn is_offline(&self) -> bool {
        self.offline.load(Ordering::Acquire)
    }
}

/// Emits each cost event as a structured log line.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingCostTracker;

impl CostTracker for TracingCostTracker {
    fn record(&self, tier: Tier, response_time: Duration, cost_savings: f64) {
        info!(
            target: "stacksafe::cost",
            tier = %tier,
            response_time_ms = response_time.as_millis() as u64,
            cost_savings = cost_savings,
            "Tier cost event"
        );
    }
}

#[cfg(any(test, feature = "mock"))]
pub use mock::{MockAnalyzer, RecordingCostTracker};

#[cfg(any(test, feature = "mock"))]
mod mock {
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;

    use parking_lot::Mutex;

    use super::*;

    /// Scripted analyzer: replies are popped in order, then `fallback` repeats.
    pub struct MockAnalyzer {
        script: Mutex<VecDeque<Result<AnalysisPayload, AnalyzerError>>>,
        fallback: Option<AnalysisPayload>,
        delay: Option<Duration>,
        calls: AtomicUsize,
    }

    impl MockAnalyzer {
        /// Always succeeds with `payload`.
        pub fn returning(payload: AnalysisPayload) -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: Some(payload),
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        /// Fails with an unavailable error once the script runs out.
        pub fn failing() -> Self {
            Self {
                script: Mutex::new(VecDeque::new()),
                fallback: None,
                delay: None,
                calls: AtomicUsize::new(0),
            }
        }

        pub fn then(self, reply: Result<AnalysisPayload, AnalyzerError>) -> Self {
            self.script.lock().push_back(reply);
            self
        }

        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn call_count(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl GenerativeAnalyzer for MockAnalyzer {
        async fn analyze(
            &self,
            _product: &Product,
            _stack: &[StackItem],
            _profile: Option<&HealthProfile>,
            _options: &AnalyzeOptions,
        ) -> Result<AnalysisPayload, AnalyzerError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let scripted = self.script.lock().pop_front();
            scripted.unwrap_or_else(|| match &self.fallback {
                Some(payload) => Ok(payload.clone()),
                None => Err(AnalyzerError::Unavailable {
                    reason: "mock provider down".to_string(),
                }),
            })
        }
    }

    /// Collects cost events for assertions.
    #[derive(Default)]
    pub struct RecordingCostTracker {
        events: Mutex<Vec<(Tier, f64)>>,
    }

    impl RecordingCostTracker {
        pub fn events(&self) -> Vec<(Tier, f64)> {
            self.events.lock().clone()
        }
    }

    impl CostTracker for RecordingCostTracker {
        fn record(&self, tier: Tier, _response_time: Duration, cost_savings: f64) {
            self.events.lock().push((tier, cost_savings));
        }
    }
}
