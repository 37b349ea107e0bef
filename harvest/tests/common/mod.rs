//! Shared test doubles for coordinator tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use harvest::{GenerateError, Generator, Routine};
use tokio::sync::Notify;

/// Counting generator stub.
///
/// Optionally blocks on a gate before completing, so tests can let any
/// number of callers pile up on one in-flight generation before releasing
/// it, and optionally fails its first invocation.
pub struct StubGenerator {
    calls: AtomicUsize,
    gate: Option<Arc<Notify>>,
    fail_on_first: bool,
}

impl StubGenerator {
    pub fn new() -> Arc<Self> {
        Self::build(None, false)
    }

    pub fn gated(gate: Arc<Notify>) -> Arc<Self> {
        Self::build(Some(gate), false)
    }

    pub fn failing_once(gate: Option<Arc<Notify>>) -> Arc<Self> {
        Self::build(gate, true)
    }

    fn build(gate: Option<Arc<Notify>>, fail_on_first: bool) -> Arc<Self> {
        Arc::new(StubGenerator {
            calls: AtomicUsize::new(0),
            gate,
            fail_on_first,
        })
    }

    /// Number of completed `generate` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Generator for StubGenerator {
    async fn generate(&self, _url: &str, _markup: &str) -> Result<Routine, GenerateError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_on_first && call == 0 {
            return Err(GenerateError::Rejected("stub declined the page".into()));
        }
        Ok(Routine::from(format!("routine-{call}")))
    }
}
