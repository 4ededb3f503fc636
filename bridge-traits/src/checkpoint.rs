//! Checkpoint Abstraction
//!
//! A checkpoint is the designed pause point of a long reconciliation pass.
//! The engine calls it once after every local item whose data types it has
//! walked. Items skipped before that point (unknown identifier, no remote
//! key) do not checkpoint.

use async_trait::async_trait;

/// Progress/interruption boundary between episode-level iterations.
///
/// Implementations are expected to be cheap and idempotent. A host may use
/// the call to persist partial progress, publish progress events, or yield to
/// a scheduler. Handler effects that already happened before a checkpoint are
/// never rolled back.
///
/// # Example
///
/// ```ignore
/// use bridge_traits::checkpoint::CheckpointSink;
///
/// async fn step(sink: &dyn CheckpointSink) {
///     // ... process one episode ...
///     sink.checkpoint().await;
/// }
/// ```
#[async_trait]
pub trait CheckpointSink: Send + Sync {
    /// Record that one more unit of work is complete.
    async fn checkpoint(&self);
}

/// Checkpoint sink that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCheckpoint;

#[async_trait]
impl CheckpointSink for NoopCheckpoint {
    async fn checkpoint(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingCheckpoint {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl CheckpointSink for CountingCheckpoint {
        async fn checkpoint(&self) {
            self.calls.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_noop_checkpoint() {
        let sink = NoopCheckpoint;
        sink.checkpoint().await;
        sink.checkpoint().await;
    }

    #[tokio::test]
    async fn test_checkpoint_through_trait_object() {
        let sink = CountingCheckpoint::default();
        let dyn_sink: &dyn CheckpointSink = &sink;

        for _ in 0..3 {
            dyn_sink.checkpoint().await;
        }

        assert_eq!(sink.calls.load(Ordering::SeqCst), 3);
    }
}
