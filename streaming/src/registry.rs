//! In-flight stream registry (spec.md §4.4): a process-local map from
//! request id to that request's cancellation handle. Submitting a new
//! stream under an id already present aborts the previous stream and
//! replaces its entry; on stream end (success, error, or cancellation) the
//! id is removed.

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
pub struct StreamRegistry {
    inflight: DashMap<String, CancellationToken>,
}

impl StreamRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `request_id` as in-flight, cancelling and replacing any
    /// prior registration under the same id. Returns the new cancellation
    /// token the caller's stream task must observe at every suspension
    /// point.
    pub fn register(&self, request_id: &str) -> CancellationToken {
        let token = CancellationToken::new();
        if let Some((_, previous)) = self.inflight.remove(request_id) {
            previous.cancel();
        }
        self.inflight.insert(request_id.to_string(), token.clone());
        token
    }

    /// Cancels the named stream if it is currently in-flight. Returns
    /// `false` if no stream is registered under `request_id` (already
    /// finished, or never started).
    pub fn cancel(&self, request_id: &str) -> bool {
        match self.inflight.remove(request_id) {
            Some((_, token)) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Removes `request_id`'s registration without cancelling it — called
    /// once a stream reaches its own terminal frame so a later id reuse
    /// doesn't see a stale entry.
    pub fn finish(&self, request_id: &str) {
        self.inflight.remove(request_id);
    }

    pub fn is_inflight(&self, request_id: &str) -> bool {
        self.inflight.contains_key(request_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registering_an_existing_id_cancels_the_previous_token() {
        let registry = StreamRegistry::new();
        let first = registry.register("r1");
        assert!(!first.is_cancelled());

        let second = registry.register("r1");
        assert!(first.is_cancelled());
        assert!(!second.is_cancelled());
    }

    #[test]
    fn cancel_returns_false_when_nothing_is_registered() {
        let registry = StreamRegistry::new();
        assert!(!registry.cancel("missing"));
    }

    #[test]
    fn cancel_cancels_the_token_and_removes_the_entry() {
        let registry = StreamRegistry::new();
        let token = registry.register("r1");
        assert!(registry.cancel("r1"));
        assert!(token.is_cancelled());
        assert!(!registry.is_inflight("r1"));
    }

    #[test]
    fn finish_removes_without_cancelling() {
        let registry = StreamRegistry::new();
        let token = registry.register("r1");
        registry.finish("r1");
        assert!(!token.is_cancelled());
        assert!(!registry.is_inflight("r1"));
    }
}
