//! Pending-request registry.
//!
//! The registry is the table of in-flight calls, keyed by correlation
//! identifier. An entry holds the continuation for its call and leaves
//! the table at the moment that continuation fires, on a matched reply
//! or on deadline expiry, so a request can never be resolved twice.
//!
//! Identifiers are assigned sequentially starting from 1 (0 is never
//! used). Allocation skips any identifier still present in the table, so
//! a counter wraparound cannot collide with a long-lived pending entry.

use std::collections::HashMap;
use std::time::Instant;

/// Continuation invoked exactly once with (status, payload).
pub(crate) type ReplyCallback = Box<dyn FnOnce(u16, Option<String>) + Send>;

/// One in-flight call.
pub(crate) struct PendingRequest {
    /// Correlation identifier embedded in the request frame.
    pub correlation_id: u32,
    /// Remote operation name, kept for log lines.
    pub method: String,
    /// Index of the configured endpoint the request was dispatched to.
    pub endpoint: usize,
    /// Submission time.
    pub submitted_at: Instant,
    /// `submitted_at` + the caller's timeout.
    pub deadline: Instant,
    /// The caller's continuation.
    pub callback: ReplyCallback,
}

impl PendingRequest {
    /// Fire the continuation. Consumes the entry: resolution is final.
    pub fn resolve(self, status: u16, payload: Option<String>) {
        (self.callback)(status, payload);
    }
}

impl std::fmt::Debug for PendingRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingRequest")
            .field("correlation_id", &self.correlation_id)
            .field("method", &self.method)
            .field("endpoint", &self.endpoint)
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

/// Table of pending requests plus the identifier counter.
pub(crate) struct Registry {
    entries: HashMap<u32, PendingRequest>,
    next_id: u32,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
            next_id: 1, // Start from 1, 0 is never assigned
        }
    }

    /// Allocate a correlation identifier unique among live entries.
    pub fn allocate_id(&mut self) -> u32 {
        loop {
            let id = self.next_id;
            self.next_id = self.next_id.checked_add(1).unwrap_or(1);
            if !self.entries.contains_key(&id) {
                return id;
            }
        }
    }

    /// Insert a pending request.
    pub fn insert(&mut self, request: PendingRequest) {
        let prev = self.entries.insert(request.correlation_id, request);
        debug_assert!(prev.is_none(), "correlation id reused while outstanding");
    }

    /// Whether an entry exists for this identifier.
    pub fn contains(&self, correlation_id: u32) -> bool {
        self.entries.contains_key(&correlation_id)
    }

    /// Remove and return the entry for this identifier, if any.
    pub fn take(&mut self, correlation_id: u32) -> Option<PendingRequest> {
        self.entries.remove(&correlation_id)
    }

    /// Number of pending requests.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no requests are pending.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The soonest deadline among pending requests.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.entries.values().map(|p| p.deadline).min()
    }

    /// Whether any pending request was dispatched to the given endpoint.
    pub fn has_pending_on(&self, endpoint: usize) -> bool {
        self.entries.values().any(|p| p.endpoint == endpoint)
    }

    /// Remove and return every entry whose deadline has passed, in
    /// ascending deadline order.
    pub fn take_expired(&mut self, now: Instant) -> Vec<PendingRequest> {
        let mut due: Vec<(Instant, u32)> = self
            .entries
            .values()
            .filter(|p| p.deadline <= now)
            .map(|p| (p.deadline, p.correlation_id))
            .collect();
        due.sort();

        due.into_iter()
            .filter_map(|(_, id)| self.entries.remove(&id))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn pending(id: u32, deadline: Instant) -> PendingRequest {
        PendingRequest {
            correlation_id: id,
            method: "convert".to_string(),
            endpoint: 0,
            submitted_at: Instant::now(),
            deadline,
            callback: Box::new(|_, _| {}),
        }
    }

    #[test]
    fn test_ids_are_sequential_from_one() {
        let mut registry = Registry::new();
        assert_eq!(registry.allocate_id(), 1);
        assert_eq!(registry.allocate_id(), 2);
        assert_eq!(registry.allocate_id(), 3);
    }

    #[test]
    fn test_allocation_skips_occupied_ids() {
        let mut registry = Registry::new();
        let now = Instant::now();

        // Occupy id 2, then rewind the counter as a wraparound would
        let id = registry.allocate_id();
        assert_eq!(id, 1);
        registry.insert(pending(2, now));
        registry.next_id = 2;

        assert_eq!(registry.allocate_id(), 3);
    }

    #[test]
    fn test_counter_wraps_past_zero() {
        let mut registry = Registry::new();
        registry.next_id = u32::MAX;
        assert_eq!(registry.allocate_id(), u32::MAX);
        // 0 is never assigned
        assert_eq!(registry.allocate_id(), 1);
    }

    #[test]
    fn test_insert_take() {
        let mut registry = Registry::new();
        let now = Instant::now();
        registry.insert(pending(5, now));

        assert!(registry.contains(5));
        assert_eq!(registry.len(), 1);

        let entry = registry.take(5).unwrap();
        assert_eq!(entry.correlation_id, 5);
        assert!(registry.is_empty());
        assert!(registry.take(5).is_none());
    }

    #[test]
    fn test_next_deadline_is_minimum() {
        let mut registry = Registry::new();
        let now = Instant::now();
        assert_eq!(registry.next_deadline(), None);

        registry.insert(pending(1, now + Duration::from_millis(300)));
        registry.insert(pending(2, now + Duration::from_millis(100)));
        registry.insert(pending(3, now + Duration::from_millis(200)));

        assert_eq!(registry.next_deadline(), Some(now + Duration::from_millis(100)));
    }

    #[test]
    fn test_take_expired_in_deadline_order() {
        let mut registry = Registry::new();
        let now = Instant::now();

        registry.insert(pending(1, now + Duration::from_millis(30)));
        registry.insert(pending(2, now + Duration::from_millis(10)));
        registry.insert(pending(3, now + Duration::from_millis(20)));
        registry.insert(pending(4, now + Duration::from_millis(500)));

        let expired = registry.take_expired(now + Duration::from_millis(100));
        let ids: Vec<u32> = expired.iter().map(|p| p.correlation_id).collect();
        assert_eq!(ids, vec![2, 3, 1]);

        // The far deadline stays pending
        assert_eq!(registry.len(), 1);
        assert!(registry.contains(4));
    }

    #[test]
    fn test_take_expired_none_due() {
        let mut registry = Registry::new();
        let now = Instant::now();
        registry.insert(pending(1, now + Duration::from_secs(10)));

        assert!(registry.take_expired(now).is_empty());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_has_pending_on() {
        let mut registry = Registry::new();
        let now = Instant::now();
        let mut entry = pending(1, now);
        entry.endpoint = 2;
        registry.insert(entry);

        assert!(registry.has_pending_on(2));
        assert!(!registry.has_pending_on(0));
    }

    #[test]
    fn test_resolve_consumes_entry_exactly_once() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        use std::sync::Arc;

        let fired = Arc::new(AtomicUsize::new(0));
        let fired_clone = fired.clone();

        let mut registry = Registry::new();
        let now = Instant::now();
        registry.insert(PendingRequest {
            correlation_id: 1,
            method: "convert".to_string(),
            endpoint: 0,
            submitted_at: now,
            deadline: now,
            callback: Box::new(move |status, payload| {
                assert_eq!(status, 200);
                assert_eq!(payload.as_deref(), Some("ok"));
                fired_clone.fetch_add(1, Ordering::SeqCst);
            }),
        });

        let entry = registry.take(1).unwrap();
        entry.resolve(200, Some("ok".to_string()));

        assert_eq!(fired.load(Ordering::SeqCst), 1);
        // Entry is gone; a duplicate reply finds nothing to resolve
        assert!(registry.take(1).is_none());
    }
}
