//! Per-source sequence numbering.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use crate::core::{Address, SEQUENCE_BASE};

/// Hands out strictly increasing sequence numbers per packet source.
///
/// A source's counter starts at the configured base on first use and lives
/// for the lifetime of the allocator; tearing a connection down does not
/// reset it. Counters wrap on `u64` overflow.
#[derive(Debug)]
pub struct SequenceAllocator {
    base: u64,
    counters: Mutex<HashMap<Address, u64>>,
}

impl Default for SequenceAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl SequenceAllocator {
    /// Create an allocator seeded at [`SEQUENCE_BASE`].
    pub fn new() -> Self {
        Self::with_base(SEQUENCE_BASE)
    }

    /// Create an allocator seeded at `base`.
    pub fn with_base(base: u64) -> Self {
        Self {
            base,
            counters: Mutex::new(HashMap::new()),
        }
    }

    /// Take the next sequence number for `source`.
    pub fn next(&self, source: &Address) -> u64 {
        let mut counters = self.counters.lock().unwrap_or_else(PoisonError::into_inner);
        let slot = counters.entry(source.clone()).or_insert(self.base);
        let sequence = *slot;
        *slot = slot.wrapping_add(1);
        sequence
    }

    /// The number the next call to [`next`](Self::next) would return, if the
    /// source has been seen.
    pub fn peek(&self, source: &Address) -> Option<u64> {
        self.counters
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(source)
            .copied()
    }

    /// The configured base.
    pub fn base(&self) -> u64 {
        self.base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn participant(id: &str) -> Address {
        Address::Participant(id.into())
    }

    #[test]
    fn test_first_call_returns_base() {
        let alloc = SequenceAllocator::new();
        assert_eq!(alloc.next(&participant("alice")), SEQUENCE_BASE);
        assert_eq!(alloc.next(&participant("alice")), SEQUENCE_BASE + 1);
    }

    #[test]
    fn test_sources_are_independent() {
        let alloc = SequenceAllocator::with_base(10);
        assert_eq!(alloc.next(&participant("alice")), 10);
        assert_eq!(alloc.next(&Address::Router), 10);
        assert_eq!(alloc.next(&participant("alice")), 11);
        assert_eq!(alloc.next(&Address::Endpoint("food".into())), 10);
        assert_eq!(alloc.peek(&participant("alice")), Some(12));
        assert_eq!(alloc.peek(&participant("bob")), None);
    }

    #[test]
    fn test_participant_and_endpoint_with_same_name_do_not_share() {
        let alloc = SequenceAllocator::new();
        alloc.next(&participant("food"));
        assert_eq!(alloc.next(&Address::Endpoint("food".into())), SEQUENCE_BASE);
    }

    #[test]
    fn test_wraps_on_overflow() {
        let alloc = SequenceAllocator::with_base(u64::MAX);
        assert_eq!(alloc.next(&Address::Router), u64::MAX);
        assert_eq!(alloc.next(&Address::Router), 0);
    }

    #[test]
    fn test_concurrent_callers_get_distinct_increasing_numbers() {
        let alloc = Arc::new(SequenceAllocator::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let alloc = Arc::clone(&alloc);
                std::thread::spawn(move || {
                    let mine = participant(if i % 2 == 0 { "alice" } else { "bob" });
                    let mut seen = Vec::new();
                    for _ in 0..100 {
                        seen.push(alloc.next(&mine));
                        alloc.next(&Address::Router);
                    }
                    seen
                })
            })
            .collect();

        let mut all_alice = Vec::new();
        for (i, handle) in handles.into_iter().enumerate() {
            let seen = handle.join().unwrap();
            assert!(seen.windows(2).all(|w| w[0] < w[1]));
            if i % 2 == 0 {
                all_alice.extend(seen);
            }
        }

        all_alice.sort_unstable();
        all_alice.dedup();
        assert_eq!(all_alice.len(), 400);
        assert_eq!(alloc.peek(&Address::Router), Some(SEQUENCE_BASE + 800));
    }
}
