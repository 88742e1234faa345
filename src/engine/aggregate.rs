//! Aggregation of parallel transitions into one countable unit per pair.
//!
//! The canvas draws one edge per logical `(source, target)` pair no matter how
//! many underlying transitions share it; the count is the badge on that edge.
//! The engine keeps one aggregator per document, updated through the same
//! primitive-op interpreter that performs the writes, so forward edits and
//! undo/redo replay stay consistent by construction.

use crate::document::{
    StateMachineDocument, TransitionKey, TransitionSource, TransitionTarget,
};
use std::collections::HashMap;

/// Reference counts per logical transition pair.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TransitionAggregator {
    counts: HashMap<TransitionKey, usize>,
}

impl TransitionAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// The count for a pair, zero when absent.
    pub fn count(&self, key: TransitionKey) -> usize {
        self.counts.get(&key).copied().unwrap_or(0)
    }

    /// The aggregated entry for a pair, if any edge exists for it.
    pub fn get(&self, key: TransitionKey) -> Option<usize> {
        self.counts.get(&key).copied()
    }

    /// Number of distinct aggregated pairs.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (TransitionKey, usize)> + '_ {
        self.counts.iter().map(|(k, v)| (*k, *v))
    }

    pub(crate) fn increment(&mut self, key: TransitionKey) {
        *self.counts.entry(key).or_insert(0) += 1;
    }

    /// Drops the entry entirely when the last underlying edge goes away.
    pub(crate) fn decrement(&mut self, key: TransitionKey) {
        match self.counts.get_mut(&key) {
            Some(count) if *count > 1 => *count -= 1,
            Some(_) => {
                self.counts.remove(&key);
            }
            None => debug_assert!(false, "decremented an absent aggregated transition"),
        }
    }

    /// Recomputes the aggregation from a document. Used to seed loaded
    /// documents and by debug-build consistency checks.
    pub fn rebuild(document: &StateMachineDocument) -> Self {
        let mut agg = Self::new();
        for state in document.states() {
            let source = TransitionSource::State(state.id());
            for edge in state.transitions() {
                agg.increment(TransitionKey {
                    source,
                    target: edge.target(),
                });
            }
        }
        for edge in document.wildcard_transitions() {
            agg.increment(TransitionKey {
                source: TransitionSource::AnyState,
                target: edge.target(),
            });
        }
        for state in document.exit_markers() {
            agg.increment(TransitionKey {
                source: TransitionSource::State(*state),
                target: TransitionTarget::Exit,
            });
        }
        if document.wildcard_exit().is_some() {
            agg.increment(TransitionKey {
                source: TransitionSource::AnyState,
                target: TransitionTarget::Exit,
            });
        }
        agg
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::StateId;

    #[test]
    fn counts_accumulate_per_pair() {
        let a = StateId::new();
        let b = StateId::new();
        let key = TransitionKey::between(a, b);

        let mut agg = TransitionAggregator::new();
        assert_eq!(agg.count(key), 0);
        assert_eq!(agg.get(key), None);

        agg.increment(key);
        agg.increment(key);
        assert_eq!(agg.count(key), 2);
        assert_eq!(agg.len(), 1);
    }

    #[test]
    fn reverse_pair_is_a_separate_entry() {
        let a = StateId::new();
        let b = StateId::new();

        let mut agg = TransitionAggregator::new();
        agg.increment(TransitionKey::between(a, b));
        agg.increment(TransitionKey::between(b, a));
        assert_eq!(agg.len(), 2);
        assert_eq!(agg.count(TransitionKey::between(a, b)), 1);
    }

    #[test]
    fn last_decrement_drops_the_entry() {
        let key = TransitionKey::between(StateId::new(), StateId::new());
        let mut agg = TransitionAggregator::new();

        agg.increment(key);
        agg.increment(key);
        agg.decrement(key);
        assert_eq!(agg.get(key), Some(1));

        agg.decrement(key);
        assert_eq!(agg.get(key), None);
        assert!(agg.is_empty());
    }
}
