use std::sync::Arc;
use crate::index::set::{IdSet, Membership};

/// Query-scoped, bounded collection of set references.
///
/// Each reference is an `Arc` snapshot, so every held set stays stable for as long
/// as the query owns it, however the registry changes meanwhile.
#[derive(Debug)]
pub struct Sets {
    sets: Vec<Arc<IdSet>>,
    max: usize,
}

impl Sets {
    pub fn new(max: usize) -> Self {
        Sets {
            sets: Vec::with_capacity(max),
            max,
        }
    }

    /// Returns false, leaving the collection untouched, when already at capacity
    pub fn add(&mut self, set: Arc<IdSet>) -> bool {
        if self.sets.len() == self.max {
            return false;
        }
        self.sets.push(set);
        true
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.max
    }

    /// Ascending by cardinality so the cheapest membership checks run first.
    /// Insertion sort: k is tiny and the order is usually close to last time's.
    pub fn sort(&mut self) {
        for i in 1..self.sets.len() {
            let mut j = i;
            while j > 0 && self.sets[j - 1].len() > self.sets[j].len() {
                self.sets.swap(j - 1, j);
                j -= 1;
            }
        }
    }

    /// Remove and return the first (smallest, once sorted) set
    pub fn shift(&mut self) -> Option<Arc<IdSet>> {
        if self.sets.is_empty() {
            return None;
        }
        Some(self.sets.remove(0))
    }

    pub fn first(&self) -> Option<&Arc<IdSet>> {
        self.sets.first()
    }

    pub fn as_slice(&self) -> &[Arc<IdSet>] {
        &self.sets
    }

    pub fn clear(&mut self) {
        self.sets.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Id;

    fn set_of(n: u32) -> Arc<IdSet> {
        Arc::new(IdSet::set((1..=n).map(Id).collect()))
    }

    #[test]
    fn sorts_by_cardinality() {
        let mut sets = Sets::new(8);
        for n in [5, 1, 9, 3, 3, 0] {
            sets.add(set_of(n));
        }
        sets.sort();
        let lens: Vec<usize> = sets.as_slice().iter().map(|s| s.len()).collect();
        assert_eq!(lens, vec![0, 1, 3, 3, 5, 9]);
    }

    #[test]
    fn shift_takes_the_smallest() {
        let mut sets = Sets::new(4);
        sets.add(set_of(7));
        sets.add(set_of(2));
        sets.sort();

        assert_eq!(sets.shift().map(|s| s.len()), Some(2));
        assert_eq!(sets.len(), 1);
        assert_eq!(sets.first().map(|s| s.len()), Some(7));
        sets.shift();
        assert!(sets.shift().is_none());
    }

    #[test]
    fn refuses_past_capacity() {
        let mut sets = Sets::new(2);
        assert!(sets.add(set_of(1)));
        assert!(sets.add(set_of(2)));
        assert!(!sets.add(set_of(3)));
        assert_eq!(sets.len(), 2);

        sets.clear();
        assert!(sets.is_empty());
        assert_eq!(sets.capacity(), 2);
    }
}
