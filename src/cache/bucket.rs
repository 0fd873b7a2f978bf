use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use bytes::Bytes;
use parking_lot::RwLock;
use crate::core::types::{Id, Tag};

/// Entries inspected per bucket in one GC pass
pub const GC_SAMPLE: usize = 10;

/// What a cache slot holds
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Payload { tag: Tag, data: Bytes },
    /// Stored in the detailed partition when only a summary exists
    SummaryOnly,
}

#[derive(Debug)]
pub struct Item {
    pub expires: Instant,
    pub value: Value,
}

impl Item {
    pub fn new(value: Value, expires: Instant) -> Self {
        Item { expires, value }
    }

    /// Bytes charged against the cache size
    pub fn size(&self) -> i64 {
        match &self.value {
            Value::Payload { data, .. } => data.len() as i64,
            Value::SummaryOnly => 0,
        }
    }

    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires <= now
    }
}

/// One shard of a cache partition
#[derive(Default)]
pub struct Bucket {
    lookup: RwLock<HashMap<Id, Arc<Item>>>,
}

impl Bucket {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: Id) -> Option<Arc<Item>> {
        self.lookup.read().get(&id).cloned()
    }

    /// Insert or replace, handing back what was there
    pub fn set(&self, id: Id, item: Arc<Item>) -> Option<Arc<Item>> {
        self.lookup.write().insert(id, item)
    }

    pub fn remove(&self, id: Id) -> Option<Arc<Item>> {
        self.lookup.write().remove(&id)
    }

    /// Remove `id` only if it still maps to `item`
    pub fn remove_if_same(&self, id: Id, item: &Arc<Item>) -> bool {
        let mut lookup = self.lookup.write();
        match lookup.get(&id) {
            Some(current) if Arc::ptr_eq(current, item) => {
                lookup.remove(&id);
                true
            }
            _ => false,
        }
    }

    /// Earliest-expiring entry among the first `GC_SAMPLE` visited
    pub fn oldest_sampled(&self) -> Option<(Id, Arc<Item>)> {
        let lookup = self.lookup.read();
        lookup
            .iter()
            .take(GC_SAMPLE)
            .min_by_key(|(_, item)| item.expires)
            .map(|(id, item)| (*id, item.clone()))
    }

    /// Sample, then evict the oldest entry. Returns the bytes freed.
    pub fn gc(&self) -> Option<i64> {
        let (id, oldest) = self.oldest_sampled()?;
        self.remove_if_same(id, &oldest).then(|| oldest.size())
    }

    pub fn len(&self) -> usize {
        self.lookup.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lookup.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn payload(data: &'static [u8], expires: Instant) -> Arc<Item> {
        Arc::new(Item::new(
            Value::Payload { tag: Tag::UNTYPED, data: Bytes::from_static(data) },
            expires,
        ))
    }

    #[test]
    fn set_returns_replaced_item() {
        let bucket = Bucket::new();
        let now = Instant::now();
        assert!(bucket.set(Id(1), payload(b"abc", now)).is_none());
        let old = bucket.set(Id(1), payload(b"a", now)).unwrap();
        assert_eq!(old.size(), 3);
        assert_eq!(bucket.get(Id(1)).unwrap().size(), 1);
    }

    #[test]
    fn gc_evicts_earliest_expiry() {
        let bucket = Bucket::new();
        let now = Instant::now();
        bucket.set(Id(1), payload(b"late", now + Duration::from_secs(60)));
        bucket.set(Id(2), payload(b"soon!", now + Duration::from_secs(1)));
        bucket.set(Id(3), payload(b"mid", now + Duration::from_secs(30)));

        assert_eq!(bucket.gc(), Some(5));
        assert!(bucket.get(Id(2)).is_none());
        assert_eq!(bucket.len(), 2);
    }

    #[test]
    fn gc_on_empty_bucket_frees_nothing() {
        assert_eq!(Bucket::new().gc(), None);
    }

    #[test]
    fn remove_if_same_ignores_replaced_entries() {
        let bucket = Bucket::new();
        let now = Instant::now();
        let first = payload(b"x", now);
        bucket.set(Id(1), first.clone());
        bucket.set(Id(1), payload(b"y", now));
        assert!(!bucket.remove_if_same(Id(1), &first));
        assert!(bucket.get(Id(1)).is_some());
    }

    #[test]
    fn summary_marker_is_free() {
        let item = Item::new(Value::SummaryOnly, Instant::now());
        assert_eq!(item.size(), 0);
        assert!(item.is_expired(Instant::now()));
    }
}
