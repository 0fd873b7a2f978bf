use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use tracing::{debug, warn};
use crate::cache::bucket::{Bucket, Item, Value};
use crate::core::error::Result;
use crate::core::intern::Interner;
use crate::core::stats::CacheStats;
use crate::core::types::{Id, Projection, Tag};
use crate::memory::tracker::SizeTracker;
use crate::search::results::ResultBuffer;
use crate::storage::{Fetched, Fetcher};

/// Sharded TTL cache of resource payloads.
///
/// Two partitions share the shard layout: summaries and details. A detailed slot may
/// hold `Value::SummaryOnly`, meaning the resource has no richer projection and the
/// summary partition should be consulted. Size is tracked approximately; crossing
/// the limit starts one background sampling GC pass at a time.
pub struct Cache {
    shared: Arc<Shared>,
    fetcher: Arc<dyn Fetcher>,
    interner: Arc<Interner>,
    ttl: Duration,
}

struct Shared {
    summary: Vec<Bucket>,
    details: Vec<Bucket>,
    mask: usize,
    tracker: SizeTracker,
    gcing: AtomicBool,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    gc_runs: AtomicU64,
    last_gc: RwLock<Option<DateTime<Utc>>>,
}

impl Shared {
    fn bucket(&self, id: Id, projection: Projection) -> &Bucket {
        let index = id.0 as usize & self.mask;
        match projection {
            Projection::Summary => &self.summary[index],
            Projection::Detailed => &self.details[index],
        }
    }

    /// One sampling pass over every bucket of both partitions
    fn collect(&self) -> (i64, u64) {
        let mut freed = 0;
        let mut evicted = 0;
        for bucket in self.details.iter().chain(self.summary.iter()) {
            if let Some(size) = bucket.gc() {
                freed += size;
                evicted += 1;
            }
        }
        self.tracker.release(freed);
        self.evictions.fetch_add(evicted, Ordering::Relaxed);
        self.gc_runs.fetch_add(1, Ordering::Relaxed);
        *self.last_gc.write() = Some(Utc::now());
        debug!(freed, evicted, usage = self.tracker.current_usage(), "cache gc pass");
        (freed, evicted)
    }
}

impl Cache {
    /// `buckets` is rounded up to a power of two
    pub fn new(fetcher: Arc<dyn Fetcher>, interner: Arc<Interner>, max_size: i64, ttl: Duration, buckets: usize) -> Self {
        let buckets = buckets.max(1).next_power_of_two();
        Cache {
            shared: Arc::new(Shared {
                summary: (0..buckets).map(|_| Bucket::new()).collect(),
                details: (0..buckets).map(|_| Bucket::new()).collect(),
                mask: buckets - 1,
                tracker: SizeTracker::new(max_size),
                gcing: AtomicBool::new(false),
                hits: AtomicU64::new(0),
                misses: AtomicU64::new(0),
                evictions: AtomicU64::new(0),
                gc_runs: AtomicU64::new(0),
                last_gc: RwLock::new(None),
            }),
            fetcher,
            interner,
            ttl,
        }
    }

    /// Richest projection of `id`, optionally requiring its type to match `tpe`
    pub fn fetch(&self, id: Id, tpe: Option<&str>) -> Option<Bytes> {
        self.fetch_projection(id, tpe, Projection::Detailed)
    }

    pub fn fetch_projection(&self, id: Id, tpe: Option<&str>, projection: Projection) -> Option<Bytes> {
        let wanted = match tpe {
            Some(name) => Some(self.interner.intern(name)),
            None => None,
        };
        self.fetch_tagged(id, wanted, projection)
    }

    fn fetch_tagged(&self, id: Id, wanted: Option<Tag>, projection: Projection) -> Option<Bytes> {
        if let Some(item) = self.get(id, projection) {
            match &item.value {
                Value::SummaryOnly => return self.fetch_tagged(id, wanted, Projection::Summary),
                Value::Payload { tag, data } => {
                    self.shared.hits.fetch_add(1, Ordering::Relaxed);
                    return matches_tag(wanted, *tag).then(|| data.clone());
                }
            }
        }

        self.shared.misses.fetch_add(1, Ordering::Relaxed);
        let fetched = match projection {
            // `get` returns the richest projection, so a summary means no details exist
            Projection::Detailed => self.fetcher.get(id),
            Projection::Summary => self.fetch_summary(id),
        };
        let fetched = match fetched {
            Ok(Some(fetched)) => fetched,
            Ok(None) => return None,
            Err(e) => {
                warn!(%id, error = %e, "resource fetch failed");
                return None;
            }
        };
        let tag = self.store(&fetched, projection.is_detailed());
        matches_tag(wanted, tag).then_some(fetched.payload)
    }

    fn fetch_summary(&self, id: Id) -> Result<Option<Fetched>> {
        let mut found = None;
        self.fetcher.fill(&[id], false, &mut |fetched| found = Some(fetched))?;
        Ok(found)
    }

    /// Load payloads for every id in `result`. Cached ids are answered locally, the rest
    /// go to the fetcher in one batched call and are cached on the way back.
    pub fn fill(&self, result: &mut ResultBuffer, detailed: bool) -> Result<()> {
        let projection = Projection::from_detailed(detailed);
        let mut misses = Vec::new();
        let mut slots = HashMap::new();

        for index in 0..result.len() {
            let id = result.ids[index];
            let payload = self.lookup(id, projection);
            if payload.is_none() {
                misses.push(id);
                slots.insert(id, index);
            }
            result.set_payload(index, payload);
        }

        let hits = (result.len() - misses.len()) as u64;
        self.shared.hits.fetch_add(hits, Ordering::Relaxed);
        if misses.is_empty() {
            return Ok(());
        }
        self.shared.misses.fetch_add(misses.len() as u64, Ordering::Relaxed);
        debug!(misses = misses.len(), detailed, "filling cache misses");

        self.fetcher.fill(&misses, detailed, &mut |fetched| {
            if let Some(index) = slots.get(&fetched.id) {
                self.store(&fetched, detailed);
                result.set_payload(*index, Some(fetched.payload));
            }
        })
    }

    /// Cache a payload under the given projection
    pub fn set(&self, id: Id, tpe: Option<&str>, payload: Bytes, projection: Projection) {
        let tag = self.interner.tag_of(tpe);
        self.insert(id, Value::Payload { tag, data: payload }, projection);
    }

    /// Drop `id` from both partitions
    pub fn remove(&self, id: Id) {
        for projection in [Projection::Detailed, Projection::Summary] {
            if let Some(item) = self.shared.bucket(id, projection).remove(id) {
                self.shared.tracker.release(item.size());
            }
        }
    }

    /// Warm the cache with the `n` most recently stored resources
    pub fn preload(&self, n: usize) -> Result<usize> {
        if n == 0 {
            return Ok(0);
        }
        let resources = self.fetcher.load_n_resources(n)?;
        for resource in &resources {
            let tag = self.interner.tag_of(resource.tpe.as_deref());
            self.insert(resource.id, Value::Payload { tag, data: resource.summary.clone() }, Projection::Summary);
            let details = match &resource.details {
                Some(data) => Value::Payload { tag, data: data.clone() },
                None => Value::SummaryOnly,
            };
            self.insert(resource.id, details, Projection::Detailed);
        }
        Ok(resources.len())
    }

    /// Run a GC pass on the calling thread; returns bytes freed and entries evicted
    pub fn collect(&self) -> (i64, u64) {
        self.shared.collect()
    }

    /// Approximate resident payload bytes
    pub fn size(&self) -> i64 {
        self.shared.tracker.current_usage()
    }

    pub fn is_collecting(&self) -> bool {
        self.shared.gcing.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> CacheStats {
        let shared = &self.shared;
        CacheStats {
            hits: shared.hits.load(Ordering::Relaxed),
            misses: shared.misses.load(Ordering::Relaxed),
            evictions: shared.evictions.load(Ordering::Relaxed),
            gc_runs: shared.gc_runs.load(Ordering::Relaxed),
            entries: shared.summary.iter().chain(shared.details.iter()).map(Bucket::len).sum(),
            size_bytes: shared.tracker.current_usage(),
            limit_bytes: shared.tracker.limit,
            last_gc: *shared.last_gc.read(),
        }
    }

    /// Live payload for `id`, following the summary-only marker
    fn lookup(&self, id: Id, projection: Projection) -> Option<Bytes> {
        let item = self.get(id, projection)?;
        match &item.value {
            Value::Payload { data, .. } => Some(data.clone()),
            Value::SummaryOnly => self.lookup(id, Projection::Summary),
        }
    }

    /// Unexpired item, removing it when stale
    fn get(&self, id: Id, projection: Projection) -> Option<Arc<Item>> {
        let bucket = self.shared.bucket(id, projection);
        let item = bucket.get(id)?;
        if !item.is_expired(Instant::now()) {
            return Some(item);
        }
        if bucket.remove_if_same(id, &item) {
            self.shared.tracker.release(item.size());
        }
        None
    }

    /// Cache what a fetcher returned and hand back its tag. When details were asked
    /// for but only a summary came back, the detailed slot is marked summary-only.
    fn store(&self, fetched: &Fetched, wanted_details: bool) -> Tag {
        let tag = self.interner.tag_of(fetched.tpe.as_deref());
        let value = Value::Payload { tag, data: fetched.payload.clone() };
        if fetched.detailed {
            self.insert(fetched.id, value, Projection::Detailed);
        } else {
            self.insert(fetched.id, value, Projection::Summary);
            if wanted_details {
                self.insert(fetched.id, Value::SummaryOnly, Projection::Detailed);
            }
        }
        tag
    }

    fn insert(&self, id: Id, value: Value, projection: Projection) {
        let item = Arc::new(Item::new(value, Instant::now() + self.ttl));
        let size = item.size();
        let delta = match self.shared.bucket(id, projection).set(id, item) {
            Some(old) => size - old.size(),
            None => size,
        };
        if self.shared.tracker.adjust(delta) {
            self.start_gc();
        }
    }

    fn start_gc(&self) {
        if self
            .shared
            .gcing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }
        let shared = self.shared.clone();
        std::thread::spawn(move || {
            shared.collect();
            shared.gcing.store(false, Ordering::Release);
        });
    }
}

fn matches_tag(wanted: Option<Tag>, actual: Tag) -> bool {
    wanted.is_none_or(|tag| tag == actual)
}
