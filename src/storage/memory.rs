use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use crate::core::error::Result;
use crate::core::types::Id;
use crate::storage::batcher::{Batcher, IN_PLACEHOLDER};
use crate::storage::codec::{decode_id_map, decode_ids};
use crate::storage::{Fetched, Fetcher, IndexKind, IndexWrite, Storage, StoredResource};

/// In-process backend. Batched fills still go through a `Batcher` so round trips are
/// counted the same way a remote backend would pay for them.
pub struct MemoryStorage {
    inner: RwLock<MemoryInner>,
    batcher: Batcher,
    sequence: AtomicU64,
    gets: AtomicUsize,
    batches: Mutex<Vec<usize>>,
}

#[derive(Default)]
struct MemoryInner {
    resources: HashMap<Id, (u64, StoredResource)>,
    indexes: HashMap<(IndexKind, String), Bytes>,
    ids: Bytes,
    updated: HashSet<(IndexKind, String)>,
}

impl MemoryInner {
    fn put_index(&mut self, kind: IndexKind, name: &str, payload: &[u8]) -> Vec<Id> {
        self.indexes.insert((kind, name.to_string()), Bytes::copy_from_slice(payload));
        self.updated.insert((kind, name.to_string()));
        decode_ids(payload)
    }
}

impl MemoryStorage {
    pub fn new(batch_sizes: &[usize]) -> Self {
        MemoryStorage {
            inner: RwLock::new(MemoryInner::default()),
            batcher: Batcher::new(IN_PLACEHOLDER, batch_sizes),
            sequence: AtomicU64::new(0),
            gets: AtomicUsize::new(0),
            batches: Mutex::new(Vec::new()),
        }
    }

    /// Single-resource lookups served so far
    pub fn gets(&self) -> usize {
        self.gets.load(Ordering::Relaxed)
    }

    /// Size of every batch drawn by `fill`, in order
    pub fn batches(&self) -> Vec<usize> {
        self.batches.lock().clone()
    }

    pub fn resource_count(&self) -> usize {
        self.inner.read().resources.len()
    }

    fn each(&self, kind: IndexKind, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        let inner = self.inner.read();
        let mut names: Vec<&String> = inner
            .indexes
            .keys()
            .filter(|(k, name)| *k == kind && (!only_new || inner.updated.contains(&(kind, name.clone()))))
            .map(|(_, name)| name)
            .collect();
        names.sort_unstable();

        for name in names {
            let blob = &inner.indexes[&(kind, name.clone())];
            f(name, decode_ids(blob));
        }
        Ok(())
    }

    fn upsert(&self, kind: IndexKind, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        let mut inner = self.inner.write();
        Ok(inner.put_index(kind, name, payload))
    }

    fn remove(&self, kind: IndexKind, name: &str) -> Result<()> {
        let mut inner = self.inner.write();
        inner.indexes.remove(&(kind, name.to_string()));
        inner.updated.remove(&(kind, name.to_string()));
        Ok(())
    }

    fn count(&self, kind: IndexKind) -> u32 {
        self.inner.read().indexes.keys().filter(|(k, _)| *k == kind).count() as u32
    }
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new(&[25, 20, 15, 10, 5, 4, 3, 2, 1])
    }
}

impl Fetcher for MemoryStorage {
    fn get(&self, id: Id) -> Result<Option<Fetched>> {
        self.gets.fetch_add(1, Ordering::Relaxed);
        let inner = self.inner.read();
        Ok(inner.resources.get(&id).map(|(_, r)| Fetched {
            id,
            payload: r.details.clone().unwrap_or_else(|| r.summary.clone()),
            tpe: r.tpe.clone(),
            detailed: r.details.is_some(),
        }))
    }

    fn fill(&self, ids: &[Id], detailed: bool, found: &mut dyn FnMut(Fetched)) -> Result<()> {
        let inner = self.inner.read();
        for batch in self.batcher.query(ids) {
            self.batches.lock().push(batch.size);
            for id in batch.ids {
                let Some((_, resource)) = inner.resources.get(id) else {
                    continue;
                };
                let (payload, is_detailed) = match (&resource.details, detailed) {
                    (Some(details), true) => (details.clone(), true),
                    _ => (resource.summary.clone(), false),
                };
                found(Fetched {
                    id: *id,
                    payload,
                    tpe: resource.tpe.clone(),
                    detailed: is_detailed,
                });
            }
        }
        Ok(())
    }

    fn load_n_resources(&self, n: usize) -> Result<Vec<StoredResource>> {
        let inner = self.inner.read();
        let mut all: Vec<&(u64, StoredResource)> = inner.resources.values().collect();
        all.sort_unstable_by(|a, b| b.0.cmp(&a.0));
        Ok(all.into_iter().take(n).map(|(_, r)| r.clone()).collect())
    }
}

impl Storage for MemoryStorage {
    fn set_count(&self) -> u32 {
        self.count(IndexKind::Set)
    }

    fn list_count(&self) -> u32 {
        self.count(IndexKind::List)
    }

    fn each_set(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        self.each(IndexKind::Set, only_new, f)
    }

    fn each_list(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        self.each(IndexKind::List, only_new, f)
    }

    fn upsert_set(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        self.upsert(IndexKind::Set, name, payload)
    }

    fn upsert_list(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        self.upsert(IndexKind::List, name, payload)
    }

    fn upsert_indexes(&self, writes: &[IndexWrite]) -> Result<Vec<Vec<Id>>> {
        let mut inner = self.inner.write();
        Ok(writes
            .iter()
            .map(|write| inner.put_index(write.kind, &write.name, &write.payload))
            .collect())
    }

    fn remove_set(&self, name: &str) -> Result<()> {
        self.remove(IndexKind::Set, name)
    }

    fn remove_list(&self, name: &str) -> Result<()> {
        self.remove(IndexKind::List, name)
    }

    fn load_ids(&self) -> Result<HashMap<String, Id>> {
        decode_id_map(&self.inner.read().ids)
    }

    fn update_ids(&self, payload: &[u8]) -> Result<HashMap<String, Id>> {
        let ids = decode_id_map(payload)?;
        self.inner.write().ids = Bytes::copy_from_slice(payload);
        Ok(ids)
    }

    fn upsert_resource(&self, resource: &StoredResource) -> Result<()> {
        let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.inner.write().resources.insert(resource.id, (seq, resource.clone()));
        Ok(())
    }

    fn remove_resource(&self, id: Id) -> Result<()> {
        self.inner.write().resources.remove(&id);
        Ok(())
    }

    fn clear_new(&self) -> Result<()> {
        self.inner.write().updated.clear();
        Ok(())
    }
}
