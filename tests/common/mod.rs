#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use crossbeam::channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use rankdex::storage::memory::MemoryStorage;
use rankdex::storage::{Fetched, Fetcher, IndexWrite, Storage, StoredResource};
use rankdex::{Config, Error, ErrorKind, Id, Result};

pub fn config() -> Config {
    Config {
        query_pool_size: 2,
        ..Config::default()
    }
}

struct Gate {
    entered: Sender<()>,
    release: Receiver<()>,
}

/// In-memory storage with switchable failures and a one-shot pause in `update_ids`
#[derive(Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    fail_reads: AtomicBool,
    fail_index_writes: AtomicBool,
    ids_gate: Mutex<Option<Gate>>,
}

impl FaultyStorage {
    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_index_writes(&self, fail: bool) {
        self.fail_index_writes.store(fail, Ordering::SeqCst);
    }

    /// The next `update_ids` signals the first channel, then waits on the second
    pub fn pause_next_ids_update(&self) -> (Receiver<()>, Sender<()>) {
        let (entered_tx, entered_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        *self.ids_gate.lock() = Some(Gate {
            entered: entered_tx,
            release: release_rx,
        });
        (entered_rx, release_tx)
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(Error::new(ErrorKind::Storage, format!("{} unavailable", what)));
        }
        Ok(())
    }
}

impl Fetcher for FaultyStorage {
    fn get(&self, id: Id) -> Result<Option<Fetched>> {
        Self::check(&self.fail_reads, "get")?;
        self.inner.get(id)
    }

    fn fill(&self, ids: &[Id], detailed: bool, found: &mut dyn FnMut(Fetched)) -> Result<()> {
        Self::check(&self.fail_reads, "fill")?;
        self.inner.fill(ids, detailed, found)
    }

    fn load_n_resources(&self, n: usize) -> Result<Vec<StoredResource>> {
        self.inner.load_n_resources(n)
    }
}

impl Storage for FaultyStorage {
    fn set_count(&self) -> u32 {
        self.inner.set_count()
    }

    fn list_count(&self) -> u32 {
        self.inner.list_count()
    }

    fn each_set(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        self.inner.each_set(only_new, f)
    }

    fn each_list(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()> {
        self.inner.each_list(only_new, f)
    }

    fn upsert_set(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        self.inner.upsert_set(name, payload)
    }

    fn upsert_list(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>> {
        self.inner.upsert_list(name, payload)
    }

    fn upsert_indexes(&self, writes: &[IndexWrite]) -> Result<Vec<Vec<Id>>> {
        Self::check(&self.fail_index_writes, "index write")?;
        self.inner.upsert_indexes(writes)
    }

    fn remove_set(&self, name: &str) -> Result<()> {
        self.inner.remove_set(name)
    }

    fn remove_list(&self, name: &str) -> Result<()> {
        self.inner.remove_list(name)
    }

    fn load_ids(&self) -> Result<HashMap<String, Id>> {
        self.inner.load_ids()
    }

    fn update_ids(&self, payload: &[u8]) -> Result<HashMap<String, Id>> {
        let gate = self.ids_gate.lock().take();
        if let Some(gate) = gate {
            let _ = gate.entered.send(());
            let _ = gate.release.recv();
        }
        self.inner.update_ids(payload)
    }

    fn upsert_resource(&self, resource: &StoredResource) -> Result<()> {
        self.inner.upsert_resource(resource)
    }

    fn remove_resource(&self, id: Id) -> Result<()> {
        self.inner.remove_resource(id)
    }

    fn clear_new(&self) -> Result<()> {
        self.inner.clear_new()
    }
}
