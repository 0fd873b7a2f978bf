use std::collections::HashMap;
use bytes::Bytes;
use crate::core::error::Result;
use crate::core::types::Id;

pub mod batcher;
pub mod codec;
pub mod memory;
pub mod sqlite;

/// Kind column shared by every backend: the dictionary row, sets and lists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexKind {
    Ids = 1,
    Set = 2,
    List = 3,
}

/// One resource payload as handed back by a backend
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub id: Id,
    pub payload: Bytes,
    pub tpe: Option<String>,
    /// False when only the summary projection exists
    pub detailed: bool,
}

/// One serialized set or list in a batched write
#[derive(Debug, Clone, PartialEq)]
pub struct IndexWrite {
    pub kind: IndexKind,
    pub name: String,
    pub payload: Vec<u8>,
}

/// A resource with both projections, as persisted
#[derive(Debug, Clone, PartialEq)]
pub struct StoredResource {
    pub id: Id,
    pub tpe: Option<String>,
    pub summary: Bytes,
    pub details: Option<Bytes>,
}

/// Read side consumed by the resource cache
pub trait Fetcher: Send + Sync {
    /// Richest available projection of a single resource
    fn get(&self, id: Id) -> Result<Option<Fetched>>;

    /// Batched lookup of `ids`. `found` is called once per id that exists; ids with no
    /// stored resource are skipped.
    fn fill(&self, ids: &[Id], detailed: bool, found: &mut dyn FnMut(Fetched)) -> Result<()>;

    /// The `n` most recently stored resources, for warming the cache
    fn load_n_resources(&self, n: usize) -> Result<Vec<StoredResource>>;
}

/// Durable home of sets, lists, the id dictionary and resources
pub trait Storage: Fetcher {
    fn set_count(&self) -> u32;

    fn list_count(&self) -> u32;

    /// Every set (or only those changed since the last `clear_new`)
    fn each_set(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()>;

    fn each_list(&self, only_new: bool, f: &mut dyn FnMut(&str, Vec<Id>)) -> Result<()>;

    /// Persist a serialized set and return the decoded ids
    fn upsert_set(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>>;

    fn upsert_list(&self, name: &str, payload: &[u8]) -> Result<Vec<Id>>;

    /// Persist every write or none of them. Returns the decoded ids of each write, in
    /// order.
    fn upsert_indexes(&self, writes: &[IndexWrite]) -> Result<Vec<Vec<Id>>>;

    fn remove_set(&self, name: &str) -> Result<()>;

    fn remove_list(&self, name: &str) -> Result<()>;

    fn load_ids(&self) -> Result<HashMap<String, Id>>;

    /// Persist a serialized dictionary and return the decoded map
    fn update_ids(&self, payload: &[u8]) -> Result<HashMap<String, Id>>;

    fn upsert_resource(&self, resource: &StoredResource) -> Result<()>;

    fn remove_resource(&self, id: Id) -> Result<()>;

    /// Forget change tracking used by `only_new` loads
    fn clear_new(&self) -> Result<()>;
}
