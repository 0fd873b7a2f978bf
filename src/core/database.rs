use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard, RwLock};
use rayon::prelude::*;
use tracing::{info, warn};
use crate::cache::Cache;
use crate::core::config::Config;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::idmap::IdMap;
use crate::core::intern::Interner;
use crate::core::stats::DatabaseStats;
use crate::core::types::{Id, Projection};
use crate::index::set::IdSet;
use crate::memory::pool::Pool;
use crate::query::{Query, QueryState};
use crate::storage::codec::{encode_id_map, encode_ids};
use crate::storage::memory::MemoryStorage;
use crate::storage::sqlite::SqliteStorage;
use crate::storage::{Fetcher, Storage, StoredResource};
use crate::writer::updater::Updater;

/// Longest external id the dictionary blob can encode
const MAX_EXTERNAL_LEN: usize = u8::MAX as usize;

type Registry = RwLock<HashMap<String, Arc<IdSet>>>;

pub struct Database {
    config: Config,

    storage: Arc<dyn Storage>,
    ids: IdMap,
    // Held from assigning new ids until the dictionary is persisted
    dictionary: Mutex<()>,
    interner: Arc<Interner>,

    // Immutable snapshots, swapped whole on change
    sets: Registry,
    lists: Registry,

    cache: Cache,
    queries: Pool<QueryState>, // admission control for in-flight queries

    query_count: AtomicU64,
}

impl Database {
    pub fn open<S: Storage + 'static>(storage: Arc<S>, config: Config) -> Result<Self> {
        let fetcher: Arc<dyn Fetcher> = storage.clone();
        let storage: Arc<dyn Storage> = storage;

        let interner = Arc::new(Interner::new());
        let cache = Cache::new(
            fetcher,
            interner.clone(),
            config.cache_size,
            config.cache_ttl(),
            config.bucket_count(),
        );

        let (max_sets, max_results, default_limit) = (config.max_sets, config.max_results, config.default_limit);
        let queries = Pool::new(config.query_pool_size, || QueryState::new(max_sets, max_results, default_limit));

        let db = Database {
            ids: IdMap::new(),
            dictionary: Mutex::new(()),
            sets: RwLock::new(HashMap::with_capacity(storage.set_count() as usize)),
            lists: RwLock::new(HashMap::with_capacity(storage.list_count() as usize)),
            storage,
            interner,
            cache,
            queries,
            query_count: AtomicU64::new(0),
            config,
        };

        db.reload(false)?;
        let preloaded = db.cache.preload(db.config.cache_preload)?;
        info!(
            sets = db.sets.read().len(),
            lists = db.lists.read().len(),
            ids = db.ids.len(),
            preloaded,
            "database opened"
        );
        Ok(db)
    }

    /// Open (or create) the SQLite file at `config.storage_path`
    pub fn open_sqlite(config: Config) -> Result<Self> {
        let storage = SqliteStorage::open(&config.storage_path, &config.batch_sizes)?;
        Self::open(Arc::new(storage), config)
    }

    /// Database over process memory only
    pub fn in_memory(config: Config) -> Result<Self> {
        let storage = MemoryStorage::new(&config.batch_sizes);
        Self::open(Arc::new(storage), config)
    }

    /// Load sets, lists and the id dictionary from storage. With `only_new`, only what
    /// changed since the last reload is rebuilt; otherwise the registries are replaced.
    pub fn reload(&self, only_new: bool) -> Result<()> {
        {
            let _writer = self.dictionary.lock();
            self.ids.load(self.storage.load_ids()?);
        }

        let threshold = self.config.small_set_threshold;
        let sets = self.load_indexes(only_new, threshold, false)?;
        let lists = self.load_indexes(only_new, threshold, true)?;
        let (set_count, list_count) = (sets.len(), lists.len());

        Self::install(&self.sets, sets, only_new);
        Self::install(&self.lists, lists, only_new);
        self.storage.clear_new()?;

        if only_new {
            info!(sets = set_count, lists = list_count, "reloaded changed indexes");
        }
        Ok(())
    }

    fn load_indexes(&self, only_new: bool, threshold: usize, lists: bool) -> Result<Vec<(String, Arc<IdSet>)>> {
        let mut raw = Vec::new();
        let mut collect = |name: &str, ids: Vec<Id>| raw.push((name.to_string(), ids));
        if lists {
            self.storage.each_list(only_new, &mut collect)?;
        } else {
            self.storage.each_set(only_new, &mut collect)?;
        }

        Ok(raw
            .into_par_iter()
            .map(|(name, ids)| {
                let built = if lists {
                    IdSet::list_with_threshold(ids, threshold)
                } else {
                    IdSet::set_with_threshold(ids, threshold)
                };
                (name, Arc::new(built))
            })
            .collect())
    }

    fn install(registry: &Registry, built: Vec<(String, Arc<IdSet>)>, merge: bool) {
        let mut registry = registry.write();
        if !merge {
            registry.clear();
        }
        registry.extend(built);
    }

    /// Named set, or the shared empty set when unknown
    pub fn get_set(&self, name: &str) -> Arc<IdSet> {
        self.sets.read().get(name).cloned().unwrap_or_else(IdSet::empty)
    }

    /// Named list, or the shared empty set when unknown
    pub fn get_list(&self, name: &str) -> Arc<IdSet> {
        self.lists.read().get(name).cloned().unwrap_or_else(IdSet::empty)
    }

    /// Lists are preferred; a set sorts in its natural id order
    pub fn sort_source(&self, name: &str) -> Option<Arc<IdSet>> {
        if let Some(list) = self.lists.read().get(name) {
            return Some(list.clone());
        }
        self.sets.read().get(name).cloned()
    }

    /// Swap in a new in-memory set without touching storage
    pub fn set_set(&self, name: &str, ids: Vec<Id>) -> Arc<IdSet> {
        let set = Arc::new(IdSet::set_with_threshold(ids, self.config.small_set_threshold));
        self.sets.write().insert(name.to_string(), set.clone());
        set
    }

    pub fn set_list(&self, name: &str, ids: Vec<Id>) -> Arc<IdSet> {
        let list = Arc::new(IdSet::list_with_threshold(ids, self.config.small_set_threshold));
        self.lists.write().insert(name.to_string(), list.clone());
        list
    }

    /// Persist and install a set of external ids, assigning internal ids as needed
    pub fn create_set<S: AsRef<str>>(&self, name: &str, externals: &[S]) -> Result<Arc<IdSet>> {
        let ids = self.resolve_all(externals)?;
        let stored = self.storage.upsert_set(name, &encode_ids(&ids))?;
        Ok(self.set_set(name, stored))
    }

    /// Persist and install a list of external ids, keeping their order
    pub fn create_list<S: AsRef<str>>(&self, name: &str, externals: &[S]) -> Result<Arc<IdSet>> {
        let ids = self.resolve_all(externals)?;
        let stored = self.storage.upsert_list(name, &encode_ids(&ids))?;
        Ok(self.set_list(name, stored))
    }

    pub fn remove_set(&self, name: &str) -> Result<()> {
        self.storage.remove_set(name)?;
        self.sets.write().remove(name);
        Ok(())
    }

    pub fn remove_list(&self, name: &str) -> Result<()> {
        self.storage.remove_list(name)?;
        self.lists.write().remove(name);
        Ok(())
    }

    /// Store a resource under its external id; any cached copy is dropped
    pub fn put_resource(&self, external: &str, tpe: Option<&str>, summary: Bytes, details: Option<Bytes>) -> Result<Id> {
        let id = {
            let _writer = self.dictionary.lock();
            let (id, created) = self.resolve(external)?;
            if created {
                self.persist_ids()?;
            }
            id
        };
        self.storage.upsert_resource(&StoredResource {
            id,
            tpe: tpe.map(str::to_string),
            summary,
            details,
        })?;
        self.cache.remove(id);
        Ok(id)
    }

    pub fn remove_resource(&self, id: Id) -> Result<()> {
        self.storage.remove_resource(id)?;
        self.cache.remove(id);
        Ok(())
    }

    /// Richest projection of a resource
    pub fn fetch(&self, id: Id) -> Option<Bytes> {
        self.cache.fetch(id, None)
    }

    /// Like `fetch`, but only when the resource has the given type
    pub fn fetch_typed(&self, id: Id, tpe: &str) -> Option<Bytes> {
        self.cache.fetch(id, Some(tpe))
    }

    pub fn fetch_summary(&self, id: Id) -> Option<Bytes> {
        self.cache.fetch_projection(id, None, Projection::Summary)
    }

    /// Check a query out of the pool; blocks while every pooled query is in flight
    pub fn query(&self) -> Query<'_> {
        Query::new(self.queries.checkout(), self)
    }

    /// Start a batch of set/list/dictionary changes
    pub fn update(&self) -> Updater<'_> {
        Updater::new(self)
    }

    pub fn id(&self, external: &str) -> Option<Id> {
        self.ids.get(external)
    }

    pub fn external_id(&self, id: Id) -> Option<String> {
        self.ids.external(id)
    }

    pub fn stats(&self) -> DatabaseStats {
        DatabaseStats {
            set_count: self.sets.read().len(),
            list_count: self.lists.read().len(),
            id_count: self.ids.len(),
            type_count: self.interner.len(),
            queries_executed: self.query_count.load(Ordering::Relaxed),
            query_pool_capacity: self.queries.capacity(),
            query_pool_available: self.queries.available(),
            cache: self.cache.stats(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn cache(&self) -> &Cache {
        &self.cache
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub(crate) fn ids(&self) -> &IdMap {
        &self.ids
    }

    /// Serializes writers of the id dictionary
    pub(crate) fn dictionary_lock(&self) -> MutexGuard<'_, ()> {
        self.dictionary.lock()
    }

    pub(crate) fn record_query(&self) {
        self.query_count.fetch_add(1, Ordering::Relaxed);
    }

    fn resolve(&self, external: &str) -> Result<(Id, bool)> {
        if external.len() > MAX_EXTERNAL_LEN {
            warn!(len = external.len(), "external id too long for the dictionary");
            return Err(Error::new(
                ErrorKind::InvalidArgument,
                format!("external id longer than {} bytes", MAX_EXTERNAL_LEN),
            ));
        }
        Ok(self.ids.get_or_create(external))
    }

    fn resolve_all<S: AsRef<str>>(&self, externals: &[S]) -> Result<Vec<Id>> {
        let _writer = self.dictionary.lock();
        let mut created = false;
        let mut ids = Vec::with_capacity(externals.len());
        for external in externals {
            let (id, new) = self.resolve(external.as_ref())?;
            created |= new;
            ids.push(id);
        }
        if created {
            self.persist_ids()?;
        }
        Ok(ids)
    }

    fn persist_ids(&self) -> Result<()> {
        let payload = encode_id_map(&self.ids.snapshot())?;
        self.storage.update_ids(&payload)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::set::Membership;

    fn config() -> Config {
        Config {
            query_pool_size: 2,
            ..Config::default()
        }
    }

    #[test]
    fn create_persists_through_storage() {
        let storage = Arc::new(MemoryStorage::default());
        let db = Database::open(storage.clone(), config()).unwrap();
        db.create_list("recent", &["c", "a", "b"]).unwrap();
        db.create_set("tagged", &["a", "z"]).unwrap();

        let reopened = Database::open(storage, config()).unwrap();
        let recent = reopened.get_list("recent");
        let a = reopened.id("a").unwrap();
        assert_eq!(recent.len(), 3);
        assert_eq!(recent.rank(a), Some(1));
        assert!(reopened.get_set("tagged").exists(a));
        assert_eq!(reopened.external_id(a).as_deref(), Some("a"));
    }

    #[test]
    fn unknown_names_are_empty() {
        let db = Database::in_memory(config()).unwrap();
        assert!(db.get_set("nope").is_empty());
        assert!(db.get_list("nope").is_empty());
        assert!(db.sort_source("nope").is_none());
    }

    #[test]
    fn put_resource_invalidates_cache() {
        let db = Database::in_memory(config()).unwrap();
        let id = db.put_resource("r1", Some("item"), Bytes::from_static(b"v1"), None).unwrap();
        assert_eq!(db.fetch(id), Some(Bytes::from_static(b"v1")));

        db.put_resource("r1", Some("item"), Bytes::from_static(b"s"), Some(Bytes::from_static(b"v2"))).unwrap();
        assert_eq!(db.fetch(id), Some(Bytes::from_static(b"v2")));
        assert_eq!(db.fetch_summary(id), Some(Bytes::from_static(b"s")));
        assert_eq!(db.fetch_typed(id, "user"), None);

        db.remove_resource(id).unwrap();
        assert_eq!(db.fetch(id), None);
    }

    #[test]
    fn overlong_external_ids_are_rejected() {
        let db = Database::in_memory(config()).unwrap();
        let err = db.put_resource(&"x".repeat(300), None, Bytes::new(), None).unwrap_err();
        assert_eq!(err.kind, ErrorKind::InvalidArgument);
        assert_eq!(db.stats().id_count, 0);
    }

    #[test]
    fn reload_only_new_merges_changes() {
        let storage = Arc::new(MemoryStorage::default());
        let db = Database::open(storage.clone(), config()).unwrap();
        db.set_set("memory-only", vec![Id(1)]);

        storage.upsert_set("fresh", &encode_ids(&[Id(5), Id(6)])).unwrap();
        db.reload(true).unwrap();
        assert_eq!(db.get_set("fresh").len(), 2);
        assert_eq!(db.get_set("memory-only").len(), 1);

        db.reload(false).unwrap();
        assert!(db.get_set("memory-only").is_empty());
        assert_eq!(db.get_set("fresh").len(), 2);
    }
}
