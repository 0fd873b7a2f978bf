use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::info;
use crate::core::database::Database;
use crate::core::error::Result;
use crate::core::types::Id;
use crate::index::set::{IdSet, Membership};
use crate::storage::codec::{encode_id_map, encode_ids};
use crate::storage::{IndexKind, IndexWrite};

#[derive(Debug, Default)]
struct SetChanges {
    added: HashSet<Id>,
    deleted: HashSet<Id>,
}

#[derive(Debug, Default)]
struct ListChanges {
    inserts: BTreeMap<usize, Id>, // target index -> id
    deleted: HashSet<Id>,
}

/// Collects set, list and dictionary edits and applies them in one `commit`.
///
/// Nothing is visible until commit. Every touched set and list is persisted in one
/// all-or-nothing storage write, and only then are the rebuilt instances swapped in.
pub struct Updater<'db> {
    db: &'db Database,
    ids: HashMap<String, Option<Id>>, // None deletes the key
    sets: HashMap<String, SetChanges>,
    lists: HashMap<String, ListChanges>,
}

impl<'db> Updater<'db> {
    pub fn new(db: &'db Database) -> Self {
        Updater {
            db,
            ids: HashMap::new(),
            sets: HashMap::new(),
            lists: HashMap::new(),
        }
    }

    pub fn set_update(&mut self, name: &str, id: Id) -> &mut Self {
        self.sets.entry(name.to_string()).or_default().added.insert(id);
        self
    }

    pub fn set_delete(&mut self, name: &str, id: Id) -> &mut Self {
        self.sets.entry(name.to_string()).or_default().deleted.insert(id);
        self
    }

    /// Place `id` at position `index` of the rebuilt list
    pub fn list_update(&mut self, name: &str, id: Id, index: usize) -> &mut Self {
        self.lists.entry(name.to_string()).or_default().inserts.insert(index, id);
        self
    }

    pub fn list_delete(&mut self, name: &str, id: Id) -> &mut Self {
        self.lists.entry(name.to_string()).or_default().deleted.insert(id);
        self
    }

    pub fn ids_update(&mut self, external: &str, id: Id) -> &mut Self {
        self.ids.insert(external.to_string(), Some(id));
        self
    }

    pub fn ids_delete(&mut self, external: &str) -> &mut Self {
        self.ids.insert(external.to_string(), None);
        self
    }

    pub fn commit(self) -> Result<()> {
        let db = self.db;
        let storage = db.storage();

        let mut writes = Vec::with_capacity(self.sets.len() + self.lists.len());
        let mut sets: Vec<_> = self.sets.iter().collect();
        sets.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (name, changes) in sets {
            writes.push(IndexWrite {
                kind: IndexKind::Set,
                name: name.clone(),
                payload: encode_ids(&merge_set(&db.get_set(name), changes)).to_vec(),
            });
        }
        let mut lists: Vec<_> = self.lists.iter().collect();
        lists.sort_unstable_by(|a, b| a.0.cmp(b.0));
        for (name, changes) in lists {
            writes.push(IndexWrite {
                kind: IndexKind::List,
                name: name.clone(),
                payload: encode_ids(&merge_list(&db.get_list(name), changes)).to_vec(),
            });
        }

        if !writes.is_empty() {
            let stored = storage.upsert_indexes(&writes)?;
            for (write, ids) in writes.iter().zip(stored) {
                match write.kind {
                    IndexKind::List => db.set_list(&write.name, ids),
                    _ => db.set_set(&write.name, ids),
                };
            }
        }

        if !self.ids.is_empty() {
            let _writer = db.dictionary_lock();
            let mut merged = db.ids().snapshot();
            for (external, id) in &self.ids {
                match id {
                    Some(id) => merged.insert(external.clone(), *id),
                    None => merged.remove(external),
                };
            }
            let stored = storage.update_ids(&encode_id_map(&merged)?)?;
            db.ids().load(stored);
        }

        info!(
            sets = self.sets.len(),
            lists = self.lists.len(),
            ids = self.ids.len(),
            "committed index update"
        );
        Ok(())
    }
}

/// Existing members minus deletions, then additions not already present
fn merge_set(existing: &IdSet, changes: &SetChanges) -> Vec<Id> {
    let mut ids = Vec::with_capacity(existing.len() + changes.added.len());
    existing.each(false, |id| {
        if !changes.deleted.contains(&id) {
            ids.push(id);
        }
        true
    });
    let mut added: Vec<Id> = changes
        .added
        .iter()
        .filter(|id| !existing.exists(**id) && !changes.deleted.contains(id))
        .copied()
        .collect();
    added.sort_unstable();
    ids.extend(added);
    ids
}

/// Walk the existing order, emitting each pending insert once the output reaches its
/// index. Deleted ids are dropped, ids that were inserted elsewhere keep only their
/// new position, and inserts past the end follow in index order.
fn merge_list(existing: &IdSet, changes: &ListChanges) -> Vec<Id> {
    let mut ids = Vec::with_capacity(existing.len() + changes.inserts.len());
    let mut written: HashSet<Id> = HashSet::with_capacity(ids.capacity());
    let inserted: HashSet<Id> = changes.inserts.values().copied().collect();

    let mut emit = |ids: &mut Vec<Id>, id: Id| {
        if written.insert(id) {
            ids.push(id);
        }
    };

    existing.each(false, |id| {
        while let Some(pending) = changes.inserts.get(&ids.len()) {
            let before = ids.len();
            emit(&mut ids, *pending);
            if ids.len() == before {
                break;
            }
        }
        if !changes.deleted.contains(&id) && !inserted.contains(&id) {
            emit(&mut ids, id);
        }
        true
    });

    for id in changes.inserts.values() {
        emit(&mut ids, *id);
    }
    ids
}
