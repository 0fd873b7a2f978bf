use std::collections::HashMap;
use parking_lot::RwLock;
use crate::core::types::{Id, ID_SIZE};

/// External string id <-> internal dense id dictionary.
/// Writes are rare (new resources), so a single read-write lock guards both directions.
pub struct IdMap {
    inner: RwLock<IdMapInner>,
}

struct IdMapInner {
    counter: u32,
    etoi: HashMap<String, Id>,
    itoe: HashMap<Id, String>,
}

impl IdMap {
    pub fn new() -> Self {
        IdMap {
            inner: RwLock::new(IdMapInner {
                counter: 0,
                etoi: HashMap::new(),
                itoe: HashMap::new(),
            }),
        }
    }

    /// Replace the dictionary with a persisted snapshot
    pub fn load(&self, ids: HashMap<String, Id>) {
        let mut inner = self.inner.write();
        inner.itoe = ids.iter().map(|(e, i)| (*i, e.clone())).collect();
        inner.counter = ids.values().map(|id| id.0).max().unwrap_or(0).max(inner.counter);
        inner.etoi = ids;
    }

    pub fn get(&self, external: &str) -> Option<Id> {
        self.inner.read().etoi.get(external).copied()
    }

    /// Returns the internal id and whether it was newly assigned
    pub fn get_or_create(&self, external: &str) -> (Id, bool) {
        if let Some(id) = self.get(external) {
            return (id, false);
        }

        let mut inner = self.inner.write();
        // Another writer may have won the race between the locks
        if let Some(id) = inner.etoi.get(external) {
            return (*id, false);
        }
        inner.counter += 1;
        let id = Id(inner.counter);
        inner.etoi.insert(external.to_string(), id);
        inner.itoe.insert(id, external.to_string());
        (id, true)
    }

    pub fn external(&self, id: Id) -> Option<String> {
        self.inner.read().itoe.get(&id).cloned()
    }

    pub fn encode(&self, id: Id) -> [u8; ID_SIZE] {
        id.to_le_bytes()
    }

    pub fn snapshot(&self) -> HashMap<String, Id> {
        self.inner.read().etoi.clone()
    }

    pub fn len(&self) -> usize {
        self.inner.read().etoi.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for IdMap {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn creates_sequential_ids() {
        let ids = IdMap::new();
        assert_eq!(ids.get_or_create("a"), (Id(1), true));
        assert_eq!(ids.get_or_create("b"), (Id(2), true));
        assert_eq!(ids.get_or_create("c"), (Id(3), true));
    }

    #[test]
    fn looks_up_existing_ids() {
        let ids = IdMap::new();
        ids.get_or_create("a");
        ids.get_or_create("b");

        assert_eq!(ids.get("a"), Some(Id(1)));
        assert_eq!(ids.get_or_create("b"), (Id(2), false));
        assert_eq!(ids.get("z"), None);
    }

    #[test]
    fn reverses_lookup() {
        let ids = IdMap::new();
        ids.get_or_create("a");
        ids.get_or_create("b");

        assert_eq!(ids.external(Id(1)).as_deref(), Some("a"));
        assert_eq!(ids.external(Id(2)).as_deref(), Some("b"));
        assert_eq!(ids.external(Id(4)), None);
    }

    #[test]
    fn continues_after_loaded_ids() {
        let ids = IdMap::new();
        let mut persisted = HashMap::new();
        persisted.insert("x".to_string(), Id(40));
        persisted.insert("y".to_string(), Id(7));
        ids.load(persisted);

        assert_eq!(ids.get_or_create("z"), (Id(41), true));
        assert_eq!(ids.external(Id(7)).as_deref(), Some("y"));
    }

    #[test]
    fn encodes_little_endian() {
        let ids = IdMap::new();
        assert_eq!(ids.encode(Id(449)), [193, 1, 0, 0]);
    }
}
