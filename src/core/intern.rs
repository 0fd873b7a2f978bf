use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use crate::core::types::Tag;

/// Type-name dictionary. Tags are never released; the set of resource types is small.
pub struct Interner {
    inner: RwLock<InternerInner>,
}

struct InternerInner {
    lookup: HashMap<Arc<str>, Tag>,
}

impl Interner {
    pub fn new() -> Self {
        Interner {
            inner: RwLock::new(InternerInner {
                lookup: HashMap::new(),
            }),
        }
    }

    pub fn intern(&self, name: &str) -> Tag {
        if name.is_empty() {
            return Tag::UNTYPED;
        }
        if let Some(tag) = self.inner.read().lookup.get(name) {
            return *tag;
        }

        let mut inner = self.inner.write();
        if let Some(tag) = inner.lookup.get(name) {
            return *tag;
        }
        // Tag(0) is the untyped tag
        let tag = Tag(inner.lookup.len() as u32 + 1);
        inner.lookup.insert(Arc::from(name), tag);
        tag
    }

    pub fn tag_of(&self, name: Option<&str>) -> Tag {
        name.map(|n| self.intern(n)).unwrap_or(Tag::UNTYPED)
    }

    pub fn len(&self) -> usize {
        self.inner.read().lookup.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Interner {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_name_same_tag() {
        let interner = Interner::new();
        let a = interner.intern("video");
        let b = interner.intern("article");
        assert_ne!(a, b);
        assert_eq!(interner.intern("video"), a);
        assert_eq!(interner.intern("article"), b);
        assert_ne!(b, Tag::UNTYPED);
        assert_eq!(interner.len(), 2);
    }

    #[test]
    fn empty_and_missing_are_untyped() {
        let interner = Interner::new();
        assert_eq!(interner.intern(""), Tag::UNTYPED);
        assert_eq!(interner.tag_of(None), Tag::UNTYPED);
        assert!(interner.is_empty());
    }
}
