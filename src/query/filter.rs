use std::sync::Arc;
use crate::core::types::Id;
use crate::index::set::{IdSet, Membership};

/// Conjunction over the filter sets of one query.
///
/// Up to five sets get a dedicated variant so the per-candidate check is a straight
/// chain of `exists` calls; beyond that it loops.
pub enum Filter<'a> {
    All,
    One(&'a IdSet),
    Two(&'a IdSet, &'a IdSet),
    Three(&'a IdSet, &'a IdSet, &'a IdSet),
    Four(&'a IdSet, &'a IdSet, &'a IdSet, &'a IdSet),
    Five(&'a IdSet, &'a IdSet, &'a IdSet, &'a IdSet, &'a IdSet),
    Many(&'a [Arc<IdSet>]),
}

impl<'a> Filter<'a> {
    /// `sets` should already be sorted smallest first
    pub fn new(sets: &'a [Arc<IdSet>]) -> Self {
        match sets {
            [] => Filter::All,
            [a] => Filter::One(a),
            [a, b] => Filter::Two(a, b),
            [a, b, c] => Filter::Three(a, b, c),
            [a, b, c, d] => Filter::Four(a, b, c, d),
            [a, b, c, d, e] => Filter::Five(a, b, c, d, e),
            _ => Filter::Many(sets),
        }
    }

    #[inline]
    pub fn matches(&self, id: Id) -> bool {
        match self {
            Filter::All => true,
            Filter::One(a) => a.exists(id),
            Filter::Two(a, b) => a.exists(id) && b.exists(id),
            Filter::Three(a, b, c) => a.exists(id) && b.exists(id) && c.exists(id),
            Filter::Four(a, b, c, d) => a.exists(id) && b.exists(id) && c.exists(id) && d.exists(id),
            Filter::Five(a, b, c, d, e) => {
                a.exists(id) && b.exists(id) && c.exists(id) && d.exists(id) && e.exists(id)
            }
            Filter::Many(sets) => sets.iter().all(|set| set.exists(id)),
        }
    }
}
