use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use roaring::RoaringBitmap;
use crate::core::types::Id;

/// Below this many members a set is a sorted array; above it, a bitmap
pub const SMALL_SET_THRESHOLD: usize = 32;

static EMPTY: LazyLock<Arc<IdSet>> = LazyLock::new(|| Arc::new(IdSet::Sorted(SortedSet { ids: Vec::new() })));

/// Capability interface shared by every set/list variant.
///
/// Instances are immutable once built: a changed set is rebuilt and swapped in whole,
/// so holding an `Arc` to one keeps it stable for the duration of a query.
pub trait Membership {
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn exists(&self, id: Id) -> bool;

    /// Visit members in iteration order (reversed when `desc`) until `f` returns false
    fn each<F: FnMut(Id) -> bool>(&self, desc: bool, f: F);

    fn can_rank(&self) -> bool {
        false
    }

    /// 0-based position of `id` in iteration order
    fn rank(&self, _id: Id) -> Option<usize> {
        None
    }

    /// Visit neighbours of `id` outward: rank-1, rank+1, rank-2, rank+2, ...
    /// Non-rankable variants degrade to a forward walk.
    fn around<F: FnMut(Id) -> bool>(&self, _id: Id, f: F) {
        self.each(false, f)
    }
}

/// Small unordered set, kept sorted for binary search
#[derive(Debug, Clone)]
pub struct SortedSet {
    ids: Vec<Id>,
}

/// Large unordered set
#[derive(Debug, Clone)]
pub struct BitmapSet {
    ids: RoaringBitmap,
}

/// Small ordered list; rank is a linear scan at this size
#[derive(Debug, Clone)]
pub struct ShortList {
    ids: Vec<Id>,
}

/// Large ordered list with a precomputed rank index
#[derive(Debug, Clone)]
pub struct RankedList {
    ids: Vec<Id>,
    rank: HashMap<Id, u32>,
}

/// Closed set of variants, chosen by size at construction
#[derive(Debug, Clone)]
pub enum IdSet {
    Sorted(SortedSet),
    Bitmap(BitmapSet),
    ShortList(ShortList),
    List(RankedList),
}

impl IdSet {
    pub fn set(ids: Vec<Id>) -> Self {
        Self::set_with_threshold(ids, SMALL_SET_THRESHOLD)
    }

    pub fn set_with_threshold(mut ids: Vec<Id>, threshold: usize) -> Self {
        if ids.len() < threshold {
            ids.sort_unstable();
            ids.dedup();
            IdSet::Sorted(SortedSet { ids })
        } else {
            let ids = ids.into_iter().map(|id| id.0).collect();
            IdSet::Bitmap(BitmapSet { ids })
        }
    }

    /// Build an ordered list. Repeated ids keep their first position.
    pub fn list(ids: Vec<Id>) -> Self {
        Self::list_with_threshold(ids, SMALL_SET_THRESHOLD)
    }

    pub fn list_with_threshold(ids: Vec<Id>, threshold: usize) -> Self {
        if ids.len() < threshold {
            let mut unique = Vec::with_capacity(ids.len());
            for id in ids {
                if !unique.contains(&id) {
                    unique.push(id);
                }
            }
            return IdSet::ShortList(ShortList { ids: unique });
        }

        let mut rank = HashMap::with_capacity(ids.len());
        let mut unique = Vec::with_capacity(ids.len());
        for id in ids {
            if !rank.contains_key(&id) {
                rank.insert(id, unique.len() as u32);
                unique.push(id);
            }
        }
        // Heavy duplication can still leave a short list
        if unique.len() < threshold {
            return IdSet::ShortList(ShortList { ids: unique });
        }
        IdSet::List(RankedList { ids: unique, rank })
    }

    /// Shared empty set handed out for unknown set names
    pub fn empty() -> Arc<IdSet> {
        EMPTY.clone()
    }

    pub fn is_list(&self) -> bool {
        matches!(self, IdSet::ShortList(_) | IdSet::List(_))
    }

    pub fn to_vec(&self) -> Vec<Id> {
        let mut ids = Vec::with_capacity(self.len());
        self.each(false, |id| {
            ids.push(id);
            true
        });
        ids
    }
}

impl Membership for IdSet {
    fn len(&self) -> usize {
        match self {
            IdSet::Sorted(s) => s.len(),
            IdSet::Bitmap(s) => s.len(),
            IdSet::ShortList(l) => l.len(),
            IdSet::List(l) => l.len(),
        }
    }

    fn exists(&self, id: Id) -> bool {
        match self {
            IdSet::Sorted(s) => s.exists(id),
            IdSet::Bitmap(s) => s.exists(id),
            IdSet::ShortList(l) => l.exists(id),
            IdSet::List(l) => l.exists(id),
        }
    }

    fn each<F: FnMut(Id) -> bool>(&self, desc: bool, f: F) {
        match self {
            IdSet::Sorted(s) => s.each(desc, f),
            IdSet::Bitmap(s) => s.each(desc, f),
            IdSet::ShortList(l) => l.each(desc, f),
            IdSet::List(l) => l.each(desc, f),
        }
    }

    fn can_rank(&self) -> bool {
        self.is_list()
    }

    fn rank(&self, id: Id) -> Option<usize> {
        match self {
            IdSet::ShortList(l) => l.rank(id),
            IdSet::List(l) => l.rank(id),
            _ => None,
        }
    }

    fn around<F: FnMut(Id) -> bool>(&self, id: Id, f: F) {
        match self {
            IdSet::Sorted(s) => s.around(id, f),
            IdSet::Bitmap(s) => s.around(id, f),
            IdSet::ShortList(l) => l.around(id, f),
            IdSet::List(l) => l.around(id, f),
        }
    }
}

impl Membership for SortedSet {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn exists(&self, id: Id) -> bool {
        self.ids.binary_search(&id).is_ok()
    }

    fn each<F: FnMut(Id) -> bool>(&self, desc: bool, f: F) {
        walk(&self.ids, desc, f)
    }
}

impl Membership for BitmapSet {
    fn len(&self) -> usize {
        self.ids.len() as usize
    }

    fn exists(&self, id: Id) -> bool {
        self.ids.contains(id.0)
    }

    fn each<F: FnMut(Id) -> bool>(&self, desc: bool, mut f: F) {
        if desc {
            for id in self.ids.iter().rev() {
                if !f(Id(id)) {
                    return;
                }
            }
        } else {
            for id in self.ids.iter() {
                if !f(Id(id)) {
                    return;
                }
            }
        }
    }
}

impl Membership for ShortList {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn exists(&self, id: Id) -> bool {
        self.ids.contains(&id)
    }

    fn each<F: FnMut(Id) -> bool>(&self, desc: bool, f: F) {
        walk(&self.ids, desc, f)
    }

    fn can_rank(&self) -> bool {
        true
    }

    fn rank(&self, id: Id) -> Option<usize> {
        self.ids.iter().position(|x| *x == id)
    }

    fn around<F: FnMut(Id) -> bool>(&self, id: Id, mut f: F) {
        match self.rank(id) {
            Some(rank) => alternate(self.ids.len(), rank, rank + 1, |pos| f(self.ids[pos])),
            None => self.each(false, f),
        }
    }
}

impl Membership for RankedList {
    fn len(&self) -> usize {
        self.ids.len()
    }

    fn exists(&self, id: Id) -> bool {
        self.rank.contains_key(&id)
    }

    fn each<F: FnMut(Id) -> bool>(&self, desc: bool, f: F) {
        walk(&self.ids, desc, f)
    }

    fn can_rank(&self) -> bool {
        true
    }

    fn rank(&self, id: Id) -> Option<usize> {
        self.rank.get(&id).map(|r| *r as usize)
    }

    fn around<F: FnMut(Id) -> bool>(&self, id: Id, mut f: F) {
        match self.rank(id) {
            Some(rank) => alternate(self.ids.len(), rank, rank + 1, |pos| f(self.ids[pos])),
            None => self.each(false, f),
        }
    }
}

fn walk<F: FnMut(Id) -> bool>(ids: &[Id], desc: bool, mut f: F) {
    if desc {
        for id in ids.iter().rev() {
            if !f(*id) {
                return;
            }
        }
    } else {
        for id in ids {
            if !f(*id) {
                return;
            }
        }
    }
}

/// Alternate outward over positions `[0, len)`: `below-1, above, below-2, above+1, ...`.
/// When one side runs out the other continues alone; each position is visited once.
pub(crate) fn alternate<F: FnMut(usize) -> bool>(len: usize, below: usize, above: usize, mut f: F) {
    let mut lo = below.min(len);
    let mut hi = above;
    loop {
        let mut moved = false;
        if lo > 0 {
            lo -= 1;
            moved = true;
            if !f(lo) {
                return;
            }
        }
        if hi < len {
            moved = true;
            if !f(hi) {
                return;
            }
            hi += 1;
        }
        if !moved {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(raw: &[u32]) -> Vec<Id> {
        raw.iter().map(|i| Id(*i)).collect()
    }

    fn collect_each(set: &IdSet, desc: bool) -> Vec<u32> {
        let mut out = Vec::new();
        set.each(desc, |id| {
            out.push(id.0);
            true
        });
        out
    }

    fn collect_around(set: &IdSet, id: u32) -> Vec<u32> {
        let mut out = Vec::new();
        set.around(Id(id), |id| {
            out.push(id.0);
            true
        });
        out
    }

    #[test]
    fn picks_variant_by_size() {
        assert!(matches!(IdSet::set(ids(&[3, 1, 2])), IdSet::Sorted(_)));
        let big: Vec<Id> = (1..=100).map(Id).collect();
        assert!(matches!(IdSet::set(big.clone()), IdSet::Bitmap(_)));
        assert!(matches!(IdSet::list(ids(&[3, 1, 2])), IdSet::ShortList(_)));
        assert!(matches!(IdSet::list(big), IdSet::List(_)));
    }

    #[test]
    fn sets_answer_existence() {
        for threshold in [1, 1000] {
            let set = IdSet::set_with_threshold(ids(&[9, 4, 7, 4]), threshold);
            assert_eq!(set.len(), 3);
            assert!(set.exists(Id(4)));
            assert!(set.exists(Id(9)));
            assert!(!set.exists(Id(5)));
            assert!(!set.can_rank());
            assert_eq!(set.rank(Id(4)), None);
            assert_eq!(collect_each(&set, false), vec![4, 7, 9]);
            assert_eq!(collect_each(&set, true), vec![9, 7, 4]);
        }
    }

    #[test]
    fn list_rank_matches_position() {
        for threshold in [1, 1000] {
            let raw = [50, 3, 17, 8, 99];
            let list = IdSet::list_with_threshold(ids(&raw), threshold);
            assert!(list.can_rank());
            for (k, id) in raw.iter().enumerate() {
                assert_eq!(list.rank(Id(*id)), Some(k));
            }
            assert_eq!(list.rank(Id(4)), None);
            assert_eq!(collect_each(&list, false), raw.to_vec());
            assert_eq!(collect_each(&list, true), vec![99, 8, 17, 3, 50]);
        }
    }

    #[test]
    fn list_drops_repeated_ids() {
        let list = IdSet::list(ids(&[5, 6, 5, 7]));
        assert_eq!(list.len(), 3);
        assert_eq!(list.rank(Id(7)), Some(2));
    }

    #[test]
    fn duplicated_long_input_still_builds_a_short_list() {
        let raw: Vec<Id> = (0..40).map(|n| Id(n % 3 + 1)).collect();
        let list = IdSet::list_with_threshold(raw, 8);
        assert!(matches!(list, IdSet::ShortList(_)));
        assert_eq!(collect_each(&list, false), vec![1, 2, 3]);
        assert_eq!(list.rank(Id(3)), Some(2));
    }

    #[test]
    fn each_stops_when_told() {
        let list = IdSet::list(ids(&[1, 2, 3, 4]));
        let mut seen = Vec::new();
        list.each(false, |id| {
            seen.push(id.0);
            id.0 < 2
        });
        assert_eq!(seen, vec![1, 2]);
    }

    #[test]
    fn around_alternates_outward() {
        for threshold in [1, 1000] {
            let list = IdSet::list_with_threshold((1..=9).map(Id).collect(), threshold);
            // rank of 5 is 4: visit ranks 3,5,2,6,1,7,0,8
            assert_eq!(collect_around(&list, 5), vec![4, 6, 3, 7, 2, 8, 1, 9]);
        }
    }

    #[test]
    fn around_clips_at_bounds() {
        let list = IdSet::list((1..=6).map(Id).collect());
        assert_eq!(collect_around(&list, 2), vec![1, 3, 4, 5, 6]);
        assert_eq!(collect_around(&list, 6), vec![5, 4, 3, 2, 1]);
        assert_eq!(collect_around(&list, 1), vec![2, 3, 4, 5, 6]);
    }

    #[test]
    fn around_visits_each_position_once() {
        let list = IdSet::list((1..=40).map(Id).collect());
        let mut seen = collect_around(&list, 13);
        assert_eq!(seen.len(), 39);
        seen.sort_unstable();
        seen.dedup();
        assert_eq!(seen.len(), 39);
        assert!(!seen.contains(&13));
    }

    #[test]
    fn around_degrades_to_forward_walk() {
        let set = IdSet::set(ids(&[8, 2, 5]));
        assert_eq!(collect_around(&set, 5), vec![2, 5, 8]);

        let list = IdSet::list(ids(&[8, 2, 5]));
        assert_eq!(collect_around(&list, 77), vec![8, 2, 5]);
    }

    #[test]
    fn empty_is_shared() {
        let a = IdSet::empty();
        let b = IdSet::empty();
        assert!(Arc::ptr_eq(&a, &b));
        assert!(a.is_empty());
    }
}
