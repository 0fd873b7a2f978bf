use crate::core::types::Id;
use crate::index::set::{alternate, IdSet, Membership};
use crate::query::filter::Filter;
use crate::search::results::ResultBuffer;

/// Offset/limit cursor writing into a result buffer
pub struct Page<'r> {
    offset: usize,
    limit: usize,
    result: &'r mut ResultBuffer,
}

impl<'r> Page<'r> {
    pub fn new(offset: usize, limit: usize, result: &'r mut ResultBuffer) -> Self {
        Page {
            offset,
            limit: limit.min(result.max),
            result,
        }
    }

    /// Feed one matching candidate. Returns false once the walk should stop, which
    /// only happens when the page is full and another candidate showed up.
    #[inline]
    pub fn offer(&mut self, id: Id) -> bool {
        if self.offset > 0 {
            self.offset -= 1;
            return true;
        }
        if self.limit == 0 {
            self.result.more = true;
            return false;
        }
        self.result.add(id);
        self.limit -= 1;
        true
    }
}

/// Walk the sort source, keeping candidates that pass `filter`
pub fn scan(sort: &IdSet, filter: &Filter, desc: bool, around: Option<Id>, page: &mut Page) {
    let visit = |id: Id| !filter.matches(id) || page.offer(id);
    match around {
        Some(anchor) => sort.around(anchor, visit),
        None => sort.each(desc, visit),
    }
}

/// Walk the small `driver` set instead of the sort source, then order the survivors
/// by their rank in `sort`. Cost is bounded by the driver's size.
///
/// `sort` must be rankable. `ranked` is reusable scratch space.
pub fn set_driven(
    sort: &IdSet,
    driver: &IdSet,
    rest: &Filter,
    desc: bool,
    around: Option<Id>,
    page: &mut Page,
    ranked: &mut Vec<(usize, Id)>,
) {
    ranked.clear();
    driver.each(false, |id| {
        if rest.matches(id) {
            if let Some(rank) = sort.rank(id) {
                ranked.push((rank, id));
            }
        }
        true
    });
    ranked.sort_unstable();

    let Some(anchor) = around else {
        if desc {
            ranked.iter().rev().all(|(_, id)| page.offer(*id));
        } else {
            ranked.iter().all(|(_, id)| page.offer(*id));
        }
        return;
    };

    let Some(anchor_rank) = sort.rank(anchor) else {
        ranked.iter().all(|(_, id)| page.offer(*id));
        return;
    };
    let (below, above) = match ranked.binary_search_by_key(&anchor_rank, |(rank, _)| *rank) {
        Ok(index) => (index, index + 1),
        Err(insert) => (insert, insert),
    };
    alternate(ranked.len(), below, above, |pos| page.offer(ranked[pos].1));
}
