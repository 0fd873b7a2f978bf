use std::sync::Arc;
use crate::core::database::Database;
use crate::core::error::{Error, ErrorKind, Result};
use crate::core::types::Id;
use crate::index::set::{IdSet, Membership};
use crate::index::sets::Sets;
use crate::memory::pool::{Pooled, Recycle};
use crate::query::executor::{scan, set_driven, Page};
use crate::query::filter::Filter;
use crate::search::results::{QueryResult, ResultBuffer};

/// Poolable request descriptor plus the result buffer it fills
#[derive(Debug)]
pub struct QueryState {
    pub(crate) sort: Option<Arc<IdSet>>,
    pub(crate) invalid_sort: Option<String>,
    pub(crate) overflow: bool,
    pub(crate) sets: Sets,
    pub(crate) offset: usize,
    pub(crate) limit: usize,
    pub(crate) default_limit: usize,
    pub(crate) desc: bool,
    pub(crate) around: Option<Id>,
    pub(crate) detailed: bool,
    pub(crate) no_payload: bool,
    pub(crate) result: ResultBuffer,
    pub(crate) ranked: Vec<(usize, Id)>,
}

impl QueryState {
    pub fn new(max_sets: usize, max_results: usize, default_limit: usize) -> Self {
        QueryState {
            sort: None,
            invalid_sort: None,
            overflow: false,
            sets: Sets::new(max_sets),
            offset: 0,
            limit: default_limit,
            default_limit,
            desc: false,
            around: None,
            detailed: false,
            no_payload: false,
            result: ResultBuffer::new(max_results),
            ranked: Vec::new(),
        }
    }
}

impl Recycle for QueryState {
    fn recycle(&mut self) {
        self.sort = None;
        self.invalid_sort = None;
        self.overflow = false;
        self.sets.clear();
        self.offset = 0;
        self.limit = self.default_limit;
        self.desc = false;
        self.around = None;
        self.detailed = false;
        self.no_payload = false;
        self.result.reset();
        self.ranked.clear();
    }
}

/// A query checked out of the database's pool.
///
/// Configure it with the builder methods, then `execute` it exactly once. The pooled
/// state goes back to the pool when the returned result is dropped, or right away if
/// execution yields nothing or fails.
pub struct Query<'db> {
    state: Pooled<QueryState>,
    db: &'db Database,
}

impl<'db> Query<'db> {
    pub(crate) fn new(state: Pooled<QueryState>, db: &'db Database) -> Self {
        Query { state, db }
    }

    /// Order by the named list (or set). Unknown names fail at `execute`.
    pub fn sort(mut self, name: &str) -> Self {
        match self.db.sort_source(name) {
            Some(source) => self.state.sort = Some(source),
            None => self.state.invalid_sort = Some(name.to_string()),
        }
        self
    }

    pub fn sort_list(mut self, list: Arc<IdSet>) -> Self {
        self.state.sort = Some(list);
        self
    }

    /// Intersect with the named set; an unknown name matches nothing
    pub fn and(self, name: &str) -> Self {
        let set = self.db.get_set(name);
        self.and_set(set)
    }

    pub fn and_set(mut self, set: Arc<IdSet>) -> Self {
        if !self.state.sets.add(set) {
            self.state.overflow = true;
        }
        self
    }

    pub fn desc(mut self) -> Self {
        self.state.desc = true;
        self
    }

    /// Page outward from `id` in sort order instead of from an offset
    pub fn around(mut self, id: Id) -> Self {
        self.state.around = Some(id);
        self
    }

    pub fn offset(mut self, offset: usize) -> Self {
        self.state.offset = offset;
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.state.limit = limit;
        self
    }

    pub fn detailed(mut self) -> Self {
        self.state.detailed = true;
        self
    }

    /// Skip loading payloads; only ids are returned
    pub fn no_payload(mut self) -> Self {
        self.state.no_payload = true;
        self
    }

    pub fn execute(self) -> Result<QueryResult> {
        let Query { mut state, db } = self;
        db.record_query();

        if state.limit == 0 {
            return Ok(QueryResult::empty());
        }
        if let Some(name) = state.invalid_sort.take() {
            return Err(Error::invalid_sort(&name));
        }
        if state.overflow {
            return Err(Error::new(
                ErrorKind::InvalidInput,
                format!("query holds more than {} sets", state.sets.capacity()),
            ));
        }

        state.sets.sort();
        let sort = match state.sort.take() {
            Some(sort) => sort,
            None => match state.sets.shift() {
                Some(smallest) => smallest,
                None => return Ok(QueryResult::empty()),
            },
        };
        if sort.is_empty() {
            return Ok(QueryResult::empty());
        }

        let config = db.config();
        let st = &mut *state;
        let mut page = Page::new(st.offset, st.limit, &mut st.result);
        let filters = st.sets.as_slice();
        match filters.first() {
            Some(smallest)
                if smallest.len() < config.set_driven_threshold
                    && sort.len() > config.set_driven_min_sort
                    && sort.can_rank()
                    && st.around.is_none() =>
            {
                let rest = Filter::new(&filters[1..]);
                set_driven(&sort, smallest, &rest, st.desc, None, &mut page, &mut st.ranked);
            }
            _ => scan(&sort, &Filter::new(filters), st.desc, st.around, &mut page),
        }

        if !st.no_payload && !st.result.is_empty() {
            db.cache().fill(&mut st.result, st.detailed)?;
        }
        Ok(QueryResult::new(state))
    }
}
