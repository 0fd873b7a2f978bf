use bytes::Bytes;
use crate::core::types::Id;
use crate::memory::pool::Pooled;
use crate::query::query::QueryState;

/// Fixed-capacity page of matched ids with their payloads
#[derive(Debug, Clone)]
pub struct ResultBuffer {
    pub ids: Vec<Id>,
    pub payloads: Vec<Option<Bytes>>,
    pub more: bool,
    pub max: usize,
}

impl ResultBuffer {
    pub fn new(max: usize) -> Self {
        ResultBuffer {
            ids: Vec::with_capacity(max),
            payloads: Vec::with_capacity(max),
            more: false,
            max,
        }
    }

    /// Append `id`; false once the buffer is full
    pub fn add(&mut self, id: Id) -> bool {
        if self.ids.len() >= self.max {
            return false;
        }
        self.ids.push(id);
        self.payloads.push(None);
        true
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn set_payload(&mut self, index: usize, payload: Option<Bytes>) {
        if let Some(slot) = self.payloads.get_mut(index) {
            *slot = payload;
        }
    }

    pub fn reset(&mut self) {
        self.ids.clear();
        self.payloads.clear();
        self.more = false;
    }
}

/// Outcome of a query execution.
///
/// Holds the query's pooled state; dropping the result (or calling `release`) hands
/// both back to the pool. The default value is the shared empty result.
#[derive(Default)]
pub struct QueryResult {
    state: Option<Pooled<QueryState>>,
}

impl QueryResult {
    pub(crate) fn new(state: Pooled<QueryState>) -> Self {
        QueryResult { state: Some(state) }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    fn buffer(&self) -> Option<&ResultBuffer> {
        self.state.as_ref().map(|state| &state.result)
    }

    pub fn len(&self) -> usize {
        self.buffer().map_or(0, ResultBuffer::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn ids(&self) -> &[Id] {
        match self.buffer() {
            Some(buffer) => &buffer.ids,
            None => &[],
        }
    }

    /// Aligned with `ids`; `None` where no payload was loaded
    pub fn payloads(&self) -> &[Option<Bytes>] {
        match self.buffer() {
            Some(buffer) => &buffer.payloads,
            None => &[],
        }
    }

    pub fn has_more(&self) -> bool {
        self.buffer().is_some_and(|b| b.more)
    }

    pub fn release(self) {
        drop(self)
    }
}

impl std::fmt::Debug for QueryResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryResult")
            .field("ids", &self.ids())
            .field("has_more", &self.has_more())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffer_stops_at_capacity() {
        let mut buffer = ResultBuffer::new(2);
        assert!(buffer.add(Id(1)));
        assert!(buffer.add(Id(2)));
        assert!(!buffer.add(Id(3)));
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.payloads.len(), 2);

        buffer.set_payload(1, Some(Bytes::from_static(b"p")));
        buffer.set_payload(9, Some(Bytes::from_static(b"ignored")));
        assert_eq!(buffer.payloads[1].as_deref(), Some(&b"p"[..]));

        buffer.more = true;
        buffer.reset();
        assert!(buffer.is_empty());
        assert!(!buffer.more);
    }

    #[test]
    fn empty_result_has_nothing() {
        let result = QueryResult::default();
        assert_eq!(result.len(), 0);
        assert!(result.ids().is_empty());
        assert!(result.payloads().is_empty());
        assert!(!result.has_more());
        result.release();
    }
}
