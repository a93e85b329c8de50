use serde::{Deserialize, Serialize};

/// Paginated envelope returned by every list and aggregate operation.
///
/// `count` is the number of records on this page, `total_count` the number of
/// matches ignoring the page window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbListResponse<T> {
    pub records: Vec<T>,
    pub count: usize,
    pub total_count: usize,
}

impl<T> DbListResponse<T> {
    pub fn of(records: Vec<T>, total_count: usize) -> Self {
        let count = records.len();
        Self {
            records,
            count,
            total_count: total_count.max(count),
        }
    }

    pub fn empty() -> Self {
        Self::of(Vec::new(), 0)
    }

    pub fn map<U>(self, f: impl FnMut(T) -> U) -> DbListResponse<U> {
        DbListResponse {
            records: self.records.into_iter().map(f).collect(),
            count: self.count,
            total_count: self.total_count,
        }
    }
}

impl<T> Default for DbListResponse<T> {
    fn default() -> Self {
        Self::empty()
    }
}
