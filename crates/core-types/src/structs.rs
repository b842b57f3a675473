use serde::{Deserialize, Serialize};

/// Pagination descriptor for a select: `LIMIT`, `OFFSET` and an optional total-count hint.
///
/// A zero limit or offset is omitted from the rendered statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    limit: u64,
    offset: u64,
    total_records: Option<u64>,
}

impl Cursor {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self {
            limit,
            offset,
            total_records: None,
        }
    }

    pub fn with_total(limit: u64, offset: u64, total_records: u64) -> Self {
        Self {
            limit,
            offset,
            total_records: Some(total_records),
        }
    }

    /// A cursor that emits neither `LIMIT` nor `OFFSET`.
    pub fn unbounded() -> Self {
        Self::new(0, 0)
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn total_records(&self) -> Option<u64> {
        self.total_records
    }

    /// The cursor for the page after this one, or `None` once the known total is exhausted.
    pub fn next_page(&self) -> Option<Self> {
        if self.limit == 0 {
            return None;
        }
        let offset = self.offset + self.limit;
        match self.total_records {
            Some(total) if offset >= total => None,
            _ => Some(Self { offset, ..*self }),
        }
    }
}

impl Default for Cursor {
    fn default() -> Self {
        Self::new(50, 0)
    }
}
