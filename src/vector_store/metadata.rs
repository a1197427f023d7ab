//! Records kept in lockstep with index rows.

use super::Record;

/// Append-only sequence of records; a record's position is its index row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataStore {
    records: Vec<Record>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append records; the first one gets row `len()` at call time.
    pub fn append(&mut self, records: Vec<Record>) {
        self.records.extend(records);
    }

    pub fn get(&self, row: usize) -> Option<&Record> {
        self.records.get(row)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Record> {
        self.records.iter()
    }

    pub fn as_slice(&self) -> &[Record] {
        &self.records
    }
}

impl From<Vec<Record>> for MetadataStore {
    fn from(records: Vec<Record>) -> Self {
        Self { records }
    }
}
