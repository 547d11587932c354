//! The HPACK dynamic table: a bounded, FIFO-evicted list of header pairs
//! indexed immediately after the static table's 61 entries.

use bytes::Bytes;
use std::collections::VecDeque;

const ENTRY_OVERHEAD: usize = 32;

#[derive(Debug)]
pub struct DynamicTable {
    entries: VecDeque<(Bytes, Bytes)>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self { entries: VecDeque::new(), size: 0, max_size }
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to_fit();
    }

    pub fn insert(&mut self, name: Bytes, value: Bytes) {
        self.size += name.len() + value.len() + ENTRY_OVERHEAD;
        self.entries.push_front((name, value));
        self.evict_to_fit();
    }

    fn evict_to_fit(&mut self) {
        while self.size > self.max_size {
            if let Some((name, value)) = self.entries.pop_back() {
                self.size -= name.len() + value.len() + ENTRY_OVERHEAD;
            } else {
                break;
            }
        }
    }

    /// 0-indexed lookup relative to the dynamic table (caller subtracts
    /// the static table length from the HPACK index first).
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&(Bytes, Bytes)> {
        self.entries.get(index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inserted_entries_evict_oldest_first_past_capacity() {
        let mut table = DynamicTable::new(ENTRY_OVERHEAD + 2);
        table.insert(Bytes::from_static(b"a"), Bytes::from_static(b""));
        table.insert(Bytes::from_static(b"b"), Bytes::from_static(b""));
        assert_eq!(table.get(0).unwrap().0, Bytes::from_static(b"b"));
        assert!(table.get(1).is_none());
    }
}
