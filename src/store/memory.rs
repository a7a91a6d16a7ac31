use std::collections::VecDeque;
use std::io;

use super::error::StoreError;
use super::store::DurableStore;

/// Volatile store for tests and ephemeral queues.
///
/// `fail_next_appends` makes the following appends fail with an io error,
/// which is how tests exercise the queue's error paths.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: VecDeque<Vec<u8>>,
    closed: bool,
    failing_appends: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_next_appends(&mut self, count: usize) {
        self.failing_appends = count;
    }

    fn check_open(&self) -> Result<(), StoreError> {
        if self.closed {
            Err(StoreError::Closed)
        } else {
            Ok(())
        }
    }
}

impl DurableStore for MemoryStore {
    fn append(&mut self, records: &[Vec<u8>]) -> Result<(), StoreError> {
        self.check_open()?;
        if self.failing_appends > 0 {
            self.failing_appends -= 1;
            return Err(io::Error::other("injected append failure").into());
        }
        self.records.extend(records.iter().cloned());
        Ok(())
    }

    fn read_at(&mut self, index: usize) -> Result<Option<Vec<u8>>, StoreError> {
        self.check_open()?;
        Ok(self.records.get(index).cloned())
    }

    fn remove_front(&mut self, count: usize) -> Result<(), StoreError> {
        self.check_open()?;
        let count = count.min(self.records.len());
        self.records.drain(..count);
        Ok(())
    }

    fn estimated_len(&self) -> usize {
        if self.closed {
            0
        } else {
            self.records.len()
        }
    }

    fn close(&mut self) -> Result<(), StoreError> {
        self.closed = true;
        self.records.clear();
        Ok(())
    }
}
