use super::error::StoreError;

/// An ordered, durable log of opaque records.
///
/// Callers normally go through a [`Session`]: session dequeues are tentative
/// and only become removals on [`Session::flush`]. A session dropped without
/// flushing leaves the store exactly as it was.
pub trait DurableStore: Send {
    /// Durably append records, in order. Returns after the data is synced.
    fn append(&mut self, records: &[Vec<u8>]) -> Result<(), StoreError>;

    /// Read the record `index` positions behind the head, without removing it.
    fn read_at(&mut self, index: usize) -> Result<Option<Vec<u8>>, StoreError>;

    /// Durably remove up to `count` records from the head.
    fn remove_front(&mut self, count: usize) -> Result<(), StoreError>;

    /// Number of live records.
    fn estimated_len(&self) -> usize;

    /// Release the store. Calling it again is a no-op.
    fn close(&mut self) -> Result<(), StoreError>;

    fn open_session(&mut self) -> Session<'_, Self>
    where
        Self: Sized,
    {
        Session::new(self)
    }
}

/// A unit of work against a store. Nothing is persisted until `flush`.
pub struct Session<'a, S: DurableStore + ?Sized> {
    store: &'a mut S,
    appended: Vec<Vec<u8>>,
    dequeued: usize,
}

impl<'a, S: DurableStore + ?Sized> Session<'a, S> {
    pub fn new(store: &'a mut S) -> Self {
        Self {
            store,
            appended: Vec::new(),
            dequeued: 0,
        }
    }

    /// Stage a record for append.
    pub fn enqueue(&mut self, record: Vec<u8>) {
        self.appended.push(record);
    }

    /// Tentatively take the next record. It is removed only on `flush`.
    pub fn dequeue(&mut self) -> Result<Option<Vec<u8>>, StoreError> {
        let record = self.store.read_at(self.dequeued)?;
        if record.is_some() {
            self.dequeued += 1;
        }
        Ok(record)
    }

    /// Persist staged dequeues, then staged appends.
    pub fn flush(&mut self) -> Result<(), StoreError> {
        if self.dequeued > 0 {
            self.store.remove_front(self.dequeued)?;
            self.dequeued = 0;
        }
        if !self.appended.is_empty() {
            self.store.append(&self.appended)?;
            self.appended.clear();
        }
        Ok(())
    }
}
