//! A simple, volatile, in-memory implementation of [`KVStore`], with hooks to make appends and writes
//! fail.

use std::{
    cell::Cell,
    collections::HashMap,
    sync::{
        Arc, Mutex, MutexGuard,
    },
};

use dbstate_sync::block_store::pluggables::{
    BatchAppendError, KVGet, KVStore, KVWriteError, WriteBatch,
};

thread_local! {
    // `WriteBatch::new` has no access to the store, so rejections are configured per test thread.
    static REJECTED_PREFIX: Cell<Option<u8>> = Cell::new(None);
}

/// Make every [`MemWriteBatch`] created on this thread refuse appends to keys starting with `prefix`.
/// Pass `None` to accept everything again.
pub(crate) fn reject_appends_with_prefix(prefix: Option<u8>) {
    REJECTED_PREFIX.with(|rejected| rejected.set(prefix))
}

/// An in-memory implementation of [`KVStore`].
#[derive(Clone)]
pub(crate) struct MemDB {
    map: Arc<Mutex<HashMap<Vec<u8>, Vec<u8>>>>,
    // Number of writes that still succeed before one fails.
    failing_write: Arc<Mutex<Option<usize>>>,
    writes: Arc<Mutex<usize>>,
}

impl MemDB {
    /// Create a new, empty `MemDB`.
    pub(crate) fn new() -> MemDB {
        MemDB {
            map: Arc::new(Mutex::new(HashMap::new())),
            failing_write: Arc::new(Mutex::new(None)),
            writes: Arc::new(Mutex::new(0)),
        }
    }

    /// Make the next call to [`KVStore::write`] fail without writing anything.
    pub(crate) fn fail_next_write(&self) {
        self.fail_write_after(0)
    }

    /// Let the next `successes` calls to [`KVStore::write`] through, then make one fail without writing
    /// anything.
    pub(crate) fn fail_write_after(&self, successes: usize) {
        *self.failing_write.lock().unwrap() = Some(successes)
    }

    /// Number of successful calls to [`KVStore::write`].
    pub(crate) fn writes(&self) -> usize {
        *self.writes.lock().unwrap()
    }

    /// A copy of every key-value pair.
    pub(crate) fn dump(&self) -> HashMap<Vec<u8>, Vec<u8>> {
        self.map.lock().unwrap().clone()
    }

    pub(crate) fn insert(&self, key: &[u8], value: &[u8]) {
        self.map.lock().unwrap().insert(key.to_vec(), value.to_vec());
    }

    pub(crate) fn remove(&self, key: &[u8]) {
        self.map.lock().unwrap().remove(key);
    }
}

impl KVStore for MemDB {
    type WriteBatch = MemWriteBatch;
    type Snapshot<'a> = MemDBSnapshot<'a>;

    fn write(&mut self, wb: Self::WriteBatch) -> Result<(), KVWriteError> {
        {
            let mut failing_write = self.failing_write.lock().unwrap();
            match *failing_write {
                Some(0) => {
                    *failing_write = None;
                    return Err(KVWriteError {
                        reason: String::from("injected write failure"),
                    });
                }
                Some(successes) => *failing_write = Some(successes - 1),
                None => (),
            }
        }

        let mut map = self.map.lock().unwrap();
        for (key, value) in wb.insertions {
            map.insert(key, value);
        }
        *self.writes.lock().unwrap() += 1;
        Ok(())
    }

    fn snapshot<'b>(&'b self) -> MemDBSnapshot<'b> {
        MemDBSnapshot(self.map.lock().unwrap())
    }
}

impl KVGet for MemDB {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.map.lock().unwrap().get(key).cloned()
    }
}

// A simple implementation of [`WriteBatch`].
pub(crate) struct MemWriteBatch {
    insertions: HashMap<Vec<u8>, Vec<u8>>,
    rejected_prefix: Option<u8>,
}

impl WriteBatch for MemWriteBatch {
    fn new() -> Self {
        MemWriteBatch {
            insertions: HashMap::new(),
            rejected_prefix: REJECTED_PREFIX.with(Cell::get),
        }
    }

    fn set(&mut self, key: &[u8], value: &[u8]) -> Result<(), BatchAppendError> {
        if self.rejected_prefix.is_some() && key.first().copied() == self.rejected_prefix {
            return Err(BatchAppendError {
                reason: format!("key prefix {:?} rejected", self.rejected_prefix),
            });
        }
        self.insertions.insert(key.to_vec(), value.to_vec());
        Ok(())
    }
}

/// A simple implementation of [`KVGet`] used as `KVStore::Snapshot` for `MemDB`.
pub(crate) struct MemDBSnapshot<'a>(MutexGuard<'a, HashMap<Vec<u8>, Vec<u8>>>);

impl KVGet for MemDBSnapshot<'_> {
    fn get(&self, key: &[u8]) -> Option<Vec<u8>> {
        self.0.get(key).cloned()
    }
}
