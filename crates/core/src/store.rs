use crate::models::{DocumentContent, DocumentRecord};
use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Everything the process knows about one ingested document. Entries are
/// built completely before insertion and never mutated afterwards.
#[derive(Debug)]
pub struct DocumentEntry {
    pub record: DocumentRecord,
    pub content: DocumentContent,
    pub embeddings: Vec<Vec<f32>>,
}

/// In-memory registry of ingested documents, in insertion order.
///
/// Writers publish fully-built entries behind one lock, so readers never
/// observe a partial record/content/embeddings triple; readers clone the
/// `Arc`s out and work lock-free from then on.
#[derive(Default)]
pub struct DocumentStore {
    inner: RwLock<Inner>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Arc<DocumentEntry>>,
    by_id: HashMap<String, usize>,
}

impl DocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: DocumentEntry) -> Arc<DocumentEntry> {
        let entry = Arc::new(entry);
        let mut inner = write_lock(&self.inner);
        let index = inner.entries.len();
        inner.by_id.insert(entry.record.id.clone(), index);
        inner.entries.push(Arc::clone(&entry));
        entry
    }

    pub fn get(&self, id: &str) -> Option<Arc<DocumentEntry>> {
        let inner = read_lock(&self.inner);
        inner
            .by_id
            .get(id)
            .and_then(|&index| inner.entries.get(index))
            .map(Arc::clone)
    }

    /// Resolves a requested subset (unknown ids are skipped), or every
    /// document in insertion order when no subset is given.
    pub fn select(&self, ids: Option<&[String]>) -> Vec<Arc<DocumentEntry>> {
        match ids {
            None => read_lock(&self.inner).entries.to_vec(),
            Some(ids) => ids.iter().filter_map(|id| self.get(id)).collect(),
        }
    }

    pub fn list(&self) -> Vec<DocumentRecord> {
        read_lock(&self.inner)
            .entries
            .iter()
            .map(|entry| entry.record.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        read_lock(&self.inner).entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// Entries are append-only, so data behind a poisoned lock is still
// consistent and the guard can be recovered instead of panicking.
fn read_lock(lock: &RwLock<Inner>) -> RwLockReadGuard<'_, Inner> {
    match lock.read() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

fn write_lock(lock: &RwLock<Inner>) -> RwLockWriteGuard<'_, Inner> {
    match lock.write() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
