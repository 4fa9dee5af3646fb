//! Storage seams: a document store for events/job records and an object
//! store for camera snapshots. Mirrors spec.md §6 ("Storage adapters").
//!
//! Both traits are deliberately narrow — the scheduler and event emitter
//! only ever insert and look records up by a simple filter, never run
//! aggregation pipelines, so there's no reason to expose a full query DSL.

use parking_lot::Mutex;
use std::collections::HashMap;

use crate::error::{CoreError, Result};

/// A loosely-typed document, keyed the way a Mongo-style store would key it.
pub type Document = serde_json::Value;

/// A write-through collection of JSON documents.
pub trait DocumentStore: Send + Sync {
    /// Inserts `doc` into `collection`, returning an assigned id.
    fn insert_one(&self, collection: &str, doc: Document) -> Result<String>;

    /// Returns the first document in `collection` matching every key/value
    /// pair in `filter` (exact equality only).
    fn find_one(&self, collection: &str, filter: &Document) -> Result<Option<Document>>;

    /// Returns every document in `collection` matching `filter`, newest
    /// first, capped at `limit`.
    fn find(&self, collection: &str, filter: &Document, limit: usize) -> Result<Vec<Document>>;

    /// Counts documents in `collection` matching `filter`.
    fn count(&self, collection: &str, filter: &Document) -> Result<u64>;
}

fn matches(doc: &Document, filter: &Document) -> bool {
    let (Document::Object(doc_map), Document::Object(filter_map)) = (doc, filter) else {
        return false;
    };
    filter_map
        .iter()
        .all(|(k, v)| doc_map.get(k).map(|dv| dv == v).unwrap_or(false))
}

/// In-memory [`DocumentStore`] backing tests and the CLI demo. Each
/// collection is an append-only `Vec`; `find`/`find_one` scan linearly,
/// which is fine at the scale this crate's tests operate at.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
    next_id: Mutex<u64>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DocumentStore for InMemoryDocumentStore {
    fn insert_one(&self, collection: &str, mut doc: Document) -> Result<String> {
        let id = {
            let mut next_id = self.next_id.lock();
            let id = *next_id;
            *next_id += 1;
            id
        };
        let id_str = id.to_string();
        if let Document::Object(map) = &mut doc {
            map.insert("_id".to_string(), Document::String(id_str.clone()));
        }
        self.collections
            .lock()
            .entry(collection.to_string())
            .or_default()
            .push(doc);
        Ok(id_str)
    }

    fn find_one(&self, collection: &str, filter: &Document) -> Result<Option<Document>> {
        let collections = self.collections.lock();
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(None),
        };
        Ok(docs.iter().find(|d| matches(d, filter)).cloned())
    }

    fn find(&self, collection: &str, filter: &Document, limit: usize) -> Result<Vec<Document>> {
        let collections = self.collections.lock();
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(Vec::new()),
        };
        Ok(docs
            .iter()
            .rev()
            .filter(|d| matches(d, filter))
            .take(limit)
            .cloned()
            .collect())
    }

    fn count(&self, collection: &str, filter: &Document) -> Result<u64> {
        let collections = self.collections.lock();
        let docs = match collections.get(collection) {
            Some(docs) => docs,
            None => return Ok(0),
        };
        Ok(docs.iter().filter(|d| matches(d, filter)).count() as u64)
    }
}

/// Binary blob storage for camera snapshots. Mirrors spec.md §6's object
/// store seam (put/get/delete/list), trimmed to what the stream pipeline
/// actually calls: presigned URLs and server-side range reads have no
/// counterpart here since snapshots are served directly from memory.
pub trait ObjectStore: Send + Sync {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()>;
    fn get(&self, key: &str) -> Result<Vec<u8>>;
    fn delete(&self, key: &str) -> Result<()>;
    fn list(&self, prefix: &str) -> Result<Vec<String>>;
}

#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<HashMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ObjectStore for InMemoryObjectStore {
    fn put(&self, key: &str, bytes: Vec<u8>) -> Result<()> {
        self.objects.lock().insert(key.to_string(), bytes);
        Ok(())
    }

    fn get(&self, key: &str) -> Result<Vec<u8>> {
        self.objects
            .lock()
            .get(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(key.to_string()))
    }

    fn delete(&self, key: &str) -> Result<()> {
        self.objects.lock().remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .objects
            .lock()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}
