//! In-memory [`DocumentStore`] used by tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::{Document, DocumentStore, Operation, Query, StoreError, StoreHandle};

type Collections = HashMap<String, BTreeMap<String, Document>>;

/// Document store keeping every collection in a process-local map.
///
/// The advertised operation set is configurable so tests can simulate an
/// incomplete store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    collections: Mutex<Collections>,
    operations: Option<Vec<Operation>>,
}

impl MemoryStore {
    /// A store advertising every operation.
    pub fn new() -> Self {
        Self::default()
    }

    /// A store advertising only `operations`.
    pub fn with_operations(operations: &[Operation]) -> Self {
        Self {
            collections: Mutex::default(),
            operations: Some(operations.to_vec()),
        }
    }

    pub fn handle(self) -> StoreHandle {
        Arc::new(self)
    }

    fn supports(&self, op: Operation) -> Result<(), StoreError> {
        if self.operations().contains(&op) {
            Ok(())
        } else {
            Err(StoreError::Unsupported(op))
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Collections> {
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn operations(&self) -> Vec<Operation> {
        self.operations
            .clone()
            .unwrap_or_else(|| Operation::ALL.to_vec())
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.supports(Operation::Find)?;
        let collections = self.lock();
        let docs = collections
            .get(collection)
            .into_iter()
            .flat_map(|c| c.values())
            .filter(|d| query.matches(d))
            .take(query.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect();
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.supports(Operation::Get)?;
        Ok(self
            .lock()
            .get(collection)
            .and_then(|c| c.get(id))
            .cloned())
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        self.supports(Operation::Create)?;
        let mut collections = self.lock();
        let docs = collections.entry(collection.to_string()).or_default();
        if docs.contains_key(&doc.id) {
            return Err(StoreError::AlreadyExists {
                collection: collection.to_string(),
                id: doc.id,
            });
        }
        docs.insert(doc.id.clone(), doc);
        Ok(())
    }

    async fn replace(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        self.supports(Operation::Update)?;
        let mut collections = self.lock();
        match collections.get_mut(collection).and_then(|c| c.get_mut(&doc.id)) {
            Some(existing) => {
                *existing = doc;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: doc.id,
            }),
        }
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.supports(Operation::Delete)?;
        let mut collections = self.lock();
        match collections.get_mut(collection).and_then(|c| c.remove(id)) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            }),
        }
    }
}
