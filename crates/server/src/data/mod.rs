//! Data-access façade injected into every route group.
//!
//! [`DataAccess`] is the only way route code reaches the document store. It
//! is built once from the [`StoreHandle`], checked with [`DataAccess::verify`]
//! before any route group is mounted, and then cloned into each group.

use std::collections::BTreeSet;
use std::fmt;

use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use uuid::Uuid;

use crate::store::{Document, Operation, Query, StoreError, StoreHandle};

/// Operations every route group relies on.
pub const REQUIRED_OPERATIONS: [Operation; 5] = Operation::ALL;

/// Field set on creation.
pub const CREATED_AT: &str = "createdAt";
/// Field refreshed on every write.
pub const UPDATED_AT: &str = "updatedAt";

/// The façade does not expose the operation set route groups need.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("data access façade exposes [{}], missing [{}]", join(.exposed), join(.missing))]
pub struct SurfaceError {
    pub exposed: Vec<Operation>,
    pub missing: Vec<Operation>,
}

fn join(ops: &[Operation]) -> String {
    ops.iter()
        .map(|o| o.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Query/mutation capability bound to the process's store handle.
///
/// Cheap to clone; every clone shares the same handle.
#[derive(Clone)]
pub struct DataAccess {
    store: StoreHandle,
}

impl DataAccess {
    pub fn new(store: StoreHandle) -> Self {
        Self { store }
    }

    /// Operations exposed through this façade.
    pub fn surface(&self) -> BTreeSet<Operation> {
        self.store.operations().into_iter().collect()
    }

    /// Check that the surface is non-empty and includes every
    /// [`REQUIRED_OPERATIONS`] entry.
    ///
    /// # Errors
    ///
    /// Returns a [`SurfaceError`] listing what is exposed and what is missing.
    pub fn verify(&self) -> Result<(), SurfaceError> {
        let surface = self.surface();
        let missing: Vec<Operation> = REQUIRED_OPERATIONS
            .iter()
            .copied()
            .filter(|op| !surface.contains(op))
            .collect();

        if surface.is_empty() || !missing.is_empty() {
            return Err(SurfaceError {
                exposed: surface.into_iter().collect(),
                missing,
            });
        }
        Ok(())
    }

    /// Documents in `collection` matching `query`.
    pub async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        self.store.find(collection, query).await
    }

    /// The document with `id`, if any.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        self.store.get(collection, id).await
    }

    /// Create a document with a fresh id and creation timestamps.
    ///
    /// An `id` key in `fields` is ignored.
    pub async fn create(
        &self,
        collection: &str,
        mut fields: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        fields.remove("id");
        let now = Value::String(timestamp());
        fields.insert(CREATED_AT.to_string(), now.clone());
        fields.insert(UPDATED_AT.to_string(), now);

        let doc = Document {
            id: Uuid::new_v4().to_string(),
            fields,
        };
        self.store.insert(collection, doc.clone()).await?;
        Ok(doc)
    }

    /// Shallow-merge `changes` into an existing document.
    ///
    /// `id` and `createdAt` cannot be changed; `updatedAt` is refreshed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist.
    pub async fn update(
        &self,
        collection: &str,
        id: &str,
        changes: Map<String, Value>,
    ) -> Result<Document, StoreError> {
        let mut doc = self
            .store
            .get(collection, id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                collection: collection.to_string(),
                id: id.to_string(),
            })?;

        for (key, value) in changes {
            if key != "id" && key != CREATED_AT {
                doc.fields.insert(key, value);
            }
        }
        doc.fields
            .insert(UPDATED_AT.to_string(), Value::String(timestamp()));

        self.store.replace(collection, doc.clone()).await?;
        Ok(doc)
    }

    /// Delete a document.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the document does not exist.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        self.store.remove(collection, id).await
    }
}

impl fmt::Debug for DataAccess {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataAccess")
            .field("surface", &self.surface())
            .finish()
    }
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
