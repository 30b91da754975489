//! Document-store session: credentials, the store abstraction, and the
//! DynamoDB-backed implementation.
//!
//! # Lifecycle
//!
//! 1. [`credentials::resolve`] picks the credential source for the configured
//!    mode and parses it.
//! 2. A [`Connector`] turns the credential into a [`StoreHandle`], verifying
//!    the session with one authenticated call.
//! 3. The handle is wrapped once in [`crate::data::DataAccess`] and never
//!    touched directly by route code.
//!
//! Every failure in steps 1–2 is fatal to startup; there is no degraded mode.

pub mod convert;
pub mod credentials;
pub mod dynamo;
#[cfg(test)]
pub mod memory;

pub use credentials::{CredentialError, StoreCredentials};
pub use dynamo::DynamoConnector;

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::config::ProcessConfig;

/// Shared, authenticated session to the document store.
pub type StoreHandle = Arc<dyn DocumentStore>;

/// Errors produced by the store layer.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The addressed document does not exist.
    #[error("{collection}/{id} not found")]
    NotFound { collection: String, id: String },

    /// A document with this id already exists.
    #[error("{collection}/{id} already exists")]
    AlreadyExists { collection: String, id: String },

    /// The store does not offer this operation.
    #[error("operation `{0}` is not supported by this store")]
    Unsupported(Operation),

    /// The store rejected the supplied credentials.
    #[error("store rejected credentials: {0}")]
    Authentication(String),

    /// Any other failed store request.
    #[error("store request failed: {0}")]
    Backend(String),

    /// A stored item could not be mapped to a document.
    #[error("malformed document: {0}")]
    Malformed(String),
}

/// Operations a store can advertise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Find,
    Get,
    Create,
    Update,
    Delete,
}

impl Operation {
    /// Every operation, in declaration order.
    pub const ALL: [Operation; 5] = [
        Operation::Find,
        Operation::Get,
        Operation::Create,
        Operation::Update,
        Operation::Delete,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Operation::Find => "find",
            Operation::Get => "get",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A stored JSON object keyed by `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl Document {
    /// Value of `field`, treating `id` as a regular field.
    pub fn field(&self, field: &str) -> Option<Value> {
        if field == "id" {
            Some(Value::String(self.id.clone()))
        } else {
            self.fields.get(field).cloned()
        }
    }
}

/// Comparison applied by a [`Filter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    /// Equal to any element of an array value.
    In,
}

impl Comparison {
    /// Operator symbol as used in store filter expressions.
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Eq => "=",
            Comparison::Ne => "<>",
            Comparison::Lt => "<",
            Comparison::Le => "<=",
            Comparison::Gt => ">",
            Comparison::Ge => ">=",
            Comparison::In => "IN",
        }
    }
}

/// A single `field <comparison> value` predicate.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub field: String,
    pub comparison: Comparison,
    pub value: Value,
}

impl Filter {
    pub fn new(field: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            comparison,
            value: value.into(),
        }
    }

    /// Whether `doc` satisfies this predicate.
    ///
    /// Documents missing the field never match, not even for
    /// [`Comparison::Ne`].
    pub fn matches(&self, doc: &Document) -> bool {
        let Some(actual) = doc.field(&self.field) else {
            return false;
        };
        let ordering = compare_values(&actual, &self.value);
        match self.comparison {
            Comparison::Eq => ordering == Some(Ordering::Equal),
            Comparison::Ne => ordering != Some(Ordering::Equal),
            Comparison::Lt => ordering == Some(Ordering::Less),
            Comparison::Le => matches!(ordering, Some(Ordering::Less | Ordering::Equal)),
            Comparison::Gt => ordering == Some(Ordering::Greater),
            Comparison::Ge => matches!(ordering, Some(Ordering::Greater | Ordering::Equal)),
            Comparison::In => matches!(
                &self.value,
                Value::Array(candidates)
                    if candidates
                        .iter()
                        .any(|c| compare_values(&actual, c) == Some(Ordering::Equal))
            ),
        }
    }
}

/// Conjunction of filters with an optional result limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a `field <comparison> value` predicate.
    pub fn filter(mut self, field: impl Into<String>, comparison: Comparison, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(field, comparison, value));
        self
    }

    /// Shorthand for an equality predicate.
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(field, Comparison::Eq, value)
    }

    /// Predicate matching a field equal to any of `values`.
    pub fn any_of(self, field: impl Into<String>, values: Vec<Value>) -> Self {
        self.filter(field, Comparison::In, Value::Array(values))
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `count` results already reach the limit.
    pub fn is_full(&self, count: usize) -> bool {
        self.limit.is_some_and(|limit| count >= limit)
    }

    /// Whether `doc` satisfies every filter.
    pub fn matches(&self, doc: &Document) -> bool {
        self.filters.iter().all(|f| f.matches(doc))
    }
}

fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ if a == b => Some(Ordering::Equal),
        _ => None,
    }
}

/// Low-level document storage, one table per collection.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Operations this store offers.
    fn operations(&self) -> Vec<Operation>;

    /// Every document in `collection` matching `query`.
    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError>;

    /// The document with `id`, if present.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError>;

    /// Store a new document; fails with [`StoreError::AlreadyExists`] if the id is taken.
    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    /// Overwrite an existing document; fails with [`StoreError::NotFound`] if absent.
    async fn replace(&self, collection: &str, doc: Document) -> Result<(), StoreError>;

    /// Delete a document; fails with [`StoreError::NotFound`] if absent.
    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError>;
}

/// Establishes an authenticated store session from resolved credentials.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(
        &self,
        credentials: StoreCredentials,
        cfg: &ProcessConfig,
    ) -> Result<StoreHandle, StoreError>;
}
