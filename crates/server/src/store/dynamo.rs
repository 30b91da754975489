//! DynamoDB-backed [`DocumentStore`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_dynamodb::config::{Credentials, Region};
use aws_sdk_dynamodb::error::{DisplayErrorContext, ProvideErrorMetadata};
use aws_sdk_dynamodb::types::AttributeValue;
use aws_sdk_dynamodb::Client;
use serde_json::Value;
use tracing::{debug, info};

use super::convert::{from_item, to_attribute, to_item, ID_ATTRIBUTE};
use super::{
    Comparison, Connector, Document, DocumentStore, Filter, Operation, Query, StoreCredentials,
    StoreError, StoreHandle,
};
use crate::config::ProcessConfig;

const CREDENTIAL_PROVIDER_NAME: &str = "sleepleague-store-credentials";

/// Service error codes meaning the credential itself was rejected.
const AUTH_ERROR_CODES: [&str; 6] = [
    "UnrecognizedClientException",
    "InvalidSignatureException",
    "IncompleteSignature",
    "InvalidClientTokenId",
    "ExpiredTokenException",
    "MissingAuthenticationTokenException",
];

type Item = HashMap<String, AttributeValue>;

/// Document store backed by one DynamoDB table per collection.
///
/// Tables are named `{prefix}{collection}` and keyed by the string
/// attribute `id`.
#[derive(Clone, Debug)]
pub struct DynamoStore {
    client: Client,
    table_prefix: String,
}

impl DynamoStore {
    pub fn new(client: Client, table_prefix: impl Into<String>) -> Self {
        Self {
            client,
            table_prefix: table_prefix.into(),
        }
    }

    fn table(&self, collection: &str) -> String {
        format!("{}{}", self.table_prefix, collection)
    }

    /// Issue one cheap authenticated call to prove the session works.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Authentication`] if the store rejects the
    /// credential, [`StoreError::Backend`] for any other failure.
    pub async fn verify(&self) -> Result<(), StoreError> {
        self.client
            .list_tables()
            .limit(1)
            .send()
            .await
            .map_err(|e| {
                let code = e.as_service_error().and_then(|s| s.code());
                classify_failure(code, DisplayErrorContext(&e).to_string())
            })?;
        Ok(())
    }
}

fn classify_failure(code: Option<&str>, detail: String) -> StoreError {
    match code {
        Some(code) if AUTH_ERROR_CODES.contains(&code) => StoreError::Authentication(detail),
        _ => StoreError::Backend(detail),
    }
}

/// Append matching items to `docs` until `query`'s limit is reached.
///
/// Returns `true` once the limit is reached.
fn absorb(docs: &mut Vec<Document>, items: &[Item], query: &Query) -> Result<bool, StoreError> {
    for item in items {
        if query.is_full(docs.len()) {
            return Ok(true);
        }
        docs.push(from_item(item)?);
    }
    Ok(query.is_full(docs.len()))
}

/// Filter expression and its placeholder maps for a scan.
#[derive(Debug, Default, PartialEq)]
pub struct FilterExpression {
    pub expression: String,
    pub names: HashMap<String, String>,
    pub values: HashMap<String, AttributeValue>,
}

/// Build a scan filter expression for `filters`, or `None` when empty.
///
/// Field names and values are always passed as placeholders (`#f0`, `:v0`),
/// so reserved words and arbitrary input are safe.
pub fn filter_expression(filters: &[Filter]) -> Option<FilterExpression> {
    if filters.is_empty() {
        return None;
    }
    let mut out = FilterExpression::default();
    let clauses: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, f)| {
            let name = format!("#f{i}");
            let clause = match (&f.comparison, &f.value) {
                (Comparison::In, Value::Array(candidates)) => {
                    let placeholders: Vec<String> = candidates
                        .iter()
                        .enumerate()
                        .map(|(j, v)| {
                            let value = format!(":v{i}_{j}");
                            out.values.insert(value.clone(), to_attribute(v));
                            value
                        })
                        .collect();
                    format!("{name} IN ({})", placeholders.join(", "))
                }
                _ => {
                    let value = format!(":v{i}");
                    out.values.insert(value.clone(), to_attribute(&f.value));
                    format!("{name} {} {value}", f.comparison.symbol())
                }
            };
            out.names.insert(name, f.field.clone());
            clause
        })
        .collect();
    out.expression = clauses.join(" AND ");
    Some(out)
}

#[async_trait]
impl DocumentStore for DynamoStore {
    fn operations(&self) -> Vec<Operation> {
        Operation::ALL.to_vec()
    }

    async fn find(&self, collection: &str, query: &Query) -> Result<Vec<Document>, StoreError> {
        let table = self.table(collection);
        let filter = filter_expression(&query.filters);
        let mut docs = Vec::new();
        if query.is_full(0) {
            return Ok(docs);
        }
        let mut start_key: Option<Item> = None;

        loop {
            let mut scan = self
                .client
                .scan()
                .table_name(&table)
                .set_exclusive_start_key(start_key.take());
            if let Some(f) = &filter {
                scan = scan
                    .filter_expression(&f.expression)
                    .set_expression_attribute_names(Some(f.names.clone()))
                    .set_expression_attribute_values(Some(f.values.clone()));
            }

            let page = scan
                .send()
                .await
                .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))?;

            if absorb(&mut docs, page.items(), query)? {
                return Ok(docs);
            }

            match page.last_evaluated_key() {
                Some(key) if !key.is_empty() => start_key = Some(key.clone()),
                _ => break,
            }
        }

        debug!(table = %table, count = docs.len(), "scan complete");
        Ok(docs)
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Document>, StoreError> {
        let out = self
            .client
            .get_item()
            .table_name(self.table(collection))
            .key(ID_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .send()
            .await
            .map_err(|e| StoreError::Backend(DisplayErrorContext(&e).to_string()))?;

        out.item().map(from_item).transpose()
    }

    async fn insert(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(self.table(collection))
            .set_item(Some(to_item(&doc)))
            .condition_expression("attribute_not_exists(#id)")
            .expression_attribute_names("#id", ID_ATTRIBUTE)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::AlreadyExists {
                    collection: collection.to_string(),
                    id: doc.id,
                })
            }
            Err(e) => Err(StoreError::Backend(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn replace(&self, collection: &str, doc: Document) -> Result<(), StoreError> {
        let result = self
            .client
            .put_item()
            .table_name(self.table(collection))
            .set_item(Some(to_item(&doc)))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ID_ATTRIBUTE)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: doc.id,
                })
            }
            Err(e) => Err(StoreError::Backend(DisplayErrorContext(&e).to_string())),
        }
    }

    async fn remove(&self, collection: &str, id: &str) -> Result<(), StoreError> {
        let result = self
            .client
            .delete_item()
            .table_name(self.table(collection))
            .key(ID_ATTRIBUTE, AttributeValue::S(id.to_string()))
            .condition_expression("attribute_exists(#id)")
            .expression_attribute_names("#id", ID_ATTRIBUTE)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e)
                if e.as_service_error()
                    .is_some_and(|s| s.is_conditional_check_failed_exception()) =>
            {
                Err(StoreError::NotFound {
                    collection: collection.to_string(),
                    id: id.to_string(),
                })
            }
            Err(e) => Err(StoreError::Backend(DisplayErrorContext(&e).to_string())),
        }
    }
}

/// [`Connector`] producing a verified [`DynamoStore`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DynamoConnector;

#[async_trait]
impl Connector for DynamoConnector {
    /// Build the SDK client from static credentials and verify the session.
    ///
    /// Region and endpoint in the credential win over `STORE_REGION` and
    /// `STORE_ENDPOINT`.
    async fn connect(
        &self,
        credentials: StoreCredentials,
        cfg: &ProcessConfig,
    ) -> Result<StoreHandle, StoreError> {
        let region = credentials
            .region
            .clone()
            .unwrap_or_else(|| cfg.store_region.clone());
        let endpoint = credentials
            .endpoint
            .clone()
            .or_else(|| cfg.store_endpoint.clone());

        let sdk_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.clone()))
            .credentials_provider(Credentials::new(
                credentials.access_key_id,
                credentials.secret_access_key,
                credentials.session_token,
                None,
                CREDENTIAL_PROVIDER_NAME,
            ))
            .load()
            .await;

        let mut builder = aws_sdk_dynamodb::config::Builder::from(&sdk_config);
        if let Some(url) = &endpoint {
            builder = builder.endpoint_url(url);
        }
        let client = Client::from_conf(builder.build());

        let store = DynamoStore::new(client, cfg.table_prefix.clone());
        store.verify().await?;

        info!(
            region = %region,
            endpoint = endpoint.as_deref().unwrap_or("default"),
            table_prefix = %cfg.table_prefix,
            "document store session established"
        );
        Ok(Arc::new(store))
    }
}
