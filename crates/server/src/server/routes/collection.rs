//! CRUD routes over a single document collection.

use std::collections::HashMap;

use axum::{
    extract::{Path, Query as QueryString, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};

use super::RouteGroup;
use crate::data::DataAccess;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::Payload;
use crate::store::{Document, Query};

const LIMIT_PARAM: &str = "limit";

/// Routes exposing one collection under a prefix.
pub struct CollectionRoutes {
    prefix: &'static str,
    collection: &'static str,
    db: DataAccess,
}

impl CollectionRoutes {
    pub fn new(prefix: &'static str, collection: &'static str, db: DataAccess) -> Self {
        Self {
            prefix,
            collection,
            db,
        }
    }
}

#[derive(Clone)]
struct Collection {
    name: &'static str,
    db: DataAccess,
}

impl RouteGroup for CollectionRoutes {
    fn prefix(&self) -> &'static str {
        self.prefix
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/", get(list).post(create))
            .route(
                "/:id",
                get(fetch).put(update).patch(update).delete(remove),
            )
            .with_state(Collection {
                name: self.collection,
                db: self.db.clone(),
            })
    }
}

/// Build a [`Query`] from query-string parameters.
///
/// Every parameter except `limit` is an equality filter. Values that parse
/// as JSON numbers or booleans match either the typed value or the raw
/// string, so `?userId=42` finds both `42` and `"42"`.
fn query_from_params(params: HashMap<String, String>) -> ApiResult<Query> {
    let mut query = Query::new();
    for (key, raw) in params {
        if key == LIMIT_PARAM {
            let limit = raw
                .parse::<usize>()
                .map_err(|_| ApiError::bad_request(format!("invalid limit {raw:?}")))?;
            query = query.limit(limit);
        } else {
            query = match typed_value(&raw) {
                Some(typed) => query.any_of(key, vec![typed, Value::String(raw)]),
                None => query.eq(key, raw),
            };
        }
    }
    Ok(query)
}

fn typed_value(raw: &str) -> Option<Value> {
    match serde_json::from_str::<Value>(raw) {
        Ok(v @ (Value::Number(_) | Value::Bool(_))) => Some(v),
        _ => None,
    }
}

async fn list(
    State(c): State<Collection>,
    QueryString(params): QueryString<HashMap<String, String>>,
) -> ApiResult<Json<Vec<Document>>> {
    let query = query_from_params(params)?;
    Ok(Json(c.db.find(c.name, &query).await?))
}

async fn fetch(State(c): State<Collection>, Path(id): Path<String>) -> ApiResult<Json<Document>> {
    c.db.get(c.name, &id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found(format!("{}/{id} not found", c.name)))
}

async fn create(
    State(c): State<Collection>,
    Payload(fields): Payload<Map<String, Value>>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let doc = c.db.create(c.name, fields).await?;
    tracing::debug!(collection = c.name, id = %doc.id, "document created");
    Ok((StatusCode::CREATED, Json(doc)))
}

async fn update(
    State(c): State<Collection>,
    Path(id): Path<String>,
    Payload(changes): Payload<Map<String, Value>>,
) -> ApiResult<Json<Document>> {
    Ok(Json(c.db.update(c.name, &id, changes).await?))
}

async fn remove(State(c): State<Collection>, Path(id): Path<String>) -> ApiResult<StatusCode> {
    c.db.delete(c.name, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}
