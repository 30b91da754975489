//! Account registration.

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use common::ServiceError;
use serde::Deserialize;
use serde_json::{Map, Value};

use super::RouteGroup;
use crate::data::DataAccess;
use crate::server::error::{ApiError, ApiResult};
use crate::server::extract::Payload;
use crate::store::{Document, Query};

const USERS: &str = "users";

/// `/api/auth` routes.
pub struct AuthRoutes {
    db: DataAccess,
}

impl AuthRoutes {
    pub fn new(db: DataAccess) -> Self {
        Self { db }
    }
}

impl RouteGroup for AuthRoutes {
    fn prefix(&self) -> &'static str {
        "/api/auth"
    }

    fn router(&self) -> Router {
        Router::new()
            .route("/register", post(register))
            .with_state(self.db.clone())
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Registration {
    email: Option<String>,
    display_name: Option<String>,
}

fn required(value: Option<String>, name: &str) -> ApiResult<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::bad_request(format!("{name} is required")))
}

async fn register(
    State(db): State<DataAccess>,
    Payload(form): Payload<Registration>,
) -> ApiResult<(StatusCode, Json<Document>)> {
    let email = required(form.email, "email")?.to_lowercase();
    let display_name = required(form.display_name, "displayName")?;
    if !email.contains('@') {
        return Err(ApiError::bad_request("email is not valid"));
    }

    let existing = db.find(USERS, &Query::new().eq("email", email.as_str()).limit(1)).await?;
    if !existing.is_empty() {
        return Err(ServiceError::Conflict(format!("{email} is already registered")).into());
    }

    let mut fields = Map::new();
    fields.insert("email".into(), Value::String(email));
    fields.insert("displayName".into(), Value::String(display_name));
    let user = db.create(USERS, fields).await?;
    tracing::info!(user_id = %user.id, "user registered");
    Ok((StatusCode::CREATED, Json(user)))
}
