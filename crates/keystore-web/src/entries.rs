//! Vault entry route handlers.
//!
//! All handlers go through `records.for_owner(caller)`, so an id that belongs
//! to another user is indistinguishable from one that does not exist.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use keystore_vault::{EntryFields, EntryPatch, FieldKey, PlainEntry, VaultRecord};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::account::MessageResponse;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validate::{self, ApiJson};

#[derive(Deserialize)]
pub struct CreateEntryRequest {
    pub app: String,
    pub email: String,
    pub username: String,
    pub password: String,
    /// Absent means "no authenticator"; stored as an empty string.
    pub authenticator: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateEntryRequest {
    pub app: Option<String>,
    pub email: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub authenticator: Option<String>,
}

/// A decrypted entry as returned to its owner.
#[derive(Debug, Serialize)]
pub struct EntryView {
    pub id: String,
    pub app: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub authenticator: String,
    pub last_changed_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl EntryView {
    fn open(record: &VaultRecord, key: &FieldKey) -> Result<Self, ApiError> {
        let plain = record.open(key)?;
        Ok(Self {
            id: record.id.clone(),
            app: plain.app,
            email: plain.email,
            username: plain.username,
            password: plain.password,
            authenticator: plain.authenticator,
            last_changed_at: record.last_changed_at,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}

impl CreateEntryRequest {
    fn into_entry(self) -> Result<PlainEntry, ApiError> {
        validate::required("app", &self.app)?;
        validate::required("email", &self.email)?;
        validate::required("username", &self.username)?;
        validate::required("password", &self.password)?;
        Ok(EntryFields {
            app: self.app,
            email: self.email,
            username: self.username,
            password: self.password,
            authenticator: self.authenticator.unwrap_or_default(),
        })
    }
}

impl UpdateEntryRequest {
    fn into_patch(self) -> Result<EntryPatch, ApiError> {
        validate::optional("app", self.app.as_deref())?;
        validate::optional("email", self.email.as_deref())?;
        validate::optional("username", self.username.as_deref())?;
        validate::optional("password", self.password.as_deref())?;
        Ok(EntryPatch {
            app: self.app,
            email: self.email,
            username: self.username,
            password: self.password,
            authenticator: self.authenticator,
        })
    }
}

// ---------------------------------------------------------------------------
// POST /api/keystore
// ---------------------------------------------------------------------------

pub async fn create(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    ApiJson(req): ApiJson<CreateEntryRequest>,
) -> Result<(StatusCode, Json<EntryView>), ApiError> {
    let entry = req.into_entry()?;
    let key = user.field_key();

    let record = VaultRecord::create(&user.id, &entry, &key, crate::now())?;
    state.records.for_owner(&user.id).insert(&record).await?;

    info!(user_id = %user.id, record_id = %record.id, "entry created");
    Ok((StatusCode::CREATED, Json(EntryView::open(&record, &key)?)))
}

// ---------------------------------------------------------------------------
// GET /api/keystore
// ---------------------------------------------------------------------------

pub async fn list(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<Vec<EntryView>>, ApiError> {
    let key = user.field_key();
    let records = state.records.for_owner(&user.id).list().await?;

    let views = records
        .iter()
        .map(|record| EntryView::open(record, &key))
        .collect::<Result<Vec<_>, _>>()?;

    debug!(user_id = %user.id, count = views.len(), "entries listed");
    Ok(Json(views))
}

// ---------------------------------------------------------------------------
// PUT /api/keystore/{id}
// ---------------------------------------------------------------------------

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
    ApiJson(req): ApiJson<UpdateEntryRequest>,
) -> Result<Json<EntryView>, ApiError> {
    let patch = req.into_patch()?;
    let key = user.field_key();
    let vault = state.records.for_owner(&user.id);

    let Some(mut record) = vault.find(&id).await? else {
        return Err(ApiError::entry_not_found());
    };

    if !patch.is_empty() {
        let password_rotated = record.apply(&patch, &key, crate::now())?;
        if !vault.update(&record).await? {
            return Err(ApiError::entry_not_found());
        }
        info!(user_id = %user.id, record_id = %record.id, password_rotated, "entry updated");
    }

    Ok(Json(EntryView::open(&record, &key)?))
}

// ---------------------------------------------------------------------------
// DELETE /api/keystore/{id}
// ---------------------------------------------------------------------------

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.records.for_owner(&user.id).delete(&id).await? {
        return Err(ApiError::entry_not_found());
    }
    info!(user_id = %user.id, record_id = %id, "entry deleted");
    Ok(Json(MessageResponse::new("Entry deleted")))
}
