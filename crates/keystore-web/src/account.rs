//! Account route handlers: register, login, profile, update, delete.
//!
//! Password hashing is CPU-bound; every call that hashes or verifies a
//! password runs on the blocking pool.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use keystore_store::{StoreResult, User};
use keystore_vault::{CredentialClock, identity};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;
use crate::validate::{self, ApiJson};

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// Partial profile update. The email is fixed at registration because the
/// account is indexed by it.
#[derive(Deserialize)]
pub struct UpdateAccountRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub avatar: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            token: None,
        }
    }
}

/// The caller's decrypted profile.
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub id: String,
    pub lookup_id: String,
    pub name: String,
    pub email: String,
    pub avatar: Option<String>,
    pub verified: bool,
    pub credential_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// POST /api/auth/register
// ---------------------------------------------------------------------------

pub async fn register(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> Result<(StatusCode, Json<TokenResponse>), ApiError> {
    let name = validate::required("name", &req.name)?.to_owned();
    let email = validate::email(&req.email)?.to_owned();
    let password = validate::password(&req.password)?.to_owned();

    // Cheap early exit before hashing; the unique index stays authoritative.
    if state
        .users
        .find_by_lookup_id(&identity::identify(&email))
        .await?
        .is_some()
    {
        return Err(keystore_store::StoreError::DuplicateIdentity.into());
    }

    let now = crate::now();
    let user =
        tokio::task::spawn_blocking(move || User::register(&name, &email, &password, now))
            .await??;
    state.users.create(&user).await?;

    info!(user_id = %user.id, "account registered");

    let token = state.tokens.issue(&user.id, crate::now())?;
    Ok((StatusCode::CREATED, Json(TokenResponse { token })))
}

// ---------------------------------------------------------------------------
// POST /api/auth/login
// ---------------------------------------------------------------------------

pub async fn login(
    State(state): State<Arc<AppState>>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> Result<Json<TokenResponse>, ApiError> {
    let email = validate::required("email", &req.email)?;
    validate::required("password", &req.password)?;

    let Some(user) = state
        .users
        .find_by_lookup_id(&identity::identify(email))
        .await?
    else {
        debug!("login for unknown identity");
        return Err(ApiError::invalid_credentials());
    };

    let password = req.password;
    let (user, matches) = tokio::task::spawn_blocking(move || {
        let matches = user.verify_password(&password);
        (user, matches)
    })
    .await?;

    if !matches {
        debug!(user_id = %user.id, "login with wrong password");
        return Err(ApiError::invalid_credentials());
    }

    info!(user_id = %user.id, "login");
    let token = state.tokens.issue(&user.id, crate::now())?;
    Ok(Json(TokenResponse { token }))
}

// ---------------------------------------------------------------------------
// GET /api/auth/me
// ---------------------------------------------------------------------------

pub async fn me(AuthUser(user): AuthUser) -> Result<Json<ProfileResponse>, ApiError> {
    let profile = user.profile()?;
    Ok(Json(ProfileResponse {
        lookup_id: user.lookup_id.to_string(),
        name: profile.name,
        email: profile.email,
        avatar: user.avatar.clone(),
        verified: user.verified,
        credential_changed_at: user.credential_changed_at(),
        created_at: user.created_at,
        id: user.id,
    }))
}

// ---------------------------------------------------------------------------
// PUT /api/auth/update
// ---------------------------------------------------------------------------

pub async fn update(
    State(state): State<Arc<AppState>>,
    AuthUser(mut user): AuthUser,
    ApiJson(req): ApiJson<UpdateAccountRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    if req.email.is_some() {
        return Err(ApiError::bad_request("email cannot be changed"));
    }
    let name = validate::optional("name", req.name.as_deref())?.map(str::to_owned);
    let password = req
        .password
        .as_deref()
        .map(validate::password)
        .transpose()?
        .map(str::to_owned);

    let now = crate::now();
    if let Some(name) = &name {
        user.set_name(name, now)?;
    }
    if let Some(avatar) = req.avatar {
        user.set_avatar(Some(avatar).filter(|a| !a.is_empty()), now);
    }

    let rotated = password.is_some();
    if let Some(password) = password {
        user = tokio::task::spawn_blocking(move || -> StoreResult<User> {
            user.rotate_password(&password, now)?;
            Ok(user)
        })
        .await??;
    }

    state.users.save(&user).await?;

    let mut response = MessageResponse::new("Profile updated");
    if rotated {
        info!(user_id = %user.id, "password rotated, earlier tokens revoked");
        let issued_at = user.credential_changed_at().map_or(now, |changed| changed.max(now));
        response.token = Some(state.tokens.issue(&user.id, issued_at)?);
    } else {
        debug!(user_id = %user.id, "profile updated");
    }
    Ok(Json(response))
}

// ---------------------------------------------------------------------------
// DELETE /api/auth/delete
// ---------------------------------------------------------------------------

pub async fn delete(
    State(state): State<Arc<AppState>>,
    AuthUser(user): AuthUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.users.delete(&user.id).await? {
        return Err(ApiError::NotFound("user not found".into()));
    }
    info!(user_id = %user.id, "account deleted");
    Ok(Json(MessageResponse::new("Account deleted")))
}
