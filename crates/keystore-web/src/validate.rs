//! Request body extraction and field validation.
//!
//! Handlers take their bodies through [`ApiJson`] so a malformed or
//! incomplete body becomes a `400` with the usual `{"message"}` shape instead
//! of axum's plain-text rejection.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use serde::de::DeserializeOwned;

use crate::error::ApiError;

/// Minimum account password length, in characters.
pub const MIN_PASSWORD_LEN: usize = 8;

/// JSON body extractor that rejects with [`ApiError::BadRequest`].
pub struct ApiJson<T>(pub T);

impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    ApiError::bad_request(rejection.body_text())
}

/// A required string must be non-empty.
pub fn required<'a>(field: &str, value: &'a str) -> Result<&'a str, ApiError> {
    if value.trim().is_empty() {
        return Err(ApiError::bad_request(format!("{field} is required")));
    }
    Ok(value)
}

/// An optional string, when provided, must be non-empty.
pub fn optional<'a>(field: &str, value: Option<&'a str>) -> Result<Option<&'a str>, ApiError> {
    value.map(|v| required(field, v)).transpose()
}

pub fn email(value: &str) -> Result<&str, ApiError> {
    let value = required("email", value)?;
    if !value.contains('@') {
        return Err(ApiError::bad_request("email is not valid"));
    }
    Ok(value)
}

pub fn password(value: &str) -> Result<&str, ApiError> {
    let value = required("password", value)?;
    if value.chars().count() < MIN_PASSWORD_LEN {
        return Err(ApiError::bad_request(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn required_rejects_blank() {
        assert!(required("name", "").is_err());
        assert!(required("name", "   ").is_err());
        assert_eq!(required("name", "Alice").unwrap(), "Alice");
    }

    #[test]
    fn optional_allows_absent_but_not_empty() {
        assert_eq!(optional("app", None).unwrap(), None);
        assert_eq!(optional("app", Some("x")).unwrap(), Some("x"));
        assert!(optional("app", Some("")).is_err());
    }

    #[test]
    fn email_needs_an_at_sign() {
        assert!(email("alice@example.com").is_ok());
        assert!(email("alice.example.com").is_err());
        assert!(email("").is_err());
    }

    #[test]
    fn password_length_counts_characters() {
        assert!(password("1234567").is_err());
        assert!(password("12345678").is_ok());
        assert!(password("pässwörd").is_ok());
    }
}
