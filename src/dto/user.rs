use super::trimmed;
use crate::domain;
use chrono::{DateTime, Utc};
use derive_more::Display;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::Validate;

/// DTO for a user. Timestamps are only filled in when explicitly requested.
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct UserView {
    #[schema(example = 4)]
    pub id: i32,
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub email_verified_at: Option<Option<DateTime<Utc>>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<String>, format = DateTime)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<domain::user::User> for UserView {
    fn from(value: domain::user::User) -> Self {
        UserView {
            id: value.id,
            name: value.name,
            email: value.email,
            email_verified_at: None,
            created_at: None,
            updated_at: None,
        }
    }
}

impl UserView {
    /// Projects a user including its verification and audit timestamps
    pub fn with_timestamps(user: domain::user::User) -> UserView {
        UserView {
            email_verified_at: Some(user.email_verified_at),
            created_at: Some(user.created_at),
            updated_at: Some(user.updated_at),
            ..UserView::from(user)
        }
    }
}

/// DTO for signing up via the API
#[derive(Deserialize, Display, Validate, ToSchema)]
#[display("{name} <{email}>")]
#[cfg_attr(test, derive(Debug))]
pub struct RegisterUser {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1, max = 255))]
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[serde(deserialize_with = "trimmed")]
    #[validate(email, length(max = 255))]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[validate(length(min = 8))]
    #[schema(example = "correct horse battery staple", min_length = 8)]
    pub password: String,
}

impl From<RegisterUser> for domain::user::UserRegistration {
    fn from(value: RegisterUser) -> Self {
        domain::user::UserRegistration {
            name: value.name,
            email: value.email.to_lowercase(),
            password: value.password,
        }
    }
}

/// DTO containing the ID of a user that was registered via the API
#[derive(Serialize, ToSchema)]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct RegisteredUser {
    #[schema(example = 10)]
    pub id: i32,
}

#[derive(Deserialize, Validate, ToSchema)]
#[cfg_attr(test, derive(Debug))]
pub struct LoginRequest {
    #[serde(deserialize_with = "trimmed")]
    #[validate(length(min = 1))]
    #[schema(example = "jane@example.com")]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// A bearer token to send in the `Authorization` header of later requests
#[derive(Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(test, derive(Deserialize, Debug))]
pub struct IssuedToken {
    pub token: String,
    #[schema(example = "Bearer")]
    pub token_type: String,
    /// Seconds until the token expires
    #[schema(example = 86400)]
    pub expires_in: i64,
}
