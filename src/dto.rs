use crate::domain::Patch;
use crate::routing_utils::{BasicErrorResponse, ExtraInfo, ValidationErrorSchema};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::borrow::Cow;
use utoipa::OpenApi;
use validator::ValidationError;

pub mod todo;
pub mod user;

pub use todo::*;
pub use user::*;

#[derive(OpenApi)]
#[openapi(components(schemas(
    NewTodo,
    UpdateTodo,
    TodoView,
    TodoList,
    CreatedTodo,
    Acknowledgement,
    UserView,
    RegisterUser,
    RegisteredUser,
    LoginRequest,
    IssuedToken,
    BasicErrorResponse,
    ExtraInfo,
    ValidationErrorSchema,
)))]
pub struct OpenApiSchemas;

/// A missing key never reaches this impl. Fields of type [Patch] are marked `#[serde(default)]`,
/// which makes them [Patch::Unset] when absent, so only `null` and real values land here.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(value) => Patch::Set(value),
            None => Patch::Clear,
        })
    }
}

/// Writes a set value as itself and anything else as `null`
impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Set(value) => value.serialize(serializer),
            Patch::Unset | Patch::Clear => serializer.serialize_none(),
        }
    }
}

/// Trims a required string
fn trimmed<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    let text = String::deserialize(deserializer)?;
    Ok(text.trim().to_owned())
}

/// Trims a string which may be absent. Blank strings are kept so validation can reject them.
fn trimmed_optional<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    let text = Option::<String>::deserialize(deserializer)?;
    Ok(text.map(|text| text.trim().to_owned()))
}

/// Like [trimmed_optional], but blank text turns into `None`
fn optional_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    Ok(trimmed_optional(deserializer)?.filter(|text| !text.is_empty()))
}

fn trimmed_patch<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Patch<String>, D::Error> {
    Ok(match trimmed_optional(deserializer)? {
        Some(text) => Patch::Set(text),
        None => Patch::Clear,
    })
}

/// Like [trimmed_patch], but blank text clears the field
fn patch_text<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Patch<String>, D::Error> {
    Ok(match optional_text(deserializer)? {
        Some(text) => Patch::Set(text),
        None => Patch::Clear,
    })
}

/// Builds a validation error carrying a human-readable message
fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut error = ValidationError::new(code);
    error.message = Some(Cow::from(message));

    error
}

/// Rejects explicit nulls for fields which can't be emptied
fn not_cleared<T>(field: &Patch<T>) -> Result<(), ValidationError> {
    match field {
        Patch::Clear => Err(validation_error("null", "This field cannot be null.")),
        Patch::Unset | Patch::Set(_) => Ok(()),
    }
}
