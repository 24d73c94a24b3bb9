use axum::extract::path::ErrorKind;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum_macros::{FromRequest, FromRequestParts};
use serde::Serialize;
use tracing::error;
use utoipa::openapi::{RefOr, Schema};
use utoipa::{ToSchema, openapi};
use validator::ValidationErrors;

/// Contains diagnostic information about an API failure
#[derive(Serialize, Debug, ToSchema)]
#[cfg_attr(test, derive(serde::Deserialize))]
#[schema(example = json!({
    "error_code": "invalid_input",
    "error_description": "Submitted data was invalid.",
    "extra_info": {
        "title": [
            {
                "code": "length",
                "message": null,
                "params": { "value": "", "min": 1, "max": 255 }
            }
        ]
    }
}))]
pub struct BasicErrorResponse {
    pub error_code: String,
    pub error_description: String,
    #[cfg_attr(test, serde(skip_deserializing))]
    pub extra_info: Option<ExtraInfo>,
}

impl BasicErrorResponse {
    fn new(error_code: &str, error_description: &str, extra_info: Option<ExtraInfo>) -> Self {
        BasicErrorResponse {
            error_code: error_code.to_owned(),
            error_description: error_description.to_owned(),
            extra_info,
        }
    }
}

#[derive(Serialize, Debug, ToSchema)]
#[serde(untagged)]
pub enum ExtraInfo {
    ValidationIssues(ValidationErrorSchema),
    Message(String),
}

/// Stand-in OpenAPI schema for [ValidationErrors] which just provides an empty object
#[derive(Serialize, Debug)]
#[serde(transparent)]
pub struct ValidationErrorSchema(ValidationErrors);

impl<'schem> ToSchema<'schem> for ValidationErrorSchema {
    fn schema() -> (&'schem str, RefOr<Schema>) {
        (
            "ValidationErrorSchema",
            openapi::ObjectBuilder::new().into(),
        )
    }
}

/// Response type for the expected ways a request can fail. Each one turns into a
/// [BasicErrorResponse] with a matching status code.
#[derive(Debug)]
pub enum ApiErrorResponse {
    NotFound,
    Forbidden,
    AuthenticationRequired,
    InvalidCredentials,
}

impl IntoResponse for ApiErrorResponse {
    fn into_response(self) -> Response {
        match self {
            Self::NotFound => (
                StatusCode::NOT_FOUND,
                Json(BasicErrorResponse::new(
                    "not_found",
                    "The requested entity could not be found.",
                    None,
                )),
            )
                .into_response(),

            Self::Forbidden => (
                StatusCode::FORBIDDEN,
                Json(BasicErrorResponse::new(
                    "forbidden",
                    "You are not allowed to do that.",
                    None,
                )),
            )
                .into_response(),

            Self::AuthenticationRequired => (
                StatusCode::UNAUTHORIZED,
                [(header::WWW_AUTHENTICATE, "Bearer")],
                Json(BasicErrorResponse::new(
                    "authentication_required",
                    "You must be logged in to do that.",
                    None,
                )),
            )
                .into_response(),

            Self::InvalidCredentials => (
                StatusCode::UNAUTHORIZED,
                Json(BasicErrorResponse::new(
                    "invalid_credentials",
                    "The email address or password was incorrect.",
                    None,
                )),
            )
                .into_response(),
        }
    }
}

/// Response type that wraps validation errors and turns them into [BasicErrorResponse]s
#[derive(Debug)]
pub struct ValidationErrorResponse(ValidationErrors);

impl IntoResponse for ValidationErrorResponse {
    fn into_response(self) -> Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(BasicErrorResponse::new(
                "invalid_input",
                "Submitted data was invalid.",
                Some(ExtraInfo::ValidationIssues(ValidationErrorSchema(self.0))),
            )),
        )
            .into_response()
    }
}

impl From<ValidationErrors> for ValidationErrorResponse {
    fn from(value: ValidationErrors) -> Self {
        Self(value)
    }
}

/// Response type for failures the caller can't do anything about. The error is logged and the
/// details stay on the server.
#[derive(Debug)]
pub struct GenericErrorResponse(pub anyhow::Error);

impl IntoResponse for GenericErrorResponse {
    fn into_response(self) -> Response {
        error!("Internal error while handling request: {:#}", self.0);
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(BasicErrorResponse::new(
                "internal_error",
                "Could not access data to complete your request",
                None,
            )),
        )
            .into_response()
    }
}

/// Wrapper for [axum::Json] which customizes the error response to use our
/// data structure for API errors
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(JsonErrorResponse))]
pub struct Json<T>(pub T);

impl<T: Serialize> IntoResponse for Json<T> {
    fn into_response(self) -> Response {
        axum::Json(self.0).into_response()
    }
}

/// Response type representing a request body which couldn't be read. A body that parses but
/// has the wrong shape (like a number where a string belongs) counts as invalid input.
pub struct JsonErrorResponse {
    status: StatusCode,
    wrong_shape: bool,
    parse_problem: String,
}

impl From<JsonRejection> for JsonErrorResponse {
    fn from(value: JsonRejection) -> Self {
        let wrong_shape = matches!(value, JsonRejection::JsonDataError(_));
        JsonErrorResponse {
            status: if wrong_shape {
                StatusCode::UNPROCESSABLE_ENTITY
            } else {
                value.status()
            },
            wrong_shape,
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for JsonErrorResponse {
    fn into_response(self) -> Response {
        let body = if self.wrong_shape {
            BasicErrorResponse::new(
                "invalid_input",
                "Submitted data was invalid.",
                Some(ExtraInfo::Message(self.parse_problem)),
            )
        } else {
            BasicErrorResponse::new(
                "invalid_json",
                "The passed request body contained malformed or unreadable JSON.",
                Some(ExtraInfo::Message(self.parse_problem)),
            )
        };

        (self.status, axum::Json(body)).into_response()
    }
}

/// Wrapper for [axum::extract::Path] which reports unusable path parameters with our
/// data structure for API errors
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(PathErrorResponse))]
pub struct Path<T>(pub T);

/// Response type for a path parameter which couldn't be parsed. A number too big to be an ID
/// can't name anything, so it's reported as not found.
pub struct PathErrorResponse {
    status: StatusCode,
    out_of_range: bool,
    parse_problem: String,
}

/// True for text made only of digits (with an optional sign) that still failed to parse
fn is_out_of_range_number(value: &str) -> bool {
    let digits = value.strip_prefix('-').unwrap_or(value);
    !digits.is_empty() && digits.chars().all(|character| character.is_ascii_digit())
}

impl From<PathRejection> for PathErrorResponse {
    fn from(value: PathRejection) -> Self {
        let out_of_range = match &value {
            PathRejection::FailedToDeserializePathParams(failure) => match failure.kind() {
                ErrorKind::ParseErrorAtKey { value, .. }
                | ErrorKind::ParseErrorAtIndex { value, .. }
                | ErrorKind::ParseError { value, .. } => is_out_of_range_number(value),
                _ => false,
            },
            _ => false,
        };

        PathErrorResponse {
            status: value.status(),
            out_of_range,
            parse_problem: value.body_text(),
        }
    }
}

impl IntoResponse for PathErrorResponse {
    fn into_response(self) -> Response {
        if self.out_of_range {
            return ApiErrorResponse::NotFound.into_response();
        }

        (
            self.status,
            axum::Json(BasicErrorResponse::new(
                "invalid_path",
                "The requested URL contained an invalid identifier.",
                Some(ExtraInfo::Message(self.parse_problem)),
            )),
        )
            .into_response()
    }
}
