use crate::domain::Principal;
use crate::domain::user::driving_ports::{AuthenticateError, RegisterUserError, UserPort};
use crate::external_connections::{ExternalConnectivity, Transactable, TransactionHandle};
use crate::persistence::db_user_driven_ports::{DbDetectUser, DbReadUsers, DbWriteUsers};
use crate::routing_utils::{
    ApiErrorResponse, BasicErrorResponse, GenericErrorResponse, Json, ValidationErrorResponse,
};
use crate::session::TokenKeys;
use crate::{AppState, SharedData, domain, dto, logging};
use axum::Router;
use axum::extract::{FromRequestParts, State};
use axum::http::request::Parts;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::ErrorResponse;
use axum::routing::{get, post};
use std::borrow::Cow;
use std::sync::Arc;
use tracing::{Span, info, warn};
use utoipa::OpenApi;
use validator::{Validate, ValidationError, ValidationErrors};

#[derive(OpenApi)]
#[openapi(paths(register, log_in, current_user))]
/// Defines the OpenAPI documentation for the authentication API
pub struct AuthApi;
/// Constant used to group authentication endpoints in OpenAPI documentation
pub const AUTH_API_GROUP: &str = "Auth";

/// Extracts the caller from a `Bearer` token in the `Authorization` header. Requests without a
/// valid token are turned away with a 401.
pub struct Authenticated(pub Principal);

#[axum::async_trait]
impl FromRequestParts<Arc<SharedData>> for Authenticated {
    type Rejection = ApiErrorResponse;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<SharedData>,
    ) -> Result<Self, Self::Rejection> {
        let principal = principal_from_headers(&parts.headers, &state.token_keys)?;
        Span::current().record(logging::USER_ID_FIELD, principal.user_id);

        Ok(Authenticated(principal))
    }
}

fn principal_from_headers(
    headers: &HeaderMap,
    token_keys: &TokenKeys,
) -> Result<Principal, ApiErrorResponse> {
    let token = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .ok_or(ApiErrorResponse::AuthenticationRequired)?;

    token_keys
        .verify(token)
        .ok_or(ApiErrorResponse::AuthenticationRequired)
}

/// Adds routes under "/auth" to the application router
pub fn auth_routes() -> Router<Arc<SharedData>> {
    Router::new()
        .route(
            "/auth/register",
            post(
                |State(app_state): AppState,
                 Json(registration): Json<dto::RegisterUser>| async move {
                    let user_service = domain::user::UserService {};

                    register(registration, &app_state.ext_cxn, &user_service).await
                },
            ),
        )
        .route(
            "/auth/login",
            post(
                |State(app_state): AppState, Json(login): Json<dto::LoginRequest>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};

                    log_in(login, &app_state.token_keys, &mut ext_cxn, &user_service).await
                },
            ),
        )
        .route(
            "/auth/me",
            get(
                |State(app_state): AppState, Authenticated(caller): Authenticated| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let user_service = domain::user::UserService {};

                    current_user(caller, &mut ext_cxn, &user_service).await
                },
            ),
        )
}

fn email_taken() -> ValidationErrorResponse {
    let mut error = ValidationError::new("unique");
    error.message = Some(Cow::from("The email has already been taken."));
    let mut errors = ValidationErrors::new();
    errors.add("email", error);

    ValidationErrorResponse::from(errors)
}

#[utoipa::path(
    post,
    path = "/auth/register",
    tag = AUTH_API_GROUP,
    request_body = dto::RegisterUser,
    responses(
        (status = 201, description = "User registered", body = dto::RegisteredUser),
        (status = 400, description = "Malformed JSON", body = BasicErrorResponse),
        (status = 422, description = "Invalid registration or email already taken", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Signs up a new user
async fn register(
    registration: dto::RegisterUser,
    ext_cxn: &impl Transactable,
    user_service: &impl UserPort,
) -> Result<(StatusCode, Json<dto::RegisteredUser>), ErrorResponse> {
    info!("Registering user: {}", registration);
    registration
        .validate()
        .map_err(ValidationErrorResponse::from)?;

    let domain_registration = domain::user::UserRegistration::from(registration);
    let mut txn = ext_cxn
        .start_transaction()
        .await
        .map_err(GenericErrorResponse)?;
    let register_result = user_service
        .register_user(&domain_registration, &mut txn, &DbWriteUsers, &DbDetectUser)
        .await;
    let new_user_id = match register_result {
        Ok(id) => id,
        Err(RegisterUserError::EmailTaken) => return Err(email_taken().into()),
        Err(RegisterUserError::PortError(err)) => return Err(GenericErrorResponse(err).into()),
    };
    txn.commit().await.map_err(GenericErrorResponse)?;

    Ok((
        StatusCode::CREATED,
        Json(dto::RegisteredUser { id: new_user_id }),
    ))
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = AUTH_API_GROUP,
    request_body = dto::LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = dto::IssuedToken),
        (status = 401, description = "Wrong email address or password", body = BasicErrorResponse),
        (status = 422, description = "Missing email address or password", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Trades an email address and password for a bearer token
async fn log_in(
    login: dto::LoginRequest,
    token_keys: &TokenKeys,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<Json<dto::IssuedToken>, ErrorResponse> {
    login.validate().map_err(ValidationErrorResponse::from)?;

    let email = login.email.to_lowercase();
    let auth_result = user_service
        .authenticate(&email, &login.password, &mut *ext_cxn, &DbReadUsers)
        .await;
    let principal = match auth_result {
        Ok(principal) => principal,
        Err(AuthenticateError::InvalidCredentials) => {
            warn!("Failed login attempt");
            return Err(ApiErrorResponse::InvalidCredentials.into());
        }
        Err(AuthenticateError::PortError(err)) => return Err(GenericErrorResponse(err).into()),
    };

    let session = token_keys.issue(principal).map_err(GenericErrorResponse)?;
    info!("User {} logged in", principal.user_id);

    Ok(Json(dto::IssuedToken {
        token: session.token,
        token_type: "Bearer".to_owned(),
        expires_in: session.expires_in.num_seconds(),
    }))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = AUTH_API_GROUP,
    responses(
        (status = 200, description = "The logged in user", body = dto::UserView),
        (status = 401, description = "Not logged in", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Describes the user making the request
async fn current_user(
    caller: Principal,
    ext_cxn: &mut impl ExternalConnectivity,
    user_service: &impl UserPort,
) -> Result<Json<dto::UserView>, ErrorResponse> {
    let user = user_service
        .get_user(caller.user_id, &mut *ext_cxn, &DbReadUsers)
        .await
        .map_err(GenericErrorResponse)?;

    match user {
        Some(user) => Ok(Json(dto::UserView::with_timestamps(user))),
        None => {
            warn!("Token was issued to user {}, who no longer exists", caller.user_id);
            Err(ApiErrorResponse::AuthenticationRequired.into())
        }
    }
}
