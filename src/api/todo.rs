use crate::api::auth::Authenticated;
use crate::domain::Principal;
use crate::domain::todo::driving_ports::{TodoError, TodoPort};
use crate::domain::user::driving_ports::UserPort;
use crate::dto::{OwnerEmbedding, TodoView, UserView};
use crate::external_connections::{ExternalConnectivity, Transactable, TransactionHandle};
use crate::persistence::db_todo_driven_ports::{DbTodoReader, DbTodoWriter};
use crate::persistence::db_user_driven_ports::{DbDetectUser, DbReadUsers};
use crate::routing_utils::{
    ApiErrorResponse, BasicErrorResponse, GenericErrorResponse, Json, Path,
    ValidationErrorResponse,
};
use crate::{AppState, SharedData, domain, dto};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::ErrorResponse;
use axum::routing::get;
use std::sync::Arc;
use tracing::info;
use utoipa::OpenApi;
use validator::Validate;

#[derive(OpenApi)]
#[openapi(paths(list_todos, create_todo, update_todo, delete_todo))]
/// Defines the OpenAPI documentation for the todo API
pub struct TodoApi;
/// Constant used to group todo endpoints in OpenAPI documentation
pub const TODO_API_GROUP: &str = "Todos";

/// Adds routes under "/todos" to the application router
pub fn todo_routes() -> Router<Arc<SharedData>> {
    let update_handler = |State(app_state): AppState,
                          Authenticated(caller): Authenticated,
                          Path(todo_id): Path<i32>,
                          Json(update): Json<dto::UpdateTodo>| async move {
        let todo_service = domain::todo::TodoService {};

        update_todo(caller, todo_id, update, &app_state.ext_cxn, &todo_service).await
    };

    Router::new()
        .route(
            "/todos",
            get(
                |State(app_state): AppState,
                 Authenticated(caller): Authenticated,
                 Query(query): Query<dto::TodoListQuery>| async move {
                    let mut ext_cxn = app_state.ext_cxn.clone();
                    let todo_service = domain::todo::TodoService {};
                    let user_service = domain::user::UserService {};

                    list_todos(
                        caller,
                        query.owner_embedding(),
                        &mut ext_cxn,
                        &todo_service,
                        &user_service,
                    )
                    .await
                },
            )
            .post(
                |State(app_state): AppState,
                 Authenticated(caller): Authenticated,
                 Json(new_todo): Json<dto::NewTodo>| async move {
                    let todo_service = domain::todo::TodoService {};

                    create_todo(caller, new_todo, &app_state.ext_cxn, &todo_service).await
                },
            ),
        )
        .route(
            "/todos/:todo_id",
            axum::routing::patch(update_handler)
                .put(update_handler)
                .delete(
                    |State(app_state): AppState,
                     Authenticated(caller): Authenticated,
                     Path(todo_id): Path<i32>| async move {
                        let todo_service = domain::todo::TodoService {};

                        delete_todo(caller, todo_id, &app_state.ext_cxn, &todo_service).await
                    },
                ),
        )
}

/// Maps the ways the todo service can fail onto API responses
fn todo_error_response(err: TodoError) -> ErrorResponse {
    match err {
        TodoError::UserDoesNotExist => ApiErrorResponse::AuthenticationRequired.into(),
        TodoError::NotFound => ApiErrorResponse::NotFound.into(),
        TodoError::Forbidden => ApiErrorResponse::Forbidden.into(),
        TodoError::PortError(port_err) => GenericErrorResponse(port_err).into(),
    }
}

fn owner_view(owner: domain::user::User, embedding: OwnerEmbedding) -> UserView {
    match embedding {
        OwnerEmbedding::UserWithTimestamps => UserView::with_timestamps(owner),
        OwnerEmbedding::User | OwnerEmbedding::None => UserView::from(owner),
    }
}

#[utoipa::path(
    get,
    path = "/todos",
    tag = TODO_API_GROUP,
    params(
        ("include" = Option<String>, Query, description = "Relations to embed: `user` or `user,user.timestamps`"),
    ),
    responses(
        (status = 200, description = "The caller's todos, newest first", body = dto::TodoList),
        (status = 401, description = "Not logged in", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Lists every todo belonging to the caller
async fn list_todos(
    caller: Principal,
    embedding: OwnerEmbedding,
    ext_cxn: &mut impl ExternalConnectivity,
    todo_service: &impl TodoPort,
    user_service: &impl UserPort,
) -> Result<Json<dto::TodoList>, ErrorResponse> {
    info!("Listing todos for user {}", caller.user_id);
    let todos = todo_service
        .list_todos(caller, &mut *ext_cxn, &DbDetectUser, &DbTodoReader)
        .await
        .map_err(todo_error_response)?;

    let todo_views = if embedding == OwnerEmbedding::None {
        todos.into_iter().map(TodoView::from).collect()
    } else {
        // Every listed todo belongs to the caller, so one lookup covers all of them
        let owner = user_service
            .get_user(caller.user_id, &mut *ext_cxn, &DbReadUsers)
            .await
            .map_err(GenericErrorResponse)?
            .ok_or(ApiErrorResponse::AuthenticationRequired)?;

        todos
            .into_iter()
            .map(|todo| TodoView::with_owner(todo, owner_view(owner.clone(), embedding)))
            .collect()
    };

    Ok(Json(dto::TodoList { todos: todo_views }))
}

#[utoipa::path(
    post,
    path = "/todos",
    tag = TODO_API_GROUP,
    request_body = dto::NewTodo,
    responses(
        (status = 201, description = "Todo created", body = dto::CreatedTodo),
        (status = 400, description = "Malformed JSON or todo ID", body = BasicErrorResponse),
        (status = 401, description = "Not logged in", body = BasicErrorResponse),
        (status = 422, description = "Invalid todo", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Creates a todo owned by the caller
async fn create_todo(
    caller: Principal,
    new_todo: dto::NewTodo,
    ext_cxn: &impl Transactable,
    todo_service: &impl TodoPort,
) -> Result<(StatusCode, Json<dto::CreatedTodo>), ErrorResponse> {
    info!("Creating a todo for user {}", caller.user_id);
    new_todo.validate().map_err(ValidationErrorResponse::from)?;

    let domain_todo = domain::todo::NewTodo::from(new_todo);
    let mut txn = ext_cxn
        .start_transaction()
        .await
        .map_err(GenericErrorResponse)?;
    let new_todo_id = todo_service
        .create_todo(caller, &domain_todo, &mut txn, &DbDetectUser, &DbTodoWriter)
        .await
        .map_err(todo_error_response)?;
    txn.commit().await.map_err(GenericErrorResponse)?;

    Ok((
        StatusCode::CREATED,
        Json(dto::CreatedTodo {
            id: new_todo_id,
            success: "Todo created successfully.".to_owned(),
        }),
    ))
}

#[utoipa::path(
    patch,
    path = "/todos/{todo_id}",
    tag = TODO_API_GROUP,
    params(("todo_id" = i32, Path, description = "The todo to change")),
    request_body = dto::UpdateTodo,
    responses(
        (status = 200, description = "Todo updated", body = dto::Acknowledgement),
        (status = 400, description = "Malformed JSON or todo ID", body = BasicErrorResponse),
        (status = 401, description = "Not logged in", body = BasicErrorResponse),
        (status = 403, description = "The todo belongs to someone else", body = BasicErrorResponse),
        (status = 404, description = "No such todo", body = BasicErrorResponse),
        (status = 422, description = "Invalid update", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Changes the supplied fields of a todo the caller owns. Also served for PUT.
async fn update_todo(
    caller: Principal,
    todo_id: i32,
    update: dto::UpdateTodo,
    ext_cxn: &impl Transactable,
    todo_service: &impl TodoPort,
) -> Result<Json<dto::Acknowledgement>, ErrorResponse> {
    info!("User {} updating todo {todo_id}", caller.user_id);
    let mut txn = ext_cxn
        .start_transaction()
        .await
        .map_err(GenericErrorResponse)?;

    if let Err(validation_errors) = update.validate() {
        // Callers who can't touch the todo hear about that before any problems with their input.
        // An empty update runs the same checks and never writes.
        todo_service
            .update_todo(
                caller,
                todo_id,
                &domain::todo::UpdateTodo::default(),
                &mut txn,
                &DbTodoReader,
                &DbTodoWriter,
            )
            .await
            .map_err(todo_error_response)?;

        return Err(ValidationErrorResponse::from(validation_errors).into());
    }

    let domain_update = domain::todo::UpdateTodo::from(update);
    todo_service
        .update_todo(
            caller,
            todo_id,
            &domain_update,
            &mut txn,
            &DbTodoReader,
            &DbTodoWriter,
        )
        .await
        .map_err(todo_error_response)?;
    txn.commit().await.map_err(GenericErrorResponse)?;

    Ok(Json(dto::Acknowledgement::new("Todo updated successfully.")))
}

#[utoipa::path(
    delete,
    path = "/todos/{todo_id}",
    tag = TODO_API_GROUP,
    params(("todo_id" = i32, Path, description = "The todo to delete")),
    responses(
        (status = 200, description = "Todo deleted", body = dto::Acknowledgement),
        (status = 400, description = "Malformed todo ID", body = BasicErrorResponse),
        (status = 401, description = "Not logged in", body = BasicErrorResponse),
        (status = 403, description = "The todo belongs to someone else", body = BasicErrorResponse),
        (status = 404, description = "No such todo", body = BasicErrorResponse),
        (status = 500, description = "Something went wrong", body = BasicErrorResponse),
    ),
)]
/// Deletes a todo the caller owns
async fn delete_todo(
    caller: Principal,
    todo_id: i32,
    ext_cxn: &impl Transactable,
    todo_service: &impl TodoPort,
) -> Result<Json<dto::Acknowledgement>, ErrorResponse> {
    info!("User {} deleting todo {todo_id}", caller.user_id);
    let mut txn = ext_cxn
        .start_transaction()
        .await
        .map_err(GenericErrorResponse)?;
    todo_service
        .delete_todo(caller, todo_id, &mut txn, &DbTodoReader, &DbTodoWriter)
        .await
        .map_err(todo_error_response)?;
    txn.commit().await.map_err(GenericErrorResponse)?;

    Ok(Json(dto::Acknowledgement::new("Todo deleted successfully.")))
}
