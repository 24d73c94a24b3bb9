use crate::api::{auth, front_end, swagger_main, todo};
use crate::{SharedData, logging};
use axum::Router;
use std::sync::Arc;

/// Assembles every route the service offers, with request tracing around all of them
pub fn build_router(shared_data: Arc<SharedData>) -> Router {
    let router = Router::new()
        .merge(front_end::front_end_routes())
        .merge(auth::auth_routes())
        .merge(todo::todo_routes())
        .merge(swagger_main::build_documentation());

    logging::attach_tracing_http(router).with_state(shared_data)
}
