use crate::SharedData;
use axum::Router;
use axum::response::Html;
use axum::routing::get;
use std::sync::Arc;

const INDEX_PAGE: &str = include_str!("../../assets/index.html");

/// Serves the single page which drives the API from a browser
pub fn front_end_routes() -> Router<Arc<SharedData>> {
    Router::new().route("/", get(index_page))
}

async fn index_page() -> Html<&'static str> {
    Html(INDEX_PAGE)
}
