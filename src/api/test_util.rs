use axum::body::{self, Body};
use axum::http::{Method, Request, header};
use serde::de::DeserializeOwned;

/// Used in tests to both extract the raw bytes from the HTTP response body and then deserialize them into the
/// requested type. Will panic and fail the test if either step fails somehow.
pub async fn deserialize_body<T: DeserializeOwned>(response_body: Body) -> T {
    let bytes = body::to_bytes(response_body, usize::MAX)
        .await
        .expect("Could not read data from response body!");

    serde_json::from_slice(&bytes).unwrap_or_else(|err| {
        panic!(
            "Could not parse body content into data structure! Error: {}, Received body: {:?}",
            err, bytes
        )
    })
}

/// Builds a request against the router, optionally with a JSON body and a bearer token
pub fn api_request(
    method: Method,
    uri: &str,
    token: Option<&str>,
    json_body: Option<serde_json::Value>,
) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }

    let body = match json_body {
        Some(json_body) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(json_body.to_string())
        }
        None => Body::empty(),
    };

    builder.body(body).expect("test request should be valid")
}
