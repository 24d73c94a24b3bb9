use crate::app_env::test::TEST_DB_URL;
use crate::api::test_util::{api_request, deserialize_body};
use crate::session::TokenKeys;
use crate::{SharedData, db, dto, persistence, routes};
use axum::Router;
use axum::http::{Method, StatusCode};
use chrono::Duration;
use dotenv::dotenv;
use lazy_static::lazy_static;
use rand::{Rng, thread_rng};
use serde_json::json;
use sqlx::{Connection, PgConnection, PgPool};
use std::env;
use std::future::Future;
use std::sync::Arc;
use tokio::runtime::Runtime;
use tower::ServiceExt;

lazy_static! {
    static ref TOKIO_RT: Runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("Tokio runtime failed to initialize");
}

/// Prefix for databases created by integration tests
const TEST_DB_PREFIX: &str = "todo_rest_test_";

struct TestDatabase {
    db_name: String,
}

impl TestDatabase {
    async fn create(conn: &mut PgConnection) -> Result<Self, sqlx::Error> {
        let db_id: u32 = thread_rng().gen_range(10_000..99_999);
        let db_name = format!("{TEST_DB_PREFIX}{db_id}");

        sqlx::query(&format!("CREATE DATABASE {db_name}"))
            .execute(&mut *conn)
            .await?;

        Ok(Self { db_name })
    }

    async fn drop_db(&self, conn: &mut PgConnection) {
        let result = sqlx::query(&format!("DROP DATABASE IF EXISTS {}", self.db_name))
            .execute(&mut *conn)
            .await;
        if let Err(error) = result {
            println!(
                "Warning: failed to drop test database {}, you may need to do it manually. Error: {error}",
                self.db_name
            );
        }
    }
}

/// Creates an empty, fully migrated database for a test and hands a pool for it to the test.
///
/// Expects that the TEST_DB_URL environment variable is populated
pub fn prepare_db_and_test<F, R>(test_fn: F)
where
    R: Future<Output = ()>,
    F: FnOnce(PgPool) -> R,
{
    if dotenv().is_err() {
        println!("Test is running without .env file.");
    }

    TOKIO_RT.block_on(async move {
        let base_url = env::var(TEST_DB_URL).unwrap_or_else(|_| {
            panic!("You must provide the {TEST_DB_URL} environment variable as the base postgres connection string")
        });
        let mut admin_conn = PgConnection::connect(&base_url)
            .await
            .expect("Test failure - could not create initial connection to provision database.");
        let test_db = TestDatabase::create(&mut admin_conn)
            .await
            .unwrap_or_else(|db_err| panic!("Failed to create test database: {db_err}"));

        let pool = db::connect_sqlx(&format!("{}/{}", base_url.trim_end_matches('/'), test_db.db_name))
            .await
            .expect("Could not connect to the test database");
        db::run_migrations(&pool)
            .await
            .expect("Could not migrate the test database");

        test_fn(pool.clone()).await;

        pool.close().await;
        test_db.drop_db(&mut admin_conn).await;
        admin_conn.close().await.ok();
    });
}

/// Builds the whole application around a test database
pub fn test_router(pool: PgPool) -> Router {
    routes::build_router(Arc::new(SharedData {
        ext_cxn: persistence::ExternalConnectivity::new(pool),
        token_keys: TokenKeys::new("integration test secret", Duration::minutes(15)),
    }))
}

/// Registers a user through the API and logs them in, returning their bearer token
pub async fn register_and_log_in(router: &Router, name: &str, email: &str) -> String {
    let register_response = router
        .clone()
        .oneshot(api_request(
            Method::POST,
            "/auth/register",
            None,
            Some(json!({ "name": name, "email": email, "password": "a long enough password" })),
        ))
        .await
        .expect("router should respond");
    assert_eq!(StatusCode::CREATED, register_response.status());

    let login_response = router
        .clone()
        .oneshot(api_request(
            Method::POST,
            "/auth/login",
            None,
            Some(json!({ "email": email, "password": "a long enough password" })),
        ))
        .await
        .expect("router should respond");
    assert_eq!(StatusCode::OK, login_response.status());

    let issued: dto::IssuedToken = deserialize_body(login_response.into_body()).await;
    issued.token
}
