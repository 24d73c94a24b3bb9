use super::test_util::{prepare_db_and_test, register_and_log_in, test_router};
use crate::api::test_util::{api_request, deserialize_body};
use crate::dto;
use axum::Router;
use axum::http::{Method, StatusCode};
use serde_json::json;
use sqlx::PgPool;
use tower::ServiceExt;

async fn create_todo(router: &Router, token: &str, body: serde_json::Value) -> i32 {
    let response = router
        .clone()
        .oneshot(api_request(Method::POST, "/todos", Some(token), Some(body)))
        .await
        .expect("router should respond");
    assert_eq!(StatusCode::CREATED, response.status());

    let created: dto::CreatedTodo = deserialize_body(response.into_body()).await;
    assert_eq!("Todo created successfully.", created.success);
    created.id
}

async fn list_todos(router: &Router, token: &str, uri: &str) -> Vec<dto::TodoView> {
    let response = router
        .clone()
        .oneshot(api_request(Method::GET, uri, Some(token), None))
        .await
        .expect("router should respond");
    assert_eq!(StatusCode::OK, response.status());

    let todo_list: dto::TodoList = deserialize_body(response.into_body()).await;
    todo_list.todos
}

async fn todo_count(pool: &PgPool) -> i64 {
    sqlx::query_scalar("SELECT count(*) FROM todos")
        .fetch_one(pool)
        .await
        .expect("todos should be countable")
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn created_todo_is_listed_first_and_incomplete() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        create_todo(&router, &token, json!({ "title": "Walk the dog" })).await;
        let milk_id = create_todo(
            &router,
            &token,
            json!({ "title": "  Buy milk ", "description": null }),
        )
        .await;

        let todos = list_todos(&router, &token, "/todos").await;
        assert_eq!(2, todos.len());
        assert_eq!(milk_id, todos[0].id);
        assert_eq!("Buy milk", todos[0].title);
        assert_eq!(None, todos[0].description);
        assert!(!todos[0].completed);
        assert!(todos[0].user.is_none());
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn users_only_see_their_own_todos() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let jane = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;
        let john = register_and_log_in(&router, "John Doe", "john@example.com").await;

        create_todo(&router, &jane, json!({ "title": "Jane's todo" })).await;
        create_todo(&router, &john, json!({ "title": "John's todo" })).await;

        let janes_todos = list_todos(&router, &jane, "/todos?include=user").await;
        assert_eq!(1, janes_todos.len());
        assert_eq!("Jane's todo", janes_todos[0].title);
        assert!(matches!(&janes_todos[0].user, Some(owner) if owner.email == "jane@example.com"));
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn partial_update_changes_only_supplied_fields() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;
        let todo_id = create_todo(
            &router,
            &token,
            json!({ "title": "Buy milk", "description": "Two litres" }),
        )
        .await;
        let before = list_todos(&router, &token, "/todos").await.remove(0);

        let response = router
            .clone()
            .oneshot(api_request(
                Method::PATCH,
                &format!("/todos/{todo_id}"),
                Some(&token),
                Some(json!({ "completed": true })),
            ))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::OK, response.status());

        let after = list_todos(&router, &token, "/todos").await.remove(0);
        assert!(after.completed);
        assert_eq!(before.title, after.title);
        assert_eq!(before.description, after.description);
        assert!(after.updated_at > before.updated_at);

        let response = router
            .clone()
            .oneshot(api_request(
                Method::PUT,
                &format!("/todos/{todo_id}"),
                Some(&token),
                Some(json!({ "description": null })),
            ))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::OK, response.status());

        let cleared = list_todos(&router, &token, "/todos").await.remove(0);
        assert_eq!(None, cleared.description);
        assert!(cleared.completed);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn other_users_todos_are_forbidden() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool.clone());
        let jane = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;
        let john = register_and_log_in(&router, "John Doe", "john@example.com").await;
        let todo_id = create_todo(&router, &jane, json!({ "title": "Jane's todo" })).await;

        for (method, body) in [
            (Method::PATCH, Some(json!({ "title": "" }))),
            (Method::PATCH, Some(json!({ "completed": true }))),
            (Method::DELETE, None),
        ] {
            let response = router
                .clone()
                .oneshot(api_request(method, &format!("/todos/{todo_id}"), Some(&john), body))
                .await
                .expect("router should respond");
            assert_eq!(StatusCode::FORBIDDEN, response.status());
        }

        let janes_todos = list_todos(&router, &jane, "/todos").await;
        assert_eq!(1, janes_todos.len());
        assert!(!janes_todos[0].completed);
        assert_eq!(1, todo_count(&pool).await);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn missing_todos_are_not_found() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        let response = router
            .oneshot(api_request(Method::DELETE, "/todos/4242", Some(&token), None))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::NOT_FOUND, response.status());
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn long_title_creates_nothing() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool.clone());
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        let response = router
            .oneshot(api_request(
                Method::POST,
                "/todos",
                Some(&token),
                Some(json!({ "title": "A".repeat(256) })),
            ))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());
        assert_eq!(0, todo_count(&pool).await);
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn deleted_todo_is_gone() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;
        let todo_id = create_todo(&router, &token, json!({ "title": "Short lived" })).await;

        let response = router
            .clone()
            .oneshot(api_request(
                Method::DELETE,
                &format!("/todos/{todo_id}"),
                Some(&token),
                None,
            ))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::OK, response.status());

        let acknowledgement: dto::Acknowledgement = deserialize_body(response.into_body()).await;
        assert_eq!("Todo deleted successfully.", acknowledgement.success);
        assert!(list_todos(&router, &token, "/todos").await.is_empty());
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn concurrent_partial_updates_keep_each_others_fields() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        for round in 0..20 {
            let todo_id = create_todo(&router, &token, json!({ "title": "old" })).await;
            let todo_uri = format!("/todos/{todo_id}");
            let new_title = format!("new {round}");

            let (rename_response, complete_response) = tokio::join!(
                router.clone().oneshot(api_request(
                    Method::PATCH,
                    &todo_uri,
                    Some(&token),
                    Some(json!({ "title": new_title })),
                )),
                router.clone().oneshot(api_request(
                    Method::PATCH,
                    &todo_uri,
                    Some(&token),
                    Some(json!({ "completed": true })),
                )),
            );
            assert_eq!(
                StatusCode::OK,
                rename_response.expect("router should respond").status()
            );
            assert_eq!(
                StatusCode::OK,
                complete_response.expect("router should respond").status()
            );

            let updated = list_todos(&router, &token, "/todos")
                .await
                .into_iter()
                .find(|todo| todo.id == todo_id)
                .expect("updated todo should still be listed");
            assert_eq!(new_title, updated.title);
            assert!(updated.completed, "round {round} lost the completed flag");
        }
    });
}
