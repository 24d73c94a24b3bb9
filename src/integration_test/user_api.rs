use super::test_util::{prepare_db_and_test, register_and_log_in, test_router};
use crate::api::test_util::{api_request, deserialize_body};
use crate::dto;
use axum::http::{Method, StatusCode};
use serde_json::json;
use tower::ServiceExt;

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn registered_user_can_see_themselves() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        let token = register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        let response = router
            .oneshot(api_request(Method::GET, "/auth/me", Some(&token), None))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::OK, response.status());

        let me: dto::UserView = deserialize_body(response.into_body()).await;
        assert_eq!("Jane Doe", me.name);
        assert_eq!("jane@example.com", me.email);
        assert!(matches!(me.email_verified_at, None | Some(None)));
        assert!(me.created_at.is_some());
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn duplicate_registration_is_rejected() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        let response = router
            .oneshot(api_request(
                Method::POST,
                "/auth/register",
                None,
                Some(json!({
                    "name": "Other Jane",
                    "email": "JANE@example.com",
                    "password": "another long password",
                })),
            ))
            .await
            .expect("router should respond");
        assert_eq!(StatusCode::UNPROCESSABLE_ENTITY, response.status());

        let body: serde_json::Value = deserialize_body(response.into_body()).await;
        assert!(body["extra_info"]["email"].is_array());
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn wrong_password_and_unknown_email_look_the_same() {
    prepare_db_and_test(|pool| async move {
        let router = test_router(pool);
        register_and_log_in(&router, "Jane Doe", "jane@example.com").await;

        for (email, password) in [
            ("jane@example.com", "not the password"),
            ("nobody@example.com", "a long enough password"),
        ] {
            let response = router
                .clone()
                .oneshot(api_request(
                    Method::POST,
                    "/auth/login",
                    None,
                    Some(json!({ "email": email, "password": password })),
                ))
                .await
                .expect("router should respond");
            assert_eq!(StatusCode::UNAUTHORIZED, response.status());

            let body: serde_json::Value = deserialize_body(response.into_body()).await;
            assert_eq!("invalid_credentials", body["error_code"]);
        }
    });
}

#[test]
#[cfg_attr(not(feature = "integration_test"), ignore)]
fn late_duplicate_insert_reports_email_taken() {
    use crate::domain::user::NewUserRecord;
    use crate::domain::user::driven_ports::UserWriter;
    use crate::domain::user::driving_ports::RegisterUserError;
    use crate::persistence::{self, db_user_driven_ports::DbWriteUsers};

    prepare_db_and_test(|pool| async move {
        let mut ext_cxn = persistence::ExternalConnectivity::new(pool);
        let record = NewUserRecord {
            name: "Jane Doe".to_owned(),
            email: "jane@example.com".to_owned(),
            password_hash: "irrelevant".to_owned(),
        };

        let first_insert = DbWriteUsers.create_user(&record, &mut ext_cxn).await;
        assert!(first_insert.is_ok());

        let second_insert = DbWriteUsers.create_user(&record, &mut ext_cxn).await;
        let Err(RegisterUserError::EmailTaken) = second_insert else {
            panic!("Second insert should report a taken email, got: {second_insert:#?}");
        };
    });
}
