//! Integration tests for request preparation, error surfacing and services

mod common;

use common::{closed_port_url, harness, raw_token};
use salon_client::services::NewBooking;
use salon_client::{ApiClient, ApiRequest, ClientError, CredentialStore};
use serde_json::{Value, json};
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn test_client_builder() {
    let client = ApiClient::builder()
        .base_url("http://localhost:8080/")
        .build()
        .unwrap();
    assert_eq!(client.base_url(), "http://localhost:8080");
    assert_eq!(client.config().timeout_secs, 30);
}

#[tokio::test]
async fn test_get_injects_bearer_and_cache_buster() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": []})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), Some("abc"));
    let request = ApiRequest::get("/api/v1/users").query("page", 2);
    let body: Value = h.client.execute(request).await.unwrap();
    assert_eq!(body, json!({"data": []}));

    let requests = mock_server.received_requests().await.unwrap();
    let pairs: Vec<(String, String)> = requests[0]
        .url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    assert_eq!(pairs[0], ("page".to_string(), "2".to_string()));
    assert_eq!(pairs[1].0, "_t");
    assert!(pairs[1].1.parse::<i64>().unwrap() > 0);
}

#[tokio::test]
async fn test_post_has_no_cache_buster() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/echo"))
        .and(body_json(json!({"a": 1})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), None);
    let body: Value = h.client.post("/api/v1/echo", &json!({"a": 1})).await.unwrap();
    assert_eq!(body["ok"], true);

    let requests = mock_server.received_requests().await.unwrap();
    assert_eq!(requests[0].url.query(), None);
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_malformed_stored_token_sends_unauthenticated() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/public"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), None);
    // Stored without JSON encoding
    h.store.set("token", "abc").unwrap();

    let _: Value = h.client.get("/api/v1/public").await.unwrap();
    let requests = mock_server.received_requests().await.unwrap();
    assert!(requests[0].headers.get("authorization").is_none());
}

#[tokio::test]
async fn test_client_errors_surface_without_retry() {
    for status in [400u16, 403, 404] {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/v1/bookings/7"))
            .respond_with(ResponseTemplate::new(status).set_body_string("nope"))
            .expect(1)
            .mount(&mock_server)
            .await;

        let h = harness(&mock_server.uri(), Some("abc"));
        let err = h.client.get::<Value>("/api/v1/bookings/7").await.unwrap_err();

        assert_eq!(err.status(), Some(status));
        let details = err.details().unwrap();
        assert_eq!(details.method, "GET");
        assert_eq!(details.payload, "nope");
        assert!(details.url.ends_with("/api/v1/bookings/7"));
        match status {
            400 => assert!(matches!(err, ClientError::BadRequest(_))),
            403 => assert!(matches!(err, ClientError::Forbidden(_))),
            _ => assert!(matches!(err, ClientError::NotFound(_))),
        }
    }
}

#[tokio::test]
async fn test_connection_refused_surfaces_network_error() {
    let h = harness(&closed_port_url().await, None);
    let err = h.client.get::<Value>("/api/v1/users").await.unwrap_err();
    assert!(err.is_network());
    assert_eq!(err.status(), None);
}

#[tokio::test]
async fn test_empty_body_decodes_to_unit() {
    let mock_server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/things/1"))
        .respond_with(ResponseTemplate::new(204))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), None);
    h.client.delete::<()>("/api/v1/things/1").await.unwrap();
}

#[tokio::test]
async fn test_users_list_unwraps_data() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": 1, "email": "a@salon.test", "role": "ADMIN"},
                {"id": 2, "email": "b@salon.test", "fullName": "B", "permissions": ["BOOKING_VIEW"]}
            ]
        })))
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), Some("abc"));
    let users = h.client.users().list().await.unwrap();
    assert_eq!(users.len(), 2);
    assert_eq!(users[0].role.as_deref(), Some("ADMIN"));
    assert_eq!(users[1].permissions, vec!["BOOKING_VIEW"]);
}

#[tokio::test]
async fn test_user_get_accepts_bare_body() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/users/9"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"id": 9, "email": "c@salon.test"})),
        )
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), Some("abc"));
    let user = h.client.users().get(9).await.unwrap();
    assert_eq!(user.id, 9);
    assert_eq!(user.role, None);
}

#[tokio::test]
async fn test_update_role_puts_role() {
    let mock_server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/api/v1/users/3/role"))
        .and(body_json(json!({"role": "STAFF"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"id": 3, "email": "s@salon.test", "role": "STAFF"}
        })))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), Some("abc"));
    let user = h.client.users().update_role(3, "STAFF").await.unwrap();
    assert_eq!(user.role.as_deref(), Some("STAFF"));
}

#[tokio::test]
async fn test_booking_validation_sends_nothing() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bookings"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), Some("abc"));
    let booking = NewBooking {
        service_id: Some(1),
        customer_name: "Mai".into(),
        date: "2026-11-02".into(),
        time: "09:00".into(),
        ..NewBooking::default()
    };

    let err = h.client.bookings().create(&booking).await.unwrap_err();
    match err {
        ClientError::Validation { message, details } => {
            assert_eq!(message, "missing required field phone");
            assert_eq!(details["field"], "phone");
        }
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_booking_create_and_cancel() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/bookings"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({
            "data": {
                "id": 11, "serviceId": 1, "customerName": "Mai", "phone": "0900",
                "date": "2026-11-02", "time": "09:00", "status": "PENDING"
            }
        })))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/bookings/11"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), Some("abc"));
    let booking = NewBooking {
        service_id: Some(1),
        customer_name: "Mai".into(),
        phone: "0900".into(),
        date: "2026-11-02".into(),
        time: "09:00".into(),
        ..NewBooking::default()
    };

    let created = h.client.bookings().create(&booking).await.unwrap();
    assert_eq!(created.id, 11);
    assert_eq!(created.status.as_deref(), Some("PENDING"));
    h.client.bookings().cancel(11).await.unwrap();
}

#[tokio::test]
async fn test_login_persists_token_and_role() {
    let mock_server = MockServer::start().await;
    let token = common::mint_with_role("ADMIN");
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .and(body_json(json!({"email": "a@salon.test", "password": "pw"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": {"token": token}})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), None);
    let response = h.client.auth().login("a@salon.test", "pw").await.unwrap();

    assert_eq!(response.role.as_deref(), Some("ADMIN"));
    assert_eq!(h.client.token_store().access_token(), Some(token.clone()));
    assert_eq!(raw_token(&h.store), Some(format!("\"{token}\"")));
    assert_eq!(h.client.token_store().role().as_deref(), Some("ADMIN"));
    assert!(h.client.permissions().is_admin());

    h.client.auth().logout().unwrap();
    assert_eq!(raw_token(&h.store), None);
    assert_eq!(h.client.token_store().role(), None);
}

#[tokio::test]
async fn test_login_rejection_does_not_refresh() {
    let mock_server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/auth/login"))
        .respond_with(ResponseTemplate::new(401).set_body_string("bad credentials"))
        .expect(1)
        .mount(&mock_server)
        .await;
    Mock::given(method("POST"))
        .and(path(common::REFRESH_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "x"})))
        .expect(0)
        .mount(&mock_server)
        .await;

    let h = harness(&mock_server.uri(), None);
    let err = h.client.auth().login("a@salon.test", "wrong").await.unwrap_err();
    assert!(matches!(err, ClientError::AuthenticationFailed(_)));
}

#[tokio::test]
async fn test_request_timeout_is_per_request() {
    let mock_server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&mock_server)
        .await;

    let mut config = common::fast_config(&mock_server.uri());
    config.retry.network_retries = 0;
    let h = common::harness_with(config, None);

    let err = h
        .client
        .send(ApiRequest::get("/api/v1/slow").timeout(Duration::from_millis(50)))
        .await
        .unwrap_err();
    assert!(err.is_network());
}
