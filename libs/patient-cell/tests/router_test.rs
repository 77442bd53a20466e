use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
};
use serde_json::{json, Value};
use tower::ServiceExt;

use patient_cell::router::patient_routes;
use shared_database::{MemoryStore, Sheet};
use shared_utils::test_utils::{SheetFixtures, TestConfig, TestSession};

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_identify_creates_then_reuses_patient() {
    let config = TestConfig::default();
    let store = Arc::new(MemoryStore::new());
    let app = patient_routes(config.to_state(store.clone()));
    let bearer = TestSession::bearer(&TestSession::establishment(), &config);

    let payload = json!({"national_id": "42327868", "full_name": "María Huamán", "phone": "987654321"});
    for expected_created in [true, false] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/identify")
                    .header(header::AUTHORIZATION, &bearer)
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["created"], expected_created);
        assert_eq!(body["patient"]["dni"], "42327868");
    }

    assert_eq!(store.rows(Sheet::Patients).await.len(), 1);
}

#[tokio::test]
async fn test_get_patient_by_national_id() {
    let config = TestConfig::default();
    let store = Arc::new(MemoryStore::new());
    store
        .seed(Sheet::Patients, vec![SheetFixtures::patient("G-1", "42327868", "María Huamán")])
        .await;
    let app = patient_routes(config.to_state(store));
    let bearer = TestSession::bearer(&TestSession::hospital(), &config);

    let found = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/42327868")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(found.status(), StatusCode::OK);
    assert_eq!(body_json(found).await["nombres"], "María Huamán");

    let missing = app
        .oneshot(
            Request::builder()
                .uri("/11111111")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_requires_session_token() {
    let config = TestConfig::default();
    let app = patient_routes(config.to_state(Arc::new(MemoryStore::new())));

    let response = app
        .oneshot(Request::builder().uri("/42327868").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_invalid_national_id_is_bad_request() {
    let config = TestConfig::default();
    let app = patient_routes(config.to_state(Arc::new(MemoryStore::new())));
    let bearer = TestSession::bearer(&TestSession::establishment(), &config);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/12")
                .header(header::AUTHORIZATION, &bearer)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
