mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn category_lifecycle() {
    let app = TestApp::new().await;

    let created = app
        .seller_json(
            Method::POST,
            "/api/category",
            json!({"text": "  Brakes ", "path": "brakes"}),
        )
        .await;
    assert_eq!(created.status, StatusCode::CREATED);
    assert_eq!(created.body["success"], true);
    assert_eq!(created.body["category"]["text"], "Brakes");
    assert_eq!(created.body["category"]["isActive"], true);
    let id = created.body["category"]["_id"].as_str().unwrap().to_string();

    let fetched = app.get("/api/category/brakes").await;
    assert_eq!(fetched.status, StatusCode::OK);
    assert_eq!(fetched.body["category"]["_id"], id.as_str());

    let updated = app
        .seller_json(
            Method::PUT,
            &format!("/api/category/{id}"),
            json!({"text": "Brake systems"}),
        )
        .await;
    assert_eq!(updated.status, StatusCode::OK);
    assert_eq!(updated.body["category"]["text"], "Brake systems");
    assert_eq!(updated.body["category"]["path"], "brakes");

    let listed = app.get("/api/category").await;
    assert_eq!(listed.body["categories"].as_array().unwrap().len(), 1);

    let deleted = app
        .request_json(Method::DELETE, &format!("/api/category/{id}"), None, true)
        .await;
    assert_eq!(deleted.status, StatusCode::OK);
    assert_eq!(deleted.body["message"], "Category deleted successfully");

    let listed = app.get("/api/category").await;
    assert!(listed.body["categories"].as_array().unwrap().is_empty());

    let missing = app.get("/api/category/brakes").await;
    assert_eq!(missing.status, StatusCode::NOT_FOUND);
    assert_eq!(missing.body["success"], false);
    assert_eq!(missing.body["message"], "Category not found");

    // soft-deleted record is kept
    assert_eq!(app.store.all_categories().await.len(), 1);
}

#[tokio::test]
async fn duplicate_path_is_rejected_even_after_delete() {
    let app = TestApp::new().await;
    let body = json!({"text": "Filters", "path": "filters"});

    let first = app
        .seller_json(Method::POST, "/api/category", body.clone())
        .await;
    assert_eq!(first.status, StatusCode::CREATED);
    let id = first.body["category"]["_id"].as_str().unwrap().to_string();

    let second = app
        .seller_json(Method::POST, "/api/category", body.clone())
        .await;
    assert_eq!(second.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        second.body["message"],
        "Category with this path already exists"
    );

    app.request_json(Method::DELETE, &format!("/api/category/{id}"), None, true)
        .await;
    let third = app.seller_json(Method::POST, "/api/category", body).await;
    assert_eq!(third.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn renaming_onto_a_taken_path_collides() {
    let app = TestApp::new().await;
    app.seller_json(
        Method::POST,
        "/api/category",
        json!({"text": "Lighting", "path": "lighting"}),
    )
    .await;
    let other = app
        .seller_json(
            Method::POST,
            "/api/category",
            json!({"text": "Engine", "path": "engine"}),
        )
        .await;
    let id = other.body["category"]["_id"].as_str().unwrap().to_string();

    let response = app
        .seller_json(
            Method::PUT,
            &format!("/api/category/{id}"),
            json!({"path": "lighting"}),
        )
        .await;
    assert_eq!(response.status, StatusCode::BAD_REQUEST);
    assert_eq!(
        response.body["message"],
        "Category with this path already exists"
    );
}

#[tokio::test]
async fn writes_require_a_seller_session() {
    let app = TestApp::new().await;

    let response = app
        .request_json(
            Method::POST,
            "/api/category",
            Some(json!({"text": "Tyres", "path": "tyres"})),
            false,
        )
        .await;
    assert_eq!(response.status, StatusCode::UNAUTHORIZED);
    assert_eq!(response.body["message"], "Not Authorized");
    assert!(app.get("/api/category").await.body["categories"]
        .as_array()
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn blank_fields_and_bad_ids_are_validation_errors() {
    let app = TestApp::new().await;

    let blank = app
        .seller_json(
            Method::POST,
            "/api/category",
            json!({"text": "   ", "path": "x"}),
        )
        .await;
    assert_eq!(blank.status, StatusCode::BAD_REQUEST);
    assert_eq!(blank.body["success"], false);

    let bad_id = app
        .seller_json(
            Method::PUT,
            "/api/category/not-a-uuid",
            json!({"text": "x"}),
        )
        .await;
    assert_eq!(bad_id.status, StatusCode::BAD_REQUEST);
    assert_eq!(bad_id.body["message"], "Invalid category id: not-a-uuid");

    let unknown = app
        .request_json(
            Method::DELETE,
            &format!("/api/category/{}", uuid::Uuid::new_v4()),
            None,
            true,
        )
        .await;
    assert_eq!(unknown.status, StatusCode::NOT_FOUND);
}
