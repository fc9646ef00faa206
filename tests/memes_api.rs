use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use meme_api::{
    repositories::InMemoryMemeRepository, routes::create_router, service::MemeService, AppState,
};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

fn app() -> Router {
    let state = Arc::new(AppState {
        memes: MemeService::new(Arc::new(InMemoryMemeRepository::new())),
    });
    create_router(state)
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(value) => {
            builder = builder.header(header::CONTENT_TYPE, "application/json");
            Body::from(value.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).expect("request"))
        .await
        .expect("router is infallible");

    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn create(app: &Router, name: &str, url: &str, caption: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/memes",
        Some(json!({ "name": name, "url": url, "caption": caption })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "unexpected body: {body}");
    body["id"].as_str().expect("id in body").to_string()
}

#[tokio::test]
async fn create_get_conflict_and_update_flow() {
    let app = app();
    let id = create(&app, "A", "http://x/1.png", "hi").await;

    let (status, meme) = send(&app, Method::GET, &format!("/memes/{id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(meme["id"], id.as_str());
    assert_eq!(meme["name"], "A");
    assert_eq!(meme["url"], "http://x/1.png");
    assert_eq!(meme["caption"], "hi");
    assert!(meme["createdAt"].is_string());
    assert!(meme["editedAt"].is_string());

    let (status, body) = send(
        &app,
        Method::POST,
        "/memes",
        Some(json!({ "name": "A", "url": "http://x/1.png", "caption": "hi" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Meme already exists");

    let (status, body) = send(&app, Method::PATCH, &format!("/memes/{id}"), Some(json!({ "caption": "bye" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    let (_, meme) = send(&app, Method::GET, &format!("/memes/{id}"), None).await;
    assert_eq!(meme["caption"], "bye");
    assert_eq!(meme["name"], "A");
    assert_eq!(meme["url"], "http://x/1.png");
}

#[tokio::test]
async fn duplicate_create_leaves_one_record() {
    let app = app();
    create(&app, "A", "u", "c").await;
    let (status, _) = send(&app, Method::POST, "/memes", Some(json!({ "name": "A", "url": "u", "caption": "c" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, list) = send(&app, Method::GET, "/memes", None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn incomplete_create_is_unprocessable() {
    let app = app();
    for body in [
        json!({ "url": "u", "caption": "c" }),
        json!({ "name": "A", "url": "", "caption": "c" }),
        json!({ "name": "A", "url": "u", "caption": "   " }),
        json!({}),
    ] {
        let (status, response) = send(&app, Method::POST, "/memes", Some(body)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(response["error"].is_string());
    }

    let (_, list) = send(&app, Method::GET, "/memes", None).await;
    assert_eq!(list, json!([]));
}

#[tokio::test]
async fn unknown_and_malformed_ids_are_not_found() {
    let app = app();
    let missing = uuid::Uuid::new_v4();
    for uri in [format!("/memes/{missing}"), "/memes/not-a-valid-id".to_string(), "/memes/6026c2881131aa2723f71a03".to_string()] {
        let (status, body) = send(&app, Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{uri}");
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn list_returns_newest_hundred() {
    let app = app();
    for i in 0..101 {
        create(&app, "A", "u", &format!("caption {i}")).await;
    }

    let (status, list) = send(&app, Method::GET, "/memes", None).await;
    assert_eq!(status, StatusCode::OK);
    let memes = list.as_array().expect("array");
    assert_eq!(memes.len(), 100);
    assert_eq!(memes[0]["caption"], "caption 100");
    assert_eq!(memes[99]["caption"], "caption 1");
}

#[tokio::test]
async fn update_ignores_name_and_refreshes_edited_at() {
    let app = app();
    let id = create(&app, "A", "u", "c").await;
    let (_, before) = send(&app, Method::GET, &format!("/memes/{id}"), None).await;

    tokio::time::sleep(Duration::from_millis(5)).await;
    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/memes/{id}"),
        Some(json!({ "name": "B", "url": "u2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, after) = send(&app, Method::GET, &format!("/memes/{id}"), None).await;
    assert_eq!(after["name"], "A");
    assert_eq!(after["url"], "u2");
    assert_eq!(after["caption"], "c");
    assert_eq!(after["createdAt"], before["createdAt"]);

    let edited_before: chrono::DateTime<chrono::Utc> = before["editedAt"].as_str().unwrap().parse().unwrap();
    let edited_after: chrono::DateTime<chrono::Utc> = after["editedAt"].as_str().unwrap().parse().unwrap();
    assert!(edited_after > edited_before);
}

#[tokio::test]
async fn update_error_cases() {
    let app = app();
    let id = create(&app, "A", "u", "c").await;
    create(&app, "A", "u", "taken").await;

    // Nothing to change.
    let (status, _) = send(&app, Method::PATCH, &format!("/memes/{id}"), Some(json!({ "name": "B" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let (status, _) = send(&app, Method::PATCH, &format!("/memes/{id}"), Some(json!({ "url": "", "caption": "" }))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    // Unknown and malformed ids.
    let missing = uuid::Uuid::new_v4();
    let (status, _) = send(&app, Method::PATCH, &format!("/memes/{missing}"), Some(json!({ "caption": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::PATCH, "/memes/garbage", Some(json!({ "caption": "x" }))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    // Colliding with another meme's triple.
    let (status, body) = send(&app, Method::PATCH, &format!("/memes/{id}"), Some(json!({ "caption": "taken" }))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Meme already exists");

    let (_, meme) = send(&app, Method::GET, &format!("/memes/{id}"), None).await;
    assert_eq!(meme["caption"], "c");

    let (_, list) = send(&app, Method::GET, "/memes", None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(2));
}

#[tokio::test]
async fn malformed_json_is_a_json_error() {
    let app = app();
    let request = Request::builder()
        .method(Method::POST)
        .uri("/memes")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert!(body["error"].is_string());
}

async fn send_raw(app: &Router, method: Method, uri: &str, content_type: Option<&str>, body: &str) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(content_type) = content_type {
        builder = builder.header(header::CONTENT_TYPE, content_type);
    }
    let response = app.clone().oneshot(builder.body(Body::from(body.to_string())).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

#[tokio::test]
async fn body_without_json_content_type_is_incomplete() {
    let app = app();
    let payload = r#"{"name":"A","url":"u","caption":"c"}"#;

    let (status, body) = send_raw(&app, Method::POST, "/memes", None, payload).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body["error"].as_str().unwrap().starts_with("Please enter all fields"));

    let form = Some("application/x-www-form-urlencoded");
    let (status, _) = send_raw(&app, Method::POST, "/memes", form, "name=A&url=u&caption=c").await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let id = create(&app, "A", "u", "c").await;
    let (status, _) = send_raw(&app, Method::PATCH, &format!("/memes/{id}"), None, r#"{"caption":"d"}"#).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);

    let (_, meme) = send(&app, Method::GET, &format!("/memes/{id}"), None).await;
    assert_eq!(meme["caption"], "c");
    let (_, list) = send(&app, Method::GET, "/memes", None).await;
    assert_eq!(list.as_array().map(Vec::len), Some(1));
}

#[tokio::test]
async fn unrouted_requests_get_json_errors() {
    let app = app();

    let (status, body) = send(&app, Method::DELETE, "/memes/abc", None).await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
    assert_eq!(body["error"], "Method not allowed");

    let (status, body) = send(&app, Method::GET, "/memes/", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found");

    let (status, body) = send(&app, Method::GET, "/nowhere", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
}
