//! End-to-end tests of the JSON API with the bundled plugins.

#[macro_use]
mod common;

use actix_web::http::{header, StatusCode};
use actix_web::test;
use serde_json::{json, Value};
use tempfile::TempDir;

use common::{bearer, multipart, state};

macro_rules! sign_up {
    ($app:expr, $email:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/signup")
            .set_json(json!({ "email": $email, "password": "secret123", "full_name": "Ana" }))
            .to_request();
        let body: Value = test::call_and_read_body_json(&$app, req).await;
        body["access_token"].as_str().unwrap().to_string()
    }};
}

macro_rules! create {
    ($app:expr, $token:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(bearer(&$token))
            .set_json($body)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let created: Value = test::read_body_json(resp).await;
        created
    }};
}

#[actix_web::test]
async fn posts_require_a_session() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);

    let req = test::TestRequest::get().uri("/api/posts").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body["error"]["code"], "unauthorized");
}

#[actix_web::test]
async fn signup_sets_cookie_and_session_resolves() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({ "email": "Ana@Example.com", "password": "secret123" }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let cookie = resp
        .response()
        .cookies()
        .find(|c| c.name() == "wf_session")
        .expect("session cookie")
        .into_owned();

    let req = test::TestRequest::get()
        .uri("/api/auth/session")
        .cookie(cookie)
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["user"]["email"], "ana@example.com");
}

#[actix_web::test]
async fn duplicate_signup_conflicts_and_bad_password_is_rejected() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    sign_up!(app, "ana@example.com");

    let req = test::TestRequest::post()
        .uri("/api/auth/signup")
        .set_json(json!({ "email": "ana@example.com", "password": "secret123" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::CONFLICT);

    let req = test::TestRequest::post()
        .uri("/api/auth/signin")
        .set_json(json!({ "email": "ana@example.com", "password": "wrong-one" }))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn filter_and_sort_through_query_string() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    create!(app, token, json!({ "title": "Beach", "mood": "Happy", "spent": 10.0 }));
    create!(app, token, json!({ "title": "Hike", "mood": "tired", "spent": 5.0 }));
    create!(app, token, json!({ "title": "Market", "mood": "happy", "tags": ["food"] }));

    let req = test::TestRequest::get()
        .uri("/api/posts?mood=happy&sort_by=spent&sort_order=asc")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let titles: Vec<_> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["title"].as_str().unwrap())
        .collect();
    // missing spend sorts as 0
    assert_eq!(titles, ["Market", "Beach"]);

    let req = test::TestRequest::get()
        .uri("/api/posts?tags=foo")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn invalid_post_is_a_validation_error() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    let req = test::TestRequest::post()
        .uri("/api/posts")
        .insert_header(bearer(&token))
        .set_json(json!({ "title": "  ", "physical_effort": 9 }))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn posts_of_other_users_are_not_found() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let ana = sign_up!(app, "ana@example.com");
    let bo = sign_up!(app, "bo@example.com");

    let post = create!(app, ana, json!({ "title": "Secret trip" }));
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());

    let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&ana)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);

    let req = test::TestRequest::get().uri(&uri).insert_header(bearer(&bo)).to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn map_lists_posts_with_coordinates() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    create!(
        app,
        token,
        json!({ "title": "Lisbon", "latitude": 38.72, "longitude": -9.14 })
    );
    create!(app, token, json!({ "title": "Nowhere" }));

    let req = test::TestRequest::get()
        .uri("/api/posts/map")
        .insert_header(bearer(&token))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    let markers = body.as_array().unwrap();
    assert_eq!(markers.len(), 1);
    assert_eq!(markers[0]["title"], "Lisbon");
}

#[actix_web::test]
async fn sign_out_invalidates_the_token() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    let req = test::TestRequest::post()
        .uri("/api/auth/signout")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::get()
        .uri("/api/auth/session")
        .insert_header(bearer(&token))
        .to_request();
    assert_eq!(
        test::call_service(&app, req).await.status(),
        StatusCode::UNAUTHORIZED
    );
}

#[actix_web::test]
async fn password_change_checks_confirmation_and_current_password() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    let change = |current: &str, new: &str, confirm: &str| {
        test::TestRequest::put()
            .uri("/api/auth/password")
            .insert_header(bearer(&token))
            .set_json(json!({
                "current_password": current,
                "new_password": new,
                "confirm_password": confirm,
            }))
            .to_request()
    };

    let resp = test::call_service(&app, change("secret123", "newpass1", "newpass2")).await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = test::call_service(&app, change("not-it", "newpass1", "newpass1")).await;
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = test::call_service(&app, change("secret123", "newpass1", "newpass1")).await;
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let req = test::TestRequest::post()
        .uri("/api/auth/signin")
        .set_json(json!({ "email": "ana@example.com", "password": "newpass1" }))
        .to_request();
    assert_eq!(test::call_service(&app, req).await.status(), StatusCode::OK);
}

#[actix_web::test]
async fn profile_update_returns_user() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    let req = test::TestRequest::put()
        .uri("/api/auth/profile")
        .insert_header(bearer(&token))
        .set_json(json!({ "full_name": "Ana Lima" }))
        .to_request();
    let body: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(body["full_name"], "Ana Lima");
}

#[actix_web::test]
async fn media_upload_stores_file_under_owner() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    let (content_type, body) = multipart("file", "clip.mp4", &[0, 0, 0, 24]);
    let req = test::TestRequest::post()
        .uri("/api/media")
        .insert_header(bearer(&token))
        .insert_header((header::CONTENT_TYPE, content_type))
        .set_payload(body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let media: Value = test::read_body_json(resp).await;
    assert_eq!(media["type"], "video");
    assert_eq!(media["filename"], "clip.mp4");
    assert!(media["url"].as_str().unwrap().starts_with("/uploads/"));
    assert!(media["url"].as_str().unwrap().ends_with("_clip.mp4"));
}

#[actix_web::test]
async fn media_upload_rejects_oversize_and_unsupported_files() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    for (name, data) in [("big.mp4", vec![1u8; 2048]), ("notes.txt", b"hi".to_vec())] {
        let (content_type, body) = multipart("file", name, &data);
        let req = test::TestRequest::post()
            .uri("/api/media")
            .insert_header(bearer(&token))
            .insert_header((header::CONTENT_TYPE, content_type))
            .set_payload(body)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST, "{name}");
    }
}

#[actix_web::test]
async fn index_page_renders_filtered_grid() {
    let dir = TempDir::new().unwrap();
    let state = state(&dir).await;
    let app = app!(state);
    let token = sign_up!(app, "ana@example.com");

    create!(app, token, json!({ "title": "Porto", "location_name": "Porto, Portugal" }));
    create!(app, token, json!({ "title": "Oslo", "location_name": "Oslo, Norway" }));

    let req = test::TestRequest::get()
        .uri("/?location=portugal")
        .insert_header(bearer(&token))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let html = String::from_utf8(test::read_body(resp).await.to_vec()).unwrap();
    assert!(html.contains("Porto"));
    assert!(!html.contains("Oslo"));
    assert!(html.contains(r#"value="portugal""#));
}
