//! HTTP black-box tests over the in-memory store.

use actix_web::body::MessageBody;
use actix_web::dev::ServiceResponse;
use actix_web::http::StatusCode;
use actix_web::middleware::NormalizePath;
use actix_web::{App, test, web};
use serde_json::{Value, json};

use api_server::handlers::configure_routes;
use api_server::{json_config, query_config};
use api_server::observability::{REQUEST_ID_HEADER, RequestIdMiddleware};
use api_server::state::AppState;
use quill_infra::JwtConfig;

fn test_state() -> AppState {
    AppState::in_memory(JwtConfig {
        secret: "api-test-secret".to_string(),
        ..JwtConfig::default()
    })
}

macro_rules! test_app {
    ($state:expr) => {{
        let state: AppState = $state;
        let tokens = state.token_service();
        test::init_service(
            App::new()
                .wrap(NormalizePath::trim())
                .wrap(RequestIdMiddleware)
                .app_data(web::Data::new(state))
                .app_data(web::Data::new(tokens))
                .app_data(json_config())
                .app_data(query_config())
                .configure(configure_routes),
        )
        .await
    }};
}

async fn body_json<B: MessageBody>(resp: ServiceResponse<B>) -> Value {
    test::read_body_json(resp).await
}

/// Registers a user and returns `(access_token, refresh_token)`.
macro_rules! register {
    ($app:expr, $username:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/auth/register")
            .set_json(json!({
                "username": $username,
                "email": format!("{}@example.com", $username),
                "password": "password123",
                "firstName": "Test",
                "lastName": "User",
            }))
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        let body = body_json(resp).await;
        (
            body["accessToken"].as_str().unwrap().to_string(),
            body["refreshToken"].as_str().unwrap().to_string(),
        )
    }};
}

macro_rules! create_post {
    ($app:expr, $token:expr, $body:expr) => {{
        let req = test::TestRequest::post()
            .uri("/api/posts")
            .insert_header(("Authorization", format!("Bearer {}", $token)))
            .set_json($body)
            .to_request();
        let resp = test::call_service(&$app, req).await;
        assert_eq!(resp.status(), StatusCode::CREATED);
        body_json(resp).await
    }};
}

#[actix_web::test]
async fn health_check_reports_ok() {
    let app = test_app!(test_state());

    let resp = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/health-check/").to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    let body = body_json(resp).await;
    assert_eq!(body["status"], "ok");
}

#[actix_web::test]
async fn request_id_is_echoed() {
    let app = test_app!(test_state());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/health-check")
            .insert_header((REQUEST_ID_HEADER, "trace-42"))
            .to_request(),
    )
    .await;

    assert_eq!(resp.headers().get(REQUEST_ID_HEADER).unwrap(), "trace-42");
}

#[actix_web::test]
async fn login_returns_tokens_and_profile() {
    let app = test_app!(test_state());
    register!(app, "alice");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "alice", "password": "password123"}))
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert!(body["accessToken"].is_string());
    assert!(body["refreshToken"].is_string());
    assert_eq!(body["expiresIn"], 15 * 60);
    assert_eq!(body["user"]["username"], "alice");
    assert_eq!(body["user"]["firstName"], "Test");
    assert!(body["user"].get("password_hash").is_none());
}

#[actix_web::test]
async fn login_errors() {
    let app = test_app!(test_state());
    register!(app, "alice");

    let missing = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "alice"}))
            .to_request(),
    )
    .await;
    assert_eq!(missing.status(), StatusCode::BAD_REQUEST);

    let wrong = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .set_json(json!({"username": "alice", "password": "nope-nope"}))
            .to_request(),
    )
    .await;
    assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(wrong).await;
    assert_eq!(body["status"], 401);
}

#[actix_web::test]
async fn malformed_json_is_bad_request() {
    let app = test_app!(test_state());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/login")
            .insert_header(("Content-Type", "application/json"))
            .set_payload("{not json")
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Bad Request");
}

#[actix_web::test]
async fn verify_accepts_valid_and_rejects_invalid_tokens() {
    let app = test_app!(test_state());
    let (access, refresh) = register!(app, "alice");

    for token in [&access, &refresh] {
        let resp = test::call_service(
            &app,
            test::TestRequest::post()
                .uri("/api/auth/verify")
                .set_json(json!({ "token": token }))
                .to_request(),
        )
        .await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/verify")
            .set_json(json!({"token": "garbage"}))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn refresh_and_logout_lifecycle() {
    let app = test_app!(test_state());
    let (_, refresh) = register!(app, "alice");

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": refresh }))
            .to_request(),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["expiresIn"], 15 * 60);
    let rotated = body["refreshToken"].as_str().unwrap().to_string();
    assert_ne!(rotated, refresh);

    // The old refresh token was blacklisted on rotation.
    let reuse = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": refresh }))
            .to_request(),
    )
    .await;
    assert_eq!(reuse.status(), StatusCode::UNAUTHORIZED);

    let logout = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/logout")
            .set_json(json!({ "refreshToken": rotated }))
            .to_request(),
    )
    .await;
    assert_eq!(logout.status(), StatusCode::OK);
    assert!(body_json(logout).await["message"].is_string());

    let after_logout = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": rotated }))
            .to_request(),
    )
    .await;
    assert_eq!(after_logout.status(), StatusCode::UNAUTHORIZED);

    let empty = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/auth/refresh")
            .set_json(json!({ "refreshToken": "" }))
            .to_request(),
    )
    .await;
    assert_eq!(empty.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn me_requires_access_token() {
    let app = test_app!(test_state());
    let (access, refresh) = register!(app, "alice");

    let ok = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {access}")))
            .to_request(),
    )
    .await;
    assert_eq!(ok.status(), StatusCode::OK);
    assert_eq!(body_json(ok).await["email"], "alice@example.com");

    let with_refresh = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/auth/me")
            .insert_header(("Authorization", format!("Bearer {refresh}")))
            .to_request(),
    )
    .await;
    assert_eq!(with_refresh.status(), StatusCode::UNAUTHORIZED);

    let anonymous = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/auth/me").to_request(),
    )
    .await;
    assert_eq!(anonymous.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn creating_posts_requires_authentication() {
    let app = test_app!(test_state());

    let resp = test::call_service(
        &app,
        test::TestRequest::post()
            .uri("/api/posts")
            .set_json(json!({"title": "T", "content": "C"}))
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn post_listing_filters_and_paginates() {
    let app = test_app!(test_state());
    let (alice, _) = register!(app, "alice");
    let (bob, _) = register!(app, "bob");

    create_post!(app, alice, json!({"title": "Rust tips", "content": "Rust ownership", "status": "published"}));
    create_post!(app, alice, json!({"title": "Hidden", "content": "x", "active": false}));
    create_post!(app, bob, json!({"title": "Cooking", "content": "Rust removal"}));

    let all = body_json(
        test::call_service(&app, test::TestRequest::get().uri("/api/posts").to_request()).await,
    )
    .await;
    assert_eq!(all["count"], 2);
    assert_eq!(all["page"], 1);
    assert!(all["next"].is_null());
    assert!(all["previous"].is_null());

    let inactive = body_json(
        test::call_service(
            &app,
            test::TestRequest::get().uri("/api/posts?active=false").to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(inactive["count"], 1);
    assert_eq!(inactive["results"][0]["title"], "Hidden");

    let by_author = body_json(
        test::call_service(
            &app,
            test::TestRequest::get().uri("/api/posts?author_name=BOB").to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(by_author["count"], 1);
    assert_eq!(by_author["results"][0]["author"]["name"], "bob");

    let paged = body_json(
        test::call_service(
            &app,
            test::TestRequest::get()
                .uri("/api/posts?content=rust&page_size=1")
                .to_request(),
        )
        .await,
    )
    .await;
    assert_eq!(paged["count"], 2);
    assert_eq!(paged["results"].as_array().unwrap().len(), 1);
    assert_eq!(paged["next"], 2);

    let bad = test::call_service(
        &app,
        test::TestRequest::get().uri("/api/posts?page=zero").to_request(),
    )
    .await;
    assert_eq!(bad.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn out_of_range_page_is_bad_request() {
    let app = test_app!(test_state());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/posts?page=18446744073709551615")
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(body["status"], 400);
    assert_eq!(body["detail"], "page is out of range");
}

#[actix_web::test]
async fn rejected_query_string_is_problem_json() {
    let app = test_app!(test_state());

    let resp = test::call_service(
        &app,
        test::TestRequest::get()
            .uri("/api/posts?title=a&title=b")
            .to_request(),
    )
    .await;

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert!(resp.headers().contains_key(REQUEST_ID_HEADER));
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Bad Request");
    assert_eq!(body["status"], 400);
    assert!(body["detail"].is_string());
}

#[actix_web::test]
async fn only_owner_can_edit_and_delete() {
    let app = test_app!(test_state());
    let (alice, _) = register!(app, "alice");
    let (mallory, _) = register!(app, "mallory");

    let post = create_post!(app, alice, json!({"title": "Mine", "content": "Body"}));
    let uri = format!("/api/posts/{}", post["id"].as_str().unwrap());
    assert_eq!(post["status"], "draft");
    assert_eq!(post["author"]["name"], "alice");

    let forbidden = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&uri)
            .insert_header(("Authorization", format!("Bearer {mallory}")))
            .set_json(json!({"title": "Stolen"}))
            .to_request(),
    )
    .await;
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);

    let incomplete_put = test::call_service(
        &app,
        test::TestRequest::put()
            .uri(&uri)
            .insert_header(("Authorization", format!("Bearer {alice}")))
            .set_json(json!({"title": "Only title"}))
            .to_request(),
    )
    .await;
    assert_eq!(incomplete_put.status(), StatusCode::BAD_REQUEST);

    let patched = test::call_service(
        &app,
        test::TestRequest::patch()
            .uri(&uri)
            .insert_header(("Authorization", format!("Bearer {alice}")))
            .set_json(json!({"status": "published"}))
            .to_request(),
    )
    .await;
    assert_eq!(patched.status(), StatusCode::OK);
    let patched = body_json(patched).await;
    assert_eq!(patched["status"], "published");
    assert_eq!(patched["title"], "Mine");
    assert_eq!(patched["published_date"], post["published_date"]);

    let not_owner_delete = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&uri)
            .insert_header(("Authorization", format!("Bearer {mallory}")))
            .to_request(),
    )
    .await;
    assert_eq!(not_owner_delete.status(), StatusCode::FORBIDDEN);

    let deleted = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&uri)
            .insert_header(("Authorization", format!("Bearer {alice}")))
            .to_request(),
    )
    .await;
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let gone = test::call_service(&app, test::TestRequest::get().uri(&uri).to_request()).await;
    assert_eq!(gone.status(), StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn comment_flow() {
    let app = test_app!(test_state());
    let (alice, _) = register!(app, "alice");
    let (bob, _) = register!(app, "bob");
    let (carol, _) = register!(app, "carol");

    let post = create_post!(app, alice, json!({"title": "Post", "content": "Body"}));
    let post_uri = format!("/api/posts/{}", post["id"].as_str().unwrap());
    let comments_uri = format!("{post_uri}/comments");

    let missing_content = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&comments_uri)
            .set_json(json!({}))
            .to_request(),
    )
    .await;
    assert_eq!(missing_content.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(missing_content).await["detail"], "Content is required.");

    let anonymous = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&comments_uri)
            .set_json(json!({"content": "Nice post"}))
            .to_request(),
    )
    .await;
    assert_eq!(anonymous.status(), StatusCode::CREATED);
    let anonymous = body_json(anonymous).await;
    assert!(anonymous["user"].is_null());

    let by_bob = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&comments_uri)
            .insert_header(("Authorization", format!("Bearer {bob}")))
            .set_json(json!({"content": "Thanks"}))
            .to_request(),
    )
    .await;
    assert_eq!(by_bob.status(), StatusCode::CREATED);
    let by_bob = body_json(by_bob).await;
    assert!(by_bob["user"].is_string());

    let detail = body_json(
        test::call_service(&app, test::TestRequest::get().uri(&post_uri).to_request()).await,
    )
    .await;
    assert_eq!(detail["comments"].as_array().unwrap().len(), 2);
    assert_eq!(detail["title"], "Post");

    let carol_delete = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("{comments_uri}/{}", by_bob["id"].as_str().unwrap()))
            .insert_header(("Authorization", format!("Bearer {carol}")))
            .to_request(),
    )
    .await;
    assert_eq!(carol_delete.status(), StatusCode::FORBIDDEN);

    let bob_delete = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("{comments_uri}/{}", by_bob["id"].as_str().unwrap()))
            .insert_header(("Authorization", format!("Bearer {bob}")))
            .to_request(),
    )
    .await;
    assert_eq!(bob_delete.status(), StatusCode::NO_CONTENT);

    let owner_delete = test::call_service(
        &app,
        test::TestRequest::delete()
            .uri(&format!("{comments_uri}/{}", anonymous["id"].as_str().unwrap()))
            .insert_header(("Authorization", format!("Bearer {alice}")))
            .to_request(),
    )
    .await;
    assert_eq!(owner_delete.status(), StatusCode::NO_CONTENT);

    let unknown_post = test::call_service(
        &app,
        test::TestRequest::post()
            .uri(&format!("/api/posts/{}/comments", uuid::Uuid::new_v4()))
            .set_json(json!({"content": "hello"}))
            .to_request(),
    )
    .await;
    assert_eq!(unknown_post.status(), StatusCode::NOT_FOUND);
}
