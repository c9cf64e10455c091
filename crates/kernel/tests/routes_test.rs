#![allow(clippy::unwrap_used, clippy::expect_used)]
//! HTTP tests for the protected article form.

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use axum::response::Response;
use http_body_util::BodyExt;
use tower::ServiceExt;

use formseal_kernel::routes::article::ARTICLE_ADD_PATH;
use formseal_kernel::{AppState, Config, routes};
use formseal_test_utils::{TEST_SALT, TestSubmission, cookie_pair};

fn test_config() -> Config {
    Config {
        port: 0,
        security_salt: TEST_SALT.to_string(),
        debug: false,
        unlocked_fields: Vec::new(),
        templates_file: None,
        cookie_secure: false,
    }
}

fn app() -> Router {
    routes::app(AppState::new(test_config()).unwrap())
}

async fn body_string(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

/// GET the form, returning the session cookie and the page.
async fn load_form(app: &Router) -> (String, String) {
    let response = app
        .clone()
        .oneshot(
            Request::get(ARTICLE_ADD_PATH)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = cookie_pair(
        response
            .headers()
            .get(header::SET_COOKIE)
            .expect("session cookie")
            .to_str()
            .unwrap(),
    );
    (cookie, body_string(response).await)
}

async fn post(app: &Router, cookie: Option<&str>, submission: &TestSubmission) -> Response {
    let mut request = Request::post(ARTICLE_ADD_PATH)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded");
    if let Some(cookie) = cookie {
        request = request.header(header::COOKIE, cookie);
    }
    app.clone()
        .oneshot(request.body(Body::from(submission.to_body())).unwrap())
        .await
        .unwrap()
}

fn filled(html: &str) -> TestSubmission {
    TestSubmission::from_html(html)
        .field("Article[title]", "Hello")
        .field("Article[body]", "World")
        .field("Article[notes]", "free text")
        .field("save", "Save")
}

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "ok");
}

#[tokio::test]
async fn test_form_page_contains_token_fields() {
    let app = app();
    let (_, html) = load_form(&app).await;
    assert!(html.contains("name=\"_Token[fields]\""));
    assert!(html.contains("name=\"_Token[unlocked]\""));
    assert!(!html.contains("_Token[debug]"));
}

#[tokio::test]
async fn test_valid_submission_is_accepted() {
    let app = app();
    let (cookie, html) = load_form(&app).await;
    let response = post(&app, Some(&cookie), &filled(&html)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "saved");
}

#[tokio::test]
async fn test_tampered_submission_is_rejected() {
    let app = app();
    let (cookie, html) = load_form(&app).await;
    let submission = filled(&html).replace("Article[status]", "published");
    let response = post(&app, Some(&cookie), &submission).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_submission_without_session_is_rejected() {
    let app = app();
    let (_, html) = load_form(&app).await;
    let response = post(&app, None, &filled(&html)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_is_bound_to_its_session() {
    let app = app();
    let (_, html) = load_form(&app).await;
    let (other_cookie, _) = load_form(&app).await;
    let response = post(&app, Some(&other_cookie), &filled(&html)).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_debug_mode_renders_debug_token() {
    let config = Config {
        debug: true,
        ..test_config()
    };
    let app = routes::app(AppState::new(config).unwrap());
    let (cookie, html) = load_form(&app).await;
    assert!(html.contains("name=\"_Token[debug]\""));

    let response = post(&app, Some(&cookie), &filled(&html)).await;
    assert_eq!(response.status(), StatusCode::OK);
}
