use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::response::Response;
use axum::Router;
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use tinyweb::auth;
use tinyweb::config::Config;
use tinyweb::db::models::UserIdentity;
use tinyweb::db::Database;
use tinyweb::routes;
use tinyweb::session::SessionStore;
use tinyweb::state::AppState;

struct TestApp {
    _tmp: TempDir,
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        let db = Database::open(&tmp.path().join("tws.db")).expect("Failed to open store");
        let state = AppState {
            db,
            sessions: SessionStore::new(),
            config: Config::default(),
        };
        let router = routes::app(state.clone());
        Self {
            _tmp: tmp,
            state,
            router,
        }
    }

    /// Log `user_id` in on a fresh session and return its cookie.
    fn login(&self, user_id: &str) -> String {
        let session = self.state.sessions.create();
        auth::login(
            &self.state.db,
            &session,
            &UserIdentity::new(user_id, format!("{}.png", user_id)),
        )
        .expect("login failed");
        format!("{}={}", self.state.config.session.cookie_name, session.id())
    }

    async fn send(&self, request: Request<Body>) -> Response {
        self.router.clone().oneshot(request).await.unwrap()
    }

    async fn call(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.send(request).await;
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        (status, json)
    }
}

#[tokio::test]
async fn test_anonymous_request_gets_session_cookie() {
    let app = TestApp::new();
    let response = app
        .send(Request::get("/me").body(Body::empty()).unwrap())
        .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("no session cookie issued")
        .to_str()
        .unwrap();
    assert!(cookie.starts_with("tws_session="));
    assert!(cookie.contains("HttpOnly"));
    assert_eq!(app.state.sessions.len(), 1);
}

#[tokio::test]
async fn test_known_session_is_not_reissued() {
    let app = TestApp::new();
    let cookie = app.login("alice");

    let response = app
        .send(
            Request::get("/me")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().get(header::SET_COOKIE).is_none());
}

#[tokio::test]
async fn test_write_routes_require_login() {
    let app = TestApp::new();
    let (status, _) = app
        .call("POST", "/posts", None, Some(json!({ "text": "hi" })))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = app.call("POST", "/posts/1/like", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_list_and_like_flow() {
    let app = TestApp::new();
    let alice = app.login("alice");
    let bob = app.login("bob");

    let (status, created) = app
        .call("POST", "/posts", Some(&alice), Some(json!({ "text": "hello" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let first = created["id"].as_u64().unwrap();

    app.call("POST", "/posts", Some(&alice), Some(json!({ "text": "world" })))
        .await;

    let (status, list) = app.call("GET", "/users/alice/posts", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let texts: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["text"].as_str().unwrap())
        .collect();
    assert_eq!(texts, vec!["world", "hello"]);

    let uri = format!("/posts/{}/like", first);
    let (_, like) = app.call("POST", &uri, Some(&bob), None).await;
    assert_eq!(like["liked"], json!(true));

    let (_, view) = app
        .call("GET", &format!("/posts/{}", first), Some(&bob), None)
        .await;
    assert_eq!(view["like_count"], json!(1));
    assert_eq!(view["liked"], json!(true));

    let (_, unlike) = app.call("POST", &uri, Some(&bob), None).await;
    assert_eq!(unlike["liked"], json!(false));
}

#[tokio::test]
async fn test_paging_with_before_cursor() {
    let app = TestApp::new();
    let alice = app.login("alice");
    for text in ["a", "b", "c"] {
        app.call("POST", "/posts", Some(&alice), Some(json!({ "text": text })))
            .await;
    }

    let (_, page) = app
        .call("GET", "/users/alice/posts?count=2&before=3", None, None)
        .await;
    let ids: Vec<u64> = page
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["id"].as_u64().unwrap())
        .collect();
    assert_eq!(ids, vec![2, 1]);

    let (status, _) = app
        .call("GET", "/users/alice/posts?before=99", None, None)
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_repost_embeds_target_and_quotes_do_not_chain() {
    let app = TestApp::new();
    let alice = app.login("alice");
    let bob = app.login("bob");

    let (_, created) = app
        .call("POST", "/posts", Some(&alice), Some(json!({ "text": "hello" })))
        .await;
    let original = created["id"].as_u64().unwrap();

    let (status, quote) = app
        .call(
            "POST",
            &format!("/posts/{}/repost", original),
            Some(&bob),
            Some(json!({ "text": "nice" })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let quote = quote["id"].as_u64().unwrap();

    let (_, view) = app
        .call("GET", &format!("/posts/{}", quote), None, None)
        .await;
    assert_eq!(view["kind"], json!("quote"));
    assert_eq!(view["repost"]["id"], json!(original));
    assert_eq!(view["repost"]["creator_avatar"], json!("alice.png"));

    let (status, _) = app
        .call(
            "POST",
            &format!("/posts/{}/repost", quote),
            Some(&alice),
            Some(json!({})),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_only_creator_can_delete() {
    let app = TestApp::new();
    let alice = app.login("alice");
    let bob = app.login("bob");

    let (_, created) = app
        .call("POST", "/posts", Some(&alice), Some(json!({ "text": "mine" })))
        .await;
    let uri = format!("/posts/{}", created["id"].as_u64().unwrap());

    let (status, _) = app.call("DELETE", &uri, Some(&bob), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = app.call("DELETE", &uri, Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call("GET", &uri, None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_post_text_limits() {
    let app = TestApp::new();
    let alice = app.login("alice");

    let (status, _) = app
        .call("POST", "/posts", Some(&alice), Some(json!({ "text": "   " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let long = "x".repeat(241);
    let (status, _) = app
        .call("POST", "/posts", Some(&alice), Some(json!({ "text": long })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pages_round_trip() {
    let app = TestApp::new();
    let alice = app.login("alice");

    let (status, _) = app.call("GET", "/pages/Home", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let response = app
        .send(
            Request::put("/pages/Home")
                .header(header::COOKIE, &alice)
                .body(Body::from("Welcome home"))
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(Request::get("/pages/Home").body(Body::empty()).unwrap())
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&body[..], b"Welcome home");
}

#[tokio::test]
async fn test_logout_ends_session() {
    let app = TestApp::new();
    let alice = app.login("alice");

    let (status, me) = app.call("GET", "/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["id"], json!("alice"));

    let (status, _) = app.call("POST", "/auth/logout", Some(&alice), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.call("GET", "/me", Some(&alice), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_evicted_session_gets_fresh_cookie() {
    let app = TestApp::new();
    let alice = app.login("alice");
    let old_id = alice.split('=').nth(1).unwrap().to_string();

    std::thread::sleep(std::time::Duration::from_millis(10));
    assert_eq!(app.state.sessions.run_gc(std::time::Duration::from_millis(1)), 1);

    let response = app
        .send(
            Request::get("/me")
                .header(header::COOKIE, &alice)
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("no replacement cookie issued")
        .to_str()
        .unwrap()
        .to_string();
    assert!(!cookie.contains(&old_id));
    assert!(app.state.sessions.read(&old_id).is_err());
}
