use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

use noticeboard_api::session::{SESSION_COOKIE, SessionConfig};
use noticeboard_api::{AppStateInner, router};
use noticeboard_db::Database;

const SECRET: &[u8] = b"integration-test-secret-0123456789";

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    let sessions = SessionConfig::new(SECRET, chrono::Duration::days(30));
    router(AppStateInner::new(db, sessions))
}

/// A browser-like client: remembers the session cookie between requests.
struct Client {
    app: Router,
    cookie: Option<String>,
}

impl Client {
    fn new(app: &Router) -> Self {
        Self {
            app: app.clone(),
            cookie: None,
        }
    }

    async fn send(&mut self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(cookie) = &self.cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = self.app.clone().oneshot(request).await.unwrap();
        let status = response.status();

        for value in response.headers().get_all(header::SET_COOKIE) {
            let pair = value.to_str().unwrap().split(';').next().unwrap().trim();
            if let Some(token) = pair.strip_prefix(&format!("{SESSION_COOKIE}=")) {
                self.cookie = (!token.is_empty()).then(|| pair.to_string());
            }
        }

        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)
                .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
        };
        (status, body)
    }

    async fn register(&mut self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/register",
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    async fn login(&mut self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            Method::POST,
            "/login",
            Some(json!({ "username": username, "password": password })),
        )
        .await
    }

    async fn signed_up(app: &Router, username: &str, password: &str) -> Self {
        let mut client = Self::new(app);
        assert_eq!(client.register(username, password).await.0, StatusCode::OK);
        assert_eq!(client.login(username, password).await.0, StatusCode::OK);
        client
    }

    async fn post_message(&mut self, text: &str) -> Value {
        let (status, body) = self
            .send(Method::POST, "/messages/save", Some(json!({ "text": text })))
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body
    }

    async fn list(&mut self) -> Vec<Value> {
        let (status, body) = self.send(Method::GET, "/messages", None).await;
        assert_eq!(status, StatusCode::OK, "{body}");
        body.as_array().unwrap().clone()
    }
}

#[tokio::test]
async fn alice_and_bob_scenario() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;
    let mut bob = Client::signed_up(&app, "bob", "hunter2").await;

    let saved = alice.post_message("hi").await;
    assert_eq!(saved["id"], 1);
    assert_eq!(saved["text"], "hi");
    assert_eq!(saved["username"], "alice");

    let (status, _) = bob.send(Method::DELETE, "/messages/delete?id=1", None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = alice.send(Method::DELETE, "/messages/delete?id=1", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());

    assert!(alice.list().await.is_empty());
}

#[tokio::test]
async fn register_returns_id_and_username_only() {
    let app = app();
    let mut client = Client::new(&app);

    let (status, body) = client.register("alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": 1, "username": "alice" }));
    assert!(client.cookie.is_none(), "registering must not log in");
}

#[tokio::test]
async fn login_issues_cookie_and_attributes_messages() {
    let app = app();
    let mut client = Client::new(&app);
    client.register("alice", "pw123").await;

    let (status, body) = client.login("alice", "pw123").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "id": 1, "username": "alice" }));
    assert!(client.cookie.is_some());

    let saved = client.post_message("hello").await;
    assert_eq!(saved["user_id"], 1);

    let listed = client.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["text"], "hello");
    assert_eq!(listed[0]["username"], "alice");
    assert!(listed[0]["timestamp"].as_str().unwrap().parse::<chrono::DateTime<chrono::Utc>>().is_ok());
}

#[tokio::test]
async fn wrong_password_and_unknown_user_are_unauthorized() {
    let app = app();
    let mut client = Client::new(&app);
    client.register("alice", "pw123").await;

    let (status, body) = client.login("alice", "wrong").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["error"].is_string());
    assert!(client.cookie.is_none());

    let (status, _) = client.login("nobody", "pw123").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn duplicate_username_is_rejected_and_original_survives() {
    let app = app();
    let mut client = Client::new(&app);

    assert_eq!(client.register("alice", "pw123").await.0, StatusCode::OK);

    let (status, body) = client.register("alice", "other").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "username is already taken");

    assert_eq!(client.login("alice", "pw123").await.0, StatusCode::OK);
    assert_eq!(Client::new(&app).login("alice", "other").await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_auth_bodies_are_bad_requests() {
    let app = app();
    let mut client = Client::new(&app);

    let (status, _) = client
        .send(Method::POST, "/register", Some(json!({ "username": "alice" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client
        .send(Method::POST, "/register", Some(json!({ "username": "", "password": "pw" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = client.send(Method::POST, "/login", Some(json!("alice"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let request = Request::builder()
        .method(Method::POST)
        .uri("/register")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn protected_routes_require_a_session() {
    let app = app();
    let mut anonymous = Client::new(&app);

    let calls = [
        (Method::GET, "/messages", None),
        (Method::POST, "/messages/save", Some(json!({ "text": "hi" }))),
        (Method::DELETE, "/messages/delete?id=1", None),
        (Method::PUT, "/messages/update?id=1", Some(json!({ "text": "hi" }))),
    ];
    for (method, uri, body) in calls {
        let (status, body) = anonymous.send(method, uri, body).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
        assert_eq!(body["error"], "login required");
    }
}

#[tokio::test]
async fn forged_cookie_is_treated_as_anonymous() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    let mut cookie = alice.cookie.clone().unwrap();
    cookie.push('A');
    alice.cookie = Some(cookie);

    let (status, _) = alice.send(Method::GET, "/messages", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let other_key = router(AppStateInner::new(
        Database::open_in_memory().unwrap(),
        SessionConfig::new(b"rotated-secret-rotated-secret-00", chrono::Duration::days(30)),
    ));
    let mut stale = Client::signed_up(&app, "bob", "pw").await;
    stale.app = other_key;
    assert_eq!(stale.send(Method::GET, "/messages", None).await.0, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn logout_clears_the_session_and_is_idempotent() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    let (status, body) = alice.send(Method::POST, "/logout", None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["message"].is_string());
    assert!(alice.cookie.is_none());

    assert_eq!(alice.send(Method::GET, "/messages", None).await.0, StatusCode::UNAUTHORIZED);

    // Logging out again, and via GET, still succeeds.
    assert_eq!(alice.send(Method::POST, "/logout", None).await.0, StatusCode::OK);
    assert_eq!(alice.send(Method::GET, "/logout", None).await.0, StatusCode::OK);

    // The response carries an expiring cookie even with no session to end.
    let request = Request::builder().method(Method::POST).uri("/logout").body(Body::empty()).unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let set_cookie = response.headers().get(header::SET_COOKIE).unwrap().to_str().unwrap();
    assert!(set_cookie.starts_with(&format!("{SESSION_COOKIE}=;")), "{set_cookie}");
}

#[tokio::test]
async fn non_owner_cannot_update_or_delete() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;
    let mut bob = Client::signed_up(&app, "bob", "pw456").await;

    let id = alice.post_message("original").await["id"].as_i64().unwrap();

    let (status, _) = bob
        .send(Method::PUT, &format!("/messages/update?id={id}"), Some(json!({ "text": "defaced" })))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = bob.send(Method::DELETE, &format!("/messages/delete?id={id}"), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let listed = bob.list().await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["text"], "original");
}

#[tokio::test]
async fn owner_update_changes_text_only() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    let saved = alice.post_message("draft").await;
    let id = saved["id"].as_i64().unwrap();

    let (status, body) = alice
        .send(Method::PUT, &format!("/messages/update?id={id}"), Some(json!({ "text": "final" })))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["text"], "final");
    assert_eq!(body["timestamp"], saved["timestamp"]);
    assert_eq!(body.as_object().unwrap().len(), 3);

    assert_eq!(alice.list().await[0]["text"], "final");
}

#[tokio::test]
async fn missing_messages_are_not_found() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    let (status, _) = alice
        .send(Method::PUT, "/messages/update?id=99", Some(json!({ "text": "x" })))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = alice.send(Method::DELETE, "/messages/delete?id=99", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn message_id_must_be_a_present_integer() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    let (status, body) = alice.send(Method::DELETE, "/messages/delete", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "message id is required");

    let (status, _) = alice.send(Method::DELETE, "/messages/delete?id=abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = alice
        .send(Method::PUT, "/messages/update", Some(json!({ "text": "x" })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn timestamp_is_not_client_suppliable() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    let (status, _) = alice
        .send(
            Method::POST,
            "/messages/save",
            Some(json!({ "text": "hi", "timestamp": "1999-01-01T00:00:00Z" })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(alice.list().await.is_empty());
}

#[tokio::test]
async fn empty_text_is_accepted() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;

    assert_eq!(alice.post_message("").await["text"], "");
}

#[tokio::test]
async fn listing_is_newest_first_with_owner_names() {
    let app = app();
    let mut alice = Client::signed_up(&app, "alice", "pw123").await;
    let mut bob = Client::signed_up(&app, "bob", "pw456").await;

    alice.post_message("a1").await;
    bob.post_message("b1").await;
    alice.post_message("a2").await;
    bob.post_message("b2").await;

    let listed = alice.list().await;
    let texts: Vec<_> = listed.iter().map(|m| m["text"].as_str().unwrap()).collect();
    assert_eq!(texts, ["b2", "a2", "b1", "a1"]);

    for message in &listed {
        let text = message["text"].as_str().unwrap();
        let expected = if text.starts_with('a') { "alice" } else { "bob" };
        assert_eq!(message["username"], expected);
    }

    let stamps: Vec<_> = listed
        .iter()
        .map(|m| m["timestamp"].as_str().unwrap().parse::<chrono::DateTime<chrono::Utc>>().unwrap())
        .collect();
    assert!(stamps.windows(2).all(|pair| pair[0] >= pair[1]));
}

#[tokio::test]
async fn unknown_paths_are_not_found() {
    let app = app();
    let request = Request::builder().uri("/nope").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
