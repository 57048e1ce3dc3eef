use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use keywarden::config::Config;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn spawn_app() -> (Router, tempfile::TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());

    config.rate_limit.max_requests = 10_000;

    let state = keywarden::api::create_app_state(&config)
        .await
        .expect("Failed to create app state");
    let app = keywarden::api::router(state, &config.server.cors_allowed_origins);

    (app, dir)
}

fn test_config(data_dir: &std::path::Path) -> Config {
    let mut config = Config::default();
    config.general.data_dir = data_dir.to_path_buf();
    config
}

async fn post_json(app: &Router, path: &str, body: Value) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(path)
                .header("Content-Type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn get(app: &Router, path: &str) -> (StatusCode, Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn register(app: &Router, username: &str, email: &str) -> String {
    let (status, body) = post_json(
        app,
        "/register",
        json!({ "username": username, "password": "pass1234", "email": email }),
    )
    .await;

    assert_eq!(status, StatusCode::OK, "register failed: {body}");
    assert_eq!(body["success"], true);
    body["token"].as_str().unwrap().to_string()
}

async fn create_service(app: &Router, token: &str, name: &str) -> String {
    let (status, body) = post_json(app, "/addservice", json!({ "token": token, "name": name })).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    body["service"]["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn register_validation_runs_in_order() {
    let (app, _dir) = spawn_app().await;

    let (status, _) = post_json(
        &app,
        "/register",
        json!({ "username": "", "password": "", "email": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = post_json(
        &app,
        "/register",
        json!({ "username": "ab", "password": "pass1234", "email": "a@x.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["message"].as_str().unwrap().contains("Username"));

    let (status, _) = post_json(
        &app,
        "/register",
        json!({ "username": "alice", "password": "abc", "email": "a@x.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = post_json(
        &app,
        "/register",
        json!({ "username": "alice", "password": "pass1234", "email": "no-at-sign" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_registration_fails_case_insensitively() {
    let (app, _dir) = spawn_app().await;

    register(&app, "alice", "alice@x.com").await;

    let (status, body) = post_json(
        &app,
        "/register",
        json!({ "username": "ALICE", "password": "pass1234", "email": "other@x.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    let (status, _) = post_json(
        &app,
        "/register",
        json!({ "username": "bob", "password": "pass1234", "email": "Alice@X.com" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn login_invalidates_previous_session_token() {
    let (app, _dir) = spawn_app().await;

    let old_token = register(&app, "alice", "alice@x.com").await;

    let (status, _) = post_json(&app, "/verify-token", json!({ "token": old_token })).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/login",
        json!({ "username": "alice", "password": "pass1234" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_token = body["token"].as_str().unwrap().to_string();
    assert_ne!(old_token, new_token);

    // The old token no longer resolves; the new one does.
    let (status, _) = post_json(&app, "/verify-token", json!({ "token": old_token })).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = post_json(&app, "/verify-token", json!({ "token": new_token })).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["username"], "alice");
}

#[tokio::test]
async fn login_rejects_bad_credentials() {
    let (app, _dir) = spawn_app().await;

    register(&app, "alice", "alice@x.com").await;

    let (status, _) = post_json(
        &app,
        "/login",
        json!({ "username": "nobody", "password": "pass1234" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/login",
        json!({ "username": "alice", "password": "wrong" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn full_bind_mismatch_reset_rebind_cycle() {
    let (app, _dir) = spawn_app().await;

    let token = register(&app, "alice", "alice@x.com").await;
    let service_id = create_service(&app, &token, "MyApp").await;

    let (status, body) = post_json(
        &app,
        "/addkey",
        json!({ "token": token, "code": "ABC-123", "name": "k1", "serviceId": service_id }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["key"]["code"], "ABC-123");
    assert_eq!(body["key"]["hwid"], Value::Null);

    // First validation binds HWID H1.
    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H1&token={token}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    // Same device validates again.
    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H1&token={token}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    // A different device is rejected with the mismatch reason.
    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H2&token={token}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
    assert_eq!(body["reason"], "hwid_mismatch");

    // Reset, then the new device binds.
    let (status, body) = post_json(
        &app,
        "/reset-hwid",
        json!({ "token": token, "code": "ABC-123" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H2&token={token}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);

    let (_, keys) = get(&app, &format!("/keys?token={token}")).await;
    assert_eq!(keys[0]["hwid"], "H2");
    assert!(keys[0]["firstUsed"].is_string());
}

#[tokio::test]
async fn verify_gates_run_in_order() {
    let (app, _dir) = spawn_app().await;

    let alice = register(&app, "alice", "alice@x.com").await;
    let bob = register(&app, "bob", "bob@x.com").await;
    let service_id = create_service(&app, &alice, "MyApp").await;

    post_json(
        &app,
        "/addkey",
        json!({ "token": alice, "code": "ABC-123", "name": "k1", "serviceId": service_id }),
    )
    .await;

    // Missing parameters.
    let (status, body) = get(&app, "/verify?key=ABC-123&hwid=H1").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["valid"], false);

    // Unresolvable token.
    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H1&token=bogus&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["valid"], false);

    // Unknown key is a 200 with valid:false, not a 404.
    let (status, body) = get(
        &app,
        &format!("/verify?key=NOPE&hwid=H1&token={alice}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);

    // Someone else's key is forbidden before any HWID state is touched.
    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H1&token={bob}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["valid"], false);

    // Wrong service is forbidden regardless of binding state.
    let (status, body) = get(
        &app,
        &format!("/verify?key=ABC-123&hwid=H1&token={alice}&serviceId=other-service"),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["valid"], false);

    // None of the rejections bound the key.
    let (_, keys) = get(&app, &format!("/keys?token={alice}")).await;
    assert_eq!(keys[0]["hwid"], Value::Null);
}

#[tokio::test]
async fn expired_key_reports_valid_false_with_200() {
    let (app, _dir) = spawn_app().await;

    let token = register(&app, "alice", "alice@x.com").await;
    let service_id = create_service(&app, &token, "MyApp").await;

    let past = (chrono::Utc::now() - chrono::Duration::hours(1)).to_rfc3339();
    let (status, _) = post_json(
        &app,
        "/addkey",
        json!({
            "token": token,
            "code": "OLD-KEY",
            "name": "k1",
            "serviceId": service_id,
            "expirationDate": past,
        }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = get(
        &app,
        &format!("/verify?key=OLD-KEY&hwid=H1&token={token}&serviceId={service_id}"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);

    // An expired key never binds.
    let (_, keys) = get(&app, &format!("/keys?token={token}")).await;
    assert_eq!(keys[0]["hwid"], Value::Null);
}

#[tokio::test]
async fn duplicate_key_code_is_rejected() {
    let (app, _dir) = spawn_app().await;

    let token = register(&app, "alice", "alice@x.com").await;

    let (status, _) = post_json(
        &app,
        "/addkey",
        json!({ "token": token, "code": "ABC-123", "name": "k1" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/addkey",
        json!({ "token": token, "code": "ABC-123", "name": "k2" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // Missing name is also rejected, but only after the token check.
    let (status, _) = post_json(
        &app,
        "/addkey",
        json!({ "token": "bogus", "code": "X", "name": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(
        &app,
        "/addkey",
        json!({ "token": token, "code": "X", "name": "" }),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn deleting_a_service_cascades_only_its_keys() {
    let (app, _dir) = spawn_app().await;

    let token = register(&app, "alice", "alice@x.com").await;
    let svc_a = create_service(&app, &token, "AppA").await;
    let svc_b = create_service(&app, &token, "AppB").await;

    for (code, svc) in [("A-1", Some(&svc_a)), ("A-2", Some(&svc_a)), ("B-1", Some(&svc_b))] {
        let (status, _) = post_json(
            &app,
            "/addkey",
            json!({ "token": token, "code": code, "name": code, "serviceId": svc }),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }
    let (status, _) = post_json(
        &app,
        "/addkey",
        json!({ "token": token, "code": "FREE", "name": "unscoped" }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(
        &app,
        "/deleteservice",
        json!({ "token": token, "serviceId": svc_a }),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);

    let (_, keys) = get(&app, &format!("/keys?token={token}")).await;
    let codes: Vec<&str> = keys
        .as_array()
        .unwrap()
        .iter()
        .map(|k| k["code"].as_str().unwrap())
        .collect();
    assert_eq!(codes, vec!["B-1", "FREE"]);

    let (_, services) = get(&app, &format!("/services?token={token}")).await;
    assert_eq!(services.as_array().unwrap().len(), 1);
    assert_eq!(services[0]["name"], "AppB");
}

#[tokio::test]
async fn listings_are_scoped_and_require_a_token() {
    let (app, _dir) = spawn_app().await;

    let alice = register(&app, "alice", "alice@x.com").await;
    let bob = register(&app, "bob", "bob@x.com").await;
    let svc = create_service(&app, &alice, "MyApp").await;

    post_json(
        &app,
        "/addkey",
        json!({ "token": alice, "code": "A-1", "name": "k", "serviceId": svc }),
    )
    .await;
    post_json(
        &app,
        "/addkey",
        json!({ "token": alice, "code": "A-2", "name": "k" }),
    )
    .await;

    let (status, _) = get(&app, "/keys").await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, keys) = get(&app, &format!("/keys?token={bob}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys.as_array().unwrap().len(), 0);

    // The service filter excludes unscoped keys.
    let (_, keys) = get(&app, &format!("/keys?token={alice}&serviceId={svc}")).await;
    assert_eq!(keys.as_array().unwrap().len(), 1);
    assert_eq!(keys[0]["code"], "A-1");
}

#[tokio::test]
async fn delete_and_reset_reject_foreign_keys() {
    let (app, _dir) = spawn_app().await;

    let alice = register(&app, "alice", "alice@x.com").await;
    let bob = register(&app, "bob", "bob@x.com").await;

    post_json(
        &app,
        "/addkey",
        json!({ "token": alice, "code": "A-1", "name": "k" }),
    )
    .await;

    let (status, _) = post_json(&app, "/deletekey", json!({ "token": bob, "code": "A-1" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post_json(&app, "/reset-hwid", json!({ "token": bob, "code": "A-1" })).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = post_json(&app, "/deletekey", json!({ "token": alice, "code": "A-1" })).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn ping_and_status_are_public() {
    let (app, _dir) = spawn_app().await;

    let (status, body) = get(&app, "/ping").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "online");

    let token = register(&app, "alice", "alice@x.com").await;
    create_service(&app, &token, "MyApp").await;
    post_json(
        &app,
        "/addkey",
        json!({ "token": token, "code": "A-1", "name": "k" }),
    )
    .await;

    let (status, body) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["users"], 1);
    assert_eq!(body["services"], 1);
    assert_eq!(body["keys"], 1);
}

#[tokio::test]
async fn malformed_bodies_get_a_structured_error() {
    let (app, _dir) = spawn_app().await;

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/register")
                .header("Content-Type", "application/json")
                .body(Body::from("{not valid json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("rejection body must be JSON");
    assert_eq!(body["success"], false);
    assert!(body["message"].is_string());

    // An empty body is rejected the same way.
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/login")
                .header("Content-Type", "application/json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).expect("rejection body must be JSON");
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn unknown_paths_return_json_404() {
    let (app, _dir) = spawn_app().await;

    let (status, body) = get(&app, "/no-such-endpoint").await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "404");
}

#[tokio::test]
async fn state_survives_a_restart() {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(dir.path());

    let token = {
        let state = keywarden::api::create_app_state(&config).await.unwrap();
        let app = keywarden::api::router(state, &config.server.cors_allowed_origins);

        let token = register(&app, "alice", "alice@x.com").await;
        let svc = create_service(&app, &token, "MyApp").await;
        post_json(
            &app,
            "/addkey",
            json!({ "token": token, "code": "A-1", "name": "k", "serviceId": svc }),
        )
        .await;
        token
    };

    // A fresh app over the same data dir sees the same records.
    let state = keywarden::api::create_app_state(&config).await.unwrap();
    let app = keywarden::api::router(state, &config.server.cors_allowed_origins);

    let (status, body) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["users"], 1);
    assert_eq!(body["keys"], 1);

    let (status, keys) = get(&app, &format!("/keys?token={token}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(keys[0]["code"], "A-1");
}

#[tokio::test]
async fn requests_over_the_window_limit_get_429() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = test_config(dir.path());
    config.rate_limit.max_requests = 3;

    let state = keywarden::api::create_app_state(&config).await.unwrap();
    let app = keywarden::api::router(state, &config.server.cors_allowed_origins);

    // Without ConnectInfo every oneshot request shares the "unknown" bucket.
    for _ in 0..3 {
        let (status, _) = get(&app, "/ping").await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, body) = get(&app, "/ping").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(body["success"], false);

    // The throttle is path-independent.
    let (status, _) = get(&app, "/status").await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
}
