use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;
use uuid::Uuid;

use encrypted_storage_server::{
    auth::JwtService,
    config::Config,
    create_app,
    handlers::AppState,
    services::{
        catalog::MemoryFileCatalog,
        quota::MemoryQuotaLedger,
        users::{MemoryUserStore, UserStore},
        FileService,
    },
    storage::{memory::MemoryStore, UrlSigner},
};

const BOUNDARY: &str = "test-boundary-7MA4YWxkTrZu0gW";

fn test_config() -> Config {
    Config {
        database_url: String::new(),
        host: "127.0.0.1".to_string(),
        port: 0,
        jwt_secret: "integration-test-secret".to_string(),
        jwt_expiration_minutes: 60,
        max_file_size_mb: 1,
        default_storage_limit_gb: 1,
        storage_dir: String::new(),
        public_base_url: "http://localhost:8000".to_string(),
        signed_url_ttl_secs: 300,
        url_signing_secret: "integration-signing-secret".to_string(),
        storage_op_timeout_secs: 5,
    }
}

struct TestApp {
    router: Router,
    state: AppState,
}

fn test_app() -> TestApp {
    let config = test_config();

    let users = Arc::new(MemoryUserStore::new());
    let ledger = Arc::new(MemoryQuotaLedger::new(users.users_handle()));
    let catalog = Arc::new(MemoryFileCatalog::new());
    let signer = UrlSigner::new(&config.url_signing_secret);
    let store = Arc::new(MemoryStore::new(&config.public_base_url, signer.clone()));

    let files = FileService::new(
        catalog,
        ledger,
        store.clone(),
        config.max_file_size_mb,
        config.signed_url_ttl_secs,
        config.storage_op_timeout_secs,
    );
    let jwt = Arc::new(JwtService::new(
        &config.jwt_secret,
        config.jwt_expiration_minutes,
    ));

    let state = AppState {
        config,
        users,
        files,
        store,
        jwt,
        signer,
    };

    TestApp {
        router: create_app(state.clone()),
        state,
    }
}

/// Seeds an account directly and mints its token, skipping the bcrypt work
/// the register/login flow would do.
async fn seed_user(state: &AppState, email: &str, limit: i64) -> (Uuid, String) {
    let user = state
        .users
        .create(email, "stored-server-hash", "client-salt-16ch", limit)
        .await
        .unwrap();
    let token = state.jwt.generate_token(user.id, &user.email).unwrap();
    (user.id, token)
}

async fn json_body(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn multipart_upload_body(declared_size: i64, bytes: &[u8]) -> Vec<u8> {
    let metadata = json!({
        "encrypted_size": "c2l6ZQ",
        "encrypted_type": "dHlwZQ",
        "encrypted_original_name": "bmFtZQ"
    })
    .to_string();

    let size = declared_size.to_string();
    let mut body = Vec::new();
    for (name, value) in [
        ("encrypted_filename", "ZW5jcnlwdGVkLWZpbGVuYW1l"),
        ("encrypted_metadata", metadata.as_str()),
        ("file_size", size.as_str()),
    ] {
        body.extend_from_slice(
            format!(
                "--{}\r\nContent-Disposition: form-data; name=\"{}\"\r\n\r\n{}\r\n",
                BOUNDARY, name, value
            )
            .as_bytes(),
        );
    }
    body.extend_from_slice(
        format!(
            "--{}\r\nContent-Disposition: form-data; name=\"file\"; filename=\"blob\"\r\n\
             Content-Type: application/octet-stream\r\n\r\n",
            BOUNDARY
        )
        .as_bytes(),
    );
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{}--\r\n", BOUNDARY).as_bytes());
    body
}

fn upload_request(token: &str, declared_size: i64, bytes: &[u8]) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/files/upload")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(multipart_upload_body(declared_size, bytes)))
        .unwrap()
}

fn get_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn delete_request(uri: &str, token: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health/live")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/health/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_salt_login_flow() {
    let app = test_app();
    let password_hash = "0123456789abcdef0123456789abcdef0123456789abcdef";
    let salt = "fedcba9876543210";

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": "alice@example.com",
                        "password_hash": password_hash,
                        "salt": salt
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    assert!(body["data"]["access_token"].as_str().is_some());
    assert_eq!(body["data"]["user"]["storage_used"], 0);

    // The client can fetch its salt before logging in.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/salt?email=alice@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["salt"], salt);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/login")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": "alice@example.com",
                        "password_hash": password_hash
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let token = body["data"]["access_token"].as_str().unwrap();

    // Issued token is accepted by a protected endpoint.
    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/auth/verify", token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_register_input_validation() {
    let app = test_app();

    let cases = [
        json!({"email": "no-at-sign", "password_hash": "0123456789abcdef0123456789abcdef", "salt": "fedcba9876543210"}),
        json!({"email": "a@example.com", "password_hash": "short", "salt": "fedcba9876543210"}),
        json!({"email": "a@example.com", "password_hash": "0123456789abcdef0123456789abcdef", "salt": "short"}),
    ];

    for payload in cases {
        let response = app
            .router
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/auth/register")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(payload.to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_duplicate_registration_conflicts() {
    let app = test_app();
    let payload = json!({
        "email": "dup@example.com",
        "password_hash": "0123456789abcdef0123456789abcdef",
        "salt": "fedcba9876543210"
    })
    .to_string();

    let first = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload.clone()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::CREATED);

    let second = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(payload))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(second.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_password_change_rotates_credentials() {
    let app = test_app();
    let old_hash = "0123456789abcdef0123456789abcdef";
    let new_hash = "fedcba9876543210fedcba9876543210";

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/v1/auth/register")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "email": "rotate@example.com",
                        "password_hash": old_hash,
                        "salt": "fedcba9876543210"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    // Wrong current hash is rejected before anything changes.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/v1/user/password")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "old_password_hash": "00000000000000000000000000000000",
                        "new_password_hash": new_hash,
                        "new_salt": "0123456789abcdef"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .method("PATCH")
                .uri("/api/v1/user/password")
                .header(header::AUTHORIZATION, format!("Bearer {}", token))
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(
                    json!({
                        "old_password_hash": old_hash,
                        "new_password_hash": new_hash,
                        "new_salt": "0123456789abcdef"
                    })
                    .to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // The new salt is what pre-login lookup now hands out.
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/salt?email=rotate@example.com")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["salt"], "0123456789abcdef");

    // Old credentials no longer log in; new ones do.
    let login = |hash: &str| {
        Request::builder()
            .method("POST")
            .uri("/api/v1/auth/login")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(
                json!({
                    "email": "rotate@example.com",
                    "password_hash": hash
                })
                .to_string(),
            ))
            .unwrap()
    };

    let response = app.router.clone().oneshot(login(old_hash)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app.router.clone().oneshot(login(new_hash)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_protected_routes_require_token() {
    let app = test_app();

    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/v1/files")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/files", "garbage-token"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_upload_list_download_delete_flow() {
    let app = test_app();
    let (_, token) = seed_user(&app.state, "flow@example.com", 10_000).await;
    let payload = vec![0x5A; 64];

    // Upload.
    let response = app
        .router
        .clone()
        .oneshot(upload_request(&token, 64, &payload))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let body = json_body(response).await;
    let file_id = body["data"]["id"].as_str().unwrap().to_string();

    // Listed once.
    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/files", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 1);
    assert_eq!(body["data"]["files"][0]["file_size"], 64);

    // Metadata by id.
    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/files/{}", file_id), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Download URL, then fetch the ciphertext through the signed route.
    let response = app
        .router
        .clone()
        .oneshot(get_request(
            &format!("/api/v1/files/{}/download", file_id),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    let url = body["data"]["download_url"].as_str().unwrap();
    let uri = url.strip_prefix("http://localhost:8000").unwrap();

    let response = app
        .router
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let served = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(served.as_ref(), payload.as_slice());

    // Soft delete: gone from listings, still billed.
    let response = app
        .router
        .clone()
        .oneshot(delete_request(&format!("/api/v1/files/{}", file_id), &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/files", &token))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["pagination"]["total"], 0);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/user/storage", &token))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["used"], 64);

    // Permanent delete releases the quota.
    let response = app
        .router
        .clone()
        .oneshot(delete_request(
            &format!("/api/v1/files/{}/permanent", file_id),
            &token,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/user/storage", &token))
        .await
        .unwrap();
    let body = json_body(response).await;
    assert_eq!(body["data"]["used"], 0);
}

#[tokio::test]
async fn test_upload_over_quota_is_payment_required() {
    let app = test_app();
    let (_, token) = seed_user(&app.state, "small@example.com", 10).await;

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&token, 100, &[1u8; 8]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYMENT_REQUIRED);
}

#[tokio::test]
async fn test_foreign_file_is_not_found() {
    let app = test_app();
    let (_, owner_token) = seed_user(&app.state, "owner@example.com", 10_000).await;
    let (_, other_token) = seed_user(&app.state, "other@example.com", 10_000).await;

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&owner_token, 16, &[2u8; 16]))
        .await
        .unwrap();
    let body = json_body(response).await;
    let file_id = body["data"]["id"].as_str().unwrap().to_string();

    let response = app
        .router
        .clone()
        .oneshot(get_request(&format!("/api/v1/files/{}", file_id), &other_token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_signed_url_rejects_tampering_and_expiry() {
    let app = test_app();
    let (user_id, token) = seed_user(&app.state, "signed@example.com", 10_000).await;

    let response = app
        .router
        .clone()
        .oneshot(upload_request(&token, 16, &[3u8; 16]))
        .await
        .unwrap();
    let body = json_body(response).await;
    let file_id = body["data"]["id"].as_str().unwrap();
    let path = format!("{}/{}.enc", user_id, file_id);

    // Valid signature, expiry in the past.
    let expired_at = chrono::Utc::now().timestamp() - 60;
    let signature = app.state.signer.sign(&path, expired_at);
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/storage/{}?expires={}&signature={}",
                    path, expired_at, signature
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    // Live expiry, wrong signature.
    let live_at = chrono::Utc::now().timestamp() + 300;
    let response = app
        .router
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!(
                    "/storage/{}?expires={}&signature={}",
                    path, live_at, "AAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA"
                ))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_user_profile_reflects_uploads() {
    let app = test_app();
    let (_, token) = seed_user(&app.state, "profile@example.com", 1_000).await;

    app.router
        .clone()
        .oneshot(upload_request(&token, 250, &[4u8; 32]))
        .await
        .unwrap();

    let response = app
        .router
        .clone()
        .oneshot(get_request("/api/v1/user/profile", &token))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = json_body(response).await;
    assert_eq!(body["data"]["email"], "profile@example.com");
    assert_eq!(body["data"]["storage_used"], 250);
    assert_eq!(body["data"]["storage_limit"], 1_000);
    assert_eq!(body["data"]["total_files"], 1);
    assert_eq!(body["data"]["storage_percentage"], 25.0);
}
