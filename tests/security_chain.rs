//! Security chain behaviour, driven in-process with `oneshot`.

mod common;

use axum::{
    body::Body,
    extract::Request,
    http::{header, HeaderMap, StatusCode},
    Json, Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use gatekeeper::config::schema::{AccessKind, GatekeeperConfig, RuleConfig};
use gatekeeper::security::chain::{self, SecurityChain};
use gatekeeper::security::principal::Principal;

/// Echo what the chain let through: the (possibly rewritten) URI and the principal.
async fn echo(request: Request) -> Json<Value> {
    let subject = request
        .extensions()
        .get::<Principal>()
        .map(|p| p.subject().to_string());
    Json(json!({
        "path": request.uri().path(),
        "query": request.uri().query(),
        "subject": subject,
    }))
}

fn app(config: &GatekeeperConfig) -> Router {
    let shared = SecurityChain::from_config(config).unwrap().into_shared();
    chain::apply(Router::new().fallback(echo), shared)
}

struct Reply {
    status: StatusCode,
    headers: HeaderMap,
    body: Value,
}

async fn send(app: &Router, method: &str, uri: &str, token: Option<&str>) -> Reply {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let response = app
        .clone()
        .oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply { status, headers, body }
}

fn challenge(reply: &Reply) -> &str {
    reply.headers[header::WWW_AUTHENTICATE].to_str().unwrap()
}

#[tokio::test]
async fn test_public_paths_continue_without_token() {
    let config = common::test_config(None);
    let app = app(&config);

    for (method, path) in [
        ("GET", "/app/main.js"),
        ("GET", "/i18n/en/global.json"),
        ("GET", "/index.html"),
        ("GET", "/main.js"),
        ("GET", "/favicon.ico"),
        ("GET", "/swagger-ui/index.html"),
        ("POST", "/api/authenticate"),
        ("GET", "/api/authenticate"),
        ("GET", "/management/health"),
        ("GET", "/management/health/readiness"),
        ("GET", "/management/info"),
        ("GET", "/management/prometheus"),
    ] {
        let reply = send(&app, method, path, None).await;
        assert_eq!(reply.status, StatusCode::OK, "{} {}", method, path);
        assert_eq!(reply.body["subject"], Value::Null);
    }
}

#[tokio::test]
async fn test_public_paths_ignore_bad_tokens() {
    let config = common::test_config(None);
    let app = app(&config);

    let expired = common::expired_token(&config, "alice");
    let foreign = common::foreign_token("mallory");
    for token in ["not-a-jwt", expired.as_str(), foreign.as_str()] {
        let reply = send(&app, "GET", "/management/health", Some(token)).await;
        assert_eq!(reply.status, StatusCode::OK);
        assert_eq!(reply.body["subject"], Value::Null);
    }
}

#[tokio::test]
async fn test_protected_api_requires_authentication() {
    let config = common::test_config(None);
    let app = app(&config);

    let reply = send(&app, "GET", "/api/account", None).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(challenge(&reply), "Bearer");
    assert_eq!(reply.body["status"], 401);
    assert_eq!(reply.body["path"], "/api/account");

    let token = common::token(&config, "alice", &["ROLE_USER"]);
    let reply = send(&app, "GET", "/api/account", Some(&token)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["subject"], "alice");
}

#[tokio::test]
async fn test_admin_api_requires_admin_authority() {
    let config = common::test_config(None);
    let app = app(&config);

    let user = common::token(&config, "alice", &["ROLE_USER"]);
    let reply = send(&app, "DELETE", "/api/admin/users/bob", Some(&user)).await;
    assert_eq!(reply.status, StatusCode::FORBIDDEN);
    assert_eq!(
        challenge(&reply),
        "Bearer error=\"insufficient_scope\", \
         error_description=\"The request requires higher privileges than provided by the access token.\", \
         error_uri=\"https://tools.ietf.org/html/rfc6750#section-3.1\""
    );

    let admin = common::token(&config, "root", &["ROLE_ADMIN", "ROLE_USER"]);
    let reply = send(&app, "DELETE", "/api/admin/users/bob", Some(&admin)).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["subject"], "root");
}

#[tokio::test]
async fn test_management_namespace() {
    let config = common::test_config(None);
    let app = app(&config);

    assert_eq!(send(&app, "GET", "/management/env", None).await.status, StatusCode::UNAUTHORIZED);

    let user = common::token(&config, "alice", &["ROLE_USER"]);
    assert_eq!(send(&app, "GET", "/management/rules", Some(&user)).await.status, StatusCode::FORBIDDEN);

    let admin = common::token(&config, "root", &["ROLE_ADMIN"]);
    assert_eq!(send(&app, "GET", "/management/rules", Some(&admin)).await.status, StatusCode::OK);
    assert_eq!(
        send(&app, "GET", "/v3/api-docs/default", Some(&user)).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_rejected_tokens_get_invalid_token_challenge() {
    let config = common::test_config(None);
    let app = app(&config);

    let expired = common::expired_token(&config, "alice");
    let reply = send(&app, "GET", "/api/account", Some(&expired)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert_eq!(
        challenge(&reply),
        "Bearer error=\"invalid_token\", error_description=\"Jwt expired\", \
         error_uri=\"https://tools.ietf.org/html/rfc6750#section-3.1\""
    );

    let foreign = common::foreign_token("mallory");
    let reply = send(&app, "GET", "/api/admin/users", Some(&foreign)).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(challenge(&reply).contains("error=\"invalid_token\""));

    let reply = send(&app, "GET", "/api/account", Some("a b")).await;
    assert_eq!(reply.status, StatusCode::UNAUTHORIZED);
    assert!(challenge(&reply).contains("Bearer token is malformed"));
}

#[tokio::test]
async fn test_other_schemes_are_anonymous() {
    let config = common::test_config(None);
    let app = app(&config);

    let request = Request::builder()
        .uri("/api/account")
        .header(header::AUTHORIZATION, "Basic YWxpY2U6c2VjcmV0")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers()[header::WWW_AUTHENTICATE], "Bearer");
}

#[tokio::test]
async fn test_security_headers_on_every_outcome() {
    let config = common::test_config(None);
    let app = app(&config);
    let user = common::token(&config, "alice", &["ROLE_USER"]);

    let ok = send(&app, "GET", "/management/health", None).await;
    let unauthorized = send(&app, "GET", "/api/account", None).await;
    let forbidden = send(&app, "GET", "/api/admin/users", Some(&user)).await;
    let rejected = send(&app, "GET", "/api;x=1/account", None).await;

    for reply in [&ok, &unauthorized, &forbidden, &rejected] {
        assert_eq!(reply.headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
        assert_eq!(reply.headers[header::X_CONTENT_TYPE_OPTIONS], "nosniff");
        assert_eq!(reply.headers[header::REFERRER_POLICY], "strict-origin-when-cross-origin");
        assert_eq!(reply.headers[header::X_XSS_PROTECTION], "0");
        assert!(reply.headers[header::CONTENT_SECURITY_POLICY]
            .to_str()
            .unwrap()
            .starts_with("default-src 'self'"));
        assert!(reply.headers.contains_key("permissions-policy"));
        assert_eq!(reply.headers[header::CACHE_CONTROL], "no-cache, no-store, max-age=0, must-revalidate");
        assert_eq!(reply.headers[header::PRAGMA], "no-cache");
        assert!(!reply.headers.contains_key(header::STRICT_TRANSPORT_SECURITY));
        assert!(!reply.headers.contains_key(header::SET_COOKIE));
    }
}

#[tokio::test]
async fn test_firewall_rejects_traversal() {
    let config = common::test_config(None);
    let app = app(&config);
    let admin = common::token(&config, "root", &["ROLE_ADMIN"]);

    for path in ["/api;jsessionid=1/admin", "/app/%2e%2e/api/admin", "/api//admin/users", "/app/../api/admin"] {
        let reply = send(&app, "GET", path, Some(&admin)).await;
        assert_eq!(reply.status, StatusCode::BAD_REQUEST, "{}", path);
        assert_eq!(reply.body["status"], 400);
    }
}

#[tokio::test]
async fn test_client_routes_forward_to_index() {
    let config = common::test_config(None);
    let app = app(&config);

    let reply = send(&app, "GET", "/admin/users?page=2", None).await;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.body["path"], "/index.html");
    assert_eq!(reply.body["query"], "page=2");

    let reply = send(&app, "GET", "/", None).await;
    assert_eq!(reply.body["path"], "/index.html");
}

#[tokio::test]
async fn test_shadowed_account_endpoints_require_authentication() {
    let config = common::test_config(None);
    let app = app(&config);

    for path in ["/api/register", "/api/activate", "/api/account/reset-password/init"] {
        let reply = send(&app, "POST", path, None).await;
        assert_eq!(reply.status, StatusCode::UNAUTHORIZED, "{}", path);
    }
}

#[tokio::test]
async fn test_unmatched_requests_are_denied() {
    let config = common::test_config(None);
    let app = app(&config);

    assert_eq!(send(&app, "GET", "/docs/readme.md", None).await.status, StatusCode::UNAUTHORIZED);

    let admin = common::token(&config, "root", &["ROLE_ADMIN"]);
    assert_eq!(
        send(&app, "GET", "/docs/readme.md", Some(&admin)).await.status,
        StatusCode::FORBIDDEN
    );
}

#[tokio::test]
async fn test_first_declared_rule_wins() {
    let mut config = common::test_config(None);
    config.authorization.rules = Some(vec![
        RuleConfig {
            patterns: vec!["/api/**".into()],
            method: None,
            access: AccessKind::PermitAll,
            authorities: vec![],
        },
        RuleConfig {
            patterns: vec!["/api/admin/**".into()],
            method: None,
            access: AccessKind::HasAuthority,
            authorities: vec!["ROLE_ADMIN".into()],
        },
    ]);
    let app = app(&config);

    assert_eq!(send(&app, "GET", "/api/admin/users", None).await.status, StatusCode::OK);
    assert_eq!(
        SecurityChain::from_config(&config).unwrap().rules().shadowed_rules(),
        vec![1]
    );
}

async fn send_with_origin(app: &Router, method: &str, uri: &str, origin: &str) -> Reply {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::HOST, "gateway.local")
        .header(header::ORIGIN, origin)
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
        .body(Body::empty())
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();

    let status = response.status();
    let headers = response.headers().clone();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    Reply { status, headers, body }
}

#[tokio::test]
async fn test_cross_origin_requests_refused_without_allowed_origins() {
    let config = common::test_config(None);
    let app = app(&config);

    for (method, path) in [("GET", "/management/health"), ("OPTIONS", "/api/account")] {
        let reply = send_with_origin(&app, method, path, "http://evil.example").await;
        assert_eq!(reply.status, StatusCode::FORBIDDEN, "{} {}", method, path);
        assert_eq!(reply.body["detail"], "Invalid CORS request");
        assert!(!reply.headers.contains_key(header::WWW_AUTHENTICATE));
        assert_eq!(reply.headers[header::X_FRAME_OPTIONS], "SAMEORIGIN");
    }

    let reply = send_with_origin(&app, "GET", "/management/health", "http://gateway.local").await;
    assert_eq!(reply.status, StatusCode::OK);
}

#[tokio::test]
async fn test_allowed_origins_lift_same_origin_refusal() {
    let mut config = common::test_config(None);
    config.cors.allowed_origins = vec!["http://localhost:9000".into()];
    let app = app(&config);

    let reply = send_with_origin(&app, "GET", "/management/health", "http://evil.example").await;
    assert_eq!(reply.status, StatusCode::OK);
}
