//! End-to-end tests of the server pipeline over real sockets.

use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, WWW_AUTHENTICATE};
use reqwest::StatusCode;
use serde_json::{json, Value};

use json_rest::actions::{ActionCatalog, ActionError};
use json_rest::auth::Credential;
use json_rest::codec::{self, Encoding};
use json_rest::config::{RouteConfig, ServerConfig, UserCheck};
use json_rest::http::X_REQUEST_ID;

mod common;

use common::{route, start_demo_server, start_server, TEST1_SECRET, TEST2_SECRET};

fn basic(name: &str, secret: &str) -> String {
    Credential::new(name, secret).to_basic()
}

async fn post_raw(
    url: &str,
    body: Vec<u8>,
    encoding: Option<&str>,
    auth: Option<String>,
) -> reqwest::Response {
    let mut request = reqwest::Client::new()
        .post(url)
        .header("content-type", "application/json")
        .body(body);
    if let Some(encoding) = encoding {
        request = request.header(CONTENT_ENCODING, encoding);
    }
    if let Some(auth) = auth {
        request = request.header(AUTHORIZATION, auth);
    }
    request.send().await.unwrap()
}

async fn json_body(response: reqwest::Response) -> Value {
    let encoding = response
        .headers()
        .get(CONTENT_ENCODING)
        .map(|v| v.to_str().unwrap().to_string());
    let bytes = response.bytes().await.unwrap();
    let encoding = Encoding::from_header(encoding.as_deref()).unwrap();
    codec::decode(&bytes, encoding, usize::MAX).unwrap().value
}

#[tokio::test]
async fn test_authorized_user_gets_annotated_reply() {
    let server = start_demo_server(false).await;

    let response = post_raw(
        &server.url("/cs/test/1/"),
        br#"{"x":1}"#.to_vec(),
        None,
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(X_REQUEST_ID));
    assert!(response.headers().get(CONTENT_ENCODING).is_none());
    assert_eq!(
        json_body(response).await,
        json!({"x": 1, "result": "THIS IS ADDED IN TEST1!"})
    );
}

#[tokio::test]
async fn test_user_outside_route_list_is_rejected() {
    let server = start_demo_server(false).await;

    let response = post_raw(
        &server.url("/cs/test/2/"),
        br#"{"x":1}"#.to_vec(),
        None,
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"code": 401, "message": "INVALID USER"})
    );

    // The route's own user still gets through.
    let response = post_raw(
        &server.url("/cs/test/2/"),
        b"{}".to_vec(),
        None,
        Some(basic("test2", TEST2_SECRET)),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = start_demo_server(false).await;

    let response = post_raw(
        &server.url("/cs/test/3/"),
        b"{}".to_vec(),
        Some("gzip"),
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    assert_eq!(json_body(response).await, json!({"code": 404}));
}

#[tokio::test]
async fn test_bad_credentials_get_challenge() {
    let server = start_demo_server(false).await;

    for auth in [None, Some(basic("test1", "wrong")), Some("Bearer abc".to_string())] {
        let response = post_raw(&server.url("/cs/test/1/"), b"{}".to_vec(), None, auth).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[WWW_AUTHENTICATE],
            "Basic realm=\"townsville\""
        );
        assert_eq!(json_body(response).await, json!({"code": 401}));
    }
}

#[tokio::test]
async fn test_gzip_request_gets_gzip_reply() {
    let server = start_demo_server(false).await;
    let body = codec::encode(&json!({"x": 2}), Encoding::Gzip).unwrap();

    let response = post_raw(
        &server.url("/cs/test/1/"),
        body,
        Some("gzip"),
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_ENCODING], "gzip");
    assert_eq!(
        json_body(response).await,
        json!({"x": 2, "result": "THIS IS ADDED IN TEST1!"})
    );
}

#[tokio::test]
async fn test_raw_deflate_request_gets_raw_deflate_reply() {
    let server = start_demo_server(false).await;
    let body = codec::encode(&json!({"x": 3}), Encoding::DeflateRaw).unwrap();

    let response = post_raw(
        &server.url("/cs/test/1/"),
        body,
        Some("deflate"),
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_ENCODING], "deflate");
    let bytes = response.bytes().await.unwrap();

    // Not zlib framed: a deflate decode only succeeds through the raw fallback.
    let decoded = codec::decode(&bytes, Encoding::Deflate, usize::MAX).unwrap();
    assert_eq!(decoded.encoding, Encoding::DeflateRaw);
    assert_eq!(
        decoded.value,
        json!({"x": 3, "result": "THIS IS ADDED IN TEST1!"})
    );
}

#[tokio::test]
async fn test_zlib_request_gets_zlib_reply() {
    let server = start_demo_server(false).await;
    let body = codec::encode(&json!({"x": 4}), Encoding::Deflate).unwrap();

    let response = post_raw(
        &server.url("/cs/test/1/"),
        body,
        Some("deflate"),
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    let bytes = response.bytes().await.unwrap();
    let decoded = codec::decode(&bytes, Encoding::Deflate, usize::MAX).unwrap();
    assert_eq!(decoded.encoding, Encoding::Deflate);
}

#[tokio::test]
async fn test_unsupported_encoding_replied_uncompressed() {
    let server = start_demo_server(true).await;

    let response = post_raw(
        &server.url("/cs/test/1/"),
        b"{}".to_vec(),
        Some("br"),
        Some(basic("test1", TEST1_SECRET)),
    )
    .await;

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(response.headers().get(CONTENT_ENCODING).is_none());
    assert_eq!(
        json_body(response).await,
        json!({"code": 400, "message": "unsupported content encoding: br"})
    );
}

#[tokio::test]
async fn test_malformed_payloads() {
    let server = start_demo_server(false).await;

    let cases: Vec<(Vec<u8>, Option<&str>)> = vec![
        (b"{not json".to_vec(), None),
        (b"not gzip at all".to_vec(), Some("gzip")),
        (b"not deflate at all".to_vec(), Some("deflate")),
    ];
    for (body, encoding) in cases {
        let response = post_raw(
            &server.url("/cs/test/1/"),
            body,
            encoding,
            Some(basic("test1", TEST1_SECRET)),
        )
        .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{:?}", encoding);
    }
}

#[tokio::test]
async fn test_oversized_body_is_413() {
    let config = ServerConfig {
        max_body_size: 16,
        ..Default::default()
    };
    let server = start_server(
        config,
        vec![route("/echo/", &[], "echo", Value::Null)],
        ActionCatalog::with_builtins(),
    )
    .await;

    let big = serde_json::to_vec(&json!({"padding": "x".repeat(64)})).unwrap();
    let response = post_raw(&server.url("/echo/"), big, None, None).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await, json!({"code": 413}));
}

#[tokio::test]
async fn test_inflated_body_over_limit_is_413() {
    let config = ServerConfig {
        max_body_size: 16 * 1024,
        ..Default::default()
    };
    let server = start_server(
        config,
        vec![route("/echo/", &[], "echo", Value::Null)],
        ActionCatalog::with_builtins(),
    )
    .await;

    let padded = json!({"padding": " ".repeat(1 << 20)});
    let body = codec::encode(&padded, Encoding::Gzip).unwrap();
    assert!(body.len() < 16 * 1024);

    let response = post_raw(&server.url("/echo/"), body, Some("gzip"), None).await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(json_body(response).await, json!({"code": 413}));
}

fn failing_catalog() -> ActionCatalog {
    let mut catalog = ActionCatalog::new();
    catalog.register_fn("bad", |_| async {
        Err::<Value, _>(ActionError::BadRequest("missing field x".into()))
    });
    catalog.register_fn("missing", |_| async {
        Err::<Value, _>(ActionError::NotFound("no such item".into()))
    });
    catalog.register_fn("broken", |_| async {
        Err::<Value, _>(ActionError::Internal("database down".into()))
    });
    catalog.register_fn("other", |_| async {
        Err::<Value, _>(ActionError::Unavailable("try later".into()))
    });
    catalog
}

fn failing_routes() -> Vec<RouteConfig> {
    ["bad", "missing", "broken", "other", "unregistered"]
        .iter()
        .map(|action| route(&format!("/{}/", action), &[], action, Value::Null))
        .collect()
}

#[tokio::test]
async fn test_handler_errors_with_causes() {
    let config = ServerConfig {
        expose_cause: true,
        ..Default::default()
    };
    let server = start_server(config, failing_routes(), failing_catalog()).await;

    let expected = [
        ("/bad/", 400, Some("missing field x")),
        ("/missing/", 404, Some("no such item")),
        ("/broken/", 500, Some("database down")),
        ("/other/", 503, Some("try later")),
        ("/unregistered/", 503, Some("no action registered as 'unregistered'")),
    ];
    for (path, code, message) in expected {
        let response = post_raw(&server.url(path), b"{}".to_vec(), None, None).await;
        assert_eq!(response.status().as_u16(), code, "{}", path);
        let mut envelope = json!({"code": code});
        if let Some(message) = message {
            envelope["message"] = json!(message);
        }
        assert_eq!(json_body(response).await, envelope, "{}", path);
    }
}

#[tokio::test]
async fn test_handler_errors_without_causes() {
    let server = start_server(ServerConfig::default(), failing_routes(), failing_catalog()).await;

    for (path, code) in [("/bad/", 400), ("/missing/", 404), ("/broken/", 500), ("/other/", 503)] {
        let response = post_raw(&server.url(path), b"{}".to_vec(), None, None).await;
        assert_eq!(response.status().as_u16(), code);
        assert_eq!(json_body(response).await, json!({"code": code}));
    }
}

#[tokio::test]
async fn test_header_user_check_without_authenticator() {
    let config = ServerConfig {
        user_check: UserCheck::Header,
        ..Default::default()
    };
    let server = start_server(
        config,
        vec![route("/guarded/", &["test1"], "echo", Value::Null)],
        ActionCatalog::with_builtins(),
    )
    .await;

    // Any secret passes, only the name is checked.
    let response = post_raw(
        &server.url("/guarded/"),
        b"[1,2]".to_vec(),
        None,
        Some(basic("test1", "anything")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!([1, 2]));

    let response = post_raw(
        &server.url("/guarded/"),
        b"{}".to_vec(),
        None,
        Some(basic("test2", "anything")),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        json_body(response).await,
        json!({"code": 401, "message": "INVALID USER"})
    );
}

#[tokio::test]
async fn test_route_reload_while_running() {
    let server = start_demo_server(false).await;
    let auth = Some(basic("test1", TEST1_SECRET));

    let response = post_raw(&server.url("/cs/test/9/"), b"{}".to_vec(), None, auth.clone()).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let mut routes = common::demo_routes();
    routes.push(route("/cs/test/9/", &["test1"], "echo", Value::Null));
    server.handle.reload_routes(routes);

    let response = post_raw(&server.url("/cs/test/9/"), br#"{"late":true}"#.to_vec(), None, auth).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await, json!({"late": true}));
}

#[tokio::test]
async fn test_caller_request_id_is_echoed() {
    let server = start_demo_server(false).await;

    let response = reqwest::Client::new()
        .post(server.url("/cs/test/1/"))
        .header(X_REQUEST_ID, "req-42")
        .header(AUTHORIZATION, basic("test1", TEST1_SECRET))
        .body("{}")
        .send()
        .await
        .unwrap();

    assert_eq!(response.headers()[X_REQUEST_ID], "req-42");
}
