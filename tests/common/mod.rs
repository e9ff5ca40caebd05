//! Shared utilities for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::time::Duration;

use serde_json::json;
use tokio::net::TcpListener;

use json_rest::actions::ActionCatalog;
use json_rest::auth::password_digest;
use json_rest::config::{AuthConfig, RouteConfig, ServerConfig};
use json_rest::http::{JsonRestServer, ServerHandle};
use json_rest::lifecycle::Shutdown;

pub const REALM: &str = "townsville";
pub const TEST1_SECRET: &str = "pw1";
pub const TEST2_SECRET: &str = "pw2";

/// A running server; dropping it stops the listener.
pub struct TestServer {
    pub addr: SocketAddr,
    pub handle: ServerHandle,
    shutdown: Shutdown,
}

impl TestServer {
    pub fn url(&self, route: &str) -> String {
        format!("http://{}{}", self.addr, route)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.shutdown.trigger();
    }
}

/// Start a server on an ephemeral port.
pub async fn start_server(
    config: ServerConfig,
    routes: Vec<RouteConfig>,
    catalog: ActionCatalog,
) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let server = JsonRestServer::new(config, routes, catalog).unwrap();
    let handle = server.handle();
    let shutdown = Shutdown::new();
    let server_shutdown = shutdown.subscribe();
    tokio::spawn(async move {
        let _ = server.run(listener, server_shutdown).await;
    });

    TestServer {
        addr,
        handle,
        shutdown,
    }
}

/// Users test1 and test2 in the test realm.
pub fn auth_config() -> AuthConfig {
    let mut auth = AuthConfig {
        realm: REALM.to_string(),
        ..Default::default()
    };
    auth.users
        .insert("test1".into(), password_digest(REALM, "test1", TEST1_SECRET));
    auth.users
        .insert("test2".into(), password_digest(REALM, "test2", TEST2_SECRET));
    auth
}

pub fn route(path: &str, users: &[&str], action: &str, parameters: serde_json::Value) -> RouteConfig {
    RouteConfig {
        name: None,
        route: path.to_string(),
        valid_users: users.iter().map(|u| u.to_string()).collect(),
        action: action.to_string(),
        parameters,
    }
}

/// The two demo routes: test1 may call /cs/test/1/, test2 may call /cs/test/2/.
pub fn demo_routes() -> Vec<RouteConfig> {
    vec![
        route(
            "/cs/test/1/",
            &["test1"],
            "annotate",
            json!({"result": "THIS IS ADDED IN TEST1!"}),
        ),
        route(
            "/cs/test/2/",
            &["test2"],
            "annotate",
            json!({"result": "THIS IS ADDED IN TEST2!"}),
        ),
    ]
}

/// Server with auth and the demo routes.
pub async fn start_demo_server(expose_cause: bool) -> TestServer {
    let config = ServerConfig {
        host: "127.0.0.1".into(),
        port: 0,
        auth: Some(auth_config()),
        expose_cause,
        ..Default::default()
    };
    start_server(config, demo_routes(), ActionCatalog::with_builtins()).await
}

/// Accepts connections and never answers.
pub async fn start_silent_backend() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });
    tokio::time::sleep(Duration::from_millis(10)).await;
    addr
}

/// An address nothing listens on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}
