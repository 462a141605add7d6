//! Test harness running the HTTP API on an ephemeral port.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::Arc;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::net::TcpListener;

use scrapectl::config::Config;
use scrapectl::{create_router, ControlPlane};

/// A live server plus the control plane behind it, so tests can both call
/// the API and inspect state directly.
pub struct TestServer {
    pub addr: SocketAddr,
    pub plane: Arc<ControlPlane>,
    client: Client,
}

impl TestServer {
    pub async fn start(config: Config) -> Self {
        let plane = Arc::new(ControlPlane::from_config(&config).expect("control plane"));
        let app = create_router(plane.app_state(), config.server.cors_enabled);

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind test listener");
        let addr = listener.local_addr().expect("local addr");
        tokio::spawn(async move {
            axum::serve(listener, app).await.expect("serve app");
        });

        Self {
            addr,
            plane,
            client: Client::new(),
        }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn get(&self, path: &str) -> Response {
        self.client
            .get(self.url(path))
            .send()
            .await
            .expect("GET request")
    }

    pub async fn post(&self, path: &str, body: Value) -> Response {
        self.client
            .post(self.url(path))
            .json(&body)
            .send()
            .await
            .expect("POST request")
    }

    pub async fn post_empty(&self, path: &str) -> Response {
        self.client
            .post(self.url(path))
            .send()
            .await
            .expect("POST request")
    }

    pub async fn post_raw(&self, path: &str, body: &'static str) -> Response {
        self.client
            .post(self.url(path))
            .header("content-type", "application/json")
            .body(body)
            .send()
            .await
            .expect("POST request")
    }
}

/// Asserts the status code and decodes the JSON body.
pub async fn expect_json<T: DeserializeOwned>(response: Response, status: StatusCode) -> T {
    let actual = response.status();
    let body = response.text().await.expect("response body");
    assert_eq!(actual, status, "unexpected status, body: {}", body);
    serde_json::from_str(&body).unwrap_or_else(|e| panic!("invalid JSON ({}): {}", e, body))
}

/// Asserts an error response and returns its message.
pub async fn expect_error(response: Response, status: StatusCode) -> String {
    let body: Value = expect_json(response, status).await;
    assert_eq!(body["success"], Value::Bool(false), "body: {}", body);
    body["message"]
        .as_str()
        .expect("error message")
        .to_string()
}
