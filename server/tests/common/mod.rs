#![allow(dead_code)]

use notelite::{
    api::{build_router, AppState},
    config::Config,
    model::User,
    users,
};
use notelite_api::{DocumentView, TokenResponse};
use serde_json::json;
use std::net::{SocketAddr, TcpListener};
use tokio::task::JoinHandle;

pub struct TestServer {
    pub addr: SocketAddr,
    pub state: AppState,
    pub handle: JoinHandle<()>,
    pub client: reqwest::Client,
    _tmp: tempfile::TempDir,
}

pub async fn spawn_server() -> TestServer {
    spawn_with(|_| {}).await
}

pub async fn spawn_with(tweak: impl FnOnce(&mut Config)) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    listener.set_nonblocking(true).unwrap();

    let tmp = tempfile::tempdir().unwrap();
    let mut config = Config::with_data_dir(addr.to_string(), tmp.path());
    tweak(&mut config);
    let state = AppState::new(config).await.unwrap();
    let app = build_router(state.clone());
    let handle = tokio::spawn(async move {
        axum::Server::from_tcp(listener)
            .unwrap()
            .serve(app.into_make_service())
            .await
            .unwrap();
    });
    TestServer {
        addr,
        state,
        handle,
        client: reqwest::Client::new(),
        _tmp: tmp,
    }
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn add_user(&self, email: &str, name: &str, password: &str) -> User {
        let conn = self.state.pool.get().unwrap();
        users::ensure_user(&conn, email, Some(name), password).unwrap()
    }

    pub async fn login(&self, email: &str, password: &str) -> String {
        let resp = self
            .client
            .post(self.url("/auth/login"))
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .unwrap();
        assert!(resp.status().is_success(), "login failed for {email}");
        resp.json::<TokenResponse>().await.unwrap().token
    }

    /// Create a user and return a token for them.
    pub async fn user_token(&self, email: &str, name: &str) -> (User, String) {
        let user = self.add_user(email, name, "password123");
        let token = self.login(email, "password123").await;
        (user, token)
    }

    pub async fn create_doc(&self, token: &str, body: serde_json::Value) -> DocumentView {
        let resp = self
            .client
            .post(self.url("/documents"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), 200);
        resp.json().await.unwrap()
    }

    pub fn stop(self) {
        self.handle.abort();
    }
}
