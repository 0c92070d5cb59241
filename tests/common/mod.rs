#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use dictation_backend::config::Config;
use dictation_backend::db::Database;
use dictation_backend::services::tts::{TtsConfig, TtsService};
use dictation_backend::state::AppState;

pub const TEST_PASSWORD: &str = "Dictation#2024";

pub struct TestApp {
    pub router: Router,
    pub state: AppState,
    _dir: TempDir,
}

pub fn test_config(dir: &TempDir) -> Config {
    Config {
        host: IpAddr::V4(Ipv4Addr::LOCALHOST),
        port: 0,
        log_level: "warn".to_string(),
        database_path: dir.path().join("test.db"),
        jwt_secret: "test-secret".to_string(),
        jwt_expires_in: "1h".to_string(),
        audio_dir: dir.path().join("audio"),
        file_log_dir: None,
        production: false,
    }
}

impl TestApp {
    pub async fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = test_config(&dir);
        let db = Database::open(&config.database_path).await.expect("open db");
        let tts = TtsService::new(TtsConfig::mock(config.audio_dir.clone()));
        let state = AppState::new(db, config, tts);
        Self {
            router: dictation_backend::build_router(state.clone()),
            state,
            _dir: dir,
        }
    }

    pub async fn send_raw(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> axum::response::Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(token) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }
        let body = match body {
            Some(value) => {
                builder = builder.header(header::CONTENT_TYPE, "application/json");
                Body::from(value.to_string())
            }
            None => Body::empty(),
        };

        self.router
            .clone()
            .oneshot(builder.body(body).expect("request"))
            .await
            .expect("response")
    }

    pub async fn send(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let response = self.send_raw(method, uri, body, token).await;
        let status = response.status();
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).expect("json body")
        };
        (status, json)
    }

    pub async fn get(&self, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::GET, uri, None, token).await
    }

    pub async fn post(&self, uri: &str, body: Value, token: Option<&str>) -> (StatusCode, Value) {
        self.send(Method::POST, uri, Some(body), token).await
    }

    /// Registers a user and returns the issued bearer token.
    pub async fn register(&self, email: &str) -> String {
        let (status, body) = self
            .post(
                "/api/auth/register",
                serde_json::json!({
                    "email": email,
                    "username": email.split('@').next().unwrap_or("learner"),
                    "password": TEST_PASSWORD,
                }),
                None,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "register failed: {body}");
        body["data"]["token"].as_str().expect("token").to_string()
    }

    /// Creates a list and imports `words` into it, returning the list id and
    /// the word ids in list order.
    pub async fn list_with_words(&self, name: &str, words: &[&str]) -> (i64, Vec<i64>) {
        let (status, body) = self
            .post("/api/word-lists", serde_json::json!({ "name": name }), None)
            .await;
        assert_eq!(status, StatusCode::CREATED, "create list failed: {body}");
        let list_id = body["data"]["id"].as_i64().expect("list id");

        if !words.is_empty() {
            let text = words
                .iter()
                .map(|word| format!("{word},,{word}-translation,,easy"))
                .collect::<Vec<_>>()
                .join("\n");
            let (status, body) = self
                .post(
                    &format!("/api/word-lists/{list_id}/import"),
                    serde_json::json!({ "text": text }),
                    None,
                )
                .await;
            assert_eq!(status, StatusCode::OK, "import failed: {body}");
        }

        let (_, detail) = self.get(&format!("/api/word-lists/{list_id}"), None).await;
        let ids = detail["data"]["words"]
            .as_array()
            .expect("words")
            .iter()
            .map(|word| word["id"].as_i64().expect("word id"))
            .collect();
        (list_id, ids)
    }

    pub async fn start_session(&self, list_id: i64, token: Option<&str>) -> i64 {
        let (status, body) = self
            .post(
                "/api/dictation/sessions",
                serde_json::json!({ "wordListId": list_id }),
                token,
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "start failed: {body}");
        body["data"]["id"].as_i64().expect("session id")
    }

    pub async fn next(&self, session_id: i64, token: Option<&str>) -> Value {
        let (status, body) = self
            .get(&format!("/api/dictation/sessions/{session_id}/next"), token)
            .await;
        assert_eq!(status, StatusCode::OK, "next failed: {body}");
        body["data"].clone()
    }

    pub async fn answer(&self, session_id: i64, word_id: i64, answer: &str, token: Option<&str>) -> Value {
        let (status, body) = self
            .post(
                &format!("/api/dictation/sessions/{session_id}/answers"),
                serde_json::json!({ "wordId": word_id, "answer": answer, "timeTaken": 3 }),
                token,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "answer failed: {body}");
        body["data"].clone()
    }

    pub async fn skip(&self, session_id: i64, word_id: i64, token: Option<&str>) -> Value {
        let (status, body) = self
            .post(
                &format!("/api/dictation/sessions/{session_id}/skip"),
                serde_json::json!({ "wordId": word_id }),
                token,
            )
            .await;
        assert_eq!(status, StatusCode::OK, "skip failed: {body}");
        body["data"].clone()
    }
}
