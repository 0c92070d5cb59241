use std::sync::Arc;

use axum::http::{header, Method, StatusCode};
use serde_json::json;

mod common;

use common::{TestApp, TEST_PASSWORD};

#[tokio::test]
async fn test_health_root() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database"], "connected");
}

#[tokio::test]
async fn test_health_live_and_info() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/health/live", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = app.get("/health/info", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["service"], "dictation-backend");
    assert_eq!(body["ttsProvider"], "mock");
}

#[tokio::test]
async fn test_unknown_route_returns_envelope() {
    let app = TestApp::new().await;
    let (status, body) = app.get("/api/does-not-exist", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_unauthorized_without_token() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/users/me", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, _) = app.get("/api/progress", Some("not-a-jwt")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_login_logout_flow() {
    let app = TestApp::new().await;
    let token = app.register("ada@example.com").await;

    let (status, body) = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], "ada@example.com");

    let (status, body) = app
        .post(
            "/api/auth/login",
            json!({ "email": "ada@example.com", "password": "wrong-password" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let response = app
        .send_raw(
            Method::POST,
            "/api/auth/login",
            Some(json!({ "email": "ADA@example.com", "password": TEST_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(cookie.starts_with("auth_token="));
    assert!(cookie.contains("HttpOnly"));

    let (status, _) = app.send(Method::POST, "/api/auth/logout", None, Some(&token)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = app.get("/api/users/me", Some(&token)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let app = TestApp::new().await;
    app.register("grace@example.com").await;

    let (status, body) = app
        .post(
            "/api/auth/register",
            json!({ "email": "grace@example.com", "username": "grace", "password": TEST_PASSWORD }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (status, body) = app
        .post(
            "/api/auth/register",
            json!({ "email": "new@example.com", "username": "new", "password": "short" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_malformed_body_is_bad_request() {
    let app = TestApp::new().await;
    let response = app
        .send_raw(Method::POST, "/api/words", None, None)
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_word_crud() {
    let app = TestApp::new().await;

    let (status, body) = app
        .post("/api/words", json!({ "word": " apple ", "translation": "苹果" }), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["word"], "apple");
    assert_eq!(body["data"]["difficulty"], 1);
    let word_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/api/words",
            json!({ "word": "pear", "translation": "梨", "difficulty": 5 }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (status, body) = app
        .send(
            Method::PUT,
            &format!("/api/words/{word_id}"),
            Some(json!({ "difficulty": 3 })),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["difficulty"], 3);

    let (status, _) = app
        .send(Method::DELETE, &format!("/api/words/{word_id}"), None, None)
        .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = app.get(&format!("/api/words/{word_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = app.get("/api/words/abc", None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_import_fills_translation_and_reports_failures() {
    let app = TestApp::new().await;
    let (list_id, _) = app.list_with_words("Animals", &[]).await;

    let text = "cat,,,,easy\n\n,orphan\ndog,dɔɡ,狗,The dog barks.,hard\ncat,kæt,猫";
    let (status, body) = app
        .post(&format!("/api/word-lists/{list_id}/import"), json!({ "text": text }), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["importedCount"], 2);

    let failures = body["data"]["failedWords"].as_array().unwrap();
    assert_eq!(failures.len(), 2);
    assert_eq!(failures[0]["line"], 3);
    assert_eq!(failures[1]["line"], 5);
    assert_eq!(failures[1]["content"], "cat,kæt,猫");

    let (_, detail) = app.get(&format!("/api/word-lists/{list_id}"), None).await;
    let words = detail["data"]["words"].as_array().unwrap();
    assert_eq!(words.len(), 2);
    assert_eq!(words[0]["word"], "cat");
    assert_eq!(words[0]["translation"], "cat");
    assert_eq!(words[0]["difficulty"], 1);
    assert_eq!(words[1]["word"], "dog");
    assert_eq!(words[1]["difficulty"], 3);
    assert_eq!(words[1]["order"], 2);
}

#[tokio::test]
async fn test_membership_rules() {
    let app = TestApp::new().await;
    let (list_id, ids) = app.list_with_words("Fruit", &["apple", "banana"]).await;

    let (status, body) = app
        .post(&format!("/api/word-lists/{list_id}/words"), json!({ "wordId": ids[0] }), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "CONFLICT");

    let (_, body) = app
        .post("/api/words", json!({ "word": "apple", "translation": "另一个苹果" }), None)
        .await;
    let twin = body["data"]["id"].as_i64().unwrap();
    let (status, _) = app
        .post(&format!("/api/word-lists/{list_id}/words"), json!({ "wordId": twin }), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (_, body) = app
        .post("/api/words", json!({ "word": "cherry", "translation": "樱桃" }), None)
        .await;
    let cherry = body["data"]["id"].as_i64().unwrap();
    let (status, body) = app
        .post(&format!("/api/word-lists/{list_id}/words"), json!({ "wordId": cherry }), None)
        .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["order"], 3);

    let (status, body) = app
        .send(
            Method::DELETE,
            &format!("/api/word-lists/{list_id}/words/{cherry}"),
            None,
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removed"], true);
}

#[tokio::test]
async fn test_batch_remove_counts_only_members() {
    let app = TestApp::new().await;
    let (list_id, ids) = app.list_with_words("Colors", &["red", "green", "blue"]).await;

    let (status, body) = app
        .post(
            &format!("/api/word-lists/{list_id}/words/batch-remove"),
            json!({ "wordIds": [999_991, 999_992] }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removedCount"], 0);

    let (status, body) = app
        .post(
            &format!("/api/word-lists/{list_id}/words/batch-remove"),
            json!({ "wordIds": [ids[0], ids[2], 999_991] }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["removedCount"], 2);

    let (status, body) = app
        .post(
            &format!("/api/word-lists/{list_id}/words/batch-remove"),
            json!({ "wordIds": [] }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");

    let (_, lists) = app.get("/api/word-lists", None).await;
    assert_eq!(lists["data"][0]["wordCount"], 1);
}

#[tokio::test]
async fn test_tts_voices_and_mock_synthesis() {
    let app = TestApp::new().await;

    let (status, body) = app.get("/api/tts/voices", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["available"], true);
    assert!(!body["data"]["voices"].as_array().unwrap().is_empty());

    let response = app
        .send_raw(
            Method::POST,
            "/api/tts/synthesize",
            Some(json!({ "text": "hello", "format": "wav" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get(header::CONTENT_TYPE).unwrap(),
        "audio/wav"
    );

    let (status, body) = app
        .post("/api/tts/synthesize", json!({ "text": "hello", "speed": 3.0 }), None)
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "VALIDATION_ERROR");
}

#[tokio::test]
async fn test_list_audio_generation_skips_existing_files() {
    let app = TestApp::new().await;
    let (list_id, _) = app.list_with_words("Audio", &["sun", "moon"]).await;
    let uri = format!("/api/tts/word-lists/{list_id}/generate");

    let (status, body) = app.send(Method::POST, &uri, None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["generated"], 2);
    assert_eq!(body["data"]["existing"], 0);

    let (_, body) = app.send(Method::POST, &uri, None, None).await;
    assert_eq!(body["data"]["generated"], 0);
    assert_eq!(body["data"]["existing"], 2);
}

/// Runs create list, create word, add, start and next against a
/// multi-threaded runtime, where each request may land on another pooled
/// connection.
async fn create_and_start(app: &TestApp, round: usize) {
    let (status, body) = app
        .post("/api/word-lists", json!({ "name": format!("Round {round}") }), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "create list: {body}");
    let list_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(
            "/api/words",
            json!({ "word": format!("lantern{round}"), "translation": "灯笼" }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "create word: {body}");
    let word_id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = app
        .post(&format!("/api/word-lists/{list_id}/words"), json!({ "wordId": word_id }), None)
        .await;
    assert_eq!(status, StatusCode::CREATED, "add word: {body}");
    assert_eq!(body["data"]["order"], 1);

    let session_id = app.start_session(list_id, None).await;
    let next = app.next(session_id, None).await;
    assert_eq!(next["word"]["id"], word_id);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_created_rows_are_readable_across_connections() {
    let app = TestApp::new().await;
    for round in 0..20 {
        create_and_start(&app, round).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_start_and_serve_words() {
    let app = Arc::new(TestApp::new().await);
    let handles: Vec<_> = (0..8)
        .map(|round| {
            let app = Arc::clone(&app);
            tokio::spawn(async move { create_and_start(&app, round).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap();
    }

    let (_, lists) = app.get("/api/word-lists", None).await;
    assert_eq!(lists["data"].as_array().unwrap().len(), 8);
}

#[tokio::test]
async fn test_batch_remove_handles_more_ids_than_one_statement() {
    let app = TestApp::new().await;
    let (list_id, ids) = app.list_with_words("Large", &["oak", "elm"]).await;

    let mut word_ids: Vec<i64> = (1_000_000..1_001_200).collect();
    word_ids.push(ids[1]);
    let (status, body) = app
        .post(
            &format!("/api/word-lists/{list_id}/words/batch-remove"),
            json!({ "wordIds": word_ids }),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "batch remove: {body}");
    assert_eq!(body["data"]["removedCount"], 1);

    let (_, detail) = app.get(&format!("/api/word-lists/{list_id}"), None).await;
    let words = detail["data"]["words"].as_array().unwrap();
    assert_eq!(words.len(), 1);
    assert_eq!(words[0]["id"], ids[0]);
}
