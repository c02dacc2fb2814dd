//! Integration tests for the one-shot `ask` command against a mocked Gemini API.

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "test-key-0123456789-0123456789-0123";

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }], "role": "model" }, "finishReason": "STOP" }]
    }))
}

#[tokio::test]
async fn test_ask_prints_formatted_reply() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .and(header("x-goog-api-key", TEST_KEY))
        .and(body_partial_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Plan a road trip" }] }],
            "generationConfig": { "maxOutputTokens": 2048 }
        })))
        .respond_with(reply("* Day 1*\n* **Drive** north"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .args(["ask", "-p", "Plan a road trip"])
        .assert()
        .success()
        .stdout(predicate::str::contains(">Day 1</h2>"))
        .stdout(predicate::str::contains(
            r#"<ul class="list-disc list-inside mb-3"><li class="text-sm text-gray-300 mb-1 ml-4"><strong class="text-white font-semibold">Drive</strong> north</li></ul>"#,
        ));
}

#[tokio::test]
async fn test_ask_raw_prints_plain_text() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(reply("* Day 1*"))
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .args(["ask", "--raw", "-p", "hi"])
        .assert()
        .success()
        .stdout("* Day 1*\n");
}

#[tokio::test]
async fn test_ask_falls_back_when_model_is_missing() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": { "code": 404, "message": "models/gemini-1.5-flash is not found", "status": "NOT_FOUND" }
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/models/gemini-pro:generateContent"))
        .respond_with(reply("fallback answer"))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .args(["ask", "--raw", "-p", "hi"])
        .assert()
        .success()
        .stdout(predicate::str::contains("fallback answer"));
}

#[tokio::test]
async fn test_ask_quota_error_is_user_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(json!({
            "error": { "code": 429, "message": "You exceeded your current quota", "status": "RESOURCE_EXHAUSTED" }
        })))
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .args(["ask", "-p", "hi"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "API quota exceeded. Please try again later.",
        ));
}

#[tokio::test]
async fn test_ask_safety_block_is_user_message() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        })))
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .args(["ask", "-p", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "Content blocked by safety filters. Please rephrase your question.",
        ));
}

#[test]
fn test_ask_without_key_reports_api_key_error() {
    let home = TempDir::new().unwrap();

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env_remove("GEMINI_API_KEY")
        .args(["ask", "-p", "hi"])
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "API key error. Please check your Gemini API configuration.",
        ));
}

#[tokio::test]
async fn test_connection_check_succeeds() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:generateContent"))
        .respond_with(reply("ok"))
        .expect(2)
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .arg("test-connection")
        .assert()
        .success()
        .stdout(predicate::str::contains("API connection successful!"));
}
