//! Integration tests for the interactive `chat` command.

use std::fs;
use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = "test-key-0123456789-0123456789-0123";

fn can_bind_localhost() -> bool {
    std::net::TcpListener::bind("127.0.0.1:0").is_ok()
}

fn sign_in(home: &Path) {
    fs::write(
        home.join("auth.json"),
        r#"{"user":{"uid":"uid-42","email":"ada@example.com","display_name":"Ada"},"id_token":"t","refresh_token":"r","expires":99999999999999}"#,
    )
    .unwrap();
}

fn sse_response(chunks: &[&str]) -> ResponseTemplate {
    let body: String = chunks
        .iter()
        .map(|chunk| {
            let json = serde_json::json!({
                "candidates": [{ "content": { "parts": [{ "text": chunk }], "role": "model" } }]
            });
            format!("data: {json}\n\n")
        })
        .collect();
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body)
}

#[test]
fn test_chat_requires_sign_in() {
    let home = TempDir::new().unwrap();

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .arg("chat")
        .write_stdin("/quit\n")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Not signed in"));
}

#[tokio::test]
async fn test_chat_streams_reply_and_writes_transcript() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    sign_in(home.path());
    let transcript = home.path().join("chat.html");
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:streamGenerateContent"))
        .and(query_param("alt", "sse"))
        .respond_with(sse_response(&["* Day 1*\n", "* **Drive** <north>"]))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .arg("chat")
        .arg("--raw")
        .arg("--transcript")
        .arg(&transcript)
        .write_stdin("Plan a <trip>\n/recent\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Hello Ada, Ask me Anything"))
        .stdout(predicate::str::contains("* Day 1*\n* **Drive** <north>"))
        .stdout(predicate::str::contains("1. Plan a <trip>"));

    let html = fs::read_to_string(&transcript).unwrap();
    assert!(html.contains("Plan a &lt;trip&gt;"));
    assert!(html.contains(">Day 1</h2>"));
    assert!(html.contains(r#"<strong class="text-white font-semibold">Drive</strong> <north>"#));
}

#[tokio::test]
async fn test_chat_prints_formatted_reply() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    sign_in(home.path());
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/models/gemini-1.5-flash:streamGenerateContent"))
        .respond_with(sse_response(&["*", "* item\n", "* **Bold** point"]))
        .expect(1)
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .arg("chat")
        .write_stdin("list things\n/quit\n")
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"<ul class="list-disc list-inside mb-3">"#))
        .stdout(predicate::str::contains(">item</li>"))
        .stdout(predicate::str::contains(
            r#"<strong class="text-white font-semibold">Bold</strong> point"#,
        ))
        .stdout(predicate::str::contains("** item").not());
}

#[tokio::test]
async fn test_chat_error_is_shown_and_session_continues() {
    if !can_bind_localhost() {
        eprintln!("Skipping: cannot bind localhost TCP port in this environment.");
        return;
    }
    let home = TempDir::new().unwrap();
    sign_in(home.path());
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429).set_body_json(serde_json::json!({
            "error": { "code": 429, "message": "You exceeded your current quota" }
        })))
        .expect(2)
        .mount(&server)
        .await;

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .env("GEMINI_BASE_URL", server.uri())
        .arg("chat")
        .write_stdin("first\n   \nsecond\n")
        .assert()
        .success()
        .stderr(predicate::str::contains(
            "API quota exceeded. Please try again later.",
        ));
}

#[test]
fn test_chat_logout_ends_session() {
    let home = TempDir::new().unwrap();
    sign_in(home.path());

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .arg("chat")
        .write_stdin("/help\n/bogus\n/logout\nnever sent\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("/clear-recent"))
        .stdout(predicate::str::contains("Signed out successfully!"))
        .stderr(predicate::str::contains("Unknown command: /bogus"));

    assert!(!home.path().join("auth.json").exists());
}

#[test]
fn test_chat_rejects_overlong_input() {
    let home = TempDir::new().unwrap();
    sign_in(home.path());
    fs::write(
        home.path().join("config.toml"),
        "[chat]\nmax_input_chars = 5\n",
    )
    .unwrap();

    cargo_bin_cmd!("gemchat")
        .env("GEMCHAT_HOME", home.path())
        .env("GEMINI_API_KEY", TEST_KEY)
        .arg("chat")
        .write_stdin("far too long\n/quit\n")
        .assert()
        .success()
        .stderr(predicate::str::contains("Message is longer than 5 characters"));
}
