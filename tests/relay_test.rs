//! Relay Tests
//!
//! 実際のソケット上で、クライアント → リレー → モック上流API の往復を検証します。

use std::io::Read;
use std::net::{SocketAddr, TcpListener};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};
use tempfile::TempDir;
use wordtrack::relay::{
    RelayServer, ReqwestUpstream, ANTHROPIC_VERSION, DEFAULT_CONNECT_TIMEOUT,
};
use wordtrack::{
    Instruction, MemoryCredentialStore, MemoryDocument, Preset, RelayClientBuilder, RelayError,
    Scheme, Session, WordTrackError,
};

fn header(request: &tiny_http::Request, name: &'static str) -> Option<String> {
    request
        .headers()
        .iter()
        .find(|h| h.field.equiv(name))
        .map(|h| h.value.as_str().to_string())
}

fn json_response(status: u16, body: Value) -> tiny_http::Response<std::io::Cursor<Vec<u8>>> {
    tiny_http::Response::from_string(body.to_string()).with_status_code(status)
}

/// APIキーに応じて応答を変えるモック上流API
fn start_mock_upstream() -> SocketAddr {
    let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();

    thread::spawn(move || {
        for mut request in server.incoming_requests() {
            let mut body = String::new();
            request.as_reader().read_to_string(&mut body).ok();
            let body: Value = serde_json::from_str(&body).unwrap_or_default();

            let well_formed = header(&request, "anthropic-version").as_deref()
                == Some(ANTHROPIC_VERSION)
                && header(&request, "Content-Type").as_deref() == Some("application/json")
                && body.get("apiKey").is_none()
                && body.get("system").is_some();
            if !well_formed {
                let _ = request.respond(json_response(418, json!({"error": "unexpected request"})));
                continue;
            }

            let response = match header(&request, "x-api-key").as_deref() {
                Some("sk-ant-valid") => {
                    let user = body["messages"][0]["content"].as_str().unwrap_or_default();
                    let revised = user.rsplit("\n\n").next().unwrap_or_default().to_uppercase();
                    json_response(
                        200,
                        json!({"content": [{"type": "text", "text": revised}]}),
                    )
                }
                Some("sk-ant-broke") => json_response(
                    400,
                    json!({"type": "error", "error": {"type": "invalid_request_error",
                        "message": "Your credit balance is too low to access the Anthropic API."}}),
                ),
                Some("sk-ant-busy") => json_response(
                    429,
                    json!({"type": "error", "error": {"type": "rate_limit_error", "message": "slow down"}}),
                ),
                _ => json_response(
                    401,
                    json!({"type": "error", "error": {"type": "authentication_error",
                        "message": "invalid x-api-key"}}),
                ),
            };
            let _ = request.respond(response);
        }
    });

    addr
}

/// 証明書のないディレクトリでリレーを起動する（平文HTTP）
fn start_relay(upstream: SocketAddr) -> SocketAddr {
    let certs = TempDir::new().unwrap();
    let server = RelayServer::bind("127.0.0.1:0", Some(certs.path())).unwrap();
    assert_eq!(server.scheme(), Scheme::Http);
    let addr = server.local_addr().unwrap();

    let upstream =
        ReqwestUpstream::new(format!("http://{}/v1/messages", upstream), ANTHROPIC_VERSION)
            .unwrap();
    thread::spawn(move || server.serve(&upstream));

    addr
}

fn start_stack() -> SocketAddr {
    start_relay(start_mock_upstream())
}

fn complete_with(
    relay: SocketAddr,
    schemes: Vec<Scheme>,
    api_key: &str,
) -> Result<String, RelayError> {
    let client = RelayClientBuilder::new()
        .with_host("127.0.0.1")
        .with_port(relay.port())
        .with_schemes(schemes)
        .build()
        .unwrap();

    client.complete(
        "make this louder",
        &Instruction::Preset(Preset::ImproveClarity),
        "a test document",
        api_key,
    )
}

fn complete(relay: SocketAddr, api_key: &str) -> Result<String, RelayError> {
    complete_with(relay, vec![Scheme::Http], api_key)
}

#[test]
fn test_round_trip() {
    let relay = start_stack();

    assert_eq!(complete(relay, "sk-ant-valid").unwrap(), "MAKE THIS LOUDER");
}

#[test]
fn test_default_schemes_fall_back_to_plain_relay() {
    // 証明書なしのリレーは平文HTTPのみ。既定の https → http の順で到達できること
    let relay = start_stack();
    let client = RelayClientBuilder::new()
        .with_host("127.0.0.1")
        .with_port(relay.port())
        .build()
        .unwrap();

    let started = Instant::now();
    let response = client.complete(
        "make this louder",
        &Instruction::Preset(Preset::ImproveClarity),
        "a test document",
        "sk-ant-valid",
    );

    assert_eq!(response.unwrap(), "MAKE THIS LOUDER");
    assert!(started.elapsed() < DEFAULT_CONNECT_TIMEOUT + Duration::from_secs(10));
}

#[test]
fn test_short_connect_timeout_reaches_plain_relay() {
    let relay = start_stack();
    let client = RelayClientBuilder::new()
        .with_host("127.0.0.1")
        .with_port(relay.port())
        .with_connect_timeout(Duration::from_millis(500))
        .build()
        .unwrap();

    let response = client.complete(
        "x",
        &Instruction::custom("Shout."),
        "a test document",
        "sk-ant-busy",
    );
    match response {
        Err(RelayError::Status { status: 429, .. }) => {}
        other => panic!("Expected 429 over http, got {:?}", other),
    }
}

#[test]
fn test_upstream_status_mapping() {
    let relay = start_stack();

    match complete(relay, "sk-ant-wrong") {
        Err(RelayError::Status { status: 401, message }) => {
            assert!(message.starts_with("Invalid API key"));
        }
        other => panic!("Expected 401, got {:?}", other),
    }

    match complete(relay, "sk-ant-broke") {
        Err(RelayError::Status { status: 400, message }) => {
            assert!(message.contains("insufficient credits"));
        }
        other => panic!("Expected credit error, got {:?}", other),
    }

    match complete(relay, "sk-ant-busy") {
        Err(RelayError::Status { status: 429, message }) => {
            assert!(message.starts_with("Rate limit"));
        }
        other => panic!("Expected 429, got {:?}", other),
    }
}

#[test]
fn test_empty_api_key_rejected_by_relay() {
    let relay = start_stack();

    match complete(relay, "") {
        Err(RelayError::Status { status: 400, message }) => {
            assert_eq!(message, "Claude API error (400): API key is required");
        }
        other => panic!("Expected 400, got {:?}", other),
    }
}

#[test]
fn test_upstream_unreachable_is_relay_internal_error() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let relay = start_relay(closed);

    match complete(relay, "sk-ant-valid") {
        Err(RelayError::Status { status: 500, message }) => {
            assert!(message.starts_with("The relay server"));
        }
        other => panic!("Expected 500, got {:?}", other),
    }
}

#[test]
fn test_relay_not_running() {
    let closed = {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };

    // HTTPSとHTTPの両方が接続を拒否される
    assert_eq!(
        complete_with(closed, vec![Scheme::Https, Scheme::Http], "sk-ant-valid"),
        Err(RelayError::Unreachable)
    );
}

#[test]
fn test_preflight_and_unknown_routes() {
    let relay = start_stack();
    let client = reqwest::blocking::Client::new();

    let response = client
        .request(reqwest::Method::OPTIONS, format!("http://{}/api/claude", relay))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 200);
    assert_eq!(
        response.headers()["access-control-allow-methods"],
        "POST, OPTIONS"
    );

    let response = client
        .get(format!("http://{}/api/claude", relay))
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 404);
    assert_eq!(response.headers()["access-control-allow-origin"], "*");
    let body: Value = response.json().unwrap();
    assert_eq!(body["error"], "Not found");

    let response = client
        .post(format!("http://{}/api/claude", relay))
        .body("{broken")
        .send()
        .unwrap();
    assert_eq!(response.status().as_u16(), 400);
    let body: Value = response.json().unwrap();
    assert!(body["error"]
        .as_str()
        .unwrap()
        .starts_with("Invalid request: "));
}

#[test]
fn test_session_request_and_insert() {
    let relay = start_stack();
    let client = RelayClientBuilder::new()
        .with_host("127.0.0.1")
        .with_port(relay.port())
        .build()
        .unwrap();

    let mut store = MemoryCredentialStore::new();
    let mut session = Session::load(&store);
    let mut document = MemoryDocument::new("quiet words");

    session.capture_selection(&mut document).unwrap();
    assert!(matches!(
        session.request_completion(&client, &Instruction::custom("Shout."), None),
        Err(WordTrackError::MissingApiKey)
    ));

    assert!(session.save_credential(&mut store, "sk-ant-valid").is_success());
    let response = session
        .request_completion(&client, &Instruction::custom("Shout."), None)
        .unwrap();
    assert_eq!(response, "QUIET WORDS");

    let notice = session.insert_pending_response(&mut document);
    assert!(notice.is_success());
    assert!(notice.message.starts_with("Claude's response has been inserted"));
    assert_eq!(document.selection(), "QUIET WORDS");
}
