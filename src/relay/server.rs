//! Relay Server
//!
//! `POST /api/claude`を1種類だけ受け付け、ベンダーのメッセージAPIへ転送する
//! ローカルリレーです。リクエストは1件ずつ順番に処理し、状態は持ちません。

use std::fs;
use std::io::{Cursor, Read};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde_json::Value;
use tiny_http::{Header, Method, Request, Response, Server, SslConfig};
use tracing::{debug, info, warn};

use super::client::TransportError;
use super::protocol::{build_forward_body, error_body};
use super::{default_cert_dir, DEFAULT_PORT, RELAY_PATH};
use crate::api::Scheme;
use crate::error::WordTrackError;
use crate::logging::init_logging;

/// 上流のメッセージAPI
pub const DEFAULT_UPSTREAM_URL: &str = "https://api.anthropic.com/v1/messages";
/// `anthropic-version`ヘッダーの値
pub const ANTHROPIC_VERSION: &str = "2023-06-01";

const CERT_FILE: &str = "localhost.crt";
const KEY_FILE: &str = "localhost.key";

const CONTENT_TYPE_JSON: (&str, &str) = ("Content-Type", "application/json");
const ALLOW_ORIGIN: (&str, &str) = ("Access-Control-Allow-Origin", "*");
const ALLOW_METHODS: (&str, &str) = ("Access-Control-Allow-Methods", "POST, OPTIONS");
const ALLOW_HEADERS: (&str, &str) = ("Access-Control-Allow-Headers", "Content-Type");

/// リレーの起動引数
#[derive(Debug, Clone, Parser)]
#[command(
    name = "wordtrack-relay",
    version,
    about = "Local relay that forwards WordTrack requests to the Claude messages API"
)]
pub struct Args {
    /// 待ち受けポート
    #[arg(long, env = "WORDTRACK_RELAY_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// 待ち受けアドレス
    #[arg(long, default_value = "127.0.0.1")]
    pub host: String,

    /// `localhost.crt`と`localhost.key`を含むディレクトリ
    #[arg(long, env = "WORDTRACK_CERT_DIR")]
    pub cert_dir: Option<PathBuf>,

    /// 転送先のメッセージAPI
    #[arg(long, env = "WORDTRACK_UPSTREAM_URL", default_value = DEFAULT_UPSTREAM_URL)]
    pub upstream_url: String,

    /// `anthropic-version`ヘッダー
    #[arg(long, default_value = ANTHROPIC_VERSION)]
    pub api_version: String,

    /// ログのフィルタ（`tracing_subscriber::EnvFilter`の書式）
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_filter: String,
}

/// 上流の応答
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpstreamReply {
    pub status: u16,
    pub body: Vec<u8>,
}

/// 上流APIへの転送
pub trait Upstream {
    /// 整形済みボディを認証情報付きで転送する
    fn forward(&self, body: &Value, api_key: &str) -> Result<UpstreamReply, TransportError>;
}

/// reqwest（blocking）による上流転送
#[derive(Debug, Clone)]
pub struct ReqwestUpstream {
    client: reqwest::blocking::Client,
    url: String,
    api_version: String,
}

impl ReqwestUpstream {
    pub fn new(
        url: impl Into<String>,
        api_version: impl Into<String>,
    ) -> Result<Self, WordTrackError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(None::<std::time::Duration>)
            .build()
            .map_err(|e| WordTrackError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            url: url.into(),
            api_version: api_version.into(),
        })
    }
}

impl Upstream for ReqwestUpstream {
    fn forward(&self, body: &Value, api_key: &str) -> Result<UpstreamReply, TransportError> {
        let response = self
            .client
            .post(&self.url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.api_version)
            .body(body.to_string())
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| TransportError(e.to_string()))?
            .to_vec();
        Ok(UpstreamReply { status, body })
    }
}

/// リレーの応答（ステータス、ヘッダー、ボディ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayResponse {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body: Vec<u8>,
}

impl RelayResponse {
    fn json_error(status: u16, message: &str) -> Self {
        Self {
            status,
            headers: vec![CONTENT_TYPE_JSON, ALLOW_ORIGIN],
            body: error_body(message),
        }
    }

    /// ヘッダー値（大文字小文字を区別しない）
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| *value)
    }

    fn into_tiny_http(self) -> Response<Cursor<Vec<u8>>> {
        let mut response = Response::from_data(self.body).with_status_code(self.status);
        for (name, value) in self.headers {
            if let Ok(header) = Header::from_bytes(name.as_bytes(), value.as_bytes()) {
                response.add_header(header);
            }
        }
        response
    }
}

/// 1件のリクエストに対する応答を決める
///
/// # 引数
///
/// * `method` - HTTPメソッド
/// * `path` - リクエストURL（クエリ込みで完全一致を判定）
/// * `body` - リクエストボディ
/// * `upstream` - 転送先
///
/// # 戻り値
///
/// 送り返す応答。転送時は上流のステータスとボディをそのまま返します。
pub fn route(method: &Method, path: &str, body: &[u8], upstream: &dyn Upstream) -> RelayResponse {
    match method {
        Method::Post if path == RELAY_PATH => forward(body, upstream),
        Method::Options => RelayResponse {
            status: 200,
            headers: vec![ALLOW_ORIGIN, ALLOW_METHODS, ALLOW_HEADERS],
            body: Vec::new(),
        },
        _ => RelayResponse::json_error(404, "Not found"),
    }
}

fn forward(body: &[u8], upstream: &dyn Upstream) -> RelayResponse {
    let request: Value = match serde_json::from_slice(body) {
        Ok(value) => value,
        Err(e) => {
            return RelayResponse::json_error(400, &format!("Invalid request: {}", e));
        }
    };

    let Some(request) = request.as_object() else {
        return RelayResponse::json_error(400, "API key is required");
    };
    let api_key = match request.get("apiKey").and_then(Value::as_str) {
        Some(key) if !key.is_empty() => key,
        _ => return RelayResponse::json_error(400, "API key is required"),
    };

    let forward_body = build_forward_body(request);
    match upstream.forward(&forward_body, api_key) {
        Ok(reply) => RelayResponse {
            status: reply.status,
            headers: vec![CONTENT_TYPE_JSON, ALLOW_ORIGIN, ALLOW_METHODS, ALLOW_HEADERS],
            body: reply.body,
        },
        Err(e) => {
            warn!(error = %e, "Upstream request failed");
            RelayResponse::json_error(500, &e.0)
        }
    }
}

/// 起動済みのリレー
pub struct RelayServer {
    server: Server,
    scheme: Scheme,
}

impl RelayServer {
    /// 待ち受けを開始する
    ///
    /// 証明書ディレクトリに`localhost.crt`と`localhost.key`が揃っていて読み込めれば
    /// TLSで、それ以外（ファイルがない、読めない、不正）は平文HTTPで待ち受けます。
    pub fn bind(addr: &str, cert_dir: Option<&Path>) -> Result<Self, WordTrackError> {
        if let Some(ssl) = cert_dir.and_then(load_ssl_config) {
            match Server::https(addr, ssl) {
                Ok(server) => {
                    return Ok(Self {
                        server,
                        scheme: Scheme::Https,
                    })
                }
                Err(e) => warn!(error = %e, "Could not start TLS listener, falling back to HTTP"),
            }
        } else {
            info!("HTTPS certificates not found, using HTTP (run `npx office-addin-dev-certs install` to enable TLS)");
        }

        let server = Server::http(addr)
            .map_err(|e| WordTrackError::Config(format!("Cannot listen on {}: {}", addr, e)))?;
        Ok(Self {
            server,
            scheme: Scheme::Http,
        })
    }

    /// 実際に待ち受けているアドレス
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// 待ち受けのスキーム
    pub fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// リクエストを1件ずつ処理し続ける
    pub fn serve(&self, upstream: &dyn Upstream) {
        for request in self.server.incoming_requests() {
            self.handle(request, upstream);
        }
    }

    fn handle(&self, mut request: Request, upstream: &dyn Upstream) {
        let method = request.method().clone();
        let path = request.url().to_string();

        let mut body = Vec::new();
        let response = match request.as_reader().read_to_end(&mut body) {
            Ok(_) => route(&method, &path, &body, upstream),
            Err(e) => RelayResponse::json_error(400, &format!("Invalid request: {}", e)),
        };

        info!(%method, path = %path, status = response.status, "Handled request");
        if let Err(e) = request.respond(response.into_tiny_http()) {
            debug!(error = %e, "Client went away before the response was sent");
        }
    }
}

fn load_ssl_config(dir: &Path) -> Option<SslConfig> {
    let certificate = fs::read(dir.join(CERT_FILE));
    let private_key = fs::read(dir.join(KEY_FILE));
    match (certificate, private_key) {
        (Ok(certificate), Ok(private_key)) => Some(SslConfig {
            certificate,
            private_key,
        }),
        (Err(e), _) | (_, Err(e)) => {
            debug!(dir = %dir.display(), error = %e, "Development certificates unavailable");
            None
        }
    }
}

/// リレーを起動して処理を続ける
pub fn run_main(args: Args) -> anyhow::Result<()> {
    init_logging(&args.log_filter, None)?;

    let cert_dir = args.cert_dir.clone().or_else(default_cert_dir);
    let upstream = ReqwestUpstream::new(args.upstream_url.as_str(), args.api_version.as_str())?;
    let addr = format!("{}:{}", args.host, args.port);
    let server = RelayServer::bind(&addr, cert_dir.as_deref())?;

    info!(
        "Claude API relay running on {}://localhost:{}",
        server.scheme(),
        args.port
    );
    info!("Keep this running while using the WordTrack add-in");

    server.serve(&upstream);
    Ok(())
}
