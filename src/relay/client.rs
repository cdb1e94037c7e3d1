//! Relay Client
//!
//! 選択テキストと指示をリレーへ送り、ベンダーAPIの応答テキストを取り出します。
//!
//! スキームのフォールバックとステータスコード→メッセージの対応は、
//! どちらも順序付きの判定テーブルとして表現しています。

use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use super::protocol::{error_detail, ChatMessage, MessagesResponse, RelayRequest};
use super::{default_cert_dir, DEFAULT_PORT, RELAY_PATH};
use crate::api::{Instruction, Scheme};
use crate::error::WordTrackError;

/// リレーのホスト名（デフォルト）
pub const DEFAULT_HOST: &str = "localhost";
/// モデル識別子（デフォルト）
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
/// 出力トークン上限（デフォルト）
pub const DEFAULT_MAX_TOKENS: u32 = 4096;
/// 文書コンテキスト（デフォルト）
pub const DEFAULT_CONTEXT: &str = "a general-purpose document";
/// 接続確立（TLSハンドシェイクを含む）の待ち時間（デフォルト）
///
/// 平文HTTPのみで待ち受けるリレーに`https`で接続すると、ハンドシェイクの応答が
/// 返らないまま止まるため、この時間で打ち切って次のスキームへ進みます。
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);

/// システムメッセージに含める簡潔なスタイルガイドライン
pub const STYLE_GUIDELINES: &str = "You are an expert editor revising text inside a Microsoft Word document. \
Follow these style guidelines: prefer clear, concise sentences and the active voice; \
keep the author's terminology, meaning and language; do not invent facts or citations. \
Return only the revised text, without commentary, headings, quotation marks or Markdown.";

/// リレー呼び出しのエラー
///
/// `Display`はタスクペインにそのまま表示できる文言です。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RelayError {
    /// すべてのスキームでトランスポートレベルの失敗
    #[error("Cannot reach the relay server. Please make sure wordtrack-relay is running and try again.")]
    Unreachable,

    /// 成功以外のHTTPステータス（メッセージは判定テーブルで決定）
    #[error("{message}")]
    Status {
        /// HTTPステータスコード
        status: u16,
        /// 表示用メッセージ
        message: String,
    },

    /// 応答に最初のテキストブロックがない
    #[error("Unexpected response format from Claude API.")]
    MalformedResponse,
}

/// HTTP応答（ステータスとボディ）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// トランスポートレベルの失敗（接続不可、TLSハンドシェイク失敗など）
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct TransportError(pub String);

/// リレーへのHTTP送信
pub trait Transport {
    /// JSONボディをPOSTする
    ///
    /// HTTP応答を受け取れた場合はステータスに関わらず`Ok`を返します。
    fn post_json(&self, url: &str, body: &[u8]) -> Result<HttpReply, TransportError>;
}

/// reqwest（blocking）によるトランスポート
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    /// 追加のルート証明書（PEM）を信頼するクライアントを生成
    ///
    /// # 引数
    ///
    /// * `root_certificate_pem` - 追加で信頼するCA証明書（PEM）
    /// * `connect_timeout` - TCP接続とTLSハンドシェイクにかける上限
    pub fn new(
        root_certificate_pem: Option<&[u8]>,
        connect_timeout: Duration,
    ) -> Result<Self, WordTrackError> {
        // 接続確立のみ打ち切る。応答待ちにタイムアウトは設けない
        let mut builder = reqwest::blocking::Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(None::<Duration>);

        if let Some(pem) = root_certificate_pem {
            let certificate = reqwest::Certificate::from_pem(pem)
                .map_err(|e| WordTrackError::Config(format!("Invalid CA certificate: {}", e)))?;
            builder = builder.add_root_certificate(certificate);
        }

        let client = builder
            .build()
            .map_err(|e| WordTrackError::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self { client })
    }
}

impl Transport for ReqwestTransport {
    fn post_json(&self, url: &str, body: &[u8]) -> Result<HttpReply, TransportError> {
        let response = self
            .client
            .post(url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.to_vec())
            .send()
            .map_err(|e| TransportError(e.to_string()))?;

        let status = response.status().as_u16();
        let body = response.text().map_err(|e| TransportError(e.to_string()))?;
        Ok(HttpReply { status, body })
    }
}

/// ステータスコード判定テーブルの1行
struct StatusRule {
    applies: fn(u16, &str) -> bool,
    message: &'static str,
}

fn is_unauthorized(status: u16, _detail: &str) -> bool {
    status == 401
}

fn is_credit_exhausted(status: u16, detail: &str) -> bool {
    status == 402 || (status == 400 && detail.to_lowercase().contains("credit balance"))
}

fn is_rate_limited(status: u16, _detail: &str) -> bool {
    status == 429
}

fn is_relay_internal_error(status: u16, _detail: &str) -> bool {
    status == 500
}

/// 上から順に評価し、最初に一致した行のメッセージを使う
const STATUS_RULES: &[StatusRule] = &[
    StatusRule {
        applies: is_unauthorized,
        message: "Invalid API key. Please check your Claude API key and save it again.",
    },
    StatusRule {
        applies: is_credit_exhausted,
        message: "Your Anthropic account has insufficient credits. Please check your plan and billing.",
    },
    StatusRule {
        applies: is_rate_limited,
        message: "Rate limit exceeded. Please wait a moment and try again.",
    },
    StatusRule {
        applies: is_relay_internal_error,
        message: "The relay server could not complete the request. Check the relay logs and your network connection.",
    },
];

/// 成功以外のステータスを表示用メッセージに変換する
pub fn status_message(status: u16, body: &str) -> String {
    let detail = error_detail(body);
    STATUS_RULES
        .iter()
        .find(|rule| (rule.applies)(status, &detail))
        .map(|rule| rule.message.to_string())
        .unwrap_or_else(|| format!("Claude API error ({}): {}", status, detail))
}

/// リレークライアントの設定
#[derive(Debug, Clone)]
pub(crate) struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub path: String,
    pub model: String,
    pub max_tokens: u32,
    /// 試行するスキームの順序（トランスポート失敗時に次へ進む）
    pub schemes: Vec<Scheme>,
    pub ca_certificate: Option<PathBuf>,
    pub connect_timeout: Duration,
    pub context: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            path: RELAY_PATH.to_string(),
            model: DEFAULT_MODEL.to_string(),
            max_tokens: DEFAULT_MAX_TOKENS,
            schemes: vec![Scheme::Https, Scheme::Http],
            ca_certificate: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            context: DEFAULT_CONTEXT.to_string(),
        }
    }
}

/// `RelayClient`を段階的に構築するビルダー
///
/// # 使用例
///
/// ```rust,no_run
/// use wordtrack::{RelayClientBuilder, Scheme};
///
/// # fn main() -> Result<(), wordtrack::WordTrackError> {
/// let client = RelayClientBuilder::new()
///     .with_port(3001)
///     .with_max_tokens(1024)
///     .with_schemes(vec![Scheme::Http])
///     .build()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Default)]
pub struct RelayClientBuilder {
    config: ClientConfig,
}

impl RelayClientBuilder {
    /// デフォルト設定を持つビルダーを生成する
    ///
    /// # デフォルト設定
    ///
    /// - エンドポイント: `https://localhost:3001/api/claude`（失敗時は`http`）
    /// - モデル: [`DEFAULT_MODEL`]
    /// - トークン上限: 4096
    /// - 接続待ち: [`DEFAULT_CONNECT_TIMEOUT`]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.config.host = host.into();
        self
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.config.port = port;
        self
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.config.path = path.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.config.max_tokens = max_tokens;
        self
    }

    /// 試行するスキームの順序を指定する
    pub fn with_schemes(mut self, schemes: Vec<Scheme>) -> Self {
        self.config.schemes = schemes;
        self
    }

    /// 追加で信頼するCA証明書（PEM）のパス
    ///
    /// 指定しない場合は、開発用証明書ディレクトリの`ca.crt`があれば使用します。
    pub fn with_ca_certificate(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.ca_certificate = Some(path.into());
        self
    }

    /// 接続確立（TLSハンドシェイクを含む）の待ち時間
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// 指示に添える文書コンテキストの既定値
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.config.context = context.into();
        self
    }

    /// reqwestトランスポートでクライアントを構築する
    ///
    /// # 戻り値
    ///
    /// * `Ok(RelayClient)` - 設定が有効な場合
    /// * `Err(WordTrackError::Config)` - 設定が無効、または指定したCA証明書を読めない場合
    pub fn build(self) -> Result<RelayClient<ReqwestTransport>, WordTrackError> {
        self.validate()?;

        let pem = match &self.config.ca_certificate {
            Some(path) => Some(fs::read(path).map_err(|e| {
                WordTrackError::Config(format!(
                    "Cannot read CA certificate {}: {}",
                    path.display(),
                    e
                ))
            })?),
            None => default_cert_dir().and_then(|dir| {
                let path = dir.join("ca.crt");
                match fs::read(&path) {
                    Ok(pem) => Some(pem),
                    Err(e) => {
                        debug!(path = %path.display(), error = %e, "No development CA certificate loaded");
                        None
                    }
                }
            }),
        };

        let connect_timeout = self.config.connect_timeout;
        let transport = match ReqwestTransport::new(pem.as_deref(), connect_timeout) {
            Ok(transport) => transport,
            Err(e) if self.config.ca_certificate.is_none() => {
                warn!(error = %e, "Ignoring unusable development CA certificate");
                ReqwestTransport::new(None, connect_timeout)?
            }
            Err(e) => return Err(e),
        };

        Ok(RelayClient {
            config: self.config,
            transport,
        })
    }

    /// 任意のトランスポートでクライアントを構築する
    pub fn build_with_transport<T: Transport>(
        self,
        transport: T,
    ) -> Result<RelayClient<T>, WordTrackError> {
        self.validate()?;
        Ok(RelayClient {
            config: self.config,
            transport,
        })
    }

    fn validate(&self) -> Result<(), WordTrackError> {
        let config = &self.config;
        if config.host.trim().is_empty() {
            return Err(WordTrackError::Config("Relay host must not be empty".to_string()));
        }
        if !config.path.starts_with('/') {
            return Err(WordTrackError::Config(format!(
                "Relay path must start with '/': '{}'",
                config.path
            )));
        }
        if config.model.trim().is_empty() {
            return Err(WordTrackError::Config("Model must not be empty".to_string()));
        }
        if config.max_tokens == 0 {
            return Err(WordTrackError::Config(
                "max_tokens must be greater than 0".to_string(),
            ));
        }
        if config.connect_timeout.is_zero() {
            return Err(WordTrackError::Config(
                "connect_timeout must be greater than 0".to_string(),
            ));
        }
        if config.schemes.is_empty() {
            return Err(WordTrackError::Config(
                "At least one relay scheme is required".to_string(),
            ));
        }
        Ok(())
    }
}

/// リレークライアント
#[derive(Debug)]
pub struct RelayClient<T: Transport = ReqwestTransport> {
    config: ClientConfig,
    transport: T,
}

impl<T: Transport> RelayClient<T> {
    /// スキームごとのエンドポイントURL
    pub fn endpoint(&self, scheme: Scheme) -> String {
        format!(
            "{}://{}:{}{}",
            scheme, self.config.host, self.config.port, self.config.path
        )
    }

    /// 既定の文書コンテキスト
    pub fn default_context(&self) -> &str {
        &self.config.context
    }

    /// リクエストボディを組み立てる
    ///
    /// システムメッセージにはスタイルガイドラインと文書コンテキストを、
    /// ユーザーメッセージには指示文と本文を入れます。
    pub fn build_request(
        &self,
        text: &str,
        instruction: &Instruction,
        context: &str,
        api_key: &str,
    ) -> RelayRequest {
        let system = format!("{}\n\nDocument context: {}", STYLE_GUIDELINES, context);
        let user = format!("{}\n\n{}", instruction.text(), text);

        RelayRequest {
            api_key: api_key.to_string(),
            model: self.config.model.clone(),
            max_tokens: self.config.max_tokens,
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
        }
    }

    /// 本文と指示を送信し、応答テキストを返す
    pub fn complete(
        &self,
        text: &str,
        instruction: &Instruction,
        context: &str,
        api_key: &str,
    ) -> Result<String, RelayError> {
        let request = self.build_request(text, instruction, context, api_key);
        self.send(&request)
    }

    /// リクエストを送信する
    ///
    /// スキームを順に試し、トランスポートレベルで失敗した場合のみ次のスキームへ
    /// 進みます。HTTP応答を受け取った時点で（ステータスに関わらず）終了します。
    pub fn send(&self, request: &RelayRequest) -> Result<String, RelayError> {
        // RelayRequestは文字列と数値のみのためシリアライズは失敗しない
        let body = serde_json::to_vec(request).map_err(|_| RelayError::MalformedResponse)?;

        for scheme in &self.config.schemes {
            let url = self.endpoint(*scheme);
            info!(%scheme, chars = request_chars(request), "Sending request to relay");

            match self.transport.post_json(&url, &body) {
                Ok(reply) => return interpret_reply(&reply),
                Err(e) => {
                    warn!(%scheme, error = %e, "Relay request failed at transport level");
                }
            }
        }

        Err(RelayError::Unreachable)
    }
}

fn request_chars(request: &RelayRequest) -> usize {
    request.messages.iter().map(|m| m.content.len()).sum()
}

/// HTTP応答を解釈する
fn interpret_reply(reply: &HttpReply) -> Result<String, RelayError> {
    if !reply.is_success() {
        let message = status_message(reply.status, &reply.body);
        warn!(status = reply.status, "Relay returned an error status");
        return Err(RelayError::Status {
            status: reply.status,
            message,
        });
    }

    let response: MessagesResponse =
        serde_json::from_str(&reply.body).map_err(|_| RelayError::MalformedResponse)?;
    let text = response
        .first_text_block()
        .ok_or(RelayError::MalformedResponse)?;

    info!(chars = text.len(), "Received response from relay");
    Ok(text.to_string())
}
