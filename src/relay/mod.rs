//! Relay Module
//!
//! タスクペインとベンダーAPIの間に立つローカルリレーの、
//! クライアント側とサーバー側の両方を提供します。

use std::env;
use std::path::PathBuf;

mod client;
mod protocol;
mod server;

pub use client::{
    status_message, HttpReply, RelayClient, RelayClientBuilder, RelayError, ReqwestTransport,
    Transport, TransportError, DEFAULT_CONNECT_TIMEOUT, DEFAULT_CONTEXT, DEFAULT_HOST,
    DEFAULT_MAX_TOKENS, DEFAULT_MODEL, STYLE_GUIDELINES,
};
pub use protocol::{
    build_forward_body, error_body, error_detail, ChatMessage, ContentBlock, MessagesResponse,
    RelayRequest, ROLE_SYSTEM, ROLE_USER,
};
pub use server::{
    route, run_main, Args, RelayResponse, RelayServer, ReqwestUpstream, Upstream, UpstreamReply,
    ANTHROPIC_VERSION, DEFAULT_UPSTREAM_URL,
};

/// リレーの待ち受けポート
pub const DEFAULT_PORT: u16 = 3001;
/// リレーのエンドポイントパス
pub const RELAY_PATH: &str = "/api/claude";
/// 開発用証明書ディレクトリ名（ホームディレクトリ直下）
pub const DEV_CERTS_DIR_NAME: &str = ".office-addin-dev-certs";

/// 開発用証明書ディレクトリ
///
/// `HOME`、なければ`USERPROFILE`の直下です。どちらも未設定なら`None`。
pub fn default_cert_dir() -> Option<PathBuf> {
    env::var_os("HOME")
        .filter(|home| !home.is_empty())
        .or_else(|| env::var_os("USERPROFILE").filter(|home| !home.is_empty()))
        .map(|home| PathBuf::from(home).join(DEV_CERTS_DIR_NAME))
}
