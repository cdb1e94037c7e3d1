//! Error Types Module
//!
//! クレート全体で使用する構造化エラー型を定義するモジュール。
//! `thiserror`を使用して、エラーの自動変換とメッセージフォーマットを実現する。
//!
//! ユーザー入力エラーとホストエラーの`Display`はタスクペインにそのまま表示される
//! 文言になっています。

use thiserror::Error;

use crate::host::HostError;
use crate::relay::RelayError;

/// ホスト操作の種類（エラーメッセージの接頭辞に使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HostAction {
    /// 選択範囲の取得
    RetrievingSelection,
    /// テキストの挿入
    InsertingText,
}

impl std::fmt::Display for HostAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostAction::RetrievingSelection => write!(f, "retrieving selected text"),
            HostAction::InsertingText => write!(f, "inserting text"),
        }
    }
}

/// wordtrackクレート全体で使用するエラー型
///
/// # エラーの種類
///
/// - ユーザー入力エラー: `EmptySelection`, `NoSelectionCaptured`, `NoPendingResponse`,
///   `EmptyInstruction`, `MissingApiKey`, `InvalidApiKey`
/// - ホストエラー: `Host`
/// - リレー/ネットワークエラー: `Relay`
/// - マークアップエラー: `Xml`（プレビュー生成時はローカルで回復され、表示されない）
/// - その他: `Io`, `Json`, `Config`, `Storage`
///
/// # 使用例
///
/// ```rust
/// use wordtrack::WordTrackError;
///
/// let error = WordTrackError::EmptySelection;
/// assert!(error.to_string().starts_with("No text is currently selected"));
/// ```
#[derive(Error, Debug)]
pub enum WordTrackError {
    /// I/O操作中に発生したエラー
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSONのシリアライズ/デシリアライズエラー
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// OOXMLの解析エラー
    #[error("XML parse error: {0}")]
    Xml(String),

    /// 設定の検証に失敗したエラー
    ///
    /// `RelayClientBuilder::build()`などで無効な設定が検出された場合に発生します。
    #[error("Configuration error: {0}")]
    Config(String),

    /// 資格情報ストレージの読み書きエラー
    #[error("Storage error: {0}")]
    Storage(String),

    /// 選択範囲が空（トリム後）
    #[error("No text is currently selected. Please select some text in your document and try again.")]
    EmptySelection,

    /// 選択範囲がまだ取得されていない
    #[error("Please select text first using \"Get Selected Text\" button.")]
    NoSelectionCaptured,

    /// 挿入するリレー応答がない
    #[error("No Claude response to insert. Please get a response from Claude first.")]
    NoPendingResponse,

    /// 自由記述の指示が空
    #[error("Please enter an instruction for Claude.")]
    EmptyInstruction,

    /// APIキーが保存されていない
    #[error("Please enter and save your Claude API key first.")]
    MissingApiKey,

    /// APIキーの形式が不正（保存時の検証）
    #[error("{0}")]
    InvalidApiKey(String),

    /// ホスト（ドキュメントAPI）の呼び出しに失敗したエラー
    #[error("Error {action}: {source}")]
    Host {
        /// 失敗した操作
        action: HostAction,
        /// ホストが返したエラー
        #[source]
        source: HostError,
    },

    /// リレー呼び出しのエラー（メッセージは判定テーブルで決定済み）
    #[error(transparent)]
    Relay(#[from] RelayError),
}

impl WordTrackError {
    /// ホストエラーを操作種別付きでラップする
    pub fn host(action: HostAction, source: HostError) -> Self {
        WordTrackError::Host { action, source }
    }

    /// ユーザー入力に起因するエラーかどうか
    ///
    /// ユーザー入力エラーはインラインで表示され、再試行は行われません。
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            WordTrackError::EmptySelection
                | WordTrackError::NoSelectionCaptured
                | WordTrackError::NoPendingResponse
                | WordTrackError::EmptyInstruction
                | WordTrackError::MissingApiKey
                | WordTrackError::InvalidApiKey(_)
        )
    }
}
