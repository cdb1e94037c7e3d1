//! Task Pane Session
//!
//! タスクペイン1つ分の状態（直近の選択テキスト、その代表書式、リレーの応答、
//! APIキー）と、ボタン操作に対応する処理をまとめます。
//!
//! キャッシュは直近に成功した取得・呼び出しの結果だけを保持し、履歴は持ちません。
//! 失敗した操作はキャッシュを変更しないため、いつでも再試行できます。

use tracing::{info, warn};

use crate::api::Instruction;
use crate::credentials::{load_api_key, save_api_key, CredentialStore};
use crate::error::{HostAction, WordTrackError};
use crate::formatting::aggregate_formatting;
use crate::host::DocumentHost;
use crate::ooxml::convert_ooxml_to_html;
use crate::relay::{RelayClient, Transport};
use crate::text::capitalize_words;
use crate::types::AggregatedFormatting;
use crate::writer::{insert_with_tracking, InsertedContent};

/// 選択範囲のプレビュー
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Preview {
    /// トリム済みの選択テキスト
    pub text: String,
    /// 書式付きプレビュー（HTML）
    pub html: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Success,
    Error,
}

/// タスクペインに表示するメッセージ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    /// エラーを表示用メッセージに変換する
    pub fn from_error(error: &WordTrackError) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: error.to_string(),
        }
    }

    pub fn is_success(&self) -> bool {
        self.level == NoticeLevel::Success
    }
}

impl From<Result<String, WordTrackError>> for Notice {
    fn from(result: Result<String, WordTrackError>) -> Self {
        match result {
            Ok(message) => Notice::success(message),
            Err(e) => {
                if !e.is_user_input() {
                    warn!(error = %e, "Operation failed");
                }
                Notice::from_error(&e)
            }
        }
    }
}

/// タスクペインのセッション
#[derive(Debug, Clone, Default)]
pub struct Session {
    selected_text: Option<String>,
    formatting: Option<AggregatedFormatting>,
    pending_response: Option<String>,
    credential: Option<String>,
}

impl Session {
    /// 保存済みのAPIキーを読み込んでセッションを開始する
    ///
    /// ストレージを読めない場合はAPIキーなしで開始します。
    pub fn load(store: &dyn CredentialStore) -> Self {
        let credential = match load_api_key(store) {
            Ok(credential) => credential,
            Err(e) => {
                warn!(error = %e, "Could not load stored API key");
                None
            }
        };
        info!(has_api_key = credential.is_some(), "Session started");

        Self {
            credential,
            ..Self::default()
        }
    }

    pub fn selected_text(&self) -> Option<&str> {
        self.selected_text.as_deref()
    }

    pub fn formatting(&self) -> Option<&AggregatedFormatting> {
        self.formatting.as_ref()
    }

    pub fn pending_response(&self) -> Option<&str> {
        self.pending_response.as_deref()
    }

    pub fn has_credential(&self) -> bool {
        self.credential.is_some()
    }

    /// 選択範囲を取得してプレビューを作る
    ///
    /// # 戻り値
    ///
    /// * `Ok(Preview)` - 取得に成功した場合（選択テキストと代表書式を更新）
    /// * `Err(WordTrackError::EmptySelection)` - トリム後の選択テキストが空の場合
    /// * `Err(WordTrackError::Host)` - ホストの呼び出しに失敗した場合
    pub fn capture_selection<H: DocumentHost + ?Sized>(
        &mut self,
        host: &mut H,
    ) -> Result<Preview, WordTrackError> {
        let retrieving = |e| WordTrackError::host(HostAction::RetrievingSelection, e);

        let text = host.selection_text().map_err(retrieving)?;
        let ooxml = host.selection_ooxml().map_err(retrieving)?;

        let text = text.trim();
        if text.is_empty() {
            return Err(WordTrackError::EmptySelection);
        }

        let html = convert_ooxml_to_html(&ooxml, text);
        let formatting = aggregate_formatting(&ooxml);
        info!(
            chars = text.len(),
            attributes = formatting.attribute_count(),
            "Selection captured"
        );

        self.selected_text = Some(text.to_string());
        self.formatting = Some(formatting);

        Ok(Preview {
            text: text.to_string(),
            html,
        })
    }

    /// 選択テキストの各単語を大文字で始めて挿入する
    pub fn capitalize_and_insert<H: DocumentHost + ?Sized>(&mut self, host: &mut H) -> Notice {
        let result = self
            .selected_text
            .as_deref()
            .ok_or(WordTrackError::NoSelectionCaptured)
            .and_then(|text| {
                let capitalized = capitalize_words(text);
                insert_with_tracking(host, &capitalized, self.formatting.as_ref())
            })
            .map(|report| report.message(InsertedContent::CapitalizedText));

        Notice::from(result)
    }

    /// 選択テキストと指示をリレーへ送り、応答を保持する
    ///
    /// # 引数
    ///
    /// * `client` - リレークライアント
    /// * `instruction` - 指示
    /// * `context` - 文書コンテキスト（`None`ならクライアントの既定値）
    ///
    /// # 戻り値
    ///
    /// * `Ok(&str)` - 応答テキスト（挿入待ちとして保持）
    /// * `Err(WordTrackError)` - 選択テキストやAPIキーがない場合、指示が空の場合、
    ///   リレー呼び出しに失敗した場合
    pub fn request_completion<T: Transport>(
        &mut self,
        client: &RelayClient<T>,
        instruction: &Instruction,
        context: Option<&str>,
    ) -> Result<&str, WordTrackError> {
        let text = self
            .selected_text
            .as_deref()
            .ok_or(WordTrackError::NoSelectionCaptured)?;
        let api_key = self
            .credential
            .as_deref()
            .ok_or(WordTrackError::MissingApiKey)?;
        if instruction.is_blank() {
            return Err(WordTrackError::EmptyInstruction);
        }

        let context = context.unwrap_or_else(|| client.default_context());
        let response = client.complete(text, instruction, context, api_key)?;

        Ok(self.pending_response.insert(response).as_str())
    }

    /// 保持しているリレーの応答を挿入する
    pub fn insert_pending_response<H: DocumentHost + ?Sized>(&mut self, host: &mut H) -> Notice {
        let result = self
            .pending_response
            .as_deref()
            .ok_or(WordTrackError::NoPendingResponse)
            .and_then(|response| {
                insert_with_tracking(host, response, self.formatting.as_ref())
            })
            .map(|report| report.message(InsertedContent::RelayResponse));

        Notice::from(result)
    }

    /// APIキーを検証して保存する
    ///
    /// 検証や保存に失敗した場合、セッションとストレージの値は変わりません。
    pub fn save_credential(&mut self, store: &mut dyn CredentialStore, value: &str) -> Notice {
        let result = save_api_key(store, value).map(|()| {
            self.credential = Some(value.to_string());
            "API key saved.".to_string()
        });

        Notice::from(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MemoryCredentialStore;
    use crate::host::{HostCall, MemoryDocument};

    #[test]
    fn test_capture_trims_and_caches() {
        let mut session = Session::default();
        let mut document = MemoryDocument::new("  hello world \n");

        let preview = session.capture_selection(&mut document).unwrap();
        assert_eq!(preview.text, "hello world");
        assert_eq!(session.selected_text(), Some("hello world"));
        assert!(session.formatting().is_some());
    }

    #[test]
    fn test_empty_capture_leaves_cache_untouched() {
        let mut session = Session::default();
        session
            .capture_selection(&mut MemoryDocument::new("first"))
            .unwrap();

        let error = session
            .capture_selection(&mut MemoryDocument::new("   "))
            .unwrap_err();
        assert!(matches!(error, WordTrackError::EmptySelection));
        assert_eq!(session.selected_text(), Some("first"));
    }

    #[test]
    fn test_capture_host_failure() {
        let mut session = Session::default();
        let mut document =
            MemoryDocument::new("text").fail_on(HostCall::SelectionOoxml, "Range is invalid");

        let error = session.capture_selection(&mut document).unwrap_err();
        assert_eq!(
            error.to_string(),
            "Error retrieving selected text: Range is invalid"
        );
        assert_eq!(session.selected_text(), None);
    }

    #[test]
    fn test_capitalize_requires_capture() {
        let mut session = Session::default();
        let notice = session.capitalize_and_insert(&mut MemoryDocument::new("text"));

        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(
            notice.message,
            "Please select text first using \"Get Selected Text\" button."
        );
    }

    #[test]
    fn test_capitalize_and_insert() {
        let mut session = Session::default();
        let mut document = MemoryDocument::new("hello WORLD");
        session.capture_selection(&mut document).unwrap();

        let notice = session.capitalize_and_insert(&mut document);
        assert!(notice.is_success());
        assert!(notice.message.starts_with("Text has been capitalized and inserted"));
        assert!(notice.message.ends_with("Changes are tracked."));
        assert_eq!(document.selection(), "Hello World");
    }

    #[test]
    fn test_insert_without_response() {
        let mut session = Session::default();
        let notice = session.insert_pending_response(&mut MemoryDocument::new("x"));

        assert_eq!(
            notice,
            Notice::from_error(&WordTrackError::NoPendingResponse)
        );
    }

    #[test]
    fn test_save_credential() {
        let mut store = MemoryCredentialStore::new();
        let mut session = Session::load(&store);
        assert!(!session.has_credential());

        let notice = session.save_credential(&mut store, "not-a-key");
        assert_eq!(notice.message, "API key should start with sk-ant-");
        assert!(!session.has_credential());

        let notice = session.save_credential(&mut store, "sk-ant-abc");
        assert_eq!(notice, Notice::success("API key saved."));
        assert!(Session::load(&store).has_credential());
    }
}
