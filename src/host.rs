//! Document Host Module
//!
//! 文書編集API（選択範囲の読み書き、変更履歴の切り替え）との境界です。
//! 実際のWordとの接続はこのトレイトの実装側が担います。

use std::collections::HashMap;

use thiserror::Error;

use crate::text::escape_html;
use crate::types::FontAttribute;

/// ホストが返したエラー
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct HostError {
    message: String,
}

impl HostError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// 文書編集API
///
/// 書き込み系の操作は[`DocumentHost::sync`]を呼ぶまで確定しないホストもあります。
pub trait DocumentHost {
    /// 選択範囲のプレーンテキスト
    fn selection_text(&mut self) -> Result<String, HostError>;

    /// 選択範囲のOOXML
    fn selection_ooxml(&mut self) -> Result<String, HostError>;

    /// 変更履歴の状態
    ///
    /// # 戻り値
    ///
    /// * `Ok(Some(enabled))` - 現在の状態
    /// * `Ok(None)` - ホストが変更履歴に対応していない
    fn track_revisions(&mut self) -> Result<Option<bool>, HostError>;

    /// 変更履歴の有効/無効を設定する
    fn set_track_revisions(&mut self, enabled: bool) -> Result<(), HostError>;

    /// 選択範囲をテキストで置き換える
    fn replace_selection(&mut self, text: &str) -> Result<(), HostError>;

    /// 直前に挿入した範囲にフォント属性を1つ適用する
    fn set_font(&mut self, attribute: &FontAttribute) -> Result<(), HostError>;

    /// 保留中の操作を確定する
    fn sync(&mut self) -> Result<(), HostError> {
        Ok(())
    }
}

/// ホスト操作の種類（失敗の注入に使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HostCall {
    SelectionText,
    SelectionOoxml,
    TrackRevisions,
    SetTrackRevisions,
    ReplaceSelection,
    SetFont,
    Sync,
}

/// 記録されたホスト操作
#[derive(Debug, Clone, PartialEq)]
pub enum HostOp {
    ReadSelectionText,
    ReadSelectionOoxml,
    ReadTrackRevisions,
    SetTrackRevisions(bool),
    ReplaceSelection(String),
    SetFont(FontAttribute),
    Sync,
}

/// メモリ上の文書
///
/// 選択範囲、変更履歴の状態、保護フラグを持ち、呼び出された操作を順に記録します。
/// 任意の操作に失敗を注入できます。
///
/// # 使用例
///
/// ```rust
/// use wordtrack::{DocumentHost, MemoryDocument};
///
/// let mut document = MemoryDocument::new("hello world").with_track_revisions(Some(false));
/// assert_eq!(document.selection_text().unwrap(), "hello world");
/// document.set_track_revisions(true).unwrap();
/// assert_eq!(document.track_revisions_state(), Some(true));
/// ```
#[derive(Debug, Clone)]
pub struct MemoryDocument {
    selection: String,
    ooxml: Option<String>,
    track_revisions: Option<bool>,
    protected: bool,
    failures: HashMap<HostCall, String>,
    operations: Vec<HostOp>,
}

impl MemoryDocument {
    /// 選択範囲を持つ文書を生成（変更履歴は対応済み・無効）
    pub fn new(selection: impl Into<String>) -> Self {
        Self {
            selection: selection.into(),
            ooxml: None,
            track_revisions: Some(false),
            protected: false,
            failures: HashMap::new(),
            operations: Vec::new(),
        }
    }

    /// 選択範囲のOOXMLを指定する
    ///
    /// 指定しない場合は、選択テキストを書式なしの段落として表したOOXMLを返します。
    pub fn with_ooxml(mut self, ooxml: impl Into<String>) -> Self {
        self.ooxml = Some(ooxml.into());
        self
    }

    /// 変更履歴の状態（`None`は非対応）
    pub fn with_track_revisions(mut self, state: Option<bool>) -> Self {
        self.track_revisions = state;
        self
    }

    /// 文書を保護する（変更履歴の切り替えが失敗する）
    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }

    /// 指定した操作を失敗させる
    pub fn fail_on(mut self, call: HostCall, message: impl Into<String>) -> Self {
        self.failures.insert(call, message.into());
        self
    }

    /// 現在の選択範囲のテキスト
    pub fn selection(&self) -> &str {
        &self.selection
    }

    /// 現在の変更履歴の状態
    pub fn track_revisions_state(&self) -> Option<bool> {
        self.track_revisions
    }

    /// 呼び出された操作の記録
    pub fn operations(&self) -> &[HostOp] {
        &self.operations
    }

    /// 適用されたフォント属性
    pub fn applied_font(&self) -> Vec<&FontAttribute> {
        self.operations
            .iter()
            .filter_map(|op| match op {
                HostOp::SetFont(attribute) => Some(attribute),
                _ => None,
            })
            .collect()
    }

    fn record(&mut self, call: HostCall, op: HostOp) -> Result<(), HostError> {
        self.operations.push(op);
        match self.failures.get(&call) {
            Some(message) => Err(HostError::new(message.clone())),
            None => Ok(()),
        }
    }

    fn plain_ooxml(&self) -> String {
        let paragraphs: String = self
            .selection
            .split('\n')
            .map(|line| {
                format!(
                    "<w:p><w:r><w:t xml:space=\"preserve\">{}</w:t></w:r></w:p>",
                    escape_html(line)
                )
            })
            .collect();
        format!(
            "<w:document xmlns:w=\"http://schemas.openxmlformats.org/wordprocessingml/2006/main\"><w:body>{}</w:body></w:document>",
            paragraphs
        )
    }
}

impl DocumentHost for MemoryDocument {
    fn selection_text(&mut self) -> Result<String, HostError> {
        self.record(HostCall::SelectionText, HostOp::ReadSelectionText)?;
        Ok(self.selection.clone())
    }

    fn selection_ooxml(&mut self) -> Result<String, HostError> {
        self.record(HostCall::SelectionOoxml, HostOp::ReadSelectionOoxml)?;
        Ok(self.ooxml.clone().unwrap_or_else(|| self.plain_ooxml()))
    }

    fn track_revisions(&mut self) -> Result<Option<bool>, HostError> {
        self.record(HostCall::TrackRevisions, HostOp::ReadTrackRevisions)?;
        Ok(self.track_revisions)
    }

    fn set_track_revisions(&mut self, enabled: bool) -> Result<(), HostError> {
        self.record(HostCall::SetTrackRevisions, HostOp::SetTrackRevisions(enabled))?;
        if self.track_revisions.is_none() {
            return Err(HostError::new("Track changes is not supported"));
        }
        if self.protected {
            return Err(HostError::new("The document is protected"));
        }
        self.track_revisions = Some(enabled);
        Ok(())
    }

    fn replace_selection(&mut self, text: &str) -> Result<(), HostError> {
        self.record(
            HostCall::ReplaceSelection,
            HostOp::ReplaceSelection(text.to_string()),
        )?;
        self.selection = text.to_string();
        self.ooxml = None;
        Ok(())
    }

    fn set_font(&mut self, attribute: &FontAttribute) -> Result<(), HostError> {
        self.record(HostCall::SetFont, HostOp::SetFont(attribute.clone()))
    }

    fn sync(&mut self) -> Result<(), HostError> {
        self.record(HostCall::Sync, HostOp::Sync)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ooxml::parse_fragment;

    #[test]
    fn test_operations_are_recorded() {
        let mut document = MemoryDocument::new("text");
        document.selection_text().unwrap();
        document.replace_selection("TEXT").unwrap();
        document.sync().unwrap();

        assert_eq!(
            document.operations(),
            &[
                HostOp::ReadSelectionText,
                HostOp::ReplaceSelection("TEXT".to_string()),
                HostOp::Sync
            ]
        );
        assert_eq!(document.selection(), "TEXT");
    }

    #[test]
    fn test_failure_injection() {
        let mut document =
            MemoryDocument::new("text").fail_on(HostCall::SelectionText, "Range is invalid");

        let error = document.selection_text().unwrap_err();
        assert_eq!(error.message(), "Range is invalid");
        assert!(document.selection_ooxml().is_ok());
    }

    #[test]
    fn test_protected_document_rejects_tracking() {
        let mut document = MemoryDocument::new("text").protected();

        assert!(document.set_track_revisions(true).is_err());
        assert_eq!(document.track_revisions_state(), Some(false));
    }

    #[test]
    fn test_unsupported_tracking() {
        let mut document = MemoryDocument::new("text").with_track_revisions(None);

        assert_eq!(document.track_revisions().unwrap(), None);
        assert!(document.set_track_revisions(true).is_err());
    }

    #[test]
    fn test_default_ooxml_parses_to_selection() {
        let mut document = MemoryDocument::new("a < b\nsecond line");
        let xml = document.selection_ooxml().unwrap();
        let fragment = parse_fragment(&xml).unwrap();

        assert_eq!(fragment.plain_text(), "a < b\nsecond line");
    }
}
