//! Insertion Writer
//!
//! 変更履歴を有効にしてから選択範囲を置き換え、代表書式を再適用します。
//! 変更履歴を有効にできなくても挿入は続行し、完了メッセージだけが変わります。

use tracing::{debug, info, warn};

use crate::error::{HostAction, WordTrackError};
use crate::host::DocumentHost;
use crate::types::AggregatedFormatting;

/// 変更履歴を有効にする
///
/// # 戻り値
///
/// 挿入が変更履歴として記録される見込みなら`true`。
/// ホストが非対応、状態の読み書きに失敗（保護された文書など）した場合は`false`。
/// エラーは返しません。
pub fn ensure_track_changes<H: DocumentHost + ?Sized>(host: &mut H) -> bool {
    match host.track_revisions() {
        Ok(None) => {
            debug!("Host does not support track changes");
            false
        }
        Ok(Some(true)) => true,
        Ok(Some(false)) => match host.set_track_revisions(true).and_then(|()| host.sync()) {
            Ok(()) => {
                info!("Track changes enabled");
                true
            }
            Err(e) => {
                warn!(error = %e, "Could not enable track changes");
                false
            }
        },
        Err(e) => {
            warn!(error = %e, "Could not read track changes state");
            false
        }
    }
}

/// 挿入の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertReport {
    /// 変更履歴が有効だった
    pub tracked: bool,
    /// 書式を再適用した
    pub formatted: bool,
}

/// 挿入した内容の種類（完了メッセージの文言に使用）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertedContent {
    /// 各単語を大文字で始めた選択テキスト
    CapitalizedText,
    /// リレーの応答
    RelayResponse,
}

impl InsertReport {
    /// 完了メッセージ
    pub fn message(&self, content: InsertedContent) -> String {
        let subject = match content {
            InsertedContent::CapitalizedText => "Text has been capitalized and inserted",
            InsertedContent::RelayResponse => "Claude's response has been inserted",
        };
        let formatting = if self.formatted {
            " with formatting preserved"
        } else {
            ""
        };
        let tracking = if self.tracked {
            "Changes are tracked."
        } else {
            "Make sure Track Changes is enabled in Word to see the changes tracked."
        };
        format!("{}{}. {}", subject, formatting, tracking)
    }
}

/// 変更履歴付きで選択範囲を置き換える
///
/// # 引数
///
/// * `host` - 文書ホスト
/// * `text` - 挿入するテキスト
/// * `formatting` - 再適用する代表書式（属性が1つもなければ適用しない）
///
/// # 戻り値
///
/// * `Ok(InsertReport)` - 挿入に成功した場合
/// * `Err(WordTrackError::Host)` - 置き換え、書式適用、確定のいずれかに失敗した場合
pub fn insert_with_tracking<H: DocumentHost + ?Sized>(
    host: &mut H,
    text: &str,
    formatting: Option<&AggregatedFormatting>,
) -> Result<InsertReport, WordTrackError> {
    let inserting = |e| WordTrackError::host(HostAction::InsertingText, e);

    let tracked = ensure_track_changes(host);
    host.replace_selection(text).map_err(inserting)?;

    let formatted = match formatting {
        Some(formatting) if !formatting.is_empty() => {
            for attribute in formatting.attributes() {
                host.set_font(&attribute).map_err(inserting)?;
            }
            true
        }
        _ => false,
    };

    host.sync().map_err(inserting)?;

    info!(chars = text.len(), tracked, formatted, "Text inserted");
    Ok(InsertReport { tracked, formatted })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{HostCall, HostOp, MemoryDocument};
    use crate::types::FontAttribute;

    #[test]
    fn test_guard_enables_tracking() {
        let mut document = MemoryDocument::new("x").with_track_revisions(Some(false));

        assert!(ensure_track_changes(&mut document));
        assert_eq!(document.track_revisions_state(), Some(true));
        assert!(document
            .operations()
            .contains(&HostOp::SetTrackRevisions(true)));
    }

    #[test]
    fn test_guard_skips_write_when_already_on() {
        let mut document = MemoryDocument::new("x").with_track_revisions(Some(true));

        assert!(ensure_track_changes(&mut document));
        assert_eq!(document.operations(), &[HostOp::ReadTrackRevisions]);
    }

    #[test]
    fn test_guard_unsupported_or_failing() {
        let mut unsupported = MemoryDocument::new("x").with_track_revisions(None);
        assert!(!ensure_track_changes(&mut unsupported));

        let mut protected = MemoryDocument::new("x").protected();
        assert!(!ensure_track_changes(&mut protected));

        let mut unreadable =
            MemoryDocument::new("x").fail_on(HostCall::TrackRevisions, "not available");
        assert!(!ensure_track_changes(&mut unreadable));
    }

    #[test]
    fn test_insert_order_guard_replace_format_sync() {
        let mut document = MemoryDocument::new("old");
        let formatting = AggregatedFormatting {
            bold: Some(true),
            italic: Some(false),
            ..Default::default()
        };

        let report = insert_with_tracking(&mut document, "NEW", Some(&formatting)).unwrap();
        assert_eq!(
            report,
            InsertReport {
                tracked: true,
                formatted: true
            }
        );
        assert_eq!(
            document.operations(),
            &[
                HostOp::ReadTrackRevisions,
                HostOp::SetTrackRevisions(true),
                HostOp::Sync,
                HostOp::ReplaceSelection("NEW".to_string()),
                HostOp::SetFont(FontAttribute::Bold(true)),
                HostOp::SetFont(FontAttribute::Italic(false)),
                HostOp::Sync,
            ]
        );
    }

    #[test]
    fn test_empty_formatting_is_not_applied() {
        let mut document = MemoryDocument::new("old");
        let report =
            insert_with_tracking(&mut document, "new", Some(&AggregatedFormatting::default()))
                .unwrap();

        assert!(!report.formatted);
        assert!(document.applied_font().is_empty());
    }

    #[test]
    fn test_protected_document_still_inserts() {
        let mut document = MemoryDocument::new("old").protected();
        let report = insert_with_tracking(&mut document, "new", None).unwrap();

        assert!(!report.tracked);
        assert_eq!(document.selection(), "new");
    }

    #[test]
    fn test_replace_failure_is_host_error() {
        let mut document =
            MemoryDocument::new("old").fail_on(HostCall::ReplaceSelection, "Range is locked");
        let error = insert_with_tracking(&mut document, "new", None).unwrap_err();

        assert_eq!(error.to_string(), "Error inserting text: Range is locked");
    }

    #[test]
    fn test_messages() {
        let tracked = InsertReport {
            tracked: true,
            formatted: true,
        };
        assert_eq!(
            tracked.message(InsertedContent::CapitalizedText),
            "Text has been capitalized and inserted with formatting preserved. Changes are tracked."
        );

        let untracked = InsertReport {
            tracked: false,
            formatted: false,
        };
        assert_eq!(
            untracked.message(InsertedContent::RelayResponse),
            "Claude's response has been inserted. Make sure Track Changes is enabled in Word to see the changes tracked."
        );
    }
}
