//! Public API Types
//!
//! 公開APIで使用する列挙型を定義するモジュール。

use std::fmt;

/// 定型の指示（タスクペインのボタンに対応）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Preset {
    /// 明瞭さと読みやすさの改善
    ImproveClarity,

    /// 文法・綴り・句読点の修正
    FixGrammar,

    /// 要点を保った短縮
    Shorten,

    /// 学術的な改まった文体への書き換え
    Formalize,

    /// 要約
    Summarize,
}

impl Preset {
    /// すべての定型指示（表示順）
    pub const ALL: [Preset; 5] = [
        Preset::ImproveClarity,
        Preset::FixGrammar,
        Preset::Shorten,
        Preset::Formalize,
        Preset::Summarize,
    ];

    /// ボタンのラベル
    pub fn label(&self) -> &'static str {
        match self {
            Preset::ImproveClarity => "Improve clarity",
            Preset::FixGrammar => "Fix grammar",
            Preset::Shorten => "Make concise",
            Preset::Formalize => "Make formal",
            Preset::Summarize => "Summarize",
        }
    }

    /// ユーザーメッセージの先頭に付ける指示文
    pub fn instruction(&self) -> &'static str {
        match self {
            Preset::ImproveClarity => {
                "Improve the clarity and readability of the following text while preserving its meaning."
            }
            Preset::FixGrammar => {
                "Correct any grammar, spelling, and punctuation errors in the following text. Change nothing else."
            }
            Preset::Shorten => {
                "Make the following text more concise without losing any key information."
            }
            Preset::Formalize => "Rewrite the following text in a formal academic tone.",
            Preset::Summarize => "Summarize the following text in a few sentences.",
        }
    }
}

/// リレーに送る指示
///
/// # 使用例
///
/// ```rust
/// use wordtrack::{Instruction, Preset};
///
/// let canned = Instruction::Preset(Preset::FixGrammar);
/// let custom = Instruction::custom("Translate into French.");
/// assert!(canned.text().starts_with("Correct"));
/// assert_eq!(custom.text(), "Translate into French.");
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// 定型の指示
    Preset(Preset),

    /// ユーザーが入力した自由記述の指示
    Custom(String),
}

impl Instruction {
    /// 自由記述の指示を生成
    pub fn custom(text: impl Into<String>) -> Self {
        Instruction::Custom(text.into())
    }

    /// 指示文
    pub fn text(&self) -> &str {
        match self {
            Instruction::Preset(preset) => preset.instruction(),
            Instruction::Custom(text) => text.trim(),
        }
    }

    /// 指示文が空かどうか（自由記述が未入力）
    pub fn is_blank(&self) -> bool {
        self.text().is_empty()
    }
}

impl From<Preset> for Instruction {
    fn from(preset: Preset) -> Self {
        Instruction::Preset(preset)
    }
}

/// リレーエンドポイントのスキーム
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scheme {
    /// TLS（開発用証明書）
    Https,

    /// 平文HTTP
    Http,
}

impl Scheme {
    /// URLのスキーム部分
    pub fn as_str(&self) -> &'static str {
        match self {
            Scheme::Https => "https",
            Scheme::Http => "http",
        }
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
