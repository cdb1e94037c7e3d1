//! Types Module
//!
//! クレート全体で使用する共通データ型を定義するモジュール。
//! 選択範囲のマークアップは、段落とランの線形な列としてのみ表現します。

/// ランの書式情報（`w:rPr`要素）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RunProperties {
    /// 太字かどうか（`w:b`）
    pub bold: bool,
    /// 斜体かどうか（`w:i`）
    pub italic: bool,
    /// 下線の種類（`w:u`の`w:val`、例: "single"）。未指定の場合は`None`
    pub underline: Option<String>,
    /// フォント名（`w:rFonts`）
    pub font_name: Option<String>,
    /// フォントサイズ（ハーフポイント単位、`w:sz`）
    pub size_half_points: Option<u32>,
    /// 文字色（"#RRGGBB"形式）
    pub color: Option<String>,
    /// 蛍光ペンの色（`w:highlight`の`w:val`、例: "yellow"）
    pub highlight: Option<String>,
}

/// ラン（同一書式の連続したテキスト）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Run {
    /// テキスト内容（`w:t`要素の連結）
    pub text: String,
    /// 書式情報
    pub properties: RunProperties,
}

impl Run {
    /// 新しいRunを生成
    pub fn new(text: impl Into<String>, properties: RunProperties) -> Self {
        Self {
            text: text.into(),
            properties,
        }
    }

    /// 書式なしのランを生成
    pub fn plain(text: impl Into<String>) -> Self {
        Self::new(text, RunProperties::default())
    }

    /// 空白区切りの単語数（空トークンは除外）
    pub fn word_count(&self) -> usize {
        self.text.split_whitespace().count()
    }
}

/// 段落（`w:p`要素）
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Paragraph {
    /// ドキュメント順のラン
    pub runs: Vec<Run>,
    /// 番号付けプロパティ（`w:numPr`）を含むかどうか
    pub is_list_item: bool,
}

impl Paragraph {
    /// 段落のプレーンテキスト（ランの連結）
    pub fn text(&self) -> String {
        self.runs.iter().map(|run| run.text.as_str()).collect()
    }
}

/// 選択範囲のマークアップを解析した結果
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Fragment {
    /// ドキュメント順の段落
    pub paragraphs: Vec<Paragraph>,
}

impl Fragment {
    /// 段落を改行で連結したプレーンテキスト
    pub fn plain_text(&self) -> String {
        self.paragraphs
            .iter()
            .map(Paragraph::text)
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// リスト項目の段落が1つでも含まれるか
    pub fn has_list_items(&self) -> bool {
        self.paragraphs.iter().any(|p| p.is_list_item)
    }

    /// すべてのランをドキュメント順に列挙
    pub fn runs(&self) -> impl Iterator<Item = &Run> {
        self.paragraphs.iter().flat_map(|p| p.runs.iter())
    }
}

/// 多数決で選ばれた書式（疎なレコード）
///
/// 過半数（単語数で重み付け）を得た属性のみが設定されます。
/// `None`の属性は再適用されず、ホストの既定書式のままになります。
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AggregatedFormatting {
    /// フォント名
    pub name: Option<String>,
    /// フォントサイズ（ポイント）
    pub size: Option<f64>,
    /// 太字
    pub bold: Option<bool>,
    /// 斜体
    pub italic: Option<bool>,
    /// 下線の種類（"none"を含む）
    pub underline: Option<String>,
    /// 文字色
    pub color: Option<String>,
    /// 蛍光ペンの色
    pub highlight_color: Option<String>,
}

impl AggregatedFormatting {
    /// 設定された属性が1つもないかどうか
    pub fn is_empty(&self) -> bool {
        self.attribute_count() == 0
    }

    /// 設定された属性の数
    pub fn attribute_count(&self) -> usize {
        [
            self.name.is_some(),
            self.size.is_some(),
            self.bold.is_some(),
            self.italic.is_some(),
            self.underline.is_some(),
            self.color.is_some(),
            self.highlight_color.is_some(),
        ]
        .iter()
        .filter(|set| **set)
        .count()
    }

    /// 設定された属性を適用順に列挙する
    pub fn attributes(&self) -> Vec<FontAttribute> {
        let mut attributes = Vec::with_capacity(self.attribute_count());
        if let Some(name) = &self.name {
            attributes.push(FontAttribute::Name(name.clone()));
        }
        if let Some(size) = self.size {
            attributes.push(FontAttribute::Size(size));
        }
        if let Some(bold) = self.bold {
            attributes.push(FontAttribute::Bold(bold));
        }
        if let Some(italic) = self.italic {
            attributes.push(FontAttribute::Italic(italic));
        }
        if let Some(underline) = &self.underline {
            attributes.push(FontAttribute::Underline(underline.clone()));
        }
        if let Some(color) = &self.color {
            attributes.push(FontAttribute::Color(color.clone()));
        }
        if let Some(highlight) = &self.highlight_color {
            attributes.push(FontAttribute::HighlightColor(highlight.clone()));
        }
        attributes
    }
}

/// 挿入範囲に適用するフォント属性1つ
#[derive(Debug, Clone, PartialEq)]
pub enum FontAttribute {
    Name(String),
    /// ポイント
    Size(f64),
    Bold(bool),
    Italic(bool),
    Underline(String),
    Color(String),
    HighlightColor(String),
}
