//! Formatting Aggregation Module
//!
//! 選択範囲のランの書式を単語数で重み付けして集計し、属性ごとに代表値を1つ選びます
//! （多数決書式）。再挿入したテキストには、この代表書式だけが適用されます。
//!
//! 少数派の書式（一部だけ太字の語など）は再挿入時に失われます。過半数に届かない
//! 最多値（相対多数）は採用しません。

use std::collections::HashMap;
use std::hash::Hash;

use tracing::{debug, warn};

use crate::ooxml::parse_fragment;
use crate::types::{AggregatedFormatting, Fragment, Run};

/// 下線なしを表すバケット名
pub const UNDERLINE_NONE: &str = "none";

/// 単語数で重み付けした得票
#[derive(Debug, Clone)]
struct Votes<K> {
    counts: HashMap<K, usize>,
}

impl<K: Eq + Hash + Clone> Votes<K> {
    fn new() -> Self {
        Self {
            counts: HashMap::new(),
        }
    }

    fn add(&mut self, key: K, weight: usize) {
        *self.counts.entry(key).or_insert(0) += weight;
    }

    /// 総単語数の過半数（厳密に半分より多い）を得た値
    fn majority(&self, total: usize) -> Option<K> {
        self.counts
            .iter()
            .find(|(_, count)| **count * 2 > total)
            .map(|(key, _)| key.clone())
    }
}

/// 真偽値属性の得票
#[derive(Debug, Clone, Copy, Default)]
struct BoolVotes {
    yes: usize,
    no: usize,
}

impl BoolVotes {
    fn add(&mut self, value: bool, weight: usize) {
        if value {
            self.yes += weight;
        } else {
            self.no += weight;
        }
    }

    fn decide(&self) -> bool {
        self.yes > self.no
    }
}

/// 書式の集計器
///
/// ランを順に[`FormattingTally::add_run`]で追加し、[`FormattingTally::finish`]で
/// 代表書式を得ます。
#[derive(Debug, Clone)]
pub struct FormattingTally {
    total_words: usize,
    font_names: Votes<String>,
    sizes: Votes<u32>,
    bold: BoolVotes,
    italic: BoolVotes,
    underlines: Votes<String>,
    colors: Votes<String>,
    highlights: Votes<String>,
}

impl Default for FormattingTally {
    fn default() -> Self {
        Self::new()
    }
}

impl FormattingTally {
    /// 空の集計器を生成
    pub fn new() -> Self {
        Self {
            total_words: 0,
            font_names: Votes::new(),
            sizes: Votes::new(),
            bold: BoolVotes::default(),
            italic: BoolVotes::default(),
            underlines: Votes::new(),
            colors: Votes::new(),
            highlights: Votes::new(),
        }
    }

    /// 集計済みの総単語数
    pub fn total_words(&self) -> usize {
        self.total_words
    }

    /// ランを1つ集計に加える
    ///
    /// テキストが空のランは無視します。書式指定のないランは、太字・斜体の
    /// `false`バケットと下線の`"none"`バケットに加算されます。
    pub fn add_run(&mut self, run: &Run) {
        if run.text.is_empty() {
            return;
        }

        let words = run.word_count();
        let props = &run.properties;
        self.total_words += words;

        if let Some(name) = &props.font_name {
            self.font_names.add(name.clone(), words);
        }
        if let Some(size) = props.size_half_points {
            self.sizes.add(size, words);
        }
        self.bold.add(props.bold, words);
        self.italic.add(props.italic, words);
        self.underlines.add(
            props
                .underline
                .clone()
                .unwrap_or_else(|| UNDERLINE_NONE.to_string()),
            words,
        );
        if let Some(color) = &props.color {
            self.colors.add(color.clone(), words);
        }
        if let Some(highlight) = &props.highlight {
            self.highlights.add(highlight.clone(), words);
        }
    }

    /// フラグメント内のすべてのランを集計に加える
    pub fn add_fragment(&mut self, fragment: &Fragment) {
        for run in fragment.runs() {
            self.add_run(run);
        }
    }

    /// 代表書式を決定する
    ///
    /// 単語が1つも集計されていない場合は、すべて未設定のレコードを返します。
    pub fn finish(&self) -> AggregatedFormatting {
        let total = self.total_words;
        if total == 0 {
            return AggregatedFormatting::default();
        }

        AggregatedFormatting {
            name: self.font_names.majority(total),
            // ハーフポイント単位をポイントに変換
            size: self.sizes.majority(total).map(|half| f64::from(half) / 2.0),
            bold: Some(self.bold.decide()),
            italic: Some(self.italic.decide()),
            underline: self.underlines.majority(total),
            color: self.colors.majority(total),
            highlight_color: self.highlights.majority(total),
        }
    }
}

/// OOXMLから代表書式を求める
///
/// 解析に失敗した場合は空のレコードを返します（書式は再適用されません）。
pub fn aggregate_formatting(ooxml: &str) -> AggregatedFormatting {
    match parse_fragment(ooxml) {
        Ok(fragment) => aggregate_fragment(&fragment),
        Err(e) => {
            warn!(error = %e, "Could not read formatting from selection markup");
            AggregatedFormatting::default()
        }
    }
}

/// 解析済みフラグメントから代表書式を求める
pub fn aggregate_fragment(fragment: &Fragment) -> AggregatedFormatting {
    let mut tally = FormattingTally::new();
    tally.add_fragment(fragment);
    let formatting = tally.finish();

    debug!(
        words = tally.total_words(),
        attributes = formatting.attribute_count(),
        "Formatting aggregated"
    );
    formatting
}
