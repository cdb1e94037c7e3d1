//! Text Module
//!
//! 選択テキストに対する決定的な変換処理（単語の先頭大文字化、HTMLエスケープ）。

/// 各単語の先頭を大文字、残りを小文字に変換する
///
/// 空白の連続で分割し、単語を単一のスペースで連結します。先頭・末尾の空白は
/// 空の「単語」として残るため、それぞれ1つのスペースに縮約されます。
///
/// # 使用例
///
/// ```rust
/// use wordtrack::capitalize_words;
///
/// assert_eq!(capitalize_words("hello world"), "Hello World");
/// assert_eq!(capitalize_words("hello   world"), "Hello World");
/// assert_eq!(capitalize_words("  hello world  "), " Hello World ");
/// assert_eq!(capitalize_words(""), "");
/// ```
pub fn capitalize_words(text: &str) -> String {
    split_whitespace_runs(text)
        .into_iter()
        .map(capitalize_word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 空白の連続で分割する（先頭・末尾の空要素は保持、内部の空要素は除外）
fn split_whitespace_runs(text: &str) -> Vec<&str> {
    let pieces: Vec<&str> = text.split(char::is_whitespace).collect();
    let last = pieces.len().saturating_sub(1);

    pieces
        .iter()
        .enumerate()
        .filter(|(i, piece)| !piece.is_empty() || *i == 0 || *i == last)
        .map(|(_, piece)| *piece)
        .collect()
}

fn capitalize_word(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

/// テキストノードとしてHTMLエスケープする
///
/// `&`、`<`、`>`のみを置換します（引用符はテキストノードでは安全なため変換しません）。
pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// エスケープ済みテキストの改行を`<br>`に変換する（プレーンテキストのフォールバック用）
///
/// 改行だけを置き換えた場合と異なり、選択テキスト中の`<`などはタグとして解釈されません。
pub(crate) fn plain_text_to_html(text: &str) -> String {
    escape_html(text).replace('\n', "<br>")
}
