//! OOXML to HTML Preview
//!
//! 選択範囲のマークアップを簡易HTMLプレビュー（段落、太字/斜体、リスト項目）に変換します。

use tracing::warn;

use super::parser::parse_fragment;
use crate::text::{escape_html, plain_text_to_html};
use crate::types::{Fragment, Run};

/// OOXMLをプレビュー用HTMLに変換する
///
/// 解析に失敗した場合（または段落が1つもない場合）は、プレーンテキストを
/// エスケープし改行を`<br>`に置き換えたものを返します。この関数は失敗しません。
///
/// フォールバックは改行の置き換えだけではありません。`&`、`<`、`>`も先に
/// エスケープするため、`"a<b\nc"`は`"a<b<br>c"`ではなく`"a&lt;b<br>c"`になります。
///
/// # 引数
///
/// * `ooxml` - 選択範囲のOOXML
/// * `plain_text` - フォールバック用のプレーンテキスト
///
/// # 使用例
///
/// ```rust
/// use wordtrack::convert_ooxml_to_html;
///
/// let html = convert_ooxml_to_html("invalid xml <unclosed", "Hello\nWorld");
/// assert_eq!(html, "Hello<br>World");
/// ```
pub fn convert_ooxml_to_html(ooxml: &str, plain_text: &str) -> String {
    match parse_fragment(ooxml) {
        Ok(fragment) if !fragment.paragraphs.is_empty() => render_html(&fragment),
        Ok(_) => plain_text_to_html(plain_text),
        Err(e) => {
            warn!(error = %e, "Error converting OOXML to HTML, using plain text");
            plain_text_to_html(plain_text)
        }
    }
}

/// 解析済みフラグメントをHTMLとして出力する
///
/// リスト項目が1つでもあれば、出力全体を1つの`<ul>`で囲みます
/// （リストと通常段落の混在は分割しません）。
pub fn render_html(fragment: &Fragment) -> String {
    let mut parts = String::new();

    for paragraph in &fragment.paragraphs {
        let content: String = paragraph.runs.iter().map(render_run).collect();
        if paragraph.is_list_item {
            parts.push_str("<li>");
            parts.push_str(&content);
            parts.push_str("</li>");
        } else {
            parts.push_str("<p>");
            parts.push_str(&content);
            parts.push_str("</p>");
        }
    }

    if fragment.has_list_items() {
        format!("<ul>{}</ul>", parts)
    } else {
        parts
    }
}

fn render_run(run: &Run) -> String {
    let text = escape_html(&run.text);
    match (run.properties.bold, run.properties.italic) {
        (true, true) => format!("<strong><em>{}</em></strong>", text),
        (true, false) => format!("<strong>{}</strong>", text),
        (false, true) => format!("<em>{}</em>", text),
        (false, false) => text,
    }
}
