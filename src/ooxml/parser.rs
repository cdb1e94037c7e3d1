//! WordprocessingML Fragment Parser
//!
//! ホストから取得した選択範囲のOOXML（`pkg:package`形式、または`w:document`）を
//! 1パスで走査し、段落とランの線形な列（`Fragment`）を構築します。

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::WordTrackError;
use crate::types::{Fragment, Paragraph, Run, RunProperties};

/// OOXMLフラグメントを解析する
///
/// # 引数
///
/// * `xml` - 選択範囲に対応するOOXML文字列
///
/// # 戻り値
///
/// * `Ok(Fragment)` - 解析に成功した場合（段落が0個の場合も含む）
/// * `Err(WordTrackError::Xml)` - 構文エラー、終了タグの不一致、閉じられていない要素がある場合
pub fn parse_fragment(xml: &str) -> Result<Fragment, WordTrackError> {
    let mut reader = Reader::from_reader(xml.as_bytes());
    let mut builder = FragmentBuilder::default();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                builder.open(&e)?;
                builder.stack.push(e.name().as_ref().to_vec());
            }
            Ok(Event::Empty(e)) => {
                // Event::Emptyは自己終了タグ（<w:b/>など）の場合に発生
                builder.open(&e)?;
                builder.close_scopes(e.name().as_ref());
            }
            Ok(Event::End(e)) => {
                let name = e.name();
                match builder.stack.pop() {
                    Some(open) if open.as_slice() == name.as_ref() => {
                        builder.close_scopes(name.as_ref());
                    }
                    Some(open) => {
                        return Err(WordTrackError::Xml(format!(
                            "mismatched end tag: expected </{}>, found </{}>",
                            String::from_utf8_lossy(&open),
                            String::from_utf8_lossy(name.as_ref())
                        )));
                    }
                    None => {
                        return Err(WordTrackError::Xml(format!(
                            "unexpected end tag </{}>",
                            String::from_utf8_lossy(name.as_ref())
                        )));
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if builder.in_text_element() {
                    let text = e
                        .unescape()
                        .map_err(|e| WordTrackError::Xml(format!("XML text error: {}", e)))?;
                    builder.push_text(&text);
                }
            }
            Ok(Event::CData(e)) => {
                if builder.in_text_element() {
                    let text = std::str::from_utf8(&e)
                        .map_err(|e| WordTrackError::Xml(format!("XML text error: {}", e)))?;
                    builder.push_text(text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(WordTrackError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if let Some(open) = builder.stack.last() {
        return Err(WordTrackError::Xml(format!(
            "unexpected end of document: <{}> is not closed",
            String::from_utf8_lossy(open)
        )));
    }

    Ok(Fragment {
        paragraphs: builder.paragraphs,
    })
}

/// 解析中の状態
///
/// 段落・ランは開始タグの順に確保し、入れ子（テキストボックス内の段落など）が
/// あってもドキュメント順が保たれるようにします。
#[derive(Default)]
struct FragmentBuilder {
    /// 開いている要素名のスタック
    stack: Vec<Vec<u8>>,
    /// ドキュメント順の段落
    paragraphs: Vec<Paragraph>,
    /// 開いている段落のインデックス
    open_paragraphs: Vec<usize>,
    /// 開いているランの位置（段落外のランは`None`）
    open_runs: Vec<Option<(usize, usize)>>,
}

impl FragmentBuilder {
    fn parent(&self) -> Option<&[u8]> {
        self.stack.last().map(Vec::as_slice)
    }

    fn grandparent(&self) -> Option<&[u8]> {
        let len = self.stack.len();
        if len >= 2 {
            Some(self.stack[len - 2].as_slice())
        } else {
            None
        }
    }

    fn current_run(&mut self) -> Option<&mut Run> {
        let (p, r) = (*self.open_runs.last()?)?;
        self.paragraphs.get_mut(p)?.runs.get_mut(r)
    }

    fn in_text_element(&self) -> bool {
        self.parent() == Some(b"w:t".as_slice())
    }

    fn push_text(&mut self, text: &str) {
        if let Some(run) = self.current_run() {
            run.text.push_str(text);
        }
    }

    /// 要素の開始（自己終了タグを含む）
    fn open(&mut self, e: &BytesStart<'_>) -> Result<(), WordTrackError> {
        match e.name().as_ref() {
            b"w:p" => {
                self.open_paragraphs.push(self.paragraphs.len());
                self.paragraphs.push(Paragraph::default());
            }
            b"w:r" => {
                let position = self.open_paragraphs.last().copied().map(|p| {
                    let runs = &mut self.paragraphs[p].runs;
                    runs.push(Run::default());
                    (p, runs.len() - 1)
                });
                self.open_runs.push(position);
            }
            b"w:numPr" => {
                if let Some(&p) = self.open_paragraphs.last() {
                    self.paragraphs[p].is_list_item = true;
                }
            }
            name => {
                // ラン直下の<w:rPr>の子要素のみを書式として扱う
                // （<w:rPrChange>内の変更前書式は無視）
                let is_run_property = self.parent() == Some(b"w:rPr".as_slice())
                    && self.grandparent() == Some(b"w:r".as_slice());
                if is_run_property {
                    let name = name.to_vec();
                    if let Some(run) = self.current_run() {
                        apply_run_property(&name, e, &mut run.properties)?;
                    }
                }
            }
        }
        Ok(())
    }

    /// 段落・ランのスコープを閉じる
    fn close_scopes(&mut self, name: &[u8]) {
        match name {
            b"w:p" => {
                self.open_paragraphs.pop();
            }
            b"w:r" => {
                self.open_runs.pop();
            }
            _ => {}
        }
    }
}

/// `w:rPr`の子要素を書式情報に反映する
fn apply_run_property(
    name: &[u8],
    e: &BytesStart<'_>,
    props: &mut RunProperties,
) -> Result<(), WordTrackError> {
    match name {
        b"w:b" => props.bold = toggle_value(e)?,
        b"w:i" => props.italic = toggle_value(e)?,
        b"w:u" => {
            let value = attribute(e, "w:val")?.unwrap_or_else(|| "single".to_string());
            props.underline = Some(value);
        }
        b"w:rFonts" => {
            for key in ["w:ascii", "w:hAnsi", "w:cs", "w:eastAsia"] {
                if let Some(font) = attribute(e, key)? {
                    props.font_name = Some(font);
                    break;
                }
            }
        }
        b"w:sz" => {
            // 数値でないサイズは無視（書式の多数決に参加しないだけ）
            if let Some(size) = attribute(e, "w:val")?.and_then(|v| v.parse::<u32>().ok()) {
                props.size_half_points = Some(size);
            }
        }
        b"w:color" => {
            if let Some(color) = attribute(e, "w:val")? {
                if !color.eq_ignore_ascii_case("auto") {
                    props.color = Some(format!("#{}", color.to_ascii_uppercase()));
                }
            }
        }
        b"w:highlight" => {
            if let Some(highlight) = attribute(e, "w:val")? {
                if highlight != "none" {
                    props.highlight = Some(highlight);
                }
            }
        }
        _ => {}
    }
    Ok(())
}

/// トグルプロパティ（`w:b`、`w:i`）の値
///
/// `w:val`が省略されている場合はオン。`0`/`false`/`off`の場合のみオフ。
///
/// 要素の有無だけでは判定しません。`<w:b w:val="0"/>`は要素があっても太字ではなく、
/// プレビューでも書式集計でも通常のテキストとして扱います。
fn toggle_value(e: &BytesStart<'_>) -> Result<bool, WordTrackError> {
    Ok(match attribute(e, "w:val")? {
        Some(value) => !matches!(value.as_str(), "0" | "false" | "off"),
        None => true,
    })
}

fn attribute(e: &BytesStart<'_>, key: &str) -> Result<Option<String>, WordTrackError> {
    let attr = e
        .try_get_attribute(key)
        .map_err(|e| WordTrackError::Xml(format!("XML attribute error: {}", e)))?;

    match attr {
        Some(attr) => {
            let value = attr
                .unescape_value()
                .map_err(|e| WordTrackError::Xml(format!("XML attribute error: {}", e)))?;
            Ok(Some(value.into_owned()))
        }
        None => Ok(None),
    }
}
