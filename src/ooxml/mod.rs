//! OOXML Module
//!
//! 選択範囲のWordprocessingMLを解析し、プレビュー用HTMLを生成します。

mod html;
mod parser;

pub use html::{convert_ooxml_to_html, render_html};
pub use parser::parse_fragment;
