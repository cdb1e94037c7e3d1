//! パフォーマンスベンチマーク
//!
//! 選択範囲のプレビュー生成と書式集計の速度を測定します。
//! 入力はWordが返す形に近いOOXMLをその場で生成します（外部フィクスチャ不要）。

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wordtrack::{aggregate_formatting, capitalize_words, convert_ooxml_to_html};

/// 段落数を指定して選択範囲のOOXMLを生成する
///
/// 各段落は書式の異なる3つのランを持ち、3段落ごとにリスト項目を挟みます。
fn generate_selection(paragraphs: usize) -> (String, String) {
    let mut body = String::new();
    let mut plain = Vec::with_capacity(paragraphs);

    for i in 0..paragraphs {
        let numbering = if i % 3 == 2 {
            r#"<w:pPr><w:numPr><w:ilvl w:val="0"/><w:numId w:val="1"/></w:numPr></w:pPr>"#
        } else {
            ""
        };
        body.push_str(&format!(
            r#"<w:p>{}<w:r><w:rPr><w:rFonts w:ascii="Calibri"/><w:sz w:val="22"/></w:rPr><w:t xml:space="preserve">Paragraph {} opens with plain words, </w:t></w:r><w:r><w:rPr><w:rFonts w:ascii="Calibri"/><w:b/><w:sz w:val="22"/></w:rPr><w:t xml:space="preserve">then a bold phrase &amp; more, </w:t></w:r><w:r><w:rPr><w:i/><w:color w:val="2F5496"/></w:rPr><w:t>and an italic tail.</w:t></w:r></w:p>"#,
            numbering, i
        ));
        plain.push(format!(
            "Paragraph {} opens with plain words, then a bold phrase & more, and an italic tail.",
            i
        ));
    }

    let xml = format!(
        r#"<pkg:package xmlns:pkg="http://schemas.microsoft.com/office/2006/xmlPackage"><pkg:part pkg:name="/word/document.xml"><pkg:xmlData><w:document xmlns:w="http://schemas.openxmlformats.org/wordprocessingml/2006/main"><w:body>{}</w:body></w:document></pkg:xmlData></pkg:part></pkg:package>"#,
        body
    );
    (xml, plain.join("\n"))
}

/// プレビュー生成（OOXML → HTML）
fn benchmark_preview(c: &mut Criterion) {
    let mut group = c.benchmark_group("preview");

    for paragraphs in [1usize, 20, 200] {
        let (xml, plain) = generate_selection(paragraphs);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(paragraphs),
            &(xml, plain),
            |b, (xml, plain)| b.iter(|| convert_ooxml_to_html(black_box(xml), black_box(plain))),
        );
    }

    group.finish();
}

/// 書式集計（多数決）
fn benchmark_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate_formatting");

    for paragraphs in [1usize, 20, 200] {
        let (xml, _) = generate_selection(paragraphs);
        group.throughput(Throughput::Bytes(xml.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(paragraphs), &xml, |b, xml| {
            b.iter(|| aggregate_formatting(black_box(xml)))
        });
    }

    group.finish();
}

fn benchmark_capitalize(c: &mut Criterion) {
    let (_, plain) = generate_selection(200);
    c.bench_function("capitalize_words/200", |b| {
        b.iter(|| capitalize_words(black_box(&plain)))
    });
}

criterion_group!(
    benches,
    benchmark_preview,
    benchmark_aggregate,
    benchmark_capitalize
);
criterion_main!(benches);
