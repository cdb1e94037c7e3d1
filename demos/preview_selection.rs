//! Preview Example
//!
//! This example renders the task-pane preview for a saved selection fragment and
//! prints the representative formatting that would be re-applied on insertion.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example preview_selection -- selection.xml
//! cargo run --example preview_selection -- selection.xml --capitalize
//! ```
//!
//! The input is the WordprocessingML returned by the host for a selection
//! (a `pkg:package` flat package or a bare `w:document`).

use std::fs;
use std::path::Path;
use std::process;

use wordtrack::{
    aggregate_fragment, capitalize_words, convert_ooxml_to_html, parse_fragment, WordTrackError,
};

fn run(path: &Path, capitalize: bool) -> Result<(), WordTrackError> {
    let markup = fs::read_to_string(path)?;
    let fragment = parse_fragment(&markup)?;
    let plain_text = fragment.plain_text();

    println!("== Preview ==");
    println!("{}", convert_ooxml_to_html(&markup, &plain_text));

    println!("\n== Formatting ==");
    let formatting = aggregate_fragment(&fragment);
    if formatting.is_empty() {
        println!("(no attribute reaches a majority)");
    }
    for attribute in formatting.attributes() {
        println!("{:?}", attribute);
    }

    if capitalize {
        println!("\n== Capitalized ==");
        println!("{}", capitalize_words(plain_text.trim()));
    }

    Ok(())
}

fn main() {
    let args: Vec<String> = std::env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <selection.xml> [--capitalize]", args[0]);
        process::exit(1);
    }

    let capitalize = args[2..].iter().any(|arg| arg == "--capitalize");

    if let Err(e) = run(Path::new(&args[1]), capitalize) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}
