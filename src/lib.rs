//! wordtrack - Backend for a Word task-pane add-in with tracked AI edits
//!
//! This crate implements the logic behind a Microsoft Word task pane: it previews the
//! current selection as HTML, derives a single representative style for the selection
//! (majority-vote formatting), re-inserts transformed text with track changes enabled,
//! and talks to a local relay that forwards requests to the Claude messages API.
//!
//! The Word document itself is reached through the [`DocumentHost`] trait, so the same
//! code runs against a real host binding or the in-memory [`MemoryDocument`].
//!
//! # Quick Start
//!
//! ```rust
//! use wordtrack::{MemoryCredentialStore, MemoryDocument, Session};
//!
//! let store = MemoryCredentialStore::new();
//! let mut session = Session::load(&store);
//! let mut document = MemoryDocument::new("the quick brown fox");
//!
//! let preview = session.capture_selection(&mut document).unwrap();
//! assert_eq!(preview.text, "the quick brown fox");
//!
//! let notice = session.capitalize_and_insert(&mut document);
//! assert!(notice.is_success());
//! assert_eq!(document.selection(), "The Quick Brown Fox");
//! ```
//!
//! # Selection Preview
//!
//! ```rust
//! use wordtrack::convert_ooxml_to_html;
//!
//! let ooxml = r#"<w:document><w:body><w:p>
//!     <w:r><w:rPr><w:b/></w:rPr><w:t>Bold</w:t></w:r>
//! </w:p></w:body></w:document>"#;
//!
//! assert_eq!(convert_ooxml_to_html(ooxml, "Bold"), "<p><strong>Bold</strong></p>");
//! // Markup errors fall back to the escaped plain text
//! assert_eq!(convert_ooxml_to_html("<w:p>", "a < b"), "a &lt; b");
//! ```
//!
//! # Asking Claude Through the Relay
//!
//! ```rust,no_run
//! use wordtrack::{
//!     Instruction, MemoryCredentialStore, MemoryDocument, Preset, RelayClientBuilder, Session,
//! };
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut store = MemoryCredentialStore::new();
//!     let mut session = Session::load(&store);
//!     session.save_credential(&mut store, "sk-ant-...");
//!
//!     let mut document = MemoryDocument::new("their going too the store");
//!     session.capture_selection(&mut document)?;
//!
//!     let client = RelayClientBuilder::new().build()?;
//!     session.request_completion(&client, &Instruction::Preset(Preset::FixGrammar), None)?;
//!
//!     let notice = session.insert_pending_response(&mut document);
//!     println!("{}", notice.message);
//!     Ok(())
//! }
//! ```
//!
//! # Running the Relay
//!
//! The `wordtrack-relay` binary listens on port 3001. It serves HTTPS when the Office
//! development certificates (`~/.office-addin-dev-certs/localhost.{crt,key}`) are
//! present, and plain HTTP otherwise.

mod api;
mod credentials;
mod error;
mod formatting;
mod host;
pub mod logging;
mod ooxml;
pub mod relay;
mod session;
mod text;
mod types;
mod writer;

// 公開API
pub use api::{Instruction, Preset, Scheme};
pub use credentials::{
    load_api_key, save_api_key, validate_api_key, CredentialStore, FileCredentialStore,
    MemoryCredentialStore, API_KEY_PREFIX, API_KEY_STORAGE_KEY,
};
pub use error::{HostAction, WordTrackError};
pub use formatting::{aggregate_formatting, aggregate_fragment, FormattingTally, UNDERLINE_NONE};
pub use host::{DocumentHost, HostCall, HostError, HostOp, MemoryDocument};
pub use ooxml::{convert_ooxml_to_html, parse_fragment, render_html};
pub use relay::{RelayClient, RelayClientBuilder, RelayError};
pub use session::{Notice, NoticeLevel, Preview, Session};
pub use text::{capitalize_words, escape_html};
pub use types::{
    AggregatedFormatting, FontAttribute, Fragment, Paragraph, Run, RunProperties,
};
pub use writer::{ensure_track_changes, insert_with_tracking, InsertReport, InsertedContent};
