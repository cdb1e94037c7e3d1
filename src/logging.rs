//! Logging
//!
//! `tracing`のイベントを標準エラー出力に書き出すと同時に、メモリ上のリングバッファにも
//! 保持します。バッファの内容はテキストとして書き出せます（不具合報告への添付用）。

use std::collections::VecDeque;
use std::fmt::{self, Write as _};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Local};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

use crate::error::WordTrackError;

/// バッファに保持するエントリ数（デフォルト）
pub const DEFAULT_LOG_CAPACITY: usize = 1000;

/// ログ1件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub target: String,
    pub message: String,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [{} {}] {}",
            self.timestamp.format("%Y-%m-%dT%H:%M:%S%.3f"),
            self.level,
            self.target,
            self.message
        )
    }
}

/// ログのリングバッファ
///
/// 複製しても同じバッファを共有します。容量を超えると古いものから捨てます。
#[derive(Debug, Clone)]
pub struct LogBuffer {
    entries: Arc<Mutex<VecDeque<LogEntry>>>,
    capacity: usize,
}

impl Default for LogBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_LOG_CAPACITY)
    }
}

impl LogBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Arc::new(Mutex::new(VecDeque::with_capacity(capacity.min(1024)))),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<LogEntry>> {
        // 書き込み中にパニックしたスレッドがあってもログは読めるようにする
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    pub fn push(&self, entry: LogEntry) {
        if self.capacity == 0 {
            return;
        }
        let mut entries = self.lock();
        while entries.len() >= self.capacity {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn entries(&self) -> Vec<LogEntry> {
        self.lock().iter().cloned().collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// 保持しているログを1行1件のテキストにする
    pub fn export(&self) -> String {
        let entries = self.lock();
        let mut out = String::new();
        for entry in entries.iter() {
            let _ = writeln!(out, "{}", entry);
        }
        out
    }
}

/// イベントを[`LogBuffer`]へ送る`tracing_subscriber`のレイヤー
pub struct LogBufferLayer {
    buffer: LogBuffer,
}

impl LogBufferLayer {
    pub fn new(buffer: LogBuffer) -> Self {
        Self { buffer }
    }
}

/// `message`フィールドと、それ以外の`key=value`を集める
#[derive(Default)]
struct MessageVisitor {
    message: String,
    fields: String,
}

impl Visit for MessageVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message.push_str(value);
        } else {
            let _ = write!(self.fields, " {}={}", field.name(), value);
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.message, "{:?}", value);
        } else {
            let _ = write!(self.fields, " {}={:?}", field.name(), value);
        }
    }
}

impl<S> Layer<S> for LogBufferLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = MessageVisitor::default();
        event.record(&mut visitor);

        let message = format!("{}{}", visitor.message, visitor.fields).replace(['\n', '\r'], " ");
        self.buffer.push(LogEntry {
            timestamp: Local::now(),
            level: *event.metadata().level(),
            target: event.metadata().target().to_string(),
            message,
        });
    }
}

/// グローバルなサブスクライバーを設定する
///
/// # 引数
///
/// * `filter` - `EnvFilter`の書式（例: `"info"`, `"wordtrack=debug"`）
/// * `buffer` - イベントを保持するバッファ（不要なら`None`）
///
/// # 戻り値
///
/// * `Ok(())` - 設定に成功した場合
/// * `Err(WordTrackError::Config)` - フィルタが不正、または既に設定済みの場合
pub fn init_logging(filter: &str, buffer: Option<LogBuffer>) -> Result<(), WordTrackError> {
    let filter = EnvFilter::try_new(filter)
        .map_err(|e| WordTrackError::Config(format!("Invalid log filter '{}': {}", filter, e)))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(buffer.map(LogBufferLayer::new))
        .try_init()
        .map_err(|e| WordTrackError::Config(format!("Failed to initialize logging: {}", e)))
}
