//! Relay Wire Types
//!
//! タスクペイン→リレー→ベンダーAPIの間でやり取りするJSONの型と変換。

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// メッセージの役割
pub const ROLE_SYSTEM: &str = "system";
/// ユーザーメッセージの役割
pub const ROLE_USER: &str = "user";

/// 会話メッセージ
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_SYSTEM.to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ROLE_USER.to_string(),
            content: content.into(),
        }
    }
}

/// リレーへのリクエストボディ（`POST /api/claude`）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelayRequest {
    #[serde(rename = "apiKey")]
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
}

/// ベンダーAPIのレスポンスのコンテンツブロック
#[derive(Debug, Clone, Deserialize)]
pub struct ContentBlock {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub text: Option<String>,
}

/// ベンダーAPIのレスポンス（必要な部分のみ）
#[derive(Debug, Clone, Deserialize)]
pub struct MessagesResponse {
    pub content: Vec<ContentBlock>,
}

impl MessagesResponse {
    /// 最初のテキストブロック
    pub fn first_text_block(&self) -> Option<&str> {
        self.content
            .iter()
            .find(|block| block.kind == "text")
            .and_then(|block| block.text.as_deref())
    }
}

/// リレーが上流へ転送するボディを組み立てる
///
/// `model`、`max_tokens`、`messages`のみをコピーし（`apiKey`は含めない）、
/// 先頭メッセージの`role`が`system`の場合は、その`content`をトップレベルの
/// `system`フィールドへ移して`messages`から取り除きます。
pub fn build_forward_body(request: &Map<String, Value>) -> Value {
    let mut body = Map::new();
    for key in ["model", "max_tokens", "messages"] {
        if let Some(value) = request.get(key) {
            body.insert(key.to_string(), value.clone());
        }
    }

    let hoisted = match body.get_mut("messages") {
        Some(Value::Array(messages)) => {
            let leading_system = messages
                .first()
                .and_then(|first| first.get("role"))
                .and_then(Value::as_str)
                == Some(ROLE_SYSTEM);
            if leading_system {
                let system = messages.remove(0);
                Some(system.get("content").cloned().unwrap_or(Value::Null))
            } else {
                None
            }
        }
        _ => None,
    };

    if let Some(system) = hoisted {
        body.insert("system".to_string(), system);
    }

    Value::Object(body)
}

/// エラーボディ`{"error": ...}`を生成する
pub fn error_body(message: &str) -> Vec<u8> {
    serde_json::json!({ "error": message }).to_string().into_bytes()
}

/// エラーボディから人が読める詳細を取り出す
///
/// ベンダー形式`{"error": {"message": ...}}`とリレー形式`{"error": "..."}`の両方に対応し、
/// どちらでもない場合は本文をそのまま返します。
pub fn error_detail(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let detail = parsed.as_ref().and_then(|value| match value.get("error") {
        Some(Value::String(message)) => Some(message.clone()),
        Some(error) => error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string),
        None => None,
    });

    detail.unwrap_or_else(|| body.trim().to_string())
}
