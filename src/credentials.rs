//! Credential Storage
//!
//! タスクペインが保存するAPIキーの検証と永続化。
//! 値はキー[`API_KEY_STORAGE_KEY`]の下に1つだけ保存されます。

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::WordTrackError;

/// ストレージ上のキー
pub const API_KEY_STORAGE_KEY: &str = "wordtrack_claude_api_key";
/// APIキーの接頭辞
pub const API_KEY_PREFIX: &str = "sk-ant-";

/// APIキーの形式を検証する
///
/// 値はトリムせずにそのまま検証・保存します。
///
/// # 戻り値
///
/// * `Ok(())` - 保存できる形式
/// * `Err(WordTrackError::InvalidApiKey)` - 空（空白のみを含む）または接頭辞が違う場合
pub fn validate_api_key(value: &str) -> Result<(), WordTrackError> {
    if value.trim().is_empty() {
        return Err(WordTrackError::InvalidApiKey(
            "Please enter an API key".to_string(),
        ));
    }
    if !value.starts_with(API_KEY_PREFIX) {
        return Err(WordTrackError::InvalidApiKey(format!(
            "API key should start with {}",
            API_KEY_PREFIX
        )));
    }
    Ok(())
}

/// キーと値のストレージ（ブラウザのローカルストレージに相当）
pub trait CredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, WordTrackError>;

    fn set(&mut self, key: &str, value: &str) -> Result<(), WordTrackError>;
}

/// 保存済みのAPIキーを読む
pub fn load_api_key(store: &dyn CredentialStore) -> Result<Option<String>, WordTrackError> {
    store.get(API_KEY_STORAGE_KEY)
}

/// APIキーを検証して保存する
///
/// 検証に失敗した場合、保存済みの値は変更されません。
pub fn save_api_key(store: &mut dyn CredentialStore, value: &str) -> Result<(), WordTrackError> {
    validate_api_key(value)?;
    store.set(API_KEY_STORAGE_KEY, value)?;
    debug!("API key stored");
    Ok(())
}

/// メモリ上のストレージ
#[derive(Debug, Clone, Default)]
pub struct MemoryCredentialStore {
    values: HashMap<String, String>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, WordTrackError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), WordTrackError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// JSONファイルに保存するストレージ
///
/// ファイルはキーから値へのJSONオブジェクトです。書き込みは一時ファイルへ
/// 書いてから置き換えるため、途中で失敗しても既存の内容は壊れません。
#[derive(Debug, Clone)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, WordTrackError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(BTreeMap::new()),
            Err(e) => {
                return Err(WordTrackError::Storage(format!(
                    "failed to read {}: {}",
                    self.path.display(),
                    e
                )))
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            WordTrackError::Storage(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    fn write_values(&self, values: &BTreeMap<String, String>) -> Result<(), WordTrackError> {
        let content = serde_json::to_string_pretty(values)?;
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };

        // 一時ファイルは置き換えに失敗した場合もドロップ時に削除される
        let mut temp = NamedTempFile::new_in(dir).map_err(|e| {
            WordTrackError::Storage(format!(
                "failed to create a temporary file in {}: {}",
                dir.display(),
                e
            ))
        })?;
        temp.write_all(content.as_bytes()).map_err(|e| {
            WordTrackError::Storage(format!(
                "failed to write {}: {}",
                temp.path().display(),
                e
            ))
        })?;
        temp.persist(&self.path).map_err(|e| {
            WordTrackError::Storage(format!(
                "failed to replace {}: {}",
                self.path.display(),
                e.error
            ))
        })?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn get(&self, key: &str) -> Result<Option<String>, WordTrackError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), WordTrackError> {
        let mut values = self.read_all()?;
        values.insert(key.to_string(), value.to_string());
        self.write_values(&values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key("sk-ant-api03-abc").is_ok());

        let error = validate_api_key("   ").unwrap_err();
        assert_eq!(error.to_string(), "Please enter an API key");

        let error = validate_api_key("sk-proj-abc").unwrap_err();
        assert_eq!(error.to_string(), "API key should start with sk-ant-");

        // トリムしないため、先頭の空白は接頭辞の不一致になる
        assert!(validate_api_key(" sk-ant-abc").is_err());
    }

    #[test]
    fn test_rejected_save_keeps_previous_value() {
        let mut store = MemoryCredentialStore::new();
        save_api_key(&mut store, "sk-ant-first").unwrap();

        assert!(save_api_key(&mut store, "wrong").is_err());
        assert_eq!(
            load_api_key(&store).unwrap().as_deref(),
            Some("sk-ant-first")
        );
    }

    #[test]
    fn test_file_store_round_trip_and_other_keys() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, r#"{"theme":"dark"}"#).unwrap();

        let mut store = FileCredentialStore::new(&path);
        assert_eq!(load_api_key(&store).unwrap(), None);

        save_api_key(&mut store, "sk-ant-key").unwrap();

        let reopened = FileCredentialStore::new(&path);
        assert_eq!(load_api_key(&reopened).unwrap().as_deref(), Some("sk-ant-key"));
        assert_eq!(reopened.get("theme").unwrap().as_deref(), Some("dark"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_failed_replace_leaves_no_key_on_disk() {
        let dir = TempDir::new().unwrap();
        // 置き換え先が空でないディレクトリのため、最後の置き換えだけが失敗する
        let path = dir.path().join("storage.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), "").unwrap();

        let store = FileCredentialStore::new(&path);
        let mut values = BTreeMap::new();
        values.insert(API_KEY_STORAGE_KEY.to_string(), "sk-ant-secret".to_string());

        assert!(matches!(
            store.write_values(&values),
            Err(WordTrackError::Storage(_))
        ));
        let leftovers: Vec<_> = fs::read_dir(dir.path())
            .unwrap()
            .map(|entry| entry.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("storage.json")]);
    }

    #[test]
    fn test_file_store_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let store = FileCredentialStore::new(dir.path().join("absent.json"));

        assert_eq!(store.get(API_KEY_STORAGE_KEY).unwrap(), None);
    }

    #[test]
    fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("storage.json");
        fs::write(&path, "not json").unwrap();

        let store = FileCredentialStore::new(&path);
        assert!(matches!(
            store.get(API_KEY_STORAGE_KEY),
            Err(WordTrackError::Storage(_))
        ));
    }
}
