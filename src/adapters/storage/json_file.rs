//! Whole-document JSON files with atomic replace.
//!
//! Every write lands in `<file>.tmp` first and is renamed over the target,
//! so readers see either the old document or the new one.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;

pub(crate) const JSON_EXT: &str = "json";
const TMP_EXT: &str = "tmp";

#[derive(Debug, Error)]
pub(crate) enum JsonFileError {
    #[error("{path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

fn io_error(path: &Path, source: std::io::Error) -> JsonFileError {
    JsonFileError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Encodes an arbitrary identifier into a portable file stem.
///
/// ASCII letters, digits, `-`, `_` and `.` pass through; every other byte is
/// written as `%XX`. A leading `.` is escaped so stems never hide files.
pub(crate) fn file_safe_name(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for (i, byte) in raw.bytes().enumerate() {
        let plain = byte.is_ascii_alphanumeric()
            || matches!(byte, b'-' | b'_')
            || (byte == b'.' && i > 0);
        if plain {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

pub(crate) async fn ensure_dir(dir: &Path) -> Result<(), JsonFileError> {
    fs::create_dir_all(dir).await.map_err(|e| io_error(dir, e))
}

/// Serializes `value` and atomically replaces `path` with it.
pub(crate) async fn write_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), JsonFileError> {
    if let Some(parent) = path.parent() {
        ensure_dir(parent).await?;
    }
    let body = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension(format!("{}.{}", JSON_EXT, TMP_EXT));
    fs::write(&tmp, body).await.map_err(|e| io_error(&tmp, e))?;
    fs::rename(&tmp, path).await.map_err(|e| io_error(path, e))
}

/// Reads and parses `path`; `None` when the file does not exist.
pub(crate) async fn read_optional<T: DeserializeOwned>(
    path: &Path,
) -> Result<Option<T>, JsonFileError> {
    let body = match fs::read(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path, e)),
    };
    serde_json::from_slice(&body)
        .map(Some)
        .map_err(|source| JsonFileError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

pub(crate) async fn remove_if_exists(path: &Path) -> Result<(), JsonFileError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_error(path, e)),
    }
}

/// `*.json` files directly under `dir`, sorted by name. A missing directory
/// lists as empty.
pub(crate) async fn list_json(dir: &Path) -> Result<Vec<PathBuf>, JsonFileError> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(io_error(dir, e)),
    };
    let mut paths = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(|e| io_error(dir, e))? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) == Some(JSON_EXT) {
            paths.push(path);
        }
    }
    paths.sort();
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
    }

    #[test]
    fn file_safe_name_escapes_separators() {
        assert_eq!(file_safe_name("5491155@c.us"), "5491155%40c.us");
        assert_eq!(file_safe_name("../etc"), "%2E.%2Fetc");
        assert_eq!(file_safe_name("v1"), "v1");
    }

    #[tokio::test]
    async fn write_then_read_returns_document() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("doc.json");

        write_atomic(&path, &Doc { name: "a".into() }).await.unwrap();
        let read: Option<Doc> = read_optional(&path).await.unwrap();

        assert_eq!(read, Some(Doc { name: "a".into() }));
        assert!(!path.with_extension("json.tmp").exists());
    }

    #[tokio::test]
    async fn missing_file_reads_as_none() {
        let dir = TempDir::new().unwrap();
        let read: Option<Doc> = read_optional(&dir.path().join("nope.json")).await.unwrap();
        assert!(read.is_none());
    }

    #[tokio::test]
    async fn garbage_is_a_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("bad.json");
        tokio::fs::write(&path, b"{not json").await.unwrap();

        let result: Result<Option<Doc>, _> = read_optional(&path).await;
        assert!(matches!(result, Err(JsonFileError::Parse { .. })));
    }

    #[tokio::test]
    async fn list_skips_temp_files_and_missing_dirs() {
        let dir = TempDir::new().unwrap();
        write_atomic(&dir.path().join("b.json"), &Doc { name: "b".into() }).await.unwrap();
        write_atomic(&dir.path().join("a.json"), &Doc { name: "a".into() }).await.unwrap();
        tokio::fs::write(dir.path().join("c.json.tmp"), b"{}").await.unwrap();

        let names: Vec<_> = list_json(dir.path())
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.json", "b.json"]);
        assert!(list_json(&dir.path().join("absent")).await.unwrap().is_empty());
    }
}
