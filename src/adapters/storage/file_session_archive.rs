//! Session documents as `sessions/<chat>.json`.

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use super::json_file::{self, file_safe_name, JsonFileError, JSON_EXT};
use crate::domain::conversation::ConversationState;
use crate::domain::foundation::ChatId;
use crate::ports::{SessionArchive, SessionStoreError};

impl From<JsonFileError> for SessionStoreError {
    fn from(err: JsonFileError) -> Self {
        match err {
            JsonFileError::Io { .. } => SessionStoreError::Io(err.to_string()),
            JsonFileError::Parse { .. } | JsonFileError::Serialize(_) => {
                SessionStoreError::Serialization(err.to_string())
            }
        }
    }
}

/// File-backed session archive.
#[derive(Debug, Clone)]
pub struct FileSessionArchive {
    dir: PathBuf,
}

impl FileSessionArchive {
    /// `data_dir` is the storage root; sessions live in its `sessions/` child.
    pub fn new<P: AsRef<Path>>(data_dir: P) -> Self {
        Self {
            dir: data_dir.as_ref().join("sessions"),
        }
    }

    fn path_for(&self, chat_id: &ChatId) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_safe_name(chat_id.as_str()), JSON_EXT))
    }
}

#[async_trait]
impl SessionArchive for FileSessionArchive {
    async fn load_all(&self) -> Result<Vec<ConversationState>, SessionStoreError> {
        let mut sessions = Vec::new();
        for path in json_file::list_json(&self.dir).await? {
            match json_file::read_optional::<ConversationState>(&path).await {
                Ok(Some(state)) => sessions.push(state),
                Ok(None) => {}
                // One unreadable chat must not keep the others from loading
                Err(e) => tracing::error!(error = %e, "skipping unreadable session file"),
            }
        }
        Ok(sessions)
    }

    async fn write(&self, state: &ConversationState) -> Result<(), SessionStoreError> {
        json_file::write_atomic(&self.path_for(state.chat_id()), state).await?;
        Ok(())
    }

    async fn remove(&self, chat_id: &ChatId) -> Result<(), SessionStoreError> {
        json_file::remove_if_exists(&self.path_for(chat_id)).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::conversation::Role;
    use crate::domain::script::{ScriptVersionName, StepKey};
    use tempfile::TempDir;

    fn state(chat: &str) -> ConversationState {
        let mut state = ConversationState::new(
            ChatId::new(chat).unwrap(),
            ScriptVersionName::new("v1").unwrap(),
            StepKey::new("greeting").unwrap(),
        );
        state.append(Role::Customer, "hola", Vec::new());
        state
    }

    #[tokio::test]
    async fn write_load_and_remove() {
        let dir = TempDir::new().unwrap();
        let archive = FileSessionArchive::new(dir.path());

        archive.write(&state("111@c.us")).await.unwrap();
        archive.write(&state("222@c.us")).await.unwrap();
        assert!(dir.path().join("sessions").join("111%40c.us.json").exists());

        let loaded = archive.load_all().await.unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].history()[0].content, "hola");

        archive.remove(&ChatId::new("111@c.us").unwrap()).await.unwrap();
        assert_eq!(archive.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn removing_a_missing_session_is_fine() {
        let dir = TempDir::new().unwrap();
        let archive = FileSessionArchive::new(dir.path());
        archive.remove(&ChatId::new("nobody").unwrap()).await.unwrap();
    }

    #[tokio::test]
    async fn corrupt_files_are_skipped() {
        let dir = TempDir::new().unwrap();
        let archive = FileSessionArchive::new(dir.path());
        archive.write(&state("ok")).await.unwrap();
        tokio::fs::write(dir.path().join("sessions").join("bad.json"), b"[]")
            .await
            .unwrap();

        assert_eq!(archive.load_all().await.unwrap().len(), 1);
    }
}
