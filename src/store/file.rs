use super::EventStore;
use crate::{error::StoreError, event::Event};
use async_trait::async_trait;
use std::{
    io::ErrorKind,
    path::{Path, PathBuf},
};
use tokio::fs;

/// Whole-collection JSON file. Saves go through a sibling temp file and a
/// rename so readers see either the old or the new list.
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    #[cfg(test)]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|name| name.to_os_string())
            .unwrap_or_else(|| "events".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn io_error(&self, source: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.clone(),
            source,
        }
    }
}

#[async_trait]
impl EventStore for FileStore {
    async fn list(&self) -> Result<Vec<Event>, StoreError> {
        let contents = match fs::read(&self.path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "events file not found");
                return Ok(Vec::new());
            }
            Err(err) => return Err(self.io_error(err)),
        };
        Ok(serde_json::from_slice(&contents)?)
    }

    async fn save(&self, events: &[Event]) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(events)?;
        let temp = self.temp_path();
        fs::write(&temp, encoded)
            .await
            .map_err(|err| self.io_error(err))?;
        if let Err(err) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(self.io_error(err));
        }
        tracing::info!(path = %self.path.display(), count = events.len(), "saved events");
        Ok(())
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{EventKind, EventTime};
    use tempfile::TempDir;

    fn store_in(dir: &TempDir) -> FileStore {
        FileStore::new(dir.path().join("events_data.json"))
    }

    #[tokio::test]
    async fn missing_file_lists_empty() {
        let dir = TempDir::new().unwrap();
        assert!(store_in(&dir).list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_save_round_trips() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(&[]).await.unwrap();
        assert!(store.list().await.unwrap().is_empty());
        assert!(!store.temp_path().exists());
    }

    #[tokio::test]
    async fn save_overwrites_previous_contents() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let first = Event::new(
            EventKind::Feed,
            EventTime::parse("2025-03-01T08:00:00").unwrap(),
        )
        .with_amount(3);
        let second = Event::new(
            EventKind::Pee,
            EventTime::parse("2025-03-01T09:00:00.000Z").unwrap(),
        );

        store.save(&[first.clone(), second.clone()]).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![first, second.clone()]);

        store.save(&[second.clone()]).await.unwrap();
        assert_eq!(store.list().await.unwrap(), vec![second]);
    }

    #[tokio::test]
    async fn malformed_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.path(), b"{not json").unwrap();
        assert!(matches!(
            store.list().await.unwrap_err(),
            StoreError::Malformed(_)
        ));
    }
}
