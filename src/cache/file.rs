//! File-backed storage backend.
//!
//! One file per key under a root directory. File names are the hex encoding
//! of the key, so any key string maps to a portable name and can be recovered
//! for [`Storage::keys`]. Values are written to a temporary file first and then
//! linked or renamed into place, so readers never see a partial value.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::fs as async_fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::{Storage, StoreError};

const ENTRY_EXTENSION: &str = "entry";
const TEMP_PREFIX: &str = "tmp_";

/// A [`Storage`] that keeps each value in its own file.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    temp_seq: AtomicU64,
}

impl FileStore {
    /// Opens a store rooted at `root`, creating the directory if needed and
    /// clearing temporary files left behind by an interrupted write.
    pub async fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        async_fs::create_dir_all(&root).await?;
        let store = Self {
            root,
            temp_seq: AtomicU64::new(0),
        };
        store.remove_temp_files().await?;
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.root
            .join(format!("{}.{ENTRY_EXTENSION}", encode_name(key)))
    }

    fn temp_path(&self) -> PathBuf {
        let seq = self.temp_seq.fetch_add(1, Ordering::Relaxed);
        self.root
            .join(format!("{TEMP_PREFIX}{}_{seq}", std::process::id()))
    }

    async fn write_temp(&self, value: &[u8]) -> Result<PathBuf, StoreError> {
        let path = self.temp_path();
        let mut file = async_fs::File::create(&path).await?;
        if let Err(e) = write_all_synced(&mut file, value).await {
            drop(file);
            async_fs::remove_file(&path).await.ok();
            return Err(e.into());
        }
        Ok(path)
    }

    async fn remove_temp_files(&self) -> Result<(), StoreError> {
        let mut dir = async_fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let is_temp = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(TEMP_PREFIX));
            if is_temp {
                debug!(path = %entry.path().display(), "removing stale temp file");
                async_fs::remove_file(entry.path()).await.ok();
            }
        }
        Ok(())
    }
}

async fn write_all_synced(file: &mut async_fs::File, value: &[u8]) -> std::io::Result<()> {
    file.write_all(value).await?;
    file.sync_all().await
}

fn encode_name(key: &str) -> String {
    key.bytes().map(|b| format!("{b:02x}")).collect()
}

fn decode_name(name: &str) -> Option<String> {
    if name.len() % 2 != 0 {
        return None;
    }
    let bytes = (0..name.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(name.get(i..i + 2)?, 16).ok())
        .collect::<Option<Vec<u8>>>()?;
    String::from_utf8(bytes).ok()
}

fn not_found_as(err: std::io::Error) -> StoreError {
    if err.kind() == ErrorKind::NotFound {
        StoreError::NotFound
    } else {
        StoreError::Io(err)
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError> {
        async_fs::read(self.entry_path(key))
            .await
            .map_err(not_found_as)
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let temp = self.write_temp(&value).await?;
        // Linking fails if the target exists, which gives first-write-wins
        // without a window where the target holds a partial value.
        let linked = async_fs::hard_link(&temp, self.entry_path(key)).await;
        if let Err(e) = async_fs::remove_file(&temp).await {
            warn!(path = %temp.display(), error = %e, "failed to remove temp file");
        }
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(StoreError::AlreadyExists),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    async fn update(&self, key: &str, value: Vec<u8>) -> Result<(), StoreError> {
        let path = self.entry_path(key);
        async_fs::metadata(&path).await.map_err(not_found_as)?;
        let temp = self.write_temp(&value).await?;
        if let Err(e) = async_fs::rename(&temp, &path).await {
            async_fs::remove_file(&temp).await.ok();
            return Err(StoreError::Io(e));
        }
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), StoreError> {
        async_fs::remove_file(self.entry_path(key))
            .await
            .map_err(not_found_as)
    }

    async fn keys(&self) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        let mut dir = async_fs::read_dir(&self.root).await?;
        while let Some(entry) = dir.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name
                .to_str()
                .and_then(|name| name.strip_suffix(&format!(".{ENTRY_EXTENSION}")))
            else {
                continue;
            };
            match decode_name(stem) {
                Some(key) => keys.push(key),
                None => debug!(file = stem, "skipping file with undecodable name"),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn open_store() -> (TempDir, FileStore) {
        let dir = TempDir::new().unwrap();
        let store = FileStore::open(dir.path().join("entries")).await.unwrap();
        (dir, store)
    }

    #[test]
    fn names_round_trip() {
        for key in ["gin:cache:abc", "", "ü/../x"] {
            assert_eq!(decode_name(&encode_name(key)).as_deref(), Some(key));
        }
        assert_eq!(decode_name("abc"), None);
        assert_eq!(decode_name("zz"), None);
    }

    #[tokio::test]
    async fn set_get_and_first_write_wins() {
        let (_dir, store) = open_store().await;
        store.set("gin:cache:1", b"one".to_vec()).await.unwrap();
        assert!(matches!(
            store.set("gin:cache:1", b"two".to_vec()).await,
            Err(StoreError::AlreadyExists)
        ));
        assert_eq!(store.get("gin:cache:1").await.unwrap(), b"one");
    }

    #[tokio::test]
    async fn update_replaces_existing_only() {
        let (_dir, store) = open_store().await;
        assert!(store.update("k", b"x".to_vec()).await.unwrap_err().is_not_found());
        store.set("k", b"one".to_vec()).await.unwrap();
        store.update("k", b"two".to_vec()).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), b"two");
    }

    #[tokio::test]
    async fn remove_then_missing() {
        let (_dir, store) = open_store().await;
        store.set("k", b"v".to_vec()).await.unwrap();
        store.remove("k").await.unwrap();
        assert!(store.get("k").await.unwrap_err().is_not_found());
        assert!(store.remove("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn keys_skip_temp_and_foreign_files() {
        let (_dir, store) = open_store().await;
        store.set("b", Vec::new()).await.unwrap();
        store.set("a", Vec::new()).await.unwrap();
        std::fs::write(store.root().join("notes.txt"), b"x").unwrap();
        std::fs::write(store.root().join("tmp_1_0"), b"x").unwrap();
        assert_eq!(store.keys().await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn reopen_clears_stale_temp_files() {
        let (dir, store) = open_store().await;
        store.set("k", b"v".to_vec()).await.unwrap();
        let stale = store.root().join("tmp_99_3");
        std::fs::write(&stale, b"partial").unwrap();
        drop(store);

        let store = FileStore::open(dir.path().join("entries")).await.unwrap();
        assert!(!stale.exists());
        assert_eq!(store.get("k").await.unwrap(), b"v");
    }
}
