use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::SessionStorage;
use crate::{AvatarError, Result};

const LOG_PREFIX: &str = "[file-storage]";
const STORAGE_VERSION: i32 = 1;

/// Session storage persisted as a single JSON document.
///
/// Every `get` reads the file and every `set` rewrites it, so several
/// processes sharing a session file see each other's writes.
pub struct FileStorage {
    log_prefix: String,
    label: String,
    path: PathBuf,
}

#[derive(Serialize, Deserialize)]
struct FileStorageData {
    version: i32,
    entries: BTreeMap<String, String>,
}

impl Default for FileStorageData {
    fn default() -> Self {
        Self {
            version: STORAGE_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl FileStorage {
    /// Create a new file storage with a diagnostic label and file path
    pub fn new(label: String, path: &Path) -> Self {
        Self {
            log_prefix: format!("{} {}", LOG_PREFIX, label),
            label,
            path: PathBuf::from(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_fs(&self) -> Result<FileStorageData> {
        if !self.path.exists() {
            log::debug!("{} {:?} does not exist yet", self.log_prefix, self.path);
            return Ok(FileStorageData::default());
        }

        let content = fs::read_to_string(&self.path)?;
        let data: FileStorageData = serde_json::from_str(&content)?;
        self.verify_version(data.version)?;

        Ok(data)
    }

    /// Write to a sibling temp file first, then move it over the target.
    fn write_fs(&self, data: &FileStorageData) -> Result<()> {
        let dir = match self.path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&dir)?;

        let tmp_name: String = std::iter::repeat_with(fastrand::alphanumeric)
            .take(10)
            .collect();
        let tmp_path = dir.join(format!(".{}.tmp", tmp_name));

        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, data)?;
        writer.flush()?;
        drop(writer);

        if let Err(e) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(e.into());
        }

        log::info!(
            "{} {} entries have been written",
            self.log_prefix,
            data.entries.len()
        );
        Ok(())
    }

    fn verify_version(&self, version: i32) -> Result<()> {
        match version.cmp(&STORAGE_VERSION) {
            std::cmp::Ordering::Equal => Ok(()),
            std::cmp::Ordering::Greater => Err(AvatarError::Storage(
                self.label.clone(),
                "Storage format is newer than the app".to_owned(),
            )),
            std::cmp::Ordering::Less => Err(AvatarError::Storage(
                self.label.clone(),
                "Storage format is older than the app".to_owned(),
            )),
        }
    }
}

impl SessionStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.read_fs()?.entries.remove(key))
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let mut data = self.read_fs()?;
        data.entries.insert(key.to_owned(), value);
        self.write_fs(&data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new("file_storage_test").unwrap();
        let storage = FileStorage::new(
            "session".to_owned(),
            &dir.path().join("session.json"),
        );

        assert_eq!(storage.get("chat-app-user").unwrap(), None);
        assert!(!storage.path().exists());
    }

    #[test]
    fn values_survive_reopening() {
        let dir = TempDir::new("file_storage_test").unwrap();
        let path = dir.path().join("nested").join("session.json");

        let mut storage = FileStorage::new("session".to_owned(), &path);
        storage.set("a", "1".to_owned()).unwrap();
        storage.set("b", "{\"x\":\"y:z\"}".to_owned()).unwrap();
        storage.set("a", "2".to_owned()).unwrap();

        let reopened = FileStorage::new("session".to_owned(), &path);
        assert_eq!(reopened.get("a").unwrap().as_deref(), Some("2"));
        assert_eq!(
            reopened.get("b").unwrap().as_deref(),
            Some("{\"x\":\"y:z\"}")
        );

        let leftovers = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn newer_format_is_rejected() {
        let dir = TempDir::new("file_storage_test").unwrap();
        let path = dir.path().join("session.json");
        fs::write(&path, r#"{"version":7,"entries":{}}"#).unwrap();

        let storage = FileStorage::new("session".to_owned(), &path);
        match storage.get("a") {
            Err(AvatarError::Storage(label, message)) => {
                assert_eq!(label, "session");
                assert!(message.contains("newer"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
