//! File-backed durable credential storage.
//!
//! The credential is stored as a flat JSON object of the fixed storage keys.
//! Writes go to a sibling temp file which is then renamed over the target,
//! so readers never observe a half-written record.

use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use authwire_core::auth::storage::{from_entries, to_entries};
use authwire_core::{CredentialStorage, StorageError};
use authwire_domain::Credential;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct FileCredentialStorage {
    path: PathBuf,
}

impl FileCredentialStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomically(&self, contents: &[u8]) -> io::Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        let mut options = OpenOptions::new();
        options.write(true).create(true).truncate(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&temp)?;
        file.write_all(contents)?;
        file.sync_all()?;
        drop(file);
        fs::rename(&temp, &self.path)
    }
}

impl CredentialStorage for FileCredentialStorage {
    fn load(&self) -> Result<Option<Credential>, StorageError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(unavailable(&self.path, &err)),
        };
        let entries: BTreeMap<String, String> = serde_json::from_str(&contents)
            .map_err(|e| StorageError::Corrupt(format!("{}: {e}", self.path.display())))?;
        from_entries(&entries)
    }

    fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        let contents = serde_json::to_vec_pretty(&to_entries(credential))
            .map_err(|e| StorageError::Unavailable(e.to_string()))?;
        self.write_atomically(&contents).map_err(|err| unavailable(&self.path, &err))?;
        debug!(path = %self.path.display(), "credential written");
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(unavailable(&self.path, &err)),
        }
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

fn unavailable(path: &Path, err: &io::Error) -> StorageError {
    StorageError::Unavailable(format!("{}: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use authwire_domain::constants::STORAGE_KEY_ACCESS_TOKEN;
    use chrono::{DateTime, Utc};
    use tempfile::TempDir;

    use super::*;

    fn credential(access: &str) -> Credential {
        let issued = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z").unwrap().with_timezone(&Utc);
        Credential::bearer(access, "refresh", issued, Duration::from_secs(900)).unwrap()
    }

    #[test]
    fn missing_file_loads_as_empty() {
        let dir = TempDir::new().unwrap();
        let storage = FileCredentialStorage::new(dir.path().join("credential.json"));
        assert_eq!(storage.load().unwrap(), None);
        storage.clear().unwrap();
    }

    #[test]
    fn save_replaces_previous_record() {
        let dir = TempDir::new().unwrap();
        let storage = FileCredentialStorage::new(dir.path().join("nested/credential.json"));

        storage.save(&credential("first")).unwrap();
        storage.save(&credential("second")).unwrap();

        assert_eq!(storage.load().unwrap(), Some(credential("second")));
        assert!(!storage.temp_path().exists());

        let raw: BTreeMap<String, String> =
            serde_json::from_str(&fs::read_to_string(storage.path()).unwrap()).unwrap();
        assert_eq!(raw[STORAGE_KEY_ACCESS_TOKEN], "second");
    }

    #[test]
    fn clear_removes_the_file() {
        let dir = TempDir::new().unwrap();
        let storage = FileCredentialStorage::new(dir.path().join("credential.json"));
        storage.save(&credential("tok")).unwrap();

        storage.clear().unwrap();

        assert!(!storage.path().exists());
        assert_eq!(storage.load().unwrap(), None);
    }

    #[test]
    fn garbage_is_corrupt() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("credential.json");
        fs::write(&path, "not json").unwrap();

        let err = FileCredentialStorage::new(path).load().unwrap_err();
        assert!(matches!(err, StorageError::Corrupt(_)));
    }

    #[cfg(unix)]
    #[test]
    fn record_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let storage = FileCredentialStorage::new(dir.path().join("credential.json"));
        storage.save(&credential("tok")).unwrap();

        let mode = fs::metadata(storage.path()).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
