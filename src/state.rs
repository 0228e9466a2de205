use log::debug;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::{fs, io};
use thiserror::Error;

/// Persisted view of one managed object.
///
/// Holds the server assigned identifier plus the attributes mirrored from
/// configuration and read responses. Sensitive attributes are only kept as a
/// SHA-256 fingerprint, so a changed secret can be detected without ever
/// writing it down.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    #[serde(default)]
    attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    fingerprints: BTreeMap<String, String>,
}

impl ResourceState {
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn set_id(&mut self, id: impl Into<String>) {
        self.id = Some(id.into());
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.attributes.insert(name.to_string(), value.into());
    }

    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn fingerprint(&self, name: &str) -> Option<&str> {
        self.fingerprints.get(name).map(String::as_str)
    }

    /// Records the fingerprint of a sensitive value, the value itself is dropped.
    pub fn set_fingerprint(&mut self, name: &str, value: &str) {
        self.fingerprints
            .insert(name.to_string(), format!("{:x}", Sha256::digest(value.as_bytes())));
    }
}

#[derive(Error, Debug)]
pub enum StateFileError {
    #[error("IO Error ({})", .0)]
    IOError(#[from] io::Error),
    #[error("Invalid state file ({})", .0)]
    SerializationError(#[from] serde_json::Error),
}

/// JSON file holding the state of a single managed object.
#[derive(Clone, Debug)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> PathBuf {
        self.path.clone()
    }

    /// Returns the stored state, `None` when nothing has been applied yet.
    pub fn load(&self) -> Result<Option<ResourceState>, StateFileError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!("No state file found at {}", self.path.display());
                return Ok(None);
            }
            Err(err) => return Err(err.into()),
        };

        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, state: &ResourceState) -> Result<(), StateFileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        fs::write(&self.path, serde_json::to_string_pretty(state)?)?;
        debug!("State written to {}", self.path.display());
        Ok(())
    }

    /// Removes the state file, a missing file is not an error.
    pub fn remove(&self) -> Result<(), StateFileError> {
        match fs::remove_file(&self.path) {
            Err(err) if err.kind() != io::ErrorKind::NotFound => Err(err.into()),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn fingerprint_hides_value() {
        let mut state = ResourceState::default();
        state.set_fingerprint("access_secret", "secret1");

        let fingerprint = state.fingerprint("access_secret").unwrap();
        assert_eq!(fingerprint.len(), 64);
        assert!(!fingerprint.contains("secret1"));
        assert!(!serde_json::to_string(&state).unwrap().contains("secret1"));

        let mut other = ResourceState::default();
        other.set_fingerprint("access_secret", "secret1");
        assert_eq!(state, other);
    }

    #[test]
    fn load_missing_file() {
        let dir = tempdir().unwrap();
        let state_file = StateFile::new(dir.path().join("state.json"));
        assert!(state_file.load().unwrap().is_none());
    }

    #[test]
    fn save_and_load() {
        let dir = tempdir().unwrap();
        let state_file = StateFile::new(dir.path().join("nested").join("state.json"));

        let mut state = ResourceState::default();
        state.set_id("42");
        state.set("name", "registry-a");
        state_file.save(&state).unwrap();

        let loaded = state_file.load().unwrap().unwrap();
        assert_eq!(loaded.id(), Some("42"));
        assert_eq!(loaded.get("name"), Some("registry-a"));
    }

    #[test]
    fn load_invalid_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("state.json");
        fs::write(&path, "not json").unwrap();

        let err = StateFile::new(path).load().unwrap_err();
        assert!(matches!(err, StateFileError::SerializationError(_)));
    }

    #[test]
    fn remove() {
        let dir = tempdir().unwrap();
        let state_file = StateFile::new(dir.path().join("state.json"));
        state_file.save(&ResourceState::default()).unwrap();

        state_file.remove().unwrap();
        assert!(!state_file.path().exists());
        // Second time the file is already gone
        state_file.remove().unwrap();
    }
}
