//! Persists the negotiated (action, observation) space pair next to a
//! checkpoint so a serving process can rebuild the environment contract
//! without the model.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use tracing::debug;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::spaces::Space;

const SPACES_DIR: &str = "spaces";
const ACTION_FILE: &str = "action_space.json";
const OBSERVATION_FILE: &str = "observation_space.json";

#[derive(Debug, Clone)]
pub struct SpacesStore {
    dir: PathBuf,
}

impl SpacesStore {
    pub fn new(checkpoint_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: checkpoint_dir.as_ref().join(SPACES_DIR),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_saved(&self) -> bool {
        self.dir.join(ACTION_FILE).is_file() && self.dir.join(OBSERVATION_FILE).is_file()
    }

    /// Writes both descriptors unless they already exist. Returns whether this
    /// call wrote anything.
    pub fn save(&self, action: &Space, observation: &Space) -> Result<bool> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            Error::Persistence(format!("could not create '{}': {e}", self.dir.display()))
        })?;
        let wrote_action = self.save_one(ACTION_FILE, action)?;
        let wrote_observation = self.save_one(OBSERVATION_FILE, observation)?;
        Ok(wrote_action || wrote_observation)
    }

    pub fn load(&self) -> Result<(Space, Space)> {
        Ok((self.load_one(ACTION_FILE)?, self.load_one(OBSERVATION_FILE)?))
    }

    fn save_one(&self, name: &str, space: &Space) -> Result<bool> {
        let target = self.dir.join(name);
        if target.exists() {
            return Ok(false);
        }

        let lock_path = self.dir.join(format!("{name}.lock"));
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| persistence(&lock_path, e))?;
        lock.lock_exclusive().map_err(|e| persistence(&lock_path, e))?;

        // Another writer may have finished while we waited for the lock.
        let written = if target.exists() {
            false
        } else {
            self.write_atomically(&target, space)?;
            debug!(path = %target.display(), "Saved space descriptor");
            true
        };

        let _ = FileExt::unlock(&lock);
        Ok(written)
    }

    fn write_atomically(&self, target: &Path, space: &Space) -> Result<()> {
        let json = serde_json::to_vec_pretty(space)
            .map_err(|e| Error::Persistence(format!("could not encode space: {e}")))?;
        let temp = self.dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        let result = (|| {
            let mut file = File::create(&temp)?;
            file.write_all(&json)?;
            file.sync_all()?;
            fs::rename(&temp, target)
        })();
        if let Err(e) = result {
            let _ = fs::remove_file(&temp);
            return Err(persistence(target, e));
        }
        Ok(())
    }

    fn load_one(&self, name: &str) -> Result<Space> {
        let path = self.dir.join(name);
        let json = fs::read(&path).map_err(|e| persistence(&path, e))?;
        let space: Space = serde_json::from_slice(&json).map_err(|e| {
            Error::Persistence(format!("could not decode '{}': {e}", path.display()))
        })?;
        space.validate().map_err(|e| {
            Error::Persistence(format!("'{}' holds an invalid space: {e}", path.display()))
        })?;
        Ok(space)
    }
}

fn persistence(path: &Path, e: std::io::Error) -> Error {
    Error::Persistence(format!("'{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (Space, Space) {
        (
            Space::discrete(3).unwrap(),
            Space::continuous(vec![f64::NEG_INFINITY, 0.0], vec![f64::INFINITY, 1.0]).unwrap(),
        )
    }

    #[test]
    fn saves_once_and_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpacesStore::new(dir.path());
        let (action, observation) = pair();

        assert!(!store.is_saved());
        assert!(store.save(&action, &observation).unwrap());
        assert!(store.is_saved());
        assert!(!store.save(&action, &observation).unwrap());

        let (loaded_action, loaded_observation) = store.load().unwrap();
        assert_eq!(loaded_action, action);
        assert_eq!(loaded_observation, observation);
    }

    #[test]
    fn existing_files_are_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpacesStore::new(dir.path());
        let (action, observation) = pair();
        store.save(&action, &observation).unwrap();

        let other = Space::multi_binary(4).unwrap();
        assert!(!store.save(&other, &other).unwrap());
        assert_eq!(store.load().unwrap().0, action);
    }

    #[test]
    fn infinite_bounds_are_stored_as_null() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpacesStore::new(dir.path());
        let (action, observation) = pair();
        store.save(&action, &observation).unwrap();

        let raw = fs::read_to_string(store.dir().join(OBSERVATION_FILE)).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["low"][0], serde_json::Value::Null);
        assert_eq!(json["high"][0], serde_json::Value::Null);
    }

    #[test]
    fn load_failures_are_persistence_errors() {
        let dir = tempfile::tempdir().unwrap();
        let store = SpacesStore::new(dir.path());
        assert!(matches!(store.load(), Err(Error::Persistence(_))));

        fs::create_dir_all(store.dir()).unwrap();
        fs::write(store.dir().join(ACTION_FILE), "{not json").unwrap();
        fs::write(
            store.dir().join(OBSERVATION_FILE),
            r#"{"kind": "tuple", "spaces": [{"kind": "discrete", "n": 2, "start": 0}]}"#,
        )
        .unwrap();
        assert!(matches!(store.load(), Err(Error::Persistence(_))));

        fs::write(store.dir().join(ACTION_FILE), r#"{"kind": "multi_binary", "n": 2}"#).unwrap();
        let err = store.load().unwrap_err();
        assert!(err.to_string().contains("invalid space"));

        fs::write(
            store.dir().join(OBSERVATION_FILE),
            format!(
                r#"{{"kind": "continuous", "low": [0.0], "high": [1.0], "shape": [{}, 2]}}"#,
                usize::MAX
            ),
        )
        .unwrap();
        let err = store.load().unwrap_err();
        assert!(matches!(err, Error::Persistence(_)));
        assert!(err.to_string().contains("too large"), "{err}");
    }
}
