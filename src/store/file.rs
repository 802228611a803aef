use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use cookie::Cookie;

use super::{CredentialStore, Snapshot, StoreState, poisoned};
use crate::error::Error;

/// Credential store persisted as a JSON file.
///
/// The file is read once on [`FileStore::open`] and rewritten after every
/// mutation (temp file + rename, so a crash never leaves it half-written).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    state: Mutex<StoreState>,
}

impl FileStore {
    /// Open the store at `path`, starting empty if the file does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Store`] if the file exists but cannot be read or parsed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, Error> {
        let path = path.into();
        let state = match fs::read(&path) {
            Ok(bytes) => {
                let snapshot: Snapshot = serde_json::from_slice(&bytes).map_err(|e| {
                    Error::Store(format!("{}: {e}", path.display()))
                })?;
                StoreState::from_snapshot(snapshot)?
            }
            Err(e) if e.kind() == ErrorKind::NotFound => StoreState::default(),
            Err(e) => return Err(Error::Store(format!("{}: {e}", path.display()))),
        };
        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn mutate(&self, f: impl FnOnce(&mut StoreState)) -> Result<(), Error> {
        let mut state = self.state.lock().map_err(poisoned)?;
        f(&mut state);
        self.flush(&state)
    }

    fn flush(&self, state: &StoreState) -> Result<(), Error> {
        let bytes = serde_json::to_vec_pretty(&state.to_snapshot())?;
        let tmp = self.path.with_extension("tmp");
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|e| Error::Store(format!("{}: {e}", parent.display())))?;
        }
        fs::write(&tmp, bytes).map_err(|e| Error::Store(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, &self.path)
            .map_err(|e| Error::Store(format!("{}: {e}", self.path.display())))
    }
}

impl CredentialStore for FileStore {
    fn cookie(&self, name: &str) -> Result<Option<Cookie<'static>>, Error> {
        Ok(self.state.lock().map_err(poisoned)?.cookie(name))
    }

    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), Error> {
        self.mutate(|state| state.set_cookie(cookie))
    }

    fn remove_cookie(&self, name: &str) -> Result<(), Error> {
        self.mutate(|state| state.remove_cookie(name))
    }

    fn item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.state.lock().map_err(poisoned)?.item(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.mutate(|state| state.set_item(key, value))
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.mutate(|state| state.remove_item(key))
    }
}
