use std::sync::RwLock;

use cookie::Cookie;

use super::{CredentialStore, StoreState, poisoned};
use crate::error::Error;

/// Process-local credential store. Contents are lost when it is dropped.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<StoreState>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn cookie(&self, name: &str) -> Result<Option<Cookie<'static>>, Error> {
        Ok(self.state.read().map_err(poisoned)?.cookie(name))
    }

    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), Error> {
        self.state.write().map_err(poisoned)?.set_cookie(cookie);
        Ok(())
    }

    fn remove_cookie(&self, name: &str) -> Result<(), Error> {
        self.state.write().map_err(poisoned)?.remove_cookie(name);
        Ok(())
    }

    fn item(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.state.read().map_err(poisoned)?.item(key))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), Error> {
        self.state.write().map_err(poisoned)?.set_item(key, value);
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), Error> {
        self.state.write().map_err(poisoned)?.remove_item(key);
        Ok(())
    }
}
