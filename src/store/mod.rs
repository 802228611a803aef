//! Credential persistence.
//!
//! A [`CredentialStore`] mirrors the two storage surfaces a browser offers:
//! a cookie jar and a string key/value store. [`MemoryStore`] keeps both in
//! process; [`FileStore`] persists them to a JSON file so a desktop or CLI
//! host keeps its session across restarts.

mod file;
mod memory;

use std::collections::BTreeMap;

use cookie::{Cookie, CookieJar};
use serde::{Deserialize, Serialize};

use crate::error::Error;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Host-provided credential persistence.
///
/// Implementations use interior mutability; the client shares one store
/// between concurrent requests.
///
/// # Example
///
/// ```rust,ignore
/// impl CredentialStore for KeychainStore {
///     fn item(&self, key: &str) -> Result<Option<String>, Error> {
///         self.keychain.get(key).map_err(|e| Error::Store(e.to_string()))
///     }
///     // ...
/// }
/// ```
pub trait CredentialStore: Send + Sync + 'static {
    /// Look up a cookie by name.
    fn cookie(&self, name: &str) -> Result<Option<Cookie<'static>>, Error>;

    /// Add or replace a cookie.
    fn set_cookie(&self, cookie: Cookie<'static>) -> Result<(), Error>;

    /// Remove a cookie. Removing a missing cookie is not an error.
    fn remove_cookie(&self, name: &str) -> Result<(), Error>;

    /// Look up a persistent key/value entry.
    fn item(&self, key: &str) -> Result<Option<String>, Error>;

    /// Insert or overwrite a persistent key/value entry.
    fn set_item(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a persistent entry. Removing a missing key is not an error.
    fn remove_item(&self, key: &str) -> Result<(), Error>;
}

/// In-memory state shared by the bundled stores.
#[derive(Debug, Default, Clone)]
pub(crate) struct StoreState {
    jar: CookieJar,
    items: BTreeMap<String, String>,
}

impl StoreState {
    pub(crate) fn cookie(&self, name: &str) -> Option<Cookie<'static>> {
        self.jar.get(name).cloned()
    }

    pub(crate) fn set_cookie(&mut self, cookie: Cookie<'static>) {
        self.jar.add(cookie);
    }

    pub(crate) fn remove_cookie(&mut self, name: &str) {
        self.jar.remove(Cookie::new(name.to_owned(), ""));
    }

    pub(crate) fn item(&self, key: &str) -> Option<String> {
        self.items.get(key).cloned()
    }

    pub(crate) fn set_item(&mut self, key: &str, value: &str) {
        self.items.insert(key.to_owned(), value.to_owned());
    }

    pub(crate) fn remove_item(&mut self, key: &str) {
        self.items.remove(key);
    }

    fn to_snapshot(&self) -> Snapshot {
        Snapshot {
            cookies: self.jar.iter().map(ToString::to_string).collect(),
            items: self.items.clone(),
        }
    }

    fn from_snapshot(snapshot: Snapshot) -> Result<Self, Error> {
        let mut jar = CookieJar::new();
        for raw in snapshot.cookies {
            let cookie = Cookie::parse(raw)
                .map_err(|e| Error::Store(format!("invalid stored cookie: {e}")))?;
            jar.add(cookie);
        }
        Ok(Self {
            jar,
            items: snapshot.items,
        })
    }
}

/// On-disk layout used by [`FileStore`].
#[derive(Debug, Default, Serialize, Deserialize)]
struct Snapshot {
    /// `Set-Cookie` strings, attributes included.
    #[serde(default)]
    cookies: Vec<String>,
    #[serde(default)]
    items: BTreeMap<String, String>,
}

fn poisoned<T>(_: T) -> Error {
    Error::Store("credential store lock poisoned".into())
}
