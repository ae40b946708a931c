//! Durable key/value persistence for the session.
//!
//! The session manager mirrors the active session into a [`SessionStore`]
//! so that it survives a restart. The layout is three string keys:
//!
//! | key              | value                                   |
//! |------------------|-----------------------------------------|
//! | `user`           | identity record, JSON                   |
//! | `token`          | bearer token                            |
//! | `expirationTime` | expiry instant, epoch milliseconds      |
//!
//! All three are written together and removed together. A store holding
//! only some of them, or values that don't parse, is treated as holding
//! no session at all.
//!
//! Two implementations ship with the crate: [`MemoryStore`] (tests, and
//! hosts that handle persistence elsewhere) and [`FileStore`] (a single
//! JSON file, replaced atomically on every write).

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::DateTime;

use crate::{Identity, Session, StoreError};

/// Key holding the serialized identity.
pub const USER_KEY: &str = "user";
/// Key holding the bearer token.
pub const TOKEN_KEY: &str = "token";
/// Key holding the expiry instant in epoch milliseconds.
pub const EXPIRY_KEY: &str = "expirationTime";

/// Every key the session occupies, in write order.
pub const SESSION_KEYS: [&str; 3] = [USER_KEY, TOKEN_KEY, EXPIRY_KEY];

// ---------------------------------------------------------------------------
// SessionStore trait
// ---------------------------------------------------------------------------

/// A durable string-to-string map.
///
/// Only the [`SessionManager`](crate::SessionManager) writes to it. The
/// `*_many` methods have looping defaults; implementations that can do
/// better (one lock, one file write) should override them so a session
/// is read and written as a unit.
pub trait SessionStore: Send + Sync + 'static {
    /// Reads one key.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes one key.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes one key. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Reads several keys at once.
    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        keys.iter().map(|key| self.get(key)).collect()
    }

    /// Writes several keys at once.
    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        for (key, value) in entries {
            self.set(key, value)?;
        }
        Ok(())
    }

    /// Removes several keys at once.
    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        for key in keys {
            self.remove(key)?;
        }
        Ok(())
    }
}

/// Lets tests keep a handle on the store they gave to the manager.
impl<S: SessionStore + ?Sized> SessionStore for Arc<S> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        (**self).get_many(keys)
    }

    fn set_many(&self, entries: &[(&str, &str)]) -> Result<(), StoreError> {
        (**self).set_many(entries)
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        (**self).remove_many(keys)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// An in-process store. Nothing survives the process, but every
/// `*_many` call happens under a single lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys currently held.
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns `true` if the store holds no keys.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }
}

impl SessionStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        let entries = lock(&self.entries);
        Ok(keys.iter().map(|key| entries.get(*key).cloned()).collect())
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        for (key, value) in pairs {
            entries.insert((*key).to_string(), (*value).to_string());
        }
        Ok(())
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        let mut entries = lock(&self.entries);
        for key in keys {
            entries.remove(*key);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// FileStore
// ---------------------------------------------------------------------------

/// A store backed by one JSON object on disk.
///
/// Every write rewrites the whole file through a sibling `.tmp` file and
/// a rename, so a crash mid-write leaves either the old or the new
/// contents, never a mix. A missing file reads as an empty store.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process.
    write_lock: Mutex<()>,
}

impl FileStore {
    /// Opens (without reading) the store at `path`, creating the parent
    /// directory if needed.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<BTreeMap<String, String>, StoreError> {
        match fs::read(&self.path) {
            Ok(bytes) if bytes.is_empty() => Ok(BTreeMap::new()),
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(StoreError::Corrupt),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_all(&self, entries: &BTreeMap<String, String>) -> Result<(), StoreError> {
        if entries.is_empty() {
            return match fs::remove_file(&self.path) {
                Err(e) if e.kind() != ErrorKind::NotFound => Err(e.into()),
                _ => Ok(()),
            };
        }
        let bytes = serde_json::to_vec_pretty(entries).map_err(StoreError::Corrupt)?;
        let tmp = self.path.with_extension("tmp");
        write_private(&tmp, &bytes)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }

    fn update(
        &self,
        apply: impl FnOnce(&mut BTreeMap<String, String>),
    ) -> Result<(), StoreError> {
        let _guard = lock(&self.write_lock);
        let mut entries = match self.read_all() {
            Ok(entries) => entries,
            Err(StoreError::Corrupt(error)) => {
                tracing::warn!(
                    path = %self.path.display(),
                    %error,
                    "discarding unreadable session file"
                );
                BTreeMap::new()
            }
            Err(e) => return Err(e),
        };
        apply(&mut entries);
        self.write_all(&entries)
    }
}

/// Writes `bytes` to `path`, readable by the owner only on unix.
#[cfg(unix)]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; a leftover tmp file keeps its own.
    file.set_permissions(fs::Permissions::from_mode(0o600))?;
    file.write_all(bytes)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    fs::write(path, bytes)
}

impl SessionStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        self.update(|entries| {
            entries.remove(key);
        })
    }

    fn get_many(&self, keys: &[&str]) -> Result<Vec<Option<String>>, StoreError> {
        let mut entries = self.read_all()?;
        Ok(keys.iter().map(|key| entries.remove(*key)).collect())
    }

    fn set_many(&self, pairs: &[(&str, &str)]) -> Result<(), StoreError> {
        self.update(|entries| {
            for (key, value) in pairs {
                entries.insert((*key).to_string(), (*value).to_string());
            }
        })
    }

    fn remove_many(&self, keys: &[&str]) -> Result<(), StoreError> {
        self.update(|entries| {
            for key in keys {
                entries.remove(*key);
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Session layout
// ---------------------------------------------------------------------------

/// What [`load_session`] found in the store.
#[derive(Debug)]
pub(crate) enum Persisted {
    /// None of the session keys are present.
    Empty,
    /// All keys present and parseable. Validity is NOT checked here.
    Found(Session),
    /// Some keys missing, or a value failed to parse.
    Unusable(&'static str),
}

/// Reads the three session keys in one call and decodes them.
pub(crate) fn load_session(store: &dyn SessionStore) -> Result<Persisted, StoreError> {
    let values = store.get_many(&SESSION_KEYS)?;
    let (user, token, expiry) = match values.as_slice() {
        [Some(user), Some(token), Some(expiry)] => (user, token, expiry),
        [None, None, None] => return Ok(Persisted::Empty),
        _ => return Ok(Persisted::Unusable("partial session keys")),
    };

    let Ok(identity) = serde_json::from_str::<Identity>(user) else {
        return Ok(Persisted::Unusable("identity is not a valid user record"));
    };
    let Some(expires_at) = expiry
        .trim()
        .parse::<i64>()
        .ok()
        .and_then(DateTime::from_timestamp_millis)
    else {
        return Ok(Persisted::Unusable("expiry is not an epoch-millisecond timestamp"));
    };
    if token.is_empty() {
        return Ok(Persisted::Unusable("empty token"));
    }

    Ok(Persisted::Found(Session {
        identity,
        token: token.clone(),
        issued_at: None,
        expires_at,
    }))
}

/// Writes all three session keys in one call.
pub(crate) fn save_session(
    store: &dyn SessionStore,
    session: &Session,
) -> Result<(), StoreError> {
    let user = serde_json::to_string(&session.identity).map_err(StoreError::Corrupt)?;
    let expiry = session.expires_at.timestamp_millis().to_string();
    store.set_many(&[
        (USER_KEY, user.as_str()),
        (TOKEN_KEY, session.token.as_str()),
        (EXPIRY_KEY, expiry.as_str()),
    ])
}

/// Removes all three session keys in one call.
pub(crate) fn clear_session(store: &dyn SessionStore) -> Result<(), StoreError> {
    store.remove_many(&SESSION_KEYS)
}
