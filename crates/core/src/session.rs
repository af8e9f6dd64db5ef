//! Explicit session handling over a small key-value store.
//!
//! A session is an opaque token mapped to `{ authenticated, role, actor_id }`
//! under the key `session:{token}`. Operations receive the resolved [`Actor`];
//! nothing here is process-global.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::identity::{AccountDirectory, Actor, ActorId, Role};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("session is unknown or has ended")]
    UnknownSession,
    #[error("no active account holds role `{0}`")]
    NoAccountForRole(Role),
    #[error("session store failure: {0}")]
    Storage(String),
    #[error("stored session `{key}` is corrupt: {reason}")]
    Corrupt { key: String, reason: String },
}

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError>;
    fn set(&self, key: &str, value: String) -> Result<(), SessionError>;
    fn remove(&self, key: &str) -> Result<(), SessionError>;
}

#[derive(Clone, Default)]
pub struct InMemoryKeyValueStore {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryKeyValueStore {
    fn with_entries<R>(&self, apply: impl FnOnce(&mut HashMap<String, String>) -> R) -> R {
        match self.entries.lock() {
            Ok(mut entries) => apply(&mut entries),
            Err(poisoned) => apply(&mut poisoned.into_inner()),
        }
    }
}

impl KeyValueStore for InMemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        Ok(self.with_entries(|entries| entries.get(key).cloned()))
    }

    fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        self.with_entries(|entries| entries.insert(key.to_string(), value));
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.with_entries(|entries| entries.remove(key));
        Ok(())
    }
}

/// Whole-file JSON object store. Every write rewrites the file.
///
/// All calls do blocking file I/O; async callers run them on a blocking thread.
pub struct JsonFileKeyValueStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl JsonFileKeyValueStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), lock: Mutex::new(()) }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_all(&self) -> Result<HashMap<String, String>, SessionError> {
        if !self.path.exists() {
            return Ok(HashMap::new());
        }
        let raw = fs::read_to_string(&self.path)
            .map_err(|error| SessionError::Storage(format!("{}: {error}", self.path.display())))?;
        if raw.trim().is_empty() {
            return Ok(HashMap::new());
        }
        serde_json::from_str(&raw).map_err(|error| SessionError::Corrupt {
            key: self.path.display().to_string(),
            reason: error.to_string(),
        })
    }

    fn write_all(&self, entries: &HashMap<String, String>) -> Result<(), SessionError> {
        if let Some(parent) = self.path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .map_err(|error| SessionError::Storage(format!("{}: {error}", parent.display())))?;
        }
        let encoded = serde_json::to_string_pretty(entries)
            .map_err(|error| SessionError::Storage(error.to_string()))?;
        fs::write(&self.path, encoded)
            .map_err(|error| SessionError::Storage(format!("{}: {error}", self.path.display())))
    }

    fn locked<R>(
        &self,
        apply: impl FnOnce(&Self) -> Result<R, SessionError>,
    ) -> Result<R, SessionError> {
        let _guard = match self.lock.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        apply(self)
    }
}

impl KeyValueStore for JsonFileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, SessionError> {
        self.locked(|store| Ok(store.read_all()?.get(key).cloned()))
    }

    fn set(&self, key: &str, value: String) -> Result<(), SessionError> {
        self.locked(|store| {
            let mut entries = store.read_all()?;
            entries.insert(key.to_string(), value);
            store.write_all(&entries)
        })
    }

    fn remove(&self, key: &str) -> Result<(), SessionError> {
        self.locked(|store| {
            let mut entries = store.read_all()?;
            if entries.remove(key).is_some() {
                store.write_all(&entries)?;
            }
            Ok(())
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredSession {
    pub authenticated: bool,
    pub role: Role,
    pub actor_id: ActorId,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub actor: Actor,
}

#[derive(Clone)]
pub struct SessionManager {
    store: Arc<dyn KeyValueStore>,
    directory: AccountDirectory,
}

impl SessionManager {
    pub fn new(store: Arc<dyn KeyValueStore>, directory: AccountDirectory) -> Self {
        Self { store, directory }
    }

    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryKeyValueStore::default()), AccountDirectory::demo())
    }

    pub fn directory(&self) -> &AccountDirectory {
        &self.directory
    }

    /// Demo mode: the password is accepted as given and never compared.
    pub fn login(&self, email: &str, _password: &str) -> Result<Session, SessionError> {
        let account =
            self.directory.find_by_email(email).ok_or(SessionError::InvalidCredentials)?;
        let actor = account.actor();
        let token = Uuid::new_v4().simple().to_string();
        self.persist(&token, &actor)?;
        Ok(Session { token, actor })
    }

    /// Resolves a token to its actor. Accounts disabled since login resolve to `None`.
    pub fn resolve(&self, token: &str) -> Result<Option<Actor>, SessionError> {
        let Some(stored) = self.load(token)? else {
            return Ok(None);
        };
        if !stored.authenticated {
            return Ok(None);
        }
        Ok(self
            .directory
            .find_by_id(&stored.actor_id)
            .filter(|account| account.role == stored.role)
            .map(|account| account.actor()))
    }

    pub fn switch_role(&self, token: &str, role: Role) -> Result<Session, SessionError> {
        let stored = self.load(token)?.ok_or(SessionError::UnknownSession)?;
        if !stored.authenticated {
            return Err(SessionError::UnknownSession);
        }
        let account =
            self.directory.find_by_role(role).ok_or(SessionError::NoAccountForRole(role))?;
        let actor = account.actor();
        self.persist(token, &actor)?;
        Ok(Session { token: token.to_string(), actor })
    }

    pub fn logout(&self, token: &str) -> Result<(), SessionError> {
        self.store.remove(&session_key(token))
    }

    fn load(&self, token: &str) -> Result<Option<StoredSession>, SessionError> {
        let key = session_key(token);
        let Some(raw) = self.store.get(&key)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|error| SessionError::Corrupt { key, reason: error.to_string() })
    }

    fn persist(&self, token: &str, actor: &Actor) -> Result<(), SessionError> {
        let stored =
            StoredSession { authenticated: true, role: actor.role, actor_id: actor.id.clone() };
        let encoded = serde_json::to_string(&stored)
            .map_err(|error| SessionError::Storage(error.to_string()))?;
        self.store.set(&session_key(token), encoded)
    }
}

fn session_key(token: &str) -> String {
    format!("session:{token}")
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tempfile::TempDir;

    use super::{
        InMemoryKeyValueStore, JsonFileKeyValueStore, KeyValueStore, SessionError, SessionManager,
    };
    use crate::identity::{AccountDirectory, Role};

    #[test]
    fn login_resolves_the_account_behind_the_email() {
        let sessions = SessionManager::in_memory();

        let session = sessions.login("Leader@Example.com", "anything").expect("known account");
        let actor = sessions.resolve(&session.token).expect("store ok").expect("live session");

        assert_eq!(actor.role, Role::Leader);
        assert_eq!(actor.id.0, "2");
    }

    #[test]
    fn unknown_email_is_rejected() {
        let sessions = SessionManager::in_memory();
        assert_eq!(
            sessions.login("nobody@example.com", "pw").expect_err("unknown"),
            SessionError::InvalidCredentials
        );
    }

    #[test]
    fn switch_role_swaps_to_directory_account_for_role() {
        let sessions = SessionManager::in_memory();
        let session = sessions.login("admin@example.com", "pw").expect("login");

        let switched = sessions.switch_role(&session.token, Role::Checker).expect("switch");

        assert_eq!(switched.token, session.token);
        assert_eq!(switched.actor.email, "checker@example.com");
        let resolved = sessions.resolve(&session.token).expect("store ok").expect("session");
        assert_eq!(resolved.role, Role::Checker);
    }

    #[test]
    fn logout_ends_the_session() {
        let sessions = SessionManager::in_memory();
        let session = sessions.login("worker@example.com", "pw").expect("login");

        sessions.logout(&session.token).expect("logout");

        assert_eq!(sessions.resolve(&session.token).expect("store ok"), None);
        assert_eq!(
            sessions.switch_role(&session.token, Role::Admin).expect_err("gone"),
            SessionError::UnknownSession
        );
    }

    #[test]
    fn archived_account_no_longer_resolves() {
        let store = Arc::new(InMemoryKeyValueStore::default());
        let sessions = SessionManager::new(store.clone(), AccountDirectory::demo());
        let session = sessions.login("checker@example.com", "pw").expect("login");

        let mut accounts = AccountDirectory::demo().accounts().to_vec();
        accounts[2].is_archived = true;
        let after_archive = SessionManager::new(store, AccountDirectory::new(accounts));

        assert_eq!(after_archive.resolve(&session.token).expect("store ok"), None);
    }

    #[test]
    fn corrupt_entry_is_reported() {
        let store = Arc::new(InMemoryKeyValueStore::default());
        store.set("session:broken", "{not json".to_string()).expect("set");
        let sessions = SessionManager::new(store, AccountDirectory::demo());

        assert!(matches!(sessions.resolve("broken"), Err(SessionError::Corrupt { .. })));
    }

    #[test]
    fn file_store_survives_a_new_manager() {
        let dir = TempDir::new().expect("tempdir");
        let path = dir.path().join("state").join("sessions.json");

        let first = SessionManager::new(
            Arc::new(JsonFileKeyValueStore::new(&path)),
            AccountDirectory::demo(),
        );
        let session = first.login("admin@example.com", "pw").expect("login");

        let second = SessionManager::new(
            Arc::new(JsonFileKeyValueStore::new(&path)),
            AccountDirectory::demo(),
        );
        let actor = second.resolve(&session.token).expect("store ok").expect("persisted");
        assert_eq!(actor.role, Role::Admin);

        second.logout(&session.token).expect("logout");
        assert_eq!(first.resolve(&session.token).expect("store ok"), None);
    }
}
