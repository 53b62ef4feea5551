pub mod file_storage;

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::model::SessionUser;
use crate::{AvatarError, Result};

pub use file_storage::FileStorage;

/// Key under which the chat client keeps the logged in user.
pub const SESSION_USER_KEY: &str = "chat-app-user";

/// String key-value storage holding the client session.
pub trait SessionStorage {
    fn get(&self, key: &str) -> Result<Option<String>>;

    fn set(&mut self, key: &str, value: String) -> Result<()>;
}

/// Volatile storage. Clones share the same entries.
#[derive(Clone, Default, Debug)]
pub struct MemoryStorage {
    entries: Arc<RwLock<BTreeMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self.entries.read().map_err(|_| {
            AvatarError::Storage("memory".to_owned(), "lock poisoned".to_owned())
        })?;
        Ok(entries.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: String) -> Result<()> {
        let mut entries = self.entries.write().map_err(|_| {
            AvatarError::Storage("memory".to_owned(), "lock poisoned".to_owned())
        })?;
        entries.insert(key.to_owned(), value);
        Ok(())
    }
}

/// Somebody is logged in, whatever shape their record has.
pub fn has_session_user<S: SessionStorage + ?Sized>(storage: &S) -> Result<bool> {
    Ok(storage.get(SESSION_USER_KEY)?.is_some())
}

/// `Ok(None)` when nobody is logged in.
pub fn load_session_user<S: SessionStorage + ?Sized>(
    storage: &S,
) -> Result<Option<SessionUser>> {
    match storage.get(SESSION_USER_KEY)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn store_session_user<S: SessionStorage + ?Sized>(
    storage: &mut S,
    user: &SessionUser,
) -> Result<()> {
    let raw = serde_json::to_string(user)?;
    storage.set(SESSION_USER_KEY, raw)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_entries() {
        let mut storage = MemoryStorage::new();
        let observer = storage.clone();

        assert_eq!(observer.get("k").unwrap(), None);
        storage.set("k", "v".to_owned()).unwrap();
        assert_eq!(observer.get("k").unwrap().as_deref(), Some("v"));
    }

    #[test]
    fn session_user_round_trip() {
        let mut storage = MemoryStorage::new();
        assert_eq!(load_session_user(&storage).unwrap(), None);

        let mut user = SessionUser::new("64f0c0ffee");
        user.set_avatar("PHN2Zy8+".to_owned());
        store_session_user(&mut storage, &user).unwrap();

        assert_eq!(load_session_user(&storage).unwrap(), Some(user));
    }

    #[test]
    fn presence_does_not_need_a_valid_record() {
        let mut storage = MemoryStorage::new();
        assert!(!has_session_user(&storage).unwrap());

        storage
            .set(SESSION_USER_KEY, "{not json".to_owned())
            .unwrap();
        assert!(has_session_user(&storage).unwrap());
    }

    #[test]
    fn corrupted_session_user() {
        let mut storage = MemoryStorage::new();
        storage
            .set(SESSION_USER_KEY, "{not json".to_owned())
            .unwrap();

        assert!(matches!(
            load_session_user(&storage),
            Err(AvatarError::Parse)
        ));
    }
}
