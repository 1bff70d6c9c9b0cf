use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use clinic_config::IdentityConfig;

use crate::error::AuthError;
use crate::session::CachedSession;

const KEYRING_USER: &str = "session";
const SESSION_FILE_NAME: &str = "session.json";

/// Persistence for the cached sign-in session.
///
/// The keyring backend falls back to a 0600 file when the OS keychain is
/// unavailable. The memory backend exists for tests and ephemeral hosts.
pub struct SessionStore {
    backend: Backend,
}

enum Backend {
    Keyring { service: String, fallback: PathBuf },
    File(PathBuf),
    Memory(Mutex<Option<CachedSession>>),
}

impl SessionStore {
    #[must_use]
    pub fn keyring(service: impl Into<String>, fallback: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Keyring {
                service: service.into(),
                fallback: fallback.into(),
            },
        }
    }

    #[must_use]
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::File(path.into()),
        }
    }

    #[must_use]
    pub const fn memory() -> Self {
        Self {
            backend: Backend::Memory(Mutex::new(None)),
        }
    }

    /// Keyring store named by the config, with the configured (or default) fallback file.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if no fallback path can be resolved.
    pub fn from_config(config: &IdentityConfig) -> Result<Self, AuthError> {
        let fallback = if config.has_session_file() {
            PathBuf::from(&config.session_file)
        } else {
            default_session_path()?
        };
        Ok(Self::keyring(config.keyring_service.clone(), fallback))
    }

    /// Load the cached session, if any. Unreadable or corrupt entries count as absent.
    #[must_use]
    pub fn load(&self) -> Option<CachedSession> {
        match &self.backend {
            Backend::Keyring { service, fallback } => match keyring::Entry::new(service, KEYRING_USER) {
                Ok(entry) => keyring_load(&entry, fallback),
                Err(_) => load_file(fallback),
            },
            Backend::File(path) => load_file(path),
            Backend::Memory(slot) => slot.lock().unwrap_or_else(PoisonError::into_inner).clone(),
        }
    }

    /// Persist a session, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if every backend fails.
    pub fn store(&self, session: &CachedSession) -> Result<(), AuthError> {
        let raw = serde_json::to_string(session)
            .map_err(|e| AuthError::SessionStore(format!("serialize session: {e}")))?;
        match &self.backend {
            Backend::Keyring { service, fallback } => {
                match keyring::Entry::new(service, KEYRING_USER) {
                    Ok(entry) => keyring_store(&entry, fallback, &raw),
                    Err(error) => {
                        tracing::warn!(%error, "keyring unavailable; falling back to file");
                        store_file(fallback, &raw)
                    }
                }
            }
            Backend::File(path) => store_file(path, &raw),
            Backend::Memory(slot) => {
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = Some(session.clone());
                Ok(())
            }
        }
    }

    /// Remove the cached session from every backend.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::SessionStore` if the keyring entry or the session
    /// file cannot be removed.
    pub fn delete(&self) -> Result<(), AuthError> {
        match &self.backend {
            Backend::Keyring { service, fallback } => match keyring::Entry::new(service, KEYRING_USER) {
                Ok(entry) => keyring_delete(&entry, fallback),
                Err(_) => delete_file(fallback),
            },
            Backend::File(path) => delete_file(path),
            Backend::Memory(slot) => {
                *slot.lock().unwrap_or_else(PoisonError::into_inner) = None;
                Ok(())
            }
        }
    }
}

/// The keyring entry wins over the fallback file.
fn keyring_load(entry: &keyring::Entry, fallback: &Path) -> Option<CachedSession> {
    if let Ok(raw) = entry.get_password()
        && let Some(session) = parse_session(&raw)
    {
        return Some(session);
    }
    load_file(fallback)
}

/// Write to the keyring, or to the file with any older keyring entry removed
/// so it cannot shadow the new session.
fn keyring_store(entry: &keyring::Entry, fallback: &Path, raw: &str) -> Result<(), AuthError> {
    match entry.set_password(raw) {
        Ok(()) => {
            if let Err(error) = delete_file(fallback) {
                tracing::warn!(%error, "stale session file left behind");
            }
            Ok(())
        }
        Err(error) => {
            tracing::warn!(%error, "keyring store failed; falling back to file");
            store_file(fallback, raw)?;
            clear_keyring(entry)
        }
    }
}

/// Remove both copies. The file is removed even when the keyring fails.
fn keyring_delete(entry: &keyring::Entry, fallback: &Path) -> Result<(), AuthError> {
    let keyring = clear_keyring(entry);
    delete_file(fallback)?;
    keyring
}

fn clear_keyring(entry: &keyring::Entry) -> Result<(), AuthError> {
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(AuthError::SessionStore(format!(
            "failed to remove keyring entry: {e}"
        ))),
    }
}

fn default_session_path() -> Result<PathBuf, AuthError> {
    dirs::home_dir()
        .map(|h| h.join(".clinic").join(SESSION_FILE_NAME))
        .ok_or_else(|| {
            AuthError::SessionStore("home directory not found: cannot cache session".into())
        })
}

fn parse_session(raw: &str) -> Option<CachedSession> {
    if raw.trim().is_empty() {
        return None;
    }
    match serde_json::from_str(raw) {
        Ok(session) => Some(session),
        Err(error) => {
            tracing::warn!(%error, "ignoring corrupt cached session");
            None
        }
    }
}

fn load_file(path: &Path) -> Option<CachedSession> {
    fs::read_to_string(path)
        .ok()
        .and_then(|raw| parse_session(&raw))
}

fn store_file(path: &Path, raw: &str) -> Result<(), AuthError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)
            .map_err(|e| AuthError::SessionStore(format!("mkdir {}: {e}", parent.display())))?;
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Err(e) = fs::set_permissions(parent, fs::Permissions::from_mode(0o700)) {
                tracing::warn!("failed to chmod 0700 {}: {e}", parent.display());
            }
        }
    }
    fs::write(path, raw)
        .map_err(|e| AuthError::SessionStore(format!("write {}: {e}", path.display())))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .map_err(|e| AuthError::SessionStore(format!("chmod {}: {e}", path.display())))?;
    }

    Ok(())
}

fn delete_file(path: &Path) -> Result<(), AuthError> {
    if path.exists() {
        fs::remove_file(path).map_err(|e| {
            AuthError::SessionStore(format!("failed to delete {}: {e}", path.display()))
        })?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use clinic_core::AuthUser;

    use super::*;

    fn sample_session() -> CachedSession {
        CachedSession {
            access_token: "access.jwt.token".into(),
            refresh_token: Some("refresh-1".into()),
            user: AuthUser {
                id: "user_abc".into(),
                email: Some("frontdesk@clinic.test".into()),
            },
            expires_at: None,
        }
    }

    #[test]
    fn default_session_path_is_under_home() {
        let path = default_session_path().expect("should resolve");
        assert!(path.ends_with(".clinic/session.json"));
    }

    #[test]
    fn file_store_load_delete_cycle() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let path = tmp.path().join("nested").join("session.json");
        let store = SessionStore::file(&path);

        assert!(store.load().is_none());
        store.store(&sample_session()).expect("store");
        assert_eq!(store.load(), Some(sample_session()));

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).expect("metadata").permissions().mode() & 0o777;
            assert_eq!(mode, 0o600, "session file should be 0600");
        }

        store.delete().expect("delete");
        assert!(!path.exists());
        assert!(store.load().is_none());
        // Deleting twice is fine.
        store.delete().expect("second delete");
    }

    #[test]
    fn corrupt_or_blank_file_counts_as_absent() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let path = tmp.path().join("session.json");
        let store = SessionStore::file(&path);

        fs::write(&path, "   \n  ").expect("write");
        assert!(store.load().is_none());

        fs::write(&path, "{not json").expect("write");
        assert!(store.load().is_none());
    }

    fn mock_entry() -> keyring::Entry {
        let credential = keyring::mock::default_credential_builder()
            .build(None, "clinic-test", KEYRING_USER)
            .expect("mock credential");
        keyring::Entry::new_with_credential(credential)
    }

    fn fail_next(entry: &keyring::Entry) {
        entry
            .get_credential()
            .downcast_ref::<keyring::mock::MockCredential>()
            .expect("mock credential")
            .set_error(keyring::Error::PlatformFailure("keychain locked".into()));
    }

    fn raw(session: &CachedSession) -> String {
        serde_json::to_string(session).unwrap()
    }

    #[test]
    fn keyring_session_wins_over_file() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let fallback = tmp.path().join("session.json");
        let entry = mock_entry();
        let mut older = sample_session();
        older.user.id = "user_file".into();
        store_file(&fallback, &raw(&older)).unwrap();

        keyring_store(&entry, &fallback, &raw(&sample_session())).unwrap();
        assert_eq!(keyring_load(&entry, &fallback), Some(sample_session()));
        assert!(!fallback.exists(), "stale file should be removed");
    }

    #[test]
    fn keyring_failure_falls_back_and_clears_old_entry() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let fallback = tmp.path().join("session.json");
        let entry = mock_entry();

        let mut older = sample_session();
        older.user.id = "user_previous".into();
        entry.set_password(&raw(&older)).unwrap();

        fail_next(&entry);
        keyring_store(&entry, &fallback, &raw(&sample_session())).unwrap();

        assert!(fallback.exists());
        assert_eq!(keyring_load(&entry, &fallback), Some(sample_session()));
    }

    #[test]
    fn keyring_delete_error_propagates_after_file_removal() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        let fallback = tmp.path().join("session.json");
        let entry = mock_entry();
        entry.set_password(&raw(&sample_session())).unwrap();
        store_file(&fallback, &raw(&sample_session())).unwrap();

        fail_next(&entry);
        let err = keyring_delete(&entry, &fallback).unwrap_err();
        assert!(matches!(err, AuthError::SessionStore(_)), "got {err:?}");
        assert!(!fallback.exists());

        keyring_delete(&entry, &fallback).unwrap();
        assert!(keyring_load(&entry, &fallback).is_none());
    }

    #[test]
    fn keyring_delete_without_entry_is_ok() {
        let tmp = tempfile::TempDir::new().expect("tmp dir");
        keyring_delete(&mock_entry(), &tmp.path().join("session.json")).unwrap();
    }

    #[test]
    fn memory_store_roundtrip() {
        let store = SessionStore::memory();
        assert!(store.load().is_none());
        store.store(&sample_session()).unwrap();
        assert_eq!(store.load().unwrap().user.id, "user_abc");
        store.delete().unwrap();
        assert!(store.load().is_none());
    }

    #[test]
    fn from_config_uses_configured_fallback_file() {
        let config = IdentityConfig {
            session_file: "/tmp/clinic-test/session.json".into(),
            ..IdentityConfig::default()
        };
        let store = SessionStore::from_config(&config).unwrap();
        match store.backend {
            Backend::Keyring { service, fallback } => {
                assert_eq!(service, "clinic-sync");
                assert_eq!(fallback, PathBuf::from("/tmp/clinic-test/session.json"));
            }
            _ => panic!("expected keyring backend"),
        }
    }
}
