use std::path::{Path, PathBuf};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::models::Student;

/// File holding the raw bearer token
const TOKEN_FILE: &str = "token";

/// File holding the serialized student identity
const STUDENT_FILE: &str = "student.json";

/// Token and identity of the logged-in student.
/// Kept together so one is never present without the other.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionData {
    pub token: String,
    pub student: Student,
}

/// Process-wide session state, optionally persisted to a directory.
///
/// Share it through `Arc`; all methods take `&self`.
pub struct SessionStore {
    dir: Option<PathBuf>,
    data: RwLock<Option<SessionData>>,
}

impl SessionStore {
    /// Session persisted under `dir`. Call [`SessionStore::load`] to rehydrate.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir: Some(dir),
            data: RwLock::new(None),
        }
    }

    /// Session that lives only as long as the process.
    pub fn in_memory() -> Self {
        Self {
            dir: None,
            data: RwLock::new(None),
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Option<SessionData>> {
        self.data.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Option<SessionData>> {
        self.data.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Load the persisted session.
    ///
    /// Returns `true` when a complete token/identity pair was found. A
    /// half-present pair is treated as logged out and removed.
    pub fn load(&self) -> Result<bool> {
        let Some(ref dir) = self.dir else {
            return Ok(false);
        };

        let token_path = dir.join(TOKEN_FILE);
        let student_path = dir.join(STUDENT_FILE);

        if !token_path.exists() && !student_path.exists() {
            return Ok(false);
        }

        match Self::read_pair(&token_path, &student_path) {
            Ok(data) => {
                debug!(student = %data.student.display_name(), "Restored session");
                *self.write() = Some(data);
                Ok(true)
            }
            Err(e) => {
                warn!(error = %e, "Discarding incomplete session");
                Self::remove_files(dir)?;
                Ok(false)
            }
        }
    }

    fn read_pair(token_path: &Path, student_path: &Path) -> Result<SessionData> {
        let token = std::fs::read_to_string(token_path)
            .context("Failed to read session token")?
            .trim()
            .to_string();
        if token.is_empty() {
            anyhow::bail!("Session token is empty");
        }

        let contents = std::fs::read_to_string(student_path)
            .context("Failed to read session identity")?;
        let student: Student = serde_json::from_str(&contents)
            .context("Failed to parse session identity")?;

        Ok(SessionData { token, student })
    }

    /// Enter the logged-in state and persist it.
    pub fn login(&self, data: SessionData) -> Result<()> {
        info!(student = %data.student.display_name(), "Logged in");
        self.persist(&data)?;
        *self.write() = Some(data);
        Ok(())
    }

    /// Replace the identity after a profile refresh or update.
    /// Ignored when nobody is logged in.
    pub fn update_student(&self, student: Student) -> Result<()> {
        let updated = {
            let mut guard = self.write();
            match guard.as_mut() {
                Some(data) => {
                    data.student = student;
                    Some(data.clone())
                }
                None => None,
            }
        };

        match updated {
            Some(data) => self.persist(&data),
            None => Ok(()),
        }
    }

    /// Leave the logged-in state and remove the persisted pair.
    pub fn logout(&self) -> Result<()> {
        if self.write().take().is_some() {
            info!("Logged out");
        }
        match self.dir {
            Some(ref dir) => Self::remove_files(dir),
            None => Ok(()),
        }
    }

    pub fn token(&self) -> Option<String> {
        self.read().as_ref().map(|d| d.token.clone())
    }

    pub fn student(&self) -> Option<Student> {
        self.read().as_ref().map(|d| d.student.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.read().is_some()
    }

    fn persist(&self, data: &SessionData) -> Result<()> {
        let Some(ref dir) = self.dir else {
            return Ok(());
        };
        std::fs::create_dir_all(dir).context("Failed to create session directory")?;
        let contents = serde_json::to_string_pretty(&data.student)?;
        std::fs::write(dir.join(STUDENT_FILE), contents).context("Failed to write session identity")?;
        std::fs::write(dir.join(TOKEN_FILE), &data.token).context("Failed to write session token")?;
        Ok(())
    }

    fn remove_files(dir: &Path) -> Result<()> {
        for name in [TOKEN_FILE, STUDENT_FILE] {
            let path = dir.join(name);
            if path.exists() {
                std::fs::remove_file(&path)
                    .with_context(|| format!("Failed to remove {}", path.display()))?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn student(name: &str) -> Student {
        Student {
            full_name: Some(name.to_string()),
            student_id_number: Some("368211100123".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_login_persists_and_reloads() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());
        store
            .login(SessionData { token: "tok-1".into(), student: student("Aliyev Vali") })
            .expect("login");

        let reloaded = SessionStore::new(dir.path().to_path_buf());
        assert!(reloaded.load().expect("load"));
        assert_eq!(reloaded.token().as_deref(), Some("tok-1"));
        assert_eq!(reloaded.student().map(|s| s.display_name().to_string()).as_deref(), Some("Aliyev Vali"));
    }

    #[test]
    fn test_logout_clears_memory_and_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().to_path_buf());
        store
            .login(SessionData { token: "tok".into(), student: student("A") })
            .expect("login");
        store.logout().expect("logout");

        assert!(!store.is_authenticated());
        assert!(store.token().is_none() && store.student().is_none());
        assert!(!dir.path().join(TOKEN_FILE).exists());
        assert!(!dir.path().join(STUDENT_FILE).exists());
    }

    #[test]
    fn test_half_present_pair_is_discarded() {
        let dir = tempfile::tempdir().expect("tempdir");
        std::fs::write(dir.path().join(TOKEN_FILE), "orphan").expect("write");

        let store = SessionStore::new(dir.path().to_path_buf());
        assert!(!store.load().expect("load"));
        assert!(!store.is_authenticated());
        assert!(!dir.path().join(TOKEN_FILE).exists());
    }

    #[test]
    fn test_update_student_requires_session() {
        let store = SessionStore::in_memory();
        store.update_student(student("Nobody")).expect("noop");
        assert!(store.student().is_none());

        store
            .login(SessionData { token: "t".into(), student: student("Old") })
            .expect("login");
        store.update_student(student("New")).expect("update");
        assert_eq!(store.student().and_then(|s| s.full_name).as_deref(), Some("New"));
        assert_eq!(store.token().as_deref(), Some("t"));
    }

    #[test]
    fn test_missing_files_mean_logged_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SessionStore::new(dir.path().join("never-created"));
        assert!(!store.load().expect("load"));
    }
}
