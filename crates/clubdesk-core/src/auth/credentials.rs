//! Remembered HEMIS passwords in the OS keychain.
//!
//! Entries are keyed by student ID and scoped by API host, so the same
//! student ID against a staging and a production server keeps two
//! independent passwords.

use anyhow::{Context, Result};
use keyring::Entry;
use tracing::debug;

const SERVICE_PREFIX: &str = "clubdesk";

/// Keychain access for one API server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialStore {
    service: String,
}

impl CredentialStore {
    /// Store scoped to the host (and port) of `api_url`.
    /// An unparseable URL falls back to the unscoped service name.
    pub fn for_api(api_url: &str) -> Self {
        let host = reqwest::Url::parse(api_url).ok().and_then(|url| {
            url.host_str().map(|host| match url.port() {
                Some(port) => format!("{}:{}", host, port),
                None => host.to_string(),
            })
        });
        let service = match host {
            Some(host) => format!("{}@{}", SERVICE_PREFIX, host),
            None => SERVICE_PREFIX.to_string(),
        };
        Self { service }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    fn entry(&self, student_id: &str) -> Result<Entry> {
        Entry::new(&self.service, student_id).context("Failed to create keyring entry")
    }

    pub fn remember(&self, student_id: &str, password: &str) -> Result<()> {
        self.entry(student_id)?
            .set_password(password)
            .context("Failed to store password in keychain")?;
        debug!(service = %self.service, "Password remembered");
        Ok(())
    }

    /// The remembered password, or `None` when there is none.
    /// Keychain failures other than a missing entry are errors.
    pub fn recall(&self, student_id: &str) -> Result<Option<String>> {
        match self.entry(student_id)?.get_password() {
            Ok(password) => Ok(Some(password)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(e).context("Failed to read password from keychain"),
        }
    }

    /// Delete the remembered password. Returns whether one existed.
    pub fn forget(&self, student_id: &str) -> Result<bool> {
        match self.entry(student_id)?.delete_credential() {
            Ok(()) => Ok(true),
            Err(keyring::Error::NoEntry) => Ok(false),
            Err(e) => Err(e).context("Failed to delete credential from keychain"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn use_mock_keychain() {
        keyring::set_default_credential_builder(keyring::mock::default_credential_builder());
    }

    #[test]
    fn test_service_is_scoped_by_host() {
        assert_eq!(CredentialStore::for_api("http://localhost:5000/api").service(), "clubdesk@localhost:5000");
        assert_eq!(CredentialStore::for_api("https://clubs.example.uz/api").service(), "clubdesk@clubs.example.uz");
        assert_eq!(CredentialStore::for_api("not a url").service(), "clubdesk");
    }

    #[test]
    fn test_missing_entry_is_not_an_error() {
        use_mock_keychain();
        let store = CredentialStore::for_api("http://localhost:5000/api");

        assert_eq!(store.recall("393211100123").expect("recall"), None);
        assert!(!store.forget("393211100123").expect("forget"));
    }
}
