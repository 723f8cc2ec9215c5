//! Credential storage in the OS secret store (Windows Credential Manager,
//! macOS Keychain, Linux Secret Service) via `keyring`.
//!
//! Two named entries live under one fixed service identifier. Missing or
//! unreadable entries are treated as "no saved credentials", never as an
//! error the caller has to handle.

use keyring::Entry;

const SERVICE_NAME: &str = "hitsz-connect-verge";
const USERNAME_KEY: &str = "username";
const PASSWORD_KEY: &str = "password";

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SavedCredentials {
    pub username: String,
    pub password: String,
}

impl SavedCredentials {
    pub fn is_empty(&self) -> bool {
        self.username.is_empty() && self.password.is_empty()
    }
}

/// Handle on the two secret-store entries, opened once and reused so every
/// read and write goes through the same credentials.
pub struct CredentialStore {
    username: Option<Entry>,
    password: Option<Entry>,
}

impl CredentialStore {
    pub fn open() -> Self {
        Self {
            username: open_entry(USERNAME_KEY),
            password: open_entry(PASSWORD_KEY),
        }
    }

    /// Empty fields mean nothing is stored.
    pub fn load(&self) -> SavedCredentials {
        let credentials = SavedCredentials {
            username: read_entry(&self.username, USERNAME_KEY),
            password: read_entry(&self.password, PASSWORD_KEY),
        };
        if credentials.is_empty() {
            log::info!("[credentials] no saved credentials");
        } else {
            log::info!(
                "[credentials] loaded saved credentials for '{}'",
                credentials.username
            );
        }
        credentials
    }

    /// Stores both entries, replacing any prior values.
    pub fn save(&self, username: &str, password: &str) {
        write_entry(&self.username, USERNAME_KEY, username);
        write_entry(&self.password, PASSWORD_KEY, password);
        log::info!("[credentials] saved credentials for '{username}'");
    }

    /// Removes both entries. Used when "remember password" is unchecked.
    pub fn clear(&self) {
        delete_entry(&self.username, USERNAME_KEY);
        delete_entry(&self.password, PASSWORD_KEY);
        log::info!("[credentials] cleared saved credentials");
    }
}

fn open_entry(key: &str) -> Option<Entry> {
    match Entry::new(SERVICE_NAME, key) {
        Ok(entry) => Some(entry),
        Err(error) => {
            log::warn!("[credentials] secret store unavailable for '{key}': {error}");
            None
        }
    }
}

fn read_entry(entry: &Option<Entry>, key: &str) -> String {
    let Some(entry) = entry else {
        return String::new();
    };
    match entry.get_password() {
        Ok(value) => value,
        Err(keyring::Error::NoEntry) => {
            log::debug!("[credentials] no stored entry for '{key}'");
            String::new()
        }
        Err(error) => {
            log::warn!("[credentials] failed to read '{key}': {error}");
            String::new()
        }
    }
}

fn write_entry(entry: &Option<Entry>, key: &str, value: &str) {
    let Some(entry) = entry else {
        return;
    };
    if let Err(error) = entry.set_password(value) {
        log::warn!("[credentials] failed to store '{key}': {error}");
    }
}

fn delete_entry(entry: &Option<Entry>, key: &str) {
    let Some(entry) = entry else {
        return;
    };
    match entry.delete_credential() {
        Ok(()) | Err(keyring::Error::NoEntry) => {}
        Err(error) => {
            log::warn!("[credentials] failed to delete '{key}': {error}");
        }
    }
}
