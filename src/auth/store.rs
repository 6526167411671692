//! Credential storage backends.
//!
//! The store holds at most one bearer token and at most one setup key under
//! fixed slot identifiers. It is injected into [`SessionManager`] so tests
//! can substitute an in-memory store.
//!
//! [`SessionManager`]: super::SessionManager

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use keyring::Entry;
use serde::{Deserialize, Serialize};

/// Keyring service name for [`KeyringStore`]
const SERVICE_NAME: &str = "goli-client";

/// Credential file name for [`FileStore`]
const CREDENTIALS_FILE: &str = "credentials.json";

/// The two credential slots a Goli client can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Slot {
    /// Session token for normal authenticated operation
    BearerToken,
    /// Provisioning-only key, valid before any user account exists
    SetupKey,
}

impl Slot {
    /// Stable identifier used for persistence.
    pub fn key(&self) -> &'static str {
        match self {
            Slot::BearerToken => "bearer_token",
            Slot::SetupKey => "setup_key",
        }
    }
}

/// Storage for the client's credentials.
///
/// `take` is the atomic check-and-clear primitive: when several in-flight
/// requests hit an authorization failure at once, only the first `take`
/// observes the token, so the auto-logout notification fires once.
pub trait CredentialStore: Send + Sync {
    /// Current value of a slot, if any.
    fn get(&self, slot: Slot) -> Option<String>;

    /// Store a value, replacing any previous one.
    fn put(&self, slot: Slot, value: &str) -> Result<()>;

    /// Clear a slot, returning the previous value if one was present.
    fn take(&self, slot: Slot) -> Option<String>;
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryStore {
    slots: Mutex<HashMap<Slot, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.slots.lock().unwrap().get(&slot).cloned()
    }

    fn put(&self, slot: Slot, value: &str) -> Result<()> {
        self.slots.lock().unwrap().insert(slot, value.to_string());
        Ok(())
    }

    fn take(&self, slot: Slot) -> Option<String> {
        self.slots.lock().unwrap().remove(&slot)
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialsFile {
    #[serde(default)]
    bearer_token: Option<String>,
    #[serde(default)]
    setup_key: Option<String>,
}

impl CredentialsFile {
    fn slot_mut(&mut self, slot: Slot) -> &mut Option<String> {
        match slot {
            Slot::BearerToken => &mut self.bearer_token,
            Slot::SetupKey => &mut self.setup_key,
        }
    }
}

/// JSON-file store; credentials survive process restarts.
pub struct FileStore {
    path: PathBuf,
    cached: Mutex<CredentialsFile>,
}

impl FileStore {
    /// Open (or create) the store at an explicit path.
    pub fn open(path: PathBuf) -> Result<Self> {
        let cached = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read credentials at {}", path.display()))?;
            serde_json::from_str(&contents).context("Failed to parse credentials file")?
        } else {
            CredentialsFile::default()
        };
        Ok(Self {
            path,
            cached: Mutex::new(cached),
        })
    }

    /// Open the store at the default location under the user config dir.
    pub fn open_default() -> Result<Self> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Self::open(config_dir.join(SERVICE_NAME).join(CREDENTIALS_FILE))
    }

    fn persist(&self, cached: &CredentialsFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(cached)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl CredentialStore for FileStore {
    fn get(&self, slot: Slot) -> Option<String> {
        self.cached.lock().unwrap().slot_mut(slot).clone()
    }

    fn put(&self, slot: Slot, value: &str) -> Result<()> {
        let mut cached = self.cached.lock().unwrap();
        *cached.slot_mut(slot) = Some(value.to_string());
        self.persist(&cached)
    }

    fn take(&self, slot: Slot) -> Option<String> {
        let mut cached = self.cached.lock().unwrap();
        let previous = cached.slot_mut(slot).take();
        if previous.is_some() {
            if let Err(err) = self.persist(&cached) {
                tracing::warn!(error = %err, "Failed to persist credential removal");
            }
        }
        previous
    }
}

/// OS keychain store via the `keyring` crate.
///
/// The keychain itself offers no compound operations, so the read/delete
/// pair inside `take` is serialized with a store-level lock to keep the
/// check-and-clear atomic.
pub struct KeyringStore {
    lock: Mutex<()>,
}

impl KeyringStore {
    pub fn new() -> Self {
        Self {
            lock: Mutex::new(()),
        }
    }

    fn entry(slot: Slot) -> Result<Entry> {
        Entry::new(SERVICE_NAME, slot.key()).context("Failed to create keyring entry")
    }
}

impl Default for KeyringStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialStore for KeyringStore {
    fn get(&self, slot: Slot) -> Option<String> {
        let _guard = self.lock.lock().unwrap();
        Self::entry(slot).ok()?.get_password().ok()
    }

    fn put(&self, slot: Slot, value: &str) -> Result<()> {
        let _guard = self.lock.lock().unwrap();
        Self::entry(slot)?
            .set_password(value)
            .context("Failed to store credential in keychain")?;
        Ok(())
    }

    fn take(&self, slot: Slot) -> Option<String> {
        let _guard = self.lock.lock().unwrap();
        let entry = Self::entry(slot).ok()?;
        let previous = entry.get_password().ok()?;
        if let Err(err) = entry.delete_credential() {
            tracing::warn!(error = %err, "Failed to delete credential from keychain");
        }
        Some(previous)
    }
}
