// Secret storage for the generator API key.
//
// Keys live in the OS keychain, never in config files. An environment
// variable takes precedence so CI and containers work without a keychain.

use anyhow::{bail, Context, Result};

const KEYRING_SERVICE: &str = "dev.gitdoc.daemon";

/// Environment variable consulted before the keychain.
pub const API_KEY_ENV: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretSlot {
    ApiKey,
}

impl SecretSlot {
    fn account(self) -> &'static str {
        match self {
            Self::ApiKey => "api_key",
        }
    }
}

pub fn set_secret(slot: SecretSlot, value: &str) -> Result<()> {
    set_secret_with_store(&KeyringSecretStore, slot, value)
}

pub fn get_secret(slot: SecretSlot) -> Result<Option<String>> {
    get_secret_with_store(&KeyringSecretStore, slot)
}

pub fn delete_secret(slot: SecretSlot) -> Result<()> {
    delete_secret_with_store(&KeyringSecretStore, slot)
}

/// API key from `ANTHROPIC_API_KEY`, falling back to the keychain.
pub fn resolve_api_key() -> Result<Option<String>> {
    resolve_api_key_with(std::env::var(API_KEY_ENV).ok(), &KeyringSecretStore)
}

fn resolve_api_key_with(env_value: Option<String>, store: &dyn SecretStore) -> Result<Option<String>> {
    if let Some(value) = env_value.filter(|value| !value.trim().is_empty()) {
        return Ok(Some(value));
    }
    get_secret_with_store(store, SecretSlot::ApiKey)
}

trait SecretStore: Send + Sync {
    fn set_secret(&self, service: &str, account: &str, value: &str) -> Result<()>;
    fn get_secret(&self, service: &str, account: &str) -> Result<Option<String>>;
    fn delete_secret(&self, service: &str, account: &str) -> Result<()>;
}

struct KeyringSecretStore;

impl SecretStore for KeyringSecretStore {
    fn set_secret(&self, service: &str, account: &str, value: &str) -> Result<()> {
        let entry = keyring::Entry::new(service, account)
            .context("failed to initialize keychain entry")?;
        entry.set_password(value).context("failed to write keychain entry")?;
        Ok(())
    }

    fn get_secret(&self, service: &str, account: &str) -> Result<Option<String>> {
        let entry = keyring::Entry::new(service, account)
            .context("failed to initialize keychain entry")?;
        match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error).context("failed to read keychain entry"),
        }
    }

    fn delete_secret(&self, service: &str, account: &str) -> Result<()> {
        let entry = keyring::Entry::new(service, account)
            .context("failed to initialize keychain entry")?;
        match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(error).context("failed to delete keychain entry"),
        }
    }
}

fn set_secret_with_store(store: &dyn SecretStore, slot: SecretSlot, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        bail!("secret value must not be empty");
    }
    store
        .set_secret(KEYRING_SERVICE, slot.account(), value)
        .with_context(|| format!("failed to persist `{}` in keychain", slot.account()))
}

fn get_secret_with_store(store: &dyn SecretStore, slot: SecretSlot) -> Result<Option<String>> {
    store
        .get_secret(KEYRING_SERVICE, slot.account())
        .with_context(|| format!("failed to read `{}` from keychain", slot.account()))
}

fn delete_secret_with_store(store: &dyn SecretStore, slot: SecretSlot) -> Result<()> {
    store
        .delete_secret(KEYRING_SERVICE, slot.account())
        .with_context(|| format!("failed to clear `{}` from keychain", slot.account()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemorySecretStore {
        values: Mutex<HashMap<(String, String), String>>,
    }

    impl SecretStore for MemorySecretStore {
        fn set_secret(&self, service: &str, account: &str, value: &str) -> Result<()> {
            self.values
                .lock()
                .expect("memory secret store lock should not be poisoned")
                .insert((service.to_string(), account.to_string()), value.to_string());
            Ok(())
        }

        fn get_secret(&self, service: &str, account: &str) -> Result<Option<String>> {
            Ok(self
                .values
                .lock()
                .expect("memory secret store lock should not be poisoned")
                .get(&(service.to_string(), account.to_string()))
                .cloned())
        }

        fn delete_secret(&self, service: &str, account: &str) -> Result<()> {
            self.values
                .lock()
                .expect("memory secret store lock should not be poisoned")
                .remove(&(service.to_string(), account.to_string()));
            Ok(())
        }
    }

    #[test]
    fn secret_store_round_trip_by_slot() {
        let store = MemorySecretStore::default();
        set_secret_with_store(&store, SecretSlot::ApiKey, "sk-test").expect("write should succeed");
        assert_eq!(
            get_secret_with_store(&store, SecretSlot::ApiKey).expect("read should succeed"),
            Some("sk-test".to_string())
        );
        delete_secret_with_store(&store, SecretSlot::ApiKey).expect("delete should succeed");
        assert_eq!(
            get_secret_with_store(&store, SecretSlot::ApiKey).expect("read should succeed"),
            None
        );
    }

    #[test]
    fn empty_secret_is_rejected() {
        let store = MemorySecretStore::default();
        let error = set_secret_with_store(&store, SecretSlot::ApiKey, "  ").expect_err("should fail");
        assert!(error.to_string().contains("must not be empty"));
    }

    #[test]
    fn environment_value_wins_over_keychain() {
        let store = MemorySecretStore::default();
        set_secret_with_store(&store, SecretSlot::ApiKey, "from-keychain").unwrap();

        let key = resolve_api_key_with(Some("from-env".into()), &store).unwrap();
        assert_eq!(key.as_deref(), Some("from-env"));

        let key = resolve_api_key_with(Some("   ".into()), &store).unwrap();
        assert_eq!(key.as_deref(), Some("from-keychain"));

        let key = resolve_api_key_with(None, &MemorySecretStore::default()).unwrap();
        assert_eq!(key, None);
    }
}
