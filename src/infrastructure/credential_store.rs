use crate::domain::models::StoredAccessToken;
use crate::infrastructure::error::InfraError;
use std::sync::Mutex;
use tracing::warn;

pub trait CredentialStore: Send + Sync {
    fn save_token(&self, token: &StoredAccessToken) -> Result<(), InfraError>;
    fn load_token(&self) -> Result<Option<StoredAccessToken>, InfraError>;
    fn delete_token(&self) -> Result<(), InfraError>;
}

pub const KEYRING_SERVICE: &str = "activity-scheduler.google-calendar";

/// Per-user access token in the OS keychain. The entry is resolved once, so
/// every call addresses the same credential.
#[derive(Debug)]
pub struct KeyringCredentialStore {
    user_id: String,
    entry: keyring::Entry,
}

impl KeyringCredentialStore {
    pub fn for_user(user_id: &str) -> Result<Self, InfraError> {
        let user_id = user_id.trim();
        if user_id.is_empty() {
            return Err(InfraError::InvalidInput(
                "credential user id must not be empty".to_string(),
            ));
        }
        let entry = keyring::Entry::new(KEYRING_SERVICE, user_id).map_err(credential_error)?;
        Ok(Self {
            user_id: user_id.to_string(),
            entry,
        })
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}

impl CredentialStore for KeyringCredentialStore {
    fn save_token(&self, token: &StoredAccessToken) -> Result<(), InfraError> {
        if token.access_token.trim().is_empty() {
            return Err(InfraError::InvalidInput(
                "access token must not be empty".to_string(),
            ));
        }
        let payload = serde_json::to_string(token)?;
        self.entry.set_password(&payload).map_err(credential_error)
    }

    /// An unreadable payload is discarded and reported as absent, so the
    /// next sign-in can overwrite it.
    fn load_token(&self) -> Result<Option<StoredAccessToken>, InfraError> {
        let payload = match self.entry.get_password() {
            Ok(value) => value,
            Err(keyring::Error::NoEntry) => return Ok(None),
            Err(error) => return Err(credential_error(error)),
        };

        match serde_json::from_str::<StoredAccessToken>(&payload) {
            Ok(token) => Ok(Some(token)),
            Err(error) => {
                warn!(user_id = %self.user_id, error = %error, "discarding unreadable stored token");
                self.delete_token()?;
                Ok(None)
            }
        }
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        match self.entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(credential_error(error)),
        }
    }
}

fn credential_error(error: keyring::Error) -> InfraError {
    InfraError::Credential(error.to_string())
}

#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    token: Mutex<Option<StoredAccessToken>>,
}

impl InMemoryCredentialStore {
    pub fn with_token(token: StoredAccessToken) -> Self {
        Self {
            token: Mutex::new(Some(token)),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Option<StoredAccessToken>>, InfraError> {
        self.token
            .lock()
            .map_err(|error| InfraError::Credential(format!("in-memory lock poisoned: {error}")))
    }
}

impl CredentialStore for InMemoryCredentialStore {
    fn save_token(&self, token: &StoredAccessToken) -> Result<(), InfraError> {
        *self.lock()? = Some(token.clone());
        Ok(())
    }

    fn load_token(&self) -> Result<Option<StoredAccessToken>, InfraError> {
        Ok(self.lock()?.clone())
    }

    fn delete_token(&self) -> Result<(), InfraError> {
        *self.lock()? = None;
        Ok(())
    }
}
