//! Credential vault
//!
//! Account credentials are encrypted at rest with a process-wide `age`
//! X25519 identity. The identity string (`AGE-SECRET-KEY-1...`) comes from
//! `XCAST_ENCRYPTION_KEY`; ciphertext is the base64 of an `age` file
//! addressed to the identity's own recipient.

use std::io::{Read, Write};
use std::iter;
use std::str::FromStr;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use secrecy::{ExposeSecret, SecretString};
use zeroize::Zeroizing;

use crate::error::{ConfigError, Result, VaultError};
use crate::types::{Account, AccountUpdate, NewAccount};

pub const KEY_ENV: &str = "XCAST_ENCRYPTION_KEY";
const LEGACY_KEY_ENV: &str = "ENCRYPTION_KEY";

pub struct CredentialVault {
    identity: age::x25519::Identity,
    recipient: age::x25519::Recipient,
}

impl std::fmt::Debug for CredentialVault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialVault")
            .field("recipient", &self.recipient.to_string())
            .finish_non_exhaustive()
    }
}

/// Ciphertext for the four credential fields of an account
#[derive(Debug, Clone)]
pub struct SealedCredentials {
    pub api_key: String,
    pub api_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// A partial account update with changed credentials already encrypted
#[derive(Debug, Clone, Default)]
pub struct SealedUpdate {
    pub name: Option<String>,
    pub api_key: Option<String>,
    pub api_secret: Option<String>,
    pub access_token: Option<String>,
    pub access_token_secret: Option<String>,
}

/// Decrypted credentials; zeroed when dropped
pub struct AccountCredentials {
    pub api_key: SecretString,
    pub api_secret: SecretString,
    pub access_token: SecretString,
    pub access_token_secret: SecretString,
}

impl std::fmt::Debug for AccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AccountCredentials { .. }")
    }
}

impl CredentialVault {
    /// Build a vault from an `age` identity string
    pub fn new(key: &str) -> Result<Self> {
        let identity = age::x25519::Identity::from_str(key.trim()).map_err(|e| {
            ConfigError::InvalidValue {
                field: KEY_ENV.to_string(),
                reason: e.to_string(),
            }
        })?;
        let recipient = identity.to_public();

        Ok(Self {
            identity,
            recipient,
        })
    }

    /// Build a vault from `XCAST_ENCRYPTION_KEY` (or `ENCRYPTION_KEY`)
    pub fn from_env() -> Result<Self> {
        let key = std::env::var(KEY_ENV)
            .or_else(|_| std::env::var(LEGACY_KEY_ENV))
            .map_err(|_| ConfigError::MissingField(KEY_ENV.to_string()))?;
        let key = Zeroizing::new(key);
        Self::new(&key)
    }

    /// Generate a fresh key suitable for `XCAST_ENCRYPTION_KEY`
    pub fn generate_key() -> String {
        use age::secrecy::ExposeSecret as _;

        age::x25519::Identity::generate()
            .to_string()
            .expose_secret()
            .clone()
    }

    /// Encrypt a value; the empty string passes through unchanged
    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        if plaintext.is_empty() {
            return Ok(String::new());
        }

        let recipients: Vec<Box<dyn age::Recipient + Send>> = vec![Box::new(self.recipient.clone())];
        let encryptor = age::Encryptor::with_recipients(recipients)
            .ok_or_else(|| VaultError::Encryption("no recipients".to_string()))?;

        let mut encrypted = vec![];
        let mut writer = encryptor
            .wrap_output(&mut encrypted)
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        writer
            .write_all(plaintext.as_bytes())
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        writer
            .finish()
            .map_err(|e| VaultError::Encryption(e.to_string()))?;

        Ok(STANDARD.encode(encrypted))
    }

    /// Decrypt a value produced by [`encrypt`](Self::encrypt)
    pub fn decrypt(&self, ciphertext: &str) -> Result<String> {
        if ciphertext.is_empty() {
            return Ok(String::new());
        }

        let data = STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| VaultError::Decryption(format!("invalid base64: {}", e)))?;

        let decryptor = match age::Decryptor::new(&data[..]) {
            Ok(age::Decryptor::Recipients(d)) => d,
            Ok(_) => {
                return Err(VaultError::Decryption(
                    "unexpected passphrase-encrypted value".to_string(),
                )
                .into())
            }
            Err(e) => return Err(VaultError::Decryption(e.to_string()).into()),
        };

        let mut reader = decryptor
            .decrypt(iter::once(&self.identity as &dyn age::Identity))
            .map_err(|e| VaultError::Decryption(e.to_string()))?;

        let mut decrypted = Zeroizing::new(vec![]);
        reader
            .read_to_end(&mut decrypted)
            .map_err(|e| VaultError::Decryption(e.to_string()))?;

        let text = std::str::from_utf8(&decrypted)
            .map_err(|e| VaultError::Decryption(format!("invalid UTF-8: {}", e)))?;
        Ok(text.to_string())
    }

    /// Encrypt the credential fields of a registration
    pub fn seal(&self, account: &NewAccount) -> Result<SealedCredentials> {
        Ok(SealedCredentials {
            api_key: self.encrypt(&account.api_key)?,
            api_secret: self.encrypt(&account.api_secret)?,
            access_token: self.encrypt(&account.access_token)?,
            access_token_secret: self.encrypt(&account.access_token_secret)?,
        })
    }

    /// Encrypt the fields an update actually changes
    pub fn seal_update(&self, update: &AccountUpdate) -> Result<SealedUpdate> {
        let seal = |value: &Option<String>| -> Result<Option<String>> {
            AccountUpdate::changed(value)
                .map(|v| self.encrypt(v))
                .transpose()
        };

        Ok(SealedUpdate {
            name: AccountUpdate::changed(&update.name).map(|n| n.trim().to_string()),
            api_key: seal(&update.api_key)?,
            api_secret: seal(&update.api_secret)?,
            access_token: seal(&update.access_token)?,
            access_token_secret: seal(&update.access_token_secret)?,
        })
    }

    /// Decrypt the credential fields of a stored account
    pub fn open(&self, account: &Account) -> Result<AccountCredentials> {
        Ok(AccountCredentials {
            api_key: self.decrypt(&account.api_key)?.into(),
            api_secret: self.decrypt(&account.api_secret)?.into(),
            access_token: self.decrypt(&account.access_token)?.into(),
            access_token_secret: self.decrypt(&account.access_token_secret)?.into(),
        })
    }
}

impl AccountCredentials {
    pub fn api_key(&self) -> &str {
        self.api_key.expose_secret()
    }

    pub fn api_secret(&self) -> &str {
        self.api_secret.expose_secret()
    }

    pub fn access_token(&self) -> &str {
        self.access_token.expose_secret()
    }

    pub fn access_token_secret(&self) -> &str {
        self.access_token_secret.expose_secret()
    }
}
