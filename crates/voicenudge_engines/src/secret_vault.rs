#![forbid(unsafe_code)]

use std::collections::BTreeMap;
use std::env;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use aes_gcm::aead::{Aead, Payload};
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::engine::general_purpose::STANDARD_NO_PAD as B64;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use voicenudge_kernel_contracts::provider_secrets::ProviderSecretId;

const VAULT_SCHEMA_VERSION: u8 = 1;
const MASTER_KEY_LEN: usize = 32;
const NONCE_LEN: usize = 12;

#[derive(Debug)]
pub enum VaultError {
    EmptyValue,
    Io(std::io::Error),
    Json(serde_json::Error),
    Corrupt(&'static str),
}

impl std::fmt::Display for VaultError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyValue => write!(f, "secret value must not be empty"),
            Self::Io(err) => write!(f, "vault io error: {err}"),
            Self::Json(err) => write!(f, "vault file unreadable: {err}"),
            Self::Corrupt(what) => write!(f, "vault entry corrupt: {what}"),
        }
    }
}

impl std::error::Error for VaultError {}

impl From<std::io::Error> for VaultError {
    fn from(value: std::io::Error) -> Self {
        Self::Io(value)
    }
}

impl From<serde_json::Error> for VaultError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedSecret {
    nonce: String,
    sealed: String,
    rotated_at_unix: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct VaultFile {
    schema_version: u8,
    secrets: BTreeMap<String, SealedSecret>,
}

impl Default for VaultFile {
    fn default() -> Self {
        Self {
            schema_version: VAULT_SCHEMA_VERSION,
            secrets: BTreeMap::new(),
        }
    }
}

/// Encrypted-at-rest store for the four provider secrets. Key ids are typed
/// (`ProviderSecretId`), so an arbitrary string can never reach the vault;
/// each entry is sealed with AES-256-GCM under a local master key, with the
/// key id bound in as associated data.
#[derive(Debug, Clone)]
pub struct SecretVault {
    vault_path: PathBuf,
    key_path: PathBuf,
}

impl SecretVault {
    pub fn default_local() -> Self {
        let vault_path = env::var("VOICENUDGE_VAULT_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| config_dir().join("secret_vault.json"));
        let key_path = vault_path.with_extension("master.key");
        Self::for_paths(vault_path, key_path)
    }

    pub fn for_paths(vault_path: PathBuf, key_path: PathBuf) -> Self {
        Self {
            vault_path,
            key_path,
        }
    }

    pub fn set_secret(&self, id: ProviderSecretId, value: &str) -> Result<(), VaultError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(VaultError::EmptyValue);
        }
        let cipher = self.cipher()?;
        let mut file = self.load_file()?;
        file.secrets
            .insert(id.as_str().to_string(), seal(&cipher, id, trimmed)?);
        self.write_file(&file)
    }

    pub fn resolve_secret(&self, id: ProviderSecretId) -> Result<Option<String>, VaultError> {
        let file = self.load_file()?;
        let Some(entry) = file.secrets.get(id.as_str()) else {
            return Ok(None);
        };
        let cipher = self.cipher()?;
        unseal(&cipher, id, entry).map(Some)
    }

    pub fn contains_secret(&self, id: ProviderSecretId) -> Result<bool, VaultError> {
        Ok(self.load_file()?.secrets.contains_key(id.as_str()))
    }

    pub fn delete_secret(&self, id: ProviderSecretId) -> Result<bool, VaultError> {
        let mut file = self.load_file()?;
        if file.secrets.remove(id.as_str()).is_none() {
            return Ok(false);
        }
        self.write_file(&file)?;
        Ok(true)
    }

    /// The subset of the allowed key set currently present, in declaration
    /// order.
    pub fn stored_ids(&self) -> Result<Vec<ProviderSecretId>, VaultError> {
        let file = self.load_file()?;
        Ok(ProviderSecretId::all()
            .iter()
            .copied()
            .filter(|id| file.secrets.contains_key(id.as_str()))
            .collect())
    }

    fn cipher(&self) -> Result<Aes256Gcm, VaultError> {
        let key = self.load_or_create_master_key()?;
        Aes256Gcm::new_from_slice(&key).map_err(|_| VaultError::Corrupt("master key"))
    }

    fn load_file(&self) -> Result<VaultFile, VaultError> {
        let raw = match fs::read(&self.vault_path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(VaultFile::default()),
            Err(err) => return Err(err.into()),
        };
        let file: VaultFile = serde_json::from_slice(&raw)?;
        if file.schema_version != VAULT_SCHEMA_VERSION {
            return Err(VaultError::Corrupt("schema_version"));
        }
        Ok(file)
    }

    fn write_file(&self, file: &VaultFile) -> Result<(), VaultError> {
        if let Some(parent) = self.vault_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.vault_path.with_extension("tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(file)?)?;
        fs::rename(&tmp, &self.vault_path)?;
        Ok(())
    }

    /// The master key is 32 raw bytes in a 0600 file next to the vault.
    fn load_or_create_master_key(&self) -> Result<[u8; MASTER_KEY_LEN], VaultError> {
        match fs::read(&self.key_path) {
            Ok(raw) => raw
                .try_into()
                .map_err(|_| VaultError::Corrupt("master key length")),
            Err(err) if err.kind() == ErrorKind::NotFound => {
                if let Some(parent) = self.key_path.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut key = [0u8; MASTER_KEY_LEN];
                OsRng.fill_bytes(&mut key);
                write_key_file(&self.key_path, &key)?;
                Ok(key)
            }
            Err(err) => Err(err.into()),
        }
    }
}

/// One-shot lookup against the default local vault.
pub fn resolve_secret(id: ProviderSecretId) -> Result<Option<String>, VaultError> {
    SecretVault::default_local().resolve_secret(id)
}

// The key id rides along as authenticated data, so an entry pasted under a
// different key id fails to unseal.
fn seal(
    cipher: &Aes256Gcm,
    id: ProviderSecretId,
    value: &str,
) -> Result<SealedSecret, VaultError> {
    let mut nonce = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce);
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: value.as_bytes(),
                aad: id.as_str().as_bytes(),
            },
        )
        .map_err(|_| VaultError::Corrupt("seal"))?;
    Ok(SealedSecret {
        nonce: B64.encode(nonce),
        sealed: B64.encode(sealed),
        rotated_at_unix: now_unix(),
    })
}

fn unseal(
    cipher: &Aes256Gcm,
    id: ProviderSecretId,
    entry: &SealedSecret,
) -> Result<String, VaultError> {
    let nonce = B64
        .decode(&entry.nonce)
        .map_err(|_| VaultError::Corrupt("nonce"))?;
    if nonce.len() != NONCE_LEN {
        return Err(VaultError::Corrupt("nonce"));
    }
    let sealed = B64
        .decode(&entry.sealed)
        .map_err(|_| VaultError::Corrupt("ciphertext"))?;
    let plain = cipher
        .decrypt(
            Nonce::from_slice(&nonce),
            Payload {
                msg: sealed.as_ref(),
                aad: id.as_str().as_bytes(),
            },
        )
        .map_err(|_| VaultError::Corrupt("seal"))?;
    String::from_utf8(plain).map_err(|_| VaultError::Corrupt("utf8"))
}

fn write_key_file(path: &Path, key: &[u8]) -> Result<(), VaultError> {
    let mut file = OpenOptions::new().create_new(true).write(true).open(path)?;
    file.write_all(key)?;
    file.flush()?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))?;
    }
    Ok(())
}

fn config_dir() -> PathBuf {
    if let Ok(xdg) = env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("voicenudge");
    }
    match env::var("HOME") {
        Ok(home) => PathBuf::from(home).join(".config").join("voicenudge"),
        Err(_) => PathBuf::from(".voicenudge"),
    }
}

fn now_unix() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}
