//! Persistence for [`Credential`]s, one section per provider.

use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use secrecy::ExposeSecret;

use crate::credential::secret;
use crate::provider::FITBIT;
use crate::{Credential, HealthSyncError};

const CLIENT_ID: &str = "client_id";
const CLIENT_SECRET: &str = "client_secret";
const AUTHORIZATION_CODE: &str = "authorization_code";
const ACCESS_TOKEN: &str = "access_token";
const REFRESH_TOKEN: &str = "refresh_token";

/// Keys a section must carry to be usable. The fitness tracker refreshes
/// with HTTP Basic client credentials; the other providers only need a token.
pub fn required_keys(section: &str) -> &'static [&'static str] {
    if section == FITBIT {
        &[CLIENT_ID, CLIENT_SECRET, ACCESS_TOKEN]
    } else {
        &[ACCESS_TOKEN]
    }
}

pub trait CredentialStore: Send + Sync {
    /// Fails with [`HealthSyncError::ConfigNotFound`] when the resource, the
    /// section or one of its [`required_keys`] is missing.
    fn load(&self, section: &str) -> Result<Credential, HealthSyncError>;

    /// Overwrites the credential keys of `section`, leaving everything else
    /// in the resource untouched.
    fn save(&self, section: &str, credential: &Credential) -> Result<(), HealthSyncError>;
}

/// TOML file with one table per provider:
///
/// ```toml
/// [fitbit]
/// client_id = "..."
/// client_secret = "..."
/// access_token = "..."
/// refresh_token = "..."
/// ```
#[derive(Clone, Debug)]
pub struct FileCredentialStore {
    path: PathBuf,
}

impl FileCredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_table(&self) -> Result<Option<toml::Table>, HealthSyncError> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        toml::from_str::<toml::Table>(&contents)
            .map(Some)
            .map_err(|e| {
                HealthSyncError::ConfigNotFound(format!(
                    "{} is not valid TOML: {e}",
                    self.path.display()
                ))
            })
    }

    fn write_atomically(&self, contents: &str) -> Result<(), HealthSyncError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
        tmp.write_all(contents.as_bytes())?;
        tmp.as_file().sync_all()?;
        // Owner-only: the file holds OAuth tokens.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(tmp.path(), std::fs::Permissions::from_mode(0o600))?;
        }
        tmp.persist(&self.path).map_err(|e| HealthSyncError::Io(e.error))?;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn load(&self, section: &str) -> Result<Credential, HealthSyncError> {
        let table = self.read_table()?.ok_or_else(|| {
            HealthSyncError::ConfigNotFound(format!("{} not found", self.path.display()))
        })?;
        let entries = table
            .get(section)
            .and_then(|v| v.as_table())
            .ok_or_else(|| {
                HealthSyncError::ConfigNotFound(format!(
                    "section [{section}] missing from {}",
                    self.path.display()
                ))
            })?;
        let field = |key: &str| -> Result<String, HealthSyncError> {
            match entries.get(key) {
                None => Ok(String::new()),
                Some(toml::Value::String(s)) => Ok(s.clone()),
                Some(other) => Err(HealthSyncError::ConfigNotFound(format!(
                    "[{section}] {key} must be a string, got {}",
                    other.type_str()
                ))),
            }
        };
        for &key in required_keys(section) {
            if field(key)?.is_empty() {
                return Err(HealthSyncError::ConfigNotFound(format!(
                    "[{section}] {key} missing from {}",
                    self.path.display()
                )));
            }
        }
        Ok(Credential {
            client_id: field(CLIENT_ID)?,
            client_secret: secret(field(CLIENT_SECRET)?),
            authorization_code: secret(field(AUTHORIZATION_CODE)?),
            access_token: secret(field(ACCESS_TOKEN)?),
            refresh_token: secret(field(REFRESH_TOKEN)?),
        })
    }

    fn save(&self, section: &str, credential: &Credential) -> Result<(), HealthSyncError> {
        let mut table = self.read_table()?.unwrap_or_default();
        let entry = table
            .entry(section.to_string())
            .or_insert(toml::Value::Table(toml::Table::new()));
        let entries = entry.as_table_mut().ok_or_else(|| {
            HealthSyncError::ConfigNotFound(format!(
                "{section} in {} is not a table",
                self.path.display()
            ))
        })?;
        let values = [
            (CLIENT_ID, credential.client_id.as_str()),
            (CLIENT_SECRET, credential.client_secret.expose_secret()),
            (
                AUTHORIZATION_CODE,
                credential.authorization_code.expose_secret(),
            ),
            (ACCESS_TOKEN, credential.access_token.expose_secret()),
            (REFRESH_TOKEN, credential.refresh_token.expose_secret()),
        ];
        for (key, value) in values {
            entries.insert(key.to_string(), toml::Value::String(value.to_string()));
        }
        let contents = toml::to_string_pretty(&table)
            .map_err(|e| HealthSyncError::Config(format!("serializing credentials: {e}")))?;
        self.write_atomically(&contents)?;
        tracing::debug!(section, path = %self.path.display(), "credentials saved");
        Ok(())
    }
}

/// In-process store. Counts saves so callers can check persistence happened.
#[derive(Debug, Default)]
pub struct MemoryCredentialStore {
    sections: Mutex<HashMap<String, Credential>>,
    saves: AtomicUsize,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_section(self, section: &str, credential: Credential) -> Self {
        if let Ok(mut map) = self.sections.lock() {
            map.insert(section.to_string(), credential);
        }
        self
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn load(&self, section: &str) -> Result<Credential, HealthSyncError> {
        let map = self
            .sections
            .lock()
            .map_err(|_| HealthSyncError::Config("credential store lock poisoned".into()))?;
        map.get(section)
            .cloned()
            .ok_or_else(|| HealthSyncError::ConfigNotFound(format!("section [{section}] missing")))
    }

    fn save(&self, section: &str, credential: &Credential) -> Result<(), HealthSyncError> {
        let mut map = self
            .sections
            .lock()
            .map_err(|_| HealthSyncError::Config("credential store lock poisoned".into()))?;
        map.insert(section.to_string(), credential.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
