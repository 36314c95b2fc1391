use std::{
    env, fs,
    path::{Path, PathBuf},
    time::Duration,
};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{domain::Credentials, errors::Error, Result};

/// Typed runtime configuration, read from the environment (and `.env`).
///
/// API credentials are not required here: a missing `api_id`/`api_hash` is
/// reported as `Error::NotConfigured` when a connection is attempted.
#[derive(Clone, Debug)]
pub struct Config {
    // Stored credentials
    pub config_file: PathBuf,
    pub session_file: PathBuf,

    // Env overrides for the stored values
    pub api_id: Option<i32>,
    pub api_hash: Option<String>,
    pub phone: Option<String>,

    // Output
    pub results_dir: PathBuf,
    pub photos_dir: PathBuf,
    pub download_photos: bool,
    pub log_file: Option<PathBuf>,

    // Remote pacing
    pub request_interval: Duration,
}

impl Config {
    pub fn load() -> Result<Self> {
        load_dotenv_if_present(Path::new(".env"));

        let api_id = match env_str("TGC_API_ID").and_then(non_empty) {
            Some(s) => Some(s.trim().parse::<i32>().map_err(|_| {
                Error::Config(format!("TGC_API_ID must be an integer, got {s:?}"))
            })?),
            None => None,
        };

        Ok(Self {
            config_file: env_path("TGC_CONFIG_FILE").unwrap_or_else(|| "config.json".into()),
            session_file: env_path("TGC_SESSION_FILE")
                .unwrap_or_else(|| "telegram_checker.session".into()),
            api_id,
            api_hash: env_str("TGC_API_HASH").and_then(non_empty),
            phone: env_str("TGC_PHONE").and_then(non_empty),
            results_dir: env_path("TGC_RESULTS_DIR").unwrap_or_else(|| "results".into()),
            photos_dir: env_path("TGC_PHOTOS_DIR").unwrap_or_else(|| "profile_photos".into()),
            download_photos: env_bool("TGC_DOWNLOAD_PHOTOS").unwrap_or(true),
            log_file: env_path("TGC_LOG_FILE"),
            request_interval: Duration::from_millis(
                env_u64("TGC_REQUEST_INTERVAL_MS").unwrap_or(250),
            ),
        })
    }

    pub fn credential_store(&self) -> CredentialStore {
        CredentialStore::new(self.config_file.clone())
    }

    /// Stored credentials with env overrides applied on top.
    pub fn stored_credentials(&self) -> Result<StoredCredentials> {
        let mut stored = self.credential_store().load()?;
        if let Some(id) = self.api_id {
            stored.api_id = Some(id);
        }
        if let Some(hash) = &self.api_hash {
            stored.api_hash = Some(hash.clone());
        }
        if let Some(phone) = &self.phone {
            stored.phone = Some(phone.clone());
        }
        Ok(stored)
    }
}

/// On-disk shape of the credential store (`config.json`).
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCredentials {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_id: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_hash: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl StoredCredentials {
    pub fn is_configured(&self) -> bool {
        self.api_id.is_some_and(|id| id != 0)
            && self.api_hash.as_deref().is_some_and(|h| !h.trim().is_empty())
    }

    /// `Error::NotConfigured` unless both api_id and api_hash are present.
    pub fn credentials(&self) -> Result<Credentials> {
        if !self.is_configured() {
            return Err(Error::NotConfigured(
                "api_id and api_hash are not set; get them at https://my.telegram.org/apps"
                    .to_string(),
            ));
        }
        Ok(Credentials {
            api_id: self.api_id.unwrap_or_default(),
            api_hash: self.api_hash.clone().unwrap_or_default(),
            phone: self.phone.clone().unwrap_or_default(),
        })
    }
}

/// JSON file holding the API credentials between runs.
#[derive(Clone, Debug)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Missing or unreadable files yield empty credentials.
    pub fn load(&self) -> Result<StoredCredentials> {
        if !self.path.exists() {
            return Ok(StoredCredentials::default());
        }
        let txt = fs::read_to_string(&self.path)?;
        if txt.trim().is_empty() {
            return Ok(StoredCredentials::default());
        }
        match serde_json::from_str(&txt) {
            Ok(c) => Ok(c),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "ignoring unreadable credential file");
                Ok(StoredCredentials::default())
            }
        }
    }

    pub fn save(&self, creds: &StoredCredentials) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let txt = serde_json::to_string_pretty(creds)?;
        fs::write(&self.path, txt)?;
        Ok(())
    }

    /// Delete the file. Returns whether there was anything to delete.
    pub fn clear(&self) -> Result<bool> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

fn env_str(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn load_dotenv_if_present(path: &Path) {
    let Ok(contents) = fs::read_to_string(path) else {
        return;
    };

    for (key, val) in parse_dotenv(&contents) {
        if env::var_os(&key).is_some() {
            continue; // do not override existing env
        }
        env::set_var(key, val);
    }
}

fn parse_dotenv(contents: &str) -> Vec<(String, String)> {
    let mut out = Vec::new();
    for raw in contents.lines() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((k, v)) = line.split_once('=') else {
            continue;
        };

        let key = k.trim();
        if key.is_empty() {
            continue;
        }

        let mut val = v.trim().to_string();
        // Strip optional surrounding quotes.
        if val.len() >= 2
            && ((val.starts_with('"') && val.ends_with('"'))
                || (val.starts_with('\'') && val.ends_with('\'')))
        {
            val = val[1..val.len() - 1].to_string();
        }

        out.push((key.to_string(), val));
    }
    out
}

fn env_bool(key: &str) -> Option<bool> {
    env_str(key).map(|s| parse_bool(&s))
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

fn env_u64(key: &str) -> Option<u64> {
    env_str(key).and_then(|s| s.trim().parse::<u64>().ok())
}

fn env_path(key: &str) -> Option<PathBuf> {
    env::var_os(key)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

fn non_empty(s: String) -> Option<String> {
    if s.trim().is_empty() {
        None
    } else {
        Some(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dotenv_parsing_skips_comments_and_strips_quotes() {
        let parsed = parse_dotenv(
            "# creds\nTGC_API_ID=123\n\nTGC_API_HASH=\"abc def\"\nbroken line\n=novalue\nTGC_PHONE='+1555'\n",
        );
        assert_eq!(
            parsed,
            vec![
                ("TGC_API_ID".to_string(), "123".to_string()),
                ("TGC_API_HASH".to_string(), "abc def".to_string()),
                ("TGC_PHONE".to_string(), "+1555".to_string()),
            ]
        );
    }

    #[test]
    fn bool_parsing() {
        assert!(parse_bool(" Yes "));
        assert!(parse_bool("1"));
        assert!(!parse_bool("off"));
    }

    #[test]
    fn missing_api_fields_are_not_configured() {
        let c = StoredCredentials {
            api_id: Some(1),
            api_hash: None,
            phone: Some("+15551234567".into()),
        };
        assert!(matches!(c.credentials(), Err(Error::NotConfigured(_))));

        let c = StoredCredentials {
            api_id: Some(1),
            api_hash: Some("abc".into()),
            phone: None,
        };
        let creds = c.credentials().unwrap();
        assert_eq!(creds.api_id, 1);
        assert_eq!(creds.phone, "");
    }

    #[test]
    fn store_round_trip_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = CredentialStore::new(dir.path().join("nested/config.json"));

        assert_eq!(store.load().unwrap(), StoredCredentials::default());
        assert!(!store.clear().unwrap());

        let creds = StoredCredentials {
            api_id: Some(42),
            api_hash: Some("hash".into()),
            phone: Some("+15551234567".into()),
        };
        store.save(&creds).unwrap();
        assert_eq!(store.load().unwrap(), creds);

        assert!(store.clear().unwrap());
        assert!(!store.path().exists());
    }

    #[test]
    fn corrupt_store_loads_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{not json").unwrap();
        let store = CredentialStore::new(path);
        assert_eq!(store.load().unwrap(), StoredCredentials::default());
    }
}
