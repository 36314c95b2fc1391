use std::{collections::HashMap, fmt};

use chrono::{DateTime, Utc};
use serde::{ser::SerializeMap, Serialize, Serializer};

use crate::errors::ErrorKind;

/// Telegram API application credentials plus the account phone.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: i32,
    pub api_hash: String,
    pub phone: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("api_id", &self.api_id)
            .field("api_hash", &"<redacted>")
            .field("phone", &self.phone)
            .finish()
    }
}

/// Normalized phone number (`+` followed by 10-15 digits).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Phone(String);

impl Phone {
    pub(crate) fn new_unchecked(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Phone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Normalized username, without the leading `@`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Username(String);

impl Username {
    pub(crate) fn new_unchecked(s: String) -> Self {
        Self(s)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Identifier {
    Phone(Phone),
    Username(Username),
}

/// Which validator/resolver pair a batch runs with.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IdentifierKind {
    Phone,
    Username,
}

impl fmt::Display for IdentifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IdentifierKind::Phone => f.write_str("phone"),
            IdentifierKind::Username => f.write_str("username"),
        }
    }
}

/// Opaque, stable reference to one profile photo. Only the transport that
/// produced it can turn it back into bytes.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct PhotoRef(pub String);

/// Last-seen status as exposed by the directory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UserStatus {
    Online,
    Offline(DateTime<Utc>),
    Recently,
    LastWeek,
    LastMonth,
    #[default]
    Unknown,
}

impl UserStatus {
    pub fn summary(&self) -> String {
        match self {
            UserStatus::Online => "Online".to_string(),
            UserStatus::Offline(at) => format!("Last seen {}", at.format("%Y-%m-%d %H:%M:%S")),
            UserStatus::Recently => "Recently".to_string(),
            UserStatus::LastWeek => "Within a week".to_string(),
            UserStatus::LastMonth => "Within a month".to_string(),
            UserStatus::Unknown => "Unknown".to_string(),
        }
    }
}

/// Normalized profile of a resolved account.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ProfileRecord {
    #[serde(rename = "id")]
    pub remote_id: i64,
    pub username: Option<String>,
    pub first_name: String,
    pub last_name: String,
    #[serde(rename = "phone")]
    pub phone_used: String,
    pub premium: bool,
    pub verified: bool,
    pub fake: bool,
    pub bot: bool,
    #[serde(rename = "last_seen")]
    pub last_seen_summary: String,
    pub bio: Option<String>,
    #[serde(rename = "profile_photos")]
    pub profile_photo_refs: Vec<PhotoRef>,
}

impl ProfileRecord {
    /// Directory name used when persisting this profile's media:
    /// username, else phone, else remote id.
    pub fn storage_owner(&self) -> String {
        if let Some(u) = self.username.as_deref().filter(|u| !u.is_empty()) {
            return u.to_string();
        }
        if !self.phone_used.is_empty() {
            return self.phone_used.clone();
        }
        self.remote_id.to_string()
    }
}

pub const NOT_FOUND_MESSAGE: &str = "Telegram account not found";

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ResolutionOutcome {
    Found(ProfileRecord),
    NotFound,
    Failed(ErrorKind, String),
}

impl ResolutionOutcome {
    pub fn is_found(&self) -> bool {
        matches!(self, ResolutionOutcome::Found(_))
    }

    pub fn profile(&self) -> Option<&ProfileRecord> {
        match self {
            ResolutionOutcome::Found(p) => Some(p),
            _ => None,
        }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutcomeRepr<'a> {
    Found(&'a ProfileRecord),
    Error {
        error: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        kind: Option<ErrorKind>,
    },
}

impl Serialize for ResolutionOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let repr = match self {
            ResolutionOutcome::Found(p) => OutcomeRepr::Found(p),
            ResolutionOutcome::NotFound => OutcomeRepr::Error {
                error: NOT_FOUND_MESSAGE,
                kind: None,
            },
            ResolutionOutcome::Failed(kind, msg) => OutcomeRepr::Error {
                error: msg,
                kind: Some(*kind),
            },
        };
        repr.serialize(serializer)
    }
}

/// Insertion-ordered mapping from requested identifier to its outcome.
///
/// Re-inserting an existing key replaces the outcome in place; the key keeps
/// its original position.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BatchResult {
    entries: Vec<(String, ResolutionOutcome)>,
    /// key -> position in `entries`
    index: HashMap<String, usize>,
}

impl BatchResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: String, outcome: ResolutionOutcome) {
        match self.index.get(&key) {
            Some(&pos) => self.entries[pos].1 = outcome,
            None => {
                self.index.insert(key.clone(), self.entries.len());
                self.entries.push((key, outcome));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ResolutionOutcome> {
        self.index.get(key).map(|&pos| &self.entries[pos].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResolutionOutcome)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ResolutionOutcome)> {
        self.entries.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn found_count(&self) -> usize {
        self.entries.iter().filter(|(_, o)| o.is_found()).count()
    }
}

impl Serialize for BatchResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (k, v) in &self.entries {
            map.serialize_entry(k, v)?;
        }
        map.end()
    }
}
