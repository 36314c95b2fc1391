use async_trait::async_trait;

use crate::{
    domain::{Credentials, PhotoRef, UserStatus},
    Result,
};

/// Minimal addressing info for a remote user (id + access hash).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct UserHandle {
    pub id: i64,
    pub access_hash: i64,
}

/// A user account as the directory reports it.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RemoteUser {
    pub id: i64,
    pub access_hash: Option<i64>,
    pub username: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub phone: Option<String>,
    pub premium: bool,
    pub verified: bool,
    pub fake: bool,
    pub bot: bool,
    /// Deactivated account; treated as unreachable.
    pub deleted: bool,
    pub status: UserStatus,
}

impl RemoteUser {
    pub fn handle(&self) -> UserHandle {
        UserHandle {
            id: self.id,
            access_hash: self.access_hash.unwrap_or(0),
        }
    }
}

/// What a username lookup landed on.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RemoteEntity {
    User(RemoteUser),
    /// Channel, group or anything else that is not a user account.
    Other { kind: String },
}

/// Result of redeeming a verification code.
#[derive(Debug)]
pub enum SignIn<P> {
    Authorized,
    PasswordRequired(P),
}

/// Hexagonal port for the remote directory (MTProto today).
///
/// Contract for lookups: `Ok(None)` means the directory answered and has no
/// reachable account; `Err` means the question could not be asked (transport,
/// rate limit, ...). Callers rely on the distinction to decide whether the
/// mutating contact-import fallback is justified.
#[async_trait]
pub trait DirectoryTransport: Send + Sync {
    /// Opaque handshake token returned when a code is sent.
    type CodeToken: Send + Sync;
    /// Opaque second-factor challenge returned when a password is demanded.
    type PasswordChallenge: Send + Sync;

    async fn connect(&self, credentials: &Credentials) -> Result<()>;
    async fn is_authorized(&self) -> Result<bool>;
    async fn send_code(&self, phone: &str) -> Result<Self::CodeToken>;
    async fn sign_in(
        &self,
        token: &Self::CodeToken,
        phone: &str,
        code: &str,
    ) -> Result<SignIn<Self::PasswordChallenge>>;
    async fn check_password(
        &self,
        challenge: &Self::PasswordChallenge,
        password: &str,
    ) -> Result<()>;
    async fn disconnect(&self) -> Result<()>;

    async fn resolve_username(&self, username: &str) -> Result<Option<RemoteEntity>>;
    async fn lookup_phone(&self, phone: &str) -> Result<Option<RemoteUser>>;
    async fn import_contact(&self, phone: &str) -> Result<Option<RemoteUser>>;
    async fn delete_contact(&self, user: UserHandle) -> Result<()>;
    async fn get_user(&self, user: UserHandle) -> Result<RemoteUser>;
    async fn get_bio(&self, user: UserHandle) -> Result<Option<String>>;
    async fn profile_photos(&self, user: UserHandle) -> Result<Vec<PhotoRef>>;
    async fn download_photo(&self, photo: &PhotoRef) -> Result<Vec<u8>>;
}

/// Per-item progress notification emitted by the batch driver.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BatchProgress {
    /// 1-based position in the submitted list.
    pub index: usize,
    pub total: usize,
    pub identifier: String,
}

/// Observer for batch progress. Must not block for long; the batch waits.
pub trait ProgressSink: Send + Sync {
    fn on_item(&self, progress: &BatchProgress);
}

impl<F> ProgressSink for F
where
    F: Fn(&BatchProgress) + Send + Sync,
{
    fn on_item(&self, progress: &BatchProgress) {
        self(progress)
    }
}

/// Progress sink that discards everything.
pub struct NoProgress;

impl ProgressSink for NoProgress {
    fn on_item(&self, _progress: &BatchProgress) {}
}

/// Storage collaborator for downloaded profile photos.
#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Persist one photo and return where it went.
    async fn store(&self, owner: &str, index: usize, bytes: &[u8]) -> Result<String>;
}
