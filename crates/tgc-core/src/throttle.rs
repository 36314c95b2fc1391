use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

use crate::{
    domain::{Credentials, PhotoRef},
    ports::{DirectoryTransport, RemoteEntity, RemoteUser, SignIn, UserHandle},
    Result,
};

#[derive(Debug)]
struct IntervalLimiter {
    interval: Duration,
    next: Instant,
}

impl IntervalLimiter {
    fn new(interval: Duration) -> Self {
        Self {
            interval,
            next: Instant::now(),
        }
    }

    /// Reserve the next slot and return the wait duration required before executing.
    fn reserve(&mut self) -> Duration {
        let now = Instant::now();
        let start = if now >= self.next { now } else { self.next };
        self.next = start + self.interval;
        start.saturating_duration_since(now)
    }
}

/// DirectoryTransport decorator that spaces out remote calls.
///
/// The directory answers bursts with FLOOD_WAIT; spacing lookups keeps a long
/// batch under the limit most of the time. It never retries: a `RateLimited`
/// error still reaches the caller.
pub struct ThrottledTransport<T> {
    inner: T,
    limiter: Mutex<IntervalLimiter>,
}

impl<T: DirectoryTransport> ThrottledTransport<T> {
    pub fn new(inner: T, min_interval: Duration) -> Self {
        Self {
            inner,
            limiter: Mutex::new(IntervalLimiter::new(min_interval)),
        }
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn throttle(&self) {
        let wait = { self.limiter.lock().await.reserve() };
        if wait > Duration::from_millis(0) {
            sleep(wait).await;
        }
    }
}

#[async_trait]
impl<T: DirectoryTransport> DirectoryTransport for ThrottledTransport<T> {
    type CodeToken = T::CodeToken;
    type PasswordChallenge = T::PasswordChallenge;

    // Handshake and teardown calls are not throttled.
    async fn connect(&self, credentials: &Credentials) -> Result<()> {
        self.inner.connect(credentials).await
    }

    async fn is_authorized(&self) -> Result<bool> {
        self.inner.is_authorized().await
    }

    async fn send_code(&self, phone: &str) -> Result<Self::CodeToken> {
        self.inner.send_code(phone).await
    }

    async fn sign_in(
        &self,
        token: &Self::CodeToken,
        phone: &str,
        code: &str,
    ) -> Result<SignIn<Self::PasswordChallenge>> {
        self.inner.sign_in(token, phone, code).await
    }

    async fn check_password(
        &self,
        challenge: &Self::PasswordChallenge,
        password: &str,
    ) -> Result<()> {
        self.inner.check_password(challenge, password).await
    }

    async fn disconnect(&self) -> Result<()> {
        self.inner.disconnect().await
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<RemoteEntity>> {
        self.throttle().await;
        self.inner.resolve_username(username).await
    }

    async fn lookup_phone(&self, phone: &str) -> Result<Option<RemoteUser>> {
        self.throttle().await;
        self.inner.lookup_phone(phone).await
    }

    async fn import_contact(&self, phone: &str) -> Result<Option<RemoteUser>> {
        self.throttle().await;
        self.inner.import_contact(phone).await
    }

    async fn delete_contact(&self, user: UserHandle) -> Result<()> {
        self.throttle().await;
        self.inner.delete_contact(user).await
    }

    async fn get_user(&self, user: UserHandle) -> Result<RemoteUser> {
        self.throttle().await;
        self.inner.get_user(user).await
    }

    async fn get_bio(&self, user: UserHandle) -> Result<Option<String>> {
        self.throttle().await;
        self.inner.get_bio(user).await
    }

    async fn profile_photos(&self, user: UserHandle) -> Result<Vec<PhotoRef>> {
        self.throttle().await;
        self.inner.profile_photos(user).await
    }

    async fn download_photo(&self, photo: &PhotoRef) -> Result<Vec<u8>> {
        self.throttle().await;
        self.inner.download_photo(photo).await
    }
}
