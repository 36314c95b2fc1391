//! Scripted in-memory transport shared by the unit tests.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
    time::Duration,
};

use async_trait::async_trait;

use crate::{
    domain::{Credentials, PhotoRef, UserStatus},
    errors::Error,
    ports::{DirectoryTransport, RemoteEntity, RemoteUser, SignIn, UserHandle},
    session::Authenticator,
    Result,
};

pub const VALID_CODE: &str = "12345";

pub fn credentials() -> Credentials {
    Credentials {
        api_id: 12345,
        api_hash: "0123456789abcdef".to_string(),
        phone: "+15550000000".to_string(),
    }
}

pub fn user(id: i64) -> RemoteUser {
    RemoteUser {
        id,
        access_hash: Some(id * 10),
        first_name: Some(format!("User{id}")),
        status: UserStatus::Recently,
        ..RemoteUser::default()
    }
}

/// Authenticator over a fresh fake that already holds a valid session.
pub async fn authorized() -> Authenticator<FakeTransport> {
    let mut auth = Authenticator::new(FakeTransport::default());
    auth.transport().set_authorized(true);
    auth.connect(&credentials()).await.unwrap();
    assert!(auth.check_authorized().await.unwrap());
    auth
}

#[derive(Default)]
struct FakeState {
    calls: HashMap<&'static str, usize>,
    authorized: bool,
    fail_next_connect: bool,
    rate_limit_next_send_code: Option<u64>,
    password: Option<String>,
    next_token: u32,
    latest_token: Option<u32>,
    last_sign_in_token: Option<u32>,

    usernames: HashMap<String, RemoteEntity>,
    direct_phones: HashMap<String, RemoteUser>,
    importable_phones: HashMap<String, RemoteUser>,
    lookup_phone_errors: HashSet<String>,
    users: HashMap<i64, RemoteUser>,
    bios: HashMap<i64, String>,
    photos: HashMap<i64, Vec<PhotoRef>>,
    fail_bio: bool,
    fail_photos: bool,
    fail_get_user: bool,
    fail_delete_contact: bool,
    failing_downloads: HashSet<String>,

    contacts: HashSet<i64>,
    imported: Vec<String>,
    deleted: Vec<i64>,
    order: Vec<String>,
}

/// Transport fake with call counters and scripted directory contents.
#[derive(Default)]
pub struct FakeTransport {
    state: Mutex<FakeState>,
}

impl FakeTransport {
    fn with<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        let mut st = self.state.lock().unwrap();
        f(&mut st)
    }

    fn record(&self, name: &'static str, detail: String) {
        self.with(|st| {
            *st.calls.entry(name).or_default() += 1;
            st.order.push(format!("{name}:{detail}"));
        });
    }

    pub fn calls(&self, name: &str) -> usize {
        self.with(|st| st.calls.get(name).copied().unwrap_or(0))
    }

    /// Every call as `name:detail`, in order.
    pub fn call_log(&self) -> Vec<String> {
        self.with(|st| st.order.clone())
    }

    pub fn set_authorized(&self, v: bool) {
        self.with(|st| st.authorized = v);
    }

    pub fn fail_next_connect(&self) {
        self.with(|st| st.fail_next_connect = true);
    }

    pub fn rate_limit_next_send_code(&self, secs: u64) {
        self.with(|st| st.rate_limit_next_send_code = Some(secs));
    }

    pub fn require_password(&self, password: &str) {
        self.with(|st| st.password = Some(password.to_string()));
    }

    pub fn last_sign_in_token(&self) -> Option<u32> {
        self.with(|st| st.last_sign_in_token)
    }

    pub fn add_username(&self, name: &str, entity: RemoteEntity) {
        self.with(|st| {
            if let RemoteEntity::User(u) = &entity {
                st.users.insert(u.id, u.clone());
            }
            st.usernames.insert(name.to_lowercase(), entity);
        });
    }

    pub fn add_direct_phone(&self, phone: &str, u: RemoteUser) {
        self.with(|st| {
            st.users.insert(u.id, u.clone());
            st.direct_phones.insert(phone.to_string(), u);
        });
    }

    pub fn add_importable_phone(&self, phone: &str, u: RemoteUser) {
        self.with(|st| {
            st.users.insert(u.id, u.clone());
            st.importable_phones.insert(phone.to_string(), u);
        });
    }

    pub fn fail_lookup_phone(&self, phone: &str) {
        self.with(|st| {
            st.lookup_phone_errors.insert(phone.to_string());
        });
    }

    pub fn set_bio(&self, id: i64, bio: &str) {
        self.with(|st| {
            st.bios.insert(id, bio.to_string());
        });
    }

    pub fn set_photos(&self, id: i64, refs: &[&str]) {
        self.with(|st| {
            st.photos
                .insert(id, refs.iter().map(|r| PhotoRef(r.to_string())).collect());
        });
    }

    pub fn fail_bio(&self) {
        self.with(|st| st.fail_bio = true);
    }

    pub fn fail_photos(&self) {
        self.with(|st| st.fail_photos = true);
    }

    pub fn fail_get_user(&self) {
        self.with(|st| st.fail_get_user = true);
    }

    pub fn fail_delete_contact(&self) {
        self.with(|st| st.fail_delete_contact = true);
    }

    pub fn fail_download(&self, photo: &str) {
        self.with(|st| {
            st.failing_downloads.insert(photo.to_string());
        });
    }

    /// Contacts currently present on the fake account.
    pub fn contacts(&self) -> HashSet<i64> {
        self.with(|st| st.contacts.clone())
    }

    pub fn imported(&self) -> Vec<String> {
        self.with(|st| st.imported.clone())
    }

    pub fn deleted(&self) -> Vec<i64> {
        self.with(|st| st.deleted.clone())
    }
}

#[async_trait]
impl DirectoryTransport for FakeTransport {
    type CodeToken = u32;
    type PasswordChallenge = ();

    async fn connect(&self, _credentials: &Credentials) -> Result<()> {
        self.record("connect", String::new());
        let fail = self.with(|st| std::mem::take(&mut st.fail_next_connect));
        if fail {
            return Err(Error::Connection("network unreachable".to_string()));
        }
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool> {
        self.record("is_authorized", String::new());
        Ok(self.with(|st| st.authorized))
    }

    async fn send_code(&self, phone: &str) -> Result<u32> {
        self.record("send_code", phone.to_string());
        self.with(|st| {
            if let Some(secs) = st.rate_limit_next_send_code.take() {
                return Err(Error::RateLimited {
                    retry_after: Some(Duration::from_secs(secs)),
                });
            }
            st.next_token += 1;
            st.latest_token = Some(st.next_token);
            Ok(st.next_token)
        })
    }

    async fn sign_in(&self, token: &u32, phone: &str, code: &str) -> Result<SignIn<()>> {
        self.record("sign_in", phone.to_string());
        self.with(|st| {
            st.last_sign_in_token = Some(*token);
            if st.latest_token != Some(*token) || code != VALID_CODE {
                return Err(Error::InvalidCode);
            }
            if st.password.is_some() {
                return Ok(SignIn::PasswordRequired(()));
            }
            st.authorized = true;
            Ok(SignIn::Authorized)
        })
    }

    async fn check_password(&self, _challenge: &(), password: &str) -> Result<()> {
        self.record("check_password", String::new());
        self.with(|st| {
            if st.password.as_deref() != Some(password) {
                return Err(Error::InvalidPassword);
            }
            st.authorized = true;
            Ok(())
        })
    }

    async fn disconnect(&self) -> Result<()> {
        self.record("disconnect", String::new());
        Ok(())
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<RemoteEntity>> {
        self.record("resolve_username", username.to_string());
        Ok(self.with(|st| st.usernames.get(&username.to_lowercase()).cloned()))
    }

    async fn lookup_phone(&self, phone: &str) -> Result<Option<RemoteUser>> {
        self.record("lookup_phone", phone.to_string());
        self.with(|st| {
            if st.lookup_phone_errors.contains(phone) {
                return Err(Error::Connection("connection reset".to_string()));
            }
            Ok(st.direct_phones.get(phone).cloned())
        })
    }

    async fn import_contact(&self, phone: &str) -> Result<Option<RemoteUser>> {
        self.record("import_contact", phone.to_string());
        Ok(self.with(|st| {
            st.imported.push(phone.to_string());
            let found = st.importable_phones.get(phone).cloned();
            if let Some(u) = &found {
                st.contacts.insert(u.id);
            }
            found
        }))
    }

    async fn delete_contact(&self, user: UserHandle) -> Result<()> {
        self.record("delete_contact", user.id.to_string());
        self.with(|st| {
            st.deleted.push(user.id);
            if st.fail_delete_contact {
                return Err(Error::Connection("delete failed".to_string()));
            }
            st.contacts.remove(&user.id);
            Ok(())
        })
    }

    async fn get_user(&self, user: UserHandle) -> Result<RemoteUser> {
        self.record("get_user", user.id.to_string());
        self.with(|st| {
            if st.fail_get_user {
                return Err(Error::Connection("timeout".to_string()));
            }
            st.users
                .get(&user.id)
                .cloned()
                .ok_or_else(|| Error::External(format!("unknown user {}", user.id)))
        })
    }

    async fn get_bio(&self, user: UserHandle) -> Result<Option<String>> {
        self.record("get_bio", user.id.to_string());
        self.with(|st| {
            if st.fail_bio {
                return Err(Error::External("USER_PRIVACY_RESTRICTED".to_string()));
            }
            Ok(st.bios.get(&user.id).cloned())
        })
    }

    async fn profile_photos(&self, user: UserHandle) -> Result<Vec<PhotoRef>> {
        self.record("profile_photos", user.id.to_string());
        self.with(|st| {
            if st.fail_photos {
                return Err(Error::Connection("timeout".to_string()));
            }
            Ok(st.photos.get(&user.id).cloned().unwrap_or_default())
        })
    }

    async fn download_photo(&self, photo: &PhotoRef) -> Result<Vec<u8>> {
        self.record("download_photo", photo.0.clone());
        self.with(|st| {
            if st.failing_downloads.contains(&photo.0) {
                return Err(Error::Connection("FILE_MIGRATE".to_string()));
            }
            Ok(photo.0.as_bytes().to_vec())
        })
    }
}
