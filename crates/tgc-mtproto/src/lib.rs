//! Telegram adapter (MTProto, via grammers).
//!
//! This crate implements the `tgc-core` DirectoryTransport over a user
//! session. Raw TL calls are used where grammers has no high-level wrapper.

mod convert;

use std::{collections::HashMap, path::PathBuf};

use async_trait::async_trait;
use grammers_client::{
    types::{Chat, LoginToken, PasswordToken},
    Client, Config, InitParams, SignInError,
};
use grammers_session::Session;
use grammers_tl_types as tl;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use tgc_core::{
    domain::{Credentials, PhotoRef},
    errors::Error,
    ports::{DirectoryTransport, RemoteEntity, RemoteUser, SignIn, UserHandle},
    Result,
};

use crate::convert::{
    first_user, input_user, is_not_found, largest_size, map_authorization, map_invocation,
    photo_ref, user_with_id,
};

/// Contact names used for the temporary import. Never shown to anyone.
const IMPORT_FIRST_NAME: &str = "Test";
const IMPORT_LAST_NAME: &str = "User";

const PHOTO_PAGE: i32 = 100;
/// Must be a multiple of 4 KiB and at most 1 MiB.
const DOWNLOAD_CHUNK: i32 = 512 * 1024;

/// Second-factor challenge handed back by a code sign-in.
///
/// grammers consumes the password token on use, so a wrong password
/// exhausts the challenge; the caller then requests a new code.
pub struct PasswordChallenge {
    token: Mutex<Option<PasswordToken>>,
    hint: Option<String>,
}

impl PasswordChallenge {
    pub fn hint(&self) -> Option<&str> {
        self.hint.as_deref()
    }
}

/// Photos listed but not yet downloaded, keyed by their reference.
///
/// An entry is handed out once; downloading drops it from the cache.
struct PhotoCache<P> {
    pending: HashMap<String, P>,
}

impl<P> PhotoCache<P> {
    fn new() -> Self {
        Self {
            pending: HashMap::new(),
        }
    }

    fn remember(&mut self, key: String, photo: P) {
        self.pending.insert(key, photo);
    }

    fn take(&mut self, key: &str) -> Option<P> {
        self.pending.remove(key)
    }

    fn len(&self) -> usize {
        self.pending.len()
    }

    fn clear(&mut self) {
        self.pending.clear();
    }
}

pub struct MtprotoTransport {
    session_file: PathBuf,
    client: RwLock<Option<Client>>,
    photos: Mutex<PhotoCache<tl::types::Photo>>,
}

impl MtprotoTransport {
    pub fn new(session_file: impl Into<PathBuf>) -> Self {
        Self {
            session_file: session_file.into(),
            client: RwLock::new(None),
            photos: Mutex::new(PhotoCache::new()),
        }
    }

    async fn client(&self) -> Result<Client> {
        self.client
            .read()
            .await
            .clone()
            .ok_or_else(|| Error::InvalidState("not connected".to_string()))
    }

    fn save_session(&self, client: &Client) -> Result<()> {
        client.session().save_to_file(&self.session_file)?;
        Ok(())
    }
}

#[async_trait]
impl DirectoryTransport for MtprotoTransport {
    type CodeToken = LoginToken;
    type PasswordChallenge = PasswordChallenge;

    async fn connect(&self, credentials: &Credentials) -> Result<()> {
        let mut slot = self.client.write().await;
        if slot.is_some() {
            return Ok(());
        }

        let session = Session::load_file_or_create(&self.session_file)?;
        let client = Client::connect(Config {
            session,
            api_id: credentials.api_id,
            api_hash: credentials.api_hash.clone(),
            params: InitParams::default(),
        })
        .await
        .map_err(map_authorization)?;

        info!(session = %self.session_file.display(), "connected to telegram");
        *slot = Some(client);
        Ok(())
    }

    async fn is_authorized(&self) -> Result<bool> {
        self.client()
            .await?
            .is_authorized()
            .await
            .map_err(map_invocation)
    }

    async fn send_code(&self, phone: &str) -> Result<LoginToken> {
        self.client()
            .await?
            .request_login_code(phone)
            .await
            .map_err(map_authorization)
    }

    async fn sign_in(
        &self,
        token: &LoginToken,
        _phone: &str,
        code: &str,
    ) -> Result<SignIn<PasswordChallenge>> {
        let client = self.client().await?;
        match client.sign_in(token, code).await {
            Ok(_) => {
                self.save_session(&client)?;
                Ok(SignIn::Authorized)
            }
            Err(SignInError::PasswordRequired(token)) => {
                let hint = token.hint().map(|h| h.to_string());
                Ok(SignIn::PasswordRequired(PasswordChallenge {
                    token: Mutex::new(Some(token)),
                    hint,
                }))
            }
            Err(SignInError::InvalidCode) => Err(Error::InvalidCode),
            Err(SignInError::InvalidPassword) => Err(Error::InvalidPassword),
            Err(SignInError::Other(e)) => Err(map_invocation(e)),
            Err(other) => Err(Error::External(format!("sign-in failed: {other}"))),
        }
    }

    async fn check_password(&self, challenge: &PasswordChallenge, password: &str) -> Result<()> {
        let client = self.client().await?;
        let Some(token) = challenge.token.lock().await.take() else {
            return Err(Error::InvalidState(
                "password challenge already used; request a new code".to_string(),
            ));
        };

        match client.check_password(token, password).await {
            Ok(_) => {
                self.save_session(&client)?;
                Ok(())
            }
            Err(SignInError::InvalidPassword) => Err(Error::InvalidPassword),
            Err(SignInError::Other(e)) => Err(map_invocation(e)),
            Err(other) => Err(Error::External(format!("password check failed: {other}"))),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        if let Some(client) = self.client.write().await.take() {
            self.save_session(&client)?;
            debug!("telegram client released");
        }
        self.photos.lock().await.clear();
        Ok(())
    }

    async fn resolve_username(&self, username: &str) -> Result<Option<RemoteEntity>> {
        let client = self.client().await?;
        let chat = match client.resolve_username(username).await {
            Ok(Some(chat)) => chat,
            Ok(None) => return Ok(None),
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(map_invocation(e)),
        };

        match &chat {
            Chat::User(_) => {
                let packed = chat.pack();
                let user = self
                    .get_user(UserHandle {
                        id: packed.id,
                        access_hash: packed.access_hash.unwrap_or(0),
                    })
                    .await?;
                Ok(Some(RemoteEntity::User(user)))
            }
            Chat::Group(_) => Ok(Some(RemoteEntity::Other {
                kind: "group".to_string(),
            })),
            Chat::Channel(_) => Ok(Some(RemoteEntity::Other {
                kind: "channel".to_string(),
            })),
        }
    }

    async fn lookup_phone(&self, phone: &str) -> Result<Option<RemoteUser>> {
        let client = self.client().await?;
        let request = tl::functions::contacts::ResolvePhone {
            phone: phone.trim_start_matches('+').to_string(),
        };

        let resolved = match client.invoke(&request).await {
            Ok(tl::enums::contacts::ResolvedPeer::Peer(resolved)) => resolved,
            Err(e) if is_not_found(&e) => return Ok(None),
            Err(e) => return Err(map_invocation(e)),
        };

        match resolved.peer {
            tl::enums::Peer::User(peer) => Ok(user_with_id(resolved.users, peer.user_id)),
            _ => Ok(None),
        }
    }

    async fn import_contact(&self, phone: &str) -> Result<Option<RemoteUser>> {
        let client = self.client().await?;
        let request = tl::functions::contacts::ImportContacts {
            contacts: vec![tl::types::InputPhoneContact {
                client_id: 0,
                phone: phone.to_string(),
                first_name: IMPORT_FIRST_NAME.to_string(),
                last_name: IMPORT_LAST_NAME.to_string(),
            }
            .into()],
        };

        let tl::enums::contacts::ImportedContacts::Contacts(imported) =
            client.invoke(&request).await.map_err(map_invocation)?;

        if !imported.retry_contacts.is_empty() {
            // The server refused to import right now (contact import quota).
            return Err(Error::RateLimited { retry_after: None });
        }
        Ok(first_user(imported.users))
    }

    async fn delete_contact(&self, user: UserHandle) -> Result<()> {
        let client = self.client().await?;
        let request = tl::functions::contacts::DeleteContacts {
            id: vec![input_user(user)],
        };
        client.invoke(&request).await.map_err(map_invocation)?;
        Ok(())
    }

    async fn get_user(&self, user: UserHandle) -> Result<RemoteUser> {
        let client = self.client().await?;
        let request = tl::functions::users::GetUsers {
            id: vec![input_user(user)],
        };
        let users = client.invoke(&request).await.map_err(map_invocation)?;
        user_with_id(users, user.id)
            .ok_or_else(|| Error::External(format!("user {} not returned", user.id)))
    }

    async fn get_bio(&self, user: UserHandle) -> Result<Option<String>> {
        let client = self.client().await?;
        let request = tl::functions::users::GetFullUser {
            id: input_user(user),
        };
        let tl::enums::users::UserFull::Full(full) =
            client.invoke(&request).await.map_err(map_invocation)?;
        let tl::enums::UserFull::Full(full_user) = full.full_user;
        Ok(full_user.about)
    }

    async fn profile_photos(&self, user: UserHandle) -> Result<Vec<PhotoRef>> {
        let client = self.client().await?;
        let mut refs = Vec::new();
        let mut offset = 0;

        loop {
            let request = tl::functions::photos::GetUserPhotos {
                user_id: input_user(user),
                offset,
                max_id: 0,
                limit: PHOTO_PAGE,
            };
            let (photos, total) = match client.invoke(&request).await.map_err(map_invocation)? {
                tl::enums::photos::Photos::Photos(p) => {
                    let n = p.photos.len();
                    (p.photos, n)
                }
                tl::enums::photos::Photos::Slice(p) => (p.photos, p.count.max(0) as usize),
            };

            let page_len = photos.len();
            let mut cache = self.photos.lock().await;
            for photo in photos {
                if let tl::enums::Photo::Photo(photo) = photo {
                    let key = photo_ref(&photo);
                    refs.push(PhotoRef(key.clone()));
                    cache.remember(key, photo);
                }
            }
            let cached = cache.len();
            drop(cache);
            debug!(user = user.id, cached, "photo references pending download");

            offset += page_len as i32;
            if page_len < PHOTO_PAGE as usize || offset as usize >= total {
                break;
            }
        }

        debug!(user = user.id, count = refs.len(), "listed profile photos");
        Ok(refs)
    }

    async fn download_photo(&self, photo: &PhotoRef) -> Result<Vec<u8>> {
        let Some(raw) = self.photos.lock().await.take(&photo.0) else {
            return Err(Error::InvalidState(format!(
                "unknown or already downloaded photo reference {}",
                photo.0
            )));
        };
        let Some(thumb_size) = largest_size(&raw) else {
            warn!(photo = %photo.0, "photo has no downloadable size");
            return Ok(Vec::new());
        };

        let client = self.client().await?;
        let location: tl::enums::InputFileLocation = tl::types::InputPhotoFileLocation {
            id: raw.id,
            access_hash: raw.access_hash,
            file_reference: raw.file_reference.clone(),
            thumb_size,
        }
        .into();

        let mut bytes = Vec::new();
        let mut offset: i64 = 0;
        loop {
            let request = tl::functions::upload::GetFile {
                precise: false,
                cdn_supported: false,
                location: location.clone(),
                offset,
                limit: DOWNLOAD_CHUNK,
            };
            let chunk = match client
                .invoke_in_dc(&request, raw.dc_id)
                .await
                .map_err(map_invocation)?
            {
                tl::enums::upload::File::File(f) => f.bytes,
                tl::enums::upload::File::CdnRedirect(_) => {
                    return Err(Error::External(
                        "photo is served from a CDN; not supported".to_string(),
                    ))
                }
            };

            let n = chunk.len();
            bytes.extend_from_slice(&chunk);
            if n < DOWNLOAD_CHUNK as usize {
                break;
            }
            offset += i64::from(DOWNLOAD_CHUNK);
        }

        Ok(bytes)
    }
}
