//! Account resolution against an authorized session.
//!
//! Phone lookups use two paths because the directory only exposes accounts by
//! phone when they are already known to the caller:
//! 1. direct lookup (no side effects)
//! 2. transient contact import, fetch, then delete
//!
//! Path 2 runs only when path 1 answered "not exposed". A transport error on
//! path 1 is reported as a failure; it never triggers a contact-list mutation.

use tracing::{debug, warn};

use crate::{
    domain::{Identifier, Phone, PhotoRef, ProfileRecord, ResolutionOutcome, Username},
    ports::{DirectoryTransport, MediaStore, RemoteEntity, RemoteUser, UserHandle},
    session::Authenticator,
    Result,
};

pub struct Resolver<'a, T: DirectoryTransport> {
    auth: &'a Authenticator<T>,
}

impl<'a, T: DirectoryTransport> Resolver<'a, T> {
    pub fn new(auth: &'a Authenticator<T>) -> Self {
        Self { auth }
    }

    fn transport(&self) -> &'a T {
        self.auth.transport()
    }

    pub fn ensure_authorized(&self) -> Result<()> {
        self.auth.ensure_authorized()
    }

    pub async fn resolve(&self, id: &Identifier) -> Result<ResolutionOutcome> {
        match id {
            Identifier::Phone(p) => self.resolve_phone(p).await,
            Identifier::Username(u) => self.resolve_username(u).await,
        }
    }

    /// `Err` only for a missing authorization; everything else is an outcome.
    pub async fn resolve_username(&self, username: &Username) -> Result<ResolutionOutcome> {
        self.ensure_authorized()?;
        Ok(into_outcome(self.lookup_username(username).await))
    }

    /// `Err` only for a missing authorization; everything else is an outcome.
    pub async fn resolve_phone(&self, phone: &Phone) -> Result<ResolutionOutcome> {
        self.ensure_authorized()?;
        Ok(into_outcome(self.lookup_phone(phone).await))
    }

    /// All profile photo references for a user. Failures degrade to empty.
    pub async fn fetch_profile_photos(&self, user: UserHandle) -> Result<Vec<PhotoRef>> {
        self.ensure_authorized()?;
        Ok(self.photos_or_empty(user).await)
    }

    /// Download every photo of `record` and hand the bytes to `store`.
    ///
    /// Returns the stored locations; photos that fail to download or store
    /// are logged and skipped.
    pub async fn download_photos(
        &self,
        record: &ProfileRecord,
        store: &dyn MediaStore,
    ) -> Result<Vec<String>> {
        self.ensure_authorized()?;

        let owner = record.storage_owner();
        let mut stored = Vec::with_capacity(record.profile_photo_refs.len());
        for (idx, photo) in record.profile_photo_refs.iter().enumerate() {
            let bytes = match self.transport().download_photo(photo).await {
                Ok(b) => b,
                Err(e) => {
                    warn!(owner = %owner, photo = %photo.0, error = %e, "photo download failed");
                    continue;
                }
            };
            match store.store(&owner, idx, &bytes).await {
                Ok(location) => stored.push(location),
                Err(e) => {
                    warn!(owner = %owner, photo = %photo.0, error = %e, "storing photo failed")
                }
            }
        }
        Ok(stored)
    }

    async fn lookup_username(&self, username: &Username) -> Result<Option<ProfileRecord>> {
        match self.transport().resolve_username(username.as_str()).await? {
            None => {
                debug!(username = %username, "username not occupied");
                Ok(None)
            }
            Some(RemoteEntity::Other { kind }) => {
                debug!(username = %username, kind = %kind, "username is not a user account");
                Ok(None)
            }
            Some(RemoteEntity::User(user)) => self.profile_for(user, "").await,
        }
    }

    async fn lookup_phone(&self, phone: &Phone) -> Result<Option<ProfileRecord>> {
        if let Some(user) = self.transport().lookup_phone(phone.as_str()).await? {
            debug!(phone = %phone, "resolved via direct lookup");
            return self.profile_for(user, phone.as_str()).await;
        }
        self.lookup_via_import(phone).await
    }

    /// Import `phone` as a transient contact, fetch the user, then delete the
    /// contact whatever happened in between. Exactly one delete per import
    /// that matched a user; a failed delete is logged, not returned.
    async fn lookup_via_import(&self, phone: &Phone) -> Result<Option<ProfileRecord>> {
        let Some(imported) = self.transport().import_contact(phone.as_str()).await? else {
            debug!(phone = %phone, "import matched no account");
            return Ok(None);
        };

        let handle = imported.handle();
        let fetched = self.transport().get_user(handle).await;

        if let Err(e) = self.transport().delete_contact(handle).await {
            warn!(
                phone = %phone,
                user_id = handle.id,
                error = %e,
                "failed to delete transient contact"
            );
        }

        let user = fetched?;
        debug!(phone = %phone, "resolved via contact import");
        self.profile_for(user, phone.as_str()).await
    }

    async fn profile_for(&self, user: RemoteUser, phone_used: &str) -> Result<Option<ProfileRecord>> {
        if user.deleted {
            debug!(user_id = user.id, "account is deactivated");
            return Ok(None);
        }

        let handle = user.handle();
        let bio = match self.transport().get_bio(handle).await {
            Ok(b) => b.filter(|s| !s.is_empty()),
            Err(e) => {
                warn!(user_id = user.id, error = %e, "bio unavailable");
                None
            }
        };
        let profile_photo_refs = self.photos_or_empty(handle).await;

        Ok(Some(ProfileRecord {
            remote_id: user.id,
            username: user.username,
            first_name: user.first_name.unwrap_or_default(),
            last_name: user.last_name.unwrap_or_default(),
            phone_used: phone_used.to_string(),
            premium: user.premium,
            verified: user.verified,
            fake: user.fake,
            bot: user.bot,
            last_seen_summary: user.status.summary(),
            bio,
            profile_photo_refs,
        }))
    }

    async fn photos_or_empty(&self, user: UserHandle) -> Vec<PhotoRef> {
        match self.transport().profile_photos(user).await {
            Ok(p) => p,
            Err(e) => {
                warn!(user_id = user.id, error = %e, "profile photos unavailable");
                Vec::new()
            }
        }
    }
}

fn into_outcome(r: Result<Option<ProfileRecord>>) -> ResolutionOutcome {
    match r {
        Ok(Some(p)) => ResolutionOutcome::Found(p),
        Ok(None) => ResolutionOutcome::NotFound,
        Err(e) => ResolutionOutcome::Failed(e.kind(), e.to_string()),
    }
}
