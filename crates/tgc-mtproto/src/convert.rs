//! Translation between raw TL objects / grammers errors and core types.

use std::time::Duration;

use chrono::{TimeZone, Utc};
use grammers_mtsender::{AuthorizationError, InvocationError};
use grammers_tl_types as tl;

use tgc_core::{
    domain::UserStatus,
    errors::Error,
    ports::{RemoteUser, UserHandle},
};

/// RPC errors that mean "the directory answered: nobody there".
const NOT_FOUND_ERRORS: &[&str] = &[
    "PHONE_NOT_OCCUPIED",
    "PHONE_NUMBER_INVALID",
    "USERNAME_NOT_OCCUPIED",
    "USERNAME_INVALID",
    "USER_ID_INVALID",
];

pub(crate) fn is_not_found(e: &InvocationError) -> bool {
    matches!(e, InvocationError::Rpc(rpc) if NOT_FOUND_ERRORS.contains(&rpc.name.as_str()))
}

pub(crate) fn map_invocation(e: InvocationError) -> Error {
    match e {
        InvocationError::Rpc(rpc) if rpc.name.starts_with("FLOOD_") => Error::RateLimited {
            retry_after: rpc.value.map(|v| Duration::from_secs(u64::from(v))),
        },
        InvocationError::Rpc(rpc) if rpc.code == 401 => {
            Error::NotAuthorized(format!("session rejected: {}", rpc.name))
        }
        InvocationError::Rpc(rpc) => {
            Error::External(format!("telegram rpc error {}: {}", rpc.code, rpc.name))
        }
        other => Error::Connection(other.to_string()),
    }
}

pub(crate) fn map_authorization(e: AuthorizationError) -> Error {
    match e {
        AuthorizationError::Invoke(inner) => map_invocation(inner),
        other => Error::Connection(other.to_string()),
    }
}

pub(crate) fn input_user(handle: UserHandle) -> tl::enums::InputUser {
    tl::types::InputUser {
        user_id: handle.id,
        access_hash: handle.access_hash,
    }
    .into()
}

/// First non-empty user out of a TL user vector.
pub(crate) fn first_user(users: Vec<tl::enums::User>) -> Option<RemoteUser> {
    users.into_iter().find_map(|u| match u {
        tl::enums::User::User(u) => Some(remote_user(u)),
        tl::enums::User::Empty(_) => None,
    })
}

pub(crate) fn user_with_id(users: Vec<tl::enums::User>, id: i64) -> Option<RemoteUser> {
    users.into_iter().find_map(|u| match u {
        tl::enums::User::User(u) if u.id == id => Some(remote_user(u)),
        _ => None,
    })
}

pub(crate) fn remote_user(u: tl::types::User) -> RemoteUser {
    RemoteUser {
        id: u.id,
        access_hash: u.access_hash,
        username: u.username,
        first_name: u.first_name,
        last_name: u.last_name,
        phone: u.phone,
        premium: u.premium,
        verified: u.verified,
        fake: u.fake,
        bot: u.bot,
        deleted: u.deleted,
        status: user_status(u.status),
    }
}

fn user_status(status: Option<tl::enums::UserStatus>) -> UserStatus {
    use tl::enums::UserStatus as S;

    match status {
        Some(S::Online(_)) => UserStatus::Online,
        Some(S::Offline(o)) => Utc
            .timestamp_opt(i64::from(o.was_online), 0)
            .single()
            .map(UserStatus::Offline)
            .unwrap_or_default(),
        Some(S::Recently(_)) => UserStatus::Recently,
        Some(S::LastWeek(_)) => UserStatus::LastWeek,
        Some(S::LastMonth(_)) => UserStatus::LastMonth,
        _ => UserStatus::Unknown,
    }
}

/// Type letter of the largest downloadable size of a photo.
pub(crate) fn largest_size(photo: &tl::types::Photo) -> Option<String> {
    use tl::enums::PhotoSize as P;

    photo
        .sizes
        .iter()
        .filter_map(|s| match s {
            P::Size(s) => Some((s.w * s.h, s.r#type.clone())),
            P::Progressive(s) => Some((s.w * s.h, s.r#type.clone())),
            _ => None,
        })
        .max_by_key(|(area, _)| *area)
        .map(|(_, ty)| ty)
}

pub(crate) fn photo_ref(photo: &tl::types::Photo) -> String {
    format!("photo:{}", photo.id)
}

#[cfg(test)]
mod tests {
    use grammers_mtsender::RpcError;

    use super::*;

    fn rpc(code: i32, name: &str, value: Option<u32>) -> InvocationError {
        InvocationError::Rpc(RpcError {
            code,
            name: name.to_string(),
            value,
            caused_by: None,
        })
    }

    #[test]
    fn flood_wait_becomes_rate_limited() {
        match map_invocation(rpc(420, "FLOOD_WAIT", Some(30))) {
            Error::RateLimited { retry_after } => {
                assert_eq!(retry_after, Some(Duration::from_secs(30)))
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn unauthorized_and_other_rpc_errors() {
        assert!(matches!(
            map_invocation(rpc(401, "AUTH_KEY_UNREGISTERED", None)),
            Error::NotAuthorized(_)
        ));
        assert!(matches!(
            map_invocation(rpc(400, "PEER_ID_INVALID", None)),
            Error::External(_)
        ));
    }

    #[test]
    fn not_found_names() {
        assert!(is_not_found(&rpc(400, "PHONE_NOT_OCCUPIED", None)));
        assert!(is_not_found(&rpc(400, "USERNAME_NOT_OCCUPIED", None)));
        assert!(!is_not_found(&rpc(420, "FLOOD_WAIT", Some(3))));
    }

    #[test]
    fn offline_status_carries_timestamp() {
        let status = user_status(Some(
            tl::types::UserStatusOffline {
                was_online: 1_700_000_000,
            }
            .into(),
        ));
        assert_eq!(status.summary(), "Last seen 2023-11-14 22:13:20");
        assert_eq!(user_status(None), UserStatus::Unknown);
    }
}
