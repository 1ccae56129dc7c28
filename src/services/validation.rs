//! Pre-I/O checks for an upload.
//!
//! Pure function over inputs that collaborators have already resolved. Checks
//! run in a fixed order and the first failure wins.

use crate::{
    models::{caller::AuthenticatedCaller, upload::FilePayload},
    services::settings::Setting,
};
use thiserror::Error;

/// Substrings of the lower-cased content type that are accepted.
const ALLOWED_MEDIA_KINDS: [&str; 2] = ["image", "video"];

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Rejection {
    #[error("caller is not authenticated")]
    Unauthenticated,
    #[error("no file was supplied")]
    FileMissing,
    #[error("no storage provider is configured")]
    ProviderUnavailable,
    #[error("content type is missing")]
    MissingContentType,
    #[error("content type `{0}` is not supported")]
    UnsupportedType(String),
}

/// A request that passed every check. Borrowing keeps the caller and file the
/// exact instances the gate inspected.
#[derive(Debug, Clone, Copy)]
pub struct Validated<'a> {
    pub caller: &'a AuthenticatedCaller,
    pub file: &'a FilePayload,
    /// Resolved from `caller`; see [`AuthenticatedCaller::owner_id`].
    pub owner_id: &'a str,
    pub content_type: &'a str,
}

pub fn validate<'a>(
    caller: Option<&'a AuthenticatedCaller>,
    file: Option<&'a FilePayload>,
    provider_setting: Option<&Setting>,
) -> Result<Validated<'a>, Rejection> {
    // A store account without a store cannot own anything.
    let (caller, owner_id) = caller
        .and_then(|c| c.owner_id().map(|owner| (c, owner)))
        .ok_or(Rejection::Unauthenticated)?;
    // Zero bytes (an empty part, or `data:image/png;base64,`) is no file.
    let file = file
        .filter(|f| !f.bytes.is_empty())
        .ok_or(Rejection::FileMissing)?;

    if !provider_setting.is_some_and(Setting::is_configured) {
        return Err(Rejection::ProviderUnavailable);
    }

    let content_type = match file.content_type.as_deref() {
        Some(ct) if !ct.is_empty() => ct,
        _ => return Err(Rejection::MissingContentType),
    };
    let lowered = content_type.to_lowercase();
    if !ALLOWED_MEDIA_KINDS.iter().any(|kind| lowered.contains(kind)) {
        return Err(Rejection::UnsupportedType(content_type.to_string()));
    }

    Ok(Validated {
        caller,
        file,
        owner_id,
        content_type,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::caller::Role;
    use bytes::Bytes;

    fn caller() -> AuthenticatedCaller {
        AuthenticatedCaller {
            id: "42".into(),
            username: "alice".into(),
            role: Role::Member,
            store_id: None,
        }
    }

    fn file(content_type: Option<&str>) -> FilePayload {
        FilePayload {
            filename: "pic.png".into(),
            content_type: content_type.map(str::to_string),
            bytes: Bytes::from_static(b"png"),
        }
    }

    fn setting(value: Option<&str>) -> Setting {
        Setting {
            id: "OSS_SETTING".into(),
            setting_value: value.map(str::to_string),
        }
    }

    #[test]
    fn accepts_images_and_videos() {
        let c = caller();
        let s = setting(Some(r#"{"type":"LOCAL"}"#));
        for ct in ["image/png", "video/mp4", "IMAGE/JPEG"] {
            let f = file(Some(ct));
            assert!(validate(Some(&c), Some(&f), Some(&s)).is_ok(), "{ct}");
        }
    }

    #[test]
    fn rejects_other_types() {
        let c = caller();
        let s = setting(Some("x"));
        let f = file(Some("application/pdf"));
        assert_eq!(
            validate(Some(&c), Some(&f), Some(&s)).unwrap_err(),
            Rejection::UnsupportedType("application/pdf".into())
        );
        let f = file(Some(""));
        assert_eq!(
            validate(Some(&c), Some(&f), Some(&s)).unwrap_err(),
            Rejection::MissingContentType
        );
        let f = file(None);
        assert_eq!(
            validate(Some(&c), Some(&f), Some(&s)).unwrap_err(),
            Rejection::MissingContentType
        );
    }

    #[test]
    fn provider_must_be_configured() {
        let c = caller();
        let f = file(Some("image/png"));
        assert_eq!(
            validate(Some(&c), Some(&f), None).unwrap_err(),
            Rejection::ProviderUnavailable
        );
        for blank in [None, Some(""), Some("   ")] {
            let s = setting(blank);
            assert_eq!(
                validate(Some(&c), Some(&f), Some(&s)).unwrap_err(),
                Rejection::ProviderUnavailable
            );
        }
    }

    #[test]
    fn checks_short_circuit_in_order() {
        let c = caller();
        let bad = file(Some("application/pdf"));
        assert_eq!(
            validate(None, None, None).unwrap_err(),
            Rejection::Unauthenticated
        );
        assert_eq!(
            validate(Some(&c), None, None).unwrap_err(),
            Rejection::FileMissing
        );
        assert_eq!(
            validate(Some(&c), Some(&bad), None).unwrap_err(),
            Rejection::ProviderUnavailable
        );
    }

    #[test]
    fn empty_payload_counts_as_missing() {
        let c = caller();
        let s = setting(Some("x"));
        let mut f = file(Some("image/png"));
        f.bytes = Bytes::new();
        assert_eq!(
            validate(Some(&c), Some(&f), Some(&s)).unwrap_err(),
            Rejection::FileMissing
        );

        let decoded = FilePayload::from_base64("data:image/png;base64,").unwrap();
        assert_eq!(
            validate(Some(&c), Some(&decoded), Some(&s)).unwrap_err(),
            Rejection::FileMissing
        );
    }

    #[test]
    fn store_caller_needs_a_store() {
        let mut c = caller();
        c.role = Role::Store;
        let f = file(Some("image/png"));
        let s = setting(Some("x"));
        assert_eq!(
            validate(Some(&c), Some(&f), Some(&s)).unwrap_err(),
            Rejection::Unauthenticated
        );
        c.store_id = Some("7".into());
        assert!(validate(Some(&c), Some(&f), Some(&s)).is_ok());
    }
}
