//! src/services/upload_service.rs
//!
//! UploadService: the end-to-end upload pipeline. Resolves the caller,
//! decodes base64 payloads, runs the validation gate, derives the storage key,
//! hands the bytes to the storage backend, and records the resulting metadata.
//!
//! Stages: Received → Authenticated → Validated → KeyDerived → Uploaded →
//! Recorded → Completed. Rejections happen before any backend or database
//! write; failures after the backend write are reported as partial failures.

use crate::{
    models::{
        caller::AuthenticatedCaller,
        file_record::FileRecord,
        upload::{DecodeError, FilePayload, UploadRequest},
    },
    services::{
        auth::AuthResolver,
        key_deriver,
        metadata_store::{MetadataError, MetadataRecorder},
        settings::{OSS_SETTING, Setting, SettingsLookup},
        validation::{self, Rejection, Validated},
    },
    storage::{ByteStream, StorageBackend, StorageError},
};
use chrono::Utc;
use futures::{StreamExt, future, stream};
use std::{fmt, sync::Arc};
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStage {
    Received,
    Authenticated,
    Validated,
    KeyDerived,
    Uploaded,
    Recorded,
    Completed,
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UploadStage::Received => "received",
            UploadStage::Authenticated => "authenticated",
            UploadStage::Validated => "validated",
            UploadStage::KeyDerived => "key_derived",
            UploadStage::Uploaded => "uploaded",
            UploadStage::Recorded => "recorded",
            UploadStage::Completed => "completed",
        };
        f.write_str(name)
    }
}

/// Why a storage operation failed, and whether the object reached the backend.
#[derive(Debug, Error)]
pub enum StorageFailure {
    #[error("backend write of `{key}` failed: {source}")]
    Write {
        key: String,
        #[source]
        source: StorageError,
    },
    /// The object exists in the backend but has no metadata record.
    #[error("object `{key}` stored at {url} but its metadata was not recorded: {source}")]
    Record {
        key: String,
        url: String,
        #[source]
        source: MetadataError,
    },
}

impl StorageFailure {
    pub fn object_written(&self) -> bool {
        matches!(self, StorageFailure::Record { .. })
    }

    pub fn key(&self) -> &str {
        match self {
            StorageFailure::Write { key, .. } | StorageFailure::Record { key, .. } => key,
        }
    }
}

#[derive(Debug, Error)]
pub enum UploadError {
    #[error("caller is not authenticated")]
    Unauthenticated,
    #[error("no file was supplied")]
    FileMissing,
    #[error("base64 payload could not be decoded: {0}")]
    Decode(#[from] DecodeError),
    #[error("no storage provider is configured")]
    ProviderUnavailable,
    #[error("{0}")]
    UnsupportedType(String),
    #[error(transparent)]
    StorageOperationFailed(#[from] StorageFailure),
}

impl From<Rejection> for UploadError {
    fn from(rejection: Rejection) -> Self {
        match rejection {
            Rejection::Unauthenticated => UploadError::Unauthenticated,
            Rejection::FileMissing => UploadError::FileMissing,
            Rejection::ProviderUnavailable => UploadError::ProviderUnavailable,
            other @ (Rejection::MissingContentType | Rejection::UnsupportedType(_)) => {
                UploadError::UnsupportedType(other.to_string())
            }
        }
    }
}

pub type UploadResult<T> = Result<T, UploadError>;

/// Upload pipeline over injected collaborators. Holds no per-request state,
/// so one instance is shared by every handler.
#[derive(Clone)]
pub struct UploadService {
    auth: Arc<dyn AuthResolver>,
    settings: Arc<dyn SettingsLookup>,
    storage: Arc<dyn StorageBackend>,
    recorder: Arc<dyn MetadataRecorder>,
}

impl UploadService {
    pub fn new(
        auth: Arc<dyn AuthResolver>,
        settings: Arc<dyn SettingsLookup>,
        storage: Arc<dyn StorageBackend>,
        recorder: Arc<dyn MetadataRecorder>,
    ) -> Self {
        Self {
            auth,
            settings,
            storage,
            recorder,
        }
    }

    /// Run one upload to completion and return the object's URL.
    pub async fn handle(&self, request: UploadRequest) -> UploadResult<String> {
        let UploadRequest {
            file,
            base64,
            directory_path,
            token,
        } = request;
        debug!(stage = %UploadStage::Received, directory_path = %directory_path, "upload received");

        let Some(caller) = self.resolve_caller(token.as_deref()).await else {
            info!(stage = %UploadStage::Received, "upload rejected: unauthenticated");
            return Err(UploadError::Unauthenticated);
        };
        debug!(
            stage = %UploadStage::Authenticated,
            caller_id = %caller.id,
            role = %caller.role,
            "caller resolved"
        );

        let file = match base64.as_deref().filter(|raw| !raw.trim().is_empty()) {
            Some(raw) => Some(FilePayload::from_base64(raw).map_err(|err| {
                info!(caller_id = %caller.id, error = %err, "upload rejected: bad base64 payload");
                UploadError::from(err)
            })?),
            None => file,
        };

        let setting = self.provider_setting().await;
        let validated = validation::validate(Some(&caller), file.as_ref(), setting.as_ref())
            .map_err(|rejection| {
                info!(
                    stage = %UploadStage::Authenticated,
                    caller_id = %caller.id,
                    reason = %rejection,
                    "upload rejected"
                );
                UploadError::from(rejection)
            })?;
        debug!(stage = %UploadStage::Validated, size_bytes = validated.file.size(), "upload validated");

        let key = key_deriver::derive(validated.caller, &directory_path, &validated.file.filename);
        debug!(stage = %UploadStage::KeyDerived, key = %key, "storage key derived");

        let url = match self.storage.upload(body(validated.file), &key).await {
            Ok(url) => url,
            Err(source) => {
                let failure = StorageFailure::Write { key, source };
                error!(
                    stage = %UploadStage::KeyDerived,
                    key = %failure.key(),
                    object_written = failure.object_written(),
                    error = %failure,
                    "storage backend upload failed"
                );
                return Err(failure.into());
            }
        };
        debug!(stage = %UploadStage::Uploaded, key = %key, url = %url, "object stored");

        let record = build_record(&validated, &key, &url, &directory_path);
        if let Err(source) = self.recorder.save(&record).await {
            let failure = StorageFailure::Record { key, url, source };
            error!(
                stage = %UploadStage::Uploaded,
                key = %failure.key(),
                object_written = failure.object_written(),
                error = %failure,
                "partial failure: object is in the backend without a metadata record"
            );
            return Err(failure.into());
        }
        debug!(stage = %UploadStage::Recorded, record_id = %record.id, "metadata recorded");

        info!(
            stage = %UploadStage::Completed,
            caller_id = %validated.caller.id,
            key = %key,
            size_bytes = record.file_size,
            "upload completed"
        );
        Ok(url)
    }

    /// Blank tokens never reach the resolver. Resolver errors count as unauthenticated.
    async fn resolve_caller(&self, token: Option<&str>) -> Option<AuthenticatedCaller> {
        let token = token.map(str::trim).filter(|t| !t.is_empty())?;
        match self.auth.resolve(token).await {
            Ok(caller) => caller,
            Err(err) => {
                warn!(error = %err, "token resolution failed");
                None
            }
        }
    }

    /// Lookup errors count as an unconfigured provider.
    async fn provider_setting(&self) -> Option<Setting> {
        match self.settings.get(OSS_SETTING).await {
            Ok(setting) => setting,
            Err(err) => {
                warn!(error = %err, "storage provider setting lookup failed");
                None
            }
        }
    }
}

fn body(file: &FilePayload) -> ByteStream {
    stream::once(future::ready(Ok(file.bytes.clone()))).boxed()
}

/// Owner, role, and key all come from the one validated caller.
fn build_record(validated: &Validated<'_>, key: &str, url: &str, directory_path: &str) -> FileRecord {
    FileRecord {
        id: Uuid::new_v4(),
        name: validated.file.filename.clone(),
        file_size: validated.file.size(),
        file_type: validated.content_type.to_string(),
        file_key: key.to_string(),
        url: url.to_string(),
        create_by: validated.caller.username.clone(),
        owner_id: validated.owner_id.to_string(),
        user_enums: validated.caller.role.as_str().to_string(),
        file_directory_id: key_deriver::directory_id(directory_path),
        created_at: Utc::now(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        models::caller::Role,
        services::{
            auth::{AuthError, MockAuthResolver},
            metadata_store::MockMetadataRecorder,
            settings::MockSettingsLookup,
        },
        storage::MockStorageBackend,
    };
    use bytes::Bytes;
    use std::{
        io,
        sync::{Arc, Mutex},
    };

    fn caller(role: Role, id: &str, store_id: Option<&str>) -> AuthenticatedCaller {
        AuthenticatedCaller {
            id: id.into(),
            username: "alice".into(),
            role,
            store_id: store_id.map(str::to_string),
        }
    }

    fn png(name: &str) -> FilePayload {
        FilePayload {
            filename: name.into(),
            content_type: Some("image/png".into()),
            bytes: Bytes::from_static(b"\x89PNG"),
        }
    }

    fn request(file: Option<FilePayload>, dir: &str, token: Option<&str>) -> UploadRequest {
        UploadRequest {
            file,
            base64: None,
            directory_path: dir.into(),
            token: token.map(str::to_string),
        }
    }

    fn auth_returning(found: Option<AuthenticatedCaller>) -> MockAuthResolver {
        let mut auth = MockAuthResolver::new();
        auth.expect_resolve()
            .times(1)
            .returning(move |_| Ok(found.clone()));
        auth
    }

    fn settings_returning(value: Option<&'static str>) -> MockSettingsLookup {
        let mut settings = MockSettingsLookup::new();
        settings.expect_get().returning(move |key| {
            Ok(value.map(|v| Setting {
                id: key.to_string(),
                setting_value: Some(v.to_string()),
            }))
        });
        settings
    }

    fn no_storage() -> MockStorageBackend {
        let mut storage = MockStorageBackend::new();
        storage.expect_upload().never();
        storage
    }

    fn no_recorder() -> MockMetadataRecorder {
        let mut recorder = MockMetadataRecorder::new();
        recorder.expect_save().never();
        recorder
    }

    fn url_echo_storage(keys: Arc<Mutex<Vec<String>>>) -> MockStorageBackend {
        let mut storage = MockStorageBackend::new();
        storage.expect_upload().times(1).returning(move |_, key| {
            keys.lock().unwrap().push(key.to_string());
            Ok(format!("https://cdn.example.com/{key}"))
        });
        storage
    }

    fn capturing_recorder(records: Arc<Mutex<Vec<FileRecord>>>) -> MockMetadataRecorder {
        let mut recorder = MockMetadataRecorder::new();
        recorder.expect_save().times(1).returning(move |record| {
            records.lock().unwrap().push(record.clone());
            Ok(())
        });
        recorder
    }

    fn service(
        auth: MockAuthResolver,
        settings: MockSettingsLookup,
        storage: MockStorageBackend,
        recorder: MockMetadataRecorder,
    ) -> UploadService {
        UploadService::new(
            Arc::new(auth),
            Arc::new(settings),
            Arc::new(storage),
            Arc::new(recorder),
        )
    }

    #[tokio::test]
    async fn missing_token_is_rejected_before_any_io() {
        let mut auth = MockAuthResolver::new();
        auth.expect_resolve().never();
        let mut settings = MockSettingsLookup::new();
        settings.expect_get().never();
        let svc = service(auth, settings, no_storage(), no_recorder());

        for token in [None, Some(""), Some("   ")] {
            let err = svc
                .handle(request(Some(png("a.png")), "avatars", token))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::Unauthenticated));
        }
    }

    #[tokio::test]
    async fn unknown_token_is_rejected() {
        let svc = service(
            auth_returning(None),
            settings_returning(Some("local")),
            no_storage(),
            no_recorder(),
        );
        let err = svc
            .handle(request(Some(png("a.png")), "avatars", Some("stale")))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Unauthenticated));
    }

    #[tokio::test]
    async fn resolver_failure_is_unauthenticated() {
        let mut auth = MockAuthResolver::new();
        auth.expect_resolve()
            .times(1)
            .returning(|_| Err(AuthError::Sqlx(sqlx::Error::PoolTimedOut)));
        let svc = service(auth, settings_returning(Some("local")), no_storage(), no_recorder());
        let err = svc
            .handle(request(Some(png("a.png")), "avatars", Some("t")))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::Unauthenticated));
    }

    #[tokio::test]
    async fn missing_file_is_rejected() {
        let svc = service(
            auth_returning(Some(caller(Role::Member, "42", None))),
            settings_returning(Some("local")),
            no_storage(),
            no_recorder(),
        );
        let err = svc
            .handle(request(None, "avatars", Some("t")))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::FileMissing));
    }

    #[tokio::test]
    async fn disabled_provider_is_rejected() {
        for value in [None, Some(""), Some("  ")] {
            let svc = service(
                auth_returning(Some(caller(Role::Member, "42", None))),
                settings_returning(value),
                no_storage(),
                no_recorder(),
            );
            let err = svc
                .handle(request(Some(png("a.png")), "avatars", Some("t")))
                .await
                .unwrap_err();
            assert!(matches!(err, UploadError::ProviderUnavailable), "{value:?}");
        }
    }

    #[tokio::test]
    async fn pdf_is_rejected_without_side_effects() {
        let svc = service(
            auth_returning(Some(caller(Role::Member, "42", None))),
            settings_returning(Some("local")),
            no_storage(),
            no_recorder(),
        );
        let mut file = png("doc.pdf");
        file.content_type = Some("application/pdf".into());
        let err = svc
            .handle(request(Some(file), "docs", Some("t")))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::UnsupportedType(_)));
    }

    #[tokio::test]
    async fn member_upload_end_to_end() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let records = Arc::new(Mutex::new(Vec::new()));
        let svc = service(
            auth_returning(Some(caller(Role::Member, "42", None))),
            settings_returning(Some(r#"{"type":"LOCAL"}"#)),
            url_echo_storage(keys.clone()),
            capturing_recorder(records.clone()),
        );

        let url = svc
            .handle(request(Some(png("pic.png")), "avatars", Some("t")))
            .await
            .unwrap();

        let key = keys.lock().unwrap()[0].clone();
        let token = key
            .strip_prefix("MEMBER/42/avatars/")
            .and_then(|rest| rest.strip_suffix(".png"))
            .expect("key shape");
        assert_eq!(token.len(), 32);
        assert_eq!(url, format!("https://cdn.example.com/{key}"));

        let record = records.lock().unwrap()[0].clone();
        assert_eq!(record.owner_id, "42");
        assert_eq!(record.file_directory_id.as_deref(), Some("avatars"));
        assert_eq!(record.file_key, key);
        assert_eq!(record.url, url);
        assert_eq!(record.name, "pic.png");
        assert_eq!(record.file_type, "image/png");
        assert_eq!(record.file_size, 4);
        assert_eq!(record.user_enums, "MEMBER");
        assert_eq!(record.create_by, "alice");
    }

    #[tokio::test]
    async fn store_upload_is_owned_by_the_store() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let records = Arc::new(Mutex::new(Vec::new()));
        let svc = service(
            auth_returning(Some(caller(Role::Store, "5", Some("store-99")))),
            settings_returning(Some("local")),
            url_echo_storage(keys.clone()),
            capturing_recorder(records.clone()),
        );

        svc.handle(request(Some(png("logo.png")), "goods/banners", Some("t")))
            .await
            .unwrap();

        assert!(keys.lock().unwrap()[0].starts_with("STORE/5/goods/banners/"));
        let record = records.lock().unwrap()[0].clone();
        assert_eq!(record.owner_id, "store-99");
        assert_eq!(record.user_enums, "STORE");
        assert_eq!(record.file_directory_id.as_deref(), Some("banners"));
    }

    #[tokio::test]
    async fn manager_upload_has_role_scope_and_no_directory() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let records = Arc::new(Mutex::new(Vec::new()));
        let svc = service(
            auth_returning(Some(caller(Role::Manager, "1", None))),
            settings_returning(Some("local")),
            url_echo_storage(keys.clone()),
            capturing_recorder(records.clone()),
        );

        svc.handle(request(Some(png("x.png")), "", Some("t")))
            .await
            .unwrap();

        assert!(keys.lock().unwrap()[0].starts_with("MANAGER//"));
        let record = records.lock().unwrap()[0].clone();
        assert_eq!(record.owner_id, "1");
        assert_eq!(record.file_directory_id, None);
    }

    #[tokio::test]
    async fn backend_failure_is_reported_before_write() {
        let mut storage = MockStorageBackend::new();
        storage.expect_upload().times(1).returning(|_, _| {
            Err(StorageError::Io(io::Error::new(
                io::ErrorKind::TimedOut,
                "backend timed out",
            )))
        });
        let svc = service(
            auth_returning(Some(caller(Role::Member, "42", None))),
            settings_returning(Some("local")),
            storage,
            no_recorder(),
        );

        let err = svc
            .handle(request(Some(png("a.png")), "avatars", Some("t")))
            .await
            .unwrap_err();
        match err {
            UploadError::StorageOperationFailed(failure) => {
                assert!(!failure.object_written());
                assert!(failure.key().starts_with("MEMBER/42/avatars/"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn recording_failure_is_a_partial_failure() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let mut recorder = MockMetadataRecorder::new();
        recorder
            .expect_save()
            .times(1)
            .returning(|_| Err(MetadataError::Sqlx(sqlx::Error::PoolClosed)));
        let svc = service(
            auth_returning(Some(caller(Role::Member, "42", None))),
            settings_returning(Some("local")),
            url_echo_storage(keys.clone()),
            recorder,
        );

        let err = svc
            .handle(request(Some(png("a.png")), "avatars", Some("t")))
            .await
            .unwrap_err();
        match err {
            UploadError::StorageOperationFailed(failure) => {
                assert!(failure.object_written());
                assert_eq!(failure.key(), keys.lock().unwrap()[0]);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn base64_payload_replaces_the_multipart_file() {
        let keys = Arc::new(Mutex::new(Vec::new()));
        let records = Arc::new(Mutex::new(Vec::new()));
        let svc = service(
            auth_returning(Some(caller(Role::Seat, "8", None))),
            settings_returning(Some("local")),
            url_echo_storage(keys.clone()),
            capturing_recorder(records.clone()),
        );

        let mut req = request(Some(png("ignored.png")), "chat", Some("t"));
        req.base64 = Some("data:image/jpeg;base64,aGVsbG8=".into());
        svc.handle(req).await.unwrap();

        assert!(keys.lock().unwrap()[0].ends_with(".jpeg"));
        let record = records.lock().unwrap()[0].clone();
        assert_eq!(record.name, "tempfile.jpeg");
        assert_eq!(record.file_type, "image/jpeg");
        assert_eq!(record.file_size, 5);
    }

    #[tokio::test]
    async fn undecodable_base64_is_rejected() {
        let svc = service(
            auth_returning(Some(caller(Role::Member, "42", None))),
            settings_returning(Some("local")),
            no_storage(),
            no_recorder(),
        );
        let mut req = request(None, "avatars", Some("t"));
        req.base64 = Some("data:image/png;base64,%%%".into());
        let err = svc.handle(req).await.unwrap_err();
        assert!(matches!(err, UploadError::Decode(_)));
    }
}
