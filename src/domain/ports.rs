use crate::domain::model::{PlaceKind, StudyKey, StudyPayload};
use crate::utils::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A storage backend that can contain imaging studies.
///
/// Enumeration always reflects the live backend state; nothing is cached between calls.
/// `has_study` must agree with `list_studies`.
#[async_trait]
pub trait Place: Send + Sync {
    fn kind(&self) -> PlaceKind;

    /// Human readable description for listings, e.g. the root path.
    fn description(&self) -> String;

    /// Current contents, in a stable order.
    async fn list_studies(&self) -> Result<Vec<StudyKey>>;

    async fn has_study(&self, key: &StudyKey) -> Result<bool> {
        Ok(self.list_studies().await?.contains(key))
    }

    /// Read a study's data so it can be sent elsewhere.
    async fn fetch_study(&self, key: &StudyKey) -> Result<StudyPayload>;

    /// Store `payload` under `key`. A failed write never leaves a study behind that
    /// `has_study` would report as present.
    async fn accept_study(&self, key: &StudyKey, payload: StudyPayload) -> Result<()>;

    /// Pull `key` out of `source` and materialize it here under the same key.
    async fn send_study(&self, key: &StudyKey, source: &dyn Place) -> Result<()> {
        let payload = source.fetch_study(key).await?;
        tracing::debug!(
            "Fetched {} ({} bytes) from {}",
            key,
            payload.size_bytes(),
            source.description()
        );
        self.accept_study(key, payload).await
    }
}

/// One upload session waiting in a remote project's pre-archive.
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveSession {
    pub subject: String,
    pub label: String,
    pub uploaded: Option<DateTime<Utc>>,
}

/// The network client used to talk to a remote archive service. Retry, auth and timeout
/// behaviour belong to the implementation.
#[async_trait]
pub trait ArchiveClient: Send + Sync {
    fn server(&self) -> &str;

    async fn list_sessions(&self, project: &str) -> Result<Vec<ArchiveSession>>;

    async fn session_exists(&self, project: &str, subject: &str, label: &str) -> Result<bool>;

    async fn upload_session(
        &self,
        project: &str,
        subject: &str,
        label: &str,
        zip_bytes: Vec<u8>,
    ) -> Result<()>;
}
