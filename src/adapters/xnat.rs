//! Studies waiting in the pre-archive of an XNAT project.
//!
//! XNAT calls a study an "experiment" or "session" and a patient a "subject". A study key
//! `patient/study` maps to subject `patient` and session label `study`. Uploaded sessions
//! stay in the pre-archive until a project admin imports them, which is outside this tool.

use crate::adapters::archive;
use crate::domain::model::normalize_key;
use crate::domain::{ArchiveClient, ArchiveSession, Place, PlaceKind, StudyKey, StudyPayload};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

pub const DEFAULT_TIMEOUT_SECONDS: u64 = 300;

/// 沒有設定密碼時使用的環境變數
pub const PASSWORD_ENV_VAR: &str = "XNAT_PASS";

/// REST client for an XNAT server, basic auth on every request.
pub struct XnatClient {
    server: String,
    user: String,
    password: Option<String>,
    client: Client,
}

impl XnatClient {
    pub fn new(server: &str, user: &str, password: &str) -> Result<Self> {
        Self::with_timeout(
            server,
            user,
            Some(password.to_string()),
            DEFAULT_TIMEOUT_SECONDS,
        )
    }

    /// Without a password, `$XNAT_PASS` is read each time a request is made.
    pub fn with_timeout(
        server: &str,
        user: &str,
        password: Option<String>,
        timeout_seconds: u64,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_seconds))
            .build()?;
        Ok(Self {
            server: server.trim_end_matches('/').to_string(),
            user: user.to_string(),
            password,
            client,
        })
    }

    fn password(&self) -> Result<String> {
        if let Some(password) = &self.password {
            return Ok(password.clone());
        }
        std::env::var(PASSWORD_ENV_VAR).map_err(|_| SyncError::MissingConfigError {
            field: format!("password for {} (or ${})", self.server, PASSWORD_ENV_VAR),
        })
    }

    fn prearchive_url(&self, project: &str) -> String {
        format!("{}/data/prearchive/projects/{}", self.server, project)
    }
}

#[derive(Debug, Deserialize)]
struct PrearchiveResponse {
    #[serde(rename = "ResultSet")]
    result_set: PrearchiveResultSet,
}

#[derive(Debug, Deserialize)]
struct PrearchiveResultSet {
    #[serde(rename = "Result", default)]
    result: Vec<PrearchiveRow>,
}

#[derive(Debug, Deserialize)]
struct PrearchiveRow {
    #[serde(default)]
    subject: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    uploaded: Option<String>,
}

/// XNAT reports times like `2024-01-31 14:22:10.123`, without a zone.
fn parse_uploaded(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(with_zone) = DateTime::parse_from_rfc3339(raw) {
        return Some(with_zone.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

#[async_trait]
impl ArchiveClient for XnatClient {
    fn server(&self) -> &str {
        &self.server
    }

    async fn list_sessions(&self, project: &str) -> Result<Vec<ArchiveSession>> {
        let url = self.prearchive_url(project);
        tracing::debug!("Listing pre-archive sessions: {}", url);

        let response = self
            .client
            .get(&url)
            .basic_auth(&self.user, Some(self.password()?))
            .query(&[("format", "json")])
            .send()
            .await?
            .error_for_status()?;

        let body: PrearchiveResponse = response.json().await?;
        let sessions = body
            .result_set
            .result
            .into_iter()
            .filter(|row| {
                let complete = !row.subject.is_empty() && !row.name.is_empty();
                if !complete {
                    tracing::debug!("Ignoring unassigned pre-archive session {:?}", row);
                }
                complete
            })
            .map(|row| ArchiveSession {
                uploaded: row.uploaded.as_deref().and_then(parse_uploaded),
                subject: row.subject,
                label: row.name,
            })
            .collect();
        Ok(sessions)
    }

    async fn session_exists(&self, project: &str, subject: &str, label: &str) -> Result<bool> {
        let subject = normalize_key(subject);
        let label = normalize_key(label);
        Ok(self
            .list_sessions(project)
            .await?
            .iter()
            .any(|s| normalize_key(&s.subject) == subject && normalize_key(&s.label) == label))
    }

    async fn upload_session(
        &self,
        project: &str,
        subject: &str,
        label: &str,
        zip_bytes: Vec<u8>,
    ) -> Result<()> {
        let url = format!("{}/data/services/import", self.server);
        let destination = format!("/prearchive/projects/{}", project);
        tracing::debug!(
            "Uploading {} bytes to {} as {}/{}",
            zip_bytes.len(),
            url,
            subject,
            label
        );

        self.client
            .post(&url)
            .basic_auth(&self.user, Some(self.password()?))
            .query(&[
                ("import-handler", "DICOM-zip"),
                ("PROJECT_ID", project),
                ("SUBJECT_ID", subject),
                ("EXPERIMENT_LABEL", label),
                ("dest", destination.as_str()),
            ])
            .header(reqwest::header::CONTENT_TYPE, "application/zip")
            .body(zip_bytes)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// The pre-archive of one XNAT project. Write-only: studies can be sent here and
/// enumerated, but not read back out.
pub struct XnatPreArchive {
    client: Box<dyn ArchiveClient>,
    project: String,
}

impl XnatPreArchive {
    pub fn new(client: Box<dyn ArchiveClient>, project: impl Into<String>) -> Self {
        Self {
            client,
            project: project.into(),
        }
    }

    fn enumeration_error(&self, e: SyncError) -> SyncError {
        SyncError::Enumeration {
            place: self.description(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Place for XnatPreArchive {
    fn kind(&self) -> PlaceKind {
        PlaceKind::Xnat
    }

    fn description(&self) -> String {
        format!(
            "XNAT pre-archive of project '{}' at {}",
            self.project,
            self.client.server()
        )
    }

    async fn list_studies(&self) -> Result<Vec<StudyKey>> {
        let sessions = self
            .client
            .list_sessions(&self.project)
            .await
            .map_err(|e| self.enumeration_error(e))?;

        let mut keys: Vec<StudyKey> = Vec::with_capacity(sessions.len());
        for session in sessions {
            let key = StudyKey::new(&session.subject, &session.label);
            if !keys.contains(&key) {
                keys.push(key);
            }
        }
        Ok(keys)
    }

    async fn has_study(&self, key: &StudyKey) -> Result<bool> {
        self.client
            .session_exists(&self.project, key.patient(), key.study())
            .await
            .map_err(|e| self.enumeration_error(e))
    }

    async fn fetch_study(&self, _key: &StudyKey) -> Result<StudyPayload> {
        Err(SyncError::ReadNotSupported {
            kind: self.kind().to_string(),
        })
    }

    async fn accept_study(&self, key: &StudyKey, payload: StudyPayload) -> Result<()> {
        let bytes = archive::into_zip(payload)?;
        self.client
            .upload_session(&self.project, key.patient(), key.study(), bytes)
            .await
            .map_err(|e| SyncError::Transfer {
                study: key.to_string(),
                message: e.to_string(),
            })?;
        tracing::info!("Uploaded {} to {}", key, self.description());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::StudyFile;
    use httpmock::prelude::*;

    fn prearchive_body() -> serde_json::Value {
        serde_json::json!({
            "ResultSet": {
                "Result": [
                    {"subject": "Patient1", "name": "Study1", "uploaded": "2024-01-31 14:22:10.123"},
                    {"subject": "patient1", "name": "study1", "uploaded": "2024-02-01 09:00:00.000"},
                    {"subject": "patient2", "name": "study1", "uploaded": null},
                    {"subject": "", "name": "orphan"}
                ]
            }
        })
    }

    #[test]
    fn test_parse_uploaded_formats() {
        let parsed = parse_uploaded("2024-01-31 14:22:10.123").unwrap();
        assert_eq!(parsed.to_rfc3339(), "2024-01-31T14:22:10.123+00:00");
        assert!(parse_uploaded("2024-01-31T14:22:10Z").is_some());
        assert!(parse_uploaded("yesterday").is_none());
    }

    #[tokio::test]
    async fn test_list_sessions_and_studies() {
        let server = MockServer::start_async().await;
        let list_mock = server
            .mock_async(|when, then| {
                when.method(GET)
                    .path("/data/prearchive/projects/myproject")
                    .query_param("format", "json");
                then.status(200)
                    .header("Content-Type", "application/json")
                    .json_body(prearchive_body());
            })
            .await;

        let client = XnatClient::new(&server.base_url(), "user", "secret").unwrap();
        let sessions = client.list_sessions("myproject").await.unwrap();
        assert_eq!(sessions.len(), 3);
        assert!(sessions[0].uploaded.is_some());
        assert!(sessions[2].uploaded.is_none());

        let place = XnatPreArchive::new(Box::new(client), "myproject");
        let studies = place.list_studies().await.unwrap();
        assert_eq!(
            studies,
            vec![
                StudyKey::new("patient1", "study1"),
                StudyKey::new("patient2", "study1"),
            ]
        );
        assert!(place
            .has_study(&StudyKey::new("patient2", "study1"))
            .await
            .unwrap());
        assert!(!place
            .has_study(&StudyKey::new("patient3", "study1"))
            .await
            .unwrap());

        list_mock.assert_hits_async(4).await;
    }

    #[tokio::test]
    async fn test_server_error_is_enumeration_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/data/prearchive/projects/myproject");
                then.status(500);
            })
            .await;

        let client = XnatClient::new(&server.base_url(), "user", "secret").unwrap();
        let place = XnatPreArchive::new(Box::new(client), "myproject");

        let result = place.list_studies().await;
        assert!(matches!(result, Err(SyncError::Enumeration { .. })));
    }

    #[tokio::test]
    async fn test_upload_posts_zip_to_import_service() {
        let server = MockServer::start_async().await;
        let upload_mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/data/services/import")
                    .query_param("import-handler", "DICOM-zip")
                    .query_param("PROJECT_ID", "myproject")
                    .query_param("SUBJECT_ID", "patient1")
                    .query_param("EXPERIMENT_LABEL", "study2")
                    .query_param("dest", "/prearchive/projects/myproject")
                    .header("content-type", "application/zip");
                then.status(200).body("/prearchive/projects/myproject/123/study2");
            })
            .await;

        let client = XnatClient::new(&server.base_url(), "user", "secret").unwrap();
        let place = XnatPreArchive::new(Box::new(client), "myproject");
        let payload = StudyPayload::Files(vec![StudyFile {
            name: "1.dcm".to_string(),
            data: b"dicom".to_vec(),
        }]);

        place
            .accept_study(&StudyKey::new("patient1", "study2"), payload)
            .await
            .unwrap();
        upload_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_rejected_upload_is_transfer_error() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/data/services/import");
                then.status(403);
            })
            .await;

        let client = XnatClient::new(&server.base_url(), "user", "wrong").unwrap();
        let place = XnatPreArchive::new(Box::new(client), "myproject");
        let result = place
            .accept_study(&StudyKey::new("p", "s"), StudyPayload::Zip(vec![]))
            .await;
        assert!(matches!(result, Err(SyncError::Transfer { .. })));
    }

    #[tokio::test]
    async fn test_cannot_read_from_prearchive() {
        let client = XnatClient::new("http://localhost:1", "user", "secret").unwrap();
        let place = XnatPreArchive::new(Box::new(client), "myproject");
        let result = place.fetch_study(&StudyKey::new("p", "s")).await;
        assert!(matches!(result, Err(SyncError::ReadNotSupported { .. })));
    }
}
