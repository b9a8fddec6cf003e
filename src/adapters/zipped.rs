//! Directory tree with one archive per study, `root/<patient>/<study>.zip`.

use crate::adapters::archive;
use crate::adapters::folder::{visible_dirs, visible_files};
use crate::domain::model::normalize_key;
use crate::domain::{Place, PlaceKind, StudyKey, StudyPayload};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const ZIP_EXTENSION: &str = "zip";

#[derive(Debug, Clone)]
pub struct ZippedDicomRootFolder {
    root: PathBuf,
}

impl ZippedDicomRootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn archives(&self) -> io::Result<Vec<(StudyKey, PathBuf)>> {
        let mut studies: Vec<(StudyKey, PathBuf)> = Vec::new();
        for (patient_name, patient_dir) in visible_dirs(&self.root)? {
            for (file_name, path) in visible_files(&patient_dir)? {
                let file = Path::new(&file_name);
                let is_zip = file
                    .extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e.eq_ignore_ascii_case(ZIP_EXTENSION));
                let Some(stem) = file.file_stem().and_then(|s| s.to_str()) else {
                    continue;
                };
                if is_zip {
                    studies.push((StudyKey::new(&patient_name, stem), path));
                }
            }
        }
        studies.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        studies.dedup_by(|later, earlier| later.0 == earlier.0);
        Ok(studies)
    }

    fn locate(&self, key: &StudyKey) -> io::Result<Option<PathBuf>> {
        Ok(self
            .archives()?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, path)| path))
    }

    fn archive_path(&self, key: &StudyKey) -> io::Result<PathBuf> {
        let patient_dir = visible_dirs(&self.root)?
            .into_iter()
            .find(|(name, _)| normalize_key(name) == key.patient())
            .map(|(_, path)| path)
            .unwrap_or_else(|| self.root.join(key.patient()));
        Ok(patient_dir.join(format!("{}.{}", key.study(), ZIP_EXTENSION)))
    }

    fn enumeration_error(&self, e: io::Error) -> SyncError {
        SyncError::Enumeration {
            place: self.description(),
            message: e.to_string(),
        }
    }
}

#[async_trait]
impl Place for ZippedDicomRootFolder {
    fn kind(&self) -> PlaceKind {
        PlaceKind::Zip
    }

    fn description(&self) -> String {
        format!("Zipped DICOM root folder at '{}'", self.root.display())
    }

    async fn list_studies(&self) -> Result<Vec<StudyKey>> {
        let studies = self.archives().map_err(|e| self.enumeration_error(e))?;
        Ok(studies.into_iter().map(|(key, _)| key).collect())
    }

    async fn has_study(&self, key: &StudyKey) -> Result<bool> {
        Ok(self
            .locate(key)
            .map_err(|e| self.enumeration_error(e))?
            .is_some())
    }

    async fn fetch_study(&self, key: &StudyKey) -> Result<StudyPayload> {
        let path = self
            .locate(key)
            .map_err(|e| self.enumeration_error(e))?
            .ok_or_else(|| SyncError::StudyNotFound {
                study: key.to_string(),
            })?;
        Ok(StudyPayload::Zip(fs::read(path)?))
    }

    async fn accept_study(&self, key: &StudyKey, payload: StudyPayload) -> Result<()> {
        if let Some(existing) = self.locate(key)? {
            return Err(SyncError::StudyAlreadyExists {
                study: format!("{} at {}", key, existing.display()),
            });
        }

        let bytes = archive::into_zip(payload)?;
        let target = self.archive_path(key)?;
        let Some(patient_dir) = target.parent() else {
            return Err(SyncError::ConfigError {
                message: format!("No parent directory for {}", target.display()),
            });
        };
        fs::create_dir_all(patient_dir)?;

        // written under a hidden name first; the rename is what makes it visible
        let staging = patient_dir.join(format!(".{}.{}.partial", key.study(), ZIP_EXTENSION));
        let written = fs::write(&staging, &bytes).and_then(|_| fs::rename(&staging, &target));
        if let Err(e) = written {
            if staging.exists() {
                if let Err(cleanup) = fs::remove_file(&staging) {
                    tracing::warn!("Could not remove {}: {}", staging.display(), cleanup);
                }
            }
            return Err(e.into());
        }

        tracing::info!("Created zip archive {} ({} bytes)", target.display(), bytes.len());
        Ok(())
    }
}
