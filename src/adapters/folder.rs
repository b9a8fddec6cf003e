//! Plain directory tree of studies:
//!
//! ```text
//! root/
//!     patient1/
//!         study1/   <- every file in here, subfolders included, belongs to the study
//!         study2/
//!     patient2/
//!         study1/
//! ```

use crate::adapters::archive;
use crate::domain::model::normalize_key;
use crate::domain::{Place, PlaceKind, StudyFile, StudyKey, StudyPayload};
use crate::utils::error::{Result, SyncError};
use async_trait::async_trait;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use walkdir::{DirEntry, WalkDir};

/// Suffix for a study folder that is still being written.
const PARTIAL_SUFFIX: &str = ".partial";

#[derive(Debug, Clone)]
pub struct DicomRootFolder {
    root: PathBuf,
}

impl DicomRootFolder {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// All study directories with their keys, sorted by key. When two directories
    /// normalize to the same key only the first is kept.
    fn study_dirs(&self) -> io::Result<Vec<(StudyKey, PathBuf)>> {
        let mut studies: Vec<(StudyKey, PathBuf)> = Vec::new();
        for (patient_name, patient_dir) in visible_dirs(&self.root)? {
            for (study_name, study_dir) in visible_dirs(&patient_dir)? {
                studies.push((StudyKey::new(&patient_name, &study_name), study_dir));
            }
        }
        studies.sort_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(&b.1)));
        studies.dedup_by(|later, earlier| later.0 == earlier.0);
        Ok(studies)
    }

    fn locate(&self, key: &StudyKey) -> io::Result<Option<PathBuf>> {
        Ok(self
            .study_dirs()?
            .into_iter()
            .find(|(k, _)| k == key)
            .map(|(_, path)| path))
    }

    /// Existing patient directory for `patient`, or where a new one would go.
    fn patient_dir(&self, patient: &str) -> io::Result<PathBuf> {
        let existing = visible_dirs(&self.root)?
            .into_iter()
            .find(|(name, _)| normalize_key(name) == patient)
            .map(|(_, path)| path);
        Ok(existing.unwrap_or_else(|| self.root.join(patient)))
    }

    fn enumeration_error(&self, e: io::Error) -> SyncError {
        SyncError::Enumeration {
            place: self.description(),
            message: e.to_string(),
        }
    }

    /// Stage the files next to the final location, then move them into place in one rename.
    fn write_study(
        &self,
        key: &StudyKey,
        existing: Option<PathBuf>,
        files: &[StudyFile],
    ) -> Result<()> {
        let patient_dir = match existing.as_deref().and_then(Path::parent) {
            Some(parent) => parent.to_path_buf(),
            None => self.patient_dir(key.patient())?,
        };
        let target = existing.unwrap_or_else(|| patient_dir.join(key.study()));
        let staging = patient_dir.join(format!(".{}{}", key.study(), PARTIAL_SUFFIX));

        if staging.exists() {
            fs::remove_dir_all(&staging)?;
        }
        fs::create_dir_all(&staging)?;

        let written = write_files(&staging, files).and_then(|count| {
            // an empty leftover directory is replaced, anything else was refused earlier
            if target.exists() {
                fs::remove_dir(&target)?;
            }
            fs::rename(&staging, &target)?;
            Ok(count)
        });

        match written {
            Ok(count) => {
                tracing::debug!("Copied {} files to {}", count, target.display());
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = fs::remove_dir_all(&staging) {
                    tracing::warn!(
                        "Could not remove partial study {}: {}",
                        staging.display(),
                        cleanup
                    );
                }
                Err(e.into())
            }
        }
    }
}

#[async_trait]
impl Place for DicomRootFolder {
    fn kind(&self) -> PlaceKind {
        PlaceKind::Folder
    }

    fn description(&self) -> String {
        format!("Root folder at '{}'", self.root.display())
    }

    async fn list_studies(&self) -> Result<Vec<StudyKey>> {
        let studies = self
            .study_dirs()
            .map_err(|e| self.enumeration_error(e))?;
        Ok(studies.into_iter().map(|(key, _)| key).collect())
    }

    async fn has_study(&self, key: &StudyKey) -> Result<bool> {
        Ok(self
            .locate(key)
            .map_err(|e| self.enumeration_error(e))?
            .is_some())
    }

    async fn fetch_study(&self, key: &StudyKey) -> Result<StudyPayload> {
        let dir = self
            .locate(key)
            .map_err(|e| self.enumeration_error(e))?
            .ok_or_else(|| SyncError::StudyNotFound {
                study: key.to_string(),
            })?;

        Ok(StudyPayload::Files(study_files(&dir)?))
    }

    async fn accept_study(&self, key: &StudyKey, payload: StudyPayload) -> Result<()> {
        let existing = self.locate(key)?;
        if let Some(dir) = &existing {
            if fs::read_dir(dir)?.next().is_some() {
                return Err(SyncError::StudyAlreadyExists {
                    study: format!("{} at {}", key, dir.display()),
                });
            }
        }

        let files = archive::into_files(payload)?;
        self.write_study(key, existing, &files)
    }
}

fn write_files(dir: &Path, files: &[StudyFile]) -> io::Result<usize> {
    for file in files {
        let target = dir.join(safe_relative_path(&file.name)?);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(target, &file.data)?;
    }
    Ok(files.len())
}

/// `name` as a path that stays inside the study folder.
fn safe_relative_path(name: &str) -> io::Result<PathBuf> {
    let path = Path::new(name);
    let inside = path.components().count() > 0
        && path.components().all(|c| matches!(c, Component::Normal(_)));
    if !inside {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("Invalid file name '{}'", name),
        ));
    }
    Ok(path.to_path_buf())
}

/// Every file below a study folder, dot-files and subfolders included, sorted by path.
fn study_files(dir: &Path) -> io::Result<Vec<StudyFile>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .follow_links(true)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry
            .path()
            .strip_prefix(dir)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        files.push(StudyFile {
            name: archive::relative_name(relative),
            data: fs::read(entry.path())?,
        });
    }
    Ok(files)
}

fn is_hidden(entry: &DirEntry) -> bool {
    entry.file_name().to_string_lossy().starts_with('.')
}

/// Non-hidden direct children of `dir` passing `keep`, sorted by name. A missing
/// directory is treated as empty so that a place can be configured before it is first
/// written to.
fn visible_entries(dir: &Path, keep: fn(&fs::FileType) -> bool) -> io::Result<Vec<(String, PathBuf)>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let walker = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        // the root itself may live under a hidden folder
        .filter_entry(|e| e.depth() == 0 || !is_hidden(e));

    let mut entries = Vec::new();
    for entry in walker {
        let entry = entry?;
        if keep(&entry.file_type()) {
            let name = entry.file_name().to_string_lossy().into_owned();
            entries.push((name, entry.into_path()));
        }
    }
    Ok(entries)
}

pub(crate) fn visible_dirs(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    visible_entries(dir, fs::FileType::is_dir)
}

pub(crate) fn visible_files(dir: &Path) -> io::Result<Vec<(String, PathBuf)>> {
    visible_entries(dir, fs::FileType::is_file)
}
