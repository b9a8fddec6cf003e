use crate::domain::{StudyFile, StudyPayload};
use crate::utils::error::Result;
use std::io::{Cursor, Read, Write};
use std::path::{Component, Path};
use zip::write::SimpleFileOptions;
use zip::{ZipArchive, ZipWriter};

/// Pack loose files into an in-memory zip archive, one entry per file under its relative name.
pub fn zip_files(files: &[StudyFile]) -> Result<Vec<u8>> {
    let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
    for file in files {
        zip.start_file(file.name.as_str(), SimpleFileOptions::default())?;
        zip.write_all(&file.data)?;
    }
    let cursor = zip.finish()?;
    Ok(cursor.into_inner())
}

/// Unpack every regular file of an archive, keeping its path relative to the archive
/// root (`series1/IM0001`). Entries whose names would escape the target are rejected
/// by the zip crate and skipped here.
pub fn unzip_files(bytes: &[u8]) -> Result<Vec<StudyFile>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))?;
    let mut files = Vec::with_capacity(archive.len());

    for index in 0..archive.len() {
        let mut entry = archive.by_index(index)?;
        if entry.is_dir() {
            continue;
        }
        let name = match entry.enclosed_name().as_deref().map(relative_name) {
            Some(name) if !name.is_empty() => name,
            _ => {
                tracing::warn!("Skipping archive entry with unsafe name '{}'", entry.name());
                continue;
            }
        };

        let mut data = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut data)?;
        files.push(StudyFile { name, data });
    }

    Ok(files)
}

/// `/` separated form of a relative path, the way names are kept in `StudyFile`.
pub fn relative_name(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Normalize any payload to loose files.
pub fn into_files(payload: StudyPayload) -> Result<Vec<StudyFile>> {
    match payload {
        StudyPayload::Files(files) => Ok(files),
        StudyPayload::Zip(bytes) => unzip_files(&bytes),
    }
}

/// Normalize any payload to a single zip archive.
pub fn into_zip(payload: StudyPayload) -> Result<Vec<u8>> {
    match payload {
        StudyPayload::Files(files) => zip_files(&files),
        StudyPayload::Zip(bytes) => Ok(bytes),
    }
}
