use serde::{Deserialize, Serialize};
use std::fmt;

/// Separator between patient and study in a key, `patient/study`.
pub const STUDY_SEPARATOR: char = '/';
/// Separator between place and key in a URI, `place:patient/study`.
pub const PLACE_SEPARATOR: char = ':';

/// Identity of a study within one place. Both parts are stored lowercase so that
/// backends that capitalise folder or subject names differently still compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StudyKey {
    patient: String,
    study: String,
}

impl StudyKey {
    pub fn new(patient: &str, study: &str) -> Self {
        Self {
            patient: normalize_key(patient),
            study: normalize_key(study),
        }
    }

    pub fn patient(&self) -> &str {
        &self.patient
    }

    pub fn study(&self) -> &str {
        &self.study
    }

    /// The same key with both parts slugified. Folders and sessions are often named
    /// after the slug of the original description.
    pub fn to_slug(&self) -> Self {
        Self {
            patient: slugify(&self.patient),
            study: slugify(&self.study),
        }
    }

}

impl fmt::Display for StudyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.patient, STUDY_SEPARATOR, self.study)
    }
}

pub fn normalize_key(raw: &str) -> String {
    raw.trim().to_lowercase()
}

/// Lowercase, with every run of characters other than letters and digits turned into a
/// single `_`, e.g. `Study 1.2` becomes `study_1_2`.
pub fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    for c in raw.trim().to_lowercase().chars() {
        if c.is_alphanumeric() {
            slug.push(c);
        } else if !slug.is_empty() && !slug.ends_with('_') {
            slug.push('_');
        }
    }
    slug.trim_end_matches('_').to_string()
}

/// A study as found in a registered place. The place is referenced by its key only;
/// the study never holds on to the place itself.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImagingStudy {
    pub place_key: String,
    pub key: StudyKey,
}

impl ImagingStudy {
    pub fn new(place_key: impl Into<String>, key: StudyKey) -> Self {
        Self {
            place_key: place_key.into(),
            key,
        }
    }

    pub fn patient_key(&self) -> &str {
        self.key.patient()
    }

    pub fn study_key(&self) -> &str {
        self.key.study()
    }

    pub fn uri(&self) -> StudyUri {
        StudyUri {
            place_key: self.place_key.clone(),
            key: self.key.clone(),
        }
    }
}

impl fmt::Display for ImagingStudy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.uri())
    }
}

/// Fully qualified, wildcard-free reference `place:patient/study`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StudyUri {
    pub place_key: String,
    pub key: StudyKey,
}

impl StudyUri {
    pub fn parse(text: &str) -> Option<Self> {
        let (place, rest) = text.split_once(PLACE_SEPARATOR)?;
        let (patient, study) = rest.split_once(STUDY_SEPARATOR)?;
        let parts = [place, patient, study];
        if parts.iter().any(|p| p.is_empty() || p.contains(['*', ':', '/'])) {
            return None;
        }
        Some(Self {
            place_key: place.to_string(),
            key: StudyKey::new(patient, study),
        })
    }
}

impl StudyUri {
    pub fn to_slug(&self) -> Self {
        Self {
            place_key: self.place_key.clone(),
            key: self.key.to_slug(),
        }
    }
}

impl fmt::Display for StudyUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.place_key, PLACE_SEPARATOR, self.key)
    }
}

/// One file belonging to a study. The name is relative to the study folder and uses
/// `/` between folders, e.g. `series1/IM0001`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudyFile {
    pub name: String,
    pub data: Vec<u8>,
}

/// Study contents in the shape the source place keeps them. Destinations convert
/// from whichever shape they are handed into their own storage format.
#[derive(Debug, Clone)]
pub enum StudyPayload {
    Files(Vec<StudyFile>),
    Zip(Vec<u8>),
}

impl StudyPayload {
    pub fn size_bytes(&self) -> usize {
        match self {
            StudyPayload::Files(files) => files.iter().map(|f| f.data.len()).sum(),
            StudyPayload::Zip(bytes) => bytes.len(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceKind {
    Folder,
    Zip,
    Xnat,
}

impl fmt::Display for PlaceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PlaceKind::Folder => "folder",
            PlaceKind::Zip => "zip",
            PlaceKind::Xnat => "xnat",
        };
        f.write_str(name)
    }
}
