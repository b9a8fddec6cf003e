use crate::domain::model::{normalize_key, PLACE_SEPARATOR, STUDY_SEPARATOR};
use crate::utils::error::{Result, SyncError};
use regex::{Regex, RegexBuilder};
use std::fmt;
use std::sync::OnceLock;

const WILDCARD: char = '*';

/// `<place>:<patient>[/<study>]`, each segment free of `:` and `/`.
fn query_format() -> &'static Regex {
    static FORMAT: OnceLock<Regex> = OnceLock::new();
    FORMAT.get_or_init(|| {
        Regex::new(r"^([^:/]+):([^:/]+)(?:/([^:/]*))?$").expect("query format regex is valid")
    })
}

/// A glob segment where `*` matches any run of characters, including none.
/// Every other character is literal.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    raw: String,
    compiled: Regex,
}

impl GlobPattern {
    pub fn new(raw: &str, case_insensitive: bool) -> Result<Self> {
        let body = raw
            .split(WILDCARD)
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join(".*");
        let compiled = RegexBuilder::new(&format!("^{}$", body))
            .case_insensitive(case_insensitive)
            .dot_matches_new_line(true)
            .build()
            .map_err(|e| SyncError::MalformedQuery {
                query: raw.to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self {
            raw: raw.to_string(),
            compiled,
        })
    }

    pub fn is_match(&self, candidate: &str) -> bool {
        self.compiled.is_match(candidate)
    }

    pub fn has_wildcard(&self) -> bool {
        self.raw.contains(WILDCARD)
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

/// Parsed `<place>:<patient>[/<study>]` pattern. Immutable once parsed.
///
/// Place keys are compared case-sensitively, the same way places are registered.
/// Patient and study are compared on their normalized (lowercase) form.
#[derive(Debug, Clone)]
pub struct StudyQuery {
    place: GlobPattern,
    patient: GlobPattern,
    study: GlobPattern,
}

impl StudyQuery {
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let caps = query_format()
            .captures(text)
            .ok_or_else(|| SyncError::MalformedQuery {
                query: text.to_string(),
                reason: "expected '<place>:<patient>/<study>', '*' may be used as a wildcard"
                    .to_string(),
            })?;

        let study = caps
            .get(3)
            .map(|m| m.as_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("*");

        Ok(Self {
            place: GlobPattern::new(&caps[1], false)?,
            patient: GlobPattern::new(&normalize_key(&caps[2]), true)?,
            study: GlobPattern::new(&normalize_key(study), true)?,
        })
    }

    pub fn matches(&self, place_key: &str, patient_key: &str, study_key: &str) -> bool {
        self.matches_place(place_key)
            && self.patient.is_match(&normalize_key(patient_key))
            && self.study.is_match(&normalize_key(study_key))
    }

    pub fn matches_place(&self, place_key: &str) -> bool {
        self.place.is_match(place_key)
    }

    /// No wildcard anywhere: the query names at most one study.
    pub fn is_exact(&self) -> bool {
        !(self.place.has_wildcard() || self.patient.has_wildcard() || self.study.has_wildcard())
    }

    pub fn place_pattern(&self) -> &str {
        self.place.as_str()
    }

    pub fn patient_pattern(&self) -> &str {
        self.patient.as_str()
    }

    pub fn study_pattern(&self) -> &str {
        self.study.as_str()
    }
}

impl fmt::Display for StudyQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}{}{}{}{}",
            self.place_pattern(),
            PLACE_SEPARATOR,
            self.patient_pattern(),
            STUDY_SEPARATOR,
            self.study_pattern()
        )
    }
}
