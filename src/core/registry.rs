use crate::domain::query::GlobPattern;
use crate::domain::{ImagingStudy, Place, StudyQuery};
use crate::utils::error::{Result, SyncError};

/// Named places, kept in registration order.
#[derive(Default)]
pub struct Domain {
    places: Vec<(String, Box<dyn Place>)>,
}

impl Domain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, key: impl Into<String>, place: Box<dyn Place>) -> Result<()> {
        let key = key.into();
        if self.contains(&key) {
            return Err(SyncError::DuplicateKey { key });
        }
        tracing::debug!("Registered place '{}': {}", key, place.description());
        self.places.push((key, place));
        Ok(())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.places.iter().any(|(k, _)| k == key)
    }

    pub fn get(&self, key: &str) -> Result<&dyn Place> {
        self.places
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, place)| place.as_ref())
            .ok_or_else(|| SyncError::UnknownPlace {
                key: key.to_string(),
            })
    }

    pub fn keys(&self) -> Vec<&str> {
        self.places.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn list_places(&self) -> impl Iterator<Item = (&str, &dyn Place)> {
        self.places.iter().map(|(k, p)| (k.as_str(), p.as_ref()))
    }

    /// Places whose key matches a glob pattern such as `zip*`.
    pub fn query_places(&self, pattern: &str) -> Result<Vec<(&str, &dyn Place)>> {
        let pattern = GlobPattern::new(pattern, false)?;
        Ok(self
            .list_places()
            .filter(|(key, _)| pattern.is_match(key))
            .collect())
    }

    /// Every study matching `query`, place by place in registration order and in each
    /// place's own enumeration order.
    ///
    /// Zero matches is an empty result. A place pattern without wildcards that names no
    /// registered place is `UnknownPlace`. If any matching place fails to enumerate, the
    /// whole resolution fails and nothing from the other places is returned.
    pub async fn resolve(&self, query: &StudyQuery) -> Result<Vec<ImagingStudy>> {
        let places: Vec<_> = self
            .list_places()
            .filter(|(key, _)| query.matches_place(key))
            .collect();

        if places.is_empty() && !query.place_pattern().contains('*') {
            return Err(SyncError::UnknownPlace {
                key: query.place_pattern().to_string(),
            });
        }

        let mut studies = Vec::new();
        for (key, place) in places {
            let found = place.list_studies().await?;
            tracing::debug!("{} studies in '{}'", found.len(), key);
            studies.extend(
                found
                    .into_iter()
                    .filter(|study| query.matches(key, study.patient(), study.study()))
                    .map(|study| ImagingStudy::new(key, study)),
            );
        }
        Ok(studies)
    }
}
