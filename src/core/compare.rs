use crate::core::registry::Domain;
use crate::domain::{ImagingStudy, StudyKey, StudyQuery};
use crate::utils::error::Result;
use std::collections::HashSet;

/// Which studies two query results have in common, matched on study key only.
#[derive(Debug, Clone, Default)]
pub struct Overlap {
    pub only_in_a: Vec<ImagingStudy>,
    pub in_both: Vec<StudyKey>,
    pub only_in_b: Vec<ImagingStudy>,
}

pub fn find_overlap(a: &[ImagingStudy], b: &[ImagingStudy]) -> Overlap {
    let keys_a: HashSet<&StudyKey> = a.iter().map(|s| &s.key).collect();
    let keys_b: HashSet<&StudyKey> = b.iter().map(|s| &s.key).collect();

    let mut overlap = Overlap::default();
    let mut seen: HashSet<&StudyKey> = HashSet::new();
    for study in a {
        if !seen.insert(&study.key) {
            continue;
        }
        if keys_b.contains(&study.key) {
            overlap.in_both.push(study.key.clone());
        } else {
            overlap.only_in_a.push(study.clone());
        }
    }

    let mut seen_b: HashSet<&StudyKey> = HashSet::new();
    overlap.only_in_b = b
        .iter()
        .filter(|s| !keys_a.contains(&s.key) && seen_b.insert(&s.key))
        .cloned()
        .collect();
    overlap
}

pub async fn compare(domain: &Domain, a: &StudyQuery, b: &StudyQuery) -> Result<Overlap> {
    let studies_a = domain.resolve(a).await?;
    let studies_b = domain.resolve(b).await?;
    tracing::debug!(
        "Comparing {} studies from '{}' with {} from '{}'",
        studies_a.len(),
        a,
        studies_b.len(),
        b
    );
    Ok(find_overlap(&studies_a, &studies_b))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn study(place: &str, patient: &str, study: &str) -> ImagingStudy {
        ImagingStudy::new(place, StudyKey::new(patient, study))
    }

    #[test]
    fn test_find_overlap() {
        let a = vec![study("a", "p1", "s1"), study("a", "p1", "s2"), study("a", "p2", "s1")];
        let b = vec![study("b", "P1", "S2"), study("b", "p3", "s1")];

        let overlap = find_overlap(&a, &b);

        let only_a: Vec<String> = overlap.only_in_a.iter().map(|s| s.to_string()).collect();
        assert_eq!(only_a, vec!["a:p1/s1", "a:p2/s1"]);
        assert_eq!(overlap.in_both, vec![StudyKey::new("p1", "s2")]);
        let only_b: Vec<String> = overlap.only_in_b.iter().map(|s| s.to_string()).collect();
        assert_eq!(only_b, vec!["b:p3/s1"]);
    }

    #[test]
    fn test_overlap_of_empty_sets() {
        let overlap = find_overlap(&[], &[study("b", "p", "s")]);
        assert!(overlap.only_in_a.is_empty());
        assert!(overlap.in_both.is_empty());
        assert_eq!(overlap.only_in_b.len(), 1);
    }
}
