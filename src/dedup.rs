//! Collapse records reached through several discovery paths.

use log::debug;
use std::collections::HashMap;

use crate::extract::page::fold_accents;
use crate::record::LawyerRecord;

/// What happened to a pushed record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupOutcome {
    Inserted,
    /// Merged into the record at this position
    Merged(usize),
}

/// Keeps one canonical record per lawyer, in first-encounter order
#[derive(Debug, Default)]
pub struct Deduplicator {
    records: Vec<LawyerRecord>,
    by_url: HashMap<String, usize>,
    by_email: HashMap<String, usize>,
    by_name: HashMap<(String, String), usize>,
}

impl Deduplicator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[LawyerRecord] {
        &self.records
    }

    /// Add a record, merging it into an existing one with the same identity
    ///
    /// Identity is tried in order: profile URL, email, then normalized
    /// (family, given) when the family name is known.
    pub fn push(&mut self, record: LawyerRecord) -> DedupOutcome {
        match self.find(&record) {
            Some(index) => {
                debug!(
                    "Merging {} into {}",
                    record.profile_url, self.records[index].profile_url
                );
                merge(&mut self.records[index], record);
                self.index(index);
                DedupOutcome::Merged(index)
            }
            None => {
                self.records.push(record);
                let index = self.records.len() - 1;
                self.index(index);
                DedupOutcome::Inserted
            }
        }
    }

    pub fn into_records(self) -> Vec<LawyerRecord> {
        self.records
    }

    fn find(&self, record: &LawyerRecord) -> Option<usize> {
        self.by_url
            .get(&record.profile_url)
            .or_else(|| email_key(record).and_then(|key| self.by_email.get(&key)))
            .or_else(|| name_key(record).and_then(|key| self.by_name.get(&key)))
            .copied()
    }

    fn index(&mut self, index: usize) {
        let record = &self.records[index];
        self.by_url.entry(record.profile_url.clone()).or_insert(index);
        if let Some(key) = email_key(record) {
            self.by_email.entry(key).or_insert(index);
        }
        if let Some(key) = name_key(record) {
            self.by_name.entry(key).or_insert(index);
        }
    }
}

fn email_key(record: &LawyerRecord) -> Option<String> {
    let email = record.email.trim().to_lowercase();
    (!email.is_empty()).then_some(email)
}

fn name_key(record: &LawyerRecord) -> Option<(String, String)> {
    let family = normalize_name(&record.family_name);
    if family.is_empty() {
        return None;
    }
    Some((family, normalize_name(&record.given_name)))
}

/// Lower-case letters only, accents folded
fn normalize_name(name: &str) -> String {
    fold_accents(name)
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Fill the gaps of `kept` from `other`; differing values go to the notes
fn merge(kept: &mut LawyerRecord, other: LawyerRecord) {
    let mut notes = Vec::new();

    {
        let mut text = |field: &str, target: &mut String, value: String| {
            if value.is_empty() {
                return;
            }
            if target.is_empty() {
                *target = value;
            } else if !target.eq_ignore_ascii_case(&value) {
                notes.push(format!("{}: {}", field, value));
            }
        };

        text("given_name", &mut kept.given_name, other.given_name);
        text("family_name", &mut kept.family_name, other.family_name);
        text("full_name_raw", &mut kept.full_name_raw, other.full_name_raw);
        text("structure", &mut kept.structure, other.structure);
        text("street_address", &mut kept.street_address, other.street_address);
        text("postal_code", &mut kept.postal_code, other.postal_code);
        text("city", &mut kept.city, other.city);
        text("phone", &mut kept.phone, other.phone);
        text("fax", &mut kept.fax, other.fax);
        text("email", &mut kept.email, other.email);
        text("profile_url", &mut kept.profile_url, other.profile_url);
    }

    match (kept.oath_year, other.oath_year) {
        (None, Some(year)) => {
            kept.oath_year = Some(year);
            kept.oath_date = other.oath_date;
        }
        (Some(a), Some(b)) if a != b => notes.push(format!("oath_year: {}", b)),
        (Some(_), Some(_)) if kept.oath_date.is_none() => kept.oath_date = other.oath_date,
        _ => {}
    }

    if kept.specializations.is_empty() {
        kept.specializations = other.specializations;
    } else {
        for specialization in other.specializations {
            let known = kept
                .specializations
                .iter()
                .any(|s| s.to_lowercase() == specialization.to_lowercase());
            if !known {
                notes.push(format!("specializations: {}", specialization));
            }
        }
    }

    if kept.name_ambiguous && !kept.family_name.is_empty() && !other.name_ambiguous {
        kept.name_ambiguous = false;
    }
    kept.notes.extend(notes);
    kept.notes.extend(other.notes);
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use pretty_assertions::assert_eq;

    fn record(url: &str, family: &str, given: &str, email: &str) -> LawyerRecord {
        let mut record = LawyerRecord::new(url, "test");
        record.family_name = family.to_string();
        record.given_name = given.to_string();
        record.email = email.to_string();
        record
    }

    #[test]
    fn test_same_url_keeps_first_timestamp() {
        let mut dedup = Deduplicator::new();
        let first = record("https://b.example/avocat/1", "DUPONT", "Jean", "");
        let first_seen = first.extraction_timestamp;
        let mut second = record("https://b.example/avocat/1", "DUPONT", "Jean", "j@dupont.fr");
        second.extraction_timestamp = Utc::now() + Duration::seconds(30);

        assert_eq!(dedup.push(first), DedupOutcome::Inserted);
        assert_eq!(dedup.push(second), DedupOutcome::Merged(0));

        let records = dedup.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].extraction_timestamp, first_seen);
        assert_eq!(records[0].email, "j@dupont.fr");
    }

    #[test]
    fn test_same_email_different_urls() {
        let mut dedup = Deduplicator::new();
        dedup.push(record("https://b.example/a/1", "DUPONT", "Jean", "J@Dupont.fr"));
        let outcome = dedup.push(record("https://b.example/b/7", "DUPONT", "Jean", "J@DUPONT.FR"));

        assert_eq!(outcome, DedupOutcome::Merged(0));
        let records = dedup.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].notes, vec!["profile_url: https://b.example/b/7"]);
    }

    #[test]
    fn test_same_name_with_accents_and_conflicting_phone() {
        let mut dedup = Deduplicator::new();
        let mut a = record("https://b.example/1", "LEFÈVRE", "Hélène", "");
        a.phone = "03.21.00.00.01".to_string();
        let mut b = record("https://b.example/2", "LEFEVRE", "Helene", "");
        b.phone = "03.21.00.00.02".to_string();
        b.city = "ARRAS".to_string();

        dedup.push(a);
        dedup.push(b);
        let records = dedup.into_records();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].phone, "03.21.00.00.01");
        assert_eq!(records[0].city, "ARRAS");
        assert!(records[0].notes.contains(&"phone: 03.21.00.00.02".to_string()));
    }

    #[test]
    fn test_empty_family_never_matches_by_name() {
        let mut dedup = Deduplicator::new();
        dedup.push(record("https://b.example/1", "", "", ""));
        dedup.push(record("https://b.example/2", "", "", ""));
        assert_eq!(dedup.len(), 2);
    }

    #[test]
    fn test_merge_refreshes_indices() {
        let mut dedup = Deduplicator::new();
        dedup.push(record("https://b.example/1", "DUPONT", "Jean", ""));
        // second path brings the email
        dedup.push(record("https://b.example/2", "DUPONT", "Jean", "j@dupont.fr"));
        // third path is only linked through that email
        let outcome = dedup.push(record("https://b.example/3", "", "", "j@dupont.fr"));

        assert_eq!(outcome, DedupOutcome::Merged(0));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_order_is_first_encounter() {
        let mut dedup = Deduplicator::new();
        dedup.push(record("https://b.example/1", "B", "x", ""));
        dedup.push(record("https://b.example/2", "A", "y", ""));
        dedup.push(record("https://b.example/1", "B", "x", ""));
        let families: Vec<_> = dedup.into_records().into_iter().map(|r| r.family_name).collect();
        assert_eq!(families, vec!["B", "A"]);
    }
}
