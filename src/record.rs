use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Outcome of assembling one profile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RecordStatus {
    /// Page fetched and a name was found
    #[default]
    Complete,
    /// Page fetched but structurally incomplete (no body text or no name)
    Partial,
    /// Page could not be fetched; the record only carries provenance
    Failed,
}

impl RecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One lawyer as extracted from a directory profile
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LawyerRecord {
    /// Given name, possibly empty
    pub given_name: String,
    /// Family name with particles and hyphenation preserved
    pub family_name: String,
    /// Name string exactly as the page yielded it
    pub full_name_raw: String,
    /// Year of the oath, within [1950, current year]
    pub oath_year: Option<i32>,
    /// Full oath date as DD/MM/YYYY when the page gives one
    pub oath_date: Option<String>,
    /// Legal domains in first-seen order, without duplicates
    pub specializations: Vec<String>,
    /// Firm or cabinet name
    pub structure: String,
    pub street_address: String,
    pub postal_code: String,
    pub city: String,
    pub phone: String,
    pub fax: String,
    pub email: String,
    /// Page the record was extracted from; primary identity key
    pub profile_url: String,
    pub extraction_timestamp: DateTime<Utc>,
    /// Tag of the site descriptor
    pub site: String,
    pub status: RecordStatus,
    /// Set when the name parser could not split the name
    pub name_ambiguous: bool,
    /// Merge alternatives and validation notes
    pub notes: Vec<String>,
}

impl LawyerRecord {
    /// Empty record carrying only provenance
    pub fn new(profile_url: impl Into<String>, site: impl Into<String>) -> Self {
        Self {
            given_name: String::new(),
            family_name: String::new(),
            full_name_raw: String::new(),
            oath_year: None,
            oath_date: None,
            specializations: Vec::new(),
            structure: String::new(),
            street_address: String::new(),
            postal_code: String::new(),
            city: String::new(),
            phone: String::new(),
            fax: String::new(),
            email: String::new(),
            profile_url: profile_url.into(),
            extraction_timestamp: Utc::now(),
            site: site.into(),
            status: RecordStatus::Complete,
            name_ambiguous: false,
            notes: Vec::new(),
        }
    }

    /// Display name, given name first
    pub fn display_name(&self) -> String {
        match (self.given_name.is_empty(), self.family_name.is_empty()) {
            (false, false) => format!("{} {}", self.given_name, self.family_name),
            (true, false) => self.family_name.clone(),
            (false, true) => self.given_name.clone(),
            (true, true) => self.full_name_raw.clone(),
        }
    }

    pub fn has_address(&self) -> bool {
        !self.postal_code.is_empty() || !self.street_address.is_empty()
    }

    /// Compact signature of populated fields, one letter per field
    ///
    /// `N` name, `E` email, `T` phone, `F` fax, `A` address, `Y` oath year,
    /// `S` specializations, `C` structure; a `-` marks a missing field.
    pub fn signature(&self) -> String {
        let flags = [
            ('N', !self.family_name.is_empty()),
            ('E', !self.email.is_empty()),
            ('T', !self.phone.is_empty()),
            ('F', !self.fax.is_empty()),
            ('A', self.has_address()),
            ('Y', self.oath_year.is_some()),
            ('S', !self.specializations.is_empty()),
            ('C', !self.structure.is_empty()),
        ];
        flags
            .iter()
            .map(|(c, set)| if *set { *c } else { '-' })
            .collect()
    }
}

/// A profile that produced no usable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedProfile {
    pub profile_url: String,
    pub reason: String,
}
