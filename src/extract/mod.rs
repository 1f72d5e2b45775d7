//! Field extractors.
//!
//! Every extractor is a pure function of a parsed [`ProfilePage`] and the
//! site's [`ExtractionRules`]; none of them performs I/O, and the order in
//! which they run does not matter.

pub mod address;
pub mod email;
pub mod oath;
pub mod page;
pub mod phone;
pub mod specialization;
pub mod structure;

pub use address::{extract_address, Address};
pub use email::extract_email;
pub use oath::{extract_oath, OathInfo};
pub use page::ProfilePage;
pub use phone::{extract_fax, extract_phone};
pub use specialization::extract_specializations;
pub use structure::extract_structure;

use chrono::{Datelike, Local};
use scraper::Selector;

use crate::config::SiteDescriptor;
use crate::error::Result;
use page::{collapse_whitespace, selector};

/// Default cap on the number of specializations kept per lawyer
pub const DEFAULT_MAX_SPECIALIZATIONS: usize = 10;

/// Earliest plausible oath year
pub const MIN_OATH_YEAR: i32 = 1950;

/// Site-specific parameters shared by all extractors
#[derive(Debug, Clone)]
pub struct ExtractionRules {
    /// Upper bound for oath years
    pub current_year: i32,
    /// Phone numbers to ignore, as ten national digits
    pub phone_denylist: Vec<String>,
    /// Addresses to ignore, lower-cased; entries starting with `@` match a domain
    pub email_denylist: Vec<String>,
    /// Separator used when rendering phone numbers
    pub phone_separator: String,
    pub max_specializations: usize,
    /// Region holding the profile; the visible text is taken from it
    pub container: Option<Selector>,
    pub name_selector: Option<Selector>,
    pub specialization_selector: Option<Selector>,
    pub structure_selector: Option<Selector>,
}

impl Default for ExtractionRules {
    fn default() -> Self {
        Self {
            current_year: Local::now().year(),
            phone_denylist: Vec::new(),
            email_denylist: Vec::new(),
            phone_separator: ".".to_string(),
            max_specializations: DEFAULT_MAX_SPECIALIZATIONS,
            container: None,
            name_selector: None,
            specialization_selector: None,
            structure_selector: None,
        }
    }
}

impl ExtractionRules {
    /// Build the rules declared by a site descriptor
    pub fn from_site(site: &SiteDescriptor) -> Result<Self> {
        let compile = |css: &Option<String>| css.as_deref().map(selector).transpose();

        Ok(Self {
            phone_denylist: site
                .phone_denylist
                .iter()
                .filter_map(|p| phone::national_digits(p))
                .collect(),
            email_denylist: site
                .email_denylist
                .iter()
                .map(|e| e.trim().to_lowercase())
                .filter(|e| !e.is_empty())
                .collect(),
            phone_separator: site.phone_separator.clone(),
            max_specializations: site.max_specializations,
            container: compile(&site.selectors.profile_container)?,
            name_selector: compile(&site.selectors.name)?,
            specialization_selector: compile(&site.selectors.specialization)?,
            structure_selector: compile(&site.selectors.structure)?,
            ..Self::default()
        })
    }

    /// Parse a page, honouring the profile container if one is configured
    pub fn parse_page(&self, html: &str) -> ProfilePage {
        ProfilePage::parse_within(html, self.container.as_ref())
    }

    pub fn year_in_range(&self, year: i32) -> bool {
        (MIN_OATH_YEAR..=self.current_year).contains(&year)
    }
}

/// The name string shown on the profile
///
/// Taken from the configured name selector (default `h1`), falling back to
/// the document title up to its first separator.
pub fn extract_raw_name(page: &ProfilePage, rules: &ExtractionRules) -> Option<String> {
    static H1: once_cell::sync::Lazy<Selector> = once_cell::sync::Lazy::new(|| page::css("h1"));

    let sel = rules.name_selector.as_ref().unwrap_or(&H1);
    let from_selector = page
        .document()
        .select(sel)
        .map(|el| collapse_whitespace(&el.text().collect::<String>()))
        .find(|name| !name.is_empty() && name.chars().count() <= 120);

    from_selector.or_else(|| {
        let title = page.title()?;
        let cut = [" - ", " | ", " – ", " — "]
            .iter()
            .filter_map(|sep| title.find(sep))
            .min()
            .unwrap_or(title.len());
        let head = page::trim_punctuation(&title[..cut]).to_string();
        (!head.is_empty()).then_some(head)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_name_prefers_h1() {
        let page = ProfilePage::parse(
            "<html><head><title>Fiche - Barreau d'Arras</title></head><body><h1> Me  Jean DUPONT </h1></body></html>",
        );
        assert_eq!(
            extract_raw_name(&page, &ExtractionRules::default()).as_deref(),
            Some("Me Jean DUPONT")
        );
    }

    #[test]
    fn test_raw_name_falls_back_to_title() {
        let page = ProfilePage::parse(
            "<html><head><title>MARTIN Sophie | Barreau de Lille</title></head><body><p>x</p></body></html>",
        );
        assert_eq!(
            extract_raw_name(&page, &ExtractionRules::default()).as_deref(),
            Some("MARTIN Sophie")
        );
    }

    #[test]
    fn test_custom_name_selector() {
        let rules = ExtractionRules {
            name_selector: Some(selector(".nom-avocat").unwrap()),
            ..Default::default()
        };
        let page = ProfilePage::parse(
            r#"<body><h1>Annuaire</h1><div class="nom-avocat">GROS-LE MAUT Alix</div></body>"#,
        );
        assert_eq!(
            extract_raw_name(&page, &rules).as_deref(),
            Some("GROS-LE MAUT Alix")
        );
    }

    #[test]
    fn test_year_range() {
        let rules = ExtractionRules {
            current_year: 2024,
            ..Default::default()
        };
        assert!(rules.year_in_range(1950));
        assert!(rules.year_in_range(2024));
        assert!(!rules.year_in_range(1949));
        assert!(!rules.year_in_range(2025));
    }
}
