//! Record assembly: one profile page in, one normalized record out.

use log::{debug, warn};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::config::SiteDescriptor;
use crate::error::{AnnuaireError, Result};
use crate::extract::email::{extract_revealed_email, is_valid_email, reveal_selector};
use crate::extract::page::{collapse_whitespace, trim_punctuation};
use crate::extract::phone::national_digits;
use crate::extract::specialization::is_boilerplate;
use crate::extract::{
    extract_address, extract_email, extract_fax, extract_oath, extract_phone,
    extract_raw_name, extract_specializations, extract_structure, ExtractionRules,
};
use crate::fetch::{DomHandle, Fetcher};
use crate::name::{parse_name, NameOverrides};
use crate::record::{LawyerRecord, RecordStatus};

/// Synchronous half of the assembler: HTML to record, no I/O
pub struct ProfileExtractor {
    site_tag: String,
    overrides: NameOverrides,
    rules: ExtractionRules,
}

impl ProfileExtractor {
    pub fn new(site: &SiteDescriptor) -> Result<Self> {
        Ok(Self {
            site_tag: site.tag.clone(),
            overrides: site.name_overrides.clone(),
            rules: ExtractionRules::from_site(site)?,
        })
    }

    /// Extractor with default rules, for pages outside any configured site
    pub fn standalone(site_tag: impl Into<String>) -> Self {
        Self {
            site_tag: site_tag.into(),
            overrides: NameOverrides::new(),
            rules: ExtractionRules::default(),
        }
    }

    pub fn rules(&self) -> &ExtractionRules {
        &self.rules
    }

    /// Run every extractor over `html` and return the cleaned record
    pub fn extract(&self, url: &str, html: &str) -> LawyerRecord {
        let page = self.rules.parse_page(html);
        let rules = &self.rules;
        let mut record = LawyerRecord::new(url, &self.site_tag);

        if !page.has_body_text() {
            record.status = RecordStatus::Partial;
            record.notes.push("page has no body text".to_string());
            return record;
        }

        match isolated("name", url, || extract_raw_name(&page, rules)) {
            Some(raw) => {
                let parsed = parse_name(&raw, &self.overrides);
                if parsed.ambiguous {
                    record
                        .notes
                        .push(AnnuaireError::NameAmbiguous(raw.clone()).to_string());
                }
                record.given_name = parsed.given;
                record.family_name = parsed.family;
                record.name_ambiguous = parsed.ambiguous;
                record.full_name_raw = raw;
            }
            None => {
                record.status = RecordStatus::Partial;
                record.notes.push("no name found".to_string());
            }
        }

        record.email = isolated("email", url, || extract_email(&page, rules)).unwrap_or_default();
        record.phone = isolated("phone", url, || extract_phone(&page, rules)).unwrap_or_default();
        record.fax = isolated("fax", url, || extract_fax(&page, rules)).unwrap_or_default();

        let address = isolated("address", url, || extract_address(&page));
        record.street_address = address.street.unwrap_or_default();
        record.postal_code = address.postal_code.unwrap_or_default();
        record.city = address.city.unwrap_or_default();

        let oath = isolated("oath", url, || extract_oath(&page, rules));
        record.oath_year = oath.year;
        record.oath_date = oath.date;

        record.specializations =
            isolated("specializations", url, || extract_specializations(&page, rules));
        let full_name = record.full_name_raw.clone();
        record.structure = isolated("structure", url, || {
            extract_structure(&page, rules, &full_name)
        })
        .unwrap_or_default();

        self.clean(&mut record);
        record
    }

    /// Normalize text fields and blank every value that fails validation
    pub fn clean(&self, record: &mut LawyerRecord) {
        record.given_name = collapse_whitespace(&record.given_name);
        record.family_name = collapse_whitespace(&record.family_name);
        for field in [
            &mut record.structure,
            &mut record.street_address,
            &mut record.city,
        ] {
            *field = trim_punctuation(&collapse_whitespace(field)).to_string();
        }
        record.email = record.email.trim().to_lowercase();
        record.postal_code = record.postal_code.trim().to_string();

        let mut blanked = Vec::new();
        let mut check = |field: &str, value: &mut String, valid: bool| {
            if !value.is_empty() && !valid {
                blanked.push(AnnuaireError::Validation {
                    field: field.to_string(),
                    value: std::mem::take(value),
                });
            }
        };

        let phone_ok = national_digits(&record.phone).is_some();
        check("phone", &mut record.phone, phone_ok);
        let fax_ok = national_digits(&record.fax).is_some();
        check("fax", &mut record.fax, fax_ok);
        let email_ok = is_valid_email(&record.email);
        check("email", &mut record.email, email_ok);
        let postcode_ok =
            record.postal_code.len() == 5 && record.postal_code.chars().all(|c| c.is_ascii_digit());
        check("postal_code", &mut record.postal_code, postcode_ok);

        if let Some(year) = record.oath_year {
            if !self.rules.year_in_range(year) {
                blanked.push(AnnuaireError::Validation {
                    field: "oath_year".to_string(),
                    value: year.to_string(),
                });
                record.oath_year = None;
                record.oath_date = None;
            }
        }

        record.specializations.retain(|s| !is_boilerplate(s));

        for error in blanked {
            debug!("{}: {}", record.profile_url, error);
            record.notes.push(error.to_string());
        }
    }
}

/// Run one extractor, turning a panic into an empty field
fn isolated<T: Default>(field: &str, url: &str, extractor: impl FnOnce() -> T) -> T {
    catch_unwind(AssertUnwindSafe(extractor)).unwrap_or_else(|_| {
        warn!("Extractor '{}' panicked on {}; field left blank", field, url);
        T::default()
    })
}

/// Fetches a profile and turns it into a record
pub struct RecordAssembler<'a> {
    extractor: ProfileExtractor,
    fetcher: &'a dyn Fetcher,
}

impl<'a> RecordAssembler<'a> {
    pub fn new(site: &SiteDescriptor, fetcher: &'a dyn Fetcher) -> Result<Self> {
        Ok(Self {
            extractor: ProfileExtractor::new(site)?,
            fetcher,
        })
    }

    /// Fetch and extract one profile; never fails
    ///
    /// A transport failure yields a `failed` record carrying the error in its
    /// notes. In rendered mode, a page without an email gets its unveiling
    /// widgets clicked and is scanned again.
    pub async fn assemble(&self, url: &str) -> LawyerRecord {
        let page = match self.fetcher.fetch(url).await {
            Ok(page) => page,
            Err(e) => {
                warn!("Skipping {}: {}", url, e);
                let mut record = LawyerRecord::new(url, &self.extractor.site_tag);
                record.status = RecordStatus::Failed;
                record.notes.push(e.to_string());
                return record;
            }
        };

        let mut record = self.extractor.extract(url, &page.html);
        if record.email.is_empty() && record.status != RecordStatus::Partial {
            if let Some(dom) = page.dom.as_deref() {
                if let Some(email) = self.reveal_email(url, dom).await {
                    record.email = email;
                }
            }
        }
        record
    }

    /// Synchronous entry point over already retrieved HTML
    pub fn assemble_html(&self, url: &str, html: &str) -> LawyerRecord {
        self.extractor.extract(url, html)
    }

    async fn reveal_email(&self, url: &str, dom: &dyn DomHandle) -> Option<String> {
        match dom.click_and_serialize(&reveal_selector()).await {
            Ok(Some(html)) => {
                let email = extract_revealed_email(&html, self.extractor.rules());
                debug!("Reveal on {}: {:?}", url, email);
                email
            }
            Ok(None) => None,
            Err(e) => {
                debug!("Reveal on {} failed: {}", url, e);
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::{FetchMode, FetchedPage};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;

    const PROFILE: &str = include_str!("../tests/fixtures/profile_dupont.html");

    fn site() -> SiteDescriptor {
        let mut site = SiteDescriptor::new("arras", "https://barreau-arras.example/");
        site.phone_denylist = vec!["03.21.51.00.00".to_string()];
        site.email_denylist = vec!["ordre@barreau-arras.example".to_string()];
        site
    }

    #[test]
    fn test_extract_fixture_profile() {
        let extractor = ProfileExtractor::new(&site()).unwrap();
        let record = extractor.extract("https://barreau-arras.example/avocat/dupont", PROFILE);

        assert_eq!(record.given_name, "Jean-Pierre");
        assert_eq!(record.family_name, "DUPONT");
        assert_eq!(record.full_name_raw, "Me Jean-Pierre DUPONT");
        assert_eq!(record.email, "jp.dupont@dupont-avocats.fr");
        assert_eq!(record.phone, "03.21.56.25.57");
        assert_eq!(record.fax, "03.21.56.25.58");
        assert_eq!(record.street_address, "12 rue des Augustins");
        assert_eq!(record.postal_code, "62000");
        assert_eq!(record.city, "ARRAS");
        assert_eq!(record.oath_year, Some(1998));
        assert_eq!(record.oath_date.as_deref(), Some("14/12/1998"));
        assert_eq!(
            record.specializations,
            vec![
                "Droit pénal",
                "Droit de la famille, des personnes et de leur patrimoine"
            ]
        );
        assert_eq!(record.structure, "SCP DUPONT & ASSOCIES");
        assert_eq!(record.status, RecordStatus::Complete);
        assert_eq!(record.signature(), "NETFAYSC");
        assert!(record.notes.is_empty());
    }

    #[test]
    fn test_empty_page_is_partial() {
        let extractor = ProfileExtractor::standalone("x");
        let record = extractor.extract("https://x.example/1", "<html><body>  </body></html>");
        assert_eq!(record.status, RecordStatus::Partial);
        assert_eq!(record.signature(), "--------");
    }

    #[test]
    fn test_clean_blanks_invalid_values_with_notes() {
        let extractor = ProfileExtractor::standalone("x");
        let mut record = LawyerRecord::new("https://x.example/1", "x");
        record.phone = "03 21".to_string();
        record.email = "pas-une-adresse".to_string();
        record.postal_code = "620".to_string();
        record.oath_year = Some(1900);
        record.city = "  ARRAS , ".to_string();
        record.specializations = vec!["Droit pénal".to_string(), "Gestion des cookies".to_string()];

        extractor.clean(&mut record);

        assert!(record.phone.is_empty());
        assert!(record.email.is_empty());
        assert!(record.postal_code.is_empty());
        assert_eq!(record.oath_year, None);
        assert_eq!(record.city, "ARRAS");
        assert_eq!(record.specializations, vec!["Droit pénal"]);
        assert_eq!(record.notes.len(), 4);
        assert!(record.notes[0].starts_with("Invalid phone"));
    }

    struct OneShotFetcher {
        html: Option<&'static str>,
        revealed: Option<&'static str>,
    }

    struct RevealDom(&'static str);

    #[async_trait]
    impl DomHandle for RevealDom {
        async fn click_and_serialize(&self, css: &str) -> Result<Option<String>> {
            assert!(css.contains("cloak"));
            Ok(Some(self.0.to_string()))
        }
    }

    #[async_trait]
    impl Fetcher for OneShotFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            let html = self
                .html
                .ok_or_else(|| AnnuaireError::transport(url, "connection reset"))?;
            Ok(FetchedPage {
                url: url.to_string(),
                html: html.to_string(),
                dom: self
                    .revealed
                    .map(|h| Box::new(RevealDom(h)) as Box<dyn DomHandle>),
            })
        }

        fn mode(&self) -> FetchMode {
            if self.revealed.is_some() {
                FetchMode::Rendered
            } else {
                FetchMode::Static
            }
        }

        async fn close(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_transport_failure_yields_failed_record() {
        let fetcher = OneShotFetcher {
            html: None,
            revealed: None,
        };
        let assembler = RecordAssembler::new(&site(), &fetcher).unwrap();
        let record = assembler.assemble("https://barreau-arras.example/avocat/x").await;

        assert_eq!(record.status, RecordStatus::Failed);
        assert_eq!(record.profile_url, "https://barreau-arras.example/avocat/x");
        assert!(record.notes[0].contains("connection reset"));
    }

    #[tokio::test]
    async fn test_rendered_reveal_fills_missing_email() {
        let fetcher = OneShotFetcher {
            html: Some(r#"<h1>Sophie MARTIN</h1><span class="email-cloak">Afficher l'email</span>"#),
            revealed: Some(r#"<h1>Sophie MARTIN</h1><a href="mailto:s.martin@martin-avocat.fr">s.martin@martin-avocat.fr</a>"#),
        };
        let assembler = RecordAssembler::new(&site(), &fetcher).unwrap();
        let record = assembler.assemble("https://barreau-arras.example/avocat/martin").await;

        assert_eq!(record.email, "s.martin@martin-avocat.fr");
        assert_eq!(record.family_name, "MARTIN");
    }

    #[test]
    fn test_isolated_catches_panics() {
        let value: Option<String> = isolated("test", "https://x.example", || panic!("boom"));
        assert_eq!(value, None);
    }
}
