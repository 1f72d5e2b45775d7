use annuaire::extract::specialization::is_boilerplate;
use annuaire::extract::{extract_email, extract_fax, extract_phone, ExtractionRules, ProfilePage};
use annuaire::record::RecordStatus;
use annuaire::{ProfileExtractor, SiteDescriptor};
use pretty_assertions::assert_eq;
use std::fs;
use tempfile::TempDir;

const PROFILE: &str = include_str!("fixtures/profile_dupont.html");

const SITE_YAML: &str = r#"
seed_url: https://barreau-arras.example/annuaire
strategies: [paginated]
polite_delay_seconds: 0
phone_denylist: ["03 21 51 00 00"]
email_denylist: ["ordre@barreau-arras.example"]
selectors:
  profile_link: "a.fiche"
  profile_container: "main"
"#;

fn load_site() -> (TempDir, SiteDescriptor) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("arras.yaml");
    fs::write(&path, SITE_YAML).unwrap();
    let site = SiteDescriptor::load(&path).unwrap();
    (temp, site)
}

#[test]
fn test_site_tag_comes_from_file_stem() {
    let (_temp, site) = load_site();
    assert_eq!(site.tag, "arras");
}

#[test]
fn test_fixture_profile_with_site_rules() {
    let (_temp, site) = load_site();
    let extractor = ProfileExtractor::new(&site).unwrap();
    let record = extractor.extract("https://barreau-arras.example/avocat/dupont", PROFILE);

    assert_eq!(record.status, RecordStatus::Complete);
    assert_eq!(record.display_name(), "Jean-Pierre DUPONT");
    assert_eq!(record.phone, "03.21.56.25.57");
    assert_eq!(record.fax, "03.21.56.25.58");
    assert_eq!(record.email, "jp.dupont@dupont-avocats.fr");
    assert_eq!(record.postal_code, "62000");
    assert_eq!(record.city, "ARRAS");
    assert_eq!(record.oath_year, Some(1998));
    assert_eq!(record.site, "arras");
}

#[test]
fn test_fixture_fields_hold_their_shape() {
    let extractor = ProfileExtractor::standalone("arras");
    let record = extractor.extract("https://barreau-arras.example/avocat/dupont", PROFILE);

    let digits: String = record.phone.chars().filter(char::is_ascii_digit).collect();
    assert_eq!(digits.len(), 10);
    assert!(record.postal_code.len() == 5 && record.postal_code.chars().all(|c| c.is_ascii_digit()));
    assert!(record.email.contains('@'));
    assert!(record
        .oath_year
        .is_some_and(|year| (1950..=2100).contains(&year)));
    for specialization in &record.specializations {
        assert!(!is_boilerplate(specialization), "{}", specialization);
        let lower = specialization.to_lowercase();
        for banned in ["cookie", "rgpd", "voir le détail", "mentions légales"] {
            assert!(!lower.contains(banned), "{}", specialization);
        }
    }
}

#[test]
fn test_percent_encoded_mailto() {
    let page = ProfilePage::parse(r#"<a href="mailto:%6a%6f%68%6e%40%65%78%2e%66%72">Contact</a>"#);
    assert_eq!(
        extract_email(&page, &ExtractionRules::default()).as_deref(),
        Some("john@ex.fr")
    );
}

#[test]
fn test_phone_fax_and_denied_footer() {
    let page = ProfilePage::parse(
        "<main><p>Tél : 03 21 56 25 57</p><p>Fax : 03 21 56 25 58</p></main>\
         <footer>Ordre des avocats : 03.21.56.25.00</footer>",
    );
    let rules = ExtractionRules {
        phone_denylist: vec!["0321562500".to_string()],
        ..ExtractionRules::default()
    };

    assert_eq!(extract_phone(&page, &rules).as_deref(), Some("03.21.56.25.57"));
    assert_eq!(extract_fax(&page, &rules).as_deref(), Some("03.21.56.25.58"));
}

#[test]
fn test_extraction_is_deterministic() {
    let extractor = ProfileExtractor::standalone("arras");
    let mut first = extractor.extract("https://x.example/1", PROFILE);
    let mut second = extractor.extract("https://x.example/1", PROFILE);
    second.extraction_timestamp = first.extraction_timestamp;
    first.notes.sort();
    second.notes.sort();
    assert_eq!(first, second);
}
