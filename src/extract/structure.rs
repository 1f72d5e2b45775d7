use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use super::page::{collapse_whitespace, css, element_text, trim_punctuation, ProfilePage};
use super::ExtractionRules;

/// Legal forms and words that open the name of a firm
static FIRM_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(SELARLU|SELARL|SELASU|SELAS|SELAFA|SASU|SAS|SARL|SCP|SCM|AARPI|Cabinet|CABINET|Étude|Etude|ÉTUDE|ETUDE|Société d'avocats|Société d’avocats|SOCIÉTÉ D'AVOCATS)\b",
    )
    .unwrap()
});

/// Lower-case words allowed inside a firm name
const CONNECTORS: &[&str] = &["de", "du", "des", "et", "la", "le", "les", "&", "-", "en"];

/// Words that start the next field on the same line
const FIELD_LABELS: &[&str] = &[
    "tél", "tel", "téléphone", "telephone", "fax", "télécopie", "email", "e-mail", "mail",
    "courriel", "adresse", "site", "portable", "mobile", "toque",
];

const HONORIFICS: &[&str] = &["me", "maître", "maitre", "m", "mme", "mlle"];

/// Longest plausible firm name, in characters
const MAX_LENGTH: usize = 100;

/// Name of the firm or practice
///
/// The configured selector wins; otherwise a legal-form prefix is looked for
/// in headings and firm-classed elements first, then in the page text.
/// A candidate that merely repeats the lawyer's own name is rejected.
pub fn extract_structure(
    page: &ProfilePage,
    rules: &ExtractionRules,
    full_name: &str,
) -> Option<String> {
    static PROMINENT: Lazy<Selector> = Lazy::new(|| {
        css(r#"h1, h2, h3, h4, h5, h6, [class*="cabinet"], [class*="structure"], [class*="societe"], [class*="firm"]"#)
    });

    let acceptable = |candidate: &String| {
        candidate.chars().count() <= MAX_LENGTH && !same_person(candidate, full_name)
    };

    if let Some(sel) = rules.structure_selector.as_ref() {
        let configured = page
            .document()
            .select(sel)
            .map(|el| trim_punctuation(&collapse_whitespace(&element_text(el))).to_string())
            .filter(|text| !text.is_empty())
            .find(|text| acceptable(text));
        if configured.is_some() {
            return configured;
        }
    }

    let prominent = page
        .document()
        .select(&PROMINENT)
        .map(element_text)
        .flat_map(|text| text.lines().filter_map(firm_in_line).collect::<Vec<_>>())
        .find(|candidate| acceptable(candidate));
    if prominent.is_some() {
        return prominent;
    }

    page.lines()
        .filter_map(firm_in_line)
        .find(|candidate| acceptable(candidate))
}

/// The firm name starting at the first legal-form prefix of `line`
fn firm_in_line(line: &str) -> Option<String> {
    FIRM_PREFIX.find_iter(line).find_map(|prefix| {
        let rest = &line[prefix.end()..];
        let tokens = name_tokens(rest);
        if tokens.is_empty() {
            return None;
        }
        Some(format!("{} {}", prefix.as_str(), tokens.join(" ")))
    })
}

fn name_tokens(rest: &str) -> Vec<&str> {
    let mut tokens: Vec<&str> = Vec::new();

    for raw in rest.split_whitespace() {
        let token = raw.trim_end_matches([',', ';', ':', '.']);
        let ends_clause = token.len() != raw.len();
        let lower = token.to_lowercase();

        if token.is_empty() || FIELD_LABELS.contains(&lower.trim_end_matches('.')) {
            break;
        }
        let first = token.chars().next().unwrap_or_default();
        let elided = ["d'", "l'", "d’", "l’"]
            .iter()
            .any(|p| lower.starts_with(p) && token.chars().nth(2).is_some_and(char::is_uppercase));
        let accepted = first.is_uppercase()
            || first.is_ascii_digit()
            || CONNECTORS.contains(&lower.as_str())
            || elided;
        if !accepted {
            break;
        }
        tokens.push(token);
        if ends_clause {
            break;
        }
    }

    while tokens
        .last()
        .is_some_and(|t| CONNECTORS.contains(&t.to_lowercase().as_str()))
    {
        tokens.pop();
    }
    tokens
}

/// Whether a firm name is nothing but the lawyer's name, with or without its prefix
fn same_person(candidate: &str, full_name: &str) -> bool {
    let person = sorted_tokens(full_name);
    if person.is_empty() {
        return false;
    }
    let without_prefix = FIRM_PREFIX.replace(candidate, "");
    sorted_tokens(candidate) == person || sorted_tokens(&without_prefix) == person
}

fn sorted_tokens(s: &str) -> Vec<String> {
    let mut tokens: Vec<String> = s
        .split(|c: char| c.is_whitespace() || c == '-')
        .map(|t| trim_punctuation(t).to_lowercase())
        .filter(|t| !t.is_empty() && !HONORIFICS.contains(&t.as_str()))
        .collect();
    tokens.sort();
    tokens
}
