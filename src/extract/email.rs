use log::debug;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use super::page::{css, decode_entities, ProfilePage};
use super::ExtractionRules;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}").unwrap()
});

static STRICT_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9._%+\-]+@[a-z0-9\-]+(?:\.[a-z0-9\-]+)*\.[a-z]{2,}$").unwrap()
});

static MAILTO: Lazy<Regex> = Lazy::new(|| Regex::new(r#"(?i)mailto:([^"'\s<>]+)"#).unwrap());

static AT_OBFUSCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*(?:[\[\(\{]\s*(?:at|arobase|@)\s*[\]\)\}]|\s+arobase\s+)\s*").unwrap()
});

static DOT_OBFUSCATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\s*[\[\(\{]\s*(?:dot|point)\s*[\]\)\}]\s*").unwrap()
});

/// Local parts that never belong to a lawyer
const GENERIC_LOCAL_PARTS: &[&str] = &["noreply", "no-reply", "donotreply", "webmaster", "postmaster"];

/// File extensions that make `name@2x.png` look like an address
const ASSET_SUFFIXES: &[&str] = &[".png", ".jpg", ".jpeg", ".gif", ".svg", ".webp", ".css", ".js"];

/// Id or class fragments of widgets that unveil a hidden address when clicked
pub const REVEAL_HINTS: &[&str] = &[
    "cloak", "reveal", "show-mail", "show-email", "afficher-mail", "afficher-email",
];

/// CSS selector matching the unveiling widgets of [`REVEAL_HINTS`]
pub fn reveal_selector() -> String {
    REVEAL_HINTS
        .iter()
        .flat_map(|hint| [format!("[id*=\"{hint}\" i]"), format!("[class*=\"{hint}\" i]")])
        .collect::<Vec<_>>()
        .join(", ")
}

/// Email of the lawyer, first non-denied hit of the cascade
///
/// 1. `mailto:` links, percent- and entity-decoded;
/// 2. an address in the visible text, after undoing `[at]`/`[dot]` tricks;
/// 3. an address or `mailto:` anywhere in the raw source.
pub fn extract_email(page: &ProfilePage, rules: &ExtractionRules) -> Option<String> {
    let pick = |candidates: Vec<String>| {
        candidates
            .into_iter()
            .find(|email| !is_denied(email, rules))
    };

    pick(mailto_links(page))
        .or_else(|| pick(text_addresses(page.text())))
        .or_else(|| pick(source_addresses(page.source())))
}

/// Step 4 of the cascade, applied to a DOM re-serialized after clicking
pub fn extract_revealed_email(html: &str, rules: &ExtractionRules) -> Option<String> {
    let page = rules.parse_page(html);
    extract_email(&page, rules)
}

fn mailto_links(page: &ProfilePage) -> Vec<String> {
    static LINKS: Lazy<Selector> = Lazy::new(|| css("a[href]"));

    page.document()
        .select(&LINKS)
        .filter_map(|a| a.value().attr("href"))
        .filter_map(|href| {
            let href = href.trim();
            let lower = href.to_lowercase();
            lower
                .starts_with("mailto:")
                .then(|| decode_mailto(&href["mailto:".len()..]))
                .flatten()
        })
        .collect()
}

fn text_addresses(text: &str) -> Vec<String> {
    let text = AT_OBFUSCATION.replace_all(text, "@");
    let text = DOT_OBFUSCATION.replace_all(&text, ".");
    EMAIL
        .find_iter(&text)
        .filter_map(|m| normalize_email(m.as_str()))
        .collect()
}

fn source_addresses(source: &str) -> Vec<String> {
    let decoded = decode_entities(source);
    let mut found: Vec<String> = MAILTO
        .captures_iter(&decoded)
        .filter_map(|caps| decode_mailto(&caps[1]))
        .collect();
    found.extend(
        EMAIL
            .find_iter(&decoded)
            .filter_map(|m| normalize_email(m.as_str())),
    );
    found
}

/// Decode the target of a `mailto:` URL
fn decode_mailto(target: &str) -> Option<String> {
    let decoded = urlencoding::decode(target)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| target.to_string());
    let decoded = decode_entities(&decoded);
    let address = decoded
        .split(['?', ','])
        .next()
        .unwrap_or_default()
        .trim();
    EMAIL.find(address).and_then(|m| normalize_email(m.as_str()))
}

fn normalize_email(candidate: &str) -> Option<String> {
    let email = candidate.trim_matches('.').to_lowercase();
    is_valid_email(&email).then_some(email)
}

/// Exactly one `@` and a dot-bearing domain
pub fn is_valid_email(email: &str) -> bool {
    email.matches('@').count() == 1 && STRICT_EMAIL.is_match(&email.to_lowercase())
}

fn is_denied(email: &str, rules: &ExtractionRules) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return true;
    };
    let denied = GENERIC_LOCAL_PARTS.contains(&local)
        || ASSET_SUFFIXES.iter().any(|suffix| domain.ends_with(suffix))
        || rules.email_denylist.iter().any(|entry| match entry.strip_prefix('@') {
            Some(denied_domain) => domain == denied_domain,
            None => entry == email,
        });
    if denied {
        debug!("Ignoring denied email {}", email);
    }
    denied
}
