use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use super::page::{collapse_whitespace, trim_punctuation, ProfilePage};

/// Street number, street type, free text up to a postcode, then an upper-case town
static FULL_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?P<street>\b\d{1,4}(?:\s?(?:bis|ter|quater|[A-D]))?,?\s+",
        r"(?i:rue|avenue|av\.|bd|boulevard|bld|place|pl\.|chemin|allée|allee|quai|impasse|cours|route|square|passage|parvis|esplanade|résidence|residence|faubourg|rond-point|voie|mail|promenade|sentier|cité|cite|villa|hameau|lieu-dit)",
        r"\s[^\n]{0,80}?)",
        r"[\s,\-–]+(?P<postcode>\d{5})[ \t]+",
        r"(?P<city>\p{Lu}[\p{Lu}'’\-]*(?:[ \t]+\p{Lu}[\p{Lu}'’\-]*)*)",
    ))
    .unwrap()
});

/// A postcode followed by a town name in any case
static POSTCODE_CITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?P<postcode>\d{5})[ \t]+(?P<city>\p{L}[\p{L}'’\-]*(?:[ \t]+\p{L}[\p{L}'’\-]*){0,3})")
        .unwrap()
});

static CEDEX_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[ \t]+(\d{1,2})\b").unwrap());

/// Words that may follow a postcode without being a town
const NOT_A_CITY: &[&str] = &[
    "euros",
    "euro",
    "habitants",
    "avocats",
    "dossiers",
    "tél",
    "tel",
    "téléphone",
    "telephone",
    "fax",
    "email",
    "mail",
    "courriel",
];

/// Postal address split into its parts
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Address {
    pub street: Option<String>,
    pub postal_code: Option<String>,
    pub city: Option<String>,
}

impl Address {
    pub fn is_empty(&self) -> bool {
        self.street.is_none() && self.postal_code.is_none() && self.city.is_none()
    }
}

/// Find the postal address in the visible text
///
/// A full `<number> <street type> … <postcode> <TOWN>` match wins; otherwise
/// a lone postcode and town are kept without a street.
pub fn extract_address(page: &ProfilePage) -> Address {
    let text = page.text();

    for caps in FULL_ADDRESS.captures_iter(text) {
        let postcode = &caps["postcode"];
        if !plausible_postcode(postcode) {
            continue;
        }
        let city_match = caps.name("city").map(|m| (m.as_str(), m.end()));
        let city = city_match
            .and_then(|(city, end)| clean_city(city, &text[end..]))
            .or_else(|| {
                let start = caps.name("postcode").map_or(0, |m| m.start());
                city_after_postcode(&text[start..])
            });
        let street = trim_punctuation(&collapse_whitespace(&caps["street"])).to_string();

        return Address {
            street: (!street.is_empty()).then_some(street),
            postal_code: Some(postcode.to_string()),
            city,
        };
    }

    POSTCODE_CITY
        .captures_iter(text)
        .filter(|caps| plausible_postcode(&caps["postcode"]))
        .find_map(|caps| {
            let city_match = caps.name("city")?;
            let city = clean_city(city_match.as_str(), &text[city_match.end()..])?;
            Some(Address {
                street: None,
                postal_code: Some(caps["postcode"].to_string()),
                city: Some(city),
            })
        })
        .unwrap_or_default()
}

/// Town in any case right after the postcode `text` starts with
fn city_after_postcode(text: &str) -> Option<String> {
    let caps = POSTCODE_CITY.captures(text).filter(|caps| caps.get(0).is_some_and(|m| m.start() == 0))?;
    let city = caps.name("city")?;
    clean_city(city.as_str(), &text[city.end()..])
}

/// French postcodes start with a department number, never `00`
fn plausible_postcode(postcode: &str) -> bool {
    postcode.len() == 5 && !postcode.starts_with("00")
}

/// Tidy a captured town name
///
/// A town glued to the following word (`ARRASTél`) loses its last token.
fn clean_city(raw: &str, rest: &str) -> Option<String> {
    let mut words: Vec<&str> = raw.split_whitespace().collect();
    if rest.chars().next().is_some_and(|c| c.is_alphabetic()) {
        words.pop();
    }
    while words
        .last()
        .is_some_and(|w| NOT_A_CITY.contains(&w.to_lowercase().as_str()))
    {
        words.pop();
    }
    let mut city = trim_punctuation(&words.join(" ")).to_string();
    if city.ends_with("CEDEX") {
        if let Some(caps) = CEDEX_NUMBER.captures(rest) {
            city = format!("{} {}", city, &caps[1]);
        }
    }
    (!city.is_empty() && city.chars().any(char::is_alphabetic)).then_some(city)
}
