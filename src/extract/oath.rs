use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use super::page::{fold_accents, ProfilePage};
use super::ExtractionRules;

static KEYWORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(prestation\s+de\s+serment|serment|inscrite?|inscription|admission|admise?)").unwrap()
});

static NUMERIC_DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").unwrap());

static LONG_DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(\d{1,2})(?:er)?\s+(janvier|f[ée]vrier|mars|avril|mai|juin|juillet|ao[ûu]t|septembre|octobre|novembre|d[ée]cembre)\s+(\d{4})\b",
    )
    .unwrap()
});

static YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b(19\d{2}|20\d{2})\b").unwrap());

/// How many characters after a keyword are searched for a date
const WINDOW: usize = 40;

/// Year and, when printed, the full date the lawyer was sworn in
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OathInfo {
    pub year: Option<i32>,
    /// `DD/MM/YYYY`
    pub date: Option<String>,
}

/// Oath date near `serment`, `inscription`, `admission` and similar keywords
///
/// Only years in `[1950, current year]` are accepted; a bare year is kept
/// when no full date is printed.
pub fn extract_oath(page: &ProfilePage, rules: &ExtractionRules) -> OathInfo {
    let text = page.text();
    let mut fallback = None;

    for keyword in KEYWORD.find_iter(text) {
        let window = window_after(text, keyword.end());

        if let Some(date) = first_date(window).filter(|d| rules.year_in_range(d.year())) {
            return OathInfo {
                year: Some(date.year()),
                date: Some(date.format("%d/%m/%Y").to_string()),
            };
        }

        if fallback.is_none() {
            fallback = YEAR
                .captures_iter(window)
                .filter_map(|caps| caps[1].parse::<i32>().ok())
                .find(|year| rules.year_in_range(*year));
        }
    }

    OathInfo {
        year: fallback,
        date: None,
    }
}

fn window_after(text: &str, start: usize) -> &str {
    let end = text[start..]
        .char_indices()
        .nth(WINDOW)
        .map(|(idx, _)| start + idx)
        .unwrap_or(text.len());
    &text[start..end]
}

/// The earliest valid calendar date in `window`, numeric or spelled out
fn first_date(window: &str) -> Option<NaiveDate> {
    let numeric = NUMERIC_DATE
        .captures_iter(window)
        .find_map(|caps| numeric_date(&caps).map(|d| (caps.get(0).map_or(0, |m| m.start()), d)));
    let long = LONG_DATE
        .captures_iter(window)
        .find_map(|caps| long_date(&caps).map(|d| (caps.get(0).map_or(0, |m| m.start()), d)));

    match (numeric, long) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a.1 } else { b.1 }),
        (a, b) => a.or(b).map(|(_, d)| d),
    }
}

fn numeric_date(caps: &Captures) -> Option<NaiveDate> {
    let day = caps[1].parse().ok()?;
    let month = caps[2].parse().ok()?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn long_date(caps: &Captures) -> Option<NaiveDate> {
    let day = caps[1].parse().ok()?;
    let month = month_number(&caps[2])?;
    let year = caps[3].parse().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

fn month_number(name: &str) -> Option<u32> {
    let month = match fold_accents(name).as_str() {
        "janvier" => 1,
        "fevrier" => 2,
        "mars" => 3,
        "avril" => 4,
        "mai" => 5,
        "juin" => 6,
        "juillet" => 7,
        "aout" => 8,
        "septembre" => 9,
        "octobre" => 10,
        "novembre" => 11,
        "decembre" => 12,
        _ => return None,
    };
    Some(month)
}
