use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Selector;

use super::page::{css, ProfilePage};
use super::ExtractionRules;

/// French national number: `+33`/`0033` or a leading `0`, then nine digits in pairs
static NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?:(?:\+|00)33 ?(?:\(0\) ?)?[1-9]|0[1-9])(?:[ .\-]?\d{2}){4}",
    )
    .unwrap()
});

static LABEL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)\b(t[ée]l[ée]copie|fax|t[ée]l[ée]phone|t[ée]l|portable|mobile|gsm|standard)\b",
    )
    .unwrap()
});

/// How far back (in characters) a label may sit before its number
const LABEL_WINDOW: usize = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Label {
    Phone,
    Fax,
    /// `Tél/Fax`: one number serving as both
    Both,
    None,
}

impl Label {
    fn of(label: &str) -> Self {
        let label = label.to_lowercase();
        if label.starts_with("fax") || label.contains("copie") {
            Label::Fax
        } else {
            Label::Phone
        }
    }

    fn is_phone(self) -> bool {
        matches!(self, Label::Phone | Label::Both)
    }

    fn is_fax(self) -> bool {
        matches!(self, Label::Fax | Label::Both)
    }
}

#[derive(Debug, Clone)]
struct Number {
    digits: String,
    label: Label,
}

/// Phone number, preferring one introduced by `Tél`/`Téléphone`
pub fn extract_phone(page: &ProfilePage, rules: &ExtractionRules) -> Option<String> {
    let numbers = classify(page);
    let fax_digits: Vec<&str> = numbers
        .iter()
        .filter(|n| n.label == Label::Fax)
        .map(|n| n.digits.as_str())
        .collect();
    let allowed = |n: &&Number| !rules.phone_denylist.contains(&n.digits);

    numbers
        .iter()
        .filter(allowed)
        .find(|n| n.label.is_phone())
        .or_else(|| {
            numbers
                .iter()
                .filter(allowed)
                .find(|n| n.label == Label::None && !fax_digits.contains(&n.digits.as_str()))
        })
        .map(|n| format_national(&n.digits, &rules.phone_separator))
}

/// Fax number: only a number introduced by `Fax` or `Télécopie`
pub fn extract_fax(page: &ProfilePage, rules: &ExtractionRules) -> Option<String> {
    classify(page)
        .into_iter()
        .filter(|n| !rules.phone_denylist.contains(&n.digits))
        .find(|n| n.label.is_fax())
        .map(|n| format_national(&n.digits, &rules.phone_separator))
}

fn classify(page: &ProfilePage) -> Vec<Number> {
    static TEL_LINKS: Lazy<Selector> = Lazy::new(|| css("a[href]"));

    let text = page.text();
    let mut numbers: Vec<Number> = NUMBER
        .find_iter(text)
        .filter(|m| standalone(text, m.start(), m.end()))
        .filter_map(|m| {
            national_digits(m.as_str()).map(|digits| Number {
                digits,
                label: label_before(text, m.start()),
            })
        })
        .collect();

    // tel: links are phones by construction
    numbers.extend(
        page.document()
            .select(&TEL_LINKS)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| {
                let href = href.trim();
                href.to_lowercase()
                    .starts_with("tel:")
                    .then(|| national_digits(&href[4..]))
                    .flatten()
            })
            .map(|digits| Number {
                digits,
                label: Label::Phone,
            }),
    );
    numbers
}

/// The match is not glued to other digits
fn standalone(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    !before.is_some_and(|c| c.is_ascii_digit()) && !after.is_some_and(|c| c.is_ascii_digit())
}

fn label_before(text: &str, start: usize) -> Label {
    let window_start = text[..start]
        .char_indices()
        .rev()
        .take(LABEL_WINDOW)
        .last()
        .map(|(idx, _)| idx)
        .unwrap_or(start);
    let window = &text[window_start..start];

    let labels: Vec<_> = LABEL.find_iter(window).collect();
    let Some(last) = labels.last() else {
        return Label::None;
    };
    let label = Label::of(last.as_str());

    // Two labels joined only by punctuation or a word share the number
    if let Some(prev) = labels.len().checked_sub(2).map(|i| labels[i]) {
        let between = &window[prev.end()..last.start()];
        if Label::of(prev.as_str()) != label
            && between.chars().count() <= 5
            && !between.chars().any(|c| c.is_ascii_digit())
        {
            return Label::Both;
        }
    }
    label
}

/// Ten national digits (`0XXXXXXXXX`) for any French rendering of a number
pub fn national_digits(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let international = trimmed.starts_with('+') || trimmed.starts_with("00");
    let mut digits: String = trimmed.chars().filter(|c| c.is_ascii_digit()).collect();

    if international {
        digits = digits
            .strip_prefix("0033")
            .or_else(|| digits.strip_prefix("33"))?
            .to_string();
        if !digits.starts_with('0') {
            digits.insert(0, '0');
        }
    }

    (digits.len() == 10 && digits.starts_with('0')).then_some(digits)
}

/// Render ten national digits as pairs joined by `separator`
pub fn format_national(digits: &str, separator: &str) -> String {
    digits
        .as_bytes()
        .chunks(2)
        .map(|pair| String::from_utf8_lossy(pair).into_owned())
        .collect::<Vec<_>>()
        .join(separator)
}
