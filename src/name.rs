//! Splitting of free-form lawyer names into given and family names.
//!
//! French directories print names in every possible shape: `DUPONT Jean`,
//! `Jean DUPONT`, `DE LEPINAU Hervé`, glued `MULLERChristian`, with or without
//! an honorific. The parser below is total and deterministic; per-site
//! overrides from the site descriptor take precedence over every rule.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Honorifics stripped from the start of a name (compared lower-cased)
const HONORIFICS: &[&str] = &[
    "me", "me.", "maître", "maitre", "m.", "mme", "mme.", "mlle", "mlle.", "dr", "dr.",
    "docteur", "monsieur", "madame", "mademoiselle", "mr", "mr.", "mrs", "mrs.",
];

/// Particles that belong to the family name when they precede it (compared upper-cased)
const PARTICLES: &[&str] = &[
    "DE", "DU", "DES", "LA", "LE", "LES", "VAN", "VON", "EL", "AL", "BEN", "SAINT", "SAINTE",
    "D'", "D’", "DEL", "DI", "DA",
];

/// Hand-audited split for a name the rules get wrong
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameOverride {
    pub given: String,
    pub family: String,
}

/// Overrides keyed by the raw name string
pub type NameOverrides = HashMap<String, NameOverride>;

/// Result of [`parse_name`]
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedName {
    pub given: String,
    pub family: String,
    /// No rule could split the name; `family` then holds the raw string
    pub ambiguous: bool,
}

impl ParsedName {
    fn split(given: &[&str], family: &[&str]) -> Self {
        let given = given.join(" ");
        let family = family.join(" ");
        let ambiguous = given.is_empty() || family.is_empty();
        Self {
            given,
            family,
            ambiguous,
        }
    }

    fn unparsed(raw: &str) -> Self {
        Self {
            given: String::new(),
            family: normalize_whitespace(raw),
            ambiguous: true,
        }
    }

    /// Whether given and family rebuild `raw` up to whitespace, case and order
    pub fn reconstructs(&self, raw: &str) -> bool {
        let target = squash(&strip_honorifics(&tokenize(raw)).join(""));
        let forward = squash(&format!("{}{}", self.given, self.family));
        let backward = squash(&format!("{}{}", self.family, self.given));
        target == forward || target == backward
    }
}

/// Split a raw name into given and family names
pub fn parse_name(raw: &str, overrides: &NameOverrides) -> ParsedName {
    if let Some(o) = lookup_override(raw, overrides) {
        return ParsedName {
            given: o.given.clone(),
            family: o.family.clone(),
            ambiguous: false,
        };
    }

    if !raw.chars().any(char::is_alphabetic) {
        return ParsedName::unparsed(raw);
    }

    let tokens = strip_honorifics(&tokenize(raw));
    if tokens.is_empty() {
        return ParsedName::unparsed(raw);
    }

    if tokens.len() == 1 {
        return match split_glued(tokens[0]) {
            Some(glued) => ParsedName {
                given: glued.given.to_string(),
                family: glued.family.to_string(),
                ambiguous: false,
            },
            None => ParsedName::unparsed(raw),
        };
    }

    // Expand glued tokens in place so the ordering rules still see them
    let mut expanded: Vec<&str> = Vec::with_capacity(tokens.len() + 1);
    for token in &tokens {
        match split_glued(token) {
            Some(glued) if glued.family_first => {
                expanded.push(glued.family);
                expanded.push(glued.given);
            }
            Some(glued) => {
                expanded.push(glued.given);
                expanded.push(glued.family);
            }
            None => expanded.push(token),
        }
    }

    if expanded.len() == 2 {
        parse_two(expanded[0], expanded[1])
    } else {
        parse_many(&expanded)
    }
}

fn lookup_override<'a>(raw: &str, overrides: &'a NameOverrides) -> Option<&'a NameOverride> {
    if overrides.is_empty() {
        return None;
    }
    overrides.get(raw).or_else(|| {
        let normalized = normalize_whitespace(raw);
        overrides
            .iter()
            .find(|(key, _)| normalize_whitespace(key) == normalized)
            .map(|(_, value)| value)
    })
}

fn parse_two(a: &str, b: &str) -> ParsedName {
    if is_particle(a) {
        return ParsedName::split(&[], &[a, b]);
    }
    match (is_caps(a), is_caps(b)) {
        (true, false) => ParsedName::split(&[b], &[a]),
        (false, true) => ParsedName::split(&[a], &[b]),
        (true, true) => {
            if a.contains('-') && !b.contains('-') {
                ParsedName::split(&[b], &[a])
            } else {
                ParsedName::split(&[a], &[b])
            }
        }
        (false, false) => ParsedName::split(&[a], &[b]),
    }
}

fn parse_many(tokens: &[&str]) -> ParsedName {
    let n = tokens.len();

    // Leading run of capitals (particles allowed inside): family first
    let lead = tokens
        .iter()
        .take_while(|t| is_caps(t) || is_particle(t))
        .count();
    if lead > 0 && lead < n && has_caps_core(&tokens[..lead]) {
        return ParsedName::split(&tokens[lead..], &tokens[..lead]);
    }

    // Trailing run of capitals: given first
    let trail = tokens
        .iter()
        .rev()
        .take_while(|t| is_caps(t) || is_particle(t))
        .count();
    if trail > 0 && trail < n && has_caps_core(&tokens[n - trail..]) {
        let start = absorb_particles(tokens, n - trail);
        return ParsedName::split(&tokens[..start], &tokens[start..]);
    }

    // All capitals or all mixed case: last token plus its particles
    let start = absorb_particles(tokens, n - 1);
    ParsedName::split(&tokens[..start], &tokens[start..])
}

/// Move `start` left over particles immediately preceding it
fn absorb_particles(tokens: &[&str], mut start: usize) -> usize {
    while start > 0 && is_particle(tokens[start - 1]) {
        start -= 1;
    }
    start
}

fn has_caps_core(tokens: &[&str]) -> bool {
    tokens.iter().any(|t| is_caps(t) && !is_particle(t))
}

/// The two halves of a glued token such as `MULLERChristian`
struct Glued<'a> {
    given: &'a str,
    family: &'a str,
    family_first: bool,
}

fn split_glued(token: &str) -> Option<Glued<'_>> {
    if token.chars().count() < 4 {
        return None;
    }
    let chars: Vec<(usize, char)> = token.char_indices().collect();

    // CAPSMixed: the last capital before the first lowercase letter opens the given name
    if let Some(pos) = chars.iter().position(|(_, c)| c.is_lowercase()) {
        if pos >= 3 && chars[pos - 1].1.is_uppercase() {
            let cut = chars[pos - 1].0;
            let (family, given) = token.split_at(cut);
            if is_caps(family)
                && !family.ends_with('-')
                && letter_count(family) >= 2
                && given.chars().count() >= 3
            {
                return Some(Glued {
                    given,
                    family,
                    family_first: true,
                });
            }
        }
    }

    // MixedCAPS: a lowercase letter followed by a capital run to the end
    for window in chars.windows(2) {
        let ((_, prev), (idx, next)) = (window[0], window[1]);
        if prev.is_lowercase() && next.is_uppercase() {
            let (given, family) = token.split_at(idx);
            if is_caps(family)
                && letter_count(family) >= 2
                && given.chars().count() >= 3
                && given.chars().next().is_some_and(char::is_uppercase)
            {
                return Some(Glued {
                    given,
                    family,
                    family_first: false,
                });
            }
            return None;
        }
    }
    None
}

fn tokenize(raw: &str) -> Vec<&str> {
    raw.split_whitespace()
        .map(|t| t.trim_matches(|c: char| c == ',' || c == ';'))
        .filter(|t| !t.is_empty())
        .collect()
}

fn strip_honorifics<'a>(tokens: &[&'a str]) -> Vec<&'a str> {
    let mut start = 0;
    while start + 1 < tokens.len() && HONORIFICS.contains(&tokens[start].to_lowercase().as_str())
    {
        start += 1;
    }
    tokens[start..].to_vec()
}

/// Every letter is upper-case (and there is at least one letter)
pub fn is_caps(token: &str) -> bool {
    let mut letters = token.chars().filter(|c| c.is_alphabetic()).peekable();
    letters.peek().is_some() && letters.all(|c| !c.is_lowercase())
}

fn is_particle(token: &str) -> bool {
    PARTICLES.contains(&token.to_uppercase().as_str())
}

fn letter_count(s: &str) -> usize {
    s.chars().filter(|c| c.is_alphabetic()).count()
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn squash(s: &str) -> String {
    s.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}
