use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use scraper::{ElementRef, Html, Node, Selector};

use crate::error::{AnnuaireError, Result};

/// Elements whose text is never shown to a reader
const SKIPPED_TAGS: &[&str] = &[
    "script", "style", "noscript", "template", "svg", "iframe", "head",
];

/// Elements that start a new line in the visible text
const BLOCK_TAGS: &[&str] = &[
    "address", "article", "aside", "blockquote", "dd", "div", "dl", "dt", "fieldset",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "option", "p", "pre", "section", "table", "tbody", "td",
    "tfoot", "th", "thead", "tr", "ul",
];

static NUMERIC_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&#(?:[xX]([0-9a-fA-F]{1,6})|([0-9]{1,7}));?").unwrap());

static NAMED_ENTITY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"&(amp|lt|gt|quot|apos|nbsp|commat|period|hyphen|dash);").unwrap());

/// A profile page parsed once and shared by every extractor
pub struct ProfilePage {
    document: Html,
    source: String,
    text: String,
}

impl ProfilePage {
    /// Parse a full HTML document
    pub fn parse(source: &str) -> Self {
        Self::parse_within(source, None)
    }

    /// Parse a document, restricting the visible text to the first `container` match
    pub fn parse_within(source: &str, container: Option<&Selector>) -> Self {
        let document = Html::parse_document(source);
        let root = container
            .and_then(|sel| document.select(sel).next())
            .unwrap_or_else(|| document.root_element());
        let text = element_text(root);
        Self {
            document,
            source: source.to_string(),
            text,
        }
    }

    pub fn document(&self) -> &Html {
        &self.document
    }

    /// Raw HTML as received
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Visible text, one block per line, whitespace collapsed
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.text.lines()
    }

    pub fn has_body_text(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Text of the `<title>` element
    pub fn title(&self) -> Option<String> {
        static TITLE: Lazy<Selector> = Lazy::new(|| css("title"));
        self.document
            .select(&TITLE)
            .next()
            .map(|el| collapse_whitespace(&el.text().collect::<String>()))
            .filter(|t| !t.is_empty())
    }
}

/// Visible text of an element: block elements on their own lines, inline text glued
pub fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(element, &mut raw);
    raw.lines()
        .map(collapse_whitespace)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn collect_text(element: ElementRef<'_>, out: &mut String) {
    for child in element.children() {
        match child.value() {
            Node::Text(text) => out.push_str(text),
            Node::Element(el) => {
                let name = el.name();
                if SKIPPED_TAGS.contains(&name) {
                    continue;
                }
                if name == "br" {
                    out.push('\n');
                    continue;
                }
                let block = BLOCK_TAGS.contains(&name);
                if block {
                    out.push('\n');
                }
                if let Some(child_el) = ElementRef::wrap(child) {
                    collect_text(child_el, out);
                }
                if block {
                    out.push('\n');
                }
            }
            _ => {}
        }
    }
}

/// Collapse runs of whitespace (including non-breaking spaces) into single spaces
pub fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Trim whitespace and stray punctuation from both ends
pub fn trim_punctuation(s: &str) -> &str {
    s.trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(
                c,
                ',' | ';' | ':' | '.' | '-' | '–' | '—' | '|' | '/' | '•' | '·' | '*' | '>' | '"'
            )
    })
}

/// Lower-case `s` and strip the accents French text uses
pub fn fold_accents(s: &str) -> String {
    s.chars()
        .flat_map(char::to_lowercase)
        .map(|c| match c {
            'à' | 'â' | 'ä' => 'a',
            'é' | 'è' | 'ê' | 'ë' => 'e',
            'î' | 'ï' => 'i',
            'ô' | 'ö' => 'o',
            'ù' | 'û' | 'ü' => 'u',
            'ç' => 'c',
            'ÿ' => 'y',
            other => other,
        })
        .collect()
}

/// Decode numeric and the common named HTML entities
pub fn decode_entities(s: &str) -> String {
    if !s.contains('&') {
        return s.to_string();
    }
    let numeric = NUMERIC_ENTITY.replace_all(s, |caps: &Captures| {
        let code = match (caps.get(1), caps.get(2)) {
            (Some(hex), _) => u32::from_str_radix(hex.as_str(), 16).ok(),
            (_, Some(dec)) => dec.as_str().parse::<u32>().ok(),
            _ => None,
        };
        code.and_then(char::from_u32)
            .map(String::from)
            .unwrap_or_else(|| caps[0].to_string())
    });
    NAMED_ENTITY
        .replace_all(&numeric, |caps: &Captures| {
            match &caps[1] {
                "amp" => "&",
                "lt" => "<",
                "gt" => ">",
                "quot" => "\"",
                "apos" => "'",
                "nbsp" => " ",
                "commat" => "@",
                "period" => ".",
                _ => "-",
            }
            .to_string()
        })
        .into_owned()
}

/// Compile a CSS selector supplied at runtime
pub fn selector(css_text: &str) -> Result<Selector> {
    Selector::parse(css_text)
        .map_err(|e| AnnuaireError::Config(format!("Invalid CSS selector '{}': {:?}", css_text, e)))
}

/// Compile a CSS selector known to be valid
pub(crate) fn css(css_text: &'static str) -> Selector {
    Selector::parse(css_text).unwrap_or_else(|e| panic!("invalid built-in selector {css_text}: {e:?}"))
}
