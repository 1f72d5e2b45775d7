use once_cell::sync::Lazy;
use scraper::{ElementRef, Node, Selector};

use super::page::{
    collapse_whitespace, css, element_text, fold_accents, trim_punctuation, ProfilePage,
};
use super::ExtractionRules;

/// Headings introducing a specialty list, lower-cased and without accents
const HEADINGS: &[&str] = &[
    "specialites",
    "specialite",
    "specialisations",
    "specialisation",
    "domaines de competences",
    "domaines de competence",
    "domaine de competences",
    "domaines d'intervention",
    "domaines d'activite",
    "domaines d'activites",
    "competences",
    "activites dominantes",
    "activite dominante",
    "mentions de specialisation",
    "mentions de specialisations",
];

/// Class name fragments of regions holding a specialty list
const CLASS_HINTS: &[&str] = &["specialit", "specialis", "competence", "domaine", "expertise"];

/// Legal domains that do not start with "Droit"
const CANONICAL_LABELS: &[&str] = &[
    "Contentieux administratif",
    "Contentieux commercial",
    "Contentieux des affaires",
    "Procédure civile",
    "Procédure pénale",
    "Dommage corporel",
    "Réparation du préjudice corporel",
    "Responsabilité médicale",
    "Propriété intellectuelle",
    "Baux commerciaux",
    "Voies d'exécution",
    "Recouvrement de créances",
    "Fiscalité",
    "Médiation",
    "Arbitrage",
];

/// Case-insensitive fragments of cookie banners, GDPR notices and navigation
const BOILERPLATE: &[&str] = &[
    "cookie",
    "rgpd",
    "conformément",
    "voir le détail",
    "astérisque",
    "obligatoire",
    "données personnelles",
    "protection des données",
    "politique de confidentialité",
    "mentions légales",
    "accepter",
    "refuser",
    "paramétrer",
    "en savoir plus",
    "cliquez",
    "retour",
    "accueil",
    "imprimer",
    "partager",
    "plan du site",
    "javascript",
    "navigateur",
    "newsletter",
    "rechercher",
    "contactez",
    "prendre rendez-vous",
    "connexion",
];

/// Case-sensitive fragments: capitalised, these only start consent notices
const BOILERPLATE_EXACT: &[&str] = &["Protection"];

/// Tags whose start ends the content under a heading
const SECTION_TAGS: &[&str] = &["h1", "h2", "h3", "h4", "h5", "h6", "dt"];

/// Specialties of the lawyer, in order of appearance
///
/// Candidates come from the configured selector, then from the content
/// under a specialty heading, then from a region whose class hints at a
/// specialty list, and finally from lines naming a legal domain. Every
/// candidate is filtered against boilerplate, deduplicated and capped.
pub fn extract_specializations(page: &ProfilePage, rules: &ExtractionRules) -> Vec<String> {
    let text = page.text().to_lowercase();
    if text.contains("génériques") || text.contains("generiques") {
        return Vec::new();
    }

    let sources: [fn(&ProfilePage, &ExtractionRules) -> Vec<String>; 4] =
        [from_selector, under_heading, from_class_hints, from_domain_lines];

    for source in sources {
        let kept = finalize(source(page, rules), rules.max_specializations);
        if !kept.is_empty() {
            return kept;
        }
    }
    Vec::new()
}

/// Whether a candidate carries boilerplate text
pub fn is_boilerplate(candidate: &str) -> bool {
    let lower = candidate.to_lowercase();
    BOILERPLATE.iter().any(|fragment| lower.contains(fragment))
        || BOILERPLATE_EXACT.iter().any(|fragment| candidate.contains(fragment))
}

fn from_selector(page: &ProfilePage, rules: &ExtractionRules) -> Vec<String> {
    let Some(sel) = rules.specialization_selector.as_ref() else {
        return Vec::new();
    };
    page.document().select(sel).flat_map(items_of).collect()
}

fn under_heading(page: &ProfilePage, _rules: &ExtractionRules) -> Vec<String> {
    static CANDIDATES: Lazy<Selector> = Lazy::new(|| {
        css("h1, h2, h3, h4, h5, h6, dt, strong, b, th, legend, label, p, span, div")
    });

    for el in page.document().select(&CANDIDATES) {
        let own = element_text(el);
        let (head, rest) = own.split_once(':').unwrap_or((own.as_str(), ""));
        if !is_heading(head) {
            continue;
        }

        let mut found = split_phrases(rest);
        if found.is_empty() {
            found = following_content(el);
        }
        if found.is_empty() {
            if let Some(parent) = el.parent().and_then(ElementRef::wrap) {
                if let Some(next) = parent.next_siblings().find_map(ElementRef::wrap) {
                    found = items_of(next);
                }
            }
        }
        if !found.is_empty() {
            return found;
        }
    }
    Vec::new()
}

/// Content after a heading, up to the next heading of the same kind
fn following_content(heading: ElementRef<'_>) -> Vec<String> {
    let tag = heading.value().name();
    let mut found = Vec::new();

    for sibling in heading.next_siblings() {
        match sibling.value() {
            Node::Text(text) => found.extend(split_phrases(text)),
            Node::Element(el) => {
                let name = el.name();
                if name == tag || SECTION_TAGS.contains(&name) {
                    break;
                }
                if let Some(sibling_el) = ElementRef::wrap(sibling) {
                    let sibling_text = element_text(sibling_el);
                    let head = sibling_text.split(':').next().unwrap_or_default();
                    if is_heading(head) {
                        break;
                    }
                    found.extend(items_of(sibling_el));
                }
            }
            _ => {}
        }
    }
    found
}

fn from_class_hints(page: &ProfilePage, _rules: &ExtractionRules) -> Vec<String> {
    static CLASSED: Lazy<Selector> = Lazy::new(|| css("[class]"));

    page.document()
        .select(&CLASSED)
        .filter(|el| {
            let class = fold_accents(el.value().attr("class").unwrap_or_default());
            CLASS_HINTS.iter().any(|hint| class.contains(hint))
        })
        .map(items_of)
        .find(|items| items.iter().any(|item| !is_heading(item) && !is_boilerplate(item)))
        .unwrap_or_default()
}

fn from_domain_lines(page: &ProfilePage, _rules: &ExtractionRules) -> Vec<String> {
    page.lines()
        .map(|line| trim_punctuation(line).to_string())
        .filter(|line| {
            let starts_with_droit = line.starts_with("Droit ") && line.chars().count() <= 80;
            starts_with_droit
                || CANONICAL_LABELS
                    .iter()
                    .any(|label| label.to_lowercase() == line.to_lowercase())
        })
        .collect()
}

/// List items of an element when it has any, its phrases otherwise
fn items_of(el: ElementRef<'_>) -> Vec<String> {
    static ITEMS: Lazy<Selector> = Lazy::new(|| css("li"));

    let items: Vec<String> = el
        .select(&ITEMS)
        .map(|li| collapse_whitespace(&element_text(li)))
        .filter(|item| !item.is_empty())
        .collect();
    if !items.is_empty() {
        return items;
    }
    split_phrases(&element_text(el))
}

/// Split free text into phrases
///
/// Newlines, semicolons and bullets always separate; a comma only does when
/// the next piece starts with a capital or with "droit".
fn split_phrases(text: &str) -> Vec<String> {
    let mut phrases = Vec::new();
    for chunk in text.split(['\n', ';', '•', '|', '·']) {
        let mut current = String::new();
        for piece in chunk.split(',') {
            let trimmed = piece.trim();
            let starts_new = trimmed.chars().next().is_some_and(char::is_uppercase)
                || trimmed.to_lowercase().starts_with("droit");
            if !current.is_empty() && starts_new {
                phrases.push(std::mem::take(&mut current));
            }
            if !current.is_empty() {
                current.push(',');
            }
            current.push_str(piece);
        }
        phrases.push(current);
    }
    phrases
        .iter()
        .map(|p| trim_punctuation(&collapse_whitespace(p)).to_string())
        .filter(|p| !p.is_empty())
        .collect()
}

fn finalize(candidates: Vec<String>, cap: usize) -> Vec<String> {
    let mut kept: Vec<String> = Vec::new();
    for candidate in candidates {
        let candidate = trim_punctuation(&collapse_whitespace(&candidate)).to_string();
        if !acceptable(&candidate) {
            continue;
        }
        let lower = candidate.to_lowercase();
        if kept.iter().any(|k| k.to_lowercase() == lower) {
            continue;
        }
        kept.push(candidate);
        if kept.len() >= cap {
            break;
        }
    }
    kept
}

fn acceptable(candidate: &str) -> bool {
    let len = candidate.chars().count();
    (3..=100).contains(&len)
        && candidate.chars().any(char::is_alphabetic)
        && !candidate.contains('@')
        && !candidate.to_lowercase().contains("http")
        && !is_heading(candidate)
        && !is_boilerplate(candidate)
}

fn is_heading(text: &str) -> bool {
    let normalized = fold_accents(&collapse_whitespace(trim_punctuation(text))).replace('’', "'");
    HEADINGS.iter().any(|heading| normalized == *heading)
}
