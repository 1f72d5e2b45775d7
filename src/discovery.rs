//! Directory walker.
//!
//! Turns a site descriptor into a lazy, duplicate-free sequence of absolute
//! profile URLs. Listing pages are only fetched when the caller asks for
//! the next URL and the already discovered ones are exhausted.

use log::{debug, info, warn};
use regex::Regex;
use scraper::{Html, Selector};
use std::collections::{HashSet, VecDeque};
use url::Url;

use crate::config::{SiteDescriptor, Strategy};
use crate::error::{AnnuaireError, Result};
use crate::extract::page::selector;
use crate::fetch::Fetcher;

const LETTERS: std::ops::RangeInclusive<char> = 'A'..='Z';

/// One walk over a listing: a fixed URL, or a template paged through
#[derive(Debug, Clone)]
struct Cursor {
    template: String,
    page: u32,
    walked: u32,
    last_page: Option<u32>,
}

impl Cursor {
    fn new(template: String, page_start: u32) -> Self {
        Self {
            template,
            page: page_start,
            walked: 0,
            last_page: None,
        }
    }

    fn is_paged(&self) -> bool {
        self.template.contains("{page}") || self.template.contains("{offset}")
    }
}

/// Outcome bookkeeping for one strategy
#[derive(Debug, Default)]
struct StrategyRun {
    pages_ok: usize,
    errors: usize,
}

impl StrategyRun {
    fn failed(&self) -> bool {
        self.errors > 0 && self.pages_ok == 0
    }
}

/// Lazy sequence of unique profile URLs for one site
pub struct DirectoryWalker<'a> {
    site: &'a SiteDescriptor,
    fetcher: &'a dyn Fetcher,
    link_selector: Selector,
    url_pattern: Option<Regex>,
    last_page_selector: Option<Selector>,
    strategies: VecDeque<Strategy>,
    current: Option<(Strategy, StrategyRun)>,
    cursors: VecDeque<Cursor>,
    pending: VecDeque<String>,
    seen: HashSet<String>,
    yielded: usize,
    failures: Vec<String>,
    finished: Vec<bool>,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(site: &'a SiteDescriptor, fetcher: &'a dyn Fetcher) -> Result<Self> {
        let link_selector = selector(site.selectors.profile_link.as_deref().unwrap_or("a[href]"))?;
        let url_pattern = site
            .selectors
            .profile_url_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .map_err(|e| AnnuaireError::Config(format!("Invalid profile_url_pattern: {}", e)))?;
        let last_page_selector = site
            .listing
            .last_page_selector
            .as_deref()
            .map(selector)
            .transpose()?;

        Ok(Self {
            site,
            fetcher,
            link_selector,
            url_pattern,
            last_page_selector,
            strategies: site.strategies.iter().copied().collect(),
            current: None,
            cursors: VecDeque::new(),
            pending: VecDeque::new(),
            seen: HashSet::new(),
            yielded: 0,
            failures: Vec::new(),
            finished: Vec::new(),
        })
    }

    /// Number of distinct URLs yielded so far
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Next unseen profile URL, `None` once every strategy is exhausted
    pub async fn next(&mut self) -> Result<Option<String>> {
        loop {
            if let Some(url) = self.pending.pop_front() {
                self.yielded += 1;
                return Ok(Some(url));
            }

            if let Some(cursor) = self.cursors.pop_front() {
                self.step(cursor).await;
                continue;
            }

            self.finish_current();

            match self.strategies.pop_front() {
                Some(strategy) => self.start(strategy).await,
                None => return self.exhausted(),
            }
        }
    }

    fn exhausted(&self) -> Result<Option<String>> {
        let all_failed = !self.finished.is_empty() && self.finished.iter().all(|failed| *failed);
        if all_failed && self.yielded == 0 {
            return Err(AnnuaireError::DiscoveryFailed(self.failures.join("; ")));
        }
        Ok(None)
    }

    fn finish_current(&mut self) {
        if let Some((strategy, run)) = self.current.take() {
            info!(
                "Strategy {} done: {} listing page(s), {} error(s), {} URL(s) so far",
                strategy, run.pages_ok, run.errors, self.seen.len()
            );
            self.finished.push(run.failed());
        }
    }

    async fn start(&mut self, strategy: Strategy) {
        info!("Discovery strategy: {}", strategy);
        self.current = Some((strategy, StrategyRun::default()));
        let site = self.site;
        let page_start = site.listing.page_start;

        match strategy {
            Strategy::Paginated => {
                let template = site
                    .listing
                    .url_template
                    .clone()
                    .unwrap_or_else(|| site.seed_url.clone());
                self.cursors.push_back(Cursor::new(template, page_start));
            }
            Strategy::Alphabetical => match site.alphabet_url_template.as_deref() {
                Some(template) => {
                    for letter in LETTERS {
                        let url = template.replace("{letter}", &letter.to_string());
                        self.cursors.push_back(Cursor::new(url, page_start));
                    }
                }
                None => self.fail("alphabetical: no alphabet_url_template".to_string()),
            },
            Strategy::Filtered => self.start_filtered().await,
            Strategy::StaticList => {
                let base = Url::parse(&site.seed_url).ok();
                let mut added = 0;
                for raw in &site.static_url_list {
                    let resolved = resolve(base.as_ref(), raw);
                    match resolved {
                        Some(url) => {
                            if self.offer(url) {
                                added += 1;
                            }
                        }
                        None => warn!("static_list: ignoring malformed URL {}", raw),
                    }
                }
                if let Some((_, run)) = self.current.as_mut() {
                    run.pages_ok += 1;
                }
                debug!("static_list: {} new URL(s)", added);
            }
        }
    }

    async fn start_filtered(&mut self) {
        let site = self.site;
        let Some(filter) = site.filter.as_ref() else {
            self.fail("filtered: no filter section".to_string());
            return;
        };
        let options_url = filter
            .options_url
            .clone()
            .unwrap_or_else(|| site.seed_url.clone());

        let html = match self.fetcher.fetch(&options_url).await {
            Ok(page) => page.html,
            Err(e) => {
                self.fail(format!("filtered: {}: {}", options_url, e));
                return;
            }
        };

        let values = match selector(&filter.option_selector) {
            Ok(sel) => option_values(&html, &sel),
            Err(e) => {
                self.fail(format!("filtered: {}", e));
                return;
            }
        };
        if let Some((_, run)) = self.current.as_mut() {
            run.pages_ok += 1;
        }
        info!("filtered: {} filter value(s) on {}", values.len(), options_url);

        for value in values {
            let url = filter
                .url_template
                .replace("{value}", &urlencoding::encode(&value));
            self.cursors
                .push_back(Cursor::new(url, site.listing.page_start));
        }
    }

    /// Fetch one listing page and queue its profile links
    async fn step(&mut self, mut cursor: Cursor) {
        let listing = &self.site.listing;
        let (page_start, page_size, max_pages) =
            (listing.page_start, listing.page_size, listing.max_pages);
        let url = expand(&cursor.template, cursor.page, page_start, page_size);

        let html = match self.fetcher.fetch(&url).await {
            Ok(page) => page.html,
            Err(e) => {
                self.fail(format!("{}: {}", url, e));
                return;
            }
        };

        let base = Url::parse(&url).ok();
        let (links, last_page) = self.read_listing(&html, base.as_ref(), cursor.walked == 0);
        if let Some((_, run)) = self.current.as_mut() {
            run.pages_ok += 1;
        }

        let new_links = links.into_iter().filter(|link| self.offer(link.clone())).count();
        debug!("{}: {} new profile link(s)", url, new_links);

        if cursor.walked == 0 {
            cursor.last_page = last_page;
        }
        cursor.walked += 1;

        let more_pages = cursor.is_paged()
            && new_links > 0
            && cursor.walked < max_pages
            && cursor.last_page.map_or(true, |last| cursor.page < last);
        if more_pages {
            cursor.page += 1;
            self.cursors.push_front(cursor);
        }
    }

    fn read_listing(
        &self,
        html: &str,
        base: Option<&Url>,
        first_page: bool,
    ) -> (Vec<String>, Option<u32>) {
        let document = Html::parse_document(html);

        let links = document
            .select(&self.link_selector)
            .filter_map(|a| a.value().attr("href"))
            .filter_map(|href| resolve(base, href))
            .filter(|url| {
                self.url_pattern
                    .as_ref()
                    .map_or(true, |pattern| pattern.is_match(url))
            })
            .collect();

        let last_page = if first_page {
            self.last_page_selector
                .as_ref()
                .and_then(|sel| last_page_number(&document, sel))
        } else {
            None
        };

        (links, last_page)
    }

    /// Queue a URL unless it was already seen
    fn offer(&mut self, url: String) -> bool {
        if self.seen.insert(url.clone()) {
            self.pending.push_back(url);
            true
        } else {
            false
        }
    }

    fn fail(&mut self, message: String) {
        warn!("Discovery: {}", message);
        if let Some((_, run)) = self.current.as_mut() {
            run.errors += 1;
        }
        self.failures.push(message);
    }
}

/// Substitute `{page}` and `{offset}` in a listing template
fn expand(template: &str, page: u32, page_start: u32, page_size: u32) -> String {
    let offset = page.saturating_sub(page_start) * page_size;
    template
        .replace("{page}", &page.to_string())
        .replace("{offset}", &offset.to_string())
}

/// Absolute URL without fragment, `None` for non-navigational links
fn resolve(base: Option<&Url>, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || ["javascript:", "mailto:", "tel:"].iter().any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let mut url = match base {
        Some(base) => base.join(href).ok()?,
        None => Url::parse(href).ok()?,
    };
    if !matches!(url.scheme(), "http" | "https") {
        return None;
    }
    url.set_fragment(None);
    Some(url.to_string())
}

fn option_values(html: &str, option_selector: &Selector) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut values: Vec<String> = Vec::new();
    for option in document.select(option_selector) {
        let value = option.value().attr("value").unwrap_or_default().trim();
        if !value.is_empty() && !values.iter().any(|v| v == value) {
            values.push(value.to_string());
        }
    }
    values
}

/// Highest page number shown by the pagination links
fn last_page_number(document: &Html, sel: &Selector) -> Option<u32> {
    static NUMBER: once_cell::sync::Lazy<Regex> =
        once_cell::sync::Lazy::new(|| Regex::new(r"\d{1,4}").unwrap());

    document
        .select(sel)
        .flat_map(|el| {
            let text: String = el.text().collect();
            let href = el.value().attr("href").unwrap_or_default().to_string();
            NUMBER
                .find_iter(&text)
                .chain(NUMBER.find_iter(&href))
                .filter_map(|m| m.as_str().parse::<u32>().ok())
                .collect::<Vec<_>>()
        })
        .max()
}
