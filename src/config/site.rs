//! Site descriptors.
//!
//! Everything that differs between two bar-association directories lives in
//! a descriptor file, read from YAML or TOML depending on its extension.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::{AnnuaireError, Result};
use crate::extract::page::selector;
use crate::extract::DEFAULT_MAX_SPECIALIZATIONS;
use crate::name::NameOverrides;

/// How profile URLs are discovered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Paginated,
    Alphabetical,
    Filtered,
    StaticList,
}

impl Strategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Paginated => "paginated",
            Strategy::Alphabetical => "alphabetical",
            Strategy::Filtered => "filtered",
            Strategy::StaticList => "static_list",
        }
    }
}

impl std::fmt::Display for Strategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether pages are fetched as served or rendered by a browser
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FetchMode {
    #[default]
    Static,
    Rendered,
}

impl std::fmt::Display for FetchMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            FetchMode::Static => "static",
            FetchMode::Rendered => "rendered",
        })
    }
}

/// Listing pages walked by the `paginated` strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ListingConfig {
    /// Listing URL with a `{page}` or `{offset}` placeholder; the seed URL when absent
    pub url_template: Option<String>,
    pub page_start: u32,
    /// Entries per page, used to compute `{offset}`
    pub page_size: u32,
    pub max_pages: u32,
    /// Pagination link whose text or `href` holds the last page number
    pub last_page_selector: Option<String>,
}

impl Default for ListingConfig {
    fn default() -> Self {
        Self {
            url_template: None,
            page_start: 1,
            page_size: 20,
            max_pages: 500,
            last_page_selector: None,
        }
    }
}

/// Filter form walked by the `filtered` strategy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterConfig {
    /// Page holding the filter options; the seed URL when absent
    #[serde(default)]
    pub options_url: Option<String>,
    #[serde(default = "default_option_selector")]
    pub option_selector: String,
    /// Result URL with a `{value}` placeholder
    pub url_template: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    /// Links to profiles on listing pages (default `a[href]`)
    pub profile_link: Option<String>,
    /// Regular expression a profile URL must match
    pub profile_url_pattern: Option<String>,
    pub profile_container: Option<String>,
    pub name: Option<String>,
    pub specialization: Option<String>,
    pub structure: Option<String>,
    /// Element whose presence marks a rendered page as ready
    pub wait_for: Option<String>,
}

/// Description of one directory site
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SiteDescriptor {
    #[serde(default)]
    pub tag: String,
    pub seed_url: String,
    #[serde(default = "default_strategies")]
    pub strategies: Vec<Strategy>,
    #[serde(default)]
    pub fetch_mode: FetchMode,
    #[serde(default = "default_polite_delay")]
    pub polite_delay_seconds: f64,
    #[serde(default)]
    pub delay_jitter_seconds: f64,
    #[serde(default)]
    pub static_url_list: Vec<String>,
    #[serde(default)]
    pub name_overrides: NameOverrides,
    #[serde(default)]
    pub phone_denylist: Vec<String>,
    #[serde(default)]
    pub email_denylist: Vec<String>,
    #[serde(default)]
    pub listing: ListingConfig,
    #[serde(default)]
    pub alphabet_url_template: Option<String>,
    #[serde(default)]
    pub filter: Option<FilterConfig>,
    #[serde(default)]
    pub selectors: SelectorConfig,
    #[serde(default = "default_max_specializations")]
    pub max_specializations: usize,
    #[serde(default = "default_phone_separator")]
    pub phone_separator: String,
}

fn default_strategies() -> Vec<Strategy> {
    vec![Strategy::Paginated]
}

fn default_polite_delay() -> f64 {
    1.5
}

fn default_max_specializations() -> usize {
    DEFAULT_MAX_SPECIALIZATIONS
}

fn default_phone_separator() -> String {
    ".".to_string()
}

fn default_option_selector() -> String {
    "select option".to_string()
}

impl SiteDescriptor {
    /// Minimal descriptor for a seed URL, every other field defaulted
    pub fn new(tag: impl Into<String>, seed_url: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            seed_url: seed_url.into(),
            strategies: default_strategies(),
            fetch_mode: FetchMode::default(),
            polite_delay_seconds: default_polite_delay(),
            delay_jitter_seconds: 0.0,
            static_url_list: Vec::new(),
            name_overrides: NameOverrides::new(),
            phone_denylist: Vec::new(),
            email_denylist: Vec::new(),
            listing: ListingConfig::default(),
            alphabet_url_template: None,
            filter: None,
            selectors: SelectorConfig::default(),
            max_specializations: default_max_specializations(),
            phone_separator: default_phone_separator(),
        }
    }

    /// Read and validate a descriptor file (`.yaml`, `.yml` or `.toml`)
    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            AnnuaireError::Config(format!("Failed to read site file {}: {}", path.display(), e))
        })?;

        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase())
            .unwrap_or_default();
        let mut site = match extension.as_str() {
            "toml" => Self::from_toml(&contents)?,
            "yaml" | "yml" => Self::from_yaml(&contents)?,
            other => {
                return Err(AnnuaireError::Config(format!(
                    "Unsupported site file extension '{}' (expected yaml, yml or toml)",
                    other
                )))
            }
        };

        if site.tag.trim().is_empty() {
            site.tag = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or("site")
                .to_string();
        }
        site.validate()?;
        Ok(site)
    }

    pub fn from_yaml(contents: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(contents)?)
    }

    pub fn from_toml(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Check the descriptor is usable before any request is made
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.seed_url)
            .map_err(|e| invalid(format!("seed_url '{}': {}", self.seed_url, e)))?;

        if self.strategies.is_empty() {
            return Err(invalid("strategies must not be empty".to_string()));
        }
        if !(self.polite_delay_seconds >= 0.0) || !(self.delay_jitter_seconds >= 0.0) {
            return Err(invalid("delays must be non-negative".to_string()));
        }
        if self.max_specializations == 0 {
            return Err(invalid("max_specializations must be at least 1".to_string()));
        }

        for strategy in &self.strategies {
            match strategy {
                Strategy::StaticList if self.static_url_list.is_empty() => {
                    return Err(invalid(
                        "static_list strategy requires a non-empty static_url_list".to_string(),
                    ));
                }
                Strategy::Alphabetical
                    if !self
                        .alphabet_url_template
                        .as_deref()
                        .is_some_and(|t| t.contains("{letter}")) =>
                {
                    return Err(invalid(
                        "alphabetical strategy requires alphabet_url_template with {letter}"
                            .to_string(),
                    ));
                }
                Strategy::Filtered
                    if !self
                        .filter
                        .as_ref()
                        .is_some_and(|f| f.url_template.contains("{value}")) =>
                {
                    return Err(invalid(
                        "filtered strategy requires filter.url_template with {value}".to_string(),
                    ));
                }
                _ => {}
            }
        }

        let selectors = [
            self.selectors.profile_link.as_deref(),
            self.selectors.profile_container.as_deref(),
            self.selectors.name.as_deref(),
            self.selectors.specialization.as_deref(),
            self.selectors.structure.as_deref(),
            self.selectors.wait_for.as_deref(),
            self.listing.last_page_selector.as_deref(),
            self.filter.as_ref().map(|f| f.option_selector.as_str()),
        ];
        for css in selectors.into_iter().flatten() {
            selector(css)?;
        }

        if let Some(pattern) = &self.selectors.profile_url_pattern {
            regex::Regex::new(pattern)
                .map_err(|e| invalid(format!("profile_url_pattern '{}': {}", pattern, e)))?;
        }

        Ok(())
    }
}

fn invalid(message: String) -> AnnuaireError {
    AnnuaireError::Config(format!("Invalid site descriptor: {}", message))
}
