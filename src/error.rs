use thiserror::Error;

#[derive(Debug, Error)]
pub enum AnnuaireError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Transport error for {url}: {message}")]
    Transport { url: String, message: String },

    #[error("Timeout: {url} did not respond within {seconds} seconds")]
    Timeout { url: String, seconds: u64 },

    #[error("HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Ambiguous name: {0}")]
    NameAmbiguous(String),

    #[error("Invalid {field}: {value}")]
    Validation { field: String, value: String },

    #[error("Discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("No records extracted")]
    NoRecords,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("WebDriver error: {0}")]
    WebDriver(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("{0}")]
    Other(String),
}

impl AnnuaireError {
    /// Build a transport error for a URL
    pub fn transport(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Get user-friendly hint for the error
    pub fn hint(&self) -> Option<String> {
        match self {
            Self::Network(_) | Self::Transport { .. } => {
                Some("Check your internet connection and that the directory site is up.".to_string())
            }
            Self::Timeout { .. } => Some(
                "The site is slow to answer. Raise fetch.timeout with 'annuaire config set fetch.timeout 60'."
                    .to_string(),
            ),
            Self::WebDriver(_) => Some(
                "Rendered mode needs a running chromedriver or geckodriver. \
                 Start one (e.g. 'chromedriver --port=9515') or set webdriver.url."
                    .to_string(),
            ),
            Self::DiscoveryFailed(_) => Some(
                "No listing page could be read. Check seed_url and the selectors of the site file."
                    .to_string(),
            ),
            Self::NoRecords => {
                Some("Run with --verbose to see why each profile was skipped.".to_string())
            }
            _ => None,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Transport { .. } | Self::Timeout { .. } => true,
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Errors that end the whole run rather than a single profile
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::DiscoveryFailed(_) | Self::NoRecords | Self::Config(_) | Self::WebDriver(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AnnuaireError>;
