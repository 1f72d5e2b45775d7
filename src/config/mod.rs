pub mod site;

pub use site::{
    FetchMode, FilterConfig, ListingConfig, SelectorConfig, SiteDescriptor, Strategy,
};

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{AnnuaireError, Result};

const CONFIG_DIR_NAME: &str = ".annuaire";
const CONFIG_FILE_NAME: &str = "config.yaml";

/// A plain desktop Chrome identifier
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";

/// Keys accepted by `config get` / `config set`
pub const CONFIG_KEYS: &[&str] = &[
    "output.dir",
    "fetch.user_agent",
    "fetch.timeout",
    "fetch.max_retries",
    "webdriver.url",
];

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub webdriver: WebDriverConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OutputConfig {
    /// Directory receiving the export files
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("output"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FetchConfig {
    pub user_agent: String,
    /// Per-request timeout in seconds
    pub timeout: u64,
    pub max_retries: u32,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WebDriverConfig {
    /// Base URL of a running chromedriver/geckodriver
    pub url: String,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBDRIVER_URL.to_string(),
        }
    }
}

impl Config {
    /// Get the configuration directory path
    pub fn config_path() -> Result<PathBuf> {
        let home_dir = dirs::home_dir()
            .ok_or_else(|| AnnuaireError::Config("Could not determine home directory".to_string()))?;

        Ok(home_dir.join(CONFIG_DIR_NAME))
    }

    /// Get the configuration file full path
    pub fn config_file_path() -> Result<PathBuf> {
        Ok(Self::config_path()?.join(CONFIG_FILE_NAME))
    }

    /// Initialize configuration directory and file
    pub fn initialize() -> Result<()> {
        let config_file = Self::config_file_path()?;
        Self::initialize_at(&config_file)
    }

    fn initialize_at(config_file: &Path) -> Result<()> {
        if let Some(config_dir) = config_file.parent() {
            if !config_dir.exists() {
                fs::create_dir_all(config_dir).map_err(|e| {
                    AnnuaireError::Config(format!("Failed to create config directory: {}", e))
                })?;

                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    let permissions = fs::Permissions::from_mode(0o700);
                    fs::set_permissions(config_dir, permissions).map_err(|e| {
                        AnnuaireError::Config(format!("Failed to set directory permissions: {}", e))
                    })?;
                }
            }
        }

        if !config_file.exists() {
            Self::default().save_to(config_file)?;
        }

        Ok(())
    }

    /// Load configuration from file
    pub fn load() -> Result<Self> {
        let config_file = Self::config_file_path()?;
        Self::load_from(&config_file)
    }

    /// Load configuration from an explicit file, creating it with defaults if missing
    pub fn load_from(config_file: &Path) -> Result<Self> {
        Self::initialize_at(config_file)?;

        let contents = fs::read_to_string(config_file)
            .map_err(|e| AnnuaireError::Config(format!("Failed to read config file: {}", e)))?;

        serde_yaml::from_str(&contents)
            .map_err(|e| AnnuaireError::Config(format!("Failed to parse config file: {}", e)))
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_file = Self::config_file_path()?;
        Self::initialize_at(&config_file)?;
        self.save_to(&config_file)
    }

    fn save_to(&self, config_file: &Path) -> Result<()> {
        let yaml = serde_yaml::to_string(self)
            .map_err(|e| AnnuaireError::Config(format!("Failed to serialize config: {}", e)))?;

        fs::write(config_file, yaml)
            .map_err(|e| AnnuaireError::Config(format!("Failed to write config file: {}", e)))?;

        // Set file permissions to 0600 on Unix
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let permissions = fs::Permissions::from_mode(0o600);
            fs::set_permissions(config_file, permissions)
                .map_err(|e| AnnuaireError::Config(format!("Failed to set file permissions: {}", e)))?;
        }

        Ok(())
    }

    /// Set a configuration value by key path and persist it
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.set_value(key, value)?;
        self.save()
    }

    /// Set a configuration value by key path in memory
    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        let invalid = || AnnuaireError::Validation {
            field: key.to_string(),
            value: value.to_string(),
        };

        match key {
            "output.dir" => self.output.dir = PathBuf::from(value),
            "fetch.user_agent" => self.fetch.user_agent = value.to_string(),
            "fetch.timeout" => {
                self.fetch.timeout = value.parse::<u64>().ok().filter(|t| *t > 0).ok_or_else(invalid)?
            }
            "fetch.max_retries" => self.fetch.max_retries = value.parse::<u32>().map_err(|_| invalid())?,
            "webdriver.url" => {
                url::Url::parse(value).map_err(|_| invalid())?;
                self.webdriver.url = value.to_string();
            }
            _ => {
                return Err(AnnuaireError::Config(format!(
                    "Unknown configuration key: {}",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Get a configuration value by key path
    pub fn get(&self, key: &str) -> Option<String> {
        match key {
            "output.dir" => Some(self.output.dir.display().to_string()),
            "fetch.user_agent" => Some(self.fetch.user_agent.clone()),
            "fetch.timeout" => Some(self.fetch.timeout.to_string()),
            "fetch.max_retries" => Some(self.fetch.max_retries.to_string()),
            "webdriver.url" => Some(self.webdriver.url.clone()),
            _ => None,
        }
    }
}
