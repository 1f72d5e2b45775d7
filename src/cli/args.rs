use clap::{ArgAction, Args, Subcommand};
use std::path::PathBuf;

/// Run command arguments
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Site descriptor (.yaml, .yml or .toml)
    pub site: PathBuf,

    /// Stop after this many profiles (test mode)
    #[arg(short, long)]
    pub limit: Option<usize>,

    /// Run the browser without a window in rendered mode
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub headless: bool,

    /// Directory receiving the exports (defaults to output.dir)
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Field delimiter of the CSV export
    #[arg(short, long, default_value_t = ';')]
    pub delimiter: char,

    /// WebDriver endpoint (defaults to webdriver.url)
    #[arg(long, env = "ANNUAIRE_WEBDRIVER_URL")]
    pub webdriver_url: Option<String>,
}

/// Extract command arguments
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Saved profile page
    pub html: PathBuf,

    /// Site descriptor supplying selectors, denylists and name overrides
    #[arg(short, long)]
    pub site: Option<PathBuf>,

    /// Profile URL to record (defaults to the file path)
    #[arg(short, long)]
    pub url: Option<String>,
}

/// Name command arguments
#[derive(Args, Debug)]
pub struct NameArgs {
    /// Raw names as found on profile pages
    #[arg(required = true)]
    pub names: Vec<String>,

    /// Site descriptor supplying name overrides
    #[arg(short, long)]
    pub site: Option<PathBuf>,
}

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommand {
    /// Set a configuration value
    Set {
        /// Configuration key (e.g. fetch.timeout)
        key: String,
        /// Configuration value
        value: String,
    },

    /// Get a configuration value
    Get {
        /// Configuration key
        key: String,
    },

    /// List every configuration value
    List,

    /// Show configuration file path
    Path,
}
