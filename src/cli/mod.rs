pub mod args;
pub mod commands;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// French bar-association directory harvester
#[derive(Parser, Debug)]
#[command(
    name = "annuaire",
    about = "Harvest a bar-association lawyer directory into CSV, JSON, vCard and a report",
    version,
    author,
    long_about = None
)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// No progress bars and no per-profile lines
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Output format
    #[arg(short, long, global = true, value_enum, default_value = "table")]
    pub format: OutputFormat,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    Table,
    /// JSON format
    Json,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Harvest a directory described by a site file
    #[command(alias = "r")]
    Run(args::RunArgs),

    /// Extract one record from a saved profile page
    #[command(alias = "x")]
    Extract(args::ExtractArgs),

    /// Split raw names into given and family names
    #[command(alias = "n")]
    Name(args::NameArgs),

    /// Manage configuration
    #[command(alias = "c")]
    Config(args::ConfigArgs),

    /// Show version information
    Version,

    /// Generate shell completion scripts
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Cli {
    /// Generate shell completion scripts
    fn generate_completions(shell: Shell) {
        use clap::CommandFactory;
        use clap_complete::generate;
        use std::io;

        let mut cmd = Self::command();
        let name = cmd.get_name().to_string();
        generate(shell, &mut cmd, name, &mut io::stdout());
    }

    fn init_logging(&self) {
        let level = if self.verbose { "debug" } else { "warn" };
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
    }

    /// Run the CLI application
    pub async fn run() -> crate::error::Result<()> {
        let cli = Self::parse();
        cli.init_logging();

        let result = match cli.command {
            Commands::Run(args) => commands::run::execute(args, cli.quiet, cli.verbose).await,
            Commands::Extract(args) => commands::extract::execute(args, cli.format),
            Commands::Name(args) => commands::name::execute(args, cli.format),
            Commands::Config(args) => commands::config::execute(args),
            Commands::Version => {
                commands::version::execute();
                Ok(())
            }
            Commands::Completions { shell } => {
                Self::generate_completions(shell);
                Ok(())
            }
        };

        // Handle errors with better messaging
        if let Err(e) = &result {
            eprintln!("Error: {}", e);
            if let Some(hint) = e.hint() {
                eprintln!("\nHint: {}", hint);
            }
        }
        result
    }
}
