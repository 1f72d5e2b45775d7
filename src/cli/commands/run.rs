use colored::*;
use log::{info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cli::args::RunArgs;
use crate::config::{Config, FetchMode, SiteDescriptor};
use crate::error::{AnnuaireError, Result};
use crate::fetch::{ClientConfig, Fetcher, FetcherFactory};
use crate::pipeline::{export_aborted, Pipeline, RunOptions};
use crate::progress::{messages, PhaseProgress, ProgressManager};

/// Execute run command
pub async fn execute(args: RunArgs, quiet: bool, verbose: bool) -> Result<()> {
    let config = Config::load()?;
    let site = SiteDescriptor::load(&args.site)?;
    let delimiter = delimiter_byte(args.delimiter)?;

    let mut client_config = ClientConfig::for_site(&config, &site);
    client_config.headless = args.headless;
    if let Some(url) = args.webdriver_url {
        client_config.webdriver_url = url;
    }

    let options = RunOptions {
        limit: args.limit,
        output_dir: args.output_dir.unwrap_or_else(|| config.output.dir.clone()),
        delimiter,
        quiet,
    };
    let progress = Arc::new(ProgressManager::new(quiet, verbose));
    info!(
        "Harvesting {} ({}, {} mode)",
        site.tag, site.seed_url, site.fetch_mode
    );
    let fetcher = connect(&site, client_config, &options, &progress).await?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, exporting what was collected so far");
            on_interrupt.cancel();
        }
    });

    let outcome = Pipeline::new(&site, fetcher.as_ref(), options)
        .with_cancellation(cancel)
        .with_progress(progress)
        .run()
        .await?;

    if !quiet {
        println!("\n{} {}", "📊".cyan(), site.tag.bold());
        println!("{}", outcome.stats().table());
        if outcome.report.cancelled {
            println!("{}", "Run interrupted".yellow());
        }
        for path in outcome.paths.all() {
            println!("  {}", path.display());
        }
    }
    outcome.into_result()
}

/// Open the fetcher; a failure still leaves a report behind
async fn connect(
    site: &SiteDescriptor,
    client_config: ClientConfig,
    options: &RunOptions,
    progress: &Arc<ProgressManager>,
) -> Result<Box<dyn Fetcher>> {
    let spinner = (site.fetch_mode == FetchMode::Rendered)
        .then(|| PhaseProgress::new(progress.clone(), messages::CONNECTING));

    match FetcherFactory::create(site.fetch_mode, client_config).await {
        Ok(fetcher) => {
            if let Some(spinner) = spinner {
                spinner.finish_with_message(messages::CONNECTED);
            }
            Ok(fetcher)
        }
        Err(e) => {
            drop(spinner);
            match export_aborted(site, options, &e) {
                Ok(paths) => info!("Failure recorded in {}", paths.report.display()),
                Err(export_error) => warn!("Could not write the exports: {}", export_error),
            }
            Err(e)
        }
    }
}

fn delimiter_byte(delimiter: char) -> Result<u8> {
    if delimiter.is_ascii() && !delimiter.is_ascii_alphanumeric() && delimiter != '"' {
        Ok(delimiter as u8)
    } else {
        Err(AnnuaireError::InvalidInput(format!(
            "delimiter must be a single ASCII punctuation or whitespace character, got '{}'",
            delimiter
        )))
    }
}
