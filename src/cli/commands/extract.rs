use std::fs;

use crate::assemble::ProfileExtractor;
use crate::cli::args::ExtractArgs;
use crate::cli::OutputFormat;
use crate::config::SiteDescriptor;
use crate::error::{AnnuaireError, Result};
use crate::output::Formatter;

/// Execute extract command
pub fn execute(args: ExtractArgs, format: OutputFormat) -> Result<()> {
    let bytes = fs::read(&args.html).map_err(|e| {
        AnnuaireError::InvalidInput(format!("Cannot read {}: {}", args.html.display(), e))
    })?;
    let html = String::from_utf8_lossy(&bytes);

    let extractor = match &args.site {
        Some(path) => ProfileExtractor::new(&SiteDescriptor::load(path)?)?,
        None => ProfileExtractor::standalone("local"),
    };
    let url = args
        .url
        .unwrap_or_else(|| format!("file://{}", args.html.display()));

    let record = extractor.extract(&url, &html);
    println!("{}", Formatter::new(format).format_record(&record)?);
    Ok(())
}
