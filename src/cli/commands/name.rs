use crate::cli::args::NameArgs;
use crate::cli::OutputFormat;
use crate::config::SiteDescriptor;
use crate::error::Result;
use crate::name::{parse_name, NameOverrides};
use crate::output::Formatter;

/// Execute name command
pub fn execute(args: NameArgs, format: OutputFormat) -> Result<()> {
    let overrides = match &args.site {
        Some(path) => SiteDescriptor::load(path)?.name_overrides,
        None => NameOverrides::new(),
    };

    let parsed: Vec<_> = args
        .names
        .into_iter()
        .map(|raw| {
            let name = parse_name(&raw, &overrides);
            (raw, name)
        })
        .collect();

    println!("{}", Formatter::new(format).format_names(&parsed)?);
    Ok(())
}
