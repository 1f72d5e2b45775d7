//! The harvest loop: walk, fetch, assemble, deduplicate, export.

use chrono::Local;
use colored::*;
use log::{info, warn};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::assemble::RecordAssembler;
use crate::config::SiteDescriptor;
use crate::dedup::{DedupOutcome, Deduplicator};
use crate::discovery::DirectoryWalker;
use crate::error::{AnnuaireError, Result};
use crate::fetch::Fetcher;
use crate::output::{ExportPaths, Exporter, RunReport, Stats, DEFAULT_DELIMITER};
use crate::progress::{messages, PhaseProgress, ProgressManager};
use crate::record::{LawyerRecord, RecordStatus};

/// Per-run knobs coming from the command line
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Stop after this many profiles
    pub limit: Option<usize>,
    pub output_dir: PathBuf,
    pub delimiter: u8,
    /// No per-profile console lines
    pub quiet: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            limit: None,
            output_dir: PathBuf::from("."),
            delimiter: DEFAULT_DELIMITER,
            quiet: false,
        }
    }
}

/// Result of a run whose exports were written
#[derive(Debug)]
pub struct RunOutcome {
    pub records: Vec<LawyerRecord>,
    pub report: RunReport,
    pub paths: ExportPaths,
    /// Fatal discovery error, raised after the exports were written
    pub error: Option<AnnuaireError>,
}

impl RunOutcome {
    pub fn exported(&self) -> usize {
        self.records
            .iter()
            .filter(|r| r.status != RecordStatus::Failed)
            .count()
    }

    pub fn stats(&self) -> Stats {
        Stats::collect(&self.records, self.report.skipped.len())
    }

    /// Exit semantics: an error when discovery failed or nothing was exported
    pub fn into_result(self) -> Result<()> {
        if let Some(error) = self.error {
            return Err(error);
        }
        if self.exported() == 0 {
            return Err(AnnuaireError::NoRecords);
        }
        Ok(())
    }
}

impl RunOptions {
    fn exporter(&self) -> Exporter {
        Exporter::new(&self.output_dir).with_delimiter(self.delimiter)
    }
}

/// Write the empty exports of a run that failed before harvesting
///
/// The report carries `error` so that the failure is recorded next to the
/// (empty) data files.
pub fn export_aborted(
    site: &SiteDescriptor,
    options: &RunOptions,
    error: &AnnuaireError,
) -> Result<ExportPaths> {
    let mut report = RunReport::new(&site.tag, &site.seed_url);
    report.fatal_error = Some(error.to_string());
    options.exporter().export(&[], &report)
}

pub struct Pipeline<'a> {
    site: &'a SiteDescriptor,
    fetcher: &'a dyn Fetcher,
    options: RunOptions,
    cancel: CancellationToken,
    progress: Arc<ProgressManager>,
}

impl<'a> Pipeline<'a> {
    pub fn new(site: &'a SiteDescriptor, fetcher: &'a dyn Fetcher, options: RunOptions) -> Self {
        let quiet = options.quiet;
        Self {
            site,
            fetcher,
            options,
            cancel: CancellationToken::new(),
            progress: Arc::new(ProgressManager::new(quiet, false)),
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_progress(mut self, progress: Arc<ProgressManager>) -> Self {
        self.progress = progress;
        self
    }

    /// Harvest the site and write the exports
    ///
    /// Exports are written whatever happened during the harvest (cancellation,
    /// discovery failure); the fetcher is always closed.
    pub async fn run(&self) -> Result<RunOutcome> {
        let mut report = RunReport::new(&self.site.tag, &self.site.seed_url);
        let mut dedup = Deduplicator::new();

        let harvest = self.harvest(&mut dedup, &mut report).await;
        if let Err(e) = self.fetcher.close().await {
            warn!("Closing the fetcher failed: {}", e);
        }
        report.finished_at = Local::now();

        let error = match harvest {
            Ok(()) => None,
            Err(e) if e.is_fatal() => {
                warn!("{}", e);
                report.fatal_error = Some(e.to_string());
                Some(e)
            }
            Err(e) => return Err(e),
        };

        let records = dedup.into_records();
        let paths = {
            let spinner = PhaseProgress::new(self.progress.clone(), messages::EXPORTING);
            let paths = self.options.exporter().export(&records, &report)?;
            spinner.finish_with_message(&messages::exported(paths.all().len()));
            paths
        };

        Ok(RunOutcome {
            records,
            report,
            paths,
            error,
        })
    }

    async fn harvest(&self, dedup: &mut Deduplicator, report: &mut RunReport) -> Result<()> {
        let mut walker = DirectoryWalker::new(self.site, self.fetcher)?;
        let assembler = RecordAssembler::new(self.site, self.fetcher)?;
        let bar = self.progress.create_profile_progress(self.options.limit);
        let mut processed = 0usize;

        info!("{}", messages::discovering(&self.site.tag));
        loop {
            if self.options.limit.is_some_and(|limit| processed >= limit) {
                info!("Profile limit reached");
                break;
            }
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    report.cancelled = true;
                    break;
                }
                next = walker.next() => next,
            };
            report.profiles_discovered = walker.yielded();
            let url = match next {
                Ok(Some(url)) => url,
                Ok(None) => break,
                Err(e) => {
                    if let Some(bar) = &bar {
                        bar.finish_and_clear();
                    }
                    return Err(e);
                }
            };

            let record = tokio::select! {
                _ = self.cancel.cancelled() => {
                    info!("Cancelled while fetching {}", url);
                    report.cancelled = true;
                    break;
                }
                record = assembler.assemble(&url) => record,
            };
            processed += 1;
            if let Some(bar) = &bar {
                bar.set_message(messages::profile(processed, &url));
                bar.inc(1);
            }
            self.accept(record, dedup, report);
        }

        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        if report.cancelled {
            warn!("Run interrupted after {} profile(s)", processed);
        }
        info!(
            "{}",
            messages::harvest_complete(dedup.len(), report.skipped.len())
        );
        Ok(())
    }

    fn accept(&self, record: LawyerRecord, dedup: &mut Deduplicator, report: &mut RunReport) {
        if record.status == RecordStatus::Failed {
            let reason = record
                .notes
                .first()
                .cloned()
                .unwrap_or_else(|| "fetch failed".to_string());
            if !self.options.quiet {
                self.progress.println(&format!(
                    "{} {} {}",
                    "--------".red(),
                    record.profile_url,
                    reason.dimmed()
                ));
            }
            report.skip(record.profile_url, reason);
            return;
        }

        let line = format!(
            "{} {} {}",
            record.signature().green(),
            record.display_name().bold(),
            record.profile_url.dimmed()
        );
        if let DedupOutcome::Merged(_) = dedup.push(record) {
            if !self.options.quiet {
                self.progress.println(&format!("{} {}", line, "(merged)".yellow()));
            }
        } else if !self.options.quiet {
            self.progress.println(&line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Strategy;
    use crate::fetch::{FetchMode, FetchedPage};
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;

    struct MemoryFetcher {
        pages: HashMap<String, String>,
        closed: AtomicUsize,
    }

    impl MemoryFetcher {
        fn new(pages: &[(&str, &str)]) -> Self {
            Self {
                pages: pages
                    .iter()
                    .map(|(u, h)| (u.to_string(), h.to_string()))
                    .collect(),
                closed: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Fetcher for MemoryFetcher {
        async fn fetch(&self, url: &str) -> Result<FetchedPage> {
            match self.pages.get(url) {
                Some(html) => Ok(FetchedPage {
                    url: url.to_string(),
                    html: html.clone(),
                    dom: None,
                }),
                None => Err(AnnuaireError::HttpStatus {
                    status: 404,
                    url: url.to_string(),
                }),
            }
        }

        fn mode(&self) -> FetchMode {
            FetchMode::Static
        }

        async fn close(&self) -> Result<()> {
            self.closed.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn site() -> SiteDescriptor {
        let mut site = SiteDescriptor::new("test", "https://b.example/annuaire");
        site.strategies = vec![Strategy::StaticList];
        site.static_url_list = vec![
            "https://b.example/avocat/1".to_string(),
            "https://b.example/avocat/2".to_string(),
            "https://b.example/avocat/3".to_string(),
        ];
        site.polite_delay_seconds = 0.0;
        site
    }

    fn options(dir: &TempDir) -> RunOptions {
        RunOptions {
            output_dir: dir.path().to_path_buf(),
            quiet: true,
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_run_skips_failed_profiles_and_closes() {
        let fetcher = MemoryFetcher::new(&[
            ("https://b.example/avocat/1", "<h1>Jean DUPONT</h1>"),
            ("https://b.example/avocat/2", "<h1>Alix GROS-LE MAUT</h1>"),
        ]);
        let temp = TempDir::new().unwrap();
        let site = site();

        let outcome = Pipeline::new(&site, &fetcher, options(&temp))
            .run()
            .await
            .unwrap();

        assert_eq!(outcome.records.len(), 2);
        assert_eq!(outcome.report.skipped.len(), 1);
        assert_eq!(outcome.report.skipped[0].profile_url, "https://b.example/avocat/3");
        assert_eq!(outcome.report.profiles_discovered, 3);
        assert_eq!(fetcher.closed.load(Ordering::SeqCst), 1);
        assert!(outcome.paths.csv.exists());
        assert!(outcome.into_result().is_ok());
    }

    #[tokio::test]
    async fn test_limit_stops_early() {
        let fetcher = MemoryFetcher::new(&[
            ("https://b.example/avocat/1", "<h1>Jean DUPONT</h1>"),
            ("https://b.example/avocat/2", "<h1>Paul MARTIN</h1>"),
        ]);
        let temp = TempDir::new().unwrap();
        let site = site();
        let options = RunOptions {
            limit: Some(1),
            ..options(&temp)
        };

        let outcome = Pipeline::new(&site, &fetcher, options).run().await.unwrap();
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].family_name, "DUPONT");
    }

    #[tokio::test]
    async fn test_no_records_is_an_error_after_export() {
        let fetcher = MemoryFetcher::new(&[]);
        let temp = TempDir::new().unwrap();
        let site = site();

        let outcome = Pipeline::new(&site, &fetcher, options(&temp))
            .run()
            .await
            .unwrap();

        assert!(outcome.paths.json.exists());
        assert_eq!(outcome.report.skipped.len(), 3);
        assert!(matches!(outcome.into_result(), Err(AnnuaireError::NoRecords)));
    }

    #[tokio::test]
    async fn test_cancelled_before_start_still_exports() {
        let fetcher = MemoryFetcher::new(&[("https://b.example/avocat/1", "<h1>Jean DUPONT</h1>")]);
        let temp = TempDir::new().unwrap();
        let site = site();
        let token = CancellationToken::new();
        token.cancel();

        let outcome = Pipeline::new(&site, &fetcher, options(&temp))
            .with_cancellation(token)
            .run()
            .await
            .unwrap();

        assert!(outcome.report.cancelled);
        assert!(outcome.records.is_empty());
        assert!(outcome.paths.report.exists());
        assert_eq!(fetcher.closed.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_discovery_failure_is_reported_after_export() {
        let fetcher = MemoryFetcher::new(&[]);
        let temp = TempDir::new().unwrap();
        let mut site = site();
        site.strategies = vec![Strategy::Paginated];

        let outcome = Pipeline::new(&site, &fetcher, options(&temp))
            .run()
            .await
            .unwrap();

        assert!(outcome.report.fatal_error.is_some());
        assert!(outcome.paths.csv.exists());
        assert!(matches!(
            outcome.into_result(),
            Err(AnnuaireError::DiscoveryFailed(_))
        ));
    }
}
