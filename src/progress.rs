use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{self, IsTerminal};
use std::sync::Arc;
use std::time::Duration;

/// Progress indicator manager
pub struct ProgressManager {
    multi: Arc<MultiProgress>,
    enabled: bool,
    verbose: bool,
}

impl ProgressManager {
    /// Create a new progress manager
    pub fn new(quiet: bool, verbose: bool) -> Self {
        // Only enable progress if we're in a terminal and not in quiet mode
        let enabled = !quiet && io::stdout().is_terminal();

        Self {
            multi: Arc::new(MultiProgress::new()),
            enabled,
            verbose,
        }
    }

    /// Spinner for phases of unknown length (discovery, export)
    pub fn create_spinner(&self, message: &str) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let pb = self.multi.add(ProgressBar::new_spinner());
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_strings(&["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"]),
        );
        pb.set_message(message.to_string());
        pb.enable_steady_tick(Duration::from_millis(100));

        Some(pb)
    }

    /// Bar over the profiles when the count is bounded, spinner otherwise
    pub fn create_profile_progress(&self, limit: Option<usize>) -> Option<ProgressBar> {
        if !self.enabled {
            return None;
        }

        let pb = match limit {
            Some(total) => {
                let pb = self.multi.add(ProgressBar::new(total as u64));
                pb.set_style(
                    ProgressStyle::default_bar()
                        .template("{msg}\n{bar:40.cyan/blue} {pos}/{len} ({percent}%)")
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("█▓░"),
                );
                pb
            }
            None => {
                let pb = self.multi.add(ProgressBar::new_spinner());
                pb.set_style(
                    ProgressStyle::default_spinner()
                        .template("{spinner:.green} {pos} profiles {msg}")
                        .unwrap_or_else(|_| ProgressStyle::default_spinner()),
                );
                pb.enable_steady_tick(Duration::from_millis(100));
                pb
            }
        };
        pb.set_message(messages::HARVESTING);

        Some(pb)
    }

    /// Print a line without tearing the progress bars
    pub fn println(&self, line: &str) {
        if self.enabled {
            let _ = self.multi.println(line);
        } else {
            println!("{}", line);
        }
    }

    /// Show a simple message (for verbose mode)
    pub fn show_message(&self, message: &str) {
        if self.verbose && self.enabled {
            eprintln!("🔍 {}", message);
        }
    }

    /// Check if progress is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

/// Spinner that clears itself when dropped unfinished
pub struct PhaseProgress {
    spinner: Option<ProgressBar>,
    manager: Arc<ProgressManager>,
}

impl PhaseProgress {
    pub fn new(manager: Arc<ProgressManager>, message: &str) -> Self {
        let spinner = manager.create_spinner(message);
        Self { spinner, manager }
    }

    /// Finish with a success message
    pub fn finish_with_message(&self, message: &str) {
        if let Some(ref pb) = self.spinner {
            pb.finish_with_message(format!("✅ {}", message));
        }
        self.manager.show_message(&format!("Done: {}", message));
    }
}

impl Drop for PhaseProgress {
    fn drop(&mut self) {
        if let Some(ref pb) = self.spinner {
            if !pb.is_finished() {
                pb.finish_and_clear();
            }
        }
    }
}

/// Progress messages for the harvest phases
pub mod messages {
    pub const CONNECTING: &str = "Starting browser session...";
    pub const CONNECTED: &str = "Browser session ready";
    pub const HARVESTING: &str = "Harvesting profiles...";
    pub const EXPORTING: &str = "Writing exports...";

    pub fn discovering(site: &str) -> String {
        format!("Walking the {} directory...", site)
    }

    pub fn profile(current: usize, url: &str) -> String {
        format!("#{} {}", current, url)
    }

    pub fn harvest_complete(records: usize, skipped: usize) -> String {
        format!("{} records, {} skipped", records, skipped)
    }

    pub fn exported(files: usize) -> String {
        format!("{} files written", files)
    }
}
