pub mod formatter;
pub mod report;

pub use formatter::Formatter;
pub use report::{RunReport, Stats};

use chrono::{DateTime, Local};
use log::info;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::record::{LawyerRecord, RecordStatus};

pub const DEFAULT_DELIMITER: u8 = b';';

/// Files written by one export
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub csv: PathBuf,
    pub json: PathBuf,
    pub emails: PathBuf,
    pub vcard: PathBuf,
    pub report: PathBuf,
}

impl ExportPaths {
    pub fn all(&self) -> [&Path; 5] {
        [
            self.csv.as_path(),
            self.json.as_path(),
            self.emails.as_path(),
            self.vcard.as_path(),
            self.report.as_path(),
        ]
    }
}

/// Writes the deduplicated collection to flat files
#[derive(Debug, Clone)]
pub struct Exporter {
    dir: PathBuf,
    delimiter: u8,
}

impl Exporter {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            delimiter: DEFAULT_DELIMITER,
        }
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    /// `<site>_<count>_<YYYYMMDD_HHMMSS>`
    pub fn base_name(site: &str, count: usize, at: DateTime<Local>) -> String {
        format!("{}_{}_{}", site, count, at.format("%Y%m%d_%H%M%S"))
    }

    pub fn export(&self, records: &[LawyerRecord], report: &RunReport) -> Result<ExportPaths> {
        self.export_at(records, report, Local::now())
    }

    /// Export with an explicit timestamp for the file names
    pub fn export_at(
        &self,
        records: &[LawyerRecord],
        report: &RunReport,
        at: DateTime<Local>,
    ) -> Result<ExportPaths> {
        let exported: Vec<LawyerRecord> = records
            .iter()
            .filter(|r| r.status != RecordStatus::Failed)
            .cloned()
            .collect();

        fs::create_dir_all(&self.dir)?;
        let base = Self::base_name(&report.site, exported.len(), at);
        let paths = ExportPaths {
            csv: self.dir.join(format!("{}.csv", base)),
            json: self.dir.join(format!("{}.json", base)),
            emails: self.dir.join(format!("{}_emails.txt", base)),
            vcard: self.dir.join(format!("{}.vcf", base)),
            report: self.dir.join(format!("{}_rapport.txt", base)),
        };

        fs::write(&paths.csv, formatter::to_csv(&exported, self.delimiter)?)?;
        fs::write(&paths.json, formatter::to_json(&exported)?)?;
        fs::write(&paths.emails, formatter::email_list(&exported))?;
        fs::write(&paths.vcard, formatter::to_vcard(&exported))?;
        fs::write(&paths.report, report::render(&exported, report))?;

        info!(
            "Exported {} records to {}",
            exported.len(),
            self.dir.display()
        );
        Ok(paths)
    }
}
