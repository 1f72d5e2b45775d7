use chrono::{DateTime, Local};
use comfy_table::{presets::ASCII_FULL, Cell, CellAlignment, ContentArrangement, Table};
use std::collections::HashMap;

use crate::record::{LawyerRecord, SkippedProfile};

const SAMPLE_SIZE: usize = 5;

/// Run facts the exporter cannot derive from the records
#[derive(Debug, Clone)]
pub struct RunReport {
    pub site: String,
    pub seed_url: String,
    pub started_at: DateTime<Local>,
    pub finished_at: DateTime<Local>,
    pub profiles_discovered: usize,
    pub skipped: Vec<SkippedProfile>,
    pub cancelled: bool,
    /// Set when the run ended with a fatal error (discovery, browser setup)
    pub fatal_error: Option<String>,
}

impl RunReport {
    pub fn new(site: impl Into<String>, seed_url: impl Into<String>) -> Self {
        let now = Local::now();
        Self {
            site: site.into(),
            seed_url: seed_url.into(),
            started_at: now,
            finished_at: now,
            profiles_discovered: 0,
            skipped: Vec::new(),
            cancelled: false,
            fatal_error: None,
        }
    }

    pub fn skip(&mut self, profile_url: impl Into<String>, reason: impl Into<String>) {
        self.skipped.push(SkippedProfile {
            profile_url: profile_url.into(),
            reason: reason.into(),
        });
    }
}

/// Field coverage over the exported records
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Stats {
    pub total: usize,
    pub with_email: usize,
    pub with_phone: usize,
    pub with_fax: usize,
    pub with_address: usize,
    pub with_oath_year: usize,
    pub with_specializations: usize,
    pub with_structure: usize,
    pub ambiguous_names: usize,
    pub skipped: usize,
}

impl Stats {
    pub fn collect(records: &[LawyerRecord], skipped: usize) -> Self {
        let count = |f: fn(&LawyerRecord) -> bool| records.iter().filter(|r| f(r)).count();
        Self {
            total: records.len(),
            with_email: count(|r| !r.email.is_empty()),
            with_phone: count(|r| !r.phone.is_empty()),
            with_fax: count(|r| !r.fax.is_empty()),
            with_address: count(LawyerRecord::has_address),
            with_oath_year: count(|r| r.oath_year.is_some()),
            with_specializations: count(|r| !r.specializations.is_empty()),
            with_structure: count(|r| !r.structure.is_empty()),
            ambiguous_names: count(|r| r.name_ambiguous),
            skipped,
        }
    }

    fn rows(&self) -> [(&'static str, usize); 10] {
        [
            ("Records", self.total),
            ("With email", self.with_email),
            ("With phone", self.with_phone),
            ("With fax", self.with_fax),
            ("With address", self.with_address),
            ("With oath year", self.with_oath_year),
            ("With specializations", self.with_specializations),
            ("With structure", self.with_structure),
            ("Ambiguous names", self.ambiguous_names),
            ("Skipped profiles", self.skipped),
        ]
    }

    /// Statistics block shared by the console and the report file
    pub fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(ASCII_FULL);
        table.set_header(vec!["Statistic", "Count", "%"]);
        for (index, (label, value)) in self.rows().into_iter().enumerate() {
            // first and last rows are not coverage figures
            let share = if index == 0 || index == 9 {
                String::new()
            } else {
                percent(value, self.total)
            };
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
                Cell::new(share).set_alignment(CellAlignment::Right),
            ]);
        }
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table
    }
}

fn percent(value: usize, total: usize) -> String {
    if total == 0 {
        return "0.0".to_string();
    }
    format!("{:.1}", value as f64 * 100.0 / total as f64)
}

/// Records per city, largest first then alphabetical
pub fn city_breakdown(records: &[LawyerRecord]) -> Vec<(String, usize)> {
    let mut counts: HashMap<String, usize> = HashMap::new();
    for record in records {
        let city = if record.city.is_empty() {
            "(unknown)".to_string()
        } else {
            record.city.to_uppercase()
        };
        *counts.entry(city).or_default() += 1;
    }

    let mut breakdown: Vec<_> = counts.into_iter().collect();
    breakdown.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    breakdown
}

/// Full text of the `_rapport.txt` file
pub fn render(records: &[LawyerRecord], report: &RunReport) -> String {
    let stats = Stats::collect(records, report.skipped.len());
    let mut out = String::new();

    out.push_str(&format!("Directory harvest report: {}\n", report.site));
    out.push_str(&format!("Seed URL: {}\n", report.seed_url));
    out.push_str(&format!(
        "Started: {}\nFinished: {}\n",
        report.started_at.format("%Y-%m-%d %H:%M:%S"),
        report.finished_at.format("%Y-%m-%d %H:%M:%S")
    ));
    out.push_str(&format!(
        "Profiles discovered: {}\n",
        report.profiles_discovered
    ));
    if report.cancelled {
        out.push_str("Run interrupted before the directory was exhausted\n");
    }
    if let Some(error) = &report.fatal_error {
        out.push_str(&format!("Fatal error: {}\n", error));
    }

    out.push_str("\n== Statistics ==\n");
    out.push_str(&stats.table().to_string());
    out.push('\n');

    out.push_str("\n== By city ==\n");
    let mut cities = Table::new();
    cities.load_preset(ASCII_FULL);
    cities.set_header(vec!["City", "Records"]);
    for (city, count) in city_breakdown(records) {
        cities.add_row(vec![
            Cell::new(city),
            Cell::new(count).set_alignment(CellAlignment::Right),
        ]);
    }
    out.push_str(&cities.to_string());
    out.push('\n');

    out.push_str("\n== Skipped profiles ==\n");
    if report.skipped.is_empty() {
        out.push_str("none\n");
    }
    for skipped in &report.skipped {
        out.push_str(&format!("- {} ({})\n", skipped.profile_url, skipped.reason));
    }

    out.push_str("\n== Sample ==\n");
    for record in records.iter().take(SAMPLE_SIZE) {
        out.push_str(&sample_entry(record));
        out.push('\n');
    }
    out
}

fn sample_entry(record: &LawyerRecord) -> String {
    let mut lines = vec![format!("{} [{}]", record.display_name(), record.signature())];
    let mut field = |label: &str, value: &str| {
        if !value.is_empty() {
            lines.push(format!("  {}: {}", label, value));
        }
    };

    field("Structure", &record.structure);
    let address = [
        record.street_address.as_str(),
        record.postal_code.as_str(),
        record.city.as_str(),
    ]
    .into_iter()
    .filter(|p| !p.is_empty())
    .collect::<Vec<_>>()
    .join(" ");
    field("Address", &address);
    field("Phone", &record.phone);
    field("Fax", &record.fax);
    field("Email", &record.email);
    let oath = record.oath_year.map(|y| y.to_string()).unwrap_or_default();
    field("Oath", record.oath_date.as_deref().unwrap_or(&oath));
    field("Specializations", &record.specializations.join(", "));
    field("Profile", &record.profile_url);

    let mut entry = lines.join("\n");
    entry.push('\n');
    entry
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(url: &str, city: &str, email: &str) -> LawyerRecord {
        let mut record = LawyerRecord::new(url, "arras");
        record.family_name = "DUPONT".to_string();
        record.city = city.to_string();
        record.email = email.to_string();
        record
    }

    #[test]
    fn test_stats_counts() {
        let mut a = record("u1", "ARRAS", "a@x.fr");
        a.name_ambiguous = true;
        a.oath_year = Some(2001);
        let b = record("u2", "Lens", "");

        let stats = Stats::collect(&[a, b], 3);
        assert_eq!(stats.total, 2);
        assert_eq!(stats.with_email, 1);
        assert_eq!(stats.with_oath_year, 1);
        assert_eq!(stats.ambiguous_names, 1);
        assert_eq!(stats.skipped, 3);
        assert_eq!(stats.with_phone, 0);
    }

    #[test]
    fn test_city_breakdown_order() {
        let records = vec![
            record("u1", "LENS", ""),
            record("u2", "ARRAS", ""),
            record("u3", "Arras", ""),
            record("u4", "", ""),
            record("u5", "BETHUNE", ""),
        ];
        assert_eq!(
            city_breakdown(&records),
            vec![
                ("ARRAS".to_string(), 2),
                ("(unknown)".to_string(), 1),
                ("BETHUNE".to_string(), 1),
                ("LENS".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_render_sections() {
        let records: Vec<_> = (0..7)
            .map(|i| record(&format!("https://b.example/{}", i), "ARRAS", ""))
            .collect();
        let mut report = RunReport::new("arras", "https://b.example/");
        report.profiles_discovered = 8;
        report.skip("https://b.example/7", "HTTP 500 for https://b.example/7");

        let text = render(&records, &report);
        assert!(text.contains("Directory harvest report: arras"));
        assert!(text.contains("Profiles discovered: 8"));
        assert!(text.contains("With email"));
        assert!(text.contains("- https://b.example/7 (HTTP 500"));
        assert_eq!(text.matches("Profile: https://b.example/").count(), 5);
    }

    #[test]
    fn test_percent_of_empty_total() {
        assert_eq!(percent(0, 0), "0.0");
        assert_eq!(percent(1, 3), "33.3");
    }
}
