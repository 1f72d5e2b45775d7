use colored::*;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use std::collections::BTreeSet;

use crate::cli::OutputFormat;
use crate::error::{AnnuaireError, Result};
use crate::name::ParsedName;
use crate::record::LawyerRecord;

/// Column order of the delimited export
pub const CSV_COLUMNS: [&str; 19] = [
    "given_name",
    "family_name",
    "full_name_raw",
    "oath_year",
    "oath_date",
    "specializations",
    "structure",
    "street_address",
    "postal_code",
    "city",
    "phone",
    "fax",
    "email",
    "profile_url",
    "extraction_timestamp",
    "site",
    "status",
    "name_ambiguous",
    "notes",
];

pub const SPECIALIZATION_SEPARATOR: &str = " | ";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Delimited table, UTF-8 with a byte-order mark so spreadsheet tools pick the encoding
pub fn to_csv(records: &[LawyerRecord], delimiter: u8) -> Result<Vec<u8>> {
    let mut buffer = UTF8_BOM.to_vec();
    {
        let mut wtr = csv::WriterBuilder::new()
            .delimiter(delimiter)
            .from_writer(&mut buffer);

        wtr.write_record(CSV_COLUMNS)?;
        for record in records {
            wtr.write_record(csv_row(record))?;
        }
        wtr.flush()?;
    }
    Ok(buffer)
}

fn csv_row(record: &LawyerRecord) -> [String; 19] {
    [
        record.given_name.clone(),
        record.family_name.clone(),
        record.full_name_raw.clone(),
        record.oath_year.map(|y| y.to_string()).unwrap_or_default(),
        record.oath_date.clone().unwrap_or_default(),
        record.specializations.join(SPECIALIZATION_SEPARATOR),
        record.structure.clone(),
        record.street_address.clone(),
        record.postal_code.clone(),
        record.city.clone(),
        record.phone.clone(),
        record.fax.clone(),
        record.email.clone(),
        record.profile_url.clone(),
        record.extraction_timestamp.to_rfc3339(),
        record.site.clone(),
        record.status.to_string(),
        record.name_ambiguous.to_string(),
        record.notes.join(SPECIALIZATION_SEPARATOR),
    ]
}

/// Pretty JSON array, specializations kept as lists
pub fn to_json(records: &[LawyerRecord]) -> Result<String> {
    Ok(serde_json::to_string_pretty(records)?)
}

/// One address per line, sorted and unique
pub fn email_list(records: &[LawyerRecord]) -> String {
    let emails: BTreeSet<String> = records
        .iter()
        .map(|r| r.email.trim().to_lowercase())
        .filter(|e| !e.is_empty())
        .collect();

    let mut out = String::new();
    for email in emails {
        out.push_str(&email);
        out.push('\n');
    }
    out
}

/// vCard 3.0 address book
pub fn to_vcard(records: &[LawyerRecord]) -> String {
    let mut out = String::new();
    for record in records {
        let mut lines = vec![
            "BEGIN:VCARD".to_string(),
            "VERSION:3.0".to_string(),
            format!(
                "N:{};{};;Maître;",
                escape_vcard(&record.family_name),
                escape_vcard(&record.given_name)
            ),
            format!("FN:{}", escape_vcard(&record.display_name())),
            "TITLE:Avocat".to_string(),
        ];
        if !record.structure.is_empty() {
            lines.push(format!("ORG:{}", escape_vcard(&record.structure)));
        }
        if record.has_address() || !record.city.is_empty() {
            lines.push(format!(
                "ADR;TYPE=WORK:;;{};{};;{};France",
                escape_vcard(&record.street_address),
                escape_vcard(&record.city),
                escape_vcard(&record.postal_code)
            ));
        }
        if !record.phone.is_empty() {
            lines.push(format!("TEL;TYPE=WORK,VOICE:{}", record.phone));
        }
        if !record.fax.is_empty() {
            lines.push(format!("TEL;TYPE=WORK,FAX:{}", record.fax));
        }
        if !record.email.is_empty() {
            lines.push(format!("EMAIL;TYPE=INTERNET:{}", record.email));
        }
        if !record.specializations.is_empty() {
            lines.push(format!(
                "NOTE:{}",
                escape_vcard(&record.specializations.join(", "))
            ));
        }
        lines.push(format!("URL:{}", record.profile_url));
        lines.push("END:VCARD".to_string());

        for line in lines {
            out.push_str(&line);
            out.push_str("\r\n");
        }
    }
    out
}

fn escape_vcard(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

/// Console rendering of single records and parsed names
pub struct Formatter {
    format: OutputFormat,
}

impl Formatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    pub fn format_record(&self, record: &LawyerRecord) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_record_table(record)),
            OutputFormat::Json => Ok(serde_json::to_string_pretty(record)?),
        }
    }

    pub fn format_names(&self, names: &[(String, ParsedName)]) -> Result<String> {
        match self.format {
            OutputFormat::Table => Ok(self.format_names_table(names)),
            OutputFormat::Json => {
                let values: Vec<_> = names
                    .iter()
                    .map(|(raw, parsed)| {
                        serde_json::json!({
                            "raw": raw,
                            "given": parsed.given,
                            "family": parsed.family,
                            "ambiguous": parsed.ambiguous,
                        })
                    })
                    .collect();
                serde_json::to_string_pretty(&values).map_err(AnnuaireError::from)
            }
        }
    }

    fn format_record_table(&self, record: &LawyerRecord) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("Field").fg(Color::Cyan),
            Cell::new("Value").fg(Color::Cyan),
        ]);

        let oath = match (&record.oath_date, record.oath_year) {
            (Some(date), _) => date.clone(),
            (None, Some(year)) => year.to_string(),
            (None, None) => String::new(),
        };
        let rows = [
            ("Given name", record.given_name.clone()),
            ("Family name", record.family_name.clone()),
            ("Raw name", record.full_name_raw.clone()),
            ("Oath", oath),
            ("Specializations", record.specializations.join("\n")),
            ("Structure", record.structure.clone()),
            ("Address", record.street_address.clone()),
            ("Postal code", record.postal_code.clone()),
            ("City", record.city.clone()),
            ("Phone", record.phone.clone()),
            ("Fax", record.fax.clone()),
            ("Email", record.email.clone()),
            ("Status", record.status.to_string()),
        ];
        for (label, value) in rows {
            let value = if value.is_empty() { "-".to_string() } else { value };
            table.add_row(vec![Cell::new(label), Cell::new(truncate_string(&value, 80))]);
        }
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let mut result = format!(
            "\n{} {} [{}]\n\n",
            "⚖".cyan(),
            record.display_name().bold(),
            record.signature().yellow()
        );
        result.push_str(&table.to_string());
        for note in &record.notes {
            result.push_str(&format!("\n{} {}", "!".yellow(), note));
        }
        result
    }

    fn format_names_table(&self, names: &[(String, ParsedName)]) -> String {
        let mut table = Table::new();
        table.set_header(vec![
            Cell::new("Raw").fg(Color::Cyan),
            Cell::new("Given").fg(Color::Cyan),
            Cell::new("Family").fg(Color::Cyan),
            Cell::new("Ambiguous").fg(Color::Cyan),
        ]);
        for (raw, parsed) in names {
            table.add_row(vec![
                Cell::new(raw),
                Cell::new(&parsed.given),
                Cell::new(&parsed.family),
                Cell::new(if parsed.ambiguous { "yes" } else { "" }),
            ]);
        }
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.to_string()
    }
}

pub(crate) fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}
