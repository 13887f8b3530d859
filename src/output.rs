use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use tracing::info;

use crate::enrich::DegradeReason;
use crate::error::OutputError;
use crate::record::EnrichedRecord;

/// Rows in order plus the first-seen union of their field names.
pub struct OutputTable {
    columns: Vec<String>,
    rows: Vec<EnrichedRecord>,
}

impl OutputTable {
    pub fn new(rows: Vec<EnrichedRecord>) -> Self {
        let mut columns: Vec<String> = Vec::new();
        for row in &rows {
            for key in row.keys() {
                if !columns.iter().any(|c| c == key) {
                    columns.push(key.to_string());
                }
            }
        }
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Rows that carry only their URL.
    pub fn degraded(&self) -> usize {
        self.rows.iter().filter(|r| r.is_degraded()).count()
    }

    pub fn write_csv<W: io::Write>(&self, writer: W) -> Result<(), OutputError> {
        let mut wtr = csv::Writer::from_writer(writer);
        if self.columns.is_empty() {
            return Ok(());
        }
        wtr.write_record(&self.columns)?;
        for row in &self.rows {
            wtr.write_record(self.columns.iter().map(|c| row.get(c).unwrap_or("")))?;
        }
        wtr.flush()?;
        Ok(())
    }

    pub fn write_to_path(&self, path: &Path) -> Result<(), OutputError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_csv(file)?;
        info!(path = %path.display(), rows = self.len(), columns = self.columns().len(), "wrote output table");
        Ok(())
    }
}

/// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>.csv`
pub fn output_path(dir: &Path, prefix: &str, at: DateTime<Local>) -> PathBuf {
    dir.join(format!("{}_{}.csv", prefix, at.format("%Y%m%d_%H%M%S")))
}

/// Sibling of the main table: `<stem>_failures.csv`.
pub fn failure_report_path(table: &Path) -> PathBuf {
    let stem = table
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    table.with_file_name(format!("{stem}_failures.csv"))
}

/// One row per degraded record with the reason it was degraded.
pub fn write_failures<W: io::Write>(
    writer: W,
    failures: &[(&str, &DegradeReason)],
) -> Result<(), OutputError> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["flixable_url", "reason"])?;
    for (url, reason) in failures {
        wtr.write_record([*url, reason.to_string().as_str()])?;
    }
    wtr.flush()?;
    Ok(())
}
