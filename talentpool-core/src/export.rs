//! Labeled CSV export
//!
//! Writes every filtered row with its original columns, followed by the
//! candidate's `Row_label` and `Column_label`. Candidates without a label
//! (or without a dated event) get empty cells.

use crate::classify::ClassifiedCandidate;
use crate::error::{DashboardError, Result};
use crate::filter::FilteredEvents;
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

pub const ROW_LABEL_COLUMN: &str = "Row_label";
pub const COLUMN_LABEL_COLUMN: &str = "Column_label";

/// Write the labeled rows to any writer; returns the number of data rows
pub fn write_labeled<W: Write>(
    writer: W,
    filtered: &FilteredEvents<'_>,
    classified: &[ClassifiedCandidate<'_>],
) -> Result<usize> {
    let labels: HashMap<&str, (&str, &str)> = classified
        .iter()
        .map(|c| {
            (
                c.candidate_id(),
                (c.label.map_or("", |l| l.as_str()), c.band.as_str()),
            )
        })
        .collect();

    let table = filtered.table();
    let width = table.headers().len();
    let mut wtr = csv::Writer::from_writer(writer);

    let mut header: Vec<&str> = table.headers().iter().collect();
    header.push(ROW_LABEL_COLUMN);
    header.push(COLUMN_LABEL_COLUMN);
    wtr.write_record(&header)?;

    let mut written = 0usize;
    for event in filtered.events() {
        let Some(record) = table.record(event.row) else {
            continue;
        };
        let (row_label, column_label) = labels
            .get(event.candidate_id.as_str())
            .copied()
            .unwrap_or(("", ""));

        let mut fields: Vec<&str> = record.iter().take(width).collect();
        fields.resize(width, "");
        fields.push(row_label);
        fields.push(column_label);
        wtr.write_record(&fields)?;
        written += 1;
    }
    wtr.flush().map_err(|e| DashboardError::Csv(e.into()))?;
    Ok(written)
}

/// Write the labeled export to `path` (temp file + rename)
pub fn export_labeled_csv(
    path: &Path,
    filtered: &FilteredEvents<'_>,
    classified: &[ClassifiedCandidate<'_>],
) -> Result<usize> {
    let written = atomic_write(path, |file| write_labeled(file, filtered, classified))?;
    tracing::debug!(path = %path.display(), rows = written, "wrote labeled export");
    Ok(written)
}

/// Run `write` against `<path>.csv.tmp`, then rename it over `path`
///
/// The temp file is removed when `write` fails.
fn atomic_write<T>(
    path: &Path,
    write: impl FnOnce(BufWriter<File>) -> Result<T>,
) -> Result<T> {
    let io_err = |source| DashboardError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(io_err)?;
    }

    let temp_path = path.with_extension("csv.tmp");
    let file = File::create(&temp_path).map_err(io_err)?;
    let out = match write(BufWriter::new(file)) {
        Ok(out) => out,
        Err(e) => {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e);
        }
    };
    std::fs::rename(&temp_path, path).map_err(io_err)?;
    Ok(out)
}
