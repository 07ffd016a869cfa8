//! Writing the collected video records to a CSV file.

use crate::catalog::VideoRecord;
use eyre::Context;
use std::path::Path;

/// Column names of the exported file, in column order.
pub const HEADER: [&str; 3] = ["Video Title", "Playlist", "Video URL"];

/// Renders `records` as CSV: the header row, then one row per record in input order.
///
/// Fields containing commas, quotes, or line breaks are quoted; embedded quotes are doubled.
pub fn render(records: &[VideoRecord]) -> eyre::Result<Vec<u8>> {
    // The header is written by hand so that an empty export still has one.
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(HEADER).context("write CSV header")?;
    for record in records {
        writer
            .serialize(record)
            .with_context(|| format!("write CSV row for {:?}", record.url))?;
    }
    writer
        .into_inner()
        .map_err(|e| eyre::eyre!("flush CSV output: {}", e.error()))
}

/// Writes `records` to `path` as UTF-8 CSV, replacing any existing file, and returns the number
/// of data rows written.
#[tracing::instrument(skip(records), fields(records = records.len()))]
pub async fn export(path: &Path, records: &[VideoRecord]) -> eyre::Result<usize> {
    let csv = render(records)?;
    tokio::fs::write(path, csv)
        .await
        .with_context(|| format!("write {}", path.display()))?;
    tracing::info!(path = %path.display(), rows = records.len(), "wrote CSV export");
    Ok(records.len())
}
