//! Reading the abstracts table and writing it back with cluster labels.

use csv::{ReaderBuilder, StringRecord, Writer};
use std::io::{Read, Write};
use std::path::Path;
use tracing::{debug, info};

use crate::error::ClusterError;

/// Name of the column appended to the clustered table.
pub const CLUSTER_COLUMN: &str = "cluster";

/// Rows of the abstracts CSV that carry a non-empty text.
#[derive(Debug, Clone)]
pub struct AbstractsTable {
    pub headers: StringRecord,
    pub rows: Vec<StringRecord>,
    pub id_column: usize,
    pub text_column: usize,
    /// Rows read before empty texts were dropped.
    pub total_rows: usize,
}

impl AbstractsTable {
    pub fn from_path(path: &Path) -> Result<Self, ClusterError> {
        let file = std::fs::File::open(path)?;
        let table = Self::from_reader(file)?;
        info!(
            "Loaded {} rows from {}, {} with non-empty text",
            table.total_rows,
            path.display(),
            table.rows.len()
        );
        Ok(table)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ClusterError> {
        let mut reader = ReaderBuilder::new().flexible(true).from_reader(reader);
        let headers = reader.headers()?.clone();
        let (id_column, text_column) = detect_columns(&headers)?;
        debug!(
            id = headers.get(id_column).unwrap_or_default(),
            text = headers.get(text_column).unwrap_or_default(),
            "Detected columns"
        );

        let mut rows = Vec::new();
        let mut total_rows = 0;
        for record in reader.records() {
            let record = record?;
            total_rows += 1;
            let has_text = record.get(text_column).map_or(false, |t| !t.trim().is_empty());
            if has_text {
                rows.push(record);
            }
        }

        Ok(Self { headers, rows, id_column, text_column, total_rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn id(&self, row: usize) -> &str {
        self.rows[row].get(self.id_column).unwrap_or_default()
    }

    pub fn text(&self, row: usize) -> &str {
        self.rows[row].get(self.text_column).unwrap_or_default()
    }

    pub fn texts(&self) -> Vec<String> {
        (0..self.rows.len()).map(|i| self.text(i).to_string()).collect()
    }

    /// Writes every kept row with its original columns plus [`CLUSTER_COLUMN`].
    pub fn write_clustered<W: Write>(
        &self,
        writer: W,
        labels: &[usize],
    ) -> Result<(), ClusterError> {
        if labels.len() != self.rows.len() {
            return Err(ClusterError::DimensionMismatch {
                expected: self.rows.len(),
                found: labels.len(),
            });
        }

        let mut writer = Writer::from_writer(writer);
        let mut headers = self.headers.clone();
        headers.push_field(CLUSTER_COLUMN);
        writer.write_record(&headers)?;

        for (row, label) in self.rows.iter().zip(labels) {
            let mut record = row.clone();
            // Short rows are padded so every line has the header's width
            while record.len() < self.headers.len() {
                record.push_field("");
            }
            record.push_field(&label.to_string());
            writer.write_record(&record)?;
        }

        writer.flush()?;
        Ok(())
    }

    pub fn write_clustered_to_path(
        &self,
        path: &Path,
        labels: &[usize],
    ) -> Result<(), ClusterError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = std::fs::File::create(path)?;
        self.write_clustered(file, labels)?;
        info!("Clustered table written to {}", path.display());
        Ok(())
    }
}

/// Picks `(id, text)` columns: `id` by name else the first column, `abstract` or
/// `text` by name else the second column. Names match case-insensitively.
pub fn detect_columns(headers: &StringRecord) -> Result<(usize, usize), ClusterError> {
    let position = |name: &str| headers.iter().position(|h| h.trim().eq_ignore_ascii_case(name));

    let text_column = position("abstract")
        .or_else(|| position("text"))
        .or(if headers.len() > 1 { Some(1) } else { None })
        .ok_or_else(|| ClusterError::MissingColumn("abstract".to_string()))?;

    let id_column = position("id")
        .or(if headers.is_empty() { None } else { Some(0) })
        .ok_or_else(|| ClusterError::MissingColumn("id".to_string()))?;

    Ok((id_column, text_column))
}
