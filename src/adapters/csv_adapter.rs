//! CSV table adapter.
//!
//! Files are long-format: the first `index_levels` columns hold the row key,
//! every remaining column is a numeric indicator. Key cells parse as
//! `YYYY-MM-DD` dates, then integers, else text; empty value cells are
//! missing (`NaN`).

use crate::domain::axis::Axis;
use crate::domain::error::ToolkitError;
use crate::domain::frame::{Container, LabeledTable, VALUE_COLUMN};
use crate::domain::label::{Key, Label};
use crate::ports::table_port::{TableSink, TableSource};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

const COLUMN_LEVEL: &str = "indicator";

pub struct CsvTableAdapter {
    base_path: PathBuf,
    index_levels: usize,
}

impl CsvTableAdapter {
    /// Adapter over `<base_path>/<name>.csv`, keyed by (time, asset).
    pub fn new(base_path: PathBuf) -> Self {
        Self {
            base_path,
            index_levels: 2,
        }
    }

    pub fn with_index_levels(mut self, index_levels: usize) -> Self {
        self.index_levels = index_levels;
        self
    }

    fn csv_path(&self, name: &str) -> PathBuf {
        if name.ends_with(".csv") {
            self.base_path.join(name)
        } else {
            self.base_path.join(format!("{}.csv", name))
        }
    }

    pub fn read_file(&self, path: &Path) -> Result<Container, ToolkitError> {
        let ingest = |reason: String| ToolkitError::Ingest {
            path: path.display().to_string(),
            reason,
        };
        if !(1..=2).contains(&self.index_levels) {
            return Err(ingest(format!(
                "index_levels must be 1 or 2, got {}",
                self.index_levels
            )));
        }

        let content = fs::read_to_string(path)
            .map_err(|e| ingest(format!("failed to read file: {}", e)))?;
        let mut rdr = csv::Reader::from_reader(content.as_bytes());

        let headers = rdr
            .headers()
            .map_err(|e| ingest(format!("CSV header error: {}", e)))?
            .clone();
        if headers.len() <= self.index_levels {
            return Err(ingest(format!(
                "expected {} key columns and at least one value column, got {} columns",
                self.index_levels,
                headers.len()
            )));
        }
        let level_names: Vec<String> = headers
            .iter()
            .take(self.index_levels)
            .map(|h| h.trim().to_string())
            .collect();
        let column_labels: Vec<Label> = headers
            .iter()
            .skip(self.index_levels)
            .map(Label::parse)
            .collect();

        let mut keys = Vec::new();
        let mut rows = Vec::new();
        for (line, result) in rdr.records().enumerate() {
            let record = result.map_err(|e| ingest(format!("CSV parse error: {}", e)))?;
            let row_no = line + 2;
            if record.len() != headers.len() {
                return Err(ingest(format!(
                    "row {} has {} cells, header has {}",
                    row_no,
                    record.len(),
                    headers.len()
                )));
            }

            let mut levels = Vec::with_capacity(self.index_levels);
            for (cell, name) in record.iter().zip(&level_names) {
                if cell.trim().is_empty() {
                    return Err(ingest(format!("row {} has an empty {} key", row_no, name)));
                }
                levels.push(Label::parse(cell));
            }
            keys.push(Key::new(levels));

            let values = record
                .iter()
                .skip(self.index_levels)
                .zip(headers.iter().skip(self.index_levels))
                .map(|(cell, column)| parse_value(cell, column, row_no))
                .collect::<Result<Vec<f64>, String>>()
                .map_err(ingest)?;
            rows.push(values);
        }

        debug!(path = %path.display(), rows = rows.len(), "loaded csv table");
        let index = Axis::new(level_names, keys).map_err(|e| ingest(e.to_string()))?;
        let columns =
            Axis::single(COLUMN_LEVEL, column_labels).map_err(|e| ingest(e.to_string()))?;
        let table = LabeledTable::from_rows(index, columns, rows)?;
        Ok(table.into_container())
    }

    pub fn write_file(&self, path: &Path, container: &Container) -> Result<(), ToolkitError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let table = match container {
            Container::Table(t) => t.clone(),
            Container::Series(s) => s.to_table(),
        };

        let mut wtr = csv::Writer::from_path(path).map_err(std::io::Error::from)?;
        let mut header: Vec<String> = table.index().names().to_vec();
        header.extend(table.columns().keys().iter().map(column_header));
        wtr.write_record(&header).map_err(std::io::Error::from)?;

        for r in 0..table.nrows() {
            let mut record: Vec<String> = table
                .index()
                .key(r)
                .levels()
                .iter()
                .map(|l| l.to_string())
                .collect();
            record.extend(table.row(r).iter().map(|v| {
                if v.is_nan() {
                    String::new()
                } else {
                    v.to_string()
                }
            }));
            wtr.write_record(&record).map_err(std::io::Error::from)?;
        }
        wtr.flush()?;
        debug!(path = %path.display(), rows = table.nrows(), "wrote csv table");
        Ok(())
    }
}

fn parse_value(cell: &str, column: &str, row_no: usize) -> Result<f64, String> {
    let trimmed = cell.trim();
    if trimmed.is_empty() {
        return Ok(f64::NAN);
    }
    trimmed
        .parse::<f64>()
        .map_err(|e| format!("row {} column {}: invalid value '{}': {}", row_no, column, trimmed, e))
}

fn column_header(key: &Key) -> String {
    match key.levels() {
        [label] if label.to_string().is_empty() => VALUE_COLUMN.to_string(),
        [label] => label.to_string(),
        levels => levels
            .iter()
            .map(|l| l.to_string())
            .collect::<Vec<_>>()
            .join(":"),
    }
}

impl TableSource for CsvTableAdapter {
    fn load(&self, name: &str) -> Result<Container, ToolkitError> {
        self.read_file(&self.csv_path(name))
    }
}

impl TableSink for CsvTableAdapter {
    fn write(&self, name: &str, container: &Container) -> Result<(), ToolkitError> {
        self.write_file(&self.csv_path(name), container)
    }
}
