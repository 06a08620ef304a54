use crate::error::IngestError;
use csv::{ReaderBuilder, StringRecord, Trim};
use std::io::Read;
use std::path::Path;

/// Raw header + records as read from a delimited file, before any column
/// interpretation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Table {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(headers: Vec<String>, rows: Vec<Vec<String>>) -> Self {
        Self { headers, rows }
    }

    /// Build a table from numeric columns, mostly useful for synthetic data.
    pub fn from_columns(headers: &[&str], columns: &[Vec<f64>]) -> Self {
        let len = columns.iter().map(Vec::len).min().unwrap_or(0);
        let rows = (0..len)
            .map(|i| columns.iter().map(|col| col[i].to_string()).collect())
            .collect();
        Self {
            headers: headers.iter().map(|h| h.to_string()).collect(),
            rows,
        }
    }

    pub fn column_count(&self) -> usize {
        self.headers.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Position of the first header equal to `name`, ignoring ASCII case.
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&str> {
        self.rows
            .get(row)
            .and_then(|r| r.get(col))
            .map(String::as_str)
    }
}

/// Read a comma-separated file with a header row.
pub fn read_table(path: &Path) -> Result<Table, IngestError> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_path(path)
        .map_err(|err| IngestError::Io {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    collect_table(reader)
}

pub fn parse_table<R: Read>(input: R) -> Result<Table, IngestError> {
    let reader = ReaderBuilder::new()
        .has_headers(true)
        .trim(Trim::All)
        .from_reader(input);
    collect_table(reader)
}

fn collect_table<R: Read>(mut reader: csv::Reader<R>) -> Result<Table, IngestError> {
    let headers = reader.headers().map_err(malformed)?.clone();
    let mut rows = Vec::new();
    let mut record = StringRecord::new();
    loop {
        match reader.read_record(&mut record) {
            Ok(true) => rows.push(record.iter().map(str::to_string).collect()),
            Ok(false) => break,
            Err(err) => return Err(malformed(err)),
        }
    }
    Ok(Table {
        headers: headers.iter().map(str::to_string).collect(),
        rows,
    })
}

fn malformed(err: csv::Error) -> IngestError {
    let row = err.position().map(|p| p.line() as usize).unwrap_or(0);
    IngestError::Malformed {
        row,
        reason: err.to_string(),
    }
}
