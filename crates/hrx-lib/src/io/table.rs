use crate::signal::TimeSeries;
use anyhow::{anyhow, bail, Context, Result};
use csv::{ReaderBuilder, StringRecord, Trim};
use serde::Serialize;
use std::io::Read;
use std::path::Path;

/// Tab is the delimiter of PhysioNet-style text exports.
pub const DEFAULT_DELIMITER: u8 = b'\t';

/// Named numeric columns from a delimited text recording.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub columns: Vec<String>,
    /// Unit labels from an optional `(mV)`-style row under the header.
    pub units: Vec<Option<String>>,
    #[serde(skip)]
    values: Vec<Vec<f64>>,
}

impl Table {
    pub fn row_count(&self) -> usize {
        self.values.first().map_or(0, Vec::len)
    }

    /// Resolve a column by case-insensitive name, falling back to a zero-based index.
    pub fn column_index(&self, selector: &str) -> Result<usize> {
        let wanted = selector.trim();
        if let Some(idx) = self
            .columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(wanted))
        {
            return Ok(idx);
        }
        match wanted.parse::<usize>() {
            Ok(idx) if idx < self.columns.len() => Ok(idx),
            _ => Err(anyhow!(
                "no column '{}' (available: {})",
                wanted,
                self.columns.join(", ")
            )),
        }
    }

    pub fn column(&self, selector: &str) -> Result<&[f64]> {
        let idx = self.column_index(selector)?;
        Ok(&self.values[idx])
    }

    /// Sampling frequency implied by a time column in seconds.
    pub fn estimate_fs(&self, time_column: &str) -> Result<f64> {
        let times = self.column(time_column)?;
        let (first, last) = match times {
            [first, .., last] => (*first, *last),
            _ => bail!("need at least two rows to estimate the sampling frequency"),
        };
        let span = last - first;
        if !(span.is_finite() && span > 0.0) {
            bail!(
                "time column '{}' does not increase ({} to {})",
                time_column,
                first,
                last
            );
        }
        Ok((times.len() - 1) as f64 / span)
    }

    /// Copy one column into a `TimeSeries` sampled at `fs`.
    pub fn time_series(&self, selector: &str, fs: f64) -> Result<TimeSeries> {
        Ok(TimeSeries::new(fs, self.column(selector)?.to_vec()))
    }
}

/// Read a delimited recording with a header row from disk.
pub fn read_table(path: &Path, delimiter: u8) -> Result<Table> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?;
    parse_table(file, delimiter).with_context(|| format!("reading {}", path.display()))
}

/// Parse a delimited recording: header row, optional unit row, then numeric rows.
pub fn parse_table<R: Read>(input: R, delimiter: u8) -> Result<Table> {
    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(true)
        .trim(Trim::All)
        .comment(Some(b'#'))
        .from_reader(input);
    let columns: Vec<String> = reader
        .headers()
        .context("reading header row")?
        .iter()
        .map(|h| unquote(h).to_string())
        .collect();
    if columns.iter().all(String::is_empty) {
        bail!("header row is empty");
    }

    let mut units = vec![None; columns.len()];
    let mut values = vec![Vec::new(); columns.len()];
    for (row, result) in reader.records().enumerate() {
        let record = result.context("reading record")?;
        if row == 0 && is_unit_row(&record) {
            units = record
                .iter()
                .map(|u| Some(unquote(u).trim_matches(|c| c == '(' || c == ')').to_string()))
                .collect();
            units.resize(columns.len(), None);
            continue;
        }
        for (col, field) in record.iter().enumerate() {
            let value: f64 = field.parse().with_context(|| {
                format!(
                    "line {} column '{}' is not numeric: {}",
                    line_of(&record),
                    columns[col],
                    field
                )
            })?;
            values[col].push(value);
        }
    }
    if values.first().map_or(true, Vec::is_empty) {
        bail!("no data rows found");
    }
    Ok(Table {
        columns,
        units,
        values,
    })
}

fn unquote(field: &str) -> &str {
    field.trim_matches(|c| c == '\'' || c == '"')
}

fn is_unit_row(record: &StringRecord) -> bool {
    record.iter().map(unquote).all(|field| {
        field.starts_with('(') && field.ends_with(')') && field.parse::<f64>().is_err()
    })
}

fn line_of(record: &StringRecord) -> u64 {
    record.position().map_or(0, |pos| pos.line())
}

/// Load one column of a delimited recording, estimating `fs` from `time_column` when `fs` is `None`.
pub fn load_column(
    path: &Path,
    column: &str,
    delimiter: u8,
    fs: Option<f64>,
    time_column: Option<&str>,
) -> Result<TimeSeries> {
    let table = read_table(path, delimiter)?;
    let fs = match (fs, time_column) {
        (Some(fs), _) => fs,
        (None, Some(time)) => table.estimate_fs(time)?,
        (None, None) => bail!(
            "no sampling frequency for {}: pass one or name a time column",
            path.display()
        ),
    };
    table.time_series(column, fs)
}
