//! Results of `rrd_fetch_r`.

use serde::Serialize;

/// Consolidated rows read from one database.
///
/// Values are stored row-major: `values[row * ds_names.len() + ds]`. Row `i`
/// covers the interval ending at `start + (i + 1) * step`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FetchResult {
    /// Start of the returned range, seconds since the epoch (adjusted by librrd).
    pub start: i64,
    /// End of the returned range.
    pub end: i64,
    /// Resolution of the chosen archive in seconds.
    pub step: u64,
    /// Data source names, one per column.
    pub ds_names: Vec<String>,
    /// Number of rows.
    pub row_count: usize,
    /// Row-major values; unknown samples are NaN.
    pub values: Vec<f64>,
}

impl FetchResult {
    /// Value of data source `ds` in row `row`.
    pub fn value_at(&self, ds: usize, row: usize) -> Option<f64> {
        if ds >= self.ds_names.len() || row >= self.row_count {
            return None;
        }
        self.values.get(row * self.ds_names.len() + ds).copied()
    }

    /// Column index of a data source.
    pub fn ds_index(&self, name: &str) -> Option<usize> {
        self.ds_names.iter().position(|n| n == name)
    }

    /// Iterates over `(timestamp, row values)`.
    pub fn rows(&self) -> impl Iterator<Item = (i64, &[f64])> {
        row_iter(self.start, self.step, self.ds_names.len(), &self.values)
    }
}

/// Iterates row-major values as `(row end time, row)` pairs.
pub(crate) fn row_iter(
    start: i64,
    step: u64,
    columns: usize,
    values: &[f64],
) -> impl Iterator<Item = (i64, &[f64])> {
    let step = i64::try_from(step).unwrap_or(i64::MAX);
    values
        .chunks(columns.max(1))
        .zip(1i64..)
        .map(move |(row, i)| (start.saturating_add(step.saturating_mul(i)), row))
}
