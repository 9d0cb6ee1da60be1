//! Builder for `rrd_update_r` requests.
//!
//! Rows are queued with [`Updater::cache`] and sent together by
//! [`Client::update`](crate::client::Client::update). A row renders as
//! `<timestamp>:<v1>:<v2>...`, with `N` for "now" and `U` for unknown values.

use std::path::{Path, PathBuf};

/// Queued updates for one database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Updater {
    path: PathBuf,
    template: Option<String>,
    rows: Vec<String>,
}

impl Updater {
    /// Starts an empty queue for `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            template: None,
            rows: Vec::new(),
        }
    }

    /// Restricts and orders the data sources the values refer to.
    pub fn set_template<S: AsRef<str>>(&mut self, ds_names: &[S]) -> &mut Self {
        let joined = ds_names
            .iter()
            .map(AsRef::as_ref)
            .collect::<Vec<_>>()
            .join(":");
        self.template = (!joined.is_empty()).then_some(joined);
        self
    }

    /// Queues a row. `None` timestamps mean "now".
    pub fn cache(&mut self, timestamp: Option<i64>, values: &[f64]) -> &mut Self {
        self.rows.push(format_row(timestamp, values));
        self
    }

    /// Queues a pre-rendered row such as `N:1:U` or `1700000000@3`.
    pub fn cache_line(&mut self, row: impl Into<String>) -> &mut Self {
        self.rows.push(row.into());
        self
    }

    /// Target database path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The template, if set.
    pub fn template(&self) -> Option<&str> {
        self.template.as_deref()
    }

    /// Rows waiting to be sent.
    pub fn pending(&self) -> &[String] {
        &self.rows
    }

    /// Drops every queued row.
    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Renders one update row.
pub fn format_row(timestamp: Option<i64>, values: &[f64]) -> String {
    let mut row = match timestamp {
        Some(ts) => ts.to_string(),
        None => "N".to_string(),
    };
    for value in values {
        row.push(':');
        if value.is_finite() {
            row.push_str(&value.to_string());
        } else {
            row.push('U');
        }
    }
    row
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_row() {
        assert_eq!(format_row(Some(1_700_000_000), &[1.5, 2.0]), "1700000000:1.5:2");
        assert_eq!(format_row(None, &[f64::NAN, -3.25]), "N:U:-3.25");
        assert_eq!(format_row(None, &[]), "N");
    }

    #[test]
    fn test_template_and_queue() {
        let mut updater = Updater::new("net.rrd");
        updater
            .set_template(&["out", "in"])
            .cache(Some(10), &[1.0, 2.0])
            .cache_line("N:3:4");
        assert_eq!(updater.template(), Some("out:in"));
        assert_eq!(updater.pending(), ["10:1:2", "N:3:4"]);

        updater.set_template::<&str>(&[]);
        assert_eq!(updater.template(), None);

        updater.clear();
        assert!(updater.pending().is_empty());
    }
}
