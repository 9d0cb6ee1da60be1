//! Owned copies of librrd info lists.
//!
//! Both `rrd_info_r` and `rrd_graph_v` return a singly linked list of typed
//! key/value nodes. [`Info::from_list`] walks such a list once and copies
//! every entry into Rust-owned memory, after which the list can be released
//! with the library's `rrd_info_free`.

use std::ffi::CStr;

use serde::Serialize;

use crate::error::{ResultError, Result};
use crate::sys::{self, rrd_info_t};

/// Value of a single info entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum InfoValue {
    /// A sample value (`RD_I_VAL`); unknown samples are NaN.
    Value(f64),
    /// An unsigned counter (`RD_I_CNT`).
    Count(u64),
    /// A string (`RD_I_STR`).
    Str(String),
    /// A signed integer (`RD_I_INT`).
    Int(i64),
    /// A binary payload (`RD_I_BLO`), e.g. a rendered image.
    Blob(Vec<u8>),
}

impl InfoValue {
    /// Numeric view: samples as-is, counters and integers converted.
    #[allow(clippy::cast_precision_loss)] // Counters in info lists are far below 2^53
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Value(v) => Some(*v),
            Self::Count(c) => Some(*c as f64),
            Self::Int(i) => Some(*i as f64),
            Self::Str(_) | Self::Blob(_) => None,
        }
    }

    /// Counter view; non-negative integers are accepted too.
    pub fn as_u64(&self) -> Option<u64> {
        match self {
            Self::Count(c) => Some(*c),
            Self::Int(i) => u64::try_from(*i).ok(),
            _ => None,
        }
    }

    /// String view.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Blob view.
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }
}

/// The entries of an info list, in the order librrd produced them.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Info {
    entries: Vec<(String, InfoValue)>,
}

impl Info {
    /// Copies every entry of a librrd info list.
    ///
    /// Entries with a type this crate does not know are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`ResultError::Length`] if a blob is larger than the address
    /// space.
    ///
    /// # Safety
    ///
    /// `list` must be null or the head of a well-formed list that stays
    /// alive for the duration of the call.
    pub unsafe fn from_list(list: *const rrd_info_t) -> Result<Self> {
        let mut entries = Vec::new();
        let mut node = list;

        while !node.is_null() {
            // SAFETY: node is non-null and part of a live list.
            let current = unsafe { &*node };
            let key = if current.key.is_null() {
                String::new()
            } else {
                // SAFETY: keys are NUL-terminated strings owned by the list.
                unsafe { CStr::from_ptr(current.key) }
                    .to_string_lossy()
                    .into_owned()
            };

            // SAFETY: each arm reads the union member named by type_.
            let value = unsafe {
                match current.type_ {
                    sys::RD_I_VAL => Some(InfoValue::Value(current.value.u_val)),
                    sys::RD_I_CNT => Some(InfoValue::Count(u64::from(current.value.u_cnt))),
                    sys::RD_I_INT => Some(InfoValue::Int(i64::from(current.value.u_int))),
                    sys::RD_I_STR => {
                        let s = current.value.u_str;
                        Some(InfoValue::Str(if s.is_null() {
                            String::new()
                        } else {
                            CStr::from_ptr(s).to_string_lossy().into_owned()
                        }))
                    }
                    sys::RD_I_BLO => Some(InfoValue::Blob(copy_blob(current.value.u_blo)?)),
                    _ => None,
                }
            };

            if let Some(value) = value {
                entries.push((key, value));
            }
            node = current.next;
        }

        Ok(Self { entries })
    }

    /// Builds an info from entries, for tests and callers that assemble one
    /// by hand.
    pub fn from_entries<I, K>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, InfoValue)>,
        K: Into<String>,
    {
        Self {
            entries: entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }

    /// Looks up the first entry with this key.
    pub fn get(&self, key: &str) -> Option<&InfoValue> {
        self.entries
            .iter()
            .find_map(|(k, v)| (k == key).then_some(v))
    }

    /// Iterates over `(key, value)` pairs in list order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &InfoValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the list had no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Primary data point interval in seconds (`step`).
    pub fn step(&self) -> Option<u64> {
        self.get("step").and_then(InfoValue::as_u64)
    }

    /// Time of the last update in seconds since the epoch (`last_update`).
    pub fn last_update(&self) -> Option<u64> {
        self.get("last_update").and_then(InfoValue::as_u64)
    }

    /// Data source names with their column index, ordered by index.
    ///
    /// Read from the `ds[NAME].index` entries.
    pub fn data_sources(&self) -> Vec<(String, u64)> {
        let mut sources: Vec<(String, u64)> = self
            .iter()
            .filter_map(|(key, value)| {
                let name = key.strip_prefix("ds[")?.strip_suffix("].index")?;
                Some((name.to_string(), value.as_u64()?))
            })
            .collect();
        sources.sort_by_key(|(_, index)| *index);
        sources
    }

    /// Number of round-robin archives, counted from the `rra[N].cf` entries.
    pub fn rra_count(&self) -> usize {
        self.iter()
            .filter(|(key, _)| key.starts_with("rra[") && key.ends_with("].cf"))
            .count()
    }
}

/// Copies a blob payload.
///
/// # Safety
///
/// `blob.ptr` must be null or valid for `blob.size` bytes.
unsafe fn copy_blob(blob: sys::rrd_blob_t) -> Result<Vec<u8>> {
    let size = usize::try_from(blob.size).map_err(|_| ResultError::Length {
        operation: "info",
        length: u128::from(blob.size),
    })?;
    if blob.ptr.is_null() || size == 0 {
        return Ok(Vec::new());
    }
    // SAFETY: the caller guarantees ptr is valid for size bytes.
    Ok(unsafe { std::slice::from_raw_parts(blob.ptr, size) }.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::RrdLibrary;
    use crate::mock::MockLibrary;

    fn sample() -> Info {
        Info::from_entries([
            ("filename", InfoValue::Str("net.rrd".to_string())),
            ("step", InfoValue::Count(300)),
            ("last_update", InfoValue::Count(1_700_000_000)),
            ("ds[out].index", InfoValue::Count(1)),
            ("ds[out].type", InfoValue::Str("COUNTER".to_string())),
            ("ds[in].index", InfoValue::Count(0)),
            ("rra[0].cf", InfoValue::Str("AVERAGE".to_string())),
            ("rra[1].cf", InfoValue::Str("MAX".to_string())),
            ("rra[0].xff", InfoValue::Value(0.5)),
        ])
    }

    #[test]
    fn test_accessors() {
        let info = sample();
        assert_eq!(info.len(), 9);
        assert_eq!(info.step(), Some(300));
        assert_eq!(info.last_update(), Some(1_700_000_000));
        assert_eq!(info.get("filename").and_then(InfoValue::as_str), Some("net.rrd"));
        assert_eq!(info.get("rra[0].xff").and_then(InfoValue::as_f64), Some(0.5));
        assert!(info.get("missing").is_none());
        assert_eq!(info.rra_count(), 2);
    }

    #[test]
    fn test_data_sources_ordered_by_index() {
        let sources = sample().data_sources();
        assert_eq!(sources, vec![("in".to_string(), 0), ("out".to_string(), 1)]);
    }

    #[test]
    fn test_from_list_copies_every_type() {
        let lib = MockLibrary::new();
        let expected = Info::from_entries([
            ("a", InfoValue::Value(1.5)),
            ("b", InfoValue::Count(7)),
            ("c", InfoValue::Str("text".to_string())),
            ("d", InfoValue::Int(-3)),
            ("e", InfoValue::Blob(vec![0x89, b'P', b'N', b'G'])),
        ]);
        let list = lib.build_list(&expected);

        // SAFETY: list was just built by the mock and is freed below.
        let copied = unsafe { Info::from_list(list) }.unwrap();
        // SAFETY: list came from this mock and is freed once.
        unsafe { lib.info_free(list) };

        assert_eq!(copied, expected);
        assert_eq!(lib.outstanding_allocations(), 0);
    }

    #[test]
    fn test_from_null_list_is_empty() {
        // SAFETY: null is an empty list.
        let info = unsafe { Info::from_list(std::ptr::null()) }.unwrap();
        assert!(info.is_empty());
    }

    #[test]
    fn test_serializes_as_pairs() {
        let info = Info::from_entries([("step", InfoValue::Count(60))]);
        assert_eq!(serde_json::to_string(&info).unwrap(), r#"[["step",60]]"#);
    }
}
