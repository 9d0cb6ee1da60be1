//! Argument-vector marshaling.
//!
//! librrd's argv-style entry points (`rrd_graph_v`, `rrd_xport`, and the
//! definition lists of create/update) take a `char **` table. GNU getopt
//! may permute that table in place, so [`ArgVec`] owns both the strings and
//! a separate mutable pointer table; the strings themselves never move.

use std::ffi::{CString, c_char, c_int};
use std::path::Path;
use std::ptr;

use crate::error::{ArgumentError, Result};

/// An owned, NUL-terminated argument vector.
#[derive(Debug)]
pub struct ArgVec {
    strings: Vec<CString>,
    /// One pointer per string plus a trailing null.
    table: Vec<*mut c_char>,
}

impl ArgVec {
    /// Creates an empty vector.
    pub fn new() -> Self {
        Self {
            strings: Vec::new(),
            table: vec![ptr::null_mut()],
        }
    }

    /// Builds a vector from string arguments.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::InteriorNul`] if any argument contains a NUL.
    pub fn from_args<I, S>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut argv = Self::new();
        for arg in args {
            argv.push(arg.as_ref())?;
        }
        Ok(argv)
    }

    /// Appends one argument.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::InteriorNul`] if `arg` contains a NUL.
    pub fn push(&mut self, arg: &str) -> Result<()> {
        let owned = to_c_string(arg)?;
        // The CString's heap buffer stays put when `strings` reallocates.
        let raw = owned.as_ptr().cast_mut();
        self.strings.push(owned);
        let last = self.table.len() - 1;
        self.table.insert(last, raw);
        Ok(())
    }

    /// Number of arguments, as librrd's `argc`.
    ///
    /// # Errors
    ///
    /// Returns [`ArgumentError::TooMany`] past `c_int::MAX` arguments.
    pub fn argc(&self) -> Result<c_int> {
        c_int::try_from(self.strings.len()).map_err(|_| {
            ArgumentError::TooMany {
                count: self.strings.len(),
            }
            .into()
        })
    }

    /// The table as `const char **`.
    pub fn as_ptr(&self) -> *const *const c_char {
        self.table.as_ptr().cast()
    }

    /// The table as `char **`, for entry points that may permute it.
    pub fn as_mut_ptr(&mut self) -> *mut *mut c_char {
        self.table.as_mut_ptr()
    }

    /// Number of arguments.
    pub fn len(&self) -> usize {
        self.strings.len()
    }

    /// Whether there are no arguments.
    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    /// The arguments in insertion order, regardless of any permutation of
    /// the pointer table.
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.strings.iter().map(|s| s.to_str().unwrap_or_default())
    }
}

impl Default for ArgVec {
    fn default() -> Self {
        Self::new()
    }
}

/// Converts a string argument.
///
/// # Errors
///
/// Returns [`ArgumentError::InteriorNul`] if `value` contains a NUL.
pub fn to_c_string(value: &str) -> Result<CString> {
    CString::new(value).map_err(|_| {
        ArgumentError::InteriorNul {
            argument: value.replace('\0', "\\0"),
        }
        .into()
    })
}

/// Converts a filesystem path, byte for byte on Unix.
///
/// # Errors
///
/// Returns [`ArgumentError::InteriorNul`] if the path contains a NUL.
pub fn path_to_c_string(path: &Path) -> Result<CString> {
    #[cfg(unix)]
    {
        use std::os::unix::ffi::OsStrExt;
        CString::new(path.as_os_str().as_bytes()).map_err(|_| {
            ArgumentError::InteriorNul {
                argument: path.display().to_string(),
            }
            .into()
        })
    }
    #[cfg(not(unix))]
    {
        to_c_string(&path.to_string_lossy())
    }
}

/// Escapes `:` the way rrdtool expects inside DEF file names and COMMENT
/// text.
pub fn escape_colons(value: &str) -> String {
    value.replace(':', "\\:")
}
