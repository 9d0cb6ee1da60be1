//! Vocabulary shared by the builders: consolidation functions and data
//! source types.
//!
//! These only name what librrd understands; the library decides what is
//! valid in which context.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ArgumentError, RrdError};

/// Consolidation function applied when rows are summarized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ConsolidationFn {
    /// Arithmetic mean of the consolidated points.
    Average,
    /// Minimum of the consolidated points.
    Min,
    /// Maximum of the consolidated points.
    Max,
    /// Most recent of the consolidated points.
    Last,
}

impl ConsolidationFn {
    /// The name librrd expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Average => "AVERAGE",
            Self::Min => "MIN",
            Self::Max => "MAX",
            Self::Last => "LAST",
        }
    }
}

impl fmt::Display for ConsolidationFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConsolidationFn {
    type Err = RrdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "AVERAGE" => Ok(Self::Average),
            "MIN" => Ok(Self::Min),
            "MAX" => Ok(Self::Max),
            "LAST" => Ok(Self::Last),
            _ => Err(ArgumentError::Unknown {
                kind: "consolidation function",
                value: s.to_string(),
            }
            .into()),
        }
    }
}

/// Data source type, deciding how updates are turned into rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DsType {
    /// Stored as given.
    Gauge,
    /// Monotonic counter with wrap detection.
    Counter,
    /// Rate of change, may be negative.
    Derive,
    /// Counter that may decrease.
    Dcounter,
    /// Derive over floating-point values.
    Dderive,
    /// Counter reset on every read.
    Absolute,
    /// Computed from other data sources by an RPN expression.
    Compute,
}

impl DsType {
    /// The name librrd expects.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Gauge => "GAUGE",
            Self::Counter => "COUNTER",
            Self::Derive => "DERIVE",
            Self::Dcounter => "DCOUNTER",
            Self::Dderive => "DDERIVE",
            Self::Absolute => "ABSOLUTE",
            Self::Compute => "COMPUTE",
        }
    }
}

impl fmt::Display for DsType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DsType {
    type Err = RrdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GAUGE" => Ok(Self::Gauge),
            "COUNTER" => Ok(Self::Counter),
            "DERIVE" => Ok(Self::Derive),
            "DCOUNTER" => Ok(Self::Dcounter),
            "DDERIVE" => Ok(Self::Dderive),
            "ABSOLUTE" => Ok(Self::Absolute),
            "COMPUTE" => Ok(Self::Compute),
            _ => Err(ArgumentError::Unknown {
                kind: "data source type",
                value: s.to_string(),
            }
            .into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_consolidation_fn_names() {
        for cf in [
            ConsolidationFn::Average,
            ConsolidationFn::Min,
            ConsolidationFn::Max,
            ConsolidationFn::Last,
        ] {
            assert_eq!(cf.to_string().parse::<ConsolidationFn>().unwrap(), cf);
        }
        assert_eq!("average".parse::<ConsolidationFn>().unwrap(), ConsolidationFn::Average);
        assert!("MEDIAN".parse::<ConsolidationFn>().is_err());
    }

    #[test]
    fn test_ds_type_parse() {
        assert_eq!("gauge".parse::<DsType>().unwrap(), DsType::Gauge);
        assert_eq!(DsType::Dderive.as_str(), "DDERIVE");
        let err = "SPEED".parse::<DsType>().unwrap_err();
        assert_eq!(err.to_string(), "argument error: unknown data source type \"SPEED\"");
    }

    #[test]
    fn test_serde_uses_librrd_names() {
        assert_eq!(serde_json::to_string(&ConsolidationFn::Max).unwrap(), "\"MAX\"");
        let parsed: DsType = serde_json::from_str("\"COUNTER\"").unwrap();
        assert_eq!(parsed, DsType::Counter);
    }
}
