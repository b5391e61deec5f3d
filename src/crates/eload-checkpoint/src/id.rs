//! Submission identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Numeric identifier of one ELOAD submission.
///
/// Displays as `ELOAD_<n>`, which is also the name of the submission's root
/// directory and the stem of its checkpoint file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EloadId(u32);

impl EloadId {
    pub const PREFIX: &'static str = "ELOAD_";

    pub fn new(number: u32) -> Self {
        Self(number)
    }

    pub fn number(&self) -> u32 {
        self.0
    }

    /// File name of the checkpoint document inside the submission root
    pub fn checkpoint_file_name(&self) -> String {
        format!(".{}_config.yml", self)
    }
}

impl fmt::Display for EloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", Self::PREFIX, self.0)
    }
}

impl From<u32> for EloadId {
    fn from(number: u32) -> Self {
        Self(number)
    }
}

impl FromStr for EloadId {
    type Err = String;

    /// Accepts either `ELOAD_<n>` or a bare number
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim().strip_prefix(Self::PREFIX).unwrap_or(s.trim());
        digits
            .parse::<u32>()
            .map(Self)
            .map_err(|_| format!("'{}' is not an ELOAD identifier", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_and_file_name() {
        let id = EloadId::new(5);
        assert_eq!(id.to_string(), "ELOAD_5");
        assert_eq!(id.checkpoint_file_name(), ".ELOAD_5_config.yml");
    }

    #[test]
    fn test_parse_prefixed_and_bare() {
        assert_eq!("ELOAD_12".parse::<EloadId>().unwrap(), EloadId::new(12));
        assert_eq!("12".parse::<EloadId>().unwrap(), EloadId::new(12));
        assert!("ELOAD_x".parse::<EloadId>().is_err());
    }
}
