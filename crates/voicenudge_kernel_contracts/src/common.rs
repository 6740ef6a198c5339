#![forbid(unsafe_code)]

use chrono::{DateTime, Duration, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SchemaVersion(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ReasonCodeId(pub u32);

/// UTC wall-clock instant. All persisted times in the system are UTC; local
/// time exists only at the due-time parsing boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UtcTimestamp(pub DateTime<Utc>);

impl UtcTimestamp {
    pub fn from_unix_seconds(secs: i64) -> Result<Self, ContractViolation> {
        match Utc.timestamp_opt(secs, 0).single() {
            Some(dt) => Ok(Self(dt)),
            None => Err(ContractViolation::InvalidValue {
                field: "utc_timestamp.unix_seconds",
                reason: "out of representable range",
            }),
        }
    }

    pub fn minus_minutes(self, minutes: i64) -> Self {
        self.0
            .checked_sub_signed(Duration::minutes(minutes))
            .map(Self)
            .unwrap_or(self)
    }

    pub fn plus_minutes(self, minutes: i64) -> Self {
        self.0
            .checked_add_signed(Duration::minutes(minutes))
            .map(Self)
            .unwrap_or(self)
    }

    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContractViolation {
    InvalidValue {
        field: &'static str,
        reason: &'static str,
    },
    InvalidRange {
        field: &'static str,
        min: f64,
        max: f64,
        got: f64,
    },
    NotFinite {
        field: &'static str,
    },
}

pub trait Validate {
    fn validate(&self) -> Result<(), ContractViolation>;
}

pub(crate) fn validate_token(
    field: &'static str,
    value: &str,
    max_len: usize,
) -> Result<(), ContractViolation> {
    if value.trim().is_empty() {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "must not be empty",
        });
    }
    if value.len() > max_len {
        return Err(ContractViolation::InvalidValue {
            field,
            reason: "exceeds max length",
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_common_01_minus_minutes_shifts_backwards() {
        let t = UtcTimestamp::from_unix_seconds(1_736_514_000).unwrap();
        let earlier = t.minus_minutes(5);
        assert_eq!(t.0.signed_duration_since(earlier.0), Duration::minutes(5));
    }

    #[test]
    fn at_common_02_rfc3339_is_utc_suffixed() {
        let t = UtcTimestamp::from_unix_seconds(0).unwrap();
        assert_eq!(t.to_rfc3339(), "1970-01-01T00:00:00Z");
    }
}
