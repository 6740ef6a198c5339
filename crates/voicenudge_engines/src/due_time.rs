#![forbid(unsafe_code)]

use chrono::{FixedOffset, NaiveDateTime, TimeZone, Utc};
use url::Url;

use voicenudge_kernel_contracts::{ContractViolation, UtcTimestamp};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueTimeError {
    InvalidTimestamp,
}

const MAX_OFFSET_MINUTES: i32 = 14 * 60;

/// Accepted naive-local formats, tried in order.
const LOCAL_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTimeConfig {
    /// Fixed local offset applied to incoming naive timestamps. Not
    /// DST-aware: single-region deployments only.
    pub utc_offset_minutes: i32,
    /// How far ahead of the due time the reminder fires.
    pub reminder_lead_minutes: i64,
    /// Event window used for the calendar-add link.
    pub calendar_event_minutes: i64,
}

impl DueTimeConfig {
    /// +05:30, 5-minute lead, 30-minute calendar event.
    pub fn mvp_v1() -> Self {
        Self {
            utc_offset_minutes: 330,
            reminder_lead_minutes: 5,
            calendar_event_minutes: 30,
        }
    }

    pub fn validate(&self) -> Result<(), ContractViolation> {
        if self.utc_offset_minutes.abs() > MAX_OFFSET_MINUTES {
            return Err(ContractViolation::InvalidRange {
                field: "due_time.utc_offset_minutes",
                min: f64::from(-MAX_OFFSET_MINUTES),
                max: f64::from(MAX_OFFSET_MINUTES),
                got: f64::from(self.utc_offset_minutes),
            });
        }
        if self.reminder_lead_minutes <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "due_time.reminder_lead_minutes",
                reason: "must be > 0",
            });
        }
        if self.calendar_event_minutes <= 0 {
            return Err(ContractViolation::InvalidValue {
                field: "due_time.calendar_event_minutes",
                reason: "must be > 0",
            });
        }
        Ok(())
    }
}

/// Converts user-supplied local due times to UTC and derives reminder fire
/// times. Pure.
#[derive(Debug, Clone)]
pub struct DueTimeScheduler {
    config: DueTimeConfig,
}

impl DueTimeScheduler {
    pub fn new(config: DueTimeConfig) -> Result<Self, ContractViolation> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> DueTimeConfig {
        self.config
    }

    /// Parses a naive ISO-8601 local timestamp, interprets it at the
    /// configured fixed offset and converts to UTC.
    pub fn to_utc(&self, local_iso: &str) -> Result<UtcTimestamp, DueTimeError> {
        let trimmed = local_iso.trim();
        let naive = LOCAL_FORMATS
            .iter()
            .find_map(|fmt| NaiveDateTime::parse_from_str(trimmed, fmt).ok())
            .ok_or(DueTimeError::InvalidTimestamp)?;
        let offset = FixedOffset::east_opt(self.config.utc_offset_minutes * 60)
            .ok_or(DueTimeError::InvalidTimestamp)?;
        let local = offset
            .from_local_datetime(&naive)
            .single()
            .ok_or(DueTimeError::InvalidTimestamp)?;
        Ok(UtcTimestamp(local.with_timezone(&Utc)))
    }

    pub fn derive_reminder_time(&self, due: UtcTimestamp) -> UtcTimestamp {
        due.minus_minutes(self.config.reminder_lead_minutes)
    }

    /// Google-Calendar template link for the task, with the configured event
    /// window starting at the due time.
    pub fn calendar_add_link(&self, title: &str, due: UtcTimestamp) -> String {
        let end = due.plus_minutes(self.config.calendar_event_minutes);
        let dates = format!(
            "{}/{}",
            due.0.format("%Y%m%dT%H%M%SZ"),
            end.0.format("%Y%m%dT%H%M%SZ")
        );
        let mut url = Url::parse("https://calendar.google.com/calendar/render")
            .expect("static calendar base url must parse");
        url.query_pairs_mut()
            .append_pair("action", "TEMPLATE")
            .append_pair("text", title)
            .append_pair("dates", &dates);
        url.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scheduler() -> DueTimeScheduler {
        DueTimeScheduler::new(DueTimeConfig::mvp_v1()).unwrap()
    }

    #[test]
    fn at_due_01_ist_converts_to_utc() {
        let due = scheduler().to_utc("2025-01-10T18:30:00").unwrap();
        assert_eq!(due.to_rfc3339(), "2025-01-10T13:00:00Z");
    }

    #[test]
    fn at_due_02_reminder_leads_by_five_minutes() {
        let s = scheduler();
        let due = s.to_utc("2025-01-10T18:30:00").unwrap();
        let fire = s.derive_reminder_time(due);
        assert_eq!(fire.to_rfc3339(), "2025-01-10T12:55:00Z");
    }

    #[test]
    fn at_due_03_unparsable_input_is_invalid_timestamp() {
        let s = scheduler();
        assert_eq!(s.to_utc("next tuesday"), Err(DueTimeError::InvalidTimestamp));
        assert_eq!(s.to_utc(""), Err(DueTimeError::InvalidTimestamp));
        assert_eq!(
            s.to_utc("2025-13-40T25:61:00"),
            Err(DueTimeError::InvalidTimestamp)
        );
    }

    #[test]
    fn at_due_04_space_separated_and_minute_precision_accepted() {
        let s = scheduler();
        assert!(s.to_utc("2025-01-10 18:30:00").is_ok());
        assert!(s.to_utc("2025-01-10T18:30").is_ok());
    }

    #[test]
    fn at_due_05_calendar_link_spans_thirty_minutes() {
        let s = scheduler();
        let due = s.to_utc("2025-01-10T18:30:00").unwrap();
        let link = s.calendar_add_link("buy milk", due);
        assert!(link.starts_with("https://calendar.google.com/calendar/render?"));
        assert!(link.contains("dates=20250110T130000Z%2F20250110T133000Z"));
        assert!(link.contains("text=buy+milk"));
    }

    #[test]
    fn at_due_06_offset_beyond_utc_range_refused() {
        let config = DueTimeConfig {
            utc_offset_minutes: 15 * 60,
            ..DueTimeConfig::mvp_v1()
        };
        assert!(DueTimeScheduler::new(config).is_err());
    }
}
