#![forbid(unsafe_code)]

use chrono::{Duration, FixedOffset, NaiveTime, Utc};

use voicenudge_kernel_contracts::UtcTimestamp;

/// Trims, lowercases and collapses runs of whitespace.
pub fn clean_text(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedTask {
    pub title: String,
    pub due_at: Option<UtcTimestamp>,
}

const STOPWORDS: &[&str] = &[
    "a", "an", "the", "to", "at", "in", "on", "for", "of", "and", "or", "my", "me", "i",
    "is", "am", "pm", "by", "with", "about", "tomorrow", "today", "please", "need",
    "have", "has", "be", "will", "would", "should", "that", "this", "it",
];

/// Splits free task text into a short title and an optional due time. Only
/// the "tomorrow [at H[:MM] am/pm]" shape is recognized; anything richer is
/// the caller's job via an explicit set_due. Pure given `now`.
#[derive(Debug, Clone, Copy)]
pub struct TaskTextParser {
    utc_offset_minutes: i32,
}

impl TaskTextParser {
    pub fn new(utc_offset_minutes: i32) -> Self {
        Self { utc_offset_minutes }
    }

    pub fn parse(&self, text: &str, now: UtcTimestamp) -> ParsedTask {
        let lower = clean_text(text);
        ParsedTask {
            title: derive_title(&lower, text),
            due_at: self.derive_due(&lower, now),
        }
    }

    fn derive_due(&self, lower: &str, now: UtcTimestamp) -> Option<UtcTimestamp> {
        if !has_word(lower, "tomorrow") {
            return None;
        }
        let (hour, minute) = find_time_of_day(lower).unwrap_or((9, 0));
        let offset = FixedOffset::east_opt(self.utc_offset_minutes * 60)?;
        let local_now = now.0.with_timezone(&offset);
        let local_due = (local_now + Duration::days(1))
            .date_naive()
            .and_time(NaiveTime::from_hms_opt(hour, minute, 0)?)
            .and_local_timezone(offset)
            .single()?;
        Some(UtcTimestamp(local_due.with_timezone(&Utc)))
    }
}

fn has_word(lower: &str, word: &str) -> bool {
    lower
        .split(|c: char| !c.is_alphanumeric())
        .any(|t| t == word)
}

fn derive_title(lower: &str, original: &str) -> String {
    let tokens: Vec<&str> = lower
        .split_whitespace()
        .filter(|t| t.chars().all(|c| c.is_alphabetic()))
        .filter(|t| !STOPWORDS.contains(t))
        .collect();
    if tokens.is_empty() {
        original.trim().to_string()
    } else {
        tokens.join(" ")
    }
}

/// Finds the first "H", "H:MM", "Hpm" or "H:MM pm" style clock phrase with an
/// am/pm marker. 12-hour input, 24-hour output.
fn find_time_of_day(lower: &str) -> Option<(u32, u32)> {
    let tokens: Vec<&str> = lower
        .split(|c: char| c.is_whitespace() || c == ',' || c == '.')
        .filter(|t| !t.is_empty())
        .collect();
    for (i, token) in tokens.iter().enumerate() {
        let (clock_part, marker_attached) = split_meridiem(token);
        let marker = match marker_attached.or_else(|| {
            tokens
                .get(i + 1)
                .and_then(|next| split_meridiem(next).1.filter(|_| next.len() == 2))
        }) {
            Some(marker) => marker,
            None => continue,
        };
        if let Some((hour, minute)) = parse_clock(clock_part) {
            return Some((to_24_hour(hour, marker), minute));
        }
    }
    None
}

fn split_meridiem(token: &str) -> (&str, Option<&str>) {
    if let Some(rest) = token.strip_suffix("am") {
        (rest, Some("am"))
    } else if let Some(rest) = token.strip_suffix("pm") {
        (rest, Some("pm"))
    } else {
        (token, None)
    }
}

fn parse_clock(raw: &str) -> Option<(u32, u32)> {
    if raw.is_empty() {
        return None;
    }
    let (h, m) = match raw.split_once(':') {
        Some((h, m)) => (h.parse::<u32>().ok()?, m.parse::<u32>().ok()?),
        None => (raw.parse::<u32>().ok()?, 0),
    };
    if (1..=12).contains(&h) && m < 60 {
        Some((h, m))
    } else {
        None
    }
}

fn to_24_hour(hour: u32, marker: &str) -> u32 {
    match (marker, hour) {
        ("pm", 12) => 12,
        ("pm", h) => h + 12,
        ("am", 12) => 0,
        (_, h) => h,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parser() -> TaskTextParser {
        TaskTextParser::new(330)
    }

    fn now() -> UtcTimestamp {
        // 2025-01-10T12:00:00Z = 2025-01-10 17:30 IST
        UtcTimestamp::from_unix_seconds(1_736_510_400).unwrap()
    }

    #[test]
    fn at_parse_01_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  Buy   MILK\ttomorrow "), "buy milk tomorrow");
    }

    #[test]
    fn at_parse_02_tomorrow_with_time_resolves_in_local_zone() {
        let parsed = parser().parse("buy milk tomorrow at 6pm", now());
        // 2025-01-11 18:00 IST = 12:30 UTC
        assert_eq!(
            parsed.due_at.unwrap().to_rfc3339(),
            "2025-01-11T12:30:00Z"
        );
        assert_eq!(parsed.title, "buy milk");
    }

    #[test]
    fn at_parse_03_tomorrow_without_time_defaults_to_nine_am() {
        let parsed = parser().parse("call grandma tomorrow", now());
        // 2025-01-11 09:00 IST = 03:30 UTC
        assert_eq!(
            parsed.due_at.unwrap().to_rfc3339(),
            "2025-01-11T03:30:00Z"
        );
    }

    #[test]
    fn at_parse_04_no_due_phrase_yields_none() {
        let parsed = parser().parse("water the plants", now());
        assert_eq!(parsed.due_at, None);
        assert_eq!(parsed.title, "water plants");
    }

    #[test]
    fn at_parse_05_detached_meridiem_and_minutes() {
        let parsed = parser().parse("dentist tomorrow 6:30 pm", now());
        assert_eq!(
            parsed.due_at.unwrap().to_rfc3339(),
            "2025-01-11T13:00:00Z"
        );
    }

    #[test]
    fn at_parse_06_all_stopword_text_keeps_original_as_title() {
        let parsed = parser().parse("to be at it", now());
        assert_eq!(parsed.title, "to be at it");
    }
}
