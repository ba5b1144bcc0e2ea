//! Temporal values: DATE and DATE-TIME (RFC 5545 §3.3.4, §3.3.5).

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use thiserror::Error;

/// How a date-time relates to time zones.
///
/// Assigned at parse time from the `Z` suffix or a `TZID` parameter; a
/// `Zoned` disposition may be re-decided by the document context once all
/// zone definitions are known (definitions may appear after their first
/// reference in the text stream).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ZoneDisposition {
    /// Absolute time, `Z`-suffixed on the wire.
    Utc,
    /// No zone association; interpreted in the consumer's local zone.
    Floating,
    /// Local time in a named zone, referenced by TZID.
    Zoned(String),
}

impl ZoneDisposition {
    /// Returns the referenced zone identifier, if any.
    #[must_use]
    pub fn tzid(&self) -> Option<&str> {
        match self {
            Self::Zoned(tzid) => Some(tzid),
            Self::Utc | Self::Floating => None,
        }
    }
}

/// Error for strictly unparseable temporal text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TemporalParseError {
    #[error("invalid date: {0:?}")]
    InvalidDate(String),
    #[error("invalid time: {0:?}")]
    InvalidTime(String),
}

/// A date or date-time value.
///
/// `has_time == false` means a pure calendar date: no time-of-day and no
/// zone marker on the wire. Malformed-but-tolerated input keeps its original
/// text in `raw` and echoes it verbatim on write instead of reformatting.
#[derive(Debug, Clone)]
pub struct Temporal {
    /// Parsed point in time; `None` for a raw-only (tolerated) value.
    instant: Option<NaiveDateTime>,
    /// Whether the value carries a time-of-day.
    has_time: bool,
    /// Original digit groups, kept only when the value could not be parsed.
    raw: Option<String>,
    /// Zone disposition; the only field the resolver may backfill.
    zone: ZoneDisposition,
}

impl Temporal {
    /// Creates a pure date value.
    #[must_use]
    pub fn date(date: NaiveDate) -> Self {
        Self {
            instant: Some(date.and_time(NaiveTime::MIN)),
            has_time: false,
            raw: None,
            zone: ZoneDisposition::Floating,
        }
    }

    /// Creates a date-time value with an explicit zone disposition.
    #[must_use]
    pub fn date_time(instant: NaiveDateTime, zone: ZoneDisposition) -> Self {
        Self {
            instant: Some(instant),
            has_time: true,
            raw: None,
            zone,
        }
    }

    /// Creates a UTC date-time value.
    #[must_use]
    pub fn utc(instant: NaiveDateTime) -> Self {
        Self::date_time(instant, ZoneDisposition::Utc)
    }

    /// Creates a floating date-time value.
    #[must_use]
    pub fn floating(instant: NaiveDateTime) -> Self {
        Self::date_time(instant, ZoneDisposition::Floating)
    }

    /// Creates a raw-only value that echoes its source text on write.
    #[must_use]
    pub fn unparsed(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let has_time = raw.contains('T');
        Self {
            instant: None,
            has_time,
            raw: Some(raw),
            zone: ZoneDisposition::Floating,
        }
    }

    /// Parses a DATE (`YYYYMMDD`) or DATE-TIME (`YYYYMMDD"T"HHMMSS[Z]`)
    /// value. A `TZID` parameter value supplies the zone for non-UTC times.
    ///
    /// ## Errors
    /// Returns an error when the digit groups do not form a valid date or
    /// time. Callers in the tolerant tier fall back to [`Self::unparsed`].
    pub fn parse(raw: &str, tzid: Option<&str>) -> Result<Self, TemporalParseError> {
        let s = raw.trim();

        let Some(t_pos) = s.find('T') else {
            let date = parse_date_digits(s)
                .ok_or_else(|| TemporalParseError::InvalidDate(s.to_string()))?;
            return Ok(Self::date(date));
        };

        let date = parse_date_digits(&s[..t_pos])
            .ok_or_else(|| TemporalParseError::InvalidDate(s.to_string()))?;
        let (time, is_utc) = parse_time_digits(&s[t_pos + 1..])
            .ok_or_else(|| TemporalParseError::InvalidTime(s.to_string()))?;

        let zone = if is_utc {
            ZoneDisposition::Utc
        } else if let Some(tz) = tzid {
            ZoneDisposition::Zoned(tz.to_string())
        } else {
            ZoneDisposition::Floating
        };

        Ok(Self::date_time(date.and_time(time), zone).with_has_time(true))
    }

    fn with_has_time(mut self, has_time: bool) -> Self {
        self.has_time = has_time;
        self
    }

    /// Returns the parsed instant, if any.
    #[must_use]
    pub fn instant(&self) -> Option<NaiveDateTime> {
        self.instant
    }

    /// Returns whether the value carries a time-of-day.
    #[must_use]
    pub fn has_time(&self) -> bool {
        self.has_time
    }

    /// Returns the zone disposition.
    #[must_use]
    pub fn zone(&self) -> &ZoneDisposition {
        &self.zone
    }

    /// Returns the preserved source text for raw-only values.
    #[must_use]
    pub fn raw_text(&self) -> Option<&str> {
        self.raw.as_deref()
    }

    /// Returns whether the value holds anything at all.
    #[must_use]
    pub fn is_present(&self) -> bool {
        self.instant.is_some() || self.raw.is_some()
    }

    /// Backfills the zone disposition (resolver pass 2).
    pub fn set_zone(&mut self, zone: ZoneDisposition) {
        self.zone = zone;
    }

    /// Formats the value in its own disposition.
    ///
    /// Raw-only values echo their source text verbatim. Pure dates render
    /// with no zone marker regardless of disposition.
    #[must_use]
    pub fn format(&self) -> Option<String> {
        if let Some(raw) = &self.raw {
            return Some(raw.clone());
        }
        let instant = self.instant?;
        if !self.has_time {
            return Some(instant.date().format("%Y%m%d").to_string());
        }
        let mut out = instant.format("%Y%m%dT%H%M%S").to_string();
        if self.zone == ZoneDisposition::Utc {
            out.push('Z');
        }
        Some(out)
    }
}

impl PartialEq for Temporal {
    fn eq(&self, other: &Self) -> bool {
        match (self.instant, other.instant) {
            (Some(a), Some(b)) => {
                if self.has_time != other.has_time {
                    return false;
                }
                if self.has_time {
                    a == b && self.zone == other.zone
                } else {
                    a.date() == b.date()
                }
            }
            (None, None) => self.raw == other.raw,
            _ => false,
        }
    }
}

impl Eq for Temporal {}

impl std::fmt::Display for Temporal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.format().unwrap_or_default())
    }
}

/// Parses an 8-digit `YYYYMMDD` group.
fn parse_date_digits(s: &str) -> Option<NaiveDate> {
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let year = s[0..4].parse::<i32>().ok()?;
    let month = s[4..6].parse::<u32>().ok()?;
    let day = s[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(year, month, day)
}

/// Parses an `HHMMSS[Z]` group. `HHMM[Z]` is accepted for legacy input.
fn parse_time_digits(s: &str) -> Option<(NaiveTime, bool)> {
    let (digits, is_utc) = match s.strip_suffix('Z') {
        Some(stripped) => (stripped, true),
        None => (s, false),
    };

    if !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let (hour, minute, second) = match digits.len() {
        6 => (
            digits[0..2].parse::<u32>().ok()?,
            digits[2..4].parse::<u32>().ok()?,
            digits[4..6].parse::<u32>().ok()?,
        ),
        4 => (
            digits[0..2].parse::<u32>().ok()?,
            digits[2..4].parse::<u32>().ok()?,
            0,
        ),
        _ => return None,
    };

    let time = NaiveTime::from_hms_opt(hour, minute, second)?;
    Some((time, is_utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_date_basic() {
        let t = Temporal::parse("19970714", None).unwrap();
        assert!(!t.has_time());
        assert_eq!(
            t.instant().unwrap().date(),
            NaiveDate::from_ymd_opt(1997, 7, 14).unwrap()
        );
        assert_eq!(t.format().unwrap(), "19970714");
    }

    #[test]
    fn parse_datetime_utc() {
        let t = Temporal::parse("19970714T133000Z", None).unwrap();
        assert!(t.has_time());
        assert_eq!(*t.zone(), ZoneDisposition::Utc);
        assert_eq!(t.format().unwrap(), "19970714T133000Z");
    }

    #[test]
    fn parse_datetime_floating() {
        let t = Temporal::parse("19970714T133000", None).unwrap();
        assert_eq!(*t.zone(), ZoneDisposition::Floating);
        assert_eq!(t.format().unwrap(), "19970714T133000");
    }

    #[test]
    fn parse_datetime_zoned() {
        let t = Temporal::parse("19970714T133000", Some("America/New_York")).unwrap();
        assert_eq!(t.zone().tzid(), Some("America/New_York"));
    }

    #[test]
    fn parse_legacy_hhmm() {
        let t = Temporal::parse("19970714T1330", None).unwrap();
        assert_eq!(t.instant().unwrap().format("%H%M%S").to_string(), "133000");
    }

    #[test]
    fn parse_rejects_bad_month() {
        assert!(Temporal::parse("19971314", None).is_err());
        assert!(Temporal::parse("1997071", None).is_err());
        assert!(Temporal::parse("19970714T256000", None).is_err());
    }

    #[test]
    fn unparsed_echoes_verbatim() {
        let t = Temporal::unparsed("19970a14T133000");
        assert!(t.instant().is_none());
        assert_eq!(t.format().unwrap(), "19970a14T133000");
    }

    #[test]
    fn date_equality_ignores_zone() {
        let mut a = Temporal::date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let b = Temporal::date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        a.set_zone(ZoneDisposition::Utc);
        assert_eq!(a, b);
    }

    #[test]
    fn datetime_equality_requires_zone() {
        let a = Temporal::parse("19970714T133000Z", None).unwrap();
        let b = Temporal::parse("19970714T133000", None).unwrap();
        assert_ne!(a, b);
    }
}
