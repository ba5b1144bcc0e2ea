//! Recurrence rule value model (RFC 5545 §3.3.10).
//!
//! `Recur` is a pure value: it does not expand occurrences. Expansion is the
//! job of a separate engine.

use super::Temporal;

/// Recurrence frequency.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    /// Returns the wire name for this frequency.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Secondly => "SECONDLY",
            Self::Minutely => "MINUTELY",
            Self::Hourly => "HOURLY",
            Self::Daily => "DAILY",
            Self::Weekly => "WEEKLY",
            Self::Monthly => "MONTHLY",
            Self::Yearly => "YEARLY",
        }
    }

    /// Parses a frequency name (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SECONDLY" => Some(Self::Secondly),
            "MINUTELY" => Some(Self::Minutely),
            "HOURLY" => Some(Self::Hourly),
            "DAILY" => Some(Self::Daily),
            "WEEKLY" => Some(Self::Weekly),
            "MONTHLY" => Some(Self::Monthly),
            "YEARLY" => Some(Self::Yearly),
            _ => None,
        }
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Day of the week.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Weekday {
    Sunday,
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
}

impl Weekday {
    /// Returns the two-letter wire abbreviation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Sunday => "SU",
            Self::Monday => "MO",
            Self::Tuesday => "TU",
            Self::Wednesday => "WE",
            Self::Thursday => "TH",
            Self::Friday => "FR",
            Self::Saturday => "SA",
        }
    }

    /// Parses a two-letter abbreviation (case-insensitive).
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SU" => Some(Self::Sunday),
            "MO" => Some(Self::Monday),
            "TU" => Some(Self::Tuesday),
            "WE" => Some(Self::Wednesday),
            "TH" => Some(Self::Thursday),
            "FR" => Some(Self::Friday),
            "SA" => Some(Self::Saturday),
            _ => None,
        }
    }
}

impl std::fmt::Display for Weekday {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A weekday with an optional signed ordinal (e.g. `MO`, `1MO`, `-1FR`).
///
/// An absent ordinal means every occurrence of that weekday in the period.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayNum {
    pub ordinal: Option<i8>,
    pub weekday: Weekday,
}

impl WeekdayNum {
    /// Creates an entry without an ordinal.
    #[must_use]
    pub const fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: None,
            weekday,
        }
    }

    /// Creates an entry with a signed ordinal.
    #[must_use]
    pub const fn nth(ordinal: i8, weekday: Weekday) -> Self {
        Self {
            ordinal: Some(ordinal),
            weekday,
        }
    }
}

impl std::fmt::Display for WeekdayNum {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(ordinal) = self.ordinal {
            write!(f, "{ordinal}")?;
        }
        write!(f, "{}", self.weekday)
    }
}

/// A recurrence rule.
///
/// All list fields preserve insertion order for round-trip fidelity (order
/// is not semantically significant; duplicates are allowed). `count` and
/// `until` are mutually exclusive; the builder enforces last-write-wins.
/// Unknown rule parts land in `extensions`, an ordered name → values
/// multimap that is re-emitted after all standard fields.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Recur {
    pub freq: Option<Frequency>,
    pub interval: Option<u32>,
    pub count: Option<u32>,
    pub until: Option<Temporal>,
    pub by_second: Vec<u8>,
    pub by_minute: Vec<u8>,
    pub by_hour: Vec<u8>,
    pub by_day: Vec<WeekdayNum>,
    pub by_month_day: Vec<i8>,
    pub by_year_day: Vec<i16>,
    pub by_week_no: Vec<i8>,
    pub by_month: Vec<u8>,
    pub by_set_pos: Vec<i16>,
    pub wkst: Option<Weekday>,
    pub extensions: Vec<(String, Vec<String>)>,
}

impl Recur {
    /// Creates a rule with the given frequency.
    #[must_use]
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq: Some(freq),
            ..Self::default()
        }
    }

    /// Creates an empty (no-op) rule. Serializes to nothing.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns whether this is the empty rule.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.freq.is_none()
    }

    /// Sets the recurrence interval.
    #[must_use]
    pub fn with_interval(mut self, interval: u32) -> Self {
        self.interval = Some(interval);
        self
    }

    /// Sets a count terminal, clearing any until.
    #[must_use]
    pub fn with_count(mut self, count: u32) -> Self {
        self.set_count(count);
        self
    }

    /// Sets an until terminal, clearing any count.
    #[must_use]
    pub fn with_until(mut self, until: Temporal) -> Self {
        self.set_until(until);
        self
    }

    /// Clears the terminal condition entirely (infinite rule).
    #[must_use]
    pub fn infinite(mut self) -> Self {
        self.count = None;
        self.until = None;
        self
    }

    /// Sets a count terminal, clearing any until. Last write wins.
    pub fn set_count(&mut self, count: u32) {
        self.until = None;
        self.count = Some(count);
    }

    /// Sets an until terminal, clearing any count. Last write wins.
    pub fn set_until(&mut self, until: Temporal) {
        self.count = None;
        self.until = Some(until);
    }

    /// Appends BYSECOND values.
    #[must_use]
    pub fn by_second(mut self, seconds: impl IntoIterator<Item = u8>) -> Self {
        self.by_second.extend(seconds);
        self
    }

    /// Appends BYMINUTE values.
    #[must_use]
    pub fn by_minute(mut self, minutes: impl IntoIterator<Item = u8>) -> Self {
        self.by_minute.extend(minutes);
        self
    }

    /// Appends BYHOUR values.
    #[must_use]
    pub fn by_hour(mut self, hours: impl IntoIterator<Item = u8>) -> Self {
        self.by_hour.extend(hours);
        self
    }

    /// Appends BYDAY values.
    #[must_use]
    pub fn by_day(mut self, days: impl IntoIterator<Item = WeekdayNum>) -> Self {
        self.by_day.extend(days);
        self
    }

    /// Appends BYMONTHDAY values.
    #[must_use]
    pub fn by_month_day(mut self, days: impl IntoIterator<Item = i8>) -> Self {
        self.by_month_day.extend(days);
        self
    }

    /// Appends BYYEARDAY values.
    #[must_use]
    pub fn by_year_day(mut self, days: impl IntoIterator<Item = i16>) -> Self {
        self.by_year_day.extend(days);
        self
    }

    /// Appends BYWEEKNO values.
    #[must_use]
    pub fn by_week_no(mut self, weeks: impl IntoIterator<Item = i8>) -> Self {
        self.by_week_no.extend(weeks);
        self
    }

    /// Appends BYMONTH values.
    #[must_use]
    pub fn by_month(mut self, months: impl IntoIterator<Item = u8>) -> Self {
        self.by_month.extend(months);
        self
    }

    /// Appends BYSETPOS values.
    #[must_use]
    pub fn by_set_pos(mut self, positions: impl IntoIterator<Item = i16>) -> Self {
        self.by_set_pos.extend(positions);
        self
    }

    /// Sets the week-start day.
    #[must_use]
    pub fn with_wkst(mut self, wkst: Weekday) -> Self {
        self.wkst = Some(wkst);
        self
    }

    /// Appends an extension rule part, keeping insertion order.
    #[must_use]
    pub fn with_extension(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = String>,
    ) -> Self {
        self.add_extension(name, values.into_iter().collect());
        self
    }

    /// Appends an extension rule part, keeping insertion order.
    pub fn add_extension(&mut self, name: impl Into<String>, values: Vec<String>) {
        self.extensions
            .push((name.into().to_ascii_uppercase(), values));
    }
}
