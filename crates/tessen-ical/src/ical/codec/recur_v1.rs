//! Codec for the legacy vCal 1.0 recurrence grammar.
//!
//! This is a different language from the modern one, not a variant encoding:
//! a whitespace-separated positional token stream like `W2 MO TU #5`. The
//! first token glues frequency and interval together (`YD3`, `MP1`, `W2`,
//! `D1`, `M10`); the letter prefix selects a handler that interprets the
//! following tokens until a `#n` count or a date terminates the rule.
//!
//! One property value may pack several rules back to back. Parsing such a
//! value yields [`Decoded::Split`]: the caller fans the sub-rules out into
//! sibling properties. A sub-rule that cannot be parsed at all is retained
//! verbatim as [`LegacyRecur::Unparsed`] so no data is lost.

use super::{CannotParse, DataType, Decoded, PropertyCodec, SpecVersion, Warning};
use crate::ical::core::{Frequency, Parameters, Recur, Temporal, Weekday, WeekdayNum};
use crate::ical::zone::{DocumentContext, render_until};

/// A legacy recurrence value: a parsed rule, or raw text kept when parsing
/// failed.
#[derive(Debug, Clone, PartialEq)]
pub enum LegacyRecur {
    Rule(Recur),
    Unparsed(String),
}

impl LegacyRecur {
    /// Returns the parsed rule, if this value holds one.
    #[must_use]
    pub fn as_rule(&self) -> Option<&Recur> {
        match self {
            Self::Rule(rule) => Some(rule),
            Self::Unparsed(_) => None,
        }
    }
}

/// Codec for the legacy grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurCodecV1;

impl PropertyCodec for RecurCodecV1 {
    type Value = LegacyRecur;

    fn data_type(&self, _value: &LegacyRecur, _version: SpecVersion) -> DataType {
        DataType::Recur
    }

    fn write_text(
        &self,
        value: &LegacyRecur,
        ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Option<String> {
        match value {
            LegacyRecur::Unparsed(raw) => Some(raw.clone()),
            LegacyRecur::Rule(rule) => write_rule(rule, ctx),
        }
    }

    fn parse_text(
        &self,
        raw: &str,
        _params: &Parameters,
        ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Result<Decoded<LegacyRecur>, CannotParse> {
        let tokens: Vec<&str> = raw.split_whitespace().collect();
        if tokens.is_empty() {
            return Ok(Decoded::Single(LegacyRecur::Rule(Recur::empty())));
        }

        let mut rules = Vec::new();
        for group in split_rule_groups(&tokens) {
            match parse_single_rule(&group, ctx) {
                Some(rule) => rules.push(LegacyRecur::Rule(rule)),
                None => {
                    let text = group.join(" ");
                    ctx.warn(
                        Warning::new("unrecognized legacy rule, keeping raw text")
                            .with_raw(&text),
                    );
                    rules.push(LegacyRecur::Unparsed(text));
                }
            }
        }

        if rules.len() == 1 {
            let only = rules.pop().ok_or_else(|| {
                CannotParse::new("RECUR", "legacy rule vanished during parsing")
            })?;
            Ok(Decoded::Single(only))
        } else {
            Ok(Decoded::Split(rules))
        }
    }
}

/// Splits a packed token stream at rule boundaries: a `#n` count token or a
/// date token ends the current rule.
fn split_rule_groups<'a>(tokens: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut groups = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for &token in tokens {
        current.push(token);
        if parse_count_token(token).is_some() || is_date_token(token) {
            groups.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        groups.push(current);
    }
    groups
}

/// `#n` → Some(n). `#0` means infinite.
fn parse_count_token(token: &str) -> Option<u32> {
    let digits = token.strip_prefix('#')?;
    if digits.is_empty() {
        return None;
    }
    digits.parse().ok()
}

/// `YYYYMMDD`, optionally followed by `T` + 4 or 6 digits + optional `Z`.
fn is_date_token(token: &str) -> bool {
    let body = token.strip_suffix('Z').unwrap_or(token);
    let (date, time) = match body.split_once('T') {
        Some((d, t)) => (d, Some(t)),
        None => (body, None),
    };
    if date.len() != 8 || !date.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    match time {
        None => !token.contains('T'),
        Some(t) => (t.len() == 4 || t.len() == 6) && t.bytes().all(|b| b.is_ascii_digit()),
    }
}

/// Frequency-specific token handler selected by the lead token's prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeadKind {
    YearDay,
    YearMonth,
    MonthDay,
    MonthPos,
    Week,
    Day,
    Minute,
}

impl LeadKind {
    const fn frequency(self) -> Frequency {
        match self {
            Self::YearDay | Self::YearMonth => Frequency::Yearly,
            Self::MonthDay | Self::MonthPos => Frequency::Monthly,
            Self::Week => Frequency::Weekly,
            Self::Day => Frequency::Daily,
            Self::Minute => Frequency::Minutely,
        }
    }
}

/// Parses the glued frequency+interval lead token (`W2`, `YD3`, `MP1`).
/// Two-letter prefixes are checked before one-letter ones.
fn parse_lead_token(token: &str) -> Option<(LeadKind, u32)> {
    let (kind, rest) = if let Some(rest) = token.strip_prefix("YD") {
        (LeadKind::YearDay, rest)
    } else if let Some(rest) = token.strip_prefix("YM") {
        (LeadKind::YearMonth, rest)
    } else if let Some(rest) = token.strip_prefix("MD") {
        (LeadKind::MonthDay, rest)
    } else if let Some(rest) = token.strip_prefix("MP") {
        (LeadKind::MonthPos, rest)
    } else if let Some(rest) = token.strip_prefix('W') {
        (LeadKind::Week, rest)
    } else if let Some(rest) = token.strip_prefix('D') {
        (LeadKind::Day, rest)
    } else if let Some(rest) = token.strip_prefix('M') {
        (LeadKind::Minute, rest)
    } else {
        return None;
    };

    let interval = if rest.is_empty() {
        1
    } else {
        rest.parse().ok()?
    };
    Some((kind, interval))
}

/// Strips the known-unsupported trailing `$` marker, warning once per token.
fn strip_marker<'a>(token: &'a str, ctx: &mut DocumentContext) -> &'a str {
    match token.strip_suffix('$') {
        Some(stripped) => {
            ctx.warn(Warning::new("unsupported '$' marker stripped").with_raw(token));
            stripped
        }
        None => token,
    }
}

/// `HHMM` time-of-day token.
fn parse_hhmm(token: &str) -> Option<(u8, u8)> {
    if token.len() != 4 || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let hour = token[0..2].parse::<u8>().ok()?;
    let minute = token[2..4].parse::<u8>().ok()?;
    (hour < 24 && minute < 60).then_some((hour, minute))
}

/// Numbers with the legacy *trailing* sign: `5+` → 5, `3-` → -3.
fn parse_trailing_signed<T>(token: &str) -> Option<T>
where
    T: std::str::FromStr + std::ops::Neg<Output = T>,
{
    if let Some(digits) = token.strip_suffix('+') {
        digits.parse().ok()
    } else if let Some(digits) = token.strip_suffix('-') {
        digits.parse::<T>().ok().map(std::ops::Neg::neg)
    } else {
        token.parse().ok()
    }
}

/// Parses one rule's worth of tokens. Returns `None` when the lead token is
/// not recognized (caller keeps the raw text); token-level defects inside a
/// recognized rule warn and continue.
fn parse_single_rule(tokens: &[&str], ctx: &mut DocumentContext) -> Option<Recur> {
    let mut iter = tokens.iter();
    let lead = strip_marker(iter.next()?, ctx);
    let (kind, interval) = parse_lead_token(lead)?;

    let mut rule = Recur::new(kind.frequency());
    if interval != 1 {
        rule.interval = Some(interval);
    }

    let mut terminated = false;
    // MP: a signed ordinal applies to the weekday tokens that follow it
    let mut current_ordinal: Option<i8> = None;
    // MP: an HHMM token switches the handler into time-of-day mode
    let mut time_mode = false;

    for token in iter {
        let token = strip_marker(token, ctx);
        if token.is_empty() {
            continue;
        }

        if let Some(count) = parse_count_token(token) {
            if count == 0 {
                // #0 means infinite
                rule.count = None;
                rule.until = None;
            } else {
                rule.set_count(count);
            }
            terminated = true;
            continue;
        }
        if is_date_token(token) {
            match Temporal::parse(token, None) {
                Ok(until) => rule.set_until(until),
                Err(err) => {
                    ctx.warn(Warning::new(err.to_string()).with_raw(token));
                    rule.set_until(Temporal::unparsed(token));
                }
            }
            terminated = true;
            continue;
        }

        match kind {
            LeadKind::Week => match Weekday::parse(token) {
                Some(day) => rule.by_day.push(WeekdayNum::every(day)),
                None => warn_token(ctx, "W", token),
            },
            LeadKind::YearDay => match parse_trailing_signed::<i16>(token) {
                Some(day) => rule.by_year_day.push(day),
                None => warn_token(ctx, "YD", token),
            },
            LeadKind::YearMonth => match token.parse::<u8>() {
                Ok(month) => rule.by_month.push(month),
                Err(_) => warn_token(ctx, "YM", token),
            },
            LeadKind::MonthDay => match parse_trailing_signed::<i8>(token) {
                Some(day) => rule.by_month_day.push(day),
                None => warn_token(ctx, "MD", token),
            },
            LeadKind::MonthPos => {
                if let Some((hour, minute)) = parse_hhmm(token) {
                    time_mode = true;
                    rule.by_hour.push(hour);
                    rule.by_minute.push(minute);
                } else if time_mode {
                    warn_token(ctx, "MP", token);
                } else if let Some(day) = Weekday::parse(token) {
                    rule.by_day.push(WeekdayNum {
                        ordinal: current_ordinal,
                        weekday: day,
                    });
                } else if let Some(ordinal) = parse_trailing_signed::<i8>(token) {
                    current_ordinal = Some(ordinal);
                } else {
                    warn_token(ctx, "MP", token);
                }
            }
            LeadKind::Day => {
                if let Some((hour, minute)) = parse_hhmm(token) {
                    rule.by_hour.push(hour);
                    rule.by_minute.push(minute);
                } else {
                    warn_token(ctx, "D", token);
                }
            }
            LeadKind::Minute => warn_token(ctx, "M", token),
        }
    }

    if !terminated {
        // legacy default: two occurrences when neither #n nor a date is given
        rule.set_count(2);
    }
    Some(rule)
}

fn warn_token(ctx: &mut DocumentContext, handler: &str, token: &str) {
    ctx.warn(
        Warning::new("unrecognized token for handler, dropping")
            .with_field(handler)
            .with_raw(token),
    );
}

/// Writes a parsed rule back to the legacy grammar.
fn write_rule(rule: &Recur, ctx: &mut DocumentContext) -> Option<String> {
    let freq = rule.freq?;
    let interval = rule.interval.unwrap_or(1);
    let mut tokens: Vec<String> = Vec::new();

    match freq {
        Frequency::Yearly => {
            if rule.by_year_day.is_empty() {
                tokens.push(format!("YM{interval}"));
                for month in &rule.by_month {
                    tokens.push(month.to_string());
                }
            } else {
                tokens.push(format!("YD{interval}"));
                for day in &rule.by_year_day {
                    tokens.push(trailing_signed(i64::from(*day)));
                }
            }
        }
        Frequency::Monthly => {
            if rule.by_day.is_empty() {
                tokens.push(format!("MD{interval}"));
                for day in &rule.by_month_day {
                    tokens.push(trailing_signed(i64::from(*day)));
                }
            } else {
                tokens.push(format!("MP{interval}"));
                let mut last_ordinal = None;
                for entry in &rule.by_day {
                    if last_ordinal != Some(entry.ordinal) {
                        if let Some(ordinal) = entry.ordinal {
                            tokens.push(trailing_signed(i64::from(ordinal)));
                        }
                        last_ordinal = Some(entry.ordinal);
                    }
                    tokens.push(entry.weekday.as_str().to_string());
                }
            }
        }
        Frequency::Weekly => {
            tokens.push(format!("W{interval}"));
            for entry in &rule.by_day {
                tokens.push(entry.weekday.as_str().to_string());
            }
        }
        Frequency::Daily => {
            tokens.push(format!("D{interval}"));
            for (i, hour) in rule.by_hour.iter().enumerate() {
                let minute = rule.by_minute.get(i).copied().unwrap_or(0);
                tokens.push(format!("{hour:02}{minute:02}"));
            }
        }
        // the grammar has no hourly handler; express it in minutes
        Frequency::Hourly => tokens.push(format!("M{}", interval.saturating_mul(60))),
        Frequency::Minutely => tokens.push(format!("M{interval}")),
        Frequency::Secondly => {
            ctx.warn(Warning::new(
                "SECONDLY frequency has no legacy representation, skipping property",
            ));
            return None;
        }
    }

    if let Some(until) = &rule.until {
        if let Some(text) = render_until(until, ctx, SpecVersion::VCal10) {
            tokens.push(text);
        } else {
            tokens.push("#0".to_string());
        }
    } else if let Some(count) = rule.count {
        tokens.push(format!("#{count}"));
    } else {
        // explicit marker: a bare rule would otherwise read back as count 2
        tokens.push("#0".to_string());
    }

    Some(tokens.join(" "))
}

fn trailing_signed(n: i64) -> String {
    if n < 0 {
        format!("{}-", -n)
    } else {
        format!("{n}+")
    }
}
