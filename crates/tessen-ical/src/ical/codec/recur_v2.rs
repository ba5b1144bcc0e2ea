//! Codec for the modern recurrence grammar (RFC 5545 / RFC 2445 §3.3.10).
//!
//! `FREQ=WEEKLY;COUNT=5;BYDAY=MO,TU` on the wire; `;`-separated
//! `NAME=value[,value...]` components. Names are case-insensitive on read.
//! On write the standard fields come out in one fixed canonical order with
//! FREQ first and extension rules last; that ordering is part of the wire
//! contract.

use std::fmt::Write as _;

use serde_json::Value as JsonValue;

use super::escape::{escape_text, split_unescaped, unescape_text};
use super::{
    CannotParse, DataType, Decoded, PropertyCodec, SpecVersion, Warning, resolve_reference,
    xml_escape,
};
use crate::ical::core::{Frequency, Parameters, Recur, Temporal, Weekday, WeekdayNum};
use crate::ical::zone::{DocumentContext, render_until};

/// Codec for the modern RECUR grammar.
#[derive(Debug, Clone, Copy, Default)]
pub struct RecurCodecV2;

impl PropertyCodec for RecurCodecV2 {
    type Value = Recur;

    fn data_type(&self, _value: &Recur, _version: SpecVersion) -> DataType {
        DataType::Recur
    }

    fn write_text(
        &self,
        value: &Recur,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<String> {
        // empty rule: skip the property entirely
        let freq = value.freq?;

        let mut parts = vec![format!("FREQ={freq}")];
        if let Some(until) = &value.until {
            if let Some(text) = render_until(until, ctx, version) {
                parts.push(format!("UNTIL={text}"));
            }
        }
        if let Some(count) = value.count {
            parts.push(format!("COUNT={count}"));
        }
        if let Some(interval) = value.interval {
            parts.push(format!("INTERVAL={interval}"));
        }
        push_list(&mut parts, "BYSECOND", &value.by_second);
        push_list(&mut parts, "BYMINUTE", &value.by_minute);
        push_list(&mut parts, "BYHOUR", &value.by_hour);
        push_list(&mut parts, "BYDAY", &value.by_day);
        push_list(&mut parts, "BYMONTHDAY", &value.by_month_day);
        push_list(&mut parts, "BYYEARDAY", &value.by_year_day);
        push_list(&mut parts, "BYWEEKNO", &value.by_week_no);
        push_list(&mut parts, "BYMONTH", &value.by_month);
        push_list(&mut parts, "BYSETPOS", &value.by_set_pos);
        if let Some(wkst) = value.wkst {
            parts.push(format!("WKST={wkst}"));
        }
        for (name, values) in &value.extensions {
            let joined = values
                .iter()
                .map(|v| escape_text(v))
                .collect::<Vec<_>>()
                .join(",");
            parts.push(format!("{name}={joined}"));
        }

        Some(parts.join(";"))
    }

    fn parse_text(
        &self,
        raw: &str,
        _params: &Parameters,
        ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Result<Decoded<Recur>, CannotParse> {
        let mut rule = Recur::empty();
        let mut seen = SeenScalars::default();

        for component in split_unescaped(raw, ';') {
            if component.is_empty() {
                continue;
            }
            let Some(eq) = component.find('=') else {
                ctx.warn(
                    Warning::new("rule component has no '=', skipping").with_raw(&component),
                );
                continue;
            };
            let name = component[..eq].to_ascii_uppercase();
            let values: Vec<String> = split_unescaped(&component[eq + 1..], ',')
                .iter()
                .map(|v| unescape_text(v))
                .collect();
            apply_part(&mut rule, &mut seen, &name, &values, ctx);
        }

        Ok(Decoded::Single(rule))
    }

    fn write_xml(
        &self,
        value: &Recur,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<String> {
        let freq = value.freq?;

        let mut xml = String::from("<recur>");
        let _ = write!(xml, "<freq>{freq}</freq>");
        if let Some(until) = &value.until {
            if let Some(text) = render_until(until, ctx, version) {
                let _ = write!(xml, "<until>{}</until>", xml_escape(&text));
            }
        }
        if let Some(count) = value.count {
            let _ = write!(xml, "<count>{count}</count>");
        }
        if let Some(interval) = value.interval {
            let _ = write!(xml, "<interval>{interval}</interval>");
        }
        push_xml_list(&mut xml, "bysecond", &value.by_second);
        push_xml_list(&mut xml, "byminute", &value.by_minute);
        push_xml_list(&mut xml, "byhour", &value.by_hour);
        push_xml_list(&mut xml, "byday", &value.by_day);
        push_xml_list(&mut xml, "bymonthday", &value.by_month_day);
        push_xml_list(&mut xml, "byyearday", &value.by_year_day);
        push_xml_list(&mut xml, "byweekno", &value.by_week_no);
        push_xml_list(&mut xml, "bymonth", &value.by_month);
        push_xml_list(&mut xml, "bysetpos", &value.by_set_pos);
        if let Some(wkst) = value.wkst {
            let _ = write!(xml, "<wkst>{wkst}</wkst>");
        }
        for (name, values) in &value.extensions {
            let tag = name.to_ascii_lowercase();
            for v in values {
                let _ = write!(xml, "<{tag}>{}</{tag}>", xml_escape(v));
            }
        }
        xml.push_str("</recur>");

        Some(xml)
    }

    fn parse_xml(
        &self,
        fragment: &str,
        _params: &Parameters,
        ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Result<Decoded<Recur>, CannotParse> {
        use quick_xml::Reader;
        use quick_xml::events::Event;

        let mut reader = Reader::from_reader(fragment.as_bytes());

        let mut buf = Vec::new();
        let mut rule = Recur::empty();
        let mut seen = SeenScalars::default();
        let mut depth = 0u32;
        let mut current: Option<String> = None;
        let mut text = String::new();
        let mut field_count = 0u32;

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    depth += 1;
                    if depth == 2 {
                        let name = String::from_utf8_lossy(e.local_name().as_ref())
                            .to_ascii_uppercase();
                        current = Some(name);
                        text.clear();
                    }
                }
                Ok(Event::Text(ref e)) => {
                    if current.is_some() {
                        if let Ok(decoded) = reader.decoder().decode(e.as_ref()) {
                            text.push_str(&decoded);
                        }
                    }
                }
                Ok(Event::GeneralRef(ref e)) => {
                    if current.is_some() {
                        match resolve_reference(&reader, e) {
                            Some(c) => text.push(c),
                            None => ctx.warn(
                                Warning::new("unresolvable XML entity, dropping")
                                    .with_raw(String::from_utf8_lossy(e.as_ref())),
                            ),
                        }
                    }
                }
                Ok(Event::End(_)) => {
                    if depth == 2 {
                        if let Some(name) = current.take() {
                            field_count += 1;
                            apply_part(
                                &mut rule,
                                &mut seen,
                                &name,
                                std::slice::from_ref(&text),
                                ctx,
                            );
                        }
                    }
                    depth = depth.saturating_sub(1);
                }
                Ok(Event::Empty(ref e)) => {
                    if depth == 1 {
                        let name = String::from_utf8_lossy(e.local_name().as_ref())
                            .to_ascii_uppercase();
                        field_count += 1;
                        apply_part(&mut rule, &mut seen, &name, &[String::new()], ctx);
                    }
                }
                Ok(Event::Eof) => break,
                Err(_) => return Err(CannotParse::new("RECUR", "malformed XML fragment")),
                _ => {}
            }
            buf.clear();
        }

        if field_count == 0 {
            return Err(CannotParse::new(
                "RECUR",
                "XML recur fragment has no rule-part elements",
            ));
        }
        Ok(Decoded::Single(rule))
    }

    fn write_json(
        &self,
        value: &Recur,
        ctx: &mut DocumentContext,
        version: SpecVersion,
    ) -> Option<JsonValue> {
        let freq = value.freq?;

        let mut obj = serde_json::Map::new();
        obj.insert("freq".to_string(), JsonValue::String(freq.to_string()));
        if let Some(until) = &value.until {
            if let Some(text) = render_until(until, ctx, version) {
                obj.insert("until".to_string(), JsonValue::String(text));
            }
        }
        if let Some(count) = value.count {
            obj.insert("count".to_string(), JsonValue::from(count));
        }
        if let Some(interval) = value.interval {
            obj.insert("interval".to_string(), JsonValue::from(interval));
        }
        insert_json_numbers(&mut obj, "bysecond", &value.by_second);
        insert_json_numbers(&mut obj, "byminute", &value.by_minute);
        insert_json_numbers(&mut obj, "byhour", &value.by_hour);
        if !value.by_day.is_empty() {
            let days = value
                .by_day
                .iter()
                .map(|d| JsonValue::String(d.to_string()))
                .collect();
            obj.insert("byday".to_string(), JsonValue::Array(days));
        }
        insert_json_numbers(&mut obj, "bymonthday", &value.by_month_day);
        insert_json_numbers(&mut obj, "byyearday", &value.by_year_day);
        insert_json_numbers(&mut obj, "byweekno", &value.by_week_no);
        insert_json_numbers(&mut obj, "bymonth", &value.by_month);
        insert_json_numbers(&mut obj, "bysetpos", &value.by_set_pos);
        if let Some(wkst) = value.wkst {
            obj.insert("wkst".to_string(), JsonValue::String(wkst.to_string()));
        }
        for (name, values) in &value.extensions {
            let strings = values
                .iter()
                .map(|v| JsonValue::String(v.clone()))
                .collect();
            obj.insert(name.to_ascii_lowercase(), JsonValue::Array(strings));
        }

        Some(JsonValue::Array(vec![JsonValue::Object(obj)]))
    }

    fn parse_json(
        &self,
        fragment: &JsonValue,
        _params: &Parameters,
        ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Result<Decoded<Recur>, CannotParse> {
        let obj = match fragment {
            JsonValue::Array(items) => items.first().and_then(JsonValue::as_object),
            JsonValue::Object(map) => Some(map),
            _ => None,
        }
        .ok_or_else(|| {
            CannotParse::new("RECUR", "expected a single-element array holding an object")
        })?;

        let mut rule = Recur::empty();
        let mut seen = SeenScalars::default();
        for (key, value) in obj {
            let name = key.to_ascii_uppercase();
            let values = json_scalars(value);
            apply_part(&mut rule, &mut seen, &name, &values, ctx);
        }
        Ok(Decoded::Single(rule))
    }
}

/// Tracks which scalar fields have already been applied during one parse.
/// Presence on the rule is not enough: count/until mutual exclusion clears
/// the other field, which must not reopen it for a later duplicate.
#[derive(Debug, Default)]
struct SeenScalars {
    freq: bool,
    until: bool,
    count: bool,
    interval: bool,
    wkst: bool,
}

/// Applies one named rule part to the rule under construction. Shared by
/// all three encodings.
///
/// Scalar fields are first-wins: duplicates are silently dropped. List
/// fields accumulate across occurrences; each malformed token in a list
/// warns and is skipped without stopping the rest.
fn apply_part(
    rule: &mut Recur,
    seen: &mut SeenScalars,
    name: &str,
    values: &[String],
    ctx: &mut DocumentContext,
) {
    let first = values.first().map_or("", |v| v.trim());
    match name {
        "FREQ" => {
            if seen.freq {
                return;
            }
            match Frequency::parse(first) {
                Some(freq) => {
                    rule.freq = Some(freq);
                    seen.freq = true;
                }
                None => ctx.warn(
                    Warning::new("unrecognized frequency")
                        .with_field("FREQ")
                        .with_raw(first),
                ),
            }
        }
        "UNTIL" => {
            if seen.until {
                return;
            }
            seen.until = true;
            match Temporal::parse(first, None) {
                Ok(until) => rule.set_until(until),
                Err(err) => {
                    ctx.warn(
                        Warning::new(err.to_string())
                            .with_field("UNTIL")
                            .with_raw(first),
                    );
                    rule.set_until(Temporal::unparsed(first));
                }
            }
        }
        "COUNT" => {
            if seen.count {
                return;
            }
            match first.parse::<u32>() {
                Ok(count) => {
                    rule.set_count(count);
                    seen.count = true;
                }
                Err(_) => ctx.warn(
                    Warning::new("malformed count")
                        .with_field("COUNT")
                        .with_raw(first),
                ),
            }
        }
        "INTERVAL" => {
            if seen.interval {
                return;
            }
            match first.parse::<u32>() {
                Ok(interval) => {
                    rule.interval = Some(interval);
                    seen.interval = true;
                }
                Err(_) => ctx.warn(
                    Warning::new("malformed interval")
                        .with_field("INTERVAL")
                        .with_raw(first),
                ),
            }
        }
        "WKST" => {
            if seen.wkst {
                return;
            }
            match Weekday::parse(first) {
                Some(day) => {
                    rule.wkst = Some(day);
                    seen.wkst = true;
                }
                None => ctx.warn(
                    Warning::new("unrecognized week-start day")
                        .with_field("WKST")
                        .with_raw(first),
                ),
            }
        }
        "BYSECOND" => extend_numbers(&mut rule.by_second, "BYSECOND", values, ctx),
        "BYMINUTE" => extend_numbers(&mut rule.by_minute, "BYMINUTE", values, ctx),
        "BYHOUR" => extend_numbers(&mut rule.by_hour, "BYHOUR", values, ctx),
        "BYDAY" => {
            for token in values {
                match parse_weekday_num(token) {
                    Some(day) => rule.by_day.push(day),
                    None => ctx.warn(
                        Warning::new("unrecognized weekday token")
                            .with_field("BYDAY")
                            .with_raw(token),
                    ),
                }
            }
        }
        "BYMONTHDAY" => extend_numbers(&mut rule.by_month_day, "BYMONTHDAY", values, ctx),
        "BYYEARDAY" => extend_numbers(&mut rule.by_year_day, "BYYEARDAY", values, ctx),
        "BYWEEKNO" => extend_numbers(&mut rule.by_week_no, "BYWEEKNO", values, ctx),
        "BYMONTH" => extend_numbers(&mut rule.by_month, "BYMONTH", values, ctx),
        "BYSETPOS" => extend_numbers(&mut rule.by_set_pos, "BYSETPOS", values, ctx),
        _ => rule.add_extension(name, values.to_vec()),
    }
}

/// Parses a BYDAY token: optional leading signed ordinal, trailing
/// two-letter day abbreviation.
fn parse_weekday_num(token: &str) -> Option<WeekdayNum> {
    let t = token.trim();
    if t.len() < 2 || !t.is_char_boundary(t.len() - 2) {
        return None;
    }
    let (ordinal_part, day_part) = t.split_at(t.len() - 2);
    let weekday = Weekday::parse(day_part)?;
    if ordinal_part.is_empty() {
        return Some(WeekdayNum::every(weekday));
    }
    let ordinal = ordinal_part.parse::<i8>().ok()?;
    Some(WeekdayNum::nth(ordinal, weekday))
}

fn extend_numbers<T: std::str::FromStr>(
    target: &mut Vec<T>,
    field: &str,
    values: &[String],
    ctx: &mut DocumentContext,
) {
    for v in values {
        match v.trim().parse::<T>() {
            Ok(n) => target.push(n),
            Err(_) => ctx.warn(
                Warning::new("malformed integer in list")
                    .with_field(field)
                    .with_raw(v),
            ),
        }
    }
}

fn push_list<T: std::fmt::Display>(parts: &mut Vec<String>, name: &str, values: &[T]) {
    if values.is_empty() {
        return;
    }
    let joined = values
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    parts.push(format!("{name}={joined}"));
}

fn push_xml_list<T: std::fmt::Display>(xml: &mut String, tag: &str, values: &[T]) {
    for v in values {
        let _ = write!(xml, "<{tag}>{v}</{tag}>");
    }
}

fn insert_json_numbers<T>(obj: &mut serde_json::Map<String, JsonValue>, key: &str, values: &[T])
where
    T: Copy + Into<i64>,
{
    if values.is_empty() {
        return;
    }
    let numbers = values.iter().map(|v| JsonValue::from((*v).into())).collect();
    obj.insert(key.to_string(), JsonValue::Array(numbers));
}

fn json_scalars(value: &JsonValue) -> Vec<String> {
    fn scalar(v: &JsonValue) -> String {
        match v {
            JsonValue::String(s) => s.clone(),
            JsonValue::Number(n) => n.to_string(),
            JsonValue::Bool(b) => b.to_string(),
            _ => String::new(),
        }
    }
    match value {
        JsonValue::Array(items) => items.iter().map(scalar).collect(),
        other => vec![scalar(other)],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ical::core::ZoneDisposition;
    use chrono::{NaiveDate, NaiveTime};

    fn parse(raw: &str, ctx: &mut DocumentContext) -> Recur {
        RecurCodecV2
            .parse_text(raw, &Parameters::new(), ctx, SpecVersion::ICal20)
            .unwrap()
            .single()
            .unwrap()
    }

    fn write(rule: &Recur, ctx: &mut DocumentContext) -> Option<String> {
        RecurCodecV2.write_text(rule, ctx, SpecVersion::ICal20)
    }

    #[test]
    fn parse_basic_weekly() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=WEEKLY;COUNT=5;BYDAY=MO,TU", &mut ctx);

        assert_eq!(rule.freq, Some(Frequency::Weekly));
        assert_eq!(rule.count, Some(5));
        assert_eq!(
            rule.by_day,
            vec![
                WeekdayNum::every(Weekday::Monday),
                WeekdayNum::every(Weekday::Tuesday)
            ]
        );
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn write_uses_canonical_order() {
        let mut ctx = DocumentContext::new();
        // fields set in scrambled order
        let rule = Recur::new(Frequency::Monthly)
            .with_wkst(Weekday::Sunday)
            .by_set_pos([-1])
            .with_extension("X-CUSTOM", vec!["a".to_string()])
            .by_day([WeekdayNum::every(Weekday::Friday)])
            .with_interval(2)
            .with_count(10);

        assert_eq!(
            write(&rule, &mut ctx).unwrap(),
            "FREQ=MONTHLY;COUNT=10;INTERVAL=2;BYDAY=FR;BYSETPOS=-1;WKST=SU;X-CUSTOM=a"
        );
    }

    #[test]
    fn bare_token_skipped_with_one_warning() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=WEEKLY;no_equals;COUNT=5", &mut ctx);

        assert_eq!(rule.freq, Some(Frequency::Weekly));
        assert_eq!(rule.count, Some(5));
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn bad_list_token_skipped_with_one_warning() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=MINUTELY;BYSECOND=58,x,59", &mut ctx);

        assert_eq!(rule.by_second, vec![58, 59]);
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn scalar_duplicates_first_wins_silently() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=DAILY;FREQ=WEEKLY;INTERVAL=3;INTERVAL=9", &mut ctx);

        assert_eq!(rule.freq, Some(Frequency::Daily));
        assert_eq!(rule.interval, Some(3));
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn list_fields_accumulate_across_occurrences() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=YEARLY;BYMONTH=1,2;BYMONTH=6", &mut ctx);
        assert_eq!(rule.by_month, vec![1, 2, 6]);
    }

    #[test]
    fn byday_with_ordinals() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=MONTHLY;BYDAY=1MO,-1FR,WE", &mut ctx);
        assert_eq!(
            rule.by_day,
            vec![
                WeekdayNum::nth(1, Weekday::Monday),
                WeekdayNum::nth(-1, Weekday::Friday),
                WeekdayNum::every(Weekday::Wednesday)
            ]
        );
    }

    #[test]
    fn bad_byday_token_dropped() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=MONTHLY;BYDAY=1MO,5XX", &mut ctx);
        assert_eq!(rule.by_day, vec![WeekdayNum::nth(1, Weekday::Monday)]);
        assert_eq!(ctx.warnings().len(), 1);
    }

    #[test]
    fn unknown_parts_become_extensions() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=WEEKLY;X-EXTRA=a,b", &mut ctx);
        assert_eq!(
            rule.extensions,
            vec![(
                "X-EXTRA".to_string(),
                vec!["a".to_string(), "b".to_string()]
            )]
        );
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn empty_rule_is_skipped_on_write() {
        let mut ctx = DocumentContext::new();
        assert!(write(&Recur::empty(), &mut ctx).is_none());
    }

    #[test]
    fn empty_text_round_trips_to_empty_rule() {
        let mut ctx = DocumentContext::new();
        assert!(parse("", &mut ctx).is_empty());
    }

    #[test]
    fn until_count_mutual_exclusion_last_wins() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=DAILY;COUNT=5;UNTIL=20260301", &mut ctx);
        assert!(rule.count.is_none());
        assert!(rule.until.is_some());
    }

    #[test]
    fn duplicate_count_after_until_is_dropped() {
        // the first COUNT was cleared by UNTIL; the duplicate must not
        // reopen the field and clobber UNTIL
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=DAILY;COUNT=5;UNTIL=20260301;COUNT=7", &mut ctx);
        assert!(rule.count.is_none());
        assert_eq!(
            rule.until,
            Some(Temporal::date(NaiveDate::from_ymd_opt(2026, 3, 1).unwrap()))
        );
    }

    #[test]
    fn duplicate_until_after_count_is_dropped() {
        let mut ctx = DocumentContext::new();
        let rule = parse(
            "FREQ=DAILY;UNTIL=20260301;COUNT=5;UNTIL=20270301",
            &mut ctx,
        );
        assert_eq!(rule.count, Some(5));
        assert!(rule.until.is_none());
    }

    #[test]
    fn text_round_trip() {
        let mut ctx = DocumentContext::new();
        let text = "FREQ=MONTHLY;COUNT=10;INTERVAL=2;BYDAY=1MO,-1FR;BYSETPOS=-1;WKST=SU";
        let rule = parse(text, &mut ctx);
        assert_eq!(write(&rule, &mut ctx).unwrap(), text);
    }

    #[test]
    fn xml_round_trip() {
        let mut ctx = DocumentContext::new();
        let rule = Recur::new(Frequency::Weekly)
            .with_count(4)
            .by_day([
                WeekdayNum::every(Weekday::Monday),
                WeekdayNum::every(Weekday::Tuesday),
            ]);

        let xml = RecurCodecV2
            .write_xml(&rule, &mut ctx, SpecVersion::ICal20)
            .unwrap();
        assert_eq!(
            xml,
            "<recur><freq>WEEKLY</freq><count>4</count>\
             <byday>MO</byday><byday>TU</byday></recur>"
        );

        let back = RecurCodecV2
            .parse_xml(&xml, &Parameters::new(), &mut ctx, SpecVersion::ICal20)
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn xml_extension_entities_round_trip() {
        let mut ctx = DocumentContext::new();
        let rule = Recur::new(Frequency::Weekly)
            .with_extension("X-NOTE", vec!["a & b <c>".to_string()]);

        let xml = RecurCodecV2
            .write_xml(&rule, &mut ctx, SpecVersion::ICal20)
            .unwrap();
        assert_eq!(
            xml,
            "<recur><freq>WEEKLY</freq><x-note>a &amp; b &lt;c&gt;</x-note></recur>"
        );

        let back = RecurCodecV2
            .parse_xml(&xml, &Parameters::new(), &mut ctx, SpecVersion::ICal20)
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(back, rule);
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn xml_without_rule_parts_is_fatal() {
        let mut ctx = DocumentContext::new();
        let result = RecurCodecV2.parse_xml(
            "<recur></recur>",
            &Parameters::new(),
            &mut ctx,
            SpecVersion::ICal20,
        );
        assert!(result.is_err());
    }

    #[test]
    fn json_round_trip() {
        let mut ctx = DocumentContext::new();
        let rule = Recur::new(Frequency::Yearly)
            .with_interval(4)
            .by_month([11])
            .by_day([WeekdayNum::nth(1, Weekday::Tuesday)]);

        let json = RecurCodecV2
            .write_json(&rule, &mut ctx, SpecVersion::ICal20)
            .unwrap();
        assert_eq!(
            json,
            serde_json::json!([{
                "freq": "YEARLY",
                "interval": 4,
                "byday": ["1TU"],
                "bymonth": [11],
            }])
        );

        let back = RecurCodecV2
            .parse_json(&json, &Parameters::new(), &mut ctx, SpecVersion::ICal20)
            .unwrap()
            .single()
            .unwrap();
        assert_eq!(back, rule);
    }

    #[test]
    fn until_renders_utc_by_default() {
        let mut ctx = DocumentContext::new();
        let until = Temporal::utc(
            NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
        );
        let rule = Recur::new(Frequency::Daily).with_until(until);
        assert_eq!(
            write(&rule, &mut ctx).unwrap(),
            "FREQ=DAILY;UNTIL=20260301T120000Z"
        );
    }

    #[test]
    fn until_follows_floating_dtstart() {
        let mut ctx = DocumentContext::new();
        ctx.set_dtstart(Temporal::parse("20260101T090000", None).unwrap());

        let until = Temporal::floating(
            NaiveDate::from_ymd_opt(2026, 3, 1)
                .unwrap()
                .and_time(NaiveTime::from_hms_opt(12, 0, 0).unwrap()),
        );
        let rule = Recur::new(Frequency::Daily).with_until(until);
        assert_eq!(
            write(&rule, &mut ctx).unwrap(),
            "FREQ=DAILY;UNTIL=20260301T120000"
        );
    }

    #[test]
    fn escaped_semicolon_in_extension_value() {
        let mut ctx = DocumentContext::new();
        let rule = parse("FREQ=WEEKLY;X-NOTE=a\\;b", &mut ctx);
        assert_eq!(rule.extensions[0].1, vec!["a;b".to_string()]);

        let text = write(&rule, &mut ctx).unwrap();
        assert_eq!(text, "FREQ=WEEKLY;X-NOTE=a\\;b");
    }

    #[test]
    fn until_zone_checks() {
        // a zoned until forced to UTC converts through the zone database
        let mut ctx = DocumentContext::new();
        let until = Temporal::parse("20260115T100000", Some("America/New_York")).unwrap();
        assert_eq!(*until.zone(), ZoneDisposition::Zoned("America/New_York".into()));

        let rule = Recur::new(Frequency::Daily).with_until(until);
        assert_eq!(
            write(&rule, &mut ctx).unwrap(),
            "FREQ=DAILY;UNTIL=20260115T150000Z"
        );
    }
}
