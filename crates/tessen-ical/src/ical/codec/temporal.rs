//! Codec for DATE / DATE-TIME property values.

use super::{CannotParse, DataType, Decoded, PropertyCodec, SpecVersion, Warning};
use crate::ical::core::{Parameter, Parameters, Temporal, ZoneDisposition};
use crate::ical::zone::DocumentContext;

/// Codec for temporal values.
///
/// The data type is decided by the value itself (date vs date-time);
/// `VALUE=DATE` on input forces a date-only read. Zoned values register a
/// pending resolution on the context so the binding can happen once all zone
/// definitions are known.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemporalCodec;

impl PropertyCodec for TemporalCodec {
    type Value = Temporal;

    fn data_type(&self, value: &Temporal, _version: SpecVersion) -> DataType {
        if value.has_time() {
            DataType::DateTime
        } else {
            DataType::Date
        }
    }

    fn prepare_parameters(
        &self,
        value: &Temporal,
        params: &Parameters,
        version: SpecVersion,
    ) -> Parameters {
        let mut out = params.clone();
        if value.has_time() {
            out.remove("VALUE");
            match value.zone() {
                ZoneDisposition::Zoned(tzid) if !version.is_legacy() => {
                    out.set(Parameter::tzid(tzid.clone()));
                }
                _ => out.remove("TZID"),
            }
        } else {
            // DATE-TIME is the default type, DATE must be announced
            out.set(Parameter::value_type("DATE"));
            out.remove("TZID");
        }
        out
    }

    fn write_text(
        &self,
        value: &Temporal,
        _ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Option<String> {
        value.format()
    }

    fn parse_text(
        &self,
        raw: &str,
        params: &Parameters,
        ctx: &mut DocumentContext,
        _version: SpecVersion,
    ) -> Result<Decoded<Temporal>, CannotParse> {
        let forced_date = params
            .value_type()
            .is_some_and(|v| v.eq_ignore_ascii_case("DATE"));

        match Temporal::parse(raw, params.tzid()) {
            Ok(value) => {
                if forced_date && value.has_time() {
                    ctx.warn(
                        Warning::new("VALUE=DATE property carries a time-of-day").with_raw(raw),
                    );
                }
                if let ZoneDisposition::Zoned(tzid) = value.zone() {
                    let property = ctx.current_property().unwrap_or_default().to_string();
                    ctx.register_pending(&property, raw, tzid);
                }
                Ok(Decoded::Single(value))
            }
            Err(err) => {
                // keep the original text and echo it back on write
                ctx.warn(Warning::new(err.to_string()).with_raw(raw));
                Ok(Decoded::Single(Temporal::unparsed(raw)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn parse(raw: &str, params: &Parameters, ctx: &mut DocumentContext) -> Temporal {
        TemporalCodec
            .parse_text(raw, params, ctx, SpecVersion::ICal20)
            .unwrap()
            .single()
            .unwrap()
    }

    #[test]
    fn data_type_follows_value_shape() {
        let codec = TemporalCodec;
        let date = Temporal::date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        assert_eq!(codec.data_type(&date, SpecVersion::ICal20), DataType::Date);

        let datetime = Temporal::parse("20260105T090000Z", None).unwrap();
        assert_eq!(
            codec.data_type(&datetime, SpecVersion::ICal20),
            DataType::DateTime
        );
    }

    #[test]
    fn zoned_parse_registers_pending() {
        let mut ctx = DocumentContext::new();
        ctx.set_property("DTSTART");
        let mut params = Parameters::new();
        params.push(Parameter::tzid("America/New_York"));

        let value = parse("20260105T090000", &params, &mut ctx);
        assert_eq!(value.zone().tzid(), Some("America/New_York"));
        assert_eq!(ctx.pending().len(), 1);
        assert_eq!(ctx.pending()[0].property, "DTSTART");
        assert_eq!(ctx.pending()[0].tzid, "America/New_York");
    }

    #[test]
    fn malformed_input_degrades_to_raw_echo() {
        let mut ctx = DocumentContext::new();
        let value = parse("2026x105", &Parameters::new(), &mut ctx);

        assert!(value.instant().is_none());
        assert_eq!(value.raw_text(), Some("2026x105"));
        assert_eq!(ctx.warnings().len(), 1);

        let echoed = TemporalCodec
            .write_text(&value, &mut ctx, SpecVersion::ICal20)
            .unwrap();
        assert_eq!(echoed, "2026x105");
    }

    #[test]
    fn prepare_parameters_announces_date() {
        let codec = TemporalCodec;
        let date = Temporal::date(NaiveDate::from_ymd_opt(2026, 1, 5).unwrap());
        let mut params = Parameters::new();
        params.push(Parameter::tzid("America/New_York"));

        let prepared = codec.prepare_parameters(&date, &params, SpecVersion::ICal20);
        assert_eq!(prepared.value_type(), Some("DATE"));
        assert!(prepared.tzid().is_none());
        // caller's copy untouched
        assert!(params.tzid().is_some());
    }

    #[test]
    fn prepare_parameters_carries_tzid_for_zoned() {
        let codec = TemporalCodec;
        let zoned = Temporal::parse("20260105T090000", Some("Europe/Paris")).unwrap();

        let prepared = codec.prepare_parameters(&zoned, &Parameters::new(), SpecVersion::ICal20);
        assert_eq!(prepared.tzid(), Some("Europe/Paris"));
        assert!(prepared.value_type().is_none());

        // legacy output has no TZID parameter
        let legacy = codec.prepare_parameters(&zoned, &Parameters::new(), SpecVersion::VCal10);
        assert!(legacy.tzid().is_none());
    }
}
