//! Document context: warning accumulation and deferred zone binding.

use std::collections::HashMap;
use std::str::FromStr;

use chrono::{LocalResult, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

use crate::ical::codec::{SpecVersion, Warning};
use crate::ical::core::{Temporal, ZoneDisposition};

/// A zone declared in the owning document (a VTIMEZONE at the document
/// layer). Only the identifier matters at this layer; observance rules
/// belong to the expansion engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZoneDefinition {
    pub tzid: String,
}

impl ZoneDefinition {
    #[must_use]
    pub fn new(tzid: impl Into<String>) -> Self {
        Self { tzid: tzid.into() }
    }
}

/// A date awaiting zone binding, recorded during the parse pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingZone {
    /// Name of the owning property.
    pub property: String,
    /// The raw temporal text that referenced the zone.
    pub raw: String,
    /// The candidate zone identifier from the TZID parameter.
    pub tzid: String,
    /// Filled in by [`DocumentContext::resolve_pending`].
    pub resolved: Option<ZoneDisposition>,
}

/// Per-document mutable state, passed explicitly through every codec call.
///
/// One context per document; contexts must not be shared across documents.
/// It accumulates warnings in encounter order and maintains the registry of
/// pending zone resolutions for the two-pass binding pipeline.
#[derive(Debug, Default)]
pub struct DocumentContext {
    warnings: Vec<Warning>,
    pending: Vec<PendingZone>,
    zones: HashMap<String, ZoneDefinition>,
    current_property: Option<String>,
    dtstart: Option<Temporal>,
    in_observance: bool,
}

impl DocumentContext {
    /// Creates a fresh context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the property name the codecs are currently working on. Used to
    /// attribute warnings; set by the document reader/writer per property.
    pub fn set_property(&mut self, name: impl Into<String>) {
        self.current_property = Some(name.into().to_ascii_uppercase());
    }

    /// Returns the current property name, if set.
    #[must_use]
    pub fn current_property(&self) -> Option<&str> {
        self.current_property.as_deref()
    }

    /// Records a recoverable defect and continues.
    pub fn warn(&mut self, mut warning: Warning) {
        if warning.property.is_empty() {
            if let Some(name) = &self.current_property {
                warning.property.clone_from(name);
            }
        }
        tracing::warn!(
            property = %warning.property,
            field = warning.field.as_deref(),
            raw = warning.raw.as_deref(),
            "{}",
            warning.message
        );
        self.warnings.push(warning);
    }

    /// Returns the warnings accumulated so far, in encounter order.
    #[must_use]
    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    /// Drains the accumulated warnings.
    pub fn take_warnings(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }

    /// Declares a zone definition found in the document.
    pub fn declare_zone(&mut self, definition: ZoneDefinition) {
        self.zones.insert(definition.tzid.clone(), definition);
    }

    /// Returns whether a zone identifier was declared in the document.
    #[must_use]
    pub fn has_zone(&self, tzid: &str) -> bool {
        self.zones.contains_key(tzid)
    }

    /// Sets the DTSTART sibling state consulted by UNTIL rendering.
    pub fn set_dtstart(&mut self, dtstart: Temporal) {
        self.dtstart = Some(dtstart);
    }

    /// Clears the DTSTART sibling state (new component).
    pub fn clear_dtstart(&mut self) {
        self.dtstart = None;
    }

    /// Returns the current DTSTART sibling, if any.
    #[must_use]
    pub fn dtstart(&self) -> Option<&Temporal> {
        self.dtstart.as_ref()
    }

    /// Marks whether the current component is a STANDARD/DAYLIGHT zone
    /// observance sub-component.
    pub fn set_observance(&mut self, in_observance: bool) {
        self.in_observance = in_observance;
    }

    /// Returns whether the current component is a zone observance.
    #[must_use]
    pub fn in_observance(&self) -> bool {
        self.in_observance
    }

    /// Records a date for deferred zone binding (parse pass).
    pub fn register_pending(&mut self, property: &str, raw: &str, tzid: &str) {
        self.pending.push(PendingZone {
            property: property.to_ascii_uppercase(),
            raw: raw.to_string(),
            tzid: tzid.to_string(),
            resolved: None,
        });
    }

    /// Returns the pending-resolution registry.
    #[must_use]
    pub fn pending(&self) -> &[PendingZone] {
        &self.pending
    }

    /// Pass 2: binds every pending date against the declared zones. Run
    /// once, at end of document, by the document reader. A zone id that was
    /// never defined degrades to a best-effort disposition with a warning;
    /// nothing aborts.
    pub fn resolve_pending(&mut self) {
        let mut pending = std::mem::take(&mut self.pending);
        for entry in &mut pending {
            if entry.resolved.is_none() {
                entry.resolved = Some(self.resolve_zone(&entry.property, &entry.tzid));
            }
        }
        self.pending = pending;
    }

    /// Resolves a zone identifier to a disposition: declared in-document
    /// first, then IANA lookup, then floating with a warning.
    pub fn resolve_zone(&mut self, property: &str, tzid: &str) -> ZoneDisposition {
        if self.zones.contains_key(tzid) {
            return ZoneDisposition::Zoned(tzid.to_string());
        }
        if Tz::from_str(tzid).is_ok() {
            return ZoneDisposition::Zoned(tzid.to_string());
        }
        self.warn(
            Warning::new(format!("undefined timezone id {tzid:?}, treating value as floating"))
                .for_property(property)
                .with_raw(tzid),
        );
        ZoneDisposition::Floating
    }
}

/// How an UNTIL value must be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UntilForm {
    Utc,
    Floating,
}

/// Decides the UNTIL rendering form from sibling state.
///
/// UNTIL must agree with its sibling DTSTART: floating DTSTART means
/// floating UNTIL, everything else means UTC. Inside a STANDARD/DAYLIGHT
/// observance UNTIL is always UTC regardless of sibling state (protocol
/// rule). Legacy vCal 1.0 output is always UTC.
#[must_use]
pub fn until_render_form(ctx: &DocumentContext, version: SpecVersion) -> UntilForm {
    if ctx.in_observance() || version.is_legacy() {
        return UntilForm::Utc;
    }
    match ctx.dtstart() {
        Some(dtstart) if *dtstart.zone() == ZoneDisposition::Floating && dtstart.has_time() => {
            UntilForm::Floating
        }
        _ => UntilForm::Utc,
    }
}

/// Renders an UNTIL temporal in the form decided by [`until_render_form`].
///
/// Raw-only values echo verbatim. Pure dates render with no zone marker
/// regardless of form. Zoned date-times forced to UTC are converted through
/// the IANA database when the zone is known; otherwise the civil time is
/// kept and only the marker changes, with a warning.
#[must_use]
pub fn render_until(until: &Temporal, ctx: &mut DocumentContext, version: SpecVersion) -> Option<String> {
    if let Some(raw) = until.raw_text() {
        return Some(raw.to_string());
    }
    let instant = until.instant()?;
    if !until.has_time() {
        return Some(instant.date().format("%Y%m%d").to_string());
    }

    match until_render_form(ctx, version) {
        UntilForm::Floating => Some(instant.format("%Y%m%dT%H%M%S").to_string()),
        UntilForm::Utc => {
            let utc = match until.zone() {
                ZoneDisposition::Zoned(tzid) => to_utc(instant, tzid, ctx),
                ZoneDisposition::Utc | ZoneDisposition::Floating => instant,
            };
            Some(format!("{}Z", utc.format("%Y%m%dT%H%M%S")))
        }
    }
}

/// Converts a zoned civil time to UTC, degrading to the unshifted civil
/// time when the zone or the instant cannot be mapped.
fn to_utc(local: NaiveDateTime, tzid: &str, ctx: &mut DocumentContext) -> NaiveDateTime {
    let Ok(tz) = Tz::from_str(tzid) else {
        ctx.warn(
            Warning::new(format!("unknown timezone id {tzid:?}, keeping civil time"))
                .with_raw(tzid),
        );
        return local;
    };

    match tz.from_local_datetime(&local) {
        LocalResult::Single(dt) => dt.naive_utc(),
        // DST fold: RFC 5545 §3.3.5 uses the first occurrence
        LocalResult::Ambiguous(dt, _) => dt.naive_utc(),
        LocalResult::None => {
            ctx.warn(
                Warning::new(format!("non-existent local time in {tzid} (DST gap), keeping civil time"))
                    .with_raw(tzid),
            );
            local
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn datetime(s: &str) -> Temporal {
        Temporal::parse(s, None).unwrap()
    }

    #[test]
    fn pending_binds_to_declared_zone() {
        let mut ctx = DocumentContext::new();
        // reference appears before the definition
        ctx.register_pending("DTSTART", "20260115T100000", "Custom/Zone");
        ctx.declare_zone(ZoneDefinition::new("Custom/Zone"));

        ctx.resolve_pending();

        let pending = ctx.pending();
        assert_eq!(pending.len(), 1);
        assert_eq!(
            pending[0].resolved,
            Some(ZoneDisposition::Zoned("Custom/Zone".to_string()))
        );
        assert!(ctx.warnings().is_empty());
    }

    #[test]
    fn pending_falls_back_to_iana() {
        let mut ctx = DocumentContext::new();
        ctx.register_pending("DTSTART", "20260115T100000", "America/New_York");
        ctx.resolve_pending();

        assert_eq!(
            ctx.pending()[0].resolved,
            Some(ZoneDisposition::Zoned("America/New_York".to_string()))
        );
    }

    #[test]
    fn pending_degrades_with_warning() {
        let mut ctx = DocumentContext::new();
        ctx.register_pending("DTSTART", "20260115T100000", "Nowhere/Invalid");
        ctx.resolve_pending();

        assert_eq!(ctx.pending()[0].resolved, Some(ZoneDisposition::Floating));
        assert_eq!(ctx.warnings().len(), 1);
        assert_eq!(ctx.warnings()[0].property, "DTSTART");
    }

    #[test]
    fn until_form_defaults_to_utc() {
        let ctx = DocumentContext::new();
        assert_eq!(until_render_form(&ctx, SpecVersion::ICal20), UntilForm::Utc);
    }

    #[test]
    fn until_form_follows_floating_dtstart() {
        let mut ctx = DocumentContext::new();
        ctx.set_dtstart(datetime("20260101T090000"));
        assert_eq!(
            until_render_form(&ctx, SpecVersion::ICal20),
            UntilForm::Floating
        );
    }

    #[test]
    fn observance_forces_utc() {
        let mut ctx = DocumentContext::new();
        ctx.set_dtstart(datetime("20260101T090000"));
        ctx.set_observance(true);
        assert_eq!(until_render_form(&ctx, SpecVersion::ICal20), UntilForm::Utc);
    }

    #[test]
    fn legacy_version_forces_utc() {
        let mut ctx = DocumentContext::new();
        ctx.set_dtstart(datetime("20260101T090000"));
        assert_eq!(until_render_form(&ctx, SpecVersion::VCal10), UntilForm::Utc);
    }

    #[test]
    fn render_until_converts_zoned_to_utc() {
        let mut ctx = DocumentContext::new();
        let until = Temporal::parse("20260115T100000", Some("America/New_York")).unwrap();
        // January: EST is UTC-5
        assert_eq!(
            render_until(&until, &mut ctx, SpecVersion::ICal20).unwrap(),
            "20260115T150000Z"
        );
    }

    #[test]
    fn render_until_date_has_no_marker() {
        let mut ctx = DocumentContext::new();
        let until = Temporal::date(NaiveDate::from_ymd_opt(2026, 1, 15).unwrap());
        assert_eq!(
            render_until(&until, &mut ctx, SpecVersion::ICal20).unwrap(),
            "20260115"
        );
    }

    #[test]
    fn render_until_echoes_raw() {
        let mut ctx = DocumentContext::new();
        let until = Temporal::unparsed("2026x115");
        assert_eq!(
            render_until(&until, &mut ctx, SpecVersion::ICal20).unwrap(),
            "2026x115"
        );
    }
}
