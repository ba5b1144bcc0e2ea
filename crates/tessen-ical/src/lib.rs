//! iCalendar value codecs (RFC 5545, RFC 2445, vCal 1.0, xCal, jCal).
//!
//! This crate implements the recurrence-rule and temporal value models of
//! iCalendar together with the property-codec contract that turns those
//! values into the three wire encodings (plain text, XML, JSON) across
//! protocol versions. It is consumed by a document reader/writer which owns
//! tokenization and the component tree; this crate owns value semantics.
//!
//! ## Overview
//!
//! - [`ical::core`] - value models (`Recur`, `Temporal`, `Parameters`)
//! - [`ical::codec`] - the [`ical::codec::PropertyCodec`] contract, the two
//!   recurrence grammars, and the codec registry
//! - [`ical::zone`] - the per-document context: warning accumulation and
//!   two-pass timezone binding
//!
//! ## Usage
//!
//! ```rust
//! use tessen_ical::ical::codec::{PropertyCodec, RecurCodecV2, SpecVersion};
//! use tessen_ical::ical::core::Parameters;
//! use tessen_ical::ical::zone::DocumentContext;
//!
//! let mut ctx = DocumentContext::new();
//! let codec = RecurCodecV2;
//! let decoded = codec
//!     .parse_text(
//!         "FREQ=WEEKLY;COUNT=5;BYDAY=MO,TU",
//!         &Parameters::new(),
//!         &mut ctx,
//!         SpecVersion::ICal20,
//!     )
//!     .unwrap();
//! let rule = decoded.single().unwrap();
//! assert_eq!(rule.count, Some(5));
//! ```
//!
//! ## Error model
//!
//! Parsing is tolerant: recoverable defects become [`ical::codec::Warning`]s
//! on the [`ical::zone::DocumentContext`] and parsing continues. Only values
//! that cannot be recovered at all fail with
//! [`ical::codec::CannotParse`].

pub mod ical;
