//! iCalendar core value models.
//!
//! These types are designed for:
//! - Round-trip fidelity: preserving raw text and unknown rule parts
//! - Deterministic serialization: canonical field ordering on write
//! - Type safety: count/until exclusivity enforced by the builder

mod parameter;
mod recur;
mod temporal;

pub use parameter::{Parameter, Parameters};
pub use recur::{Frequency, Recur, Weekday, WeekdayNum};
pub use temporal::{Temporal, TemporalParseError, ZoneDisposition};
