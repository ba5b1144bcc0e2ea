//! iCalendar value models and codecs.
//!
//! ## Submodules
//!
//! - [`core`] - Value models (`Recur`, `Temporal`, `Parameters`)
//! - [`codec`] - Property codec contract and the recurrence codecs
//! - [`zone`] - Per-document context and timezone resolution

pub mod codec;
pub mod core;
pub mod zone;

#[cfg(test)]
mod tests;
