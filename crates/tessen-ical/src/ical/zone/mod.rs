//! Per-document context and timezone resolution.
//!
//! Zone definitions may be declared lexically after the properties that
//! reference them, so binding is a deliberate two-pass pipeline: pass 1
//! (parsing) records pending resolutions, pass 2
//! ([`DocumentContext::resolve_pending`], run once at end of document)
//! binds them against the complete set of declared zones.

mod resolver;

pub use resolver::{
    DocumentContext, PendingZone, UntilForm, ZoneDefinition, render_until, until_render_form,
};
