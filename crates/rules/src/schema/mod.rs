//! YAML rule schema with serde deserialization.
//!
//! A rule document describes which events to examine (`search`), how to
//! decide an alert is warranted (`aggregate`, or per-event when absent) and
//! what the alert looks like (`alert`).

mod definition;
mod duration;
mod metadata;

pub use definition::*;
pub use duration::parse_window;
pub use metadata::*;
