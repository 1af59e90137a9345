//! Filesystem rule loader.
//!
//! Scans the rules directory for YAML rule documents, validates them and
//! keeps the resulting [`DeclarativeRule`](crate::declarative::DeclarativeRule)s
//! keyed by id. Loading happens once per process; there is no reload.

mod core;
mod error;


pub use self::core::RuleLoader;
pub use self::error::{LoadResult, LoadStatus, Result, RuleError};
