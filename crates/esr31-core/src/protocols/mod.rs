//! Protocol decoding modules.
//!
//! Each protocol follows a layered structure:
//! - `layout`: byte offsets and wire constants (source of truth)
//! - `reader`: bounds-checked payload access
//! - `parser`: frame validation (no direct byte indexing of fields)
//! - `fields`: table-driven mapping to named measurements
//! - `error`: explicit, actionable errors
//!
//! Parsers are pure and contain no I/O; sources and the acquisition loop
//! handle transport access and accumulation.

pub(crate) mod common;
pub mod esr31;
