//! Umbrella crate for the Astralite planner.
//!
//! This crate is intentionally small: it re-exports the engine and protocol crates
//! so downstream code can depend on a single crate name (`astralite`).

pub use astralite_engine as engine;
pub use astralite_protocol as protocol;
