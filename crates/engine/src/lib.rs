//! Domain engine for the Astralite weekly planner.
//!
//! Turns the upstream game datasets into production profiles, progression
//! lookups, and a linear-programming weekly plan. The HTTP surface lives in
//! `astralite-server`; this crate has no opinion about transport.

pub mod catalog;
pub mod localization;
pub mod planner;
pub mod production;
pub mod progression;
pub mod solver;
pub mod store;

pub use catalog::SourceConfig;
pub use localization::Localization;
pub use planner::{WeeklyPlan, WeeklyPlanner};
pub use production::{ProductionCalculator, ProductionProfile};
pub use progression::ProgressionRepository;
pub use solver::{SolveResult, SolveStatus};
pub use store::{DatasetBundle, DatasetCache, DatasetFetcher};

#[cfg(test)]
mod tests;
