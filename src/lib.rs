//! Barwert Engine - actuarial present values for life insurance contracts
//!
//! This library provides:
//! - Mortality tables (compiled-in IAM 2012, CSV-loaded DAV tables)
//! - Survival and deferred-death probabilities
//! - Annuity and insurance present values with the Woolhouse correction
//! - Two equivalent engines: direct recursion and memoized commutation columns
//! - Year-by-year policy valuation series with net-premium reserves

pub mod error;
pub mod mortality;
pub mod present_value;
pub mod policy;
pub mod timeline;
pub mod config;

// Re-export commonly used types
pub use config::ValuationConfig;
pub use error::{EngineDivergence, LoadError, LookupError, PolicyError, ValuationError};
pub use mortality::{MortalityTable, MortalityTables, Sex, SurvivalKernel, TableId, OMEGA};
pub use policy::PolicyParams;
pub use present_value::{build_provider, CommutationEngine, DirectEngine, EngineKind, PresentValueProvider};
pub use timeline::{PolicyTimeline, TimelineEntry};
