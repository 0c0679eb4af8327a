//! Present values of life annuities and insurances
//!
//! Two engines implement the same [`PresentValueProvider`] contract:
//! - [`DirectEngine`] walks death probabilities on every call
//! - [`CommutationEngine`] derives lx/Dx/Cx/Nx/Mx/Rx once per
//!   (table, sex, rate) and answers from ratios of cached columns
//!
//! They must agree to a relative tolerance of 1e-8; see [`equivalence`].
//!
//! # Degenerate inputs
//!
//! None of the functions raise on a non-positive duration, a zero payment
//! frequency or a horizon past the terminal age. They return sentinels:
//! 0 for annuity and insurance values, 1 for a pure endowment whose term has
//! already run out (`n <= 0`). Only lookup failures (table not loaded) are
//! errors.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use barwert_engine::mortality::{MortalityTables, Sex, TableId};
//! use barwert_engine::present_value::{build_provider, EngineKind};
//!
//! let tables = Arc::new(MortalityTables::builtin());
//! let engine = build_provider(EngineKind::Commutation, tables);
//! let annuity = engine.axn_k(40, 20, Sex::Male, TableId::Iam2012Basic, 0.0175, 12)?;
//! assert!(annuity > 15.0 && annuity < 20.0);
//! # Ok::<(), barwert_engine::error::LookupError>(())
//! ```

pub mod discount;
mod direct;
mod cache;
mod commutation;
pub mod equivalence;

pub use cache::{CacheStats, ColumnKey, CommutationCache};
pub use commutation::{CommutationEngine, Quantity, RADIX};
pub use direct::DirectEngine;
pub use discount::{annuity_certain, discount_factor, discount_power, woolhouse_beta};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::LookupError;
use crate::mortality::{MortalityTables, Sex, TableId};

/// Which present-value formulation to use
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Recompute survival products from qx on every call
    Direct,
    /// Ratios of memoized commutation columns
    #[default]
    Commutation,
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EngineKind::Direct => f.write_str("direct"),
            EngineKind::Commutation => f.write_str("commutation"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "direct" => Ok(EngineKind::Direct),
            "commutation" => Ok(EngineKind::Commutation),
            other => Err(format!("unknown engine '{other}' (expected 'direct' or 'commutation')")),
        }
    }
}

/// Build the engine selected by `kind` over a shared table registry
pub fn build_provider(kind: EngineKind, tables: Arc<MortalityTables>) -> Box<dyn PresentValueProvider> {
    match kind {
        EngineKind::Direct => Box::new(DirectEngine::new(tables)),
        EngineKind::Commutation => Box::new(CommutationEngine::new(tables)),
    }
}

/// Present values per unit of benefit or payment
///
/// `age` is the attained age, `rate` the annual effective interest rate,
/// `zw` the number of payments per year (1, 2, 4 or 12). All annuities are
/// payable in advance.
pub trait PresentValueProvider: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn tables(&self) -> &MortalityTables;

    /// Whole-life annuity-due, `ä_x`
    ///
    /// Sums `tpx * v^t` for `t = 0..=OMEGA-age`, so the payment at age OMEGA
    /// itself is included and the value equals `N_x / D_x`. At `age == OMEGA`
    /// this is exactly 1.
    fn ax(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError>;

    /// Whole-life annuity-due with `zw` payments per year, `ä_x^(zw)`
    fn ax_k(&self, age: u32, sex: Sex, table: TableId, rate: f64, zw: u32) -> Result<f64, LookupError>;

    /// Temporary annuity-due over `n` years, `ä_x:n`
    fn axn(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError>;

    /// Temporary annuity-due over `n` years with `zw` payments per year
    fn axn_k(
        &self,
        age: u32,
        n: i32,
        sex: Sex,
        table: TableId,
        rate: f64,
        zw: u32,
    ) -> Result<f64, LookupError>;

    /// Whole-life annuity deferred `n` years, `n|ä_x^(zw)`
    fn nax_k(
        &self,
        age: u32,
        n: i32,
        sex: Sex,
        table: TableId,
        rate: f64,
        zw: u32,
    ) -> Result<f64, LookupError>;

    /// Annuity deferred `m` years and paid until year `n`, `m|ä_x:n-m^(zw)`
    #[allow(clippy::too_many_arguments)]
    fn m_axn_k(
        &self,
        age: u32,
        m: i32,
        n: i32,
        sex: Sex,
        table: TableId,
        rate: f64,
        zw: u32,
    ) -> Result<f64, LookupError>;

    /// Temporary death benefit paid at the end of the year of death, `|nA_x`
    fn term_insurance(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError>;

    /// Pure endowment, `nE_x`
    fn pure_endowment(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError>;

    /// Endowment insurance: death benefit within `n` years plus survival benefit at `n`
    fn endowment(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        Ok(self.term_insurance(age, n, sex, table, rate)? + self.pure_endowment(age, n, sex, table, rate)?)
    }

    /// Annuity-certain over `g` years, no mortality
    fn ag_k(&self, g: i32, rate: f64, zw: u32) -> f64 {
        annuity_certain(g, rate, zw)
    }
}
