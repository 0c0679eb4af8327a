//! Cross-check of the two present-value formulations
//!
//! Both engines must agree on every function to a relative tolerance of
//! [`RELATIVE_TOLERANCE`]. Values at or near zero are compared against the
//! absolute floor [`ABSOLUTE_FLOOR`] instead.

use approx::relative_eq;
use serde::{Deserialize, Serialize};

use super::PresentValueProvider;
use crate::error::{EngineDivergence, ValuationError};
use crate::mortality::{Sex, TableId};

pub const RELATIVE_TOLERANCE: f64 = 1e-8;
pub const ABSOLUTE_FLOOR: f64 = 1e-12;

/// One argument set evaluated through every present-value function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EquivalenceCase {
    pub age: u32,
    /// Contract term
    pub n: i32,
    /// Premium term, also the deferral of the deferred temporary annuity
    pub t: i32,
    pub sex: Sex,
    pub table: TableId,
    pub rate: f64,
    pub zw: u32,
}

impl EquivalenceCase {
    fn arguments(&self) -> String {
        format!(
            "age={}, n={}, t={}, sex={}, table={}, i={}, zw={}",
            self.age, self.n, self.t, self.sex, self.table, self.rate, self.zw
        )
    }
}

/// `|a - b| / max(|a|, |b|)`, or 0 when both lie within the absolute floor
pub fn relative_error(a: f64, b: f64) -> f64 {
    let diff = (a - b).abs();
    if diff <= ABSOLUTE_FLOOR {
        return 0.0;
    }
    diff / a.abs().max(b.abs())
}

/// Evaluate every function on `case` through both providers
///
/// Returns the largest relative error seen, or the first divergence beyond
/// tolerance.
pub fn check_case(
    direct: &dyn PresentValueProvider,
    commutation: &dyn PresentValueProvider,
    case: &EquivalenceCase,
) -> Result<f64, ValuationError> {
    let EquivalenceCase { age, n, t, sex, table, rate, zw } = *case;

    let pairs: [(&'static str, f64, f64); 9] = [
        ("ax", direct.ax(age, sex, table, rate)?, commutation.ax(age, sex, table, rate)?),
        (
            "ax_k",
            direct.ax_k(age, sex, table, rate, zw)?,
            commutation.ax_k(age, sex, table, rate, zw)?,
        ),
        ("axn", direct.axn(age, n, sex, table, rate)?, commutation.axn(age, n, sex, table, rate)?),
        (
            "axn_k",
            direct.axn_k(age, t, sex, table, rate, zw)?,
            commutation.axn_k(age, t, sex, table, rate, zw)?,
        ),
        (
            "nax_k",
            direct.nax_k(age, n, sex, table, rate, zw)?,
            commutation.nax_k(age, n, sex, table, rate, zw)?,
        ),
        (
            "m_axn_k",
            direct.m_axn_k(age, t, n, sex, table, rate, zw)?,
            commutation.m_axn_k(age, t, n, sex, table, rate, zw)?,
        ),
        (
            "nAx",
            direct.term_insurance(age, n, sex, table, rate)?,
            commutation.term_insurance(age, n, sex, table, rate)?,
        ),
        (
            "nEx",
            direct.pure_endowment(age, n, sex, table, rate)?,
            commutation.pure_endowment(age, n, sex, table, rate)?,
        ),
        (
            "endowment",
            direct.endowment(age, n, sex, table, rate)?,
            commutation.endowment(age, n, sex, table, rate)?,
        ),
    ];

    let mut worst = 0.0_f64;
    for (function, d, c) in pairs {
        let error = relative_error(d, c);
        if !relative_eq!(d, c, epsilon = ABSOLUTE_FLOOR, max_relative = RELATIVE_TOLERANCE) {
            return Err(EngineDivergence {
                function,
                arguments: case.arguments(),
                direct: d,
                commutation: c,
                relative_error: error,
            }
            .into());
        }
        worst = worst.max(error);
    }
    Ok(worst)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mortality::{MortalityTable, MortalityTables, OMEGA, TABLE_LEN};
    use crate::present_value::{CommutationEngine, DirectEngine, EngineKind};
    use crate::error::LookupError;
    use std::sync::Arc;

    fn engines() -> (DirectEngine, CommutationEngine) {
        let tables = Arc::new(MortalityTables::builtin());
        (DirectEngine::new(Arc::clone(&tables)), CommutationEngine::new(tables))
    }

    fn case(age: u32, n: i32, t: i32) -> EquivalenceCase {
        EquivalenceCase {
            age,
            n,
            t,
            sex: Sex::Male,
            table: TableId::Iam2012Basic,
            rate: 0.0175,
            zw: 12,
        }
    }

    #[test]
    fn test_relative_error() {
        assert_eq!(relative_error(0.0, 0.0), 0.0);
        assert_eq!(relative_error(1e-14, 0.0), 0.0);
        assert!((relative_error(1.0, 1.1) - 0.1 / 1.1).abs() < 1e-15);
        assert_eq!(relative_error(2.0, 2.0), 0.0);
    }

    #[test]
    fn test_engines_agree_on_typical_policy() {
        let (direct, commutation) = engines();
        let worst = check_case(&direct, &commutation, &case(40, 30, 20)).unwrap();
        assert!(worst < RELATIVE_TOLERANCE);
    }

    #[test]
    fn test_engines_agree_at_the_table_edge() {
        let (direct, commutation) = engines();
        for (age, n, t) in [(OMEGA - 1, 1, 1), (OMEGA, 1, 0), (100, 40, 30), (OMEGA + 1, 5, 2)] {
            check_case(&direct, &commutation, &case(age, n, t)).unwrap();
        }
    }

    #[test]
    fn test_degenerate_arguments_agree() {
        let (direct, commutation) = engines();
        let mut zero_frequency = case(50, 10, 5);
        zero_frequency.zw = 0;
        check_case(&direct, &commutation, &zero_frequency).unwrap();
        check_case(&direct, &commutation, &case(50, 0, 0)).unwrap();
        check_case(&direct, &commutation, &case(50, -3, -1)).unwrap();
    }

    #[test]
    fn test_divergence_is_reported() {
        struct Skewed(DirectEngine);

        impl PresentValueProvider for Skewed {
            fn kind(&self) -> EngineKind {
                EngineKind::Commutation
            }
            fn tables(&self) -> &MortalityTables {
                self.0.tables()
            }
            fn ax(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
                Ok(self.0.ax(age, sex, table, rate)? * 1.001)
            }
            fn ax_k(&self, age: u32, sex: Sex, table: TableId, rate: f64, zw: u32) -> Result<f64, LookupError> {
                self.0.ax_k(age, sex, table, rate, zw)
            }
            fn axn(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
                self.0.axn(age, n, sex, table, rate)
            }
            fn axn_k(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64, zw: u32) -> Result<f64, LookupError> {
                self.0.axn_k(age, n, sex, table, rate, zw)
            }
            fn nax_k(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64, zw: u32) -> Result<f64, LookupError> {
                self.0.nax_k(age, n, sex, table, rate, zw)
            }
            fn m_axn_k(
                &self,
                age: u32,
                m: i32,
                n: i32,
                sex: Sex,
                table: TableId,
                rate: f64,
                zw: u32,
            ) -> Result<f64, LookupError> {
                self.0.m_axn_k(age, m, n, sex, table, rate, zw)
            }
            fn term_insurance(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
                self.0.term_insurance(age, n, sex, table, rate)
            }
            fn pure_endowment(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
                self.0.pure_endowment(age, n, sex, table, rate)
            }
        }

        let (direct, _) = engines();
        let skewed = Skewed(direct.clone());
        let err = check_case(&direct, &skewed, &case(40, 30, 20)).unwrap_err();
        match err {
            ValuationError::Divergence(divergence) => {
                assert_eq!(divergence.function, "ax");
                assert!(divergence.relative_error > RELATIVE_TOLERANCE);
                assert!(divergence.arguments.contains("age=40"));
            }
            other => panic!("expected divergence, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_table_is_a_lookup_error() {
        let (direct, commutation) = engines();
        let mut missing = case(40, 10, 5);
        missing.table = TableId::Dav2008T;
        assert!(matches!(
            check_case(&direct, &commutation, &missing),
            Err(ValuationError::Lookup(LookupError::TableNotLoaded(TableId::Dav2008T)))
        ));
    }

    #[test]
    fn test_engines_agree_on_a_table_closing_before_omega() {
        let rates: Vec<f64> = (0..TABLE_LEN).map(|age| if age <= 120 { 0.01 } else { 1.0 }).collect();
        let mut tables = MortalityTables::new();
        tables.insert(MortalityTable::new(TableId::Dav1994T, rates.clone(), rates).unwrap());
        let tables = Arc::new(tables);
        let direct = DirectEngine::new(Arc::clone(&tables));
        let commutation = CommutationEngine::new(tables);

        for (age, n, t) in [(40, 30, 20), (100, 30, 20), (121, 2, 1), (122, 1, 0), (122, 5, 2), (OMEGA, 1, 0)] {
            let mut closed = case(age, n, t);
            closed.table = TableId::Dav1994T;
            let worst = check_case(&direct, &commutation, &closed).unwrap();
            assert!(worst < RELATIVE_TOLERANCE);
        }
    }
}
