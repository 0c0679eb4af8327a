//! Survival and deferred-death probabilities over one (table, sex) pair
//!
//! Every multi-year quantity is built by carrying a running survival product
//! forward one age at a time. [`SurvivalSteps`] is that walk; both engines
//! consume it so the products they see are identical bit for bit.

use super::{MortalityTable, Sex, OMEGA};
use crate::error::LookupError;

/// Read-only view of one sex's rates in one table
#[derive(Debug, Clone, Copy)]
pub struct SurvivalKernel<'a> {
    table: &'a MortalityTable,
    sex: Sex,
}

/// One year of a survival walk starting at some age `x`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurvivalStep {
    /// Years elapsed since `x`
    pub t: u32,
    /// Probability of surviving from `x` to `x + t`
    pub survival: f64,
    /// Death probability at age `x + t`
    pub qx: f64,
}

/// Iterator over `(t, tpx, q_{x+t})` for `t = 0, 1, ...` up to age OMEGA
#[derive(Debug, Clone)]
pub struct SurvivalSteps<'a> {
    rates: &'a [f64],
    age: usize,
    t: u32,
    survival: f64,
}

impl Iterator for SurvivalSteps<'_> {
    type Item = SurvivalStep;

    fn next(&mut self) -> Option<SurvivalStep> {
        let qx = *self.rates.get(self.age + self.t as usize)?;
        let step = SurvivalStep {
            t: self.t,
            survival: self.survival,
            qx,
        };
        self.survival *= 1.0 - qx;
        self.t += 1;
        Some(step)
    }
}

impl<'a> SurvivalKernel<'a> {
    pub fn new(table: &'a MortalityTable, sex: Sex) -> Self {
        Self { table, sex }
    }

    pub fn table(&self) -> &'a MortalityTable {
        self.table
    }

    pub fn sex(&self) -> Sex {
        self.sex
    }

    pub fn qx(&self, age: u32) -> Result<f64, LookupError> {
        self.table.qx(age, self.sex)
    }

    pub fn px(&self, age: u32) -> Result<f64, LookupError> {
        self.table.px(age, self.sex)
    }

    /// Walk survival forward from `age`; empty when `age > OMEGA`
    pub fn steps(&self, age: u32) -> SurvivalSteps<'a> {
        SurvivalSteps {
            rates: self.table.rates(self.sex),
            age: age as usize,
            t: 0,
            survival: 1.0,
        }
    }

    /// Probability of surviving `n` years from `age`.
    ///
    /// Returns 1 when `n <= 0` and also when `age + n > OMEGA`. The second
    /// case is not an actuarial "certain survival": it is the fallback for
    /// a horizon the table cannot express, kept as the established behaviour.
    /// Callers valuing a benefit must check the horizon themselves.
    pub fn tpx(&self, age: u32, n: i32) -> f64 {
        if n <= 0 || i64::from(age) + i64::from(n) > i64::from(OMEGA) {
            return 1.0;
        }

        let rates = self.table.rates(self.sex);
        let start = age as usize;
        let mut survival = 1.0;
        for qx in &rates[start..start + n as usize] {
            survival *= 1.0 - qx;
        }
        survival
    }

    /// Probability of dying in exactly year `n` (between `age+n-1` and `age+n`)
    ///
    /// Zero for `n < 1` and whenever year `n` lies beyond the table.
    pub fn tqx(&self, age: u32, n: i32) -> f64 {
        if n < 1 {
            return 0.0;
        }
        let death_age = i64::from(age) + i64::from(n) - 1;
        if death_age > i64::from(OMEGA) {
            return 0.0;
        }

        self.tpx(age, n - 1) * self.table.rates(self.sex)[death_age as usize]
    }
}
