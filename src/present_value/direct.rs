//! Direct formulation: every call walks the survival path from `age`
//! carrying a running survival product and a running discount power.

use std::sync::Arc;

use super::discount::{discount_factor, discount_power, woolhouse_beta};
use super::{EngineKind, PresentValueProvider};
use crate::error::LookupError;
use crate::mortality::{MortalityTables, Sex, SurvivalKernel, TableId, OMEGA};

/// Present values recomputed from death probabilities on every call
#[derive(Debug, Clone)]
pub struct DirectEngine {
    tables: Arc<MortalityTables>,
}

impl DirectEngine {
    pub fn new(tables: Arc<MortalityTables>) -> Self {
        Self { tables }
    }

    fn kernel(&self, table: TableId, sex: Sex) -> Result<SurvivalKernel<'_>, LookupError> {
        self.tables.kernel(table, sex)
    }
}

/// Number of annual payments an n-year term can still make from `age`,
/// counting the one at age OMEGA
fn capped_term(age: u32, n: i32) -> usize {
    let remaining = i64::from(OMEGA) - i64::from(age) + 1;
    i64::from(n).min(remaining).max(0) as usize
}

/// `sum_{t < years} tpx * v^t`
fn annuity_due(kernel: &SurvivalKernel<'_>, age: u32, years: usize, rate: f64) -> f64 {
    let v = discount_factor(rate);
    let mut v_t = 1.0;
    let mut value = 0.0;

    for step in kernel.steps(age).take(years) {
        value += step.survival * v_t;
        v_t *= v;
    }
    value
}

/// `nE_x`; 1 for an elapsed term, 0 for a horizon beyond the table
fn pure_endowment(kernel: &SurvivalKernel<'_>, age: u32, n: i32, rate: f64) -> f64 {
    if n <= 0 {
        return 1.0;
    }
    if i64::from(age) + i64::from(n) > i64::from(OMEGA) {
        return 0.0;
    }
    kernel.tpx(age, n) * discount_power(rate, n as u32)
}

fn axn_k(kernel: &SurvivalKernel<'_>, age: u32, n: i32, rate: f64, zw: u32) -> f64 {
    if zw == 0 || n <= 0 || age > OMEGA {
        return 0.0;
    }

    let years = capped_term(age, n);
    let annuity = annuity_due(kernel, age, years, rate);
    let endowment = pure_endowment(kernel, age, years as i32, rate);
    annuity - woolhouse_beta(zw, rate) * (1.0 - endowment)
}

fn ax_k(kernel: &SurvivalKernel<'_>, age: u32, rate: f64, zw: u32) -> f64 {
    if zw == 0 || age > OMEGA {
        return 0.0;
    }
    annuity_due(kernel, age, capped_term(age, i32::MAX), rate) - woolhouse_beta(zw, rate)
}

impl PresentValueProvider for DirectEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Direct
    }

    fn tables(&self) -> &MortalityTables {
        &self.tables
    }

    fn ax(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        Ok(annuity_due(&kernel, age, capped_term(age, i32::MAX), rate))
    }

    fn ax_k(&self, age: u32, sex: Sex, table: TableId, rate: f64, zw: u32) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        Ok(ax_k(&kernel, age, rate, zw))
    }

    fn axn(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        if n <= 0 {
            return Ok(0.0);
        }
        Ok(annuity_due(&kernel, age, capped_term(age, n), rate))
    }

    fn axn_k(
        &self,
        age: u32,
        n: i32,
        sex: Sex,
        table: TableId,
        rate: f64,
        zw: u32,
    ) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        Ok(axn_k(&kernel, age, n, rate, zw))
    }

    fn nax_k(
        &self,
        age: u32,
        n: i32,
        sex: Sex,
        table: TableId,
        rate: f64,
        zw: u32,
    ) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        if zw == 0 || n <= 0 || i64::from(age) + i64::from(n) > i64::from(OMEGA) {
            return Ok(0.0);
        }

        let deferred_age = age + n as u32;
        Ok(pure_endowment(&kernel, age, n, rate) * ax_k(&kernel, deferred_age, rate, zw))
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
        let kernel = self.kernel(table, sex)?;
        if zw == 0 || m < 0 || n <= m || i64::from(age) + i64::from(m) > i64::from(OMEGA) {
            return Ok(0.0);
        }

        let deferred_age = age + m as u32;
        Ok(pure_endowment(&kernel, age, m, rate) * axn_k(&kernel, deferred_age, n - m, rate, zw))
    }

    fn term_insurance(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        if n <= 0 {
            return Ok(0.0);
        }

        let v = discount_factor(rate);
        let mut v_t = v;
        let mut value = 0.0;
        for step in kernel.steps(age).take(capped_term(age, n)) {
            value += step.survival * step.qx * v_t;
            v_t *= v;
        }
        Ok(value)
    }

    fn pure_endowment(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let kernel = self.kernel(table, sex)?;
        Ok(pure_endowment(&kernel, age, n, rate))
    }
}
