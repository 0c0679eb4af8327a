//! Commutation formulation
//!
//! Starting from a cohort of [`RADIX`] lives at age 0:
//!
//! ```text
//! l_{x+1} = l_x * p_x          t_x = l_x - l_{x+1}
//! D_x = l_x * v^x              C_x = t_x * v^(x+1)
//! N_x = sum_{y>=x} D_y         M_x = sum_{y>=x} C_y      R_x = sum_{y>=x} M_y
//! ```
//!
//! Each quantity is a column over ages `0..=OMEGA`, memoized per
//! (quantity, sex, table, rate). Ages past OMEGA read as 0, which makes
//! every horizon beyond the table collapse naturally.
//!
//! A table may close (`q_x = 1`) before OMEGA, leaving `D_x = 0` for the
//! remaining ages. Values at such an age are read from a cohort that starts
//! with [`RADIX`] lives at that age instead of age 0. Every formula is a
//! ratio over `D_x`, so the restarted cohort gives the conditional value.

use std::fmt;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use super::cache::{CacheStats, ColumnKey, CommutationCache};
use super::discount::{discount_factor, woolhouse_beta};
use super::{EngineKind, PresentValueProvider};
use crate::error::LookupError;
use crate::mortality::{MortalityTables, Sex, TableId, OMEGA, TABLE_LEN};

/// Cohort size at the cohort's starting age
pub const RADIX: f64 = 1_000_000.0;

/// Commutation quantities
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Quantity {
    /// Survivors `l_x`
    Lx,
    /// Deaths between `x` and `x+1`, `t_x`
    Deaths,
    Dx,
    Cx,
    Nx,
    Mx,
    Rx,
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quantity::Lx => "lx",
            Quantity::Deaths => "tx",
            Quantity::Dx => "Dx",
            Quantity::Cx => "Cx",
            Quantity::Nx => "Nx",
            Quantity::Mx => "Mx",
            Quantity::Rx => "Rx",
        };
        f.write_str(name)
    }
}

/// Present values from memoized commutation columns
#[derive(Debug)]
pub struct CommutationEngine {
    tables: Arc<MortalityTables>,
    cache: CommutationCache,
}

/// The D and N columns of one cohort, as read by the annuity formulas
struct Cohort {
    dx: Arc<[f64]>,
    nx: Arc<[f64]>,
}

impl CommutationEngine {
    pub fn new(tables: Arc<MortalityTables>) -> Self {
        Self {
            tables,
            cache: CommutationCache::new(),
        }
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    /// Full column of `quantity` for ages `0..=OMEGA`
    pub fn column(
        &self,
        quantity: Quantity,
        sex: Sex,
        table: TableId,
        rate: f64,
    ) -> Result<Arc<[f64]>, LookupError> {
        self.cohort_column(quantity, sex, table, rate, 0)
    }

    /// Column of `quantity` for a cohort of [`RADIX`] lives at `origin`;
    /// ages below `origin` read as 0
    pub fn cohort_column(
        &self,
        quantity: Quantity,
        sex: Sex,
        table: TableId,
        rate: f64,
        origin: u32,
    ) -> Result<Arc<[f64]>, LookupError> {
        let key = ColumnKey::new(quantity, sex, table, rate).rebased(origin);
        self.cache.get_or_try_insert_with(key, || {
            debug!(
                "Building {} column for {} {} at rate {} from age {}",
                quantity, table, sex, rate, origin
            );
            self.build_column(quantity, sex, table, rate, origin)
        })
    }

    /// Single value of `quantity` at `age`; 0 past the table
    pub fn value(
        &self,
        quantity: Quantity,
        age: u32,
        sex: Sex,
        table: TableId,
        rate: f64,
    ) -> Result<f64, LookupError> {
        Ok(at(&self.column(quantity, sex, table, rate)?, i64::from(age)))
    }

    pub fn lx(&self, age: u32, sex: Sex, table: TableId) -> Result<f64, LookupError> {
        // Survivors do not depend on the rate; share one column
        self.value(Quantity::Lx, age, sex, table, 0.0)
    }

    pub fn dx_deaths(&self, age: u32, sex: Sex, table: TableId) -> Result<f64, LookupError> {
        self.value(Quantity::Deaths, age, sex, table, 0.0)
    }

    pub fn dx(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        self.value(Quantity::Dx, age, sex, table, rate)
    }

    pub fn cx(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        self.value(Quantity::Cx, age, sex, table, rate)
    }

    pub fn nx(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        self.value(Quantity::Nx, age, sex, table, rate)
    }

    pub fn mx(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        self.value(Quantity::Mx, age, sex, table, rate)
    }

    pub fn rx(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        self.value(Quantity::Rx, age, sex, table, rate)
    }

    fn build_column(
        &self,
        quantity: Quantity,
        sex: Sex,
        table: TableId,
        rate: f64,
        origin: u32,
    ) -> Result<Vec<f64>, LookupError> {
        let v = discount_factor(rate);
        let start = origin as usize;
        let column = match quantity {
            Quantity::Lx => {
                let rates = self.tables.get(table)?.rates(sex);
                let mut lx = vec![0.0; start.min(TABLE_LEN)];
                let mut survivors = RADIX;
                for qx in rates.iter().skip(start) {
                    lx.push(survivors);
                    survivors *= 1.0 - qx;
                }
                lx
            }
            Quantity::Deaths => {
                let lx = self.cohort_column(Quantity::Lx, sex, table, 0.0, origin)?;
                (0..lx.len())
                    .map(|x| lx[x] - lx.get(x + 1).copied().unwrap_or(0.0))
                    .map(|deaths| deaths.max(0.0))
                    .collect()
            }
            Quantity::Dx => {
                let lx = self.cohort_column(Quantity::Lx, sex, table, 0.0, origin)?;
                discounted(&lx, v, 1.0)
            }
            Quantity::Cx => {
                let tx = self.cohort_column(Quantity::Deaths, sex, table, 0.0, origin)?;
                discounted(&tx, v, v)
            }
            Quantity::Nx => reverse_cumulative(&self.cohort_column(Quantity::Dx, sex, table, rate, origin)?),
            Quantity::Mx => reverse_cumulative(&self.cohort_column(Quantity::Cx, sex, table, rate, origin)?),
            Quantity::Rx => reverse_cumulative(&self.cohort_column(Quantity::Mx, sex, table, rate, origin)?),
        };
        Ok(column)
    }

    /// Starting age of the cohort that values `age`: 0 while the age-0
    /// cohort still has survivors there, otherwise `age` itself.
    /// None past the table.
    fn origin(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<Option<u32>, LookupError> {
        let dx = self.column(Quantity::Dx, sex, table, rate)?;
        if age > OMEGA {
            return Ok(None);
        }
        if at(&dx, i64::from(age)) != 0.0 {
            Ok(Some(0))
        } else {
            Ok(Some(age))
        }
    }

    fn cohort(&self, origin: u32, sex: Sex, table: TableId, rate: f64) -> Result<Cohort, LookupError> {
        Ok(Cohort {
            dx: self.cohort_column(Quantity::Dx, sex, table, rate, origin)?,
            nx: self.cohort_column(Quantity::Nx, sex, table, rate, origin)?,
        })
    }
}

impl Cohort {
    /// `(N_{x+m} - N_{x+n}) / D_x`, with `n = None` running to the table end
    fn annuity(&self, age: u32, m: i32, n: Option<i32>) -> f64 {
        let end = n.map_or(0.0, |n| at(&self.nx, shifted(age, n)));
        (at(&self.nx, shifted(age, m)) - end) / self.base(age)
    }

    /// `(D_{x+m} - D_{x+n}) / D_x`, the weight of the Woolhouse correction
    fn correction(&self, age: u32, m: i32, n: i32) -> f64 {
        (at(&self.dx, shifted(age, m)) - at(&self.dx, shifted(age, n))) / self.base(age)
    }

    fn base(&self, age: u32) -> f64 {
        at(&self.dx, i64::from(age))
    }
}

/// `values[x] * v^x * first`, with `v^x` carried as a running product
fn discounted(values: &[f64], v: f64, first: f64) -> Vec<f64> {
    let mut v_x = first;
    values
        .iter()
        .map(|value| {
            let discounted = value * v_x;
            v_x *= v;
            discounted
        })
        .collect()
}

/// `out[x] = sum_{y >= x} values[y]`
fn reverse_cumulative(values: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; values.len()];
    let mut running = 0.0;
    for (x, value) in values.iter().enumerate().rev() {
        running += value;
        out[x] = running;
    }
    out
}

fn at(column: &[f64], age: i64) -> f64 {
    if age < 0 || age > i64::from(OMEGA) {
        return 0.0;
    }
    column.get(age as usize).copied().unwrap_or(0.0)
}

fn shifted(age: u32, n: i32) -> i64 {
    i64::from(age) + i64::from(n)
}

impl PresentValueProvider for CommutationEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Commutation
    }

    fn tables(&self) -> &MortalityTables {
        &self.tables
    }

    fn ax(&self, age: u32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let Some(origin) = self.origin(age, sex, table, rate)? else {
            return Ok(0.0);
        };
        Ok(self.cohort(origin, sex, table, rate)?.annuity(age, 0, None))
    }

    fn ax_k(&self, age: u32, sex: Sex, table: TableId, rate: f64, zw: u32) -> Result<f64, LookupError> {
        let Some(origin) = self.origin(age, sex, table, rate)? else {
            return Ok(0.0);
        };
        if zw == 0 {
            return Ok(0.0);
        }
        let annuity = self.cohort(origin, sex, table, rate)?.annuity(age, 0, None);
        Ok(annuity - woolhouse_beta(zw, rate))
    }

    fn axn(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let origin = self.origin(age, sex, table, rate)?;
        let Some(origin) = origin.filter(|_| n > 0) else {
            return Ok(0.0);
        };
        Ok(self.cohort(origin, sex, table, rate)?.annuity(age, 0, Some(n)))
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
        let origin = self.origin(age, sex, table, rate)?;
        let Some(origin) = origin.filter(|_| zw != 0 && n > 0) else {
            return Ok(0.0);
        };
        let cohort = self.cohort(origin, sex, table, rate)?;
        Ok(cohort.annuity(age, 0, Some(n)) - woolhouse_beta(zw, rate) * cohort.correction(age, 0, n))
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
        let origin = self.origin(age, sex, table, rate)?;
        if zw == 0 || n <= 0 || shifted(age, n) > i64::from(OMEGA) {
            return Ok(0.0);
        }
        let Some(origin) = origin else {
            return Ok(0.0);
        };

        let cohort = self.cohort(origin, sex, table, rate)?;
        let deferred_age = age + n as u32;
        let deferred = at(&cohort.dx, i64::from(deferred_age)) / cohort.base(age);
        if deferred == 0.0 {
            return Ok(0.0);
        }
        Ok(deferred * self.ax_k(deferred_age, sex, table, rate, zw)?)
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
        let origin = self.origin(age, sex, table, rate)?;
        let Some(origin) = origin.filter(|_| zw != 0 && m >= 0 && n > m) else {
            return Ok(0.0);
        };
        let cohort = self.cohort(origin, sex, table, rate)?;
        Ok(cohort.annuity(age, m, Some(n)) - woolhouse_beta(zw, rate) * cohort.correction(age, m, n))
    }

    fn term_insurance(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let origin = self.origin(age, sex, table, rate)?;
        let Some(origin) = origin.filter(|_| n > 0) else {
            return Ok(0.0);
        };
        let dx = self.cohort_column(Quantity::Dx, sex, table, rate, origin)?;
        let mx = self.cohort_column(Quantity::Mx, sex, table, rate, origin)?;
        Ok((at(&mx, i64::from(age)) - at(&mx, shifted(age, n))) / at(&dx, i64::from(age)))
    }

    fn pure_endowment(&self, age: u32, n: i32, sex: Sex, table: TableId, rate: f64) -> Result<f64, LookupError> {
        let origin = self.origin(age, sex, table, rate)?;
        if n <= 0 {
            return Ok(1.0);
        }
        let Some(origin) = origin else {
            return Ok(0.0);
        };
        let dx = self.cohort_column(Quantity::Dx, sex, table, rate, origin)?;
        Ok(at(&dx, shifted(age, n)) / at(&dx, i64::from(age)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mortality::MortalityTable;
    use crate::present_value::DirectEngine;
    use approx::assert_relative_eq;

    const TABLE: TableId = TableId::Iam2012Basic;

    fn engine() -> CommutationEngine {
        CommutationEngine::new(Arc::new(MortalityTables::builtin()))
    }

    /// q = 0.01 through age 120, then death is certain from age 121
    fn closed_at_121() -> Arc<MortalityTables> {
        let rates: Vec<f64> = (0..TABLE_LEN).map(|age| if age <= 120 { 0.01 } else { 1.0 }).collect();
        let mut tables = MortalityTables::new();
        tables.insert(MortalityTable::new(TableId::Dav1994T, rates.clone(), rates).unwrap());
        Arc::new(tables)
    }

    #[test]
    fn test_lx_recursion() {
        let e = engine();
        assert_eq!(e.lx(0, Sex::Male, TABLE).unwrap(), RADIX);
        assert_relative_eq!(e.lx(1, Sex::Male, TABLE).unwrap(), RADIX * (1.0 - 0.001783));
        assert_eq!(e.lx(OMEGA + 1, Sex::Male, TABLE).unwrap(), 0.0);
    }

    #[test]
    fn test_deaths_close_the_cohort() {
        let e = engine();
        let deaths = e.column(Quantity::Deaths, Sex::Female, TABLE, 0.0).unwrap();
        let total: f64 = deaths.iter().sum();
        assert_relative_eq!(total, RADIX, max_relative = 1e-12);
        assert_eq!(
            e.dx_deaths(OMEGA, Sex::Female, TABLE).unwrap(),
            e.lx(OMEGA, Sex::Female, TABLE).unwrap()
        );
    }

    #[test]
    fn test_reverse_sums() {
        let e = engine();
        let rate = 0.03;
        for age in [0, 40, 100, OMEGA - 1] {
            let nx = e.nx(age, Sex::Male, TABLE, rate).unwrap();
            let next = e.nx(age + 1, Sex::Male, TABLE, rate).unwrap();
            assert_relative_eq!(nx, next + e.dx(age, Sex::Male, TABLE, rate).unwrap(), max_relative = 1e-12);

            let rx = e.rx(age, Sex::Male, TABLE, rate).unwrap();
            let rx_next = e.rx(age + 1, Sex::Male, TABLE, rate).unwrap();
            assert_relative_eq!(rx, rx_next + e.mx(age, Sex::Male, TABLE, rate).unwrap(), max_relative = 1e-12);
        }
        assert_eq!(e.nx(OMEGA, Sex::Male, TABLE, rate).unwrap(), e.dx(OMEGA, Sex::Male, TABLE, rate).unwrap());
    }

    #[test]
    fn test_zero_rate_mx_equals_lx() {
        // Without discounting every life eventually dies: M_x = l_x = D_x
        let e = engine();
        let mx = e.mx(50, Sex::Male, TABLE, 0.0).unwrap();
        let lx = e.lx(50, Sex::Male, TABLE).unwrap();
        assert_relative_eq!(mx, lx, max_relative = 1e-12);
    }

    #[test]
    fn test_columns_are_memoized() {
        let e = engine();
        let first = e.axn_k(40, 20, Sex::Male, TABLE, 0.0175, 12).unwrap();
        let entries = e.cache_stats().entries;
        let hits_before = e.cache_stats().hits;

        let second = e.axn_k(40, 20, Sex::Male, TABLE, 0.0175, 12).unwrap();
        assert_eq!(first.to_bits(), second.to_bits());
        assert_eq!(e.cache_stats().entries, entries);
        assert!(e.cache_stats().hits > hits_before);
    }

    #[test]
    fn test_isolated_instances() {
        let tables = Arc::new(MortalityTables::builtin());
        let a = CommutationEngine::new(Arc::clone(&tables));
        let b = CommutationEngine::new(tables);

        a.ax(40, Sex::Male, TABLE, 0.02).unwrap();
        assert!(a.cache_stats().entries > 0);
        assert_eq!(b.cache_stats().entries, 0);
    }

    #[test]
    fn test_sentinels() {
        let e = engine();
        assert_eq!(e.pure_endowment(40, 0, Sex::Male, TABLE, 0.02).unwrap(), 1.0);
        assert_eq!(e.pure_endowment(40, 90, Sex::Male, TABLE, 0.02).unwrap(), 0.0);
        assert_eq!(e.term_insurance(40, -2, Sex::Male, TABLE, 0.02).unwrap(), 0.0);
        assert_eq!(e.axn_k(40, 10, Sex::Male, TABLE, 0.02, 0).unwrap(), 0.0);
        assert_eq!(e.nax_k(40, 0, Sex::Male, TABLE, 0.02, 1).unwrap(), 0.0);
        assert_eq!(e.ax(OMEGA + 1, Sex::Male, TABLE, 0.02).unwrap(), 0.0);
        assert_eq!(e.ax(OMEGA, Sex::Male, TABLE, 0.02).unwrap(), 1.0);
    }

    #[test]
    fn test_unknown_table_is_not_cached() {
        let e = engine();
        assert_eq!(
            e.axn_k(40, 10, Sex::Male, TableId::Dav2008T, 0.02, 12),
            Err(LookupError::TableNotLoaded(TableId::Dav2008T))
        );
        assert_eq!(e.cache_stats().entries, 0);
    }

    #[test]
    fn test_cohort_restarts_where_the_table_closes() {
        let e = CommutationEngine::new(closed_at_121());
        let table = TableId::Dav1994T;
        let rate = 0.0175;
        let v = 1.0 / (1.0 + rate);

        assert_eq!(e.dx(122, Sex::Male, table, rate).unwrap(), 0.0);
        assert_eq!(e.ax(122, Sex::Male, table, rate).unwrap(), 1.0);
        assert_relative_eq!(e.term_insurance(122, 1, Sex::Male, table, rate).unwrap(), v, max_relative = 1e-12);
        assert_eq!(e.pure_endowment(122, 1, Sex::Male, table, rate).unwrap(), 0.0);
        assert_relative_eq!(e.axn(123, 3, Sex::Male, table, rate).unwrap(), 1.0);

        let restarted = e.cohort_column(Quantity::Lx, Sex::Male, table, 0.0, 122).unwrap();
        assert_eq!(restarted[121], 0.0);
        assert_eq!(restarted[122], RADIX);
        assert_eq!(restarted[123], 0.0);
    }

    #[test]
    fn test_closed_table_matches_direct_recursion() {
        let tables = closed_at_121();
        let direct = DirectEngine::new(Arc::clone(&tables));
        let e = CommutationEngine::new(tables);
        let (table, rate) = (TableId::Dav1994T, 0.0175);

        for age in [100, 120, 121, 122, OMEGA] {
            for sex in Sex::ALL {
                let pairs = [
                    (e.ax(age, sex, table, rate), direct.ax(age, sex, table, rate)),
                    (e.ax_k(age, sex, table, rate, 12), direct.ax_k(age, sex, table, rate, 12)),
                    (e.axn_k(age, 5, sex, table, rate, 4), direct.axn_k(age, 5, sex, table, rate, 4)),
                    (e.term_insurance(age, 1, sex, table, rate), direct.term_insurance(age, 1, sex, table, rate)),
                    (e.pure_endowment(age, 1, sex, table, rate), direct.pure_endowment(age, 1, sex, table, rate)),
                ];
                for (commutation, expected) in pairs {
                    assert_relative_eq!(commutation.unwrap(), expected.unwrap(), epsilon = 1e-12, max_relative = 1e-10);
                }
            }
        }
    }
}
