//! Per-sex one-year death probabilities for a single table
//!
//! Tables are validated once on construction:
//! - exactly one rate per age in `0..=OMEGA`
//! - every rate in `[0, 1]`
//! - `qx(OMEGA) == 1`, so death is certain in the terminal year
//!
//! After construction a table is immutable.

use super::{Sex, TableId, OMEGA, TABLE_LEN};
use crate::error::{LoadError, LookupError};

#[derive(Debug, Clone, PartialEq)]
pub struct MortalityTable {
    id: TableId,
    /// Male death probabilities by age
    male: Vec<f64>,
    /// Female death probabilities by age
    female: Vec<f64>,
}

impl MortalityTable {
    /// Build a table from per-sex rates indexed by age
    pub fn new(id: TableId, male: Vec<f64>, female: Vec<f64>) -> Result<Self, LoadError> {
        validate(id, Sex::Male, &male)?;
        validate(id, Sex::Female, &female)?;
        Ok(Self { id, male, female })
    }

    pub fn id(&self) -> TableId {
        self.id
    }

    /// All rates for one sex, index = age
    pub fn rates(&self, sex: Sex) -> &[f64] {
        match sex {
            Sex::Male => &self.male,
            Sex::Female => &self.female,
        }
    }

    /// One-year death probability at `age`
    pub fn qx(&self, age: u32, sex: Sex) -> Result<f64, LookupError> {
        self.rates(sex)
            .get(age as usize)
            .copied()
            .ok_or(LookupError::AgeOutOfRange {
                age: i64::from(age),
                omega: OMEGA,
                table: self.id,
            })
    }

    /// One-year survival probability at `age`
    pub fn px(&self, age: u32, sex: Sex) -> Result<f64, LookupError> {
        Ok(1.0 - self.qx(age, sex)?)
    }

    /// IAM 2012 Basic table, unadjusted
    pub fn iam_2012_basic() -> Self {
        Self::from_iam_2012(TableId::Iam2012Basic, &Self::flat_age_factors())
    }

    /// IAM 2012 Basic with the graded age factors from [`Self::default_age_factors`]
    pub fn iam_2012_graded() -> Self {
        Self::from_iam_2012(TableId::Iam2012Graded, &Self::default_age_factors())
    }

    /// Default age factors: 0.6 for ages <= 60, grading to 1.0 at age 90
    pub fn default_age_factors() -> Vec<f64> {
        Self::graded_age_factors(60, 90, 0.6, 1.0)
    }

    /// Flat age factors (all 1.0) for using raw table rates
    pub fn flat_age_factors() -> Vec<f64> {
        vec![1.0; TABLE_LEN]
    }

    /// Linear grade from `start_factor` at `start_age` to `end_factor` at `end_age`
    ///
    /// Without a grading window (`end_age <= start_age`) the factors step
    /// from `start_factor` to `end_factor` at `start_age`.
    pub fn graded_age_factors(
        start_age: usize,
        end_age: usize,
        start_factor: f64,
        end_factor: f64,
    ) -> Vec<f64> {
        if end_age <= start_age {
            return (0..TABLE_LEN)
                .map(|age| if age < start_age { start_factor } else { end_factor })
                .collect();
        }

        let mut factors = vec![start_factor; TABLE_LEN];

        let grade_years = (end_age - start_age) as f64;
        for age in start_age..=end_age.min(OMEGA as usize) {
            let years_from_start = (age - start_age) as f64;
            factors[age] = start_factor + (end_factor - start_factor) * years_from_start / grade_years;
        }

        for factor in factors.iter_mut().skip(end_age + 1) {
            *factor = end_factor;
        }

        factors
    }

    /// Apply multiplicative age factors to the compiled-in IAM 2012 rates.
    /// Adjusted rates are capped at 1 and the terminal age stays certain.
    fn from_iam_2012(id: TableId, age_factors: &[f64]) -> Self {
        let base = iam_2012_base_rates();
        let adjust = |age: usize, rate: f64| {
            if age == OMEGA as usize {
                1.0
            } else {
                (rate * age_factors.get(age).copied().unwrap_or(1.0)).min(1.0)
            }
        };

        let female = base.iter().enumerate().map(|(age, &(f, _))| adjust(age, f)).collect();
        let male = base.iter().enumerate().map(|(age, &(_, m))| adjust(age, m)).collect();

        Self { id, male, female }
    }
}

fn validate(id: TableId, sex: Sex, rates: &[f64]) -> Result<(), LoadError> {
    if rates.len() != TABLE_LEN {
        return Err(LoadError::WrongLength {
            table: id,
            sex,
            expected: TABLE_LEN,
            found: rates.len(),
        });
    }

    if let Some((age, &qx)) = rates
        .iter()
        .enumerate()
        .find(|(_, q)| !(0.0..=1.0).contains(*q))
    {
        return Err(LoadError::ProbabilityOutOfRange {
            table: id,
            sex,
            age: age as u32,
            qx,
        });
    }

    let terminal = rates[OMEGA as usize];
    if terminal != 1.0 {
        return Err(LoadError::TerminalNotCertain { table: id, sex, qx: terminal });
    }

    Ok(())
}

/// IAM 2012 Basic rates as (female, male), ages 0..=OMEGA.
/// The published table stops at 120; ages 121-122 carry the 0.4 plateau and
/// the terminal age is closed at 1.
fn iam_2012_base_rates() -> Vec<(f64, f64)> {
    vec![
        // Age 0-9
        (0.001801, 0.001783), (0.00045, 0.000446), (0.000287, 0.000306),
        (0.000199, 0.000254), (0.000152, 0.000193), (0.000139, 0.000186),
        (0.00013, 0.000184), (0.000122, 0.000177), (0.000105, 0.000159),
        (0.000098, 0.000143),
        // Age 10-19
        (0.000094, 0.000126), (0.000096, 0.000123), (0.000105, 0.000147),
        (0.00012, 0.000188), (0.000146, 0.000236), (0.000174, 0.000282),
        (0.000199, 0.000325), (0.00022, 0.000364), (0.000234, 0.000399),
        (0.000245, 0.00043),
        // Age 20-29
        (0.000253, 0.000459), (0.00026, 0.000492), (0.000266, 0.000526),
        (0.000272, 0.000569), (0.000275, 0.000616), (0.000277, 0.000669),
        (0.000284, 0.000728), (0.00029, 0.000764), (0.0003, 0.000789),
        (0.000313, 0.000808),
        // Age 30-39
        (0.000333, 0.000824), (0.000357, 0.000834), (0.000375, 0.000838),
        (0.00039, 0.000828), (0.000405, 0.000808), (0.000424, 0.000789),
        (0.000447, 0.000783), (0.000476, 0.0008), (0.000514, 0.000837),
        (0.00056, 0.000889),
        // Age 40-49
        (0.000613, 0.000955), (0.000667, 0.001029), (0.000723, 0.00111),
        (0.000774, 0.001188), (0.000823, 0.001268), (0.000866, 0.001355),
        (0.000917, 0.001464), (0.000983, 0.001615), (0.001072, 0.001808),
        (0.001168, 0.002032),
        // Age 50-59
        (0.00129, 0.002285), (0.001453, 0.002557), (0.001622, 0.002828),
        (0.001792, 0.003088), (0.001972, 0.003345), (0.002166, 0.003616),
        (0.002393, 0.003922), (0.002666, 0.004272), (0.003, 0.004681),
        (0.003393, 0.005146),
        // Age 60-69
        (0.003844, 0.005662), (0.004352, 0.006237), (0.004899, 0.006854),
        (0.005482, 0.00751), (0.006118, 0.00822), (0.006829, 0.009007),
        (0.007279, 0.009497), (0.007821, 0.010085), (0.008475, 0.010787),
        (0.009234, 0.011625),
        // Age 70-79
        (0.010083, 0.012619), (0.011011, 0.013798), (0.01203, 0.015195),
        (0.013154, 0.016834), (0.014415, 0.018733), (0.015869, 0.020905),
        (0.017555, 0.023367), (0.0195, 0.026155), (0.021758, 0.029306),
        (0.024412, 0.032858),
        // Age 80-89
        (0.027579, 0.036927), (0.031501, 0.041703), (0.036122, 0.046957),
        (0.041477, 0.052713), (0.047589, 0.059148), (0.054441, 0.066505),
        (0.061972, 0.075015), (0.070155, 0.084823), (0.078963, 0.095987),
        (0.088336, 0.108482),
        // Age 90-99
        (0.098197, 0.122214), (0.108323, 0.136799), (0.119188, 0.152409),
        (0.131334, 0.169078), (0.145521, 0.186882), (0.162722, 0.205844),
        (0.18212, 0.219247), (0.199661, 0.238612), (0.217946, 0.258341),
        (0.236834, 0.278219),
        // Age 100-109
        (0.256357, 0.298452), (0.283802, 0.32361), (0.304716, 0.344191),
        (0.325819, 0.364633), (0.346936, 0.384783), (0.367898, 0.4),
        (0.387607, 0.4), (0.4, 0.4), (0.4, 0.4), (0.4, 0.4),
        // Age 110-122
        (0.4, 0.4), (0.4, 0.4), (0.4, 0.4), (0.4, 0.4), (0.4, 0.4),
        (0.4, 0.4), (0.4, 0.4), (0.4, 0.4), (0.4, 0.4), (0.4, 0.4),
        (0.4, 0.4), (0.4, 0.4), (0.4, 0.4),
        // Age 123
        (1.0, 1.0),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_tables_are_valid() {
        for table in [MortalityTable::iam_2012_basic(), MortalityTable::iam_2012_graded()] {
            for sex in Sex::ALL {
                assert!(validate(table.id(), sex, table.rates(sex)).is_ok());
            }
        }
    }

    #[test]
    fn test_graded_rate() {
        let table = MortalityTable::iam_2012_graded();

        // Age 77 male: base = 0.026155, factor at 77 = 0.6 + (17/30)*0.4
        let qx = table.qx(77, Sex::Male).unwrap();
        let expected = 0.026155 * (0.6 + 17.0 * 0.4 / 30.0);
        assert!((qx - expected).abs() < 1e-12);
        assert!((qx - 0.0216).abs() < 0.001);
    }

    #[test]
    fn test_age_factor_grading() {
        let factors = MortalityTable::default_age_factors();

        assert_eq!(factors.len(), TABLE_LEN);
        assert_eq!(factors[50], 0.6);
        assert_eq!(factors[60], 0.6);
        assert!((factors[75] - 0.8).abs() < 0.01);
        assert_eq!(factors[90], 1.0);
        assert_eq!(factors[OMEGA as usize], 1.0);
    }

    #[test]
    fn test_age_factor_step_without_grading_window() {
        let step = MortalityTable::graded_age_factors(70, 70, 0.5, 1.0);
        assert_eq!(step.len(), TABLE_LEN);
        assert!(step.iter().all(|f| f.is_finite()));
        assert_eq!(step[69], 0.5);
        assert_eq!(step[70], 1.0);

        let reversed = MortalityTable::graded_age_factors(90, 60, 0.6, 1.0);
        assert_eq!(reversed[60], 0.6);
        assert_eq!(reversed[89], 0.6);
        assert_eq!(reversed[90], 1.0);
    }

    #[test]
    fn test_out_of_range_age() {
        let table = MortalityTable::iam_2012_basic();
        assert!(table.qx(OMEGA, Sex::Male).is_ok());
        assert_eq!(
            table.qx(OMEGA + 1, Sex::Male),
            Err(LookupError::AgeOutOfRange {
                age: i64::from(OMEGA + 1),
                omega: OMEGA,
                table: TableId::Iam2012Basic,
            })
        );
    }

    #[test]
    fn test_new_rejects_open_terminal_age() {
        let mut rates = vec![0.01; TABLE_LEN];
        let female = {
            let mut r = rates.clone();
            r[OMEGA as usize] = 1.0;
            r
        };
        rates[OMEGA as usize] = 0.9;

        let err = MortalityTable::new(TableId::Dav1994T, rates, female).unwrap_err();
        assert!(matches!(err, LoadError::TerminalNotCertain { sex: Sex::Male, .. }));
    }

    #[test]
    fn test_new_rejects_wrong_length_and_range() {
        let short = vec![1.0; 10];
        let mut ok = vec![0.01; TABLE_LEN];
        ok[OMEGA as usize] = 1.0;

        assert!(matches!(
            MortalityTable::new(TableId::Dav2008T, short, ok.clone()),
            Err(LoadError::WrongLength { found: 10, .. })
        ));

        let mut negative = ok.clone();
        negative[5] = -0.1;
        assert!(matches!(
            MortalityTable::new(TableId::Dav2008T, ok, negative),
            Err(LoadError::ProbabilityOutOfRange { age: 5, sex: Sex::Female, .. })
        ));
    }
}
