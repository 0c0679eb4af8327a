//! Contract parameters for a single policy

use serde::{Deserialize, Serialize};

use crate::error::PolicyError;
use crate::mortality::{Sex, TableId, OMEGA};
use crate::present_value::discount::SUPPORTED_FREQUENCIES;

/// Default payment frequency (annual)
fn default_frequency() -> u32 {
    1
}

/// Value inputs of one contract
///
/// Present-value functions accept any arguments and fall back to sentinels;
/// a `PolicyParams` is the point where a contract is checked before a
/// timeline is built from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyParams {
    /// Age at inception, strictly between 0 and OMEGA
    pub entry_age: u32,

    pub sex: Sex,

    /// Mortality table identifier
    pub table: TableId,

    /// Annual effective interest rate
    pub rate: f64,

    /// Contract term in years; may run past OMEGA, where values are sentinels
    pub term: i32,

    /// Premium-payment term in years, at most `term`
    pub premium_term: i32,

    /// Payments per year (1, 2, 4 or 12)
    #[serde(default = "default_frequency")]
    pub frequency: u32,
}

impl PolicyParams {
    pub fn new(
        entry_age: u32,
        sex: Sex,
        table: TableId,
        rate: f64,
        term: i32,
        premium_term: i32,
        frequency: u32,
    ) -> Result<Self, PolicyError> {
        let params = Self {
            entry_age,
            sex,
            table,
            rate,
            term,
            premium_term,
            frequency,
        };
        params.validate()?;
        Ok(params)
    }

    /// Check the contract against the domain of the present-value functions
    pub fn validate(&self) -> Result<(), PolicyError> {
        if self.entry_age == 0 || self.entry_age >= OMEGA {
            return Err(PolicyError::EntryAge {
                age: self.entry_age,
                omega: OMEGA,
            });
        }
        if self.term < 0 {
            return Err(PolicyError::Term(self.term));
        }
        if self.premium_term < 0 || self.premium_term > self.term {
            return Err(PolicyError::PremiumTerm {
                premium_term: self.premium_term,
                term: self.term,
            });
        }
        if !self.rate.is_finite() || self.rate < 0.0 {
            return Err(PolicyError::Rate(self.rate));
        }
        if !SUPPORTED_FREQUENCIES.contains(&self.frequency) {
            return Err(PolicyError::Frequency(self.frequency));
        }
        Ok(())
    }

    /// Age at the start of contract year `k`
    pub fn attained_age(&self, k: i32) -> u32 {
        self.entry_age + k.max(0) as u32
    }
}
