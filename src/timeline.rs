//! Year-by-year valuation series of a policy
//!
//! Every entry is derived independently at attained age `x + k` from the
//! remaining durations `max(0, n - k)` and `max(0, t - k)`, so the series is
//! the same whichever engine produced it.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::error::ValuationError;
use crate::policy::PolicyParams;
use crate::present_value::{EngineKind, PresentValueProvider};

/// Present values at the start of one contract year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Contract year `k`, starting at 0
    pub year: i32,
    pub attained_age: u32,
    /// `max(0, n - k)`
    pub remaining_term: i32,

    /// Temporary annuity over the remaining term, `ä_{x+k}:n-k^(zw)`
    pub annuity: f64,
    /// Death benefit over the remaining term, `|n-kA_{x+k}`
    pub death_benefit: f64,
    /// Survival benefit at the end of the term, `n-kE_{x+k}`
    pub pure_endowment: f64,
    /// Annuity over the remaining premium term, `ä_{x+k}:t-k^(zw)`
    pub premium_annuity: f64,
    /// Net-premium reserve per unit sum insured
    pub reserve: f64,
}

impl TimelineEntry {
    /// Endowment insurance value at this year
    pub fn benefits(&self) -> f64 {
        self.death_benefit + self.pure_endowment
    }
}

/// Valuation series for `k = 0..=n`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyTimeline {
    pub policy: PolicyParams,
    pub engine: EngineKind,
    /// Annual net premium per unit sum insured; `None` when no premiums are payable
    pub net_premium: Option<f64>,
    pub entries: Vec<TimelineEntry>,
}

impl PolicyTimeline {
    /// Evaluate `policy` at every contract anniversary
    pub fn generate(
        provider: &dyn PresentValueProvider,
        policy: &PolicyParams,
    ) -> Result<Self, ValuationError> {
        policy.validate()?;

        let PolicyParams { sex, table, rate, term, premium_term, frequency, .. } = *policy;
        debug!(
            "Generating {}-year timeline for age {} ({} {}) with the {} engine",
            term,
            policy.entry_age,
            table,
            sex,
            provider.kind()
        );

        let mut entries = Vec::with_capacity(term as usize + 1);
        for k in 0..=term {
            let age = policy.attained_age(k);
            let remaining = (term - k).max(0);
            let premium_remaining = (premium_term - k).max(0);

            entries.push(TimelineEntry {
                year: k,
                attained_age: age,
                remaining_term: remaining,
                annuity: provider.axn_k(age, remaining, sex, table, rate, frequency)?,
                death_benefit: provider.term_insurance(age, remaining, sex, table, rate)?,
                pure_endowment: provider.pure_endowment(age, remaining, sex, table, rate)?,
                premium_annuity: provider.axn_k(age, premium_remaining, sex, table, rate, frequency)?,
                reserve: 0.0,
            });
        }

        let net_premium = entries
            .first()
            .filter(|first| first.premium_annuity != 0.0)
            .map(|first| first.benefits() / first.premium_annuity);

        let premium = net_premium.unwrap_or(0.0);
        for entry in &mut entries {
            entry.reserve = entry.benefits() - premium * entry.premium_annuity;
        }

        Ok(Self {
            policy: policy.clone(),
            engine: provider.kind(),
            net_premium,
            entries,
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entry(&self, year: i32) -> Option<&TimelineEntry> {
        usize::try_from(year).ok().and_then(|k| self.entries.get(k))
    }

    pub fn reserves(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.reserve)
    }
}
