//! Discounting and the Woolhouse correction for sub-annual payments
//!
//! Rates are annual effective rates. A rate of zero (or below) means no
//! discounting at all: `v = 1`.

/// Payment frequencies with a defined correction term
pub const SUPPORTED_FREQUENCIES: [u32; 4] = [1, 2, 4, 12];

/// Annual discount factor `v = 1 / (1 + i)`, or 1 when `i <= 0`
pub fn discount_factor(rate: f64) -> f64 {
    if rate > 0.0 {
        1.0 / (1.0 + rate)
    } else {
        1.0
    }
}

/// `v^t`, built by repeated multiplication so it matches running products
pub fn discount_power(rate: f64, t: u32) -> f64 {
    let v = discount_factor(rate);
    (0..t).fold(1.0, |acc, _| acc * v)
}

/// First-order Woolhouse correction `beta(zw, i)`
///
/// `beta(zw, i) = (1+i)/zw * sum_{l=0}^{zw-1} (l/zw) / (1 + (l/zw)*i)`
///
/// Defined only for `zw` in {2, 4, 12}; annual payment and every other
/// frequency give 0.
pub fn woolhouse_beta(zw: u32, rate: f64) -> f64 {
    if !matches!(zw, 2 | 4 | 12) {
        return 0.0;
    }

    let k = f64::from(zw);
    let sum: f64 = (0..zw)
        .map(|l| {
            let fraction = f64::from(l) / k;
            fraction / (1.0 + fraction * rate)
        })
        .sum();

    sum * (1.0 + rate) / k
}

/// Annuity-certain due over `g` years with `zw` payments per year, no mortality
///
/// `(1 - v^g)/(1 - v) - beta(zw, i) * (1 - v^g)`; exactly `g` when there is
/// no discounting. Zero when `g <= 0` or `zw == 0`.
pub fn annuity_certain(g: i32, rate: f64, zw: u32) -> f64 {
    if zw == 0 || g <= 0 {
        return 0.0;
    }

    let v = discount_factor(rate);
    if v == 1.0 {
        return f64::from(g);
    }

    let v_g = v.powi(g);
    (1.0 - v_g) / (1.0 - v) - woolhouse_beta(zw, rate) * (1.0 - v_g)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_discount_factor() {
        assert_relative_eq!(discount_factor(0.0175), 1.0 / 1.0175);
        assert_eq!(discount_factor(0.0), 1.0);
        assert_eq!(discount_factor(-0.01), 1.0);
    }

    #[test]
    fn test_discount_power() {
        assert_eq!(discount_power(0.05, 0), 1.0);
        assert_relative_eq!(discount_power(0.05, 10), 1.05_f64.powi(-10), max_relative = 1e-14);
        assert_eq!(discount_power(0.0, 25), 1.0);
    }

    #[test]
    fn test_woolhouse_beta() {
        assert_eq!(woolhouse_beta(1, 0.0175), 0.0);
        assert_abs_diff_eq!(woolhouse_beta(2, 0.0), 0.25, epsilon = 1e-12);
        assert_abs_diff_eq!(woolhouse_beta(4, 0.0), 0.375, epsilon = 1e-12);
        assert_abs_diff_eq!(woolhouse_beta(12, 0.0), 0.4583, epsilon = 1e-3);
        assert_abs_diff_eq!(woolhouse_beta(12, 0.0175), 0.4583, epsilon = 1e-2);
    }

    #[test]
    fn test_unsupported_frequency_has_no_correction() {
        for zw in [0, 3, 6, 24] {
            assert_eq!(woolhouse_beta(zw, 0.03), 0.0);
        }
    }

    #[test]
    fn test_annuity_certain() {
        assert_eq!(annuity_certain(20, 0.0, 12), 20.0);
        assert_eq!(annuity_certain(0, 0.03, 1), 0.0);
        assert_eq!(annuity_certain(5, 0.03, 0), 0.0);

        // Annual: 1 + v + ... + v^9
        let v: f64 = 1.0 / 1.03;
        let expected: f64 = (0..10).map(|t| v.powi(t)).sum();
        assert_relative_eq!(annuity_certain(10, 0.03, 1), expected, max_relative = 1e-12);

        // Monthly is cheaper than annual in advance
        assert!(annuity_certain(10, 0.03, 12) < annuity_certain(10, 0.03, 1));
    }
}
