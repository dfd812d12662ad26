//! Summary statistics for a net-worth curve.

use crate::domain::frame::LabeledSeries;

pub const DEFAULT_PERIODS_PER_YEAR: f64 = 252.0;

#[derive(Debug, Clone, PartialEq)]
pub struct Performance {
    pub total_return: f64,
    pub annualized_return: f64,
    pub sharpe_ratio: f64,
    pub sortino_ratio: f64,
    pub max_drawdown: f64,
    /// Longest run of consecutive observations below the running peak.
    pub max_drawdown_duration: usize,
    pub periods: usize,
}

impl Performance {
    /// Statistics for `curve`, whose observations are assumed to be
    /// `periods_per_year` apart on average. Missing values are skipped.
    pub fn compute(curve: &LabeledSeries, risk_free_rate: f64, periods_per_year: f64) -> Self {
        let values: Vec<f64> = curve.values().iter().copied().filter(|v| !v.is_nan()).collect();
        Self::from_values(&values, risk_free_rate, periods_per_year)
    }

    pub fn from_values(values: &[f64], risk_free_rate: f64, periods_per_year: f64) -> Self {
        let total_return = match (values.first(), values.last()) {
            (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
            _ => 0.0,
        };

        let years = values.len().saturating_sub(1) as f64 / periods_per_year;
        let annualized_return = if years > 0.0 && total_return > -1.0 {
            (1.0 + total_return).powf(1.0 / years) - 1.0
        } else {
            0.0
        };

        let (max_drawdown, max_drawdown_duration) = compute_drawdown(values);
        let period_rf = risk_free_rate / periods_per_year;
        let (sharpe_ratio, sortino_ratio) =
            compute_risk_adjusted(values, period_rf, periods_per_year);

        Performance {
            total_return,
            annualized_return,
            sharpe_ratio,
            sortino_ratio,
            max_drawdown,
            max_drawdown_duration,
            periods: values.len(),
        }
    }
}

fn compute_drawdown(values: &[f64]) -> (f64, usize) {
    let Some(&first) = values.first() else {
        return (0.0, 0);
    };

    let mut peak = first;
    let mut max_dd = 0.0_f64;
    let mut max_dd_duration = 0usize;
    let mut current_dd_duration = 0usize;

    for &v in values {
        if v > peak {
            peak = v;
            current_dd_duration = 0;
        } else if peak > 0.0 && v < peak {
            let dd = (peak - v) / peak;
            if dd > max_dd {
                max_dd = dd;
            }
            current_dd_duration += 1;
            if current_dd_duration > max_dd_duration {
                max_dd_duration = current_dd_duration;
            }
        }
    }

    (max_dd, max_dd_duration)
}

fn compute_risk_adjusted(values: &[f64], period_rf: f64, periods_per_year: f64) -> (f64, f64) {
    if values.len() < 2 {
        return (0.0, 0.0);
    }

    let returns: Vec<f64> = values
        .windows(2)
        .map(|w| if w[0] > 0.0 { (w[1] - w[0]) / w[0] } else { 0.0 })
        .collect();

    let n = returns.len() as f64;
    let mean: f64 = returns.iter().sum::<f64>() / n;
    let variance: f64 = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / n;
    let stddev = variance.sqrt();
    let excess_return = mean - period_rf;
    let scale = periods_per_year.sqrt();

    let sharpe = if stddev > 0.0 {
        excess_return / stddev * scale
    } else {
        0.0
    };

    let downside: f64 = returns
        .iter()
        .filter(|&&r| r < period_rf)
        .map(|&r| (r - period_rf).powi(2))
        .sum();
    let downside_stddev = (downside / n).sqrt();

    let sortino = if downside_stddev > 0.0 {
        excess_return / downside_stddev * scale
    } else {
        0.0
    };

    (sharpe, sortino)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn empty_curve() {
        let perf = Performance::from_values(&[], 0.05, DEFAULT_PERIODS_PER_YEAR);
        assert_eq!(perf.total_return, 0.0);
        assert_eq!(perf.max_drawdown_duration, 0);
        assert_eq!(perf.periods, 0);
    }

    #[test]
    fn total_return_from_first_and_last() {
        let perf = Performance::from_values(&[1.0, 1.2, 0.9], 0.0, DEFAULT_PERIODS_PER_YEAR);
        assert_relative_eq!(perf.total_return, -0.1, epsilon = 1e-12);
    }

    #[test]
    fn flat_year_annualises_to_zero() {
        let perf = Performance::from_values(&[1.0; 253], 0.05, DEFAULT_PERIODS_PER_YEAR);
        assert_relative_eq!(perf.annualized_return, 0.0, epsilon = 1e-12);
        assert_eq!(perf.sharpe_ratio, 0.0);
    }

    #[test]
    fn one_year_of_growth_annualises_to_total() {
        let perf = Performance::from_values(&[1.0, 1.0, 1.1], 0.0, 2.0);
        assert_relative_eq!(perf.annualized_return, 0.1, epsilon = 1e-12);
    }

    #[test]
    fn max_drawdown_from_running_peak() {
        let (dd, _) = compute_drawdown(&[100.0, 110.0, 90.0, 95.0, 80.0, 100.0]);
        assert_relative_eq!(dd, 30.0 / 110.0, epsilon = 1e-12);
    }

    #[test]
    fn max_drawdown_duration_counts_observations_below_peak() {
        let (_, duration) = compute_drawdown(&[100.0, 110.0, 100.0, 90.0, 85.0, 95.0]);
        assert_eq!(duration, 4);
    }

    #[test]
    fn steady_growth_has_positive_sharpe() {
        let values: Vec<f64> = (0..100).map(|i| 1.0 + 0.001 * (i * i) as f64).collect();
        let perf = Performance::from_values(&values, 0.0, DEFAULT_PERIODS_PER_YEAR);
        assert!(perf.sharpe_ratio > 0.0);
        assert_eq!(perf.sortino_ratio, 0.0);
    }

    #[test]
    fn choppy_curve_has_finite_ratios() {
        let (sharpe, sortino) =
            compute_risk_adjusted(&[100.0, 101.0, 100.5, 101.5, 100.0, 102.0], 0.0, 252.0);
        assert!(sharpe.is_finite());
        assert!(sortino.is_finite());
    }
}
