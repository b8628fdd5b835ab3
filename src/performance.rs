use crate::models::*;
use std::cmp::Ordering;

pub struct Aggregation {
    pub stats: BacktestStats,
    pub equity_curve: Vec<EquityPoint>,
}

pub struct PerformanceCalculator;

impl PerformanceCalculator {
    /// Summarizes executions into hit rate, mean and median returns, and the
    /// smoothed equity curve.
    ///
    /// `steps_hint` is the length of the longest bar series used in the run.
    /// When it is missing or zero the curve falls back to one step per
    /// execution.
    pub fn aggregate(executions: &[Execution], steps_hint: Option<usize>) -> Aggregation {
        let total = executions.len();
        let pos = executions.iter().filter(|e| e.pct_return > 0.0).count();
        let neg = total - pos;
        let hit_rate = if total > 0 {
            pos as f64 / total as f64
        } else {
            0.0
        };

        let sorted = Self::sorted_returns(executions);
        let total_return: f64 = sorted.iter().sum();
        let mean = if total > 0 {
            total_return / total as f64
        } else {
            0.0
        };
        let median = Self::median(&sorted);

        let steps = steps_hint.filter(|steps| *steps > 0).unwrap_or(total);
        let equity_curve = Self::equity_curve(total_return, steps);

        Aggregation {
            stats: BacktestStats {
                hit_rate,
                mean,
                median,
                pos,
                neg,
                total_return,
            },
            equity_curve,
        }
    }

    fn sorted_returns(executions: &[Execution]) -> Vec<f64> {
        let mut returns: Vec<f64> = executions.iter().map(|e| e.pct_return).collect();
        returns.sort_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal));
        returns
    }

    /// Element at `floor(n / 2)`; for even lengths this is the upper middle value.
    fn median(sorted: &[f64]) -> f64 {
        if sorted.is_empty() {
            return 0.0;
        }
        sorted[sorted.len() / 2]
    }

    /// Straight-line curve that spreads `total_return` evenly over `steps` points.
    fn equity_curve(total_return: f64, steps: usize) -> Vec<EquityPoint> {
        if steps == 0 {
            return Vec::new();
        }
        let increment = total_return / steps as f64;
        let mut value = 1.0;
        (0..steps)
            .map(|step| {
                value += increment;
                EquityPoint {
                    t: step.to_string(),
                    v: value,
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn execution(ticker: &str, pct_return: f64) -> Execution {
        let t = Utc.with_ymd_and_hms(2024, 6, 3, 20, 0, 0).unwrap();
        Execution {
            ticker: ticker.to_string(),
            entry_at: t,
            exit_at: t,
            entry_price: 100.0,
            exit_price: 100.0 * (1.0 + pct_return),
            pct_return,
            days: 0.0,
        }
    }

    #[test]
    fn empty_executions_yield_zeroed_stats_and_no_curve() {
        let aggregation = PerformanceCalculator::aggregate(&[], None);
        assert_eq!(aggregation.stats, BacktestStats::default());
        assert!(aggregation.equity_curve.is_empty());

        let aggregation = PerformanceCalculator::aggregate(&[], Some(0));
        assert!(aggregation.equity_curve.is_empty());
    }

    #[test]
    fn counts_wins_and_treats_flat_trades_as_losses() {
        let executions = vec![
            execution("AAA", 0.10),
            execution("BBB", -0.05),
            execution("CCC", 0.0),
            execution("DDD", 0.02),
        ];
        let stats = PerformanceCalculator::aggregate(&executions, None).stats;
        assert_eq!(stats.pos, 2);
        assert_eq!(stats.neg, 2);
        assert!((stats.hit_rate - 0.5).abs() < 1e-12);
        assert!((stats.hit_rate * stats.total() as f64 - stats.pos as f64).abs() < 1e-9);
        assert!((stats.total_return - 0.07).abs() < 1e-12);
        assert!((stats.mean - 0.0175).abs() < 1e-12);
    }

    #[test]
    fn median_uses_upper_middle_for_even_counts() {
        let executions = vec![
            execution("AAA", 0.30),
            execution("BBB", -0.10),
            execution("CCC", 0.05),
            execution("DDD", 0.20),
        ];
        let stats = PerformanceCalculator::aggregate(&executions, None).stats;
        // sorted: [-0.10, 0.05, 0.20, 0.30] -> index 2
        assert!((stats.median - 0.20).abs() < 1e-12);

        let odd = vec![
            execution("AAA", 0.30),
            execution("BBB", -0.10),
            execution("CCC", 0.05),
        ];
        let stats = PerformanceCalculator::aggregate(&odd, None).stats;
        assert!((stats.median - 0.05).abs() < 1e-12);
    }

    #[test]
    fn equity_curve_spreads_total_return_over_longest_series() {
        let executions = vec![execution("AAA", 0.10), execution("BBB", 0.02)];
        let aggregation = PerformanceCalculator::aggregate(&executions, Some(4));
        let curve = aggregation.equity_curve;
        assert_eq!(curve.len(), 4);
        assert_eq!(curve[0].t, "0");
        assert_eq!(curve[3].t, "3");
        assert!((curve[0].v - 1.03).abs() < 1e-12);
        assert!((curve[1].v - 1.06).abs() < 1e-12);
        assert!((curve[3].v - 1.12).abs() < 1e-12);
        assert!(curve.windows(2).all(|pair| pair[1].v >= pair[0].v));
    }

    #[test]
    fn equity_curve_falls_back_to_execution_count() {
        let executions = vec![execution("AAA", -0.09), execution("BBB", 0.03), execution("CCC", 0.0)];
        let curve = PerformanceCalculator::aggregate(&executions, Some(0)).equity_curve;
        assert_eq!(curve.len(), 3);
        assert!((curve[2].v - 0.94).abs() < 1e-12);

        let curve = PerformanceCalculator::aggregate(&executions, None).equity_curve;
        assert_eq!(curve.len(), 3);
    }

    #[test]
    fn flat_curve_when_series_exist_but_nothing_executed() {
        let curve = PerformanceCalculator::aggregate(&[], Some(5)).equity_curve;
        assert_eq!(curve.len(), 5);
        assert!(curve.iter().all(|point| (point.v - 1.0).abs() < 1e-12));
    }
}
