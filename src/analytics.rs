//! Downstream analytics over the trade/quote stream.
//!
//! Consumes the simulator's data bundle: spread decomposition
//! (quoted/effective/realized, price impact), Kyle's lambda by
//! interval-aggregated OLS, and the stylized-fact metrics used to judge
//! whether the simulated flow looks like real markets.

use crate::order::{Price, Side, Trade};
use crate::sim::TradeRecord;

// ============================================================================
// Spread decomposition
// ============================================================================

/// Huang-Stoll style spread measures, all in ticks.
///
/// For a trade with direction `d` (+1 buy, -1 sell), midpoint `m` before
/// and `m'` after:
///
/// ```text
/// effective = 2 d (p - m)         what the aggressor actually paid
/// realized  = 2 d (p - m')        what the maker actually kept
/// impact    = effective - realized = 2 d (m' - m)
/// ```
#[derive(Clone, Copy, Debug, Default)]
pub struct SpreadMetrics {
    pub avg_quoted_spread: f64,
    pub avg_effective_spread: f64,
    pub avg_realized_spread: f64,
    pub avg_price_impact: f64,
    /// Price impact as a share of the effective spread, in percent
    pub adverse_selection_pct: f64,
    pub median_effective_spread: f64,
    pub p95_effective_spread: f64,
    pub num_trades: usize,
}

/// Decompose spreads from per-trade records. The realized leg uses the
/// five-second forward midpoint.
pub fn spread_decomposition(trades: &[TradeRecord], quoted_spreads: &[Price]) -> SpreadMetrics {
    let mut metrics = SpreadMetrics {
        num_trades: trades.len(),
        ..SpreadMetrics::default()
    };

    if !quoted_spreads.is_empty() {
        metrics.avg_quoted_spread =
            quoted_spreads.iter().map(|&s| s as f64).sum::<f64>() / quoted_spreads.len() as f64;
    }
    if trades.is_empty() {
        return metrics;
    }

    let mut effective_spreads = Vec::with_capacity(trades.len());
    let mut sum_effective = 0.0;
    let mut sum_realized = 0.0;

    for t in trades {
        let d = match t.aggressor {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        };
        let effective = 2.0 * d * (t.trade_price - t.mid_before) as f64;
        let realized = 2.0 * d * (t.trade_price - t.mid_after_5s) as f64;

        effective_spreads.push(effective);
        sum_effective += effective;
        sum_realized += realized;
    }

    let n = trades.len() as f64;
    metrics.avg_effective_spread = sum_effective / n;
    metrics.avg_realized_spread = sum_realized / n;
    metrics.avg_price_impact = metrics.avg_effective_spread - metrics.avg_realized_spread;

    if metrics.avg_effective_spread.abs() > f64::EPSILON {
        metrics.adverse_selection_pct =
            100.0 * metrics.avg_price_impact / metrics.avg_effective_spread;
    }

    effective_spreads.sort_by(f64::total_cmp);
    metrics.median_effective_spread = percentile(&effective_spreads, 0.5);
    metrics.p95_effective_spread = percentile(&effective_spreads, 0.95);

    metrics
}

// ============================================================================
// Kyle's lambda
// ============================================================================

/// OLS estimate of the price-impact coefficient:
/// `delta_mid = alpha + lambda * signed_volume + eps` over fixed intervals.
#[derive(Clone, Copy, Debug, Default)]
pub struct KyleLambda {
    pub lambda: f64,
    pub alpha: f64,
    pub r_squared: f64,
    pub t_statistic: f64,
    pub std_error: f64,
    pub num_intervals: usize,
}

/// Estimate Kyle's lambda from the trade stream and the midprice series.
///
/// Trades are bucketed into `interval_sec` windows by execution time; each
/// window contributes one (signed volume, mid change) observation.
/// `event_times`/`midprices` are the driver's parallel per-event series.
pub fn estimate_kyle_lambda(
    trades: &[Trade],
    event_times: &[f64],
    midprices: &[Price],
    interval_sec: f64,
) -> KyleLambda {
    if trades.is_empty() || event_times.is_empty() || interval_sec <= 0.0 {
        return KyleLambda::default();
    }

    let max_time = trades
        .iter()
        .map(|t| t.exec_time as f64 / 1e9)
        .fold(0.0f64, f64::max);
    let num_intervals = (max_time / interval_sec).ceil() as usize;
    if num_intervals < 3 {
        return KyleLambda::default();
    }

    let mut signed_volume = vec![0.0f64; num_intervals];
    for t in trades {
        let secs = t.exec_time as f64 / 1e9;
        let bucket = ((secs / interval_sec) as usize).min(num_intervals - 1);
        let sign = match t.aggressor {
            Side::Buy => 1.0,
            Side::Sell => -1.0,
        };
        signed_volume[bucket] += sign * t.quantity as f64;
    }

    let mut observations = Vec::with_capacity(num_intervals);
    for i in 0..num_intervals {
        let t_start = i as f64 * interval_sec;
        let t_end = (i + 1) as f64 * interval_sec;
        let p_start = mid_at(event_times, midprices, t_start);
        let p_end = mid_at(event_times, midprices, t_end);
        if signed_volume[i] != 0.0 {
            observations.push((signed_volume[i], (p_end - p_start) as f64));
        }
    }

    ols(&observations)
}

/// Last recorded midpoint at or before `t` (first one if `t` predates the
/// series).
fn mid_at(event_times: &[f64], midprices: &[Price], t: f64) -> Price {
    match event_times.partition_point(|&et| et <= t) {
        0 => midprices[0],
        n => midprices[(n - 1).min(midprices.len() - 1)],
    }
}

fn ols(observations: &[(f64, f64)]) -> KyleLambda {
    let n = observations.len();
    if n < 3 {
        return KyleLambda::default();
    }
    let nf = n as f64;

    let x_mean = observations.iter().map(|o| o.0).sum::<f64>() / nf;
    let y_mean = observations.iter().map(|o| o.1).sum::<f64>() / nf;

    let mut sxx = 0.0;
    let mut sxy = 0.0;
    let mut syy = 0.0;
    for &(x, y) in observations {
        sxx += (x - x_mean) * (x - x_mean);
        sxy += (x - x_mean) * (y - y_mean);
        syy += (y - y_mean) * (y - y_mean);
    }
    if sxx <= f64::EPSILON {
        return KyleLambda::default();
    }

    let lambda = sxy / sxx;
    let alpha = y_mean - lambda * x_mean;

    let sse: f64 = observations
        .iter()
        .map(|&(x, y)| {
            let resid = y - alpha - lambda * x;
            resid * resid
        })
        .sum();
    let r_squared = if syy > f64::EPSILON { 1.0 - sse / syy } else { 0.0 };

    let resid_var = sse / (nf - 2.0);
    let std_error = (resid_var / sxx).sqrt();
    let t_statistic = if std_error > f64::EPSILON {
        lambda / std_error
    } else {
        0.0
    };

    KyleLambda {
        lambda,
        alpha,
        r_squared,
        t_statistic,
        std_error,
        num_intervals: n,
    }
}

// ============================================================================
// Stylized facts
// ============================================================================

/// One empirical benchmark comparison.
#[derive(Clone, Debug)]
pub struct FactCheck {
    pub name: &'static str,
    pub value: f64,
    pub benchmark: &'static str,
    pub reproduced: bool,
}

/// Return-distribution and volatility-clustering metrics.
#[derive(Clone, Debug, Default)]
pub struct FactMetrics {
    /// Excess kurtosis of simple returns (Normal = 0)
    pub return_kurtosis: f64,
    pub return_skewness: f64,
    pub jarque_bera_stat: f64,
    pub abs_return_ac_lag1: f64,
    pub abs_return_ac_lag5: f64,
    pub abs_return_ac_lag10: f64,
    pub squared_return_ac_lag1: f64,
    pub fact_checks: Vec<FactCheck>,
}

/// Compute the stylized-fact battery from the midprice series.
pub fn stylized_facts(midprices: &[Price]) -> FactMetrics {
    let returns: Vec<f64> = midprices
        .windows(2)
        .filter(|w| w[0] != 0)
        .map(|w| (w[1] - w[0]) as f64 / w[0] as f64)
        .collect();

    let mut metrics = FactMetrics::default();
    if returns.len() < 20 {
        return metrics;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;
    let mut var = 0.0;
    let mut m3 = 0.0;
    let mut m4 = 0.0;
    for &r in &returns {
        let d = r - mean;
        var += d * d;
        m3 += d * d * d;
        m4 += d * d * d * d;
    }
    var /= n;
    m3 /= n;
    m4 /= n;

    if var <= f64::EPSILON {
        return metrics;
    }
    let std_dev = var.sqrt();

    metrics.return_kurtosis = m4 / (var * var) - 3.0;
    metrics.return_skewness = m3 / (std_dev * std_dev * std_dev);
    metrics.jarque_bera_stat = n / 6.0
        * (metrics.return_skewness.powi(2) + metrics.return_kurtosis.powi(2) / 4.0);

    let abs_returns: Vec<f64> = returns.iter().map(|r| r.abs()).collect();
    let sq_returns: Vec<f64> = returns.iter().map(|r| r * r).collect();

    metrics.abs_return_ac_lag1 = autocorrelation(&abs_returns, 1);
    metrics.abs_return_ac_lag5 = autocorrelation(&abs_returns, 5);
    metrics.abs_return_ac_lag10 = autocorrelation(&abs_returns, 10);
    metrics.squared_return_ac_lag1 = autocorrelation(&sq_returns, 1);

    metrics.fact_checks = vec![
        FactCheck {
            name: "Fat tails (excess kurtosis)",
            value: metrics.return_kurtosis,
            benchmark: "> 0 (equities: 2-30)",
            reproduced: metrics.return_kurtosis > 0.0,
        },
        FactCheck {
            name: "Volatility clustering AC(|r|, 1)",
            value: metrics.abs_return_ac_lag1,
            benchmark: "> 0.05",
            reproduced: metrics.abs_return_ac_lag1 > 0.05,
        },
        FactCheck {
            name: "Slow AC decay AC(|r|, 10)",
            value: metrics.abs_return_ac_lag10,
            benchmark: "> 0",
            reproduced: metrics.abs_return_ac_lag10 > 0.0,
        },
        FactCheck {
            name: "Non-normality (Jarque-Bera)",
            value: metrics.jarque_bera_stat,
            benchmark: "> 5.99 (chi2, 5%)",
            reproduced: metrics.jarque_bera_stat > 5.99,
        },
    ];

    metrics
}

/// Sample autocorrelation at `lag`; 0 for degenerate series.
pub fn autocorrelation(series: &[f64], lag: usize) -> f64 {
    if series.len() <= lag + 1 {
        return 0.0;
    }
    let n = series.len();
    let mean = series.iter().sum::<f64>() / n as f64;

    let mut num = 0.0;
    for i in lag..n {
        num += (series[i] - mean) * (series[i - lag] - mean);
    }
    let denom: f64 = series.iter().map(|&s| (s - mean) * (s - mean)).sum();
    if denom <= f64::EPSILON {
        return 0.0;
    }
    num / denom
}

/// Linear interpolation percentile over a sorted slice; `p` in [0, 1].
fn percentile(sorted: &[f64], p: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let idx = p * (sorted.len() - 1) as f64;
    let lo = idx.floor() as usize;
    let hi = idx.ceil() as usize;
    let frac = idx - lo as f64;
    sorted[lo] * (1.0 - frac) + sorted[hi] * frac
}
