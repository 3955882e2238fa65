//! Output artifacts: CSV series and the plain-text run report.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use thiserror::Error;

use crate::analytics::{FactMetrics, KyleLambda, SpreadMetrics};
use crate::order::{Price, Side, Trade};
use crate::sim::SimulationData;

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("failed to write report artifact: {0}")]
    Io(#[from] std::io::Error),
}

/// `trades.csv`: one row per execution.
pub fn write_trades_csv(path: &Path, trades: &[Trade]) -> Result<(), ReportError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "seq,buy_id,sell_id,price,qty,exec_time_ns,aggressor")?;
    for t in trades {
        writeln!(
            out,
            "{},{},{},{},{},{},{}",
            t.sequence,
            t.buy_order_id,
            t.sell_order_id,
            t.price,
            t.quantity,
            t.exec_time,
            t.aggressor
        )?;
    }
    Ok(())
}

/// `midprices.csv`: the per-event midpoint series.
pub fn write_midprices_csv(path: &Path, midprices: &[Price]) -> Result<(), ReportError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "idx,midprice")?;
    for (i, mid) in midprices.iter().enumerate() {
        writeln!(out, "{},{}", i, mid)?;
    }
    Ok(())
}

/// `spreads.csv`: the per-event quoted spread series.
pub fn write_spreads_csv(path: &Path, spreads: &[Price]) -> Result<(), ReportError> {
    let mut out = BufWriter::new(File::create(path)?);
    writeln!(out, "idx,quoted_spread")?;
    for (i, spread) in spreads.iter().enumerate() {
        writeln!(out, "{},{}", i, spread)?;
    }
    Ok(())
}

/// Render the human-readable summary report.
pub fn render_report(
    data: &SimulationData,
    spread: &SpreadMetrics,
    kyle: &KyleLambda,
    facts: &FactMetrics,
) -> String {
    let mut out = String::new();
    let mut line = |s: String| {
        out.push_str(&s);
        out.push('\n');
    };

    line("===========================================".to_string());
    line("micro-lob - Simulation Report".to_string());
    line("===========================================".to_string());
    line(String::new());
    line("Engine Statistics".to_string());
    line("-------------------------------------------".to_string());
    line(format!("Total orders:    {}", data.stats.total_orders));
    line(format!("Total trades:    {}", data.stats.total_trades));
    line(format!("Total volume:    {}", data.stats.total_volume));
    line(format!("Active orders:   {}", data.stats.active_orders));
    line(format!("Sweep flags:     {}", data.sweep_candidates));
    line(format!("Wall time:       {:.2} sec", data.wall_time_sec));
    if data.wall_time_sec > 0.0 {
        line(format!(
            "Throughput:      {:.0} events/sec",
            data.total_orders as f64 / data.wall_time_sec
        ));
    }

    line(String::new());
    line("Spread Decomposition (Huang-Stoll)".to_string());
    line("-------------------------------------------".to_string());
    line(format!("Quoted spread:      {:.2} ticks", spread.avg_quoted_spread));
    line(format!("Effective spread:   {:.2} ticks", spread.avg_effective_spread));
    line(format!("Realized spread:    {:.2} ticks", spread.avg_realized_spread));
    line(format!("Price impact:       {:.2} ticks", spread.avg_price_impact));
    line(format!("Adverse selection:  {:.2}%", spread.adverse_selection_pct));

    line(String::new());
    line("Kyle's Lambda".to_string());
    line("-------------------------------------------".to_string());
    line(format!("lambda:   {:.6}", kyle.lambda));
    line(format!("R^2:      {:.2}", kyle.r_squared));
    line(format!("t-stat:   {:.1}", kyle.t_statistic));
    line(format!("N:        {}", kyle.num_intervals));

    line(String::new());
    line("Stylized Facts".to_string());
    line("-------------------------------------------".to_string());
    line(format!("Excess kurtosis:     {:.2}", facts.return_kurtosis));
    line(format!("AC(|r|, lag=1):      {:.2}", facts.abs_return_ac_lag1));
    line(format!("AC(|r|, lag=5):      {:.2}", facts.abs_return_ac_lag5));
    line(format!("AC(|r|, lag=10):     {:.2}", facts.abs_return_ac_lag10));

    line(String::new());
    for check in &facts.fact_checks {
        let mark = if check.reproduced { "[ok]" } else { "[--]" };
        line(format!(
            "{} {} -> {:.2} (benchmark: {})",
            mark, check.name, check.value, check.benchmark
        ));
    }

    // Flow-side stats worth a glance
    let buys = data
        .trades
        .iter()
        .filter(|t| t.aggressor == Side::Buy)
        .count();
    line(String::new());
    line(format!(
        "Aggressor buys:  {} / {} trades",
        buys,
        data.trades.len()
    ));
    line("===========================================".to_string());

    out
}

/// Write all run artifacts under `dir`, creating it if needed.
pub fn write_all(
    dir: &Path,
    data: &SimulationData,
    spread: &SpreadMetrics,
    kyle: &KyleLambda,
    facts: &FactMetrics,
) -> Result<(), ReportError> {
    fs::create_dir_all(dir)?;
    write_trades_csv(&dir.join("trades.csv"), &data.trades)?;
    write_midprices_csv(&dir.join("midprices.csv"), &data.midprices)?;
    write_spreads_csv(&dir.join("spreads.csv"), &data.spreads)?;
    fs::write(
        dir.join("report.txt"),
        render_report(data, spread, kyle, facts),
    )?;
    Ok(())
}
