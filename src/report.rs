// =============================================================================
// Performance Report — win rate, profit factor and equity from the journal
// =============================================================================
//
// Reads the trade journal written by the cycle and pairs each SELL with the
// BUY before it.  Metrics follow the usual conventions:
//
//   win rate      = winning sells / closed trades
//   profit factor = sum(winning %) / |sum(losing %)|   (infinite if no losses)
//   net profit    = final equity - initial capital
// =============================================================================

use tracing::info;

use crate::trade_log::TradeRecord;

/// Computed performance metrics.
#[derive(Debug, Clone)]
pub struct PerformanceReport {
    pub initial_capital: f64,
    pub final_capital: f64,
    pub net_profit_usd: f64,
    pub net_profit_pct: f64,
    pub total_closed_trades: usize,
    pub win_rate_pct: f64,
    pub profit_factor: f64,
    pub avg_win_pct: f64,
    pub avg_loss_pct: f64,
    pub first_close: String,
    pub last_close: String,
}

/// Analyze the journal.  Returns `None` when no completed sell exists — that
/// is "nothing to report yet", not an error.
pub fn analyze(records: &[TradeRecord], initial_capital: f64) -> Option<PerformanceReport> {
    let mut equity = initial_capital;
    let mut last_buy_value: Option<f64> = None;

    let mut pnl_pcts: Vec<f64> = Vec::new();
    let mut first_close = String::new();
    let mut last_close = String::new();

    for record in records {
        match record.action.as_str() {
            "BUY" => last_buy_value = Some(record.value_usd),
            "SELL" => {
                let Some(pnl) = record.pnl else { continue };
                let Some(buy_value) = last_buy_value.take() else { continue };
                if buy_value <= 0.0 {
                    continue;
                }

                equity += pnl;
                pnl_pcts.push(pnl / buy_value * 100.0);

                if first_close.is_empty() {
                    first_close = record.timestamp.clone();
                }
                last_close = record.timestamp.clone();
            }
            _ => {}
        }
    }

    if pnl_pcts.is_empty() {
        return None;
    }

    let wins: Vec<f64> = pnl_pcts.iter().copied().filter(|&p| p > 0.0).collect();
    let losses: Vec<f64> = pnl_pcts.iter().copied().filter(|&p| p <= 0.0).collect();

    let total = pnl_pcts.len();
    let win_rate_pct = wins.len() as f64 / total as f64 * 100.0;

    let total_win: f64 = wins.iter().sum();
    let total_loss: f64 = losses.iter().sum::<f64>().abs();
    let profit_factor = if total_loss > 0.0 {
        total_win / total_loss
    } else {
        f64::INFINITY
    };

    let avg_win_pct = if wins.is_empty() {
        0.0
    } else {
        total_win / wins.len() as f64
    };
    let avg_loss_pct = if losses.is_empty() {
        0.0
    } else {
        losses.iter().sum::<f64>() / losses.len() as f64
    };

    let net_profit_usd = equity - initial_capital;
    let net_profit_pct = net_profit_usd / initial_capital * 100.0;

    info!(
        closed_trades = total,
        win_rate = format!("{win_rate_pct:.2}%"),
        profit_factor = format!("{profit_factor:.2}"),
        "performance analysed"
    );

    Some(PerformanceReport {
        initial_capital,
        final_capital: equity,
        net_profit_usd,
        net_profit_pct,
        total_closed_trades: total,
        win_rate_pct,
        profit_factor,
        avg_win_pct,
        avg_loss_pct,
        first_close,
        last_close,
    })
}

/// Print the report in the established format.
pub fn print_report(report: &PerformanceReport) {
    println!("==================== PERFORMANCE REPORT ====================");
    println!("  Period analysed:       {} .. {}", report.first_close, report.last_close);
    println!("  Initial capital:       ${:.2}", report.initial_capital);
    println!("  Final capital:         ${:.2}", report.final_capital);
    println!(
        "  Net profit/loss:       ${:.2} ({:.2}%)",
        report.net_profit_usd, report.net_profit_pct
    );
    println!("------------------------------------------------------------");
    println!("  Closed trades:         {}", report.total_closed_trades);
    println!("  Win rate:              {:.2}%", report.win_rate_pct);
    if report.profit_factor.is_finite() {
        println!("  Profit factor:         {:.2}", report.profit_factor);
    } else {
        println!("  Profit factor:         inf (no losing trades)");
    }
    println!("  Average win:           {:.2}%", report.avg_win_pct);
    println!("  Average loss:          {:.2}%", report.avg_loss_pct);
    println!("============================================================");
}
