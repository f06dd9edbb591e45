// =============================================================================
// Trade Journal — append-only JSONL record of executed trades
// =============================================================================
//
// One JSON object per line.  The journal is the single source of truth for
// the performance report; a malformed line is skipped with a warning rather
// than poisoning the whole analysis.
// =============================================================================

use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// One executed trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradeRecord {
    /// RFC 3339 execution time.
    pub timestamp: String,
    /// "BUY" or "SELL".
    pub action: String,
    pub symbol: String,
    pub price: f64,
    pub quantity: f64,
    /// USD value of the fill.
    pub value_usd: f64,
    /// Realized PnL — present on sells only.
    #[serde(default)]
    pub pnl: Option<f64>,
    /// Why the trade happened (confluence, stop-loss, take-profit).
    #[serde(default)]
    pub reason: Option<String>,
    /// "Paper" or "Live".
    #[serde(default)]
    pub mode: String,
}

/// Append one record to the journal at `path`, creating directories as
/// needed.
pub fn append(path: impl AsRef<Path>, record: &TradeRecord) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let line = serde_json::to_string(record).context("failed to serialise trade record")?;
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("failed to open trade journal at {}", path.display()))?;
    writeln!(file, "{line}").context("failed to append trade record")?;

    Ok(())
}

/// Read the whole journal (oldest first).  Missing file => empty journal.
pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<TradeRecord>> {
    let path = path.as_ref();

    if !path.exists() {
        return Ok(Vec::new());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read trade journal at {}", path.display()))?;

    let mut records = Vec::new();
    for (lineno, line) in content.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<TradeRecord>(line) {
            Ok(record) => records.push(record),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    line = lineno + 1,
                    error = %e,
                    "skipping malformed journal line"
                );
            }
        }
    }

    Ok(records)
}

// =============================================================================
// Tests
// =============================================================================
#[cfg(test)]
mod tests {
    use super::*;

    fn buy_record() -> TradeRecord {
        TradeRecord {
            timestamp: "2024-06-01T12:00:00Z".to_string(),
            action: "BUY".to_string(),
            symbol: "BTCUSDT".to_string(),
            price: 50_000.0,
            quantity: 0.0004,
            value_usd: 20.0,
            pnl: None,
            reason: Some("confluence".to_string()),
            mode: "Paper".to_string(),
        }
    }

    #[test]
    fn append_then_read_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("trades.jsonl");

        append(&path, &buy_record()).unwrap();

        let mut sell = buy_record();
        sell.action = "SELL".to_string();
        sell.pnl = Some(0.6);
        append(&path, &sell).unwrap();

        let records = read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].action, "BUY");
        assert_eq!(records[1].pnl, Some(0.6));
    }

    #[test]
    fn missing_journal_reads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let records = read_all(dir.path().join("nope.jsonl")).unwrap();
        assert!(records.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trades.jsonl");

        append(&path, &buy_record()).unwrap();
        {
            use std::io::Write;
            let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
            writeln!(file, "{{ broken json").unwrap();
        }
        append(&path, &buy_record()).unwrap();

        let records = read_all(&path).unwrap();
        assert_eq!(records.len(), 2);
    }
}
