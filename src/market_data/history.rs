// =============================================================================
// Candle History Store — CSV-backed kline archive with append-resume
// =============================================================================
//
// The `fetch` subcommand writes downloaded klines here; `train`, `backtest`
// and `simulate` read them back.  Appending is resumable: only candles newer
// than the last stored close time are added, so a daily cron job can keep the
// archive current without re-downloading everything.
// =============================================================================

use std::path::Path;

use anyhow::{Context, Result};
use tracing::{info, warn};

use super::Candle;

/// Load the full candle history from `path` (oldest first).
///
/// A missing file is an error; callers that can start from scratch should
/// check existence first.
pub fn load(path: impl AsRef<Path>) -> Result<Vec<Candle>> {
    let path = path.as_ref();

    let mut reader = csv::Reader::from_path(path)
        .with_context(|| format!("failed to open candle history at {}", path.display()))?;

    let mut candles = Vec::new();
    for record in reader.deserialize() {
        let candle: Candle =
            record.with_context(|| format!("malformed row in {}", path.display()))?;
        candles.push(candle);
    }

    // Rows are written in order, but a hand-edited file may not be.
    candles.sort_by_key(|c| c.open_time);

    info!(path = %path.display(), count = candles.len(), "candle history loaded");
    Ok(candles)
}

/// Replace the history at `path` with `candles`, creating parent directories
/// as needed.  Writes to a temporary sibling file first, then renames.
pub fn save(path: impl AsRef<Path>, candles: &[Candle]) -> Result<()> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }

    let tmp_path = path.with_extension("csv.tmp");
    {
        let mut writer = csv::Writer::from_path(&tmp_path)
            .with_context(|| format!("failed to create {}", tmp_path.display()))?;
        for candle in candles {
            writer.serialize(candle).context("failed to write candle row")?;
        }
        writer.flush().context("failed to flush candle history")?;
    }

    std::fs::rename(&tmp_path, path)
        .with_context(|| format!("failed to rename tmp history to {}", path.display()))?;

    info!(path = %path.display(), count = candles.len(), "candle history saved");
    Ok(())
}

/// Merge `fresh` candles into the existing history at `path`, keeping only
/// those strictly newer than the last stored candle.  Returns the number of
/// candles actually appended.
pub fn append_new(path: impl AsRef<Path>, fresh: &[Candle]) -> Result<usize> {
    let path = path.as_ref();

    if !path.exists() {
        save(path, fresh)?;
        return Ok(fresh.len());
    }

    let mut existing = load(path)?;
    let last_open = existing.last().map(|c| c.open_time).unwrap_or(i64::MIN);

    let new_candles: Vec<Candle> = fresh
        .iter()
        .filter(|c| c.open_time > last_open)
        .cloned()
        .collect();

    if new_candles.is_empty() {
        warn!(path = %path.display(), "no candles newer than the stored history — nothing appended");
        return Ok(0);
    }

    let appended = new_candles.len();
    existing.extend(new_candles);
    save(path, &existing)?;

    info!(path = %path.display(), appended, "candle history extended");
    Ok(appended)
}
