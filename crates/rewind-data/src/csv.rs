//! CSV data loading implementation.

use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::NaiveDateTime;
use rewind_core::{Candle, Timeframe};

use crate::validation::validate_candle;
use crate::MemorySource;

/// Loads candle data from CSV files into a [`MemorySource`].
pub struct CsvLoader {
    path: PathBuf,
}

impl CsvLoader {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    /// Parse the file and register it under `symbol`/`timeframe`.
    pub fn load_into(
        &self,
        source: &mut MemorySource,
        symbol: &str,
        timeframe: Timeframe,
    ) -> anyhow::Result<usize> {
        let candles = load_candles_from_csv(&self.path)
            .with_context(|| format!("loading {}", self.path.display()))?;
        let count = candles.len();
        source.insert(symbol, timeframe, candles);
        Ok(count)
    }
}

/// Parse a Unix timestamp (seconds or milliseconds) or "YYYY-MM-DD HH:MM:SS".
pub fn parse_datetime(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(ts) = s.parse::<f64>() {
        // 13+ digits means milliseconds
        let ts = if ts.abs() > 1e12 { ts / 1000.0 } else { ts };
        return Some(ts.round() as i64);
    }

    ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y.%m.%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| dt.and_utc().timestamp())
}

/// Load candles from a CSV file with `time,open,high,low,close` columns.
///
/// Column positions are detected from the header; rows that fail validation
/// are skipped and logged.
pub fn load_candles_from_csv<P: AsRef<Path>>(path: P) -> anyhow::Result<Vec<Candle>> {
    let reader = csv::ReaderBuilder::new().delimiter(b',').from_path(path)?;
    read_candles(reader)
}

/// Parse candles from any CSV reader.
pub fn read_candles<R: std::io::Read>(mut reader: csv::Reader<R>) -> anyhow::Result<Vec<Candle>> {
    let headers = reader.headers()?.clone();
    let headers_lower: Vec<String> = headers.iter().map(|h| h.trim().to_lowercase()).collect();
    let column = |names: &[&str], fallback: usize| {
        headers_lower
            .iter()
            .position(|h| names.contains(&h.as_str()))
            .unwrap_or(fallback)
    };

    let ts_col = column(&["time", "timestamp", "date", "datetime"], 0);
    let open_col = column(&["open"], 1);
    let high_col = column(&["high"], 2);
    let low_col = column(&["low"], 3);
    let close_col = column(&["close"], 4);

    let mut candles = Vec::new();
    let mut skipped = 0usize;

    for result in reader.records() {
        let record = result?;
        let Some(time) = record.get(ts_col).and_then(parse_datetime) else {
            skipped += 1;
            continue;
        };
        let price = |col: usize| -> anyhow::Result<f64> {
            let raw = record.get(col).unwrap_or("").trim();
            raw.parse::<f64>()
                .with_context(|| format!("invalid price {raw:?} at time {time}"))
        };

        let candle = Candle::new(time, price(open_col)?, price(high_col)?, price(low_col)?, price(close_col)?);
        if validate_candle(&candle) {
            candles.push(candle);
        } else {
            skipped += 1;
        }
    }

    if skipped > 0 {
        log::warn!("Skipped {} malformed CSV rows", skipped);
    }

    candles.sort_by_key(|c| c.time);
    candles.dedup_by_key(|c| c.time);
    log::info!("Loaded {} candles from CSV", candles.len());
    Ok(candles)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_datetime() {
        assert_eq!(parse_datetime("1700000000"), Some(1_700_000_000));
        assert_eq!(parse_datetime("1700000000000"), Some(1_700_000_000));
        assert_eq!(parse_datetime("1970-01-02 00:00:00"), Some(86_400));
        assert_eq!(parse_datetime("yesterday"), None);
    }

    #[test]
    fn test_read_candles() {
        let data = "\
Date,Open,High,Low,Close
1970-01-01 00:02:00,1.2,1.3,1.1,1.25
1970-01-01 00:01:00,1.1,1.2,1.0,1.15
1970-01-01 00:03:00,1.0,0.5,1.1,1.0
";
        let reader = csv::ReaderBuilder::new().from_reader(data.as_bytes());
        let candles = read_candles(reader).unwrap();
        assert_eq!(candles.len(), 2);
        assert_eq!(candles[0].time, 60);
        assert_eq!(candles[1].close, 1.25);
    }
}
