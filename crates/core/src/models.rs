use crate::error::SeriesError;
use crate::gap::valid;
use crate::series::Series;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

// ---------------------------------------------------------------------------
// Market Data
// ---------------------------------------------------------------------------

/// A single OHLCV bar. NaN or infinite fields are treated as missing data.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// A bar whose open, high, low and close are all `price`.
    pub fn flat(timestamp: DateTime<Utc>, price: f64) -> Self {
        Self {
            timestamp,
            open: price,
            high: price,
            low: price,
            close: price,
            volume: 0.0,
        }
    }
}

/// Which column of a [`ChartData`] a single-series indicator reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Volume,
}

// ---------------------------------------------------------------------------
// OHLCV bundle
// ---------------------------------------------------------------------------

/// Timestamps plus open/high/low/close/volume series, all the same length and
/// aligned by index. Timestamps are strictly ascending.
///
/// Indicators only ever read a `ChartData`; every mutation that rewrites
/// already-processed bars reports the revision boundary so callers can
/// truncate dependent results before updating them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChartData {
    times: Vec<DateTime<Utc>>,
    open: Series,
    high: Series,
    low: Series,
    close: Series,
    volume: Series,
}

impl ChartData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a bundle from bars, which must be in strictly ascending time order.
    pub fn from_bars<I>(bars: I) -> Result<Self, SeriesError>
    where
        I: IntoIterator<Item = Bar>,
    {
        let mut data = Self::new();
        for bar in bars {
            data.push(bar)?;
        }
        Ok(data)
    }

    /// Builds a bundle from parallel columns. Every column must have the same
    /// length as `times`.
    pub fn from_columns(
        times: Vec<DateTime<Utc>>,
        open: Series,
        high: Series,
        low: Series,
        close: Series,
        volume: Series,
    ) -> Result<Self, SeriesError> {
        let expected = times.len();
        for (column, series) in [
            ("open", &open),
            ("high", &high),
            ("low", &low),
            ("close", &close),
            ("volume", &volume),
        ] {
            if series.len() != expected {
                return Err(SeriesError::LengthMismatch {
                    column,
                    expected,
                    actual: series.len(),
                });
            }
        }
        if let Some(i) = (1..times.len()).find(|&i| times[i] <= times[i - 1]) {
            return Err(SeriesError::Unordered(i));
        }
        Ok(Self {
            times,
            open,
            high,
            low,
            close,
            volume,
        })
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn latest_time(&self) -> Option<DateTime<Utc>> {
        self.times.last().copied()
    }

    pub fn open(&self) -> &Series {
        &self.open
    }

    pub fn high(&self) -> &Series {
        &self.high
    }

    pub fn low(&self) -> &Series {
        &self.low
    }

    pub fn close(&self) -> &Series {
        &self.close
    }

    pub fn volume(&self) -> &Series {
        &self.volume
    }

    pub fn source(&self, source: PriceSource) -> &Series {
        match source {
            PriceSource::Open => &self.open,
            PriceSource::High => &self.high,
            PriceSource::Low => &self.low,
            PriceSource::Close => &self.close,
            PriceSource::Volume => &self.volume,
        }
    }

    /// The bar at `index`, if any. Gaps come back as NaN.
    pub fn record(&self, index: usize) -> Option<Bar> {
        let timestamp = *self.times.get(index)?;
        let read = |s: &Series| s.get(index).unwrap_or(f64::NAN);
        Some(Bar {
            timestamp,
            open: read(&self.open),
            high: read(&self.high),
            low: read(&self.low),
            close: read(&self.close),
            volume: read(&self.volume),
        })
    }

    pub fn bars(&self) -> impl Iterator<Item = Bar> + '_ {
        (0..self.len()).filter_map(move |i| self.record(i))
    }

    /// Appends a bar newer than the current last bar.
    pub fn push(&mut self, bar: Bar) -> Result<(), SeriesError> {
        if let Some(last) = self.times.last() {
            if bar.timestamp <= *last {
                return Err(SeriesError::Unordered(self.times.len()));
            }
        }
        self.push_unchecked(bar);
        Ok(())
    }

    fn push_unchecked(&mut self, bar: Bar) {
        self.times.push(bar.timestamp);
        self.open.push(valid(bar.open));
        self.high.push(valid(bar.high));
        self.low.push(valid(bar.low));
        self.close.push(valid(bar.close));
        self.volume.push(valid(bar.volume));
    }

    /// Merges newer data into this bundle.
    ///
    /// Bars of `other` overwrite every existing bar from the first one whose
    /// timestamp is not older than `other`'s first bar; the rest are appended.
    /// Data that ends before the current last bar is ignored.
    ///
    /// Returns the index of the first changed bar, or `None` when nothing
    /// changed.
    pub fn merge(&mut self, other: &ChartData) -> Option<usize> {
        let (first, last) = match (other.times.first(), other.times.last()) {
            (Some(first), Some(last)) => (*first, *last),
            _ => return None,
        };

        if let Some(current_last) = self.times.last() {
            if last < *current_last {
                debug!(%last, current = %current_last, "Ignoring merge of stale data");
                return None;
            }
        }

        let from = self.times.partition_point(|t| *t < first);
        if from < self.len() {
            debug!(from, replaced = self.len() - from, "Merge revises existing bars");
            self.truncate_from(from);
        }
        for bar in other.bars() {
            self.push_unchecked(bar);
        }
        Some(from)
    }

    /// Revises the latest bar's close in place, widening its high/low if the
    /// new price falls outside them. Returns the revised index.
    pub fn update_latest_close(&mut self, value: f64) -> Option<usize> {
        let index = self.len().checked_sub(1)?;
        self.close.set(index, valid(value));
        if !value.is_finite() {
            return Some(index);
        }
        if self.high.get(index).is_some_and(|high| high < value) {
            self.high.set(index, Some(value));
        }
        if self.low.get(index).is_some_and(|low| value < low) {
            self.low.set(index, Some(value));
        }
        Some(index)
    }

    /// Drops every bar at or after `index`.
    pub fn truncate_from(&mut self, index: usize) {
        self.times.truncate(index);
        self.open.truncate_from(index);
        self.high.truncate_from(index);
        self.low.truncate_from(index);
        self.close.truncate_from(index);
        self.volume.truncate_from(index);
    }

    /// Drops the oldest `count` bars.
    pub fn remove_old(&mut self, count: usize) {
        let count = count.min(self.len());
        self.times.drain(..count);
        self.open.remove_first(count);
        self.high.remove_first(count);
        self.low.remove_first(count);
        self.close.remove_first(count);
        self.volume.remove_first(count);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(minute: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(minute * 60, 0).unwrap()
    }

    fn data(minutes: &[i64]) -> ChartData {
        ChartData::from_bars(minutes.iter().map(|&m| Bar::flat(ts(m), m as f64))).unwrap()
    }

    #[test]
    fn push_rejects_out_of_order_bars() {
        let mut d = data(&[1, 2]);
        assert_eq!(d.push(Bar::flat(ts(2), 0.0)), Err(SeriesError::Unordered(2)));
        assert!(d.push(Bar::flat(ts(3), 0.0)).is_ok());
    }

    #[test]
    fn from_columns_checks_lengths() {
        let err = ChartData::from_columns(
            vec![ts(1), ts(2)],
            Series::from(vec![1.0, 2.0]),
            Series::from(vec![1.0, 2.0]),
            Series::from(vec![1.0]),
            Series::from(vec![1.0, 2.0]),
            Series::from(vec![1.0, 2.0]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            SeriesError::LengthMismatch {
                column: "low",
                expected: 2,
                actual: 1
            }
        );
    }

    #[test]
    fn merge_appends_newer_bars() {
        let mut d = data(&[1, 2, 3]);
        assert_eq!(d.merge(&data(&[4, 5])), Some(3));
        assert_eq!(d.len(), 5);
    }

    #[test]
    fn merge_replaces_overlapping_tail() {
        let mut d = data(&[1, 2, 3, 4]);
        let revised = ChartData::from_bars([Bar::flat(ts(3), 30.0), Bar::flat(ts(5), 50.0)]).unwrap();
        assert_eq!(d.merge(&revised), Some(2));
        assert_eq!(d.len(), 4);
        assert_eq!(d.close().get(2), Some(30.0));
        assert_eq!(d.close().get(3), Some(50.0));
        assert_eq!(d.close().get(1), Some(2.0));
    }

    #[test]
    fn merge_ignores_stale_data() {
        let mut d = data(&[1, 2, 3]);
        assert_eq!(d.merge(&data(&[1, 2])), None);
        assert_eq!(d.merge(&ChartData::new()), None);
        assert_eq!(d.len(), 3);
    }

    #[test]
    fn merge_into_empty_starts_at_zero() {
        let mut d = ChartData::new();
        assert_eq!(d.merge(&data(&[1, 2])), Some(0));
    }

    #[test]
    fn update_latest_close_widens_range() {
        let mut d = data(&[1, 2]);
        assert_eq!(d.update_latest_close(9.0), Some(1));
        assert_eq!(d.close().last(), Some(9.0));
        assert_eq!(d.high().last(), Some(9.0));
        assert_eq!(d.low().last(), Some(2.0));
        assert_eq!(ChartData::new().update_latest_close(1.0), None);
    }

    #[test]
    fn update_latest_close_with_infinity_leaves_range() {
        let mut d = data(&[1, 2]);
        assert_eq!(d.update_latest_close(f64::INFINITY), Some(1));
        assert_eq!(d.close().last(), None);
        assert_eq!(d.high().last(), Some(2.0));
    }

    #[test]
    fn remove_old_keeps_columns_aligned() {
        let mut d = data(&[1, 2, 3]);
        d.remove_old(2);
        assert_eq!(d.len(), 1);
        assert_eq!(d.close().as_slice(), &[Some(3.0)]);
        assert_eq!(d.latest_time(), Some(ts(3)));
    }
}
