pub mod bollinger;
pub mod cache;
pub mod dmi;
pub mod ema;
pub mod envelope;
pub mod error;
pub mod ichimoku;
pub mod ma_difference;
pub mod macd;
pub mod momentum;
pub mod parabolic;
pub mod psychological;
pub mod rci;
pub mod rsi;
pub mod set;
pub mod settings;
pub mod sma;
pub mod std_dev;
pub mod stochastics;
pub mod turning_point;
pub mod window;

pub use cache::IndicatorCache;
pub use error::CalcError;
pub use set::IndicatorSet;
pub use settings::ChartSettings;

use std::fmt::Debug;
use tchart_core::{ChartData, Series};

/// A bundle of parallel result series produced by one indicator.
///
/// Results are owned values: callers mutate them only through these methods,
/// never by writing into the series directly.
pub trait Results {
    /// Number of source bars the results cover.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Rolls back everything derived from bars at or after `index`, so the
    /// next update recomputes that suffix. No-op when `index >= len()`.
    fn truncate_from(&mut self, index: usize);

    /// Drops the oldest `count` bars (retention windowing).
    fn remove_first(&mut self, count: usize);

    /// Named plotted lines, for hosts that render or export the results.
    fn columns(&self) -> Vec<(String, Series)>;
}

impl Results for Series {
    fn len(&self) -> usize {
        Series::len(self)
    }

    fn truncate_from(&mut self, index: usize) {
        Series::truncate_from(self, index);
    }

    fn remove_first(&mut self, count: usize) {
        Series::remove_first(self, count);
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![(String::new(), self.clone())]
    }
}

/// An indicator that can be driven from an OHLCV bundle.
///
/// `compute` with `existing = None` is a full calculation. With an existing
/// result it computes only the bars past `existing.len()`, reusing the state
/// retained in the result. Callers that revised source data must first call
/// [`Results::truncate_from`] with the revision boundary.
pub trait Indicator: Sized {
    type Params: Clone + PartialEq + Debug;
    type Output: Results + Clone + Debug;

    /// Short identifier used in logs and exported column names.
    const NAME: &'static str;

    /// Validates the parameters and builds the calculator.
    fn from_params(params: &Self::Params) -> Result<Self, CalcError>;

    fn compute(&self, data: &ChartData, existing: Option<Self::Output>) -> Self::Output;
}

#[cfg(test)]
pub(crate) mod test_util {
    use chrono::{TimeZone, Utc};
    use tchart_core::{Bar, ChartData, Series};

    pub fn assert_close(actual: Option<f64>, expected: f64) {
        match actual {
            Some(v) => assert!(
                (v - expected).abs() < 1e-9,
                "expected {expected}, got {v}"
            ),
            None => panic!("expected {expected}, got a gap"),
        }
    }

    pub fn assert_series_close(actual: &Series, expected: &Series) {
        assert_eq!(actual.len(), expected.len(), "length differs");
        for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
            match (a, e) {
                (Some(a), Some(e)) => {
                    assert!((a - e).abs() < 1e-9, "index {i}: {a} vs {e}")
                }
                (None, None) => {}
                _ => panic!("index {i}: {a:?} vs {e:?}"),
            }
        }
    }

    /// Bars with the given high/low/close and open equal to close.
    pub fn hlc(high: &[f64], low: &[f64], close: &[f64]) -> ChartData {
        let bars = (0..close.len()).map(|i| Bar {
            timestamp: Utc.timestamp_opt(i as i64 * 60, 0).unwrap(),
            open: close[i],
            high: high[i],
            low: low[i],
            close: close[i],
            volume: 100.0,
        });
        ChartData::from_bars(bars).unwrap()
    }

    pub fn closes(close: &[f64]) -> ChartData {
        hlc(close, close, close)
    }

    /// A deterministic wavy price path.
    pub fn wave(len: usize) -> Vec<f64> {
        (0..len)
            .map(|i| {
                let x = i as f64;
                100.0 + 10.0 * (x / 5.0).sin() + 3.0 * (x / 1.7).cos() + x * 0.1
            })
            .collect()
    }
}
