use crate::error::CalcError;
use crate::sma::Sma;
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{and_then2, ratio, ChartData, PriceSource, Series, EPSILON};

/// Relative Strength Index (RSI).
///
/// Per-bar gains and losses are averaged over `span` bars with the SMA
/// recurrence, and `rsi = 100 * avg_gain / (avg_gain + avg_loss)`. Averages
/// are floored at zero against rounding drift, and a window with no movement
/// is a gap. The first bar contributes a zero gain and loss, so the first value appears at
/// index `span - 1`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rsi {
    average: Sma,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for RsiParams {
    fn default() -> Self {
        Self {
            span: 14,
            source: PriceSource::Close,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RsiResults {
    pub rsi: Series,
    pub gains: Series,
    pub losses: Series,
    pub avg_gain: Series,
    pub avg_loss: Series,
}

impl Results for RsiResults {
    fn len(&self) -> usize {
        self.rsi.len()
    }

    fn truncate_from(&mut self, index: usize) {
        self.rsi.truncate_from(index);
        self.gains.truncate_from(index);
        self.losses.truncate_from(index);
        self.avg_gain.truncate_from(index);
        self.avg_loss.truncate_from(index);
    }

    fn remove_first(&mut self, count: usize) {
        self.rsi.remove_first(count);
        self.gains.remove_first(count);
        self.losses.remove_first(count);
        self.avg_gain.remove_first(count);
        self.avg_loss.remove_first(count);
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![("rsi".to_string(), self.rsi.clone())]
    }
}

/// Gain and loss of bar `index` against the previous bar.
fn change(src: &Series, index: usize) -> (Option<f64>, Option<f64>) {
    if index == 0 {
        let zero = src.get(0).map(|_| 0.0);
        return (zero, zero);
    }
    let diff = and_then2(src.get(index), src.get(index - 1), |cur, prev| Some(cur - prev));
    (diff.map(|d| d.max(0.0)), diff.map(|d| (-d).max(0.0)))
}

impl Rsi {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        Sma::new(span)
            .map(|average| Self {
                average,
                source: PriceSource::Close,
            })
            .map_err(|_| CalcError::invalid_span("RSI", span))
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn calculate(&self, src: &Series) -> RsiResults {
        self.update(src, RsiResults::default())
    }

    pub fn update(&self, src: &Series, mut existing: RsiResults) -> RsiResults {
        existing.truncate_from(src.len());
        let start = existing.len().min(existing.gains.len()).min(existing.losses.len());
        existing.truncate_from(start);

        for i in start..src.len() {
            let (gain, loss) = change(src, i);
            existing.gains.push(gain);
            existing.losses.push(loss);
        }
        existing.avg_gain = self
            .average
            .update(&existing.gains, std::mem::take(&mut existing.avg_gain));
        existing.avg_loss = self
            .average
            .update(&existing.losses, std::mem::take(&mut existing.avg_loss));

        for i in start..src.len() {
            let value = and_then2(existing.avg_gain.get(i), existing.avg_loss.get(i), |g, l| {
                let (g, l) = (g.max(0.0), l.max(0.0));
                ratio(100.0 * g, g + l, EPSILON)
            });
            existing.rsi.push(value);
        }
        existing
    }
}

impl Indicator for Rsi {
    type Params = RsiParams;
    type Output = RsiResults;
    const NAME: &'static str = "rsi";

    fn from_params(params: &RsiParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<RsiResults>) -> RsiResults {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
