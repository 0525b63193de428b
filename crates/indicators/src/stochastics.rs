use crate::error::{check_lengths, check_span, CalcError};
use crate::sma::Sma;
use crate::window::{trailing_max, trailing_min};
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{and_then2, map2, ratio, ChartData, Series, EPSILON};

/// Stochastic oscillator.
///
/// - %K = 100 * (close - lowest low) / (highest high - lowest low) over `k_span`
/// - %D = 100 * SMA(d_span, close - lowest low) / SMA(d_span, range), a ratio
///   of sums rather than an average of %K
/// - Slow %D = SMA(slow_d_span, %D)
///
/// A range within `EPSILON` of zero yields a gap.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stochastics {
    k_span: usize,
    d: Sma,
    slow_d: Sma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticsParams {
    pub k_span: usize,
    pub d_span: usize,
    pub slow_d_span: usize,
}

impl Default for StochasticsParams {
    fn default() -> Self {
        Self {
            k_span: 9,
            d_span: 3,
            slow_d_span: 3,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StochasticsResults {
    pub k: Series,
    pub d: Series,
    pub slow_d: Series,
    /// close - lowest low
    pub up: Series,
    /// highest high - lowest low
    pub range: Series,
    pub up_sma: Series,
    pub range_sma: Series,
}

impl Results for StochasticsResults {
    fn len(&self) -> usize {
        self.k.len()
    }

    fn truncate_from(&mut self, index: usize) {
        for s in self.all_mut() {
            s.truncate_from(index);
        }
    }

    fn remove_first(&mut self, count: usize) {
        for s in self.all_mut() {
            s.remove_first(count);
        }
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![
            ("k".to_string(), self.k.clone()),
            ("d".to_string(), self.d.clone()),
            ("slow_d".to_string(), self.slow_d.clone()),
        ]
    }
}

impl StochasticsResults {
    fn all_mut(&mut self) -> [&mut Series; 7] {
        [
            &mut self.k,
            &mut self.d,
            &mut self.slow_d,
            &mut self.up,
            &mut self.range,
            &mut self.up_sma,
            &mut self.range_sma,
        ]
    }

    fn computed(&self) -> usize {
        [&self.k, &self.d, &self.slow_d, &self.up, &self.range, &self.up_sma, &self.range_sma]
            .iter()
            .map(|s| s.len())
            .min()
            .unwrap_or(0)
    }
}

impl Stochastics {
    pub fn new(k_span: usize, d_span: usize, slow_d_span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            k_span: check_span("Stochastics", k_span)?,
            d: Sma::new(d_span)?,
            slow_d: Sma::new(slow_d_span)?,
        })
    }

    pub fn calculate(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
    ) -> Result<StochasticsResults, CalcError> {
        self.update(high, low, close, StochasticsResults::default())
    }

    pub fn update(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
        existing: StochasticsResults,
    ) -> Result<StochasticsResults, CalcError> {
        check_lengths("Stochastics", &[high.len(), low.len(), close.len()])?;
        Ok(self.extend(high, low, close, existing))
    }

    fn extend(
        &self,
        high: &Series,
        low: &Series,
        close: &Series,
        mut existing: StochasticsResults,
    ) -> StochasticsResults {
        let len = close.len();
        let start = existing.computed().min(len);
        existing.truncate_from(start);

        for i in start..len {
            let lowest = trailing_min(low, i, self.k_span);
            let highest = trailing_max(high, i, self.k_span);
            let up = map2(close.get(i), lowest, |c, l| c - l);
            let range = map2(highest, lowest, |h, l| h - l);
            existing.up.push(up);
            existing.range.push(range);
            existing
                .k
                .push(and_then2(up, range, |u, r| ratio(100.0 * u, r, EPSILON)));
        }

        existing.up_sma = self.d.update(&existing.up, std::mem::take(&mut existing.up_sma));
        existing.range_sma = self
            .d
            .update(&existing.range, std::mem::take(&mut existing.range_sma));
        for i in start..len {
            let d = and_then2(existing.up_sma.get(i), existing.range_sma.get(i), |u, r| {
                ratio(100.0 * u, r, EPSILON)
            });
            existing.d.push(d);
        }
        existing.slow_d = self.slow_d.update(&existing.d, std::mem::take(&mut existing.slow_d));
        existing
    }
}

impl Indicator for Stochastics {
    type Params = StochasticsParams;
    type Output = StochasticsResults;
    const NAME: &'static str = "stochastics";

    fn from_params(params: &StochasticsParams) -> Result<Self, CalcError> {
        Self::new(params.k_span, params.d_span, params.slow_d_span)
    }

    fn compute(&self, data: &ChartData, existing: Option<StochasticsResults>) -> StochasticsResults {
        self.extend(data.high(), data.low(), data.close(), existing.unwrap_or_default())
    }
}
