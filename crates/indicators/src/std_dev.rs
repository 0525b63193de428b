use crate::error::{check_span, CalcError};
use crate::Indicator;
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, PriceSource, Series};

/// Population standard deviation over the trailing `span` values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StdDev {
    span: usize,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StdDevParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for StdDevParams {
    fn default() -> Self {
        Self {
            span: 20,
            source: PriceSource::Close,
        }
    }
}

/// `sqrt(sum((x - mean)^2) / span)` over the window ending at `index`, or a
/// gap when the window is incomplete or holds a gap.
pub(crate) fn population_std(src: &Series, index: usize, span: usize, mean: f64) -> Option<f64> {
    let from = (index + 1).checked_sub(span)?;
    let values = src.window(from, span)?;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / span as f64;
    Some(variance.sqrt())
}

impl StdDev {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("StdDev", span)?,
            source: PriceSource::Close,
        })
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn calculate(&self, src: &Series) -> Series {
        self.update(src, Series::new())
    }

    /// Each output depends only on its own window, so only indices past the
    /// existing result are evaluated.
    pub fn update(&self, src: &Series, mut existing: Series) -> Series {
        existing.truncate_from(src.len());
        for i in existing.len()..src.len() {
            existing.push(self.at(src, i));
        }
        existing
    }

    fn at(&self, src: &Series, index: usize) -> Option<f64> {
        let from = (index + 1).checked_sub(self.span)?;
        let mean = src.window_mean(from, self.span)?;
        population_std(src, index, self.span, mean)
    }
}

impl Indicator for StdDev {
    type Params = StdDevParams;
    type Output = Series;
    const NAME: &'static str = "std_dev";

    fn from_params(params: &StdDevParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::assert_close;

    #[test]
    fn test_std_dev_population() {
        let sd = StdDev::new(4).unwrap();
        let out = sd.calculate(&Series::from(vec![2.0, 4.0, 4.0, 4.0, 5.0]));
        assert_eq!(out.get(2), None);
        // mean 3.5, deviations 2.25 + 0.25 * 3 = 3.0, / 4 = 0.75
        assert_close(out.get(3), 0.75f64.sqrt());
        // window 4,4,4,5: mean 4.25, 0.0625 * 3 + 0.5625 = 0.75, / 4
        assert_close(out.get(4), 0.1875f64.sqrt());
    }

    #[test]
    fn test_std_dev_gap_in_window() {
        let sd = StdDev::new(2).unwrap();
        let src: Series = vec![Some(1.0), None, Some(3.0), Some(5.0)].into();
        let out = sd.calculate(&src);
        assert_eq!(&out.as_slice()[..3], &[None, None, None]);
        assert_close(out.get(3), 1.0);
    }

    #[test]
    fn test_std_dev_span_one_is_zero() {
        let sd = StdDev::new(1).unwrap();
        let out = sd.calculate(&Series::from(vec![7.0, 9.0]));
        assert_eq!(out.as_slice(), &[Some(0.0), Some(0.0)]);
    }
}
