use crate::error::{check_span, CalcError};
use crate::Indicator;
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, PriceSource, Series};

/// Moving-average difference (deviation rate): `(value - SMA) / SMA * 100`.
///
/// With `span == 1` the average is the value itself and the result is 0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaDifference {
    span: usize,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaDifferenceParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for MaDifferenceParams {
    fn default() -> Self {
        Self {
            span: 25,
            source: PriceSource::Close,
        }
    }
}

impl MaDifference {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("MA difference", span)?,
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

    pub fn update(&self, src: &Series, mut existing: Series) -> Series {
        existing.truncate_from(src.len());
        for i in existing.len()..src.len() {
            existing.push(self.at(src, i));
        }
        existing
    }

    fn at(&self, src: &Series, index: usize) -> Option<f64> {
        let value = src.get(index)?;
        if self.span == 1 {
            return Some(0.0);
        }
        let from = (index + 1).checked_sub(self.span)?;
        let mean = src.window_mean(from, self.span)?;
        if mean == 0.0 {
            return None;
        }
        Some((value - mean) / mean * 100.0)
    }
}

impl Indicator for MaDifference {
    type Params = MaDifferenceParams;
    type Output = Series;
    const NAME: &'static str = "ma_difference";

    fn from_params(params: &MaDifferenceParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
