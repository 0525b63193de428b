use crate::error::{check_span, CalcError};
use crate::Indicator;
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, PriceSource, Series};

/// Psychological line: percentage of the last `span` bars that closed above
/// the previous bar.
///
/// Needs `span + 1` consecutive valid values, so the first output is at
/// index `span`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Psychological {
    span: usize,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PsychologicalParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for PsychologicalParams {
    fn default() -> Self {
        Self {
            span: 12,
            source: PriceSource::Close,
        }
    }
}

impl Psychological {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("Psychological", span)?,
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
        let from = index.checked_sub(self.span)?;
        let window = src.window(from, self.span + 1)?;
        let ups = window.windows(2).filter(|pair| pair[1] > pair[0]).count();
        Some(ups as f64 * 100.0 / self.span as f64)
    }
}

impl Indicator for Psychological {
    type Params = PsychologicalParams;
    type Output = Series;
    const NAME: &'static str = "psychological";

    fn from_params(params: &PsychologicalParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
