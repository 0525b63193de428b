use crate::error::{check_span, CalcError};
use crate::Indicator;
use serde::{Deserialize, Serialize};
use tchart_core::{and_then2, ChartData, PriceSource, Series};

/// How the current value is compared with the value `span` bars back.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MomentumType {
    /// `value - value[i - span]`
    #[default]
    Subtract,
    /// `value / value[i - span] * 100`
    Divide,
}

/// Momentum (rate of change against `span` bars back).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Momentum {
    span: usize,
    kind: MomentumType,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MomentumParams {
    pub span: usize,
    pub kind: MomentumType,
    pub source: PriceSource,
}

impl Default for MomentumParams {
    fn default() -> Self {
        Self {
            span: 10,
            kind: MomentumType::Subtract,
            source: PriceSource::Close,
        }
    }
}

impl Momentum {
    pub fn new(span: usize, kind: MomentumType) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("Momentum", span)?,
            kind,
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
            let value = and_then2(src.get(i), src.get_back(i, self.span), |cur, base| {
                match self.kind {
                    MomentumType::Subtract => Some(cur - base),
                    MomentumType::Divide if base == 0.0 => None,
                    MomentumType::Divide => Some(cur / base * 100.0),
                }
            });
            existing.push(value);
        }
        existing
    }
}

impl Indicator for Momentum {
    type Params = MomentumParams;
    type Output = Series;
    const NAME: &'static str = "momentum";

    fn from_params(params: &MomentumParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span, params.kind)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
