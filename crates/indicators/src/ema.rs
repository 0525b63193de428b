use crate::error::{check_span, CalcError};
use crate::sma::Warmup;
use crate::Indicator;
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, PriceSource, Series};

/// Exponential Moving Average (EMA).
///
/// Seeded with the simple average of the first `span` valid values of a run,
/// then `ema[i] = ema[i-1] + 2 / (span + 1) * (src[i] - ema[i-1])`.
/// A gap discards the state entirely; the next run seeds again.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ema {
    span: usize,
    multiplier: f64,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for EmaParams {
    fn default() -> Self {
        Self {
            span: 25,
            source: PriceSource::Close,
        }
    }
}

impl EmaParams {
    pub fn new(span: usize) -> Self {
        Self {
            span,
            ..Self::default()
        }
    }
}

impl Ema {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        let span = check_span("EMA", span)?;
        Ok(Self {
            span,
            multiplier: 2.0 / (span as f64 + 1.0),
            source: PriceSource::Close,
        })
    }

    pub fn with_source(mut self, source: PriceSource) -> Self {
        self.source = source;
        self
    }

    pub fn span(&self) -> usize {
        self.span
    }

    pub fn calculate(&self, src: &Series) -> Series {
        self.update(src, Series::new())
    }

    /// Extends `existing` to the length of `src`, continuing from its last
    /// value or re-deriving the warm-up sum of the current run.
    pub fn update(&self, src: &Series, mut existing: Series) -> Series {
        existing.truncate_from(src.len());
        let start = existing.len();
        let previous = start.checked_sub(1).and_then(|i| existing.get(i));
        let mut state = Warmup::resume(src, start, previous, self.span);

        for i in start..src.len() {
            let Some(value) = src.get(i) else {
                state = Warmup::EMPTY;
                existing.push(None);
                continue;
            };
            let output = match state {
                Warmup::Ready(last) => Some(last + self.multiplier * (value - last)),
                Warmup::Accumulating { sum, count } => {
                    let sum = sum + value;
                    let count = count + 1;
                    if count >= self.span {
                        Some(sum / self.span as f64)
                    } else {
                        state = Warmup::Accumulating { sum, count };
                        None
                    }
                }
            };
            if let Some(out) = output {
                state = Warmup::Ready(out);
            }
            existing.push(output);
        }
        existing
    }
}

impl Indicator for Ema {
    type Params = EmaParams;
    type Output = Series;
    const NAME: &'static str = "ema";

    fn from_params(params: &EmaParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
