use crate::error::{check_span, CalcError};
use crate::Indicator;
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, PriceSource, Series};

/// Simple Moving Average (SMA).
///
/// The output is a gap until `span` consecutive valid values end at an
/// index; after that it follows `sma[i] = sma[i-1] + (src[i] - src[i-span]) / span`.
/// A gap in the source restarts the warm-up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Sma {
    span: usize,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for SmaParams {
    fn default() -> Self {
        Self {
            span: 25,
            source: PriceSource::Close,
        }
    }
}

impl SmaParams {
    pub fn new(span: usize) -> Self {
        Self {
            span,
            ..Self::default()
        }
    }
}

/// Recurrence state shared by the moving averages: either still summing the
/// first `span` values of a run, or continuing from the last output.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum Warmup {
    Accumulating { sum: f64, count: usize },
    Ready(f64),
}

impl Warmup {
    pub(crate) const EMPTY: Warmup = Warmup::Accumulating { sum: 0.0, count: 0 };

    /// Rebuilds the state that a full pass would hold after `src[..end]`,
    /// given the output previously produced at `end - 1`.
    ///
    /// A valid previous output continues the recurrence. Otherwise the
    /// valid run ending at `end - 1` is summed forward again, which is exactly
    /// what the full pass accumulated since that run is shorter than `span`.
    pub(crate) fn resume(src: &Series, end: usize, previous: Option<f64>, span: usize) -> Self {
        if let Some(last) = previous {
            return Warmup::Ready(last);
        }
        let mut start = end;
        while start > 0 && end - start < span - 1 && src.get(start - 1).is_some() {
            start -= 1;
        }
        let sum = (start..end).filter_map(|i| src.get(i)).sum();
        Warmup::Accumulating {
            sum,
            count: end - start,
        }
    }
}

impl Sma {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("SMA", span)?,
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

    /// Extends `existing` (a previous result over a prefix of `src`) to the
    /// full length of `src`. A result longer than the source is cut back
    /// first.
    pub fn update(&self, src: &Series, mut existing: Series) -> Series {
        existing.truncate_from(src.len());
        let start = existing.len();
        let previous = start.checked_sub(1).and_then(|i| existing.get(i));
        let mut state = Warmup::resume(src, start, previous, self.span);
        let span = self.span as f64;

        for i in start..src.len() {
            let Some(value) = src.get(i) else {
                state = Warmup::EMPTY;
                existing.push(None);
                continue;
            };
            let output = match state {
                Warmup::Ready(last) => match src.get_back(i, self.span) {
                    Some(old) => Some(last + (value - old) / span),
                    None => src.window_mean(i + 1 - self.span, self.span),
                },
                Warmup::Accumulating { sum, count } => {
                    let sum = sum + value;
                    let count = count + 1;
                    if count >= self.span {
                        Some(sum / span)
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

impl Indicator for Sma {
    type Params = SmaParams;
    type Output = Series;
    const NAME: &'static str = "sma";

    fn from_params(params: &SmaParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{assert_series_close, wave};

    #[test]
    fn test_sma_basic() {
        let sma = Sma::new(3).unwrap();
        let out = sma.calculate(&Series::from(vec![1.0, 2.0, 3.0, 4.0, 5.0]));
        assert_eq!(out.as_slice(), &[None, None, Some(2.0), Some(3.0), Some(4.0)]);
    }

    #[test]
    fn test_sma_rejects_zero_span() {
        assert_eq!(Sma::new(0), Err(CalcError::invalid_span("SMA", 0)));
    }

    #[test]
    fn test_sma_gap_restarts_warmup() {
        let sma = Sma::new(2).unwrap();
        let src: Series = vec![Some(1.0), Some(3.0), None, Some(5.0), Some(7.0), Some(9.0)].into();
        let out = sma.calculate(&src);
        assert_eq!(
            out.as_slice(),
            &[None, Some(2.0), None, None, Some(6.0), Some(8.0)]
        );
    }

    #[test]
    fn test_sma_update_matches_full() {
        let sma = Sma::new(5).unwrap();
        let values = wave(60);
        let full = sma.calculate(&Series::from(values.clone()));

        let mut result = Series::new();
        for n in 1..=values.len() {
            result = sma.update(&Series::from(&values[..n]), result);
        }
        assert_series_close(&result, &full);
    }

    #[test]
    fn test_sma_update_resumes_inside_warmup() {
        let sma = Sma::new(4).unwrap();
        let src: Series = vec![Some(1.0), None, Some(2.0), Some(4.0), Some(6.0), Some(8.0)].into();
        let full = sma.calculate(&src);

        let partial = sma.calculate(&src.subrange(0, 3).unwrap());
        assert_eq!(partial.last(), None);
        let resumed = sma.update(&src, partial);
        assert_eq!(resumed, full);
        assert_eq!(resumed.get(5), Some(5.0));
    }

    #[test]
    fn test_sma_update_truncates_longer_result() {
        let sma = Sma::new(2).unwrap();
        let long = sma.calculate(&Series::from(vec![1.0, 2.0, 3.0, 4.0]));
        let out = sma.update(&Series::from(vec![1.0, 2.0]), long);
        assert_eq!(out.len(), 2);
    }
}
