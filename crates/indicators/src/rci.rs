use crate::error::{check_span, CalcError};
use crate::Indicator;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use tchart_core::{ChartData, PriceSource, Series};

/// Bounded window of values with their value ranks, kept current as values
/// enter and leave.
///
/// Invariants:
/// - holds at most `span` entries, oldest first, all from one gap-free run;
/// - each rank is `1 + (#values greater) + 0.5 * (#other values equal)`, so
///   the highest value has rank 1 and ties share the average of their ranks.
#[derive(Debug, Clone, PartialEq)]
pub struct RankRing {
    span: usize,
    entries: VecDeque<RankedValue>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct RankedValue {
    value: f64,
    rank: f64,
}

impl RankRing {
    pub fn new(span: usize) -> Self {
        Self {
            span,
            entries: VecDeque::with_capacity(span),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.entries.len() == self.span
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Adds the newest value, evicting the oldest one when the window is full.
    pub fn push(&mut self, value: f64) {
        if self.is_full() {
            if let Some(old) = self.entries.pop_front() {
                for e in &mut self.entries {
                    if e.value < old.value {
                        e.rank -= 1.0;
                    } else if e.value == old.value {
                        e.rank -= 0.5;
                    }
                }
            }
        }

        let mut rank = 1.0;
        for e in &mut self.entries {
            if e.value > value {
                rank += 1.0;
            } else if e.value < value {
                e.rank += 1.0;
            } else {
                rank += 0.5;
                e.rank += 0.5;
            }
        }
        self.entries.push_back(RankedValue { value, rank });
    }

    /// Value ranks from oldest to newest.
    pub fn ranks(&self) -> impl Iterator<Item = f64> + '_ {
        self.entries.iter().map(|e| e.rank)
    }

    /// Spearman correlation between time order (newest = 1) and value order,
    /// scaled to -100..=100. A gap until the window is full, and always for a
    /// window of one.
    pub fn correlation(&self) -> Option<f64> {
        if !self.is_full() || self.span < 2 {
            return None;
        }
        let n = self.span as f64;
        let squared: f64 = self
            .ranks()
            .enumerate()
            .map(|(i, rank)| {
                let position = (self.span - i) as f64;
                (position - rank).powi(2)
            })
            .sum();
        Some((1.0 - 6.0 * squared / (n * (n * n - 1.0))) * 100.0)
    }
}

/// Rank Correlation Index (RCI).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rci {
    span: usize,
    source: PriceSource,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RciParams {
    pub span: usize,
    pub source: PriceSource,
}

impl Default for RciParams {
    fn default() -> Self {
        Self {
            span: 9,
            source: PriceSource::Close,
        }
    }
}

impl Rci {
    pub fn new(span: usize) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("RCI", span)?,
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

    /// Rebuilds the ring from the `span - 1` values before the first new
    /// index, then continues.
    pub fn update(&self, src: &Series, mut existing: Series) -> Series {
        existing.truncate_from(src.len());
        let start = existing.len();
        let mut ring = RankRing::new(self.span);

        for i in start.saturating_sub(self.span - 1)..src.len() {
            match src.get(i) {
                Some(value) => ring.push(value),
                None => ring.clear(),
            }
            if i >= start {
                existing.push(ring.correlation());
            }
        }
        existing
    }
}

impl Indicator for Rci {
    type Params = RciParams;
    type Output = Series;
    const NAME: &'static str = "rci";

    fn from_params(params: &RciParams) -> Result<Self, CalcError> {
        Ok(Self::new(params.span)?.with_source(params.source))
    }

    fn compute(&self, data: &ChartData, existing: Option<Series>) -> Series {
        self.update(data.source(self.source), existing.unwrap_or_default())
    }
}
