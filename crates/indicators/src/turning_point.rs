use crate::error::{check_lengths, check_rate, check_span, CalcError};
use crate::{Indicator, Results};
use serde::{Deserialize, Serialize};
use tchart_core::{ChartData, Series};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointKind {
    Top,
    Bottom,
}

/// An accepted peak or trough.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurningPoint {
    pub index: usize,
    pub value: f64,
    /// Price a move in the opposite direction has to clear before the next
    /// opposite point is accepted.
    pub reversal: f64,
    pub kind: PointKind,
}

/// What one detection step did to the point list, so that truncation can
/// undo it. `previous` is the point a replacement overwrote; `None` means the
/// step appended `index`.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Change {
    step: usize,
    index: usize,
    previous: Option<TurningPoint>,
}

/// Turning point detector.
///
/// The bar `span` bars before the newest one becomes a candidate top when
/// its high is the highest of the `2 * span + 1` bars centered on it, or a
/// candidate bottom when its low is the lowest. Candidates are accepted as
/// follows:
///
/// - the first candidate is always accepted;
/// - a top after a top replaces it when higher; a top after a bottom is
///   appended when it clears the bottom's reversal threshold;
/// - bottoms mirror tops.
///
/// Accepted points are never revoked by later bars, and a bar that is both
/// the highest and the lowest of its window counts as a top.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TurningPointDetector {
    span: usize,
    reversal_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TurningPointParams {
    pub span: usize,
    pub reversal_rate: f64,
}

impl Default for TurningPointParams {
    fn default() -> Self {
        Self {
            span: 10,
            reversal_rate: 0.5,
        }
    }
}

/// Accepted points plus the number of bars already examined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TurningPointResults {
    points: Vec<TurningPoint>,
    calculated: usize,
    journal: Vec<Change>,
}

impl TurningPointResults {
    pub fn points(&self) -> &[TurningPoint] {
        &self.points
    }

    pub fn calculated(&self) -> usize {
        self.calculated
    }

    fn append(&mut self, step: usize, point: TurningPoint) {
        self.points.push(point);
        self.journal.push(Change {
            step,
            index: point.index,
            previous: None,
        });
    }

    fn replace_last(&mut self, step: usize, point: TurningPoint) {
        if let Some(last) = self.points.last_mut() {
            let previous = std::mem::replace(last, point);
            self.journal.push(Change {
                step,
                index: point.index,
                previous: Some(previous),
            });
        }
    }

    /// Series of `calculated()` entries holding the value of each point of
    /// `kind` at its index.
    fn marks(&self, kind: PointKind) -> Series {
        let mut series = Series::repeat(None, self.calculated);
        for p in self.points.iter().filter(|p| p.kind == kind) {
            series.set(p.index, Some(p.value));
        }
        series
    }
}

impl Results for TurningPointResults {
    fn len(&self) -> usize {
        self.calculated
    }

    /// Undoes every detection step that read bars at or after `index`.
    fn truncate_from(&mut self, index: usize) {
        while let Some(change) = self.journal.last().copied() {
            if change.step < index {
                break;
            }
            self.journal.pop();
            match change.previous {
                Some(previous) => {
                    if let Some(last) = self.points.last_mut() {
                        *last = previous;
                    }
                }
                None => {
                    self.points.pop();
                }
            }
        }
        self.calculated = self.calculated.min(index);
    }

    fn remove_first(&mut self, count: usize) {
        self.points.retain(|p| p.index >= count);
        for p in &mut self.points {
            p.index -= count;
        }
        // Steps before the new first bar are never undone again, and neither
        // are steps that only touched dropped points. Undoing a replacement of
        // a dropped point removes the replacement.
        self.journal.retain(|c| c.step >= count && c.index >= count);
        for change in &mut self.journal {
            change.step -= count;
            change.index -= count;
            change.previous = change
                .previous
                .filter(|p| p.index >= count)
                .map(|p| TurningPoint {
                    index: p.index - count,
                    ..p
                });
        }
        self.calculated = self.calculated.saturating_sub(count);
    }

    fn columns(&self) -> Vec<(String, Series)> {
        vec![
            ("top".to_string(), self.marks(PointKind::Top)),
            ("bottom".to_string(), self.marks(PointKind::Bottom)),
        ]
    }
}

impl TurningPointDetector {
    pub fn new(span: usize, reversal_rate: f64) -> Result<Self, CalcError> {
        Ok(Self {
            span: check_span("TurningPoint", span)?,
            reversal_rate: check_rate("TurningPoint", "reversal_rate", reversal_rate, true)?,
        })
    }

    pub fn calculate(&self, high: &Series, low: &Series) -> Result<TurningPointResults, CalcError> {
        self.update(high, low, TurningPointResults::default())
    }

    pub fn update(
        &self,
        high: &Series,
        low: &Series,
        existing: TurningPointResults,
    ) -> Result<TurningPointResults, CalcError> {
        check_lengths("TurningPoint", &[high.len(), low.len()])?;
        Ok(self.extend(high, low, existing))
    }

    fn extend(&self, high: &Series, low: &Series, mut existing: TurningPointResults) -> TurningPointResults {
        let len = high.len();
        if existing.calculated > len {
            existing.truncate_from(len);
        }
        let span = self.span;
        let window = 2 * span + 1;

        for step in existing.calculated.max(2 * span)..len {
            let target = step - span;
            if let Some(point) = self.candidate(high, low, target, window) {
                self.accept(&mut existing, step, point, high, low);
            }
        }
        existing.calculated = len;
        existing
    }

    fn candidate(&self, high: &Series, low: &Series, target: usize, window: usize) -> Option<TurningPoint> {
        let from = target - self.span;
        let max = high.window_max(from, window)?;
        let min = low.window_min(from, window)?;
        let (h, l) = (high.get(target)?, low.get(target)?);

        let (kind, value) = if h == max.value {
            (PointKind::Top, h)
        } else if l == min.value {
            (PointKind::Bottom, l)
        } else {
            return None;
        };

        // The `span` bars ending two bars before the point.
        let opposite = target.checked_sub(self.span + 1).and_then(|lead| match kind {
            PointKind::Top => low.window_min(lead, self.span),
            PointKind::Bottom => high.window_max(lead, self.span),
        });
        let reversal = opposite.map_or(value, |o| value + (o.value - value) * self.reversal_rate);
        Some(TurningPoint {
            index: target,
            value,
            reversal,
            kind,
        })
    }

    fn accept(
        &self,
        results: &mut TurningPointResults,
        step: usize,
        point: TurningPoint,
        high: &Series,
        low: &Series,
    ) {
        let Some(last) = results.points.last().copied() else {
            results.append(step, point);
            return;
        };
        let last_value = match last.kind {
            PointKind::Top => high.get(last.index),
            PointKind::Bottom => low.get(last.index),
        }
        .unwrap_or(last.value);

        match (last.kind, point.kind) {
            (PointKind::Top, PointKind::Top) if point.value > last_value => {
                results.replace_last(step, point)
            }
            (PointKind::Bottom, PointKind::Bottom) if point.value < last_value => {
                results.replace_last(step, point)
            }
            (PointKind::Bottom, PointKind::Top) if point.value > last.reversal => {
                results.append(step, point)
            }
            (PointKind::Top, PointKind::Bottom) if point.value < last.reversal => {
                results.append(step, point)
            }
            _ => {}
        }
    }
}

impl Indicator for TurningPointDetector {
    type Params = TurningPointParams;
    type Output = TurningPointResults;
    const NAME: &'static str = "turning_point";

    fn from_params(params: &TurningPointParams) -> Result<Self, CalcError> {
        Self::new(params.span, params.reversal_rate)
    }

    fn compute(&self, data: &ChartData, existing: Option<TurningPointResults>) -> TurningPointResults {
        self.extend(data.high(), data.low(), existing.unwrap_or_default())
    }
}
