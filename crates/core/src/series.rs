use crate::gap::{propagate_gap, valid, Sample};
use serde::{Deserialize, Serialize};

/// The position and value of a window extremum.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extremum {
    pub index: usize,
    pub value: f64,
}

/// A dense, order-preserving sequence of optional values.
///
/// Length is the number of bars processed. Values only grow by appending and
/// shrink by explicit truncation (from a given index, or from the front for
/// retention). NaN and infinities are never stored: pushing one stores a gap.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Series {
    values: Vec<Sample>,
}

impl Series {
    pub fn new() -> Self {
        Self { values: Vec::new() }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
        }
    }

    /// A series of `count` copies of `value`.
    pub fn repeat(value: Sample, count: usize) -> Self {
        Self {
            values: vec![value.and_then(valid); count],
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value at `index`; out-of-range indices read as a gap.
    #[inline]
    pub fn get(&self, index: usize) -> Sample {
        self.values.get(index).copied().flatten()
    }

    /// Value `offset` bars before `index`; reads before the start are gaps.
    #[inline]
    pub fn get_back(&self, index: usize, offset: usize) -> Sample {
        index.checked_sub(offset).and_then(|i| self.get(i))
    }

    pub fn first(&self) -> Sample {
        self.values.first().copied().flatten()
    }

    /// The last element's value (a gap when empty or when the last entry is a gap).
    pub fn last(&self) -> Sample {
        self.values.last().copied().flatten()
    }

    pub fn push(&mut self, value: Sample) {
        self.values.push(value.and_then(valid));
    }

    pub fn extend<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        self.values
            .extend(values.into_iter().map(|v| v.and_then(valid)));
    }

    /// Overwrites the value at `index`. Out-of-range writes are ignored.
    pub fn set(&mut self, index: usize, value: Sample) {
        if let Some(slot) = self.values.get_mut(index) {
            *slot = value.and_then(valid);
        }
    }

    pub fn pop(&mut self) -> Option<Sample> {
        self.values.pop()
    }

    /// Drops every element at or after `index`. No-op when `index >= len`.
    pub fn truncate_from(&mut self, index: usize) {
        self.values.truncate(index);
    }

    /// Drops up to `count` elements from the front.
    pub fn remove_first(&mut self, count: usize) {
        let count = count.min(self.values.len());
        self.values.drain(..count);
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Copy of the inclusive range `lo..=hi`, or `None` when `hi` is out of range.
    pub fn subrange(&self, lo: usize, hi: usize) -> Option<Series> {
        if hi >= self.values.len() || lo > hi {
            return None;
        }
        Some(Self {
            values: self.values[lo..=hi].to_vec(),
        })
    }

    /// Copy of everything from `from` to the end.
    pub fn tail_from(&self, from: usize) -> Option<Series> {
        if from >= self.values.len() {
            return None;
        }
        Some(Self {
            values: self.values[from..].to_vec(),
        })
    }

    /// Copy of the last `size` elements.
    pub fn last_n(&self, size: usize) -> Option<Series> {
        if size > self.values.len() {
            return None;
        }
        Some(Self {
            values: self.values[self.values.len() - size..].to_vec(),
        })
    }

    /// The `span` values starting at `from`, or `None` if the range runs past
    /// the end or contains a gap.
    pub fn window(&self, from: usize, span: usize) -> Option<Vec<f64>> {
        if span == 0 || from + span > self.values.len() {
            return None;
        }
        propagate_gap(self.values[from..from + span].iter().copied())
    }

    /// Maximum over `from..from + span`; the first index achieving it is
    /// reported. A gap anywhere in the range yields `None`.
    pub fn window_max(&self, from: usize, span: usize) -> Option<Extremum> {
        self.window_extremum(from, span, |candidate, best| candidate > best)
    }

    /// Minimum over `from..from + span`; see [`Series::window_max`].
    pub fn window_min(&self, from: usize, span: usize) -> Option<Extremum> {
        self.window_extremum(from, span, |candidate, best| candidate < best)
    }

    /// Sum over `from..from + span`, gap-propagating.
    pub fn window_sum(&self, from: usize, span: usize) -> Option<f64> {
        if span == 0 || from + span > self.values.len() {
            return None;
        }
        self.values[from..from + span]
            .iter()
            .try_fold(0.0, |acc, v| v.map(|v| acc + v))
    }

    /// Arithmetic mean over `from..from + span`, gap-propagating.
    pub fn window_mean(&self, from: usize, span: usize) -> Option<f64> {
        self.window_sum(from, span).map(|sum| sum / span as f64)
    }

    fn window_extremum(
        &self,
        from: usize,
        span: usize,
        better: impl Fn(f64, f64) -> bool,
    ) -> Option<Extremum> {
        if span == 0 || from + span > self.values.len() {
            return None;
        }
        let mut best: Option<Extremum> = None;
        for (offset, sample) in self.values[from..from + span].iter().enumerate() {
            let value = (*sample)?;
            match best {
                Some(b) if !better(value, b.value) => {}
                _ => {
                    best = Some(Extremum {
                        index: from + offset,
                        value,
                    })
                }
            }
        }
        best
    }

    pub fn iter(&self) -> impl Iterator<Item = Sample> + '_ {
        self.values.iter().copied()
    }

    pub fn as_slice(&self) -> &[Sample] {
        &self.values
    }

    pub fn into_vec(self) -> Vec<Sample> {
        self.values
    }
}

impl From<Vec<Sample>> for Series {
    fn from(values: Vec<Sample>) -> Self {
        values.into_iter().collect()
    }
}

impl From<Vec<f64>> for Series {
    fn from(values: Vec<f64>) -> Self {
        values.into_iter().map(Some).collect()
    }
}

impl From<&[f64]> for Series {
    fn from(values: &[f64]) -> Self {
        values.iter().copied().map(Some).collect()
    }
}

impl FromIterator<Sample> for Series {
    fn from_iter<T: IntoIterator<Item = Sample>>(iter: T) -> Self {
        let mut series = Series::new();
        series.extend(iter);
        series
    }
}
