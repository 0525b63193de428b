use crate::error::CalcError;
use crate::{Indicator, Results};
use tchart_core::{ChartData, Memoized};
use tracing::{debug, trace};

/// Cached result of one indicator, tagged with the parameters it was
/// computed with.
///
/// Each refresh applies, in order: discard on parameter change, roll back
/// the revised suffix, compute what is missing.
#[derive(Debug, Clone)]
pub struct IndicatorCache<I: Indicator> {
    memo: Memoized<I::Params, I::Output>,
}

impl<I: Indicator> Default for IndicatorCache<I> {
    fn default() -> Self {
        Self {
            memo: Memoized::default(),
        }
    }
}

impl<I: Indicator> IndicatorCache<I> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Brings the cached result up to date with `data`.
    ///
    /// `revised_from` is the first bar whose data changed since the previous
    /// refresh; `None` means bars were only appended.
    pub fn refresh(
        &mut self,
        params: &I::Params,
        data: &ChartData,
        revised_from: Option<usize>,
    ) -> Result<&I::Output, CalcError> {
        let indicator = I::from_params(params)?;

        if self.memo.is_stale(params) {
            debug!(indicator = I::NAME, ?params, "Parameters changed, discarding cached result");
        }
        let mut existing = self.memo.take(params);
        if let (Some(result), Some(from)) = (existing.as_mut(), revised_from) {
            if from < result.len() {
                debug!(indicator = I::NAME, from, cached = result.len(), "Rolling back revised bars");
                result.truncate_from(from);
            }
        }

        let cached = existing.as_ref().map_or(0, |r| r.len());
        trace!(indicator = I::NAME, cached, bars = data.len(), "Updating indicator");
        let updated = indicator.compute(data, existing);
        Ok(self.memo.store(params.clone(), updated))
    }

    /// Drops the oldest `count` bars from the cached result.
    pub fn remove_old(&mut self, count: usize) {
        if let Some(result) = self.memo.peek_mut() {
            result.remove_first(count);
        }
    }

    pub fn get(&self, params: &I::Params) -> Option<&I::Output> {
        self.memo.get(params)
    }

    /// Parameters the cached result was computed with.
    pub fn params(&self) -> Option<&I::Params> {
        self.memo.params()
    }

    /// The cached result regardless of parameters.
    pub fn latest(&self) -> Option<&I::Output> {
        self.memo.peek()
    }

    pub fn clear(&mut self) {
        self.memo.invalidate();
    }
}
