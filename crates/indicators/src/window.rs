use tchart_core::{Extremum, Series};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Max,
    Min,
}

/// Moving maximum or minimum over a trailing window with amortized O(1)
/// steps.
///
/// The tracker remembers where the current extremum sits. While that index
/// stays inside the window the next value only has to be compared against
/// it; the window is rescanned when the extremum slides out, when a step is
/// skipped, or after a gap.
#[derive(Debug, Clone, PartialEq)]
pub struct MovingExtremum {
    span: usize,
    direction: Direction,
    tracked: Option<Extremum>,
    last_index: Option<usize>,
}

impl MovingExtremum {
    pub fn max(span: usize) -> Self {
        Self::new(span, Direction::Max)
    }

    pub fn min(span: usize) -> Self {
        Self::new(span, Direction::Min)
    }

    fn new(span: usize, direction: Direction) -> Self {
        Self {
            span,
            direction,
            tracked: None,
            last_index: None,
        }
    }

    pub fn span(&self) -> usize {
        self.span
    }

    /// Extremum of `src[index + 1 - span ..= index]`, or a gap when the window
    /// is incomplete or contains a gap.
    pub fn at(&mut self, src: &Series, index: usize) -> Option<f64> {
        let continues = self.last_index.is_some_and(|last| last + 1 == index);
        self.last_index = Some(index);

        let Some(from) = (index + 1).checked_sub(self.span) else {
            self.tracked = None;
            return None;
        };
        let Some(value) = src.get(index) else {
            self.tracked = None;
            return None;
        };

        self.tracked = match self.tracked {
            Some(current) if continues && current.index >= from => {
                if self.beats(value, current.value) {
                    Some(Extremum { index, value })
                } else {
                    Some(current)
                }
            }
            _ => self.scan(src, from),
        };
        self.tracked.map(|e| e.value)
    }

    pub fn reset(&mut self) {
        self.tracked = None;
        self.last_index = None;
    }

    fn beats(&self, candidate: f64, best: f64) -> bool {
        match self.direction {
            Direction::Max => candidate > best,
            Direction::Min => candidate < best,
        }
    }

    fn scan(&self, src: &Series, from: usize) -> Option<Extremum> {
        match self.direction {
            Direction::Max => src.window_max(from, self.span),
            Direction::Min => src.window_min(from, self.span),
        }
    }
}

/// Maximum of the `span` values ending at `index`.
pub(crate) fn trailing_max(src: &Series, index: usize, span: usize) -> Option<f64> {
    let from = (index + 1).checked_sub(span)?;
    src.window_max(from, span).map(|e| e.value)
}

/// Minimum of the `span` values ending at `index`.
pub(crate) fn trailing_min(src: &Series, index: usize, span: usize) -> Option<f64> {
    let from = (index + 1).checked_sub(span)?;
    src.window_min(from, span).map(|e| e.value)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run(tracker: &mut MovingExtremum, src: &Series) -> Vec<Option<f64>> {
        (0..src.len()).map(|i| tracker.at(src, i)).collect()
    }

    #[test]
    fn test_moving_max_matches_scan() {
        let src = Series::from(vec![3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0, 6.0, 5.0, 3.0, 5.0]);
        let mut tracker = MovingExtremum::max(3);
        let expected: Vec<_> = (0..src.len()).map(|i| trailing_max(&src, i, 3)).collect();
        assert_eq!(run(&mut tracker, &src), expected);
        assert_eq!(expected[5], Some(9.0));
        assert_eq!(expected[8], Some(6.0));
    }

    #[test]
    fn test_moving_min_rescans_after_extremum_leaves() {
        let src = Series::from(vec![1.0, 5.0, 4.0, 3.0, 6.0]);
        let mut tracker = MovingExtremum::min(2);
        assert_eq!(
            run(&mut tracker, &src),
            vec![None, Some(1.0), Some(4.0), Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn test_gap_blanks_window() {
        let src: Series = vec![Some(2.0), None, Some(1.0), Some(3.0), Some(0.5)].into();
        let mut tracker = MovingExtremum::max(2);
        assert_eq!(
            run(&mut tracker, &src),
            vec![None, None, None, Some(3.0), Some(3.0)]
        );
    }

    #[test]
    fn test_skipped_step_rescans() {
        let src = Series::from(vec![9.0, 1.0, 2.0, 3.0]);
        let mut tracker = MovingExtremum::max(2);
        assert_eq!(tracker.at(&src, 1), Some(9.0));
        assert_eq!(tracker.at(&src, 3), Some(3.0));
    }
}
