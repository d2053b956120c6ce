//! Nearest-value walk over a node's numeric children
//!
//! The target value is the digit run in the target string just below the
//! node. Candidates are visited in ascending order of absolute difference
//! from it, ties going to the lower value. The walk only admits children
//! whose difference is smaller than the width of the target's magnitude
//! range and whose value has no more digits than the target run.

use crate::node::NumericChild;

/// A magnitude range of numeric target values
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NumericRange {
    /// Inclusive lower bound
    pub lower: i32,
    /// Exclusive upper bound
    pub upper: i32,
}

/// Fixed magnitude ranges, covering every non-negative `i16`
pub const RANGES: [NumericRange; 4] = [
    NumericRange {
        lower: 0,
        upper: 10,
    },
    NumericRange {
        lower: 10,
        upper: 100,
    },
    NumericRange {
        lower: 100,
        upper: 1000,
    },
    NumericRange {
        lower: 1000,
        upper: i16::MAX as i32 + 1,
    },
];

impl NumericRange {
    /// The range containing `value`
    pub fn containing(value: i32) -> Option<Self> {
        RANGES
            .into_iter()
            .find(|range| range.lower <= value && value < range.upper)
    }

    /// Number of values in the range
    pub const fn width(&self) -> i32 {
        self.upper - self.lower
    }
}

/// Digit run read from the target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetNumber {
    /// Parsed value
    pub value: i32,
    /// Length of the run in bytes, leading zeros included
    pub digits: usize,
}

/// Parse the maximal ASCII digit run starting at `start`
///
/// Returns `None` when there is no digit at `start` or the value does not
/// fit an `i16`.
pub fn target_value(target: &[u8], start: usize) -> Option<TargetNumber> {
    let digits = target.get(start..)?;
    let run = digits.iter().take_while(|b| b.is_ascii_digit()).count();
    if run == 0 {
        return None;
    }

    let mut value: i32 = 0;
    for &digit in &digits[..run] {
        value = value
            .checked_mul(10)?
            .checked_add(i32::from(digit - b'0'))?;
        if value > i32::from(i16::MAX) {
            return None;
        }
    }
    Some(TargetNumber { value, digits: run })
}

/// Decimal digits needed to write `value`
const fn digit_count(value: i16) -> usize {
    match value.unsigned_abs().checked_ilog10() {
        Some(log) => log as usize + 1,
        None => 1,
    }
}

/// Position of a nearest-first walk, independent of the children slice
///
/// The same slice must be passed to every [`NumericCursor::advance`] call.
#[derive(Debug, Clone, Copy)]
pub struct NumericCursor {
    target: TargetNumber,
    bound: i32,
    low: Option<usize>,
    high: usize,
}

impl NumericCursor {
    /// Start a walk over `children` (sorted ascending) outward from `target`
    pub fn new(children: &[NumericChild], target: TargetNumber) -> Self {
        let value = target.value;
        let bound = NumericRange::containing(value).map_or(0, |range| range.width());
        let start = children.partition_point(|child| i32::from(child.value) < value);
        let exact = children
            .get(start)
            .is_some_and(|child| i32::from(child.value) == value);

        let (low, high) = if exact {
            (Some(start), start + 1)
        } else {
            (start.checked_sub(1), start)
        };

        Self {
            target,
            bound,
            low,
            high,
        }
    }

    /// A child is admitted when it lies within the range width of the target
    /// and is written with no more digits than the target run holds
    fn candidate(&self, children: &[NumericChild], index: Option<usize>) -> Option<(usize, u32)> {
        let index = index?;
        let child = children.get(index)?;
        let difference = (i32::from(child.value) - self.target.value).abs();
        (difference < self.bound && digit_count(child.value) <= self.target.digits)
            .then_some((index, difference.unsigned_abs()))
    }

    /// Index and difference of the next child, nearest first
    ///
    /// Ties go to the lower value.
    pub fn advance(&mut self, children: &[NumericChild]) -> Option<(usize, u32)> {
        let low = self.candidate(children, self.low);
        let high = self.candidate(children, Some(self.high));

        let take_low = match (low, high) {
            (Some((_, low_diff)), Some((_, high_diff))) => low_diff <= high_diff,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => return None,
        };

        if take_low {
            self.low = self.low.and_then(|i| i.checked_sub(1));
            low
        } else {
            self.high += 1;
            high
        }
    }
}

/// Iterator yielding `(child, difference)` nearest-first
#[derive(Debug, Clone)]
pub struct NumericWalk<'a> {
    children: &'a [NumericChild],
    cursor: NumericCursor,
}

impl<'a> NumericWalk<'a> {
    /// Walk `children` (sorted ascending) outward from `target`
    pub fn new(children: &'a [NumericChild], target: TargetNumber) -> Self {
        Self {
            children,
            cursor: NumericCursor::new(children, target),
        }
    }
}

impl<'a> Iterator for NumericWalk<'a> {
    type Item = (&'a NumericChild, u32);

    fn next(&mut self) -> Option<Self::Item> {
        let (index, difference) = self.cursor.advance(self.children)?;
        Some((self.children.get(index)?, difference))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn children(values: &[i16]) -> Vec<NumericChild> {
        values
            .iter()
            .enumerate()
            .map(|(i, &value)| NumericChild {
                value,
                related_offset: i as u32,
            })
            .collect()
    }

    fn number(value: i32) -> TargetNumber {
        TargetNumber {
            value,
            digits: value.to_string().len(),
        }
    }

    fn order(values: &[i16], target: i32) -> Vec<(i16, u32)> {
        order_within(values, number(target))
    }

    fn order_within(values: &[i16], target: TargetNumber) -> Vec<(i16, u32)> {
        let children = children(values);
        NumericWalk::new(&children, target)
            .map(|(child, diff)| (child.value, diff))
            .collect()
    }

    #[test]
    fn test_nearest_first() {
        assert_eq!(order(&[8, 11, 15], 10), vec![(11, 1), (8, 2), (15, 5)]);
    }

    #[test]
    fn test_tie_prefers_lower() {
        assert_eq!(order(&[9, 11], 10), vec![(9, 1), (11, 1)]);
        assert_eq!(order(&[5, 7], 6), vec![(5, 1), (7, 1)]);
    }

    #[test]
    fn test_exact_value_first() {
        assert_eq!(order(&[3, 4, 5], 4), vec![(4, 0), (3, 1), (5, 1)]);
    }

    #[test]
    fn test_range_width_bounds_the_walk() {
        // Target 5 is in [0, 10): nothing 10 or more away is admitted
        assert_eq!(order(&[1, 15, 16, 200], 5), vec![(1, 4)]);
        assert!(order(&[500], 5).is_empty());
        assert_eq!(order(&[950, 1200], 1000), vec![(950, 50), (1200, 200)]);
    }

    #[test]
    fn test_longer_values_than_the_run_are_skipped() {
        // "9" cannot stand for 11 or 10 even though both are within the width
        assert_eq!(order(&[8, 10, 11], 9), vec![(8, 1)]);
        assert!(order(&[12], 3).is_empty());

        // Leading zeros count towards the run
        let padded = TargetNumber {
            value: 9,
            digits: 2,
        };
        assert_eq!(order_within(&[8, 10, 11], padded), vec![(8, 1), (10, 1), (11, 2)]);
    }

    #[test]
    fn test_digit_count() {
        assert_eq!(digit_count(0), 1);
        assert_eq!(digit_count(9), 1);
        assert_eq!(digit_count(10), 2);
        assert_eq!(digit_count(999), 3);
        assert_eq!(digit_count(i16::MAX), 5);
    }

    #[test]
    fn test_empty_children() {
        assert!(order(&[], 3).is_empty());
    }

    #[test]
    fn test_target_value() {
        assert_eq!(target_value(b"abc123x", 3), Some(number(123)));
        assert_eq!(target_value(b"v6", 1), Some(number(6)));
        assert_eq!(
            target_value(b"v007", 1),
            Some(TargetNumber {
                value: 7,
                digits: 3
            })
        );
        assert_eq!(target_value(b"v", 1), None);
        assert_eq!(target_value(b"vx1", 1), None);
        assert_eq!(target_value(b"32767", 0), Some(number(32767)));
        assert_eq!(target_value(b"32768", 0), None);
        assert_eq!(target_value(b"99999999999", 0), None);
    }

    #[test]
    fn test_ranges() {
        assert_eq!(NumericRange::containing(0).unwrap().width(), 10);
        assert_eq!(NumericRange::containing(99).unwrap().lower, 10);
        assert_eq!(NumericRange::containing(100).unwrap().width(), 900);
        assert_eq!(NumericRange::containing(32767).unwrap().lower, 1000);
        assert!(NumericRange::containing(32768).is_none());
        assert!(NumericRange::containing(-1).is_none());
    }

    proptest! {
        #[test]
        fn walk_is_nearest_first_and_complete(
            mut values in prop::collection::btree_set(0i16..2000, 0..40)
                .prop_map(|set| set.into_iter().collect::<Vec<_>>()),
            target in 0i32..2000,
        ) {
            values.sort_unstable();
            let visited = order(&values, target);
            let bound = NumericRange::containing(target).unwrap().width();

            // Differences never decrease; equal differences go low then high
            for pair in visited.windows(2) {
                prop_assert!(pair[0].1 <= pair[1].1);
                if pair[0].1 == pair[1].1 {
                    prop_assert!(pair[0].0 < pair[1].0);
                }
            }

            // Every admitted child is visited exactly once
            let digits = target.to_string().len();
            let expected: Vec<i16> = values
                .iter()
                .copied()
                .filter(|&v| (i32::from(v) - target).abs() < bound)
                .filter(|&v| v.to_string().len() <= digits)
                .collect();
            let mut seen: Vec<i16> = visited.iter().map(|&(v, _)| v).collect();
            seen.sort_unstable();
            prop_assert_eq!(seen, expected);
        }
    }
}
