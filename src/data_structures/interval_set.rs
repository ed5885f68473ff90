/*!

  An `IntervalSet` is a set of integers stored as a sorted vector of disjoint, non-adjacent,
  closed intervals. It is the general representation for holey variable domains, and also
  stores the proof lines recorded against each proof level so that a whole level can be
  deleted with a handful of `del range` directives.

*/

use num_traits::PrimInt;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Default)]
pub struct IntervalSet<T> {
  // (low, high) inclusive at both ends, sorted, pairwise disjoint and non-adjacent
  intervals: Vec<(T, T)>,
}

impl<T: PrimInt> IntervalSet<T> {
  /// The set containing every value in `[lower, upper]`. Empty if `lower > upper`.
  pub fn new(lower: T, upper: T) -> Self {
    if lower > upper {
      Self { intervals: Vec::new() }
    } else {
      Self { intervals: vec![(lower, upper)] }
    }
  }

  pub fn empty() -> Self {
    Self { intervals: Vec::new() }
  }

  pub fn is_empty(&self) -> bool {
    self.intervals.is_empty()
  }

  /// Smallest member. The caller must know the set is non-empty.
  pub fn lower(&self) -> T {
    self.intervals[0].0
  }

  /// Largest member. The caller must know the set is non-empty.
  pub fn upper(&self) -> T {
    self.intervals[self.intervals.len() - 1].1
  }

  pub fn contains(&self, value: T) -> bool {
    self.interval_index_of(value).is_ok()
  }

  /// How many values are in the set.
  pub fn count(&self) -> T {
    self
      .intervals
      .iter()
      .fold(T::zero(), |acc, &(lo, hi)| acc + (hi - lo) + T::one())
  }

  /// Binary search: `Ok(i)` if `value` lies inside interval `i`, `Err(i)` with the insertion
  /// point otherwise.
  fn interval_index_of(&self, value: T) -> Result<usize, usize> {
    self.intervals.binary_search_by(|&(lo, hi)| {
      if value < lo {
        std::cmp::Ordering::Greater
      } else if value > hi {
        std::cmp::Ordering::Less
      } else {
        std::cmp::Ordering::Equal
      }
    })
  }

  /// Inserts a single value, merging with neighbouring intervals where they become adjacent.
  pub fn insert(&mut self, value: T) {
    match self.interval_index_of(value) {
      Ok(_) => {}
      Err(at) => {
        let merge_left = at > 0 && self.intervals[at - 1].1 + T::one() == value;
        let merge_right = at < self.intervals.len() && self.intervals[at].0 == value + T::one();
        match (merge_left, merge_right) {
          (true, true) => {
            self.intervals[at - 1].1 = self.intervals[at].1;
            self.intervals.remove(at);
          }
          (true, false) => self.intervals[at - 1].1 = value,
          (false, true) => self.intervals[at].0 = value,
          (false, false) => self.intervals.insert(at, (value, value)),
        }
      }
    }
  }

  /// Fast path for monotonically increasing insertion, as done when recording proof lines.
  pub fn insert_at_end(&mut self, value: T) {
    if let Some(last) = self.intervals.last_mut() {
      if last.1 + T::one() == value {
        last.1 = value;
        return;
      }
      debug_assert!(value > last.1);
    }
    self.intervals.push((value, value));
  }

  /// Removes a single value, splitting an interval if it lands strictly inside one.
  pub fn erase(&mut self, value: T) {
    if let Ok(at) = self.interval_index_of(value) {
      let (lo, hi) = self.intervals[at];
      if lo == hi {
        self.intervals.remove(at);
      } else if value == lo {
        self.intervals[at].0 = lo + T::one();
      } else if value == hi {
        self.intervals[at].1 = hi - T::one();
      } else {
        self.intervals[at].1 = value - T::one();
        self.intervals.insert(at + 1, (value + T::one(), hi));
      }
    }
  }

  /// Removes every value strictly below `value`.
  pub fn erase_less_than(&mut self, value: T) {
    let keep_from = match self.interval_index_of(value) {
      Ok(at) => {
        if self.intervals[at].0 < value {
          self.intervals[at].0 = value;
        }
        at
      }
      Err(at) => at,
    };
    if keep_from > 0 {
      self.intervals.drain(..keep_from);
    }
  }

  /// Removes every value strictly above `value`.
  pub fn erase_greater_than(&mut self, value: T) {
    match self.interval_index_of(value) {
      Ok(at) => {
        if self.intervals[at].1 > value {
          self.intervals[at].1 = value;
        }
        self.intervals.truncate(at + 1);
      }
      Err(at) => {
        self.intervals.truncate(at);
      }
    }
  }

  pub fn clear(&mut self) {
    self.intervals.clear();
  }

  pub fn each_interval(&self) -> impl Iterator<Item = (T, T)> + '_ {
    self.intervals.iter().copied()
  }

  pub fn iter(&self) -> IntervalSetIter<'_, T> {
    IntervalSetIter {
      set: self,
      interval: 0,
      next: self.intervals.first().map(|&(lo, _)| lo),
    }
  }
}

pub struct IntervalSetIter<'a, T> {
  set: &'a IntervalSet<T>,
  interval: usize,
  next: Option<T>,
}

impl<'a, T: PrimInt> Iterator for IntervalSetIter<'a, T> {
  type Item = T;

  fn next(&mut self) -> Option<T> {
    let value = self.next?;
    let (_, hi) = self.set.intervals[self.interval];
    self.next = if value == hi {
      self.interval += 1;
      self.set.intervals.get(self.interval).map(|&(lo, _)| lo)
    } else {
      Some(value + T::one())
    };
    Some(value)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn erase_splits_intervals() {
    let mut set = IntervalSet::new(1, 10);
    set.erase(5);
    assert!(set.contains(4));
    assert!(!set.contains(5));
    assert!(set.contains(6));
    assert_eq!(set.count(), 9);
    assert_eq!(set.each_interval().collect::<Vec<_>>(), vec![(1, 4), (6, 10)]);
  }

  #[test]
  fn erase_at_bounds_trims() {
    let mut set = IntervalSet::new(1, 3);
    set.erase(1);
    set.erase(3);
    assert_eq!((set.lower(), set.upper()), (2, 2));
    set.erase(2);
    assert!(set.is_empty());
  }

  #[test]
  fn insert_merges_neighbours() {
    let mut set = IntervalSet::new(1, 3);
    set.insert(5);
    assert_eq!(set.each_interval().count(), 2);
    set.insert(4);
    assert_eq!(set.each_interval().collect::<Vec<_>>(), vec![(1, 5)]);
  }

  #[test]
  fn truncation() {
    let mut set = IntervalSet::new(0, 20);
    set.erase(10);
    set.erase_less_than(5);
    set.erase_greater_than(15);
    assert_eq!(set.each_interval().collect::<Vec<_>>(), vec![(5, 9), (11, 15)]);
    set.erase_less_than(30);
    assert!(set.is_empty());
  }

  #[test]
  fn iteration_walks_every_value() {
    let mut set = IntervalSet::new(1, 6);
    set.erase(3);
    assert_eq!(set.iter().collect::<Vec<_>>(), vec![1, 2, 4, 5, 6]);
  }

  #[test]
  fn insert_at_end_extends_last_interval() {
    let mut set: IntervalSet<u64> = IntervalSet::empty();
    for line in [1, 2, 3, 7, 8] {
      set.insert_at_end(line);
    }
    assert_eq!(set.each_interval().collect::<Vec<_>>(), vec![(1, 3), (7, 8)]);
  }
}
