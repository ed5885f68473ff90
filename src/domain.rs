/*!

  The per-variable domain representation. A domain is stored as whichever of four shapes
  currently fits it best:

    - `Constant` for a singleton,
    - `Range` for a contiguous interval,
    - `SmallBitset` for a holey domain spanning at most 64 values,
    - `Set` for anything else, as a shared sorted interval set.

  Representations are canonicalised aggressively: any mutation that leaves a single value
  collapses to `Constant`, and a range only degrades to a bitset or set when a hole is
  actually introduced. `Set` storage is reference counted and shared between sibling epochs;
  the mutating paths clone it on write when it is not uniquely owned.

*/

use std::rc::Rc;

use crate::data_structures::IntervalSet;
use crate::Integer;

/// Width of the `SmallBitset` representation.
const SMALL_BITSET_BITS: Integer = u64::BITS as Integer;

/// What a domain mutation did. Ordered so that the strongest outcome of a sequence of
/// mutations is their maximum.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum Inference {
  NoChange,
  InteriorValuesChanged,
  BoundsChanged,
  Instantiated,
  Contradiction,
}

impl Inference {
  pub(crate) fn increase_to(&mut self, other: Inference) {
    if other > *self {
      *self = other;
    }
  }

  /// The event payload for the scheduler, if this outcome changed anything.
  pub(crate) fn how_changed(self) -> Option<HowChanged> {
    match self {
      Inference::NoChange | Inference::Contradiction => None,
      Inference::InteriorValuesChanged => Some(HowChanged::InteriorValuesChanged),
      Inference::BoundsChanged         => Some(HowChanged::BoundsChanged),
      Inference::Instantiated          => Some(HowChanged::Instantiated),
    }
  }
}

/// How a variable's domain was reduced, for propagator wakeups. Ordered by strength:
/// instantiation implies a bounds change implies a change.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub enum HowChanged {
  InteriorValuesChanged,
  BoundsChanged,
  Instantiated,
}

#[derive(Clone, Debug)]
pub(crate) enum DomainState {
  Constant(Integer),
  Range { lower: Integer, upper: Integer },
  SmallBitset { base: Integer, bits: u64 },
  Set(Rc<IntervalSet<Integer>>),
}

impl DomainState {
  pub fn new(lower: Integer, upper: Integer) -> DomainState {
    if lower == upper {
      DomainState::Constant(lower)
    } else {
      DomainState::Range { lower, upper }
    }
  }

  // region Queries

  pub fn lower(&self) -> Integer {
    match self {
      DomainState::Constant(v)          => *v,
      DomainState::Range { lower, .. }  => *lower,
      DomainState::SmallBitset { base, bits } => base + bits.trailing_zeros() as Integer,
      DomainState::Set(values)          => values.lower(),
    }
  }

  pub fn upper(&self) -> Integer {
    match self {
      DomainState::Constant(v)         => *v,
      DomainState::Range { upper, .. } => *upper,
      DomainState::SmallBitset { base, bits } => {
        base + (SMALL_BITSET_BITS - 1 - bits.leading_zeros() as Integer)
      }
      DomainState::Set(values) => values.upper(),
    }
  }

  pub fn contains(&self, value: Integer) -> bool {
    match self {
      DomainState::Constant(v)                => *v == value,
      DomainState::Range { lower, upper }     => value >= *lower && value <= *upper,
      DomainState::SmallBitset { base, bits } => {
        value >= *base && value < base + SMALL_BITSET_BITS && bits & (1u64 << (value - base)) != 0
      }
      DomainState::Set(values) => values.contains(value),
    }
  }

  pub fn size(&self) -> Integer {
    match self {
      DomainState::Constant(_)            => 1,
      DomainState::Range { lower, upper } => upper - lower + 1,
      DomainState::SmallBitset { bits, .. } => bits.count_ones() as Integer,
      DomainState::Set(values)            => values.count(),
    }
  }

  pub fn single_value(&self) -> Option<Integer> {
    match self {
      DomainState::Constant(v) => Some(*v),
      DomainState::Range { lower, upper } if lower == upper => Some(*lower),
      DomainState::SmallBitset { base, bits } if bits.count_ones() == 1 => {
        Some(base + bits.trailing_zeros() as Integer)
      }
      DomainState::Set(values) if values.count() == 1 => Some(values.lower()),
      _ => None,
    }
  }

  /// True if the domain is potentially not just contiguous values. May spuriously claim
  /// holes are present.
  pub fn has_holes(&self) -> bool {
    matches!(self, DomainState::SmallBitset { .. } | DomainState::Set(_))
  }

  pub fn values(&self) -> DomainValues {
    match self {
      DomainState::Constant(v) => DomainValues::Constant(Some(*v)),
      DomainState::Range { lower, upper } => DomainValues::Range {
        next:  *lower,
        upper: *upper,
        done:  false,
      },
      DomainState::SmallBitset { base, bits } => DomainValues::Bits { base: *base, bits: *bits },
      DomainState::Set(values) => {
        let next = if values.is_empty() { None } else { Some(values.lower()) };
        DomainValues::Set { set: Rc::clone(values), next }
      }
    }
  }

  // endregion

  // region Mutations

  /// Intersect with `{value}`.
  pub fn assign(&mut self, value: Integer) -> Inference {
    if !self.contains(value) {
      return Inference::Contradiction;
    }
    let was_single = self.single_value().is_some();
    *self = DomainState::Constant(value);
    if was_single {
      Inference::NoChange
    } else {
      Inference::Instantiated
    }
  }

  /// Remove `value`; may split a `Range` into a `SmallBitset` or a `Set`.
  pub fn remove(&mut self, value: Integer) -> Inference {
    match self {
      DomainState::Constant(v) => {
        if *v == value {
          Inference::Contradiction
        } else {
          Inference::NoChange
        }
      }
      DomainState::Range { lower, upper } => {
        if value < *lower || value > *upper {
          Inference::NoChange
        } else if lower == upper {
          Inference::Contradiction
        } else if value == *lower {
          *lower += 1;
          self.collapse_if_single(Inference::BoundsChanged)
        } else if value == *upper {
          *upper -= 1;
          self.collapse_if_single(Inference::BoundsChanged)
        } else {
          // A hole in the interior: degrade the representation.
          *self = holey_range(*lower, *upper, value);
          Inference::InteriorValuesChanged
        }
      }
      DomainState::SmallBitset { base, bits } => {
        if value < *base || value >= *base + SMALL_BITSET_BITS {
          return Inference::NoChange;
        }
        let mask = 1u64 << (value - *base);
        if *bits & mask == 0 {
          return Inference::NoChange;
        }
        let lowest = *base + bits.trailing_zeros() as Integer;
        let highest = *base + (SMALL_BITSET_BITS - 1 - bits.leading_zeros() as Integer);
        let was_bound = value == lowest || value == highest;
        *bits &= !mask;
        if *bits == 0 {
          Inference::Contradiction
        } else if was_bound {
          self.collapse_if_single(Inference::BoundsChanged)
        } else {
          self.collapse_if_single(Inference::InteriorValuesChanged)
        }
      }
      DomainState::Set(values) => {
        if !values.contains(value) {
          return Inference::NoChange;
        }
        if values.count() == 1 {
          return Inference::Contradiction;
        }
        let was_bound = value == values.lower() || value == values.upper();
        Rc::make_mut(values).erase(value);
        if was_bound {
          self.collapse_if_single(Inference::BoundsChanged)
        } else {
          self.collapse_if_single(Inference::InteriorValuesChanged)
        }
      }
    }
  }

  /// Truncate the upper end: keep only values strictly below `value`.
  pub fn keep_less_than(&mut self, value: Integer) -> Inference {
    match self {
      DomainState::Constant(v) => {
        if *v < value {
          Inference::NoChange
        } else {
          Inference::Contradiction
        }
      }
      DomainState::Range { lower, upper } => {
        if *upper < value {
          Inference::NoChange
        } else if *lower >= value {
          Inference::Contradiction
        } else {
          *upper = value - 1;
          self.collapse_if_single(Inference::BoundsChanged)
        }
      }
      DomainState::SmallBitset { base, bits } => {
        let highest = *base + (SMALL_BITSET_BITS - 1 - bits.leading_zeros() as Integer);
        if highest < value {
          return Inference::NoChange;
        }
        let keep = value - *base;
        let mask = if keep <= 0 {
          0
        } else if keep >= SMALL_BITSET_BITS {
          u64::MAX
        } else {
          (1u64 << keep) - 1
        };
        *bits &= mask;
        if *bits == 0 {
          Inference::Contradiction
        } else {
          self.collapse_if_single(Inference::BoundsChanged)
        }
      }
      DomainState::Set(values) => {
        if values.upper() < value {
          Inference::NoChange
        } else if values.lower() >= value {
          Inference::Contradiction
        } else {
          Rc::make_mut(values).erase_greater_than(value - 1);
          self.collapse_if_single(Inference::BoundsChanged)
        }
      }
    }
  }

  /// Truncate the lower end: keep only values at least `value`.
  pub fn keep_greater_than_or_equal(&mut self, value: Integer) -> Inference {
    match self {
      DomainState::Constant(v) => {
        if *v >= value {
          Inference::NoChange
        } else {
          Inference::Contradiction
        }
      }
      DomainState::Range { lower, upper } => {
        if *lower >= value {
          Inference::NoChange
        } else if *upper < value {
          Inference::Contradiction
        } else {
          *lower = value;
          self.collapse_if_single(Inference::BoundsChanged)
        }
      }
      DomainState::SmallBitset { base, bits } => {
        let lowest = *base + bits.trailing_zeros() as Integer;
        if lowest >= value {
          return Inference::NoChange;
        }
        let drop = value - *base;
        let mask = if drop <= 0 {
          u64::MAX
        } else if drop >= SMALL_BITSET_BITS {
          0
        } else {
          !((1u64 << drop) - 1)
        };
        *bits &= mask;
        if *bits == 0 {
          Inference::Contradiction
        } else {
          self.collapse_if_single(Inference::BoundsChanged)
        }
      }
      DomainState::Set(values) => {
        if values.lower() >= value {
          Inference::NoChange
        } else if values.upper() < value {
          Inference::Contradiction
        } else {
          Rc::make_mut(values).erase_less_than(value);
          self.collapse_if_single(Inference::BoundsChanged)
        }
      }
    }
  }

  fn collapse_if_single(&mut self, otherwise: Inference) -> Inference {
    if let Some(v) = self.single_value() {
      *self = DomainState::Constant(v);
      Inference::Instantiated
    } else {
      otherwise
    }
  }

  // endregion
}

/// A range with one interior value knocked out, in whichever holey representation fits.
fn holey_range(lower: Integer, upper: Integer, removed: Integer) -> DomainState {
  if upper - lower < SMALL_BITSET_BITS {
    let mut bits = if upper - lower + 1 == SMALL_BITSET_BITS {
      u64::MAX
    } else {
      (1u64 << (upper - lower + 1)) - 1
    };
    bits &= !(1u64 << (removed - lower));
    DomainState::SmallBitset { base: lower, bits }
  } else {
    let mut values = IntervalSet::new(lower, upper);
    values.erase(removed);
    DomainState::Set(Rc::new(values))
  }
}

/// An owned iterator over domain values; safe to hold while the domain is mutated, since it
/// captures the shape it was created from.
pub(crate) enum DomainValues {
  Constant(Option<Integer>),
  Range { next: Integer, upper: Integer, done: bool },
  Bits { base: Integer, bits: u64 },
  Set { set: Rc<IntervalSet<Integer>>, next: Option<Integer> },
}

impl Iterator for DomainValues {
  type Item = Integer;

  fn next(&mut self) -> Option<Integer> {
    match self {
      DomainValues::Constant(v) => v.take(),
      DomainValues::Range { next, upper, done } => {
        if *done {
          None
        } else {
          let value = *next;
          if value == *upper {
            *done = true;
          } else {
            *next += 1;
          }
          Some(value)
        }
      }
      DomainValues::Bits { base, bits } => {
        if *bits == 0 {
          None
        } else {
          let shift = bits.trailing_zeros();
          *bits &= *bits - 1;
          Some(*base + shift as Integer)
        }
      }
      DomainValues::Set { set, next } => {
        let value = (*next)?;
        *next = if value >= set.upper() {
          None
        } else {
          let candidate = value + 1;
          if set.contains(candidate) {
            Some(candidate)
          } else {
            // jump to the start of the following interval
            set.each_interval().find(|&(lo, _)| lo > candidate).map(|(lo, _)| lo)
          }
        };
        Some(value)
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn range_shrinks_then_instantiates() {
    let mut d = DomainState::new(1, 10);
    assert_eq!(d.keep_less_than(8), Inference::BoundsChanged);
    assert_eq!(d.keep_greater_than_or_equal(7), Inference::BoundsChanged);
    assert_eq!((d.lower(), d.upper()), (7, 7));
    assert!(matches!(d, DomainState::Constant(7)));
  }

  #[test]
  fn interior_removal_degrades_to_bitset() {
    let mut d = DomainState::new(0, 9);
    assert_eq!(d.remove(5), Inference::InteriorValuesChanged);
    assert!(matches!(d, DomainState::SmallBitset { .. }));
    assert!(!d.contains(5));
    assert_eq!(d.size(), 9);
    assert_eq!((d.lower(), d.upper()), (0, 9));
  }

  #[test]
  fn interior_removal_degrades_to_set_when_wide() {
    let mut d = DomainState::new(0, 1000);
    assert_eq!(d.remove(500), Inference::InteriorValuesChanged);
    assert!(matches!(d, DomainState::Set(_)));
    assert_eq!(d.size(), 1000);
  }

  #[test]
  fn bitset_collapses_to_constant() {
    let mut d = DomainState::new(0, 3);
    d.remove(1);
    d.remove(2);
    assert_eq!(d.remove(0), Inference::Instantiated);
    assert!(matches!(d, DomainState::Constant(3)));
    assert_eq!(d.remove(3), Inference::Contradiction);
  }

  #[test]
  fn assignment_outside_domain_contradicts() {
    let mut d = DomainState::new(1, 5);
    assert_eq!(d.assign(6), Inference::Contradiction);
    assert_eq!(d.assign(3), Inference::Instantiated);
    assert_eq!(d.assign(3), Inference::NoChange);
  }

  #[test]
  fn removing_bounds_reports_bounds_changed() {
    let mut d = DomainState::new(1, 4);
    assert_eq!(d.remove(1), Inference::BoundsChanged);
    assert_eq!(d.lower(), 2);
    assert_eq!(d.remove(9), Inference::NoChange);
  }

  #[test]
  fn shared_sets_clone_on_write() {
    let mut a = DomainState::new(0, 100);
    a.remove(50);
    let mut b = a.clone();
    b.remove(60);
    assert!(a.contains(60));
    assert!(!b.contains(60));
    assert!(!a.contains(50) && !b.contains(50));
  }

  #[test]
  fn values_iterate_in_order() {
    let mut d = DomainState::new(0, 6);
    d.remove(2);
    d.remove(4);
    assert_eq!(d.values().collect::<Vec<_>>(), vec![0, 1, 3, 5, 6]);
  }

  #[test]
  fn truncation_of_holey_set() {
    let mut d = DomainState::new(0, 200);
    d.remove(100);
    assert_eq!(d.keep_greater_than_or_equal(99), Inference::BoundsChanged);
    assert_eq!(d.lower(), 99);
    assert_eq!(d.keep_less_than(102), Inference::BoundsChanged);
    assert_eq!(d.values().collect::<Vec<_>>(), vec![99, 101]);
    assert_eq!(d.remove(99), Inference::Instantiated);
    assert_eq!(d.single_value(), Some(101));
  }
}
