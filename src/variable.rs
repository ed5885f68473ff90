/*!

  The three kinds of integer variable identifier. A `Simple` variable is an index into the
  state store. A `Constant` is a fixed value with no state. A `View` is a zero-cost structural
  alias of a simple variable with an optional negation and an additive offset; bounds and
  membership queries unwrap it before touching storage.

*/

use std::fmt::{Display, Formatter};

use crate::Integer;

/// An index into the state store's domain vector.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash)]
pub struct SimpleVariableId(pub(crate) usize);

impl SimpleVariableId {
  pub const fn index(&self) -> usize {
    self.0
  }
}

/// Logically equal to `then_add + actual` or, with `negate_first`, `then_add - actual`.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ViewOfVariableId {
  pub actual:       SimpleVariableId,
  pub negate_first: bool,
  pub then_add:     Integer,
}

impl ViewOfVariableId {
  /// The viewed value corresponding to a raw value of the underlying variable.
  pub(crate) const fn forward(&self, raw: Integer) -> Integer {
    if self.negate_first {
      self.then_add - raw
    } else {
      self.then_add + raw
    }
  }

  /// The raw value of the underlying variable corresponding to a viewed value.
  pub(crate) const fn backward(&self, viewed: Integer) -> Integer {
    if self.negate_first {
      self.then_add - viewed
    } else {
      viewed - self.then_add
    }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum VariableId {
  Simple(SimpleVariableId),
  Constant(Integer),
  View(ViewOfVariableId),
}

impl VariableId {
  /// This variable plus a constant.
  pub fn offset(self, add: Integer) -> VariableId {
    match self {
      VariableId::Simple(simple) => VariableId::View(ViewOfVariableId {
        actual:       simple,
        negate_first: false,
        then_add:     add,
      }),
      VariableId::Constant(c) => VariableId::Constant(c + add),
      VariableId::View(view) => VariableId::View(ViewOfVariableId {
        then_add: view.then_add + add,
        ..view
      }),
    }
  }

  /// This variable negated.
  pub fn negated(self) -> VariableId {
    match self {
      VariableId::Simple(simple) => VariableId::View(ViewOfVariableId {
        actual:       simple,
        negate_first: true,
        then_add:     0,
      }),
      VariableId::Constant(c) => VariableId::Constant(-c),
      VariableId::View(view) => VariableId::View(ViewOfVariableId {
        actual:       view.actual,
        negate_first: !view.negate_first,
        then_add:     -view.then_add,
      }),
    }
  }

  /// The underlying simple variable, if there is one.
  pub(crate) fn underlying(self) -> Option<SimpleVariableId> {
    match self {
      VariableId::Simple(simple) => Some(simple),
      VariableId::Constant(_) => None,
      VariableId::View(view) => Some(view.actual),
    }
  }
}

impl From<SimpleVariableId> for VariableId {
  fn from(simple: SimpleVariableId) -> Self {
    VariableId::Simple(simple)
  }
}

impl From<ViewOfVariableId> for VariableId {
  fn from(view: ViewOfVariableId) -> Self {
    VariableId::View(view)
  }
}

impl From<Integer> for VariableId {
  fn from(value: Integer) -> Self {
    VariableId::Constant(value)
  }
}

impl Display for SimpleVariableId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    write!(f, "varidx {}", self.0)
  }
}

impl Display for VariableId {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      VariableId::Simple(simple) => write!(f, "{}", simple),
      VariableId::Constant(c)    => write!(f, "const {}", c),
      VariableId::View(view) => {
        if view.negate_first {
          write!(f, "{} + -{}", view.then_add, view.actual)
        } else {
          write!(f, "{} + {}", view.then_add, view.actual)
        }
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn view_maps_compose() {
    let x = SimpleVariableId(0);
    let v = VariableId::from(x).negated().offset(10);
    match v {
      VariableId::View(view) => {
        // v = 10 - x
        assert_eq!(view.forward(3), 7);
        assert_eq!(view.backward(7), 3);
      }
      _ => panic!("expected a view"),
    }
  }

  #[test]
  fn constants_fold() {
    let c = VariableId::Constant(4).negated().offset(1);
    assert_eq!(c, VariableId::Constant(-3));
  }
}
