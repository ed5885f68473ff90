/*!

  A `Literal` is either trivially true, trivially false, or a `VariableCondition`: a claim
  `var op value` with `op` one of `=`, `!=`, `<`, `>=`. `var > k` is spelled `var >= k+1` and
  `var <= k` is spelled `var < k+1`, so four operators cover every comparison.

  Conditions on views and constants are structural: `simplify` rewrites them onto the
  underlying simple variable (or collapses them to `True`/`False`) before the state store or
  the proof layer ever sees them.

*/

use std::fmt::{Display, Formatter};
use std::ops::Not;

use crate::variable::{SimpleVariableId, VariableId};
use crate::Integer;

pub type Literals = Vec<Literal>;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ConditionOperator {
  Equal,
  NotEqual,
  Less,
  GreaterEqual,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct VariableCondition {
  pub var:   VariableId,
  pub op:    ConditionOperator,
  pub value: Integer,
}

impl VariableCondition {
  pub fn new(var: impl Into<VariableId>, op: ConditionOperator, value: Integer) -> Self {
    VariableCondition { var: var.into(), op, value }
  }
}

impl Not for VariableCondition {
  type Output = Self;

  fn not(self) -> Self::Output {
    let op = match self.op {
      ConditionOperator::Equal        => ConditionOperator::NotEqual,
      ConditionOperator::NotEqual     => ConditionOperator::Equal,
      ConditionOperator::Less         => ConditionOperator::GreaterEqual,
      ConditionOperator::GreaterEqual => ConditionOperator::Less,
    };
    VariableCondition { op, ..self }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum Literal {
  True,
  False,
  Condition(VariableCondition),
}

impl Literal {
  pub fn equal_to(var: impl Into<VariableId>, value: Integer) -> Literal {
    Literal::Condition(VariableCondition::new(var, ConditionOperator::Equal, value))
  }

  pub fn not_equal_to(var: impl Into<VariableId>, value: Integer) -> Literal {
    Literal::Condition(VariableCondition::new(var, ConditionOperator::NotEqual, value))
  }

  /// `var < value`
  pub fn less_than(var: impl Into<VariableId>, value: Integer) -> Literal {
    Literal::Condition(VariableCondition::new(var, ConditionOperator::Less, value))
  }

  /// `var >= value`
  pub fn greater_than_or_equal(var: impl Into<VariableId>, value: Integer) -> Literal {
    Literal::Condition(VariableCondition::new(var, ConditionOperator::GreaterEqual, value))
  }
}

impl Not for Literal {
  type Output = Self;

  fn not(self) -> Self::Output {
    match self {
      Literal::True            => Literal::False,
      Literal::False           => Literal::True,
      Literal::Condition(cond) => Literal::Condition(!cond),
    }
  }
}

impl From<VariableCondition> for Literal {
  fn from(cond: VariableCondition) -> Self {
    Literal::Condition(cond)
  }
}

impl Display for ConditionOperator {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      ConditionOperator::Equal        => write!(f, "="),
      ConditionOperator::NotEqual     => write!(f, "!="),
      ConditionOperator::Less         => write!(f, "<"),
      ConditionOperator::GreaterEqual => write!(f, ">="),
    }
  }
}

impl Display for Literal {
  fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
    match self {
      Literal::True  => write!(f, "true"),
      Literal::False => write!(f, "false"),
      Literal::Condition(cond) => write!(f, "{} {} {}", cond.var, cond.op, cond.value),
    }
  }
}

// region Simplification

/// A literal with any view or constant unwrapped: what remains is a claim about a simple
/// variable, or no claim at all.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) enum SimplifiedLiteral {
  True,
  False,
  Condition(SimpleCondition),
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub(crate) struct SimpleCondition {
  pub var:   SimpleVariableId,
  pub op:    ConditionOperator,
  pub value: Integer,
}

impl Not for SimpleCondition {
  type Output = Self;

  fn not(self) -> Self::Output {
    let op = match self.op {
      ConditionOperator::Equal        => ConditionOperator::NotEqual,
      ConditionOperator::NotEqual     => ConditionOperator::Equal,
      ConditionOperator::Less         => ConditionOperator::GreaterEqual,
      ConditionOperator::GreaterEqual => ConditionOperator::Less,
    };
    SimpleCondition { op, ..self }
  }
}

pub(crate) fn simplify_literal(lit: &Literal) -> SimplifiedLiteral {
  match lit {
    Literal::True            => SimplifiedLiteral::True,
    Literal::False           => SimplifiedLiteral::False,
    Literal::Condition(cond) => simplify_condition(cond),
  }
}

/// Rewrites a condition on a view onto the underlying variable, and evaluates a condition on
/// a constant outright.
pub(crate) fn simplify_condition(cond: &VariableCondition) -> SimplifiedLiteral {
  use ConditionOperator::*;

  match cond.var {
    VariableId::Simple(var) => SimplifiedLiteral::Condition(SimpleCondition {
      var,
      op: cond.op,
      value: cond.value,
    }),
    VariableId::Constant(c) => {
      let holds = match cond.op {
        Equal        => c == cond.value,
        NotEqual     => c != cond.value,
        Less         => c < cond.value,
        GreaterEqual => c >= cond.value,
      };
      if holds {
        SimplifiedLiteral::True
      } else {
        SimplifiedLiteral::False
      }
    }
    VariableId::View(view) => {
      let var = view.actual;
      let raw = view.backward(cond.value);
      let simple = match (cond.op, view.negate_first) {
        (Equal, _)    => SimpleCondition { var, op: Equal, value: raw },
        (NotEqual, _) => SimpleCondition { var, op: NotEqual, value: raw },
        // view < v: negated views flip the direction
        (Less, false)         => SimpleCondition { var, op: Less, value: raw },
        (Less, true)          => SimpleCondition { var, op: GreaterEqual, value: raw + 1 },
        (GreaterEqual, false) => SimpleCondition { var, op: GreaterEqual, value: raw },
        (GreaterEqual, true)  => SimpleCondition { var, op: Less, value: raw + 1 },
      };
      SimplifiedLiteral::Condition(simple)
    }
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use crate::variable::ViewOfVariableId;

  fn x() -> SimpleVariableId {
    SimpleVariableId(3)
  }

  #[test]
  fn negation_flips_operators() {
    let lit = Literal::less_than(x(), 5);
    match !lit {
      Literal::Condition(cond) => {
        assert_eq!(cond.op, ConditionOperator::GreaterEqual);
        assert_eq!(cond.value, 5);
      }
      _ => panic!("expected a condition"),
    }
  }

  #[test]
  fn constants_evaluate() {
    let cond = VariableCondition::new(VariableId::Constant(2), ConditionOperator::Less, 3);
    assert_eq!(simplify_condition(&cond), SimplifiedLiteral::True);
    assert_eq!(simplify_condition(&!cond), SimplifiedLiteral::False);
  }

  #[test]
  fn negated_view_conditions_flip() {
    // v = 10 - x, so v >= 7 means x < 4
    let view = ViewOfVariableId { actual: x(), negate_first: true, then_add: 10 };
    let cond = VariableCondition::new(view, ConditionOperator::GreaterEqual, 7);
    match simplify_condition(&cond) {
      SimplifiedLiteral::Condition(simple) => {
        assert_eq!(simple.op, ConditionOperator::Less);
        assert_eq!(simple.value, 4);
      }
      _ => panic!("expected a condition"),
    }
  }

  #[test]
  fn offset_view_conditions_shift() {
    // v = x + 2, so v = 5 means x = 3
    let view = ViewOfVariableId { actual: x(), negate_first: false, then_add: 2 };
    let cond = VariableCondition::new(view, ConditionOperator::Equal, 5);
    match simplify_condition(&cond) {
      SimplifiedLiteral::Condition(simple) => {
        assert_eq!(simple.op, ConditionOperator::Equal);
        assert_eq!(simple.value, 3);
      }
      _ => panic!("expected a condition"),
    }
  }
}
