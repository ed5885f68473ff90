/*!

  A certifying finite-domain constraint solver. Integer decision variables take values from
  finite domains; declarative constraints are enforced by propagators driven to a fixpoint by
  an event-driven scheduler inside a chronological depth-first search. Every inference made
  along the way can be certified by emitting a pseudo-Boolean proof (an OPB model plus a
  VeriPB 2.0 trace) that an unrelated verifier can replay without trusting the solver.

*/

mod data_structures;
mod domain;
mod errors;
mod justification;
mod literal;
mod parameters;
mod problem;
mod proofs;
mod propagators;
mod resource_limit;
mod search;
mod state;
mod variable;

// Re-exported items
pub use data_structures::{IntervalSet, Statistic, Statistics};
pub use domain::{HowChanged, Inference};
pub use errors::Error;
pub use justification::{Justification, Reason};
pub use literal::{ConditionOperator, Literal, Literals, VariableCondition};
pub use parameters::{Parameters, ProofOptions};
pub use problem::{Constraint, InstallContext, Presolver, Problem};
pub use proofs::{
  PbConstraint,
  PbSum,
  PbTerm,
  Proof,
  ProofFlag,
  ProofLevel,
  ProofLine,
  ProofLiteralOrFlag,
  ProofOnlyVariable,
};
pub use propagators::{
  all_different::AllDifferent,
  comparison::{Comparison, ComparisonReif},
  equals::{Equals, EqualsReif, NotEquals},
  linear::{LinearEquality, LinearLessEqual, LinearLessEqualReif, LinearNotEquals},
  mult::Times,
  table::{NegativeTable, Table, TableEntry},
  Contradiction,
  PropagatorState,
  Triggers,
};
pub use resource_limit::{ResourceLimit, ScopedTimeout};
pub use search::{solve, solve_with, SolveCallbacks, Stats};
pub use state::{
  ConstraintStateHandle,
  ConstraintStateScope,
  CurrentState,
  InferenceTracker,
  LiteralIs,
  State,
  Timestamp,
};
pub use variable::{SimpleVariableId, VariableId, ViewOfVariableId};

/// The integer type every variable ranges over. Wide and signed; domain arithmetic stays well
/// inside it because variable bounds are user-supplied.
pub type Integer = i64;

/// Floor division, defined for any non-zero divisor.
pub(crate) const fn div_floor(a: Integer, b: Integer) -> Integer {
  if b > 0 {
    a.div_euclid(b)
  } else {
    (-a).div_euclid(-b)
  }
}

/// Ceiling division, defined for any non-zero divisor.
pub(crate) const fn div_ceil(a: Integer, b: Integer) -> Integer {
  -div_floor(-a, b)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn rounding_division() {
    assert_eq!(div_floor(7, 2), 3);
    assert_eq!(div_floor(-7, 2), -4);
    assert_eq!(div_floor(7, -2), -4);
    assert_eq!(div_floor(-7, -2), 3);
    assert_eq!(div_ceil(7, 2), 4);
    assert_eq!(div_ceil(-7, 2), -3);
    assert_eq!(div_ceil(7, -2), -3);
    assert_eq!(div_ceil(-7, -2), 4);
  }
}
