/*!

  Ordering between two variables, strict or not, plain or fully reified on a 0/1 variable.
  Bounds propagation; justified by RUP over the linear model lines. A comparison against a
  constant degenerates to a posted bound trim.

*/

use crate::errors::Error;
use crate::justification::Justification;
use crate::literal::Literal;
use crate::problem::{Constraint, InstallContext};
use crate::proofs::{PbSum, ProofLiteralOrFlag};
use crate::propagators::{Contradiction, PropagatorState, Triggers};
use crate::state::{InferenceTracker, LiteralIs};
use crate::variable::VariableId;
use crate::Integer;

/// `v1 < v2`, or `v1 ≤ v2` with `or_equal`.
pub struct Comparison {
  pub v1:       VariableId,
  pub v2:       VariableId,
  pub or_equal: bool,
}

impl Comparison {
  pub fn less_than(v1: impl Into<VariableId>, v2: impl Into<VariableId>) -> Comparison {
    Comparison { v1: v1.into(), v2: v2.into(), or_equal: false }
  }

  pub fn less_than_equal(v1: impl Into<VariableId>, v2: impl Into<VariableId>) -> Comparison {
    Comparison { v1: v1.into(), v2: v2.into(), or_equal: true }
  }

  pub fn greater_than(v1: impl Into<VariableId>, v2: impl Into<VariableId>) -> Comparison {
    Comparison::less_than(v2, v1)
  }

  pub fn greater_than_equal(v1: impl Into<VariableId>, v2: impl Into<VariableId>) -> Comparison {
    Comparison::less_than_equal(v2, v1)
  }
}

/// `reif = 1 ↔ v1 (< or ≤) v2`, with `reif` a 0/1 variable.
pub struct ComparisonReif {
  pub v1:       VariableId,
  pub v2:       VariableId,
  pub or_equal: bool,
  pub reif:     VariableId,
}

fn strictness(or_equal: bool) -> Integer {
  if or_equal {
    0
  } else {
    1
  }
}

/// `v1 (< or ≤) v2` under an optional extra reason literal.
fn propagate_ordering(
  tracker: &mut InferenceTracker,
  v1: VariableId,
  v2: VariableId,
  strict: Integer,
  extra_reason: Option<Literal>,
) -> Result<(), Contradiction> {
  let upper2 = tracker.state().upper_bound(v2);
  if tracker.state().upper_bound(v1) > upper2 - strict {
    let mut reason = vec![Literal::less_than(v2, upper2 + 1)];
    reason.extend(extra_reason);
    tracker.infer_less_than(v1, upper2 - strict + 1, move || Justification::Rup { reason })?;
  }
  let lower1 = tracker.state().lower_bound(v1);
  if tracker.state().lower_bound(v2) < lower1 + strict {
    let mut reason = vec![Literal::greater_than_or_equal(v1, lower1)];
    reason.extend(extra_reason);
    tracker.infer_greater_than_or_equal(v2, lower1 + strict, move || Justification::Rup { reason })?;
  }
  Ok(())
}

impl Constraint for Comparison {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (v1, v2) = (self.v1, self.v2);
    let strict = strictness(self.or_equal);

    // constant sides degenerate to bound trims
    match (v1, v2) {
      (VariableId::Constant(c), _) => {
        context
          .propagators
          .trim_lower_bound(context.state, context.proof.as_deref_mut(), v2, c + strict, "comparison");
        return Ok(());
      }
      (_, VariableId::Constant(c)) => {
        context
          .propagators
          .trim_upper_bound(context.state, context.proof.as_deref_mut(), v1, c - strict, "comparison");
        return Ok(());
      }
      _ => {}
    }

    if let Some(proof) = context.proof.as_deref_mut() {
      proof.add_model_constraint(
        &PbSum::new().plus(1, v1).plus(-1, v2).less_equal(-strict),
        None,
      );
    }
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_ordering(tracker, v1, v2, strict, None)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([v1, v2]),
      "comparison",
    );
    Ok(())
  }
}

impl Constraint for ComparisonReif {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (v1, v2, reif) = (self.v1, self.v2, self.reif);
    let strict = strictness(self.or_equal);
    let (reif_lower, reif_upper) = context.state.bounds(reif);
    if reif_lower < 0 || reif_upper > 1 {
      return Err(Error::Unexpected(format!(
        "reification variable {} must be 0/1 but has bounds [{}, {}]",
        reif, reif_lower, reif_upper
      )));
    }

    let holds = Literal::greater_than_or_equal(reif, 1);
    let fails = Literal::less_than(reif, 1);

    if let Some(proof) = context.proof.as_deref_mut() {
      proof.add_model_constraint(
        &PbSum::new().plus(1, v1).plus(-1, v2).less_equal(-strict),
        Some(&[ProofLiteralOrFlag::Literal(holds)]),
      );
      // the negation: v1 ≥ v2 + (1 - strict)
      proof.add_model_constraint(
        &PbSum::new().plus(1, v1).plus(-1, v2).greater_equal(1 - strict),
        Some(&[ProofLiteralOrFlag::Literal(fails)]),
      );
    }

    context.propagators.install(
      Box::new(move |tracker| {
        match tracker.state().test_literal(&holds) {
          LiteralIs::DefinitelyTrue => {
            propagate_ordering(tracker, v1, v2, strict, Some(holds))?;
          }
          LiteralIs::DefinitelyFalse => {
            // the negation is v2 (< or ≤) v1 with flipped strictness
            propagate_ordering(tracker, v2, v1, 1 - strict, Some(fails))?;
          }
          LiteralIs::Undecided => {
            let (lower1, upper1) = tracker.state().bounds(v1);
            let (lower2, upper2) = tracker.state().bounds(v2);
            if upper1 <= lower2 - strict {
              let reason = vec![
                Literal::less_than(v1, upper1 + 1),
                Literal::greater_than_or_equal(v2, lower2),
              ];
              tracker.infer(&holds, move || Justification::Rup { reason })?;
            } else if lower1 > upper2 - strict {
              let reason = vec![
                Literal::greater_than_or_equal(v1, lower1),
                Literal::less_than(v2, upper2 + 1),
              ];
              tracker.infer(&fails, move || Justification::Rup { reason })?;
            }
          }
        }
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([v1, v2, reif]),
      "comparison reified",
    );
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::Problem;
  use crate::search::{solve, SolveCallbacks};

  #[test]
  fn strict_ordering_trims_both_sides() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 9, None).unwrap();
    let y = problem.create_integer_variable(0, 9, None).unwrap();
    problem.post(Comparison::less_than(x, y)).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (0, 8));
    assert_eq!(state.bounds(y), (1, 9));
  }

  #[test]
  fn comparison_against_constants_becomes_a_trim() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 9, None).unwrap();
    problem.post(Comparison::less_than(x, 5)).unwrap();
    problem.post(Comparison::greater_than(x, 1)).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (2, 4));
  }

  #[test]
  fn impossible_strict_ordering_fails() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(5, 9, None).unwrap();
    let y = problem.create_integer_variable(0, 5, None).unwrap();
    problem.post(Comparison::less_than(x, y)).unwrap();
    let mut state = problem.initial_state();
    assert!(!problem.propagators.propagate(&mut state, None, None, None));
  }

  #[test]
  fn non_strict_ordering_counts_solutions() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 2, None).unwrap();
    let y = problem.create_integer_variable(0, 2, None).unwrap();
    problem.post(Comparison::less_than_equal(x, y)).unwrap();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 6);
  }

  #[test]
  fn reified_ordering_settles_and_forces() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 3, None).unwrap();
    let y = problem.create_integer_variable(5, 9, None).unwrap();
    let r = problem.create_integer_variable(0, 1, None).unwrap();
    problem
      .post(ComparisonReif { v1: x.into(), v2: y.into(), or_equal: false, reif: r.into() })
      .unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.optional_single_value(r), Some(1));
  }

  #[test]
  fn falsified_reification_enforces_the_negation() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 9, None).unwrap();
    let y = problem.create_integer_variable(0, 9, None).unwrap();
    let r = problem.create_integer_variable(0, 0, None).unwrap();
    // r = 0, so NOT (x < y), i.e. x >= y
    problem
      .post(ComparisonReif { v1: x.into(), v2: y.into(), or_equal: false, reif: r.into() })
      .unwrap();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    // pairs with x >= y over 0..9: 55
    assert_eq!(stats.solutions, 55);
  }
}
