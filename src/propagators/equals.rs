/*!

  Equality between two variables, plain, negated, or fully reified on a 0/1 variable. Bounds
  channelling does the propagation; the pseudo-Boolean model carries the matching linear
  encodings so every inference is justified by reverse unit propagation.

*/

use crate::errors::Error;
use crate::justification::Justification;
use crate::literal::Literal;
use crate::problem::{Constraint, InstallContext};
use crate::proofs::{PbSum, ProofLiteralOrFlag};
use crate::propagators::linear::LinearNotEquals;
use crate::propagators::{Contradiction, PropagatorState, Triggers};
use crate::state::{InferenceTracker, LiteralIs};
use crate::variable::VariableId;

/// `v1 = v2`
pub struct Equals {
  pub v1: VariableId,
  pub v2: VariableId,
}

/// `v1 ≠ v2`
pub struct NotEquals {
  pub v1: VariableId,
  pub v2: VariableId,
}

/// `reif = 1 ↔ v1 = v2`, with `reif` a 0/1 variable.
pub struct EqualsReif {
  pub v1:   VariableId,
  pub v2:   VariableId,
  pub reif: VariableId,
}

fn difference(v1: VariableId, v2: VariableId) -> PbSum {
  PbSum::new().plus(1, v1).plus(-1, v2)
}

/// Clamp each side into the other's bounds. The reason for each deduced bound is the other
/// variable's matching bound (plus anything the caller appends).
fn propagate_equal_bounds(
  tracker: &mut InferenceTracker,
  v1: VariableId,
  v2: VariableId,
  extra_reason: Option<Literal>,
) -> Result<(), Contradiction> {
  let with_extra = |lit: Literal| {
    let mut reason = vec![lit];
    reason.extend(extra_reason);
    reason
  };

  let (lower1, upper1) = tracker.state().bounds(v1);
  let (lower2, upper2) = tracker.state().bounds(v2);

  if lower2 > lower1 {
    let reason = with_extra(Literal::greater_than_or_equal(v2, lower2));
    tracker.infer_greater_than_or_equal(v1, lower2, move || Justification::Rup { reason })?;
  }
  if upper2 < upper1 {
    let reason = with_extra(Literal::less_than(v2, upper2 + 1));
    tracker.infer_less_than(v1, upper2 + 1, move || Justification::Rup { reason })?;
  }
  if lower1 > lower2 {
    let reason = with_extra(Literal::greater_than_or_equal(v1, lower1));
    tracker.infer_greater_than_or_equal(v2, lower1, move || Justification::Rup { reason })?;
  }
  if upper1 < upper2 {
    let reason = with_extra(Literal::less_than(v1, upper1 + 1));
    tracker.infer_less_than(v2, upper1 + 1, move || Justification::Rup { reason })?;
  }
  Ok(())
}

impl Constraint for Equals {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (v1, v2) = (self.v1, self.v2);
    if let Some(proof) = context.proof.as_deref_mut() {
      proof.add_model_constraint(&difference(v1, v2).equal(0), None);
    }
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_equal_bounds(tracker, v1, v2, None)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([v1, v2]),
      "equals",
    );
    Ok(())
  }
}

impl Constraint for NotEquals {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    // v1 - v2 ≠ 0, which the linear disequality already knows how to post and propagate
    Box::new(LinearNotEquals {
      terms: vec![(1, self.v1), (-1, self.v2)],
      rhs:   0,
    })
    .install(context)
  }
}

impl Constraint for EqualsReif {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (v1, v2, reif) = (self.v1, self.v2, self.reif);
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
        &difference(v1, v2).equal(0),
        Some(&[ProofLiteralOrFlag::Literal(holds)]),
      );
      // when the reification fails, a selector picks which strict side holds
      let side = proof.create_proof_flag("eqreif");
      proof.add_model_constraint(
        &difference(v1, v2).less_equal(-1),
        Some(&[ProofLiteralOrFlag::Literal(fails), ProofLiteralOrFlag::Flag(side)]),
      );
      proof.add_model_constraint(
        &difference(v1, v2).greater_equal(1),
        Some(&[ProofLiteralOrFlag::Literal(fails), ProofLiteralOrFlag::Flag(!side)]),
      );
    }

    context.propagators.install(
      Box::new(move |tracker| {
        match tracker.state().test_literal(&holds) {
          LiteralIs::DefinitelyTrue => {
            propagate_equal_bounds(tracker, v1, v2, Some(holds))?;
          }
          LiteralIs::DefinitelyFalse => {
            // disequality: act once one side is fixed
            if let Some(value) = tracker.state().optional_single_value(v1) {
              let reason = vec![fails, Literal::equal_to(v1, value)];
              tracker.infer_not_equal(v2, value, move || Justification::Rup { reason })?;
            } else if let Some(value) = tracker.state().optional_single_value(v2) {
              let reason = vec![fails, Literal::equal_to(v2, value)];
              tracker.infer_not_equal(v1, value, move || Justification::Rup { reason })?;
            }
          }
          LiteralIs::Undecided => {
            let (lower1, upper1) = tracker.state().bounds(v1);
            let (lower2, upper2) = tracker.state().bounds(v2);
            if upper1 < lower2 || upper2 < lower1 {
              // domains are disjoint, so the equality cannot hold
              let reason = vec![
                Literal::greater_than_or_equal(v1, lower1),
                Literal::less_than(v1, upper1 + 1),
                Literal::greater_than_or_equal(v2, lower2),
                Literal::less_than(v2, upper2 + 1),
              ];
              tracker.infer(&fails, move || Justification::Rup { reason })?;
            } else if lower1 == upper1 && lower1 == lower2 && lower2 == upper2 {
              let reason = vec![Literal::equal_to(v1, lower1), Literal::equal_to(v2, lower2)];
              tracker.infer(&holds, move || Justification::Rup { reason })?;
            }
          }
        }
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([v1, v2, reif]),
      "equals reified",
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
  fn bounds_channel_both_ways() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 10, None).unwrap();
    let y = problem.create_integer_variable(4, 20, None).unwrap();
    problem.post(Equals { v1: x.into(), v2: y.into() }).unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (4, 10));
    assert_eq!(state.bounds(y), (4, 10));
  }

  #[test]
  fn equal_to_a_view_shifts() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 10, None).unwrap();
    let y = problem.create_integer_variable(0, 10, None).unwrap();
    // x = y + 7
    problem
      .post(Equals { v1: x.into(), v2: VariableId::from(y).offset(7) })
      .unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (7, 10));
    assert_eq!(state.bounds(y), (0, 3));
  }

  #[test]
  fn fixed_then_forbidden_contradicts() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(3, 3, None).unwrap();
    let y = problem.create_integer_variable(5, 5, None).unwrap();
    problem.post(Equals { v1: x.into(), v2: y.into() }).unwrap();
    let mut state = problem.initial_state();
    assert!(!problem.propagators.propagate(&mut state, None, None, None));
  }

  #[test]
  fn not_equals_removes_fixed_values() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(2, 2, None).unwrap();
    let y = problem.create_integer_variable(0, 4, None).unwrap();
    problem.post(NotEquals { v1: x.into(), v2: y.into() }).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert!(!state.in_domain(y, 2));
    assert_eq!(state.domain_size(y), 4);
  }

  #[test]
  fn reification_settles_from_the_domains() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 2, None).unwrap();
    let y = problem.create_integer_variable(5, 7, None).unwrap();
    let r = problem.create_integer_variable(0, 1, None).unwrap();
    problem
      .post(EqualsReif { v1: x.into(), v2: y.into(), reif: r.into() })
      .unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.optional_single_value(r), Some(0));
  }

  #[test]
  fn forcing_the_reification_forces_equality() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 5, None).unwrap();
    let y = problem.create_integer_variable(3, 9, None).unwrap();
    let r = problem.create_integer_variable(1, 1, None).unwrap();
    problem
      .post(EqualsReif { v1: x.into(), v2: y.into(), reif: r.into() })
      .unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (3, 5));
    assert_eq!(state.bounds(y), (3, 5));
  }

  #[test]
  fn rejects_wide_reification_variables() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 5, None).unwrap();
    let y = problem.create_integer_variable(0, 5, None).unwrap();
    let r = problem.create_integer_variable(0, 3, None).unwrap();
    let result = problem.post(EqualsReif { v1: x.into(), v2: y.into(), reif: r.into() });
    assert!(result.is_err());
  }

  #[test]
  fn reified_equality_counts_consistently() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 2, None).unwrap();
    let y = problem.create_integer_variable(0, 2, None).unwrap();
    let r = problem.create_integer_variable(0, 1, None).unwrap();
    problem
      .post(EqualsReif { v1: x.into(), v2: y.into(), reif: r.into() })
      .unwrap();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    // 9 assignments of (x, y), each with exactly one consistent value of r
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 9);
  }
}
