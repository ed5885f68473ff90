/*!

  Weighted linear constraints: `Σ cᵢ·xᵢ op k` for `op ∈ {≤, =, ≠}`, propagated to bounds
  consistency. Terms are sanitised at posting time (constants fold into the right-hand
  side, views fold into their coefficients, duplicates merge), so the propagator works over
  plain weighted simple variables.

  Each deduced bound is justified by a polynomial combination: the stored model line for the
  inequality, plus the defining line for the current bound of every other variable, divided
  by the coefficient of the changed variable.

*/

use itertools::Itertools;

use crate::errors::Error;
use crate::justification::Justification;
use crate::literal::{ConditionOperator, Literal, SimpleCondition};
use crate::problem::{Constraint, InstallContext};
use crate::proofs::{PbSum, ProofLevel, ProofLine, ProofLiteralOrFlag};
use crate::propagators::{Contradiction, PropagatorState, Triggers};
use crate::state::{InferenceTracker, LiteralIs};
use crate::variable::{SimpleVariableId, VariableId};
use crate::{div_ceil, div_floor, Integer};

/// `Σ cᵢ·xᵢ ≤ rhs`
pub struct LinearLessEqual {
  pub terms: Vec<(Integer, VariableId)>,
  pub rhs:   Integer,
}

/// `Σ cᵢ·xᵢ = rhs`
pub struct LinearEquality {
  pub terms: Vec<(Integer, VariableId)>,
  pub rhs:   Integer,
}

/// `Σ cᵢ·xᵢ ≠ rhs`
pub struct LinearNotEquals {
  pub terms: Vec<(Integer, VariableId)>,
  pub rhs:   Integer,
}

/// `reif = 1 ↔ Σ cᵢ·xᵢ ≤ rhs`, with `reif` a 0/1 variable.
pub struct LinearLessEqualReif {
  pub terms: Vec<(Integer, VariableId)>,
  pub rhs:   Integer,
  pub reif:  VariableId,
}

/// Folds constants and views away and merges duplicate variables.
fn sanitise(terms: &[(Integer, VariableId)], mut rhs: Integer) -> (Vec<(Integer, SimpleVariableId)>, Integer) {
  let mut flat: Vec<(Integer, SimpleVariableId)> = Vec::with_capacity(terms.len());
  for &(coeff, var) in terms {
    match var {
      VariableId::Constant(c) => rhs -= coeff * c,
      VariableId::Simple(simple) => flat.push((coeff, simple)),
      VariableId::View(view) => {
        rhs -= coeff * view.then_add;
        flat.push((if view.negate_first { -coeff } else { coeff }, view.actual));
      }
    }
  }
  flat.sort_by_key(|&(_, v)| v.index());
  let merged = flat
    .into_iter()
    .group_by(|&(_, v)| v)
    .into_iter()
    .map(|(var, group)| (group.map(|(c, _)| c).sum::<Integer>(), var))
    .filter(|&(c, _)| c != 0)
    .collect();
  (merged, rhs)
}

fn pb_sum(terms: &[(Integer, SimpleVariableId)]) -> PbSum {
  let mut sum = PbSum::new();
  for &(coeff, var) in terms {
    sum = sum.plus(coeff, var);
  }
  sum
}

impl Constraint for LinearLessEqual {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (terms, rhs) = sanitise(&self.terms, self.rhs);
    if terms.is_empty() {
      if 0 > rhs {
        context
          .propagators
          .model_contradiction(context.proof.as_deref_mut(), "trivially false linear inequality");
      }
      return Ok(());
    }

    let proof_line = context
      .proof
      .as_deref_mut()
      .map(|proof| proof.add_model_constraint(&pb_sum(&terms).less_equal(rhs), None));

    let trigger_vars: Vec<VariableId> = terms.iter().map(|&(_, v)| v.into()).collect();
    let captured = terms.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_linear(tracker, &captured, rhs, false, proof_line)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of(trigger_vars),
      "linear inequality",
    );
    Ok(())
  }
}

impl Constraint for LinearEquality {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (terms, rhs) = sanitise(&self.terms, self.rhs);
    if terms.is_empty() {
      if rhs != 0 {
        context
          .propagators
          .model_contradiction(context.proof.as_deref_mut(), "trivially false linear equality");
      }
      return Ok(());
    }

    // the `<=` direction takes the first line, the `>=` direction the next
    let proof_line = context
      .proof
      .as_deref_mut()
      .map(|proof| proof.add_model_constraint(&pb_sum(&terms).equal(rhs), None));

    let trigger_vars: Vec<VariableId> = terms.iter().map(|&(_, v)| v.into()).collect();
    let captured = terms.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_linear(tracker, &captured, rhs, true, proof_line)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of(trigger_vars),
      "linear equality",
    );
    Ok(())
  }
}

impl Constraint for LinearNotEquals {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (terms, rhs) = sanitise(&self.terms, self.rhs);
    if terms.is_empty() {
      if rhs == 0 {
        context
          .propagators
          .model_contradiction(context.proof.as_deref_mut(), "trivially false linear disequality");
      }
      return Ok(());
    }

    if let Some(proof) = context.proof.as_deref_mut() {
      // sum ≠ rhs: a selector decides which side of the forbidden value the sum lies on
      let side = proof.create_proof_flag("linne");
      proof.add_model_constraint(
        &pb_sum(&terms).less_equal(rhs - 1),
        Some(&[ProofLiteralOrFlag::Flag(side)]),
      );
      proof.add_model_constraint(
        &pb_sum(&terms).greater_equal(rhs + 1),
        Some(&[ProofLiteralOrFlag::Flag(!side)]),
      );
    }

    let trigger_vars: Vec<VariableId> = terms.iter().map(|&(_, v)| v.into()).collect();
    let captured = terms.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_not_equals(tracker, &captured, rhs)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers {
        on_instantiated: trigger_vars,
        ..Triggers::default()
      },
      "linear disequality",
    );
    Ok(())
  }
}

impl Constraint for LinearLessEqualReif {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let (terms, rhs) = sanitise(&self.terms, self.rhs);
    let reif = self.reif;
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
        &pb_sum(&terms).less_equal(rhs),
        Some(&[ProofLiteralOrFlag::Literal(holds)]),
      );
      proof.add_model_constraint(
        &pb_sum(&terms).greater_equal(rhs + 1),
        Some(&[ProofLiteralOrFlag::Literal(fails)]),
      );
    }

    let mut trigger_vars: Vec<VariableId> = terms.iter().map(|&(_, v)| v.into()).collect();
    trigger_vars.push(reif);
    let captured = terms.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        match tracker.state().test_literal(&holds) {
          LiteralIs::DefinitelyTrue => {
            // the reified halves lack an unconditional model line, so bounds are settled
            // by reverse unit propagation from the half-reified lines instead of `p` steps
            propagate_reified_side(tracker, &captured, rhs, false, holds)?;
          }
          LiteralIs::DefinitelyFalse => {
            // negation: Σ c·x ≥ rhs + 1, i.e. Σ -c·x ≤ -rhs - 1
            propagate_reified_side(tracker, &captured, rhs, true, fails)?;
          }
          LiteralIs::Undecided => {
            let bounds: Vec<(Integer, Integer)> =
              captured.iter().map(|&(_, v)| tracker.state().bounds(v)).collect();
            let minimum: Integer = contribution_sum(&captured, &bounds, false);
            let maximum: Integer = -contribution_sum(&captured, &bounds, true);
            if minimum > rhs {
              let reason = bounds_reason(&captured, &bounds, false, None);
              tracker.infer(&fails, move || Justification::Rup { reason })?;
            } else if maximum <= rhs {
              let reason = bounds_reason(&captured, &bounds, true, None);
              tracker.infer(&holds, move || Justification::Rup { reason })?;
            }
          }
        }
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of(trigger_vars),
      "linear inequality reified",
    );
    Ok(())
  }
}

/// The smallest value `Σ (±c)·x` can take under the given bounds.
fn contribution_sum(
  terms: &[(Integer, SimpleVariableId)],
  bounds: &[(Integer, Integer)],
  flip: bool,
) -> Integer {
  terms
    .iter()
    .zip(bounds)
    .map(|(&(coeff, _), &(lower, upper))| {
      let c = if flip { -coeff } else { coeff };
      if c > 0 {
        c * lower
      } else {
        c * upper
      }
    })
    .sum()
}

/// Bounds consistency for one decided side of a reified inequality. With `flip`, enforces
/// the negated side `Σ c·x ≥ rhs + 1`. Every inference carries the deciding literal in its
/// reason and is discovered by the verifier through the half-reified model lines.
fn propagate_reified_side(
  tracker: &mut InferenceTracker,
  terms: &[(Integer, SimpleVariableId)],
  rhs: Integer,
  flip: bool,
  deciding: Literal,
) -> Result<(), Contradiction> {
  let bounds: Vec<(Integer, Integer)> = terms.iter().map(|&(_, v)| tracker.state().bounds(v)).collect();
  let effective_rhs = if flip { -rhs - 1 } else { rhs };
  let minimum = contribution_sum(terms, &bounds, flip);

  if minimum > effective_rhs {
    let mut reason = bounds_reason(terms, &bounds, flip, None);
    reason.push(deciding);
    tracker.infer(&Literal::False, || Justification::Rup { reason })?;
    return Ok(());
  }

  for (index, &(coeff, var)) in terms.iter().enumerate() {
    let c = if flip { -coeff } else { coeff };
    let contribution = if c > 0 { c * bounds[index].0 } else { c * bounds[index].1 };
    let slack = effective_rhs - (minimum - contribution);

    if c > 0 {
      let new_upper = div_floor(slack, c);
      if new_upper < bounds[index].1 {
        let mut reason = bounds_reason(terms, &bounds, flip, Some(index));
        reason.push(deciding);
        tracker.infer_less_than(var, new_upper + 1, move || Justification::Rup { reason })?;
      }
    } else {
      let new_lower = div_ceil(slack, c);
      if new_lower > bounds[index].0 {
        let mut reason = bounds_reason(terms, &bounds, flip, Some(index));
        reason.push(deciding);
        tracker.infer_greater_than_or_equal(var, new_lower, move || Justification::Rup { reason })?;
      }
    }
  }
  Ok(())
}

// region Bounds-consistency propagation

fn propagate_linear(
  tracker: &mut InferenceTracker,
  terms: &[(Integer, SimpleVariableId)],
  rhs: Integer,
  equality: bool,
  proof_line: Option<ProofLine>,
) -> Result<(), Contradiction> {
  let bounds: Vec<(Integer, Integer)> = terms.iter().map(|&(_, v)| tracker.state().bounds(v)).collect();
  infer_one_direction(tracker, terms, &bounds, rhs, false, proof_line)?;
  if equality {
    infer_one_direction(tracker, terms, &bounds, rhs, true, proof_line)?;
  }
  Ok(())
}

/// One `≤` direction. With `flip`, works on the negated terms (the `≥` half of an
/// equality), whose model line sits just after the `≤` one.
fn infer_one_direction(
  tracker: &mut InferenceTracker,
  terms: &[(Integer, SimpleVariableId)],
  bounds: &[(Integer, Integer)],
  rhs: Integer,
  flip: bool,
  proof_line: Option<ProofLine>,
) -> Result<(), Contradiction> {
  let effective = |coeff: Integer| if flip { -coeff } else { coeff };
  let effective_rhs = if flip { -rhs } else { rhs };
  let line = proof_line.map(|line| if flip { line + 1 } else { line });

  let minimum: Integer = terms
    .iter()
    .zip(bounds)
    .map(|(&(c, _), &(lower, upper))| {
      let c = effective(c);
      if c > 0 {
        c * lower
      } else {
        c * upper
      }
    })
    .sum();

  if minimum > effective_rhs {
    let reason = bounds_reason(terms, bounds, flip, None);
    tracker.infer(&Literal::False, || Justification::Rup { reason })?;
    return Ok(());
  }

  for (index, &(coeff, var)) in terms.iter().enumerate() {
    let c = effective(coeff);
    let contribution = if c > 0 { c * bounds[index].0 } else { c * bounds[index].1 };
    let slack = effective_rhs - (minimum - contribution);

    if c > 0 {
      let new_upper = div_floor(slack, c);
      if new_upper < bounds[index].1 {
        let why = bound_justification(terms, bounds, flip, index, line, c);
        tracker.infer_less_than(var, new_upper + 1, why)?;
      }
    } else {
      let new_lower = div_ceil(slack, c);
      if new_lower > bounds[index].0 {
        let why = bound_justification(terms, bounds, flip, index, line, c);
        tracker.infer_greater_than_or_equal(var, new_lower, why)?;
      }
    }
  }
  Ok(())
}

/// The currently-known bounds of every term except `skip` (all terms when `skip` is none):
/// the lower bound for positively-weighted terms, the upper bound otherwise.
fn bounds_reason(
  terms: &[(Integer, SimpleVariableId)],
  bounds: &[(Integer, Integer)],
  flip: bool,
  skip: Option<usize>,
) -> Vec<Literal> {
  terms
    .iter()
    .zip(bounds)
    .enumerate()
    .filter(|&(index, _)| Some(index) != skip)
    .map(|(_, (&(coeff, var), &(lower, upper)))| {
      let c = if flip { -coeff } else { coeff };
      if c < 0 {
        Literal::less_than(var, upper + 1)
      } else {
        Literal::greater_than_or_equal(var, lower)
      }
    })
    .collect()
}

/// The explicit justification for a deduced bound: a `p` line multiplying the stored
/// inequality by one, adding each other variable's bound-defining line weighted by its
/// coefficient, and dividing by the changed variable's.
fn bound_justification(
  terms: &[(Integer, SimpleVariableId)],
  bounds: &[(Integer, Integer)],
  flip: bool,
  changed: usize,
  line: Option<ProofLine>,
  changed_coeff: Integer,
) -> impl FnOnce() -> Justification {
  let reason = bounds_reason(terms, bounds, flip, Some(changed));
  let mut items: Vec<(Integer, SimpleCondition)> = Vec::new();
  for (index, (&(coeff, var), &(lower, upper))) in terms.iter().zip(bounds).enumerate() {
    if index == changed {
      continue;
    }
    let c = if flip { -coeff } else { coeff };
    let cond = if c < 0 {
      SimpleCondition { var, op: ConditionOperator::Less, value: upper + 1 }
    } else {
      SimpleCondition { var, op: ConditionOperator::GreaterEqual, value: lower }
    };
    items.push((c.abs(), cond));
  }
  let divisor = changed_coeff.abs();

  move || {
    let line = match line {
      Some(line) => line,
      // proofs are on, so the model line exists
      None => panic!("linear propagator has no model line but proof logging is enabled"),
    };
    Justification::Explicit {
      steps: Box::new(move |proof, _reason| {
        proof.emit_proof_comment("justifying integer linear inequality");
        let mut text = format!("p {}", line);
        for (weight, cond) in items {
          let item = proof.need_pol_item_defining_literal(&cond);
          if weight == 1 {
            text.push_str(&format!(" {} +", item));
          } else {
            text.push_str(&format!(" {} {} * +", item, weight));
          }
        }
        if divisor != 1 {
          text.push_str(&format!(" {} d", divisor));
        }
        proof.emit_proof_line(&text, ProofLevel::Temporary);
      }),
      reason,
    }
  }
}

// endregion

// region Disequality propagation

fn propagate_not_equals(
  tracker: &mut InferenceTracker,
  terms: &[(Integer, SimpleVariableId)],
  rhs: Integer,
) -> Result<(), Contradiction> {
  let mut fixed_sum = 0;
  let mut unfixed: Option<(Integer, SimpleVariableId)> = None;

  for &(coeff, var) in terms {
    match tracker.state().optional_single_value(var) {
      Some(value) => fixed_sum += coeff * value,
      None => {
        if unfixed.is_some() {
          // two or more unfixed variables: nothing to do yet
          return Ok(());
        }
        unfixed = Some((coeff, var));
      }
    }
  }

  let equality_reason = |tracker: &InferenceTracker, skip: Option<SimpleVariableId>| {
    terms
      .iter()
      .filter(|&&(_, v)| Some(v) != skip)
      .map(|&(_, v)| {
        Literal::equal_to(
          v,
          tracker
            .state()
            .optional_single_value(v)
            .unwrap_or_else(|| tracker.state().lower_bound(v)),
        )
      })
      .collect::<Vec<_>>()
  };

  match unfixed {
    None => {
      if fixed_sum == rhs {
        let reason = equality_reason(tracker, None);
        tracker.infer(&Literal::False, || Justification::Rup { reason })?;
      }
      Ok(())
    }
    Some((coeff, var)) => {
      let remainder = rhs - fixed_sum;
      if remainder % coeff == 0 {
        let forbidden = remainder / coeff;
        let reason = equality_reason(tracker, Some(var));
        tracker.infer_not_equal(var, forbidden, move || Justification::Rup { reason })?;
      }
      Ok(())
    }
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::Problem;
  use crate::propagators::comparison::Comparison;
  use crate::search::{solve, SolveCallbacks};

  fn vars(problem: &mut Problem, n: usize, lower: Integer, upper: Integer) -> Vec<SimpleVariableId> {
    (0..n)
      .map(|_| problem.create_integer_variable(lower, upper, None).unwrap())
      .collect()
  }

  #[test]
  fn sanitise_folds_constants_views_and_duplicates() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 9, None).unwrap();
    let view = VariableId::from(x).negated().offset(3); // 3 - x
    let (terms, rhs) = sanitise(
      &[(2, x.into()), (1, view), (1, VariableId::Constant(5))],
      10,
    );
    // 2x + (3 - x) + 5 <= 10  ==>  x <= 2
    assert_eq!(terms, vec![(1, x)]);
    assert_eq!(rhs, 2);
  }

  #[test]
  fn unsatisfiable_pair_fails_at_the_root() {
    let mut problem = Problem::new();
    let v = vars(&mut problem, 2, 0, 5);
    let terms: Vec<(Integer, VariableId)> = v.iter().map(|&x| (1, x.into())).collect();
    problem.post(LinearLessEqual { terms: terms.clone(), rhs: 2 }).unwrap();
    // x + y >= 10 as -x - y <= -10
    let negated: Vec<(Integer, VariableId)> = v.iter().map(|&x| (-1, x.into())).collect();
    problem.post(LinearLessEqual { terms: negated, rhs: -10 }).unwrap();

    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.solutions, 0);
    assert_eq!(stats.recursions, 0);
    assert!(stats.completed);
  }

  #[test]
  fn bounds_tighten_at_the_root() {
    let mut problem = Problem::new();
    let v = vars(&mut problem, 2, 0, 5);
    let terms: Vec<(Integer, VariableId)> = v.iter().map(|&x| (1, x.into())).collect();
    problem.post(LinearLessEqual { terms, rhs: 2 }).unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(v[0]), (0, 2));
    assert_eq!(state.bounds(v[1]), (0, 2));
  }

  #[test]
  fn equality_tightens_both_directions() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 10, None).unwrap();
    let y = problem.create_integer_variable(4, 6, None).unwrap();
    problem
      .post(LinearEquality { terms: vec![(1, x.into()), (1, y.into())], rhs: 10 })
      .unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (4, 6));
  }

  #[test]
  fn negative_coefficients_round_correctly() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(-10, 10, None).unwrap();
    // -3x <= -7  ==>  x >= ceil(7/3) = 3
    problem.post(LinearLessEqual { terms: vec![(-3, x.into())], rhs: -7 }).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.lower_bound(x), 3);
  }

  #[test]
  fn disequality_removes_the_last_value() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 5, None).unwrap();
    let y = problem.create_integer_variable(2, 2, None).unwrap();
    problem
      .post(LinearNotEquals { terms: vec![(1, x.into()), (2, y.into())], rhs: 7 })
      .unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    // x + 2*2 != 7 forbids x = 3
    assert!(!state.in_domain(x, 3));
    assert_eq!(state.domain_size(x), 5);
  }

  #[test]
  fn reified_inequality_settles_and_forces() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 5, None).unwrap();
    let y = problem.create_integer_variable(0, 5, None).unwrap();
    let r = problem.create_integer_variable(0, 1, None).unwrap();
    problem
      .post(LinearLessEqualReif {
        terms: vec![(1, x.into()), (1, y.into())],
        rhs:   3,
        reif:  r.into(),
      })
      .unwrap();

    // forcing the reification true enforces the inequality
    problem.post(Comparison::greater_than_equal(r, 1)).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (0, 3));
    assert_eq!(state.bounds(y), (0, 3));
  }

  #[test]
  fn reified_inequality_reports_a_decided_sum() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(4, 5, None).unwrap();
    let y = problem.create_integer_variable(4, 5, None).unwrap();
    let r = problem.create_integer_variable(0, 1, None).unwrap();
    problem
      .post(LinearLessEqualReif {
        terms: vec![(1, x.into()), (1, y.into())],
        rhs:   3,
        reif:  r.into(),
      })
      .unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    // the sum is at least 8, so the inequality cannot hold
    assert_eq!(state.optional_single_value(r), Some(0));
  }

  #[test]
  fn counting_solutions_of_a_sum() {
    let mut problem = Problem::new();
    let v = vars(&mut problem, 2, 0, 9);
    let terms: Vec<(Integer, VariableId)> = v.iter().map(|&x| (1, x.into())).collect();
    problem.post(LinearEquality { terms, rhs: 9 }).unwrap();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 10);
  }

  #[test]
  fn certified_unsat_writes_wellformed_proof_files() {
    use crate::parameters::ProofOptions;

    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("linear").to_string_lossy().to_string();
    let options = ProofOptions::new(&basename);

    let mut problem = Problem::with_proof(&options);
    let v = vars(&mut problem, 2, 0, 5);
    let terms: Vec<(Integer, VariableId)> = v.iter().map(|&x| (1, x.into())).collect();
    problem.post(LinearLessEqual { terms, rhs: 2 }).unwrap();
    let negated: Vec<(Integer, VariableId)> = v.iter().map(|&x| (-1, x.into())).collect();
    problem.post(LinearLessEqual { terms: negated, rhs: -10 }).unwrap();

    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.solutions, 0);

    let opb = std::fs::read_to_string(&options.opb_file).unwrap();
    assert!(opb.starts_with("* #variable= "));
    assert!(opb.contains(">= "));

    let proof = std::fs::read_to_string(&options.proof_file).unwrap();
    assert!(proof.starts_with("pseudo-Boolean proof version 2.0\n"));
    assert!(proof.contains("\nconclusion UNSAT"));
    assert!(proof.ends_with("end pseudo-Boolean proof\n"));
  }
}
