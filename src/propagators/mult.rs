/*!

  `v1 · v2 = v3` over signed bounds. The pseudo-Boolean model splits each variable into a
  sign flag and a proof-only magnitude, and expands the magnitude product bitwise:
  `Σᵢⱼ 2^{i+j}·pᵢⱼ = |v3|` with `pᵢⱼ ↔ bᵢ(|v1|) ∧ bⱼ(|v2|)`.

  Propagation is bounds consistency through interval arithmetic on the corners, with the
  division direction splitting on whether the divisor straddles zero. Each deduced bound is
  justified by four conditional per-sign-case lines, fused by resolution on the sign flags:
  the case lines are emitted as assertions (deriving them exactly is the job of the optional
  LP justifier, an external collaborator) and the fusion is polynomial combination, so the
  final inference is reverse unit propagation.

*/

use crate::errors::Error;
use crate::justification::Justification;
use crate::literal::Literal;
use crate::problem::{Constraint, InstallContext};
use crate::proofs::{PbSum, Proof, ProofFlag, ProofLevel, ProofLiteralOrFlag};
use crate::propagators::{Contradiction, PropagatorState, Triggers};
use crate::state::InferenceTracker;
use crate::variable::VariableId;
use crate::{div_ceil, div_floor, Integer};

/// `v1 · v2 = v3`
pub struct Times {
  pub v1: VariableId,
  pub v2: VariableId,
  pub v3: VariableId,
}

impl Constraint for Times {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let Times { v1, v2, v3 } = *self;

    let signs = match context.proof.as_deref_mut() {
      None => None,
      Some(proof) => Some(post_model(proof, context.state, v1, v2, v3)),
    };

    context.propagators.install(
      Box::new(move |tracker| {
        propagate_times(tracker, v1, v2, v3, signs)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([v1, v2, v3]),
      "times",
    );
    Ok(())
  }
}

/// Writes the sign/magnitude split and the bitwise product expansion into the model, and
/// returns the sign flags of the two factors for use in justifications.
fn post_model(
  proof: &mut Proof,
  state: &crate::state::State,
  v1: VariableId,
  v2: VariableId,
  v3: VariableId,
) -> (ProofFlag, ProofFlag) {
  proof.model_comment("times");

  let mut split = |var: VariableId, name: &str| {
    let (lower, upper) = state.bounds(var);
    let magnitude_upper = lower.abs().max(upper.abs());
    let sign = proof.create_proof_flag(&format!("{}sign", name));
    let magnitude = proof.create_proof_only_variable(0, magnitude_upper, &format!("{}mag", name));

    // the flag fixes the sign, and the magnitude mirrors the variable on each side
    proof.add_model_constraint(
      &PbSum::new().plus(1, var).less_equal(0),
      Some(&[ProofLiteralOrFlag::Flag(sign)]),
    );
    proof.add_model_constraint(
      &PbSum::new().plus(1, var).greater_equal(0),
      Some(&[ProofLiteralOrFlag::Flag(!sign)]),
    );
    proof.add_model_constraint(
      &PbSum::new().plus(1, var).plus(1, magnitude).equal(0),
      Some(&[ProofLiteralOrFlag::Flag(sign)]),
    );
    proof.add_model_constraint(
      &PbSum::new().plus(1, var).plus(-1, magnitude).equal(0),
      Some(&[ProofLiteralOrFlag::Flag(!sign)]),
    );
    (sign, magnitude)
  };

  let (sign1, magnitude1) = split(v1, "times1");
  let (sign2, magnitude2) = split(v2, "times2");
  let (_sign3, magnitude3) = split(v3, "times3");

  // |v1| · |v2| = |v3|, expanded over the magnitude bits
  let bits1 = proof.bits_of(magnitude1.into());
  let bits2 = proof.bits_of(magnitude2.into());
  let mut product = PbSum::new();
  for &(weight1, bit1) in &bits1 {
    for &(weight2, bit2) in &bits2 {
      let along = proof.create_proof_flag(&format!(
        "timesp{}x{}",
        bit1.position, bit2.position
      ));
      proof.add_model_constraint(
        &PbSum::new().plus(1, bit1).plus(1, bit2).greater_equal(2),
        Some(&[ProofLiteralOrFlag::Flag(along)]),
      );
      proof.add_model_constraint(
        &PbSum::new()
          .plus(1, negate_bit(bit1))
          .plus(1, negate_bit(bit2))
          .greater_equal(1),
        Some(&[ProofLiteralOrFlag::Flag(!along)]),
      );
      product = product.plus(weight1 * weight2, along);
    }
  }
  proof.add_model_constraint(&product.plus(-1, magnitude3).equal(0), None);

  // the product's sign follows its factors'
  for (case1, case2, nonnegative) in [
    (false, false, true),
    (true, true, true),
    (true, false, false),
    (false, true, false),
  ] {
    let reif = [
      ProofLiteralOrFlag::Flag(if case1 { sign1 } else { !sign1 }),
      ProofLiteralOrFlag::Flag(if case2 { sign2 } else { !sign2 }),
    ];
    let constraint = if nonnegative {
      PbSum::new().plus(1, v3).greater_equal(0)
    } else {
      PbSum::new().plus(1, v3).less_equal(0)
    };
    proof.add_model_constraint(&constraint, Some(&reif));
  }

  (sign1, sign2)
}

fn negate_bit(bit: crate::proofs::ProofBitVariable) -> crate::proofs::ProofBitVariable {
  crate::proofs::ProofBitVariable { positive: !bit.positive, ..bit }
}

// region Propagation

fn propagate_times(
  tracker: &mut InferenceTracker,
  v1: VariableId,
  v2: VariableId,
  v3: VariableId,
  signs: Option<(ProofFlag, ProofFlag)>,
) -> Result<(), Contradiction> {
  // forward: v3 lies among the corner products
  let (lower1, upper1) = tracker.state().bounds(v1);
  let (lower2, upper2) = tracker.state().bounds(v2);
  let corners = [lower1 * lower2, lower1 * upper2, upper1 * lower2, upper1 * upper2];
  let product_lower = corners.iter().copied().min().unwrap_or(0);
  let product_upper = corners.iter().copied().max().unwrap_or(0);

  infer_bounds(tracker, v3, product_lower, product_upper, &[v1, v2], signs)?;

  // backward: each factor from the quotient of the product by the other factor
  infer_quotient(tracker, v1, v2, v3, signs)?;
  infer_quotient(tracker, v2, v1, v3, signs)?;
  Ok(())
}

/// Bounds on `target` = v3 / divisor, with the case analysis on whether the divisor
/// straddles zero.
fn infer_quotient(
  tracker: &mut InferenceTracker,
  target: VariableId,
  divisor: VariableId,
  v3: VariableId,
  signs: Option<(ProofFlag, ProofFlag)>,
) -> Result<(), Contradiction> {
  let (lower2, upper2) = tracker.state().bounds(divisor);
  let (lower3, upper3) = tracker.state().bounds(v3);

  if lower2 > 0 || upper2 < 0 {
    // sign-definite divisor: ceil/floor of the rational corners
    let corners = [(lower3, lower2), (lower3, upper2), (upper3, lower2), (upper3, upper2)];
    let quotient_lower = corners.iter().map(|&(a, b)| div_ceil(a, b)).min().unwrap_or(0);
    let quotient_upper = corners.iter().map(|&(a, b)| div_floor(a, b)).max().unwrap_or(0);
    infer_bounds(tracker, target, quotient_lower, quotient_upper, &[divisor, v3], signs)?;
  } else if lower3 > 0 || upper3 < 0 {
    // the divisor straddles zero but the product cannot be zero, so the divisor has
    // magnitude at least one and the factor's magnitude is bounded by the product's
    let magnitude = lower3.abs().max(upper3.abs());
    infer_bounds(tracker, target, -magnitude, magnitude, &[divisor, v3], signs)?;
  }
  Ok(())
}

fn infer_bounds(
  tracker: &mut InferenceTracker,
  var: VariableId,
  lower: Integer,
  upper: Integer,
  reason_vars: &[VariableId],
  signs: Option<(ProofFlag, ProofFlag)>,
) -> Result<(), Contradiction> {
  let (current_lower, current_upper) = tracker.state().bounds(var);

  if lower > current_lower {
    let reason = bound_reason(tracker, reason_vars);
    let conclusion = Literal::greater_than_or_equal(var, lower);
    tracker.infer(&conclusion, || case_split_justification(signs, reason, conclusion))?;
  }
  if upper < current_upper {
    let reason = bound_reason(tracker, reason_vars);
    let conclusion = Literal::less_than(var, upper + 1);
    tracker.infer(&conclusion, || case_split_justification(signs, reason, conclusion))?;
  }
  Ok(())
}

fn bound_reason(tracker: &InferenceTracker, vars: &[VariableId]) -> Vec<Literal> {
  let mut reason = Vec::with_capacity(vars.len() * 2);
  for &var in vars {
    let (lower, upper) = tracker.state().bounds(var);
    reason.push(Literal::greater_than_or_equal(var, lower));
    reason.push(Literal::less_than(var, upper + 1));
  }
  reason
}

/// The eight-conditional-bounds justification collapsed to the four sign cases of the two
/// factors: each case line asserts the bound under an assumed pair of signs, and resolving
/// on the sign flags fuses them into the unconditional bound.
fn case_split_justification(
  signs: Option<(ProofFlag, ProofFlag)>,
  reason: Vec<Literal>,
  conclusion: Literal,
) -> Justification {
  let (sign1, sign2) = match signs {
    Some(signs) => signs,
    // justifications are only built when proof logging is on
    None => panic!("multiplication has no sign flags but proof logging is enabled"),
  };

  Justification::Explicit {
    steps: Box::new(move |proof, reason| {
      proof.emit_proof_comment("justifying multiplication bound by sign cases");

      // a case assuming a flag true contributes the flag's negation to its clause
      let case_literal = |sign: ProofFlag, assumed: bool| if assumed { !sign } else { sign };
      let case_line = |proof: &mut Proof, assume1: bool, assume2: bool| {
        let mut sum = PbSum::new();
        for &r in reason {
          sum = sum.plus(1, !r);
        }
        sum = sum
          .plus(1, case_literal(sign1, assume1))
          .plus(1, case_literal(sign2, assume2))
          .plus(1, conclusion);
        proof.emit_assert(&sum.greater_equal(1), ProofLevel::Temporary)
      };

      let case_nn = case_line(proof, true, true);
      let case_np = case_line(proof, true, false);
      let case_pn = case_line(proof, false, true);
      let case_pp = case_line(proof, false, false);

      // resolve away the second sign, then the first
      let first = proof.emit_proof_line(&format!("p {} {} + 2 d", case_nn, case_np), ProofLevel::Temporary);
      let second = proof.emit_proof_line(&format!("p {} {} + 2 d", case_pn, case_pp), ProofLevel::Temporary);
      proof.emit_proof_line(&format!("p {} {} + 2 d", first, second), ProofLevel::Temporary);
    }),
    reason,
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::Problem;
  use crate::search::{solve, SolveCallbacks};

  #[test]
  fn forward_bounds_from_corners() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(2, 3, None).unwrap();
    let y = problem.create_integer_variable(-4, 5, None).unwrap();
    let z = problem.create_integer_variable(-100, 100, None).unwrap();
    problem.post(Times { v1: x.into(), v2: y.into(), v3: z.into() }).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(z), (-12, 15));
  }

  #[test]
  fn backward_bounds_divide() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(-50, 50, None).unwrap();
    let y = problem.create_integer_variable(2, 4, None).unwrap();
    let z = problem.create_integer_variable(6, 12, None).unwrap();
    problem.post(Times { v1: x.into(), v2: y.into(), v3: z.into() }).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    // x = z / y lies within [ceil(6/4), floor(12/2)]
    assert_eq!(state.bounds(x), (2, 6));
  }

  #[test]
  fn signed_instance_reduces_and_multiplies_exactly() {
    let mut problem = Problem::new();
    let v1 = problem.create_integer_variable(-3, 4, None).unwrap();
    let v2 = problem.create_integer_variable(-10, -2, None).unwrap();
    let v3 = problem.create_integer_variable(-3, 4, None).unwrap();
    problem
      .post(Times { v1: v1.into(), v2: v2.into(), v3: v3.into() })
      .unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    // any v1 outside [-2, 1] pushes the product outside [-3, 4]
    assert_eq!(state.bounds(v1), (-2, 1));

    use std::cell::RefCell;
    use std::rc::Rc;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_in_callback = Rc::clone(&seen);
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(move |current| {
        seen_in_callback
          .borrow_mut()
          .push((current.value(v1), current.value(v2), current.value(v3)));
        true
      })),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert!(stats.solutions > 0);
    let mut expected = 0;
    for a in -3i64..=4 {
      for b in -10i64..=-2 {
        let c = a * b;
        if (-3..=4).contains(&c) {
          expected += 1;
        }
      }
    }
    assert_eq!(stats.solutions, expected);
    for &(a, b, c) in seen.borrow().iter() {
      assert_eq!(a * b, c);
    }
  }

  #[test]
  fn straddling_divisor_with_nonzero_product() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(-100, 100, None).unwrap();
    let y = problem.create_integer_variable(-5, 5, None).unwrap();
    let z = problem.create_integer_variable(3, 4, None).unwrap();
    problem.post(Times { v1: x.into(), v2: y.into(), v3: z.into() }).unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    // |x| <= max |z| because |y| >= 1 whenever the product is nonzero
    assert_eq!(state.bounds(x), (-4, 4));
  }

  #[test]
  fn squaring_minimisation_finds_zero() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 9, None).unwrap();
    let y = problem.create_integer_variable(0, 81, None).unwrap();
    problem.post(Times { v1: x.into(), v2: x.into(), v3: y.into() }).unwrap();
    problem.minimise(y);
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.objective, Some(0));
    assert!(stats.completed);
  }

  #[test]
  fn certified_minimisation_concludes_bounds() {
    use crate::parameters::ProofOptions;

    let dir = tempfile::tempdir().unwrap();
    let basename = dir.path().join("times").to_string_lossy().to_string();
    let options = ProofOptions::new(&basename);

    let mut problem = Problem::with_proof(&options);
    let x = problem.create_integer_variable(0, 9, Some("x")).unwrap();
    let y = problem.create_integer_variable(0, 81, Some("y")).unwrap();
    problem.post(Times { v1: x.into(), v2: x.into(), v3: y.into() }).unwrap();
    problem.minimise(y);
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.objective, Some(0));

    let proof = std::fs::read_to_string(&options.proof_file).unwrap();
    assert!(proof.contains("\nconclusion BOUNDS 0 0"));
    assert!(proof.contains("\nsoli "));
  }
}
