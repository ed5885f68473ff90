/*!

  When a propagator makes an inference it attaches a `Justification` telling the proof logger
  how to certify it. Justifications are built lazily: the inference tracker only invokes the
  justification constructor when proof logging is enabled, so the reason literals and any
  captured proof lines cost nothing in a plain solve.

*/

use crate::literal::{ConditionOperator, Literal, Literals};
use crate::proofs::Proof;
use crate::state::State;
use crate::variable::VariableId;

/// The literals whose conjunction justifies an inference, assembled from the state as it was
/// before the inference took effect.
pub type Reason = Literals;

/// Steps emitted into the proof before the final inference line, for reasoning the verifier
/// cannot discover by reverse unit propagation alone. The closure may capture proof lines and
/// immutable data recorded at posting time, but never references into the state store.
pub type ProofSteps = Box<dyn FnOnce(&mut Proof, &Reason)>;

pub enum Justification {
  /// Trusted; no proof step is emitted.
  NoJustificationNeeded,
  /// A decision, not an inference.
  Guess,
  /// Derivable by reverse unit propagation from the currently known constraints; the logger
  /// emits a single `u` line from the reason.
  Rup { reason: Reason },
  /// Same shape, emitted as an assertion rather than RUP.
  Assert { reason: Reason },
  /// The closure emits whatever intermediate lines are needed, at the temporary proof level;
  /// the logger then wraps them with the final inference and forgets the level.
  Explicit { steps: ProofSteps, reason: Reason },
}

impl Justification {
  pub fn rup_with(reason: Reason) -> Justification {
    Justification::Rup { reason }
  }
}

/// A reason describing everything currently known about the given variables: their bounds,
/// plus the individual holes for domains that have them. The blunt instrument used when a
/// propagator's reasoning involved whole domains rather than a couple of bounds.
pub(crate) fn generic_reason(state: &State, vars: &[VariableId]) -> Reason {
  let mut reason = Reason::new();
  for &var in vars {
    let (lower, upper) = state.bounds(var);
    reason.push(Literal::greater_than_or_equal(var, lower));
    reason.push(Literal::less_than(var, upper + 1));
    if state.domain_has_holes(var) {
      let mut value = lower;
      for present in state.each_value(var) {
        while value < present {
          reason.push(Literal::not_equal_to(var, value));
          value += 1;
        }
        value = present + 1;
      }
    }
  }
  reason
}

/// Is this literal one the proof layer needs no name for?
pub(crate) fn is_literally_true(lit: &Literal) -> bool {
  matches!(lit, Literal::True)
    || matches!(
      lit,
      Literal::Condition(cond)
        if matches!(cond.var, VariableId::Constant(c)
          if trivially_holds(c, cond.op, cond.value))
    )
}

fn trivially_holds(c: crate::Integer, op: ConditionOperator, value: crate::Integer) -> bool {
  match op {
    ConditionOperator::Equal        => c == value,
    ConditionOperator::NotEqual     => c != value,
    ConditionOperator::Less         => c < value,
    ConditionOperator::GreaterEqual => c >= value,
  }
}
