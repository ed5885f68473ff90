/*!

  The propagator registry and the event-driven fixpoint scheduler.

  A propagator is a boxed closure following the inference contract: it reads the state and
  makes inferences through the tracker it is handed, returning whether it wants to stay
  enabled, or an `Err(Contradiction)` as soon as an inference empties a domain. Each
  propagator is installed with a trigger set; the scheduler wakes propagators from the
  `(variable, HowChanged)` events drained out of the state store, runs them until the queue
  is empty, and reports whether a contradiction was reached.

*/

pub mod all_different;
pub mod comparison;
pub mod equals;
pub mod linear;
pub mod mult;
pub mod table;

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use bit_set::BitSet;
use log::trace;

use crate::domain::HowChanged;
use crate::justification::Justification;
use crate::literal::Literal;
use crate::proofs::Proof;
use crate::resource_limit::ResourceLimit;
use crate::state::{InferenceTracker, State};
use crate::variable::VariableId;
use crate::Integer;

/// An inference emptied a domain. The expected way to prove unsatisfiability below a
/// decision, not an error.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Contradiction;

/// What a propagator wants done with itself after an invocation.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PropagatorState {
  Enable,
  /// Skip this propagator until the epoch that disabled it is popped.
  DisableUntilBacktrack,
}

pub type PropagationResult = Result<PropagatorState, Contradiction>;
pub type PropagationFunction = Box<dyn FnMut(&mut InferenceTracker) -> PropagationResult>;

/// Which domain events wake a propagator. An `on_change` trigger wakes on any reduction;
/// `on_bounds` skips pure interior-value changes; `on_instantiated` fires only when a
/// variable collapses to a singleton.
#[derive(Clone, Debug, Default)]
pub struct Triggers {
  pub on_change:       Vec<VariableId>,
  pub on_bounds:       Vec<VariableId>,
  pub on_instantiated: Vec<VariableId>,
}

impl Triggers {
  pub fn on_bounds_of(vars: impl IntoIterator<Item = VariableId>) -> Triggers {
    Triggers { on_bounds: vars.into_iter().collect(), ..Triggers::default() }
  }

  pub fn on_change_of(vars: impl IntoIterator<Item = VariableId>) -> Triggers {
    Triggers { on_change: vars.into_iter().collect(), ..Triggers::default() }
  }
}

#[derive(Clone, Debug, Default)]
struct TriggerIds {
  on_change:       Vec<usize>,
  on_bounds:       Vec<usize>,
  on_instantiated: Vec<usize>,
}

/// The table of installed propagators plus the scheduler that drives them to a fixpoint.
pub struct Propagators {
  functions:    Vec<PropagationFunction>,
  descriptions: Vec<String>,
  disabled:     Rc<RefCell<BitSet>>,
  // indexed by simple variable index
  triggers: Vec<TriggerIds>,

  total_propagations:         u64,
  effectful_propagations:     u64,
  contradicting_propagations: u64,
  first:                      bool,
}

impl Default for Propagators {
  fn default() -> Self {
    Propagators::new()
  }
}

impl Propagators {
  pub fn new() -> Propagators {
    Propagators {
      functions: Vec::new(),
      descriptions: Vec::new(),
      disabled: Rc::new(RefCell::new(BitSet::new())),
      triggers: Vec::new(),
      total_propagations: 0,
      effectful_propagations: 0,
      contradicting_propagations: 0,
      first: true,
    }
  }

  pub fn number_of_propagators(&self) -> usize {
    self.functions.len()
  }

  pub(crate) fn counters(&self) -> (u64, u64, u64) {
    (
      self.total_propagations,
      self.effectful_propagations,
      self.contradicting_propagations,
    )
  }

  /// Installs a propagator with its trigger set. Constant trigger variables are ignored;
  /// views trigger on their underlying variable.
  pub fn install(&mut self, function: PropagationFunction, triggers: Triggers, name: &str) -> usize {
    let id = self.functions.len();
    self.functions.push(function);
    self.descriptions.push(name.to_string());

    let mut add = |vars: &[VariableId], pick: fn(&mut TriggerIds) -> &mut Vec<usize>| {
      for var in vars {
        if let Some(simple) = var.underlying() {
          if self.triggers.len() <= simple.index() {
            self.triggers.resize_with(simple.index() + 1, TriggerIds::default);
          }
          pick(&mut self.triggers[simple.index()]).push(id);
        }
      }
    };
    add(&triggers.on_change, |t| &mut t.on_change);
    add(&triggers.on_bounds, |t| &mut t.on_bounds);
    add(&triggers.on_instantiated, |t| &mut t.on_instantiated);

    id
  }

  /// The model is trivially false: record an empty clause and a propagator that always
  /// contradicts.
  pub(crate) fn model_contradiction(&mut self, proof: Option<&mut Proof>, explain: &str) {
    if let Some(proof) = proof {
      proof.model_comment(explain);
      proof.add_model_cnf(&[]);
    }
    self.install(
      Box::new(move |tracker| {
        tracker.infer(&Literal::False, || Justification::Rup { reason: Vec::new() })?;
        Err(Contradiction)
      }),
      Triggers::default(),
      "model contradiction",
    );
  }

  /// A bound discovered while posting: recorded in the model and enforced by a one-shot
  /// propagator, so the domain reduction carries a proof.
  pub(crate) fn trim_lower_bound(
    &mut self,
    state: &State,
    mut proof: Option<&mut Proof>,
    var: VariableId,
    value: Integer,
    explain: &str,
  ) {
    if state.lower_bound(var) < value {
      if state.upper_bound(var) >= value {
        if let Some(proof) = proof.as_deref_mut() {
          proof.add_model_cnf(&[Literal::greater_than_or_equal(var, value)]);
        }
        self.install(
          Box::new(move |tracker| {
            tracker.infer_greater_than_or_equal(var, value, || Justification::Rup {
              reason: Vec::new(),
            })?;
            Ok(PropagatorState::DisableUntilBacktrack)
          }),
          Triggers::default(),
          "trimmed lower bound",
        );
      } else {
        self.model_contradiction(proof, &format!("trimmed lower bound of {} due to {} is outside its domain", var, explain));
      }
    }
  }

  pub(crate) fn trim_upper_bound(
    &mut self,
    state: &State,
    mut proof: Option<&mut Proof>,
    var: VariableId,
    value: Integer,
    explain: &str,
  ) {
    if state.upper_bound(var) > value {
      if state.lower_bound(var) <= value {
        if let Some(proof) = proof.as_deref_mut() {
          proof.add_model_cnf(&[Literal::less_than(var, value + 1)]);
        }
        self.install(
          Box::new(move |tracker| {
            tracker.infer_less_than(var, value + 1, || Justification::Rup { reason: Vec::new() })?;
            Ok(PropagatorState::DisableUntilBacktrack)
          }),
          Triggers::default(),
          "trimmed upper bound",
        );
      } else {
        self.model_contradiction(proof, &format!("trimmed upper bound of {} due to {} is outside its domain", var, explain));
      }
    }
  }

  /// Runs propagators to a fixpoint. Returns `true` if no contradiction occurred; an abort
  /// request also returns `false`, which the caller tells apart by asking the limit.
  pub fn propagate(
    &mut self,
    state: &mut State,
    mut proof: Option<&mut Proof>,
    objective: Option<(VariableId, Integer)>,
    limit: Option<&ResourceLimit>,
  ) -> bool {
    let count = self.functions.len();
    let mut on_queue = vec![false; count];
    let mut queue: VecDeque<usize> = VecDeque::new();
    let mut newly_disabled: Vec<usize> = Vec::new();

    // Re-impose the objective bound lost by backtracking past the incumbent. The verifier
    // already holds the improvement constraint from the solution line, so no step is logged.
    if let Some((objective_variable, objective_value)) = objective {
      let mut tracker = InferenceTracker::new(state, proof.as_deref_mut());
      if tracker
        .infer_less_than(objective_variable, objective_value, || {
          Justification::NoJustificationNeeded
        })
        .is_err()
      {
        return false;
      }
    }

    if self.first {
      self.first = false;
      for id in 0..count {
        queue.push_back(id);
        on_queue[id] = true;
      }
    }

    let mut contradiction = false;
    while !contradiction {
      if queue.is_empty() {
        let triggers = &self.triggers;
        let disabled = self.disabled.borrow();
        state.extract_changed_variables(|var, how| {
          let Some(ids) = triggers.get(var.index()) else {
            return;
          };
          let mut enqueue = |list: &[usize]| {
            for &id in list {
              if !on_queue[id] && !disabled.contains(id) {
                queue.push_back(id);
                on_queue[id] = true;
              }
            }
          };
          enqueue(&ids.on_change);
          if how != HowChanged::InteriorValuesChanged {
            enqueue(&ids.on_bounds);
          }
          if how == HowChanged::Instantiated {
            enqueue(&ids.on_instantiated);
          }
        });
      }

      let Some(id) = queue.pop_front() else {
        break;
      };
      on_queue[id] = false;

      let (result, changed) = {
        let mut tracker = InferenceTracker::new(state, proof.as_deref_mut());
        let result = (self.functions[id])(&mut tracker);
        (result, tracker.did_change())
      };
      self.total_propagations += 1;

      match result {
        Err(Contradiction) => {
          trace!("propagator '{}' found a contradiction", self.descriptions[id]);
          self.contradicting_propagations += 1;
          contradiction = true;
        }
        Ok(propagator_state) => {
          if changed {
            self.effectful_propagations += 1;
          }
          if propagator_state == PropagatorState::DisableUntilBacktrack {
            let mut disabled = self.disabled.borrow_mut();
            if !disabled.contains(id) {
              disabled.insert(id);
              newly_disabled.push(id);
            }
          }
        }
      }

      if limit.map_or(false, |l| l.is_aborted()) {
        return false;
      }
    }

    if !newly_disabled.is_empty() {
      let disabled = Rc::clone(&self.disabled);
      state.on_backtrack(Box::new(move || {
        let mut disabled = disabled.borrow_mut();
        for &id in &newly_disabled {
          disabled.remove(id);
        }
      }));
    }

    !contradiction
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn fixpoint_is_idempotent() {
    let mut state = State::new();
    let x = state.create_variable(0, 10);
    let mut propagators = Propagators::new();
    propagators.install(
      Box::new(move |tracker| {
        tracker.infer_less_than(x, 6, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([x.into()]),
      "clamp",
    );

    assert!(propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.bounds(x), (0, 5));
    let (_, effectful_before, _) = propagators.counters();

    // a second run without intervening inferences is a no-op
    assert!(propagators.propagate(&mut state, None, None, None));
    let (_, effectful_after, _) = propagators.counters();
    assert_eq!(effectful_before, effectful_after);
  }

  #[test]
  fn contradicting_propagator_reports_false() {
    let mut state = State::new();
    let x = state.create_variable(0, 3);
    let mut propagators = Propagators::new();
    propagators.install(
      Box::new(move |tracker| {
        tracker.infer_less_than(x, 0, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::default(),
      "impossible",
    );
    assert!(!propagators.propagate(&mut state, None, None, None));
    let (_, _, contradicting) = propagators.counters();
    assert_eq!(contradicting, 1);
  }

  #[test]
  fn disabled_propagators_reenable_on_backtrack() {
    let mut state = State::new();
    let x = state.create_variable(0, 10);
    let mut propagators = Propagators::new();

    propagators.install(
      Box::new(move |tracker| {
        tracker.infer_greater_than_or_equal(x, 1, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::DisableUntilBacktrack)
      }),
      Triggers::on_bounds_of([x.into()]),
      "one shot",
    );

    // disabling happens inside an epoch, so its hook hangs off that epoch
    state.extract_changed_variables(|_, _| {});
    let timestamp = state.new_epoch(false);
    assert!(propagators.propagate(&mut state, None, None, None));
    assert!(propagators.disabled.borrow().contains(0));

    state.backtrack(timestamp);
    assert!(!propagators.disabled.borrow().contains(0));
  }

  #[test]
  fn fixpoint_is_independent_of_scheduling_order() {
    // the same two propagators, installed in both orders, reach the same domains
    let run = |swap: bool| {
      let mut state = State::new();
      let x = state.create_variable(0, 100);
      let y = state.create_variable(0, 100);
      let mut propagators = Propagators::new();

      let clamp_y: PropagationFunction = Box::new(move |tracker| {
        let upper = tracker.state().upper_bound(x);
        tracker.infer_less_than(y, upper + 1, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::Enable)
      });
      let clamp_x: PropagationFunction = Box::new(move |tracker| {
        tracker.infer_less_than(x, 31, || Justification::NoJustificationNeeded)?;
        tracker.infer_greater_than_or_equal(y, 5, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::Enable)
      });

      let y_triggers = Triggers::on_bounds_of([x.into()]);
      if swap {
        propagators.install(clamp_x, Triggers::default(), "clamp x");
        propagators.install(clamp_y, y_triggers, "clamp y");
      } else {
        propagators.install(clamp_y, y_triggers, "clamp y");
        propagators.install(clamp_x, Triggers::default(), "clamp x");
      }
      assert!(propagators.propagate(&mut state, None, None, None));
      (state.each_value(x), state.each_value(y))
    };

    assert_eq!(run(false), run(true));
  }

  #[test]
  fn chained_propagators_reach_a_joint_fixpoint() {
    let mut state = State::new();
    let x = state.create_variable(0, 100);
    let y = state.create_variable(0, 100);
    let mut propagators = Propagators::new();

    // y <= x
    propagators.install(
      Box::new(move |tracker| {
        let upper = tracker.state().upper_bound(x);
        tracker.infer_less_than(y, upper + 1, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_bounds_of([x.into()]),
      "y le x",
    );
    // x <= 20
    propagators.install(
      Box::new(move |tracker| {
        tracker.infer_less_than(x, 21, || Justification::NoJustificationNeeded)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::default(),
      "x le 20",
    );

    assert!(propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.upper_bound(y), 20);
  }
}
