/*!

  The state store: the evolving domains of every variable, the guess stack, per-propagator
  auxiliary state, and the machinery for chronological backtracking. `new_epoch` pushes a
  snapshot of the domain vector and the per-epoch constraint-state vector (cells are cheap to
  copy; shared interval sets clone only on write), and `backtrack` truncates back to a
  recorded `Timestamp`, running any hooks registered against the discarded epochs in LIFO
  order.

  Propagators never touch the store directly: they make inferences through an
  `InferenceTracker`, which applies the domain change, queues the `(variable, HowChanged)`
  event for the scheduler, and routes the justification to the proof logger.

*/

use std::any::Any;

use crate::domain::{DomainState, HowChanged, Inference};
use crate::justification::Justification;
use crate::literal::{simplify_literal, ConditionOperator, Literal, SimpleCondition, SimplifiedLiteral};
use crate::proofs::Proof;
use crate::propagators::Contradiction;
use crate::variable::{SimpleVariableId, VariableId};
use crate::Integer;

/// Is a literal's truth already determined by the current domains?
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum LiteralIs {
  DefinitelyFalse,
  DefinitelyTrue,
  Undecided,
}

/// A point to backtrack to.
#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub struct Timestamp {
  when:                  usize,
  how_many_guesses:      usize,
  how_many_extras:       usize,
  was_subsearch:         bool,
}

/// Which table a piece of auxiliary constraint state lives in: per-epoch state is snapshotted
/// and restored across backtracks, persistent state survives them.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ConstraintStateScope {
  Epoch,
  Persistent,
}

#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ConstraintStateHandle {
  scope: ConstraintStateScope,
  index: usize,
}

/// Type-erased clonable slot for per-propagator state.
pub trait ConstraintState: Any {
  fn clone_box(&self) -> Box<dyn ConstraintState>;
  fn as_any(&self) -> &dyn Any;
  fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any + Clone> ConstraintState for T {
  fn clone_box(&self) -> Box<dyn ConstraintState> {
    Box::new(self.clone())
  }

  fn as_any(&self) -> &dyn Any {
    self
  }

  fn as_any_mut(&mut self) -> &mut dyn Any {
    self
  }
}

impl Clone for Box<dyn ConstraintState> {
  fn clone(&self) -> Self {
    self.clone_box()
  }
}

#[derive(Default)]
pub struct State {
  // One domain vector per epoch; the last is current.
  domains: Vec<Vec<DomainState>>,
  // Snapshotted alongside the domains.
  epoch_constraint_states: Vec<Vec<Box<dyn ConstraintState>>>,
  persistent_constraint_states: Vec<Box<dyn ConstraintState>>,

  guesses:                Vec<Literal>,
  extra_proof_conditions: Vec<Literal>,
  in_subsearch:           bool,

  // Pending (variable, strongest change) events for the scheduler.
  changed:       Vec<Option<HowChanged>>,
  changed_order: Vec<SimpleVariableId>,

  on_backtracks: Vec<Vec<Box<dyn FnOnce()>>>,
}

impl State {
  pub fn new() -> State {
    State {
      domains: vec![Vec::new()],
      epoch_constraint_states: vec![Vec::new()],
      persistent_constraint_states: Vec::new(),
      guesses: Vec::new(),
      extra_proof_conditions: Vec::new(),
      in_subsearch: false,
      changed: Vec::new(),
      changed_order: Vec::new(),
      on_backtracks: vec![Vec::new()],
    }
  }

  /// A copy for starting a fresh search. Only sensible at the root, before any epochs or
  /// backtrack hooks exist.
  pub(crate) fn snapshot(&self) -> State {
    State {
      domains: self.domains.clone(),
      epoch_constraint_states: self.epoch_constraint_states.clone(),
      persistent_constraint_states: self.persistent_constraint_states.clone(),
      guesses: self.guesses.clone(),
      extra_proof_conditions: self.extra_proof_conditions.clone(),
      in_subsearch: self.in_subsearch,
      changed: self.changed.clone(),
      changed_order: self.changed_order.clone(),
      on_backtracks: self.domains.iter().map(|_| Vec::new()).collect(),
    }
  }

  // region Variable management

  /// Used by `Problem::create_integer_variable`, which you should be calling instead.
  pub(crate) fn create_variable(&mut self, lower: Integer, upper: Integer) -> SimpleVariableId {
    let current = self
      .domains
      .last_mut()
      .expect("the state always has at least one epoch");
    current.push(DomainState::new(lower, upper));
    self.changed.push(None);
    SimpleVariableId(current.len() - 1)
  }

  pub fn number_of_variables(&self) -> usize {
    self.current_domains().len()
  }

  fn current_domains(&self) -> &Vec<DomainState> {
    self.domains.last().expect("the state always has at least one epoch")
  }

  fn domain_of(&self, var: SimpleVariableId) -> &DomainState {
    &self.current_domains()[var.index()]
  }

  // endregion

  // region Queries

  pub fn lower_bound(&self, var: impl Into<VariableId>) -> Integer {
    self.bounds(var).0
  }

  pub fn upper_bound(&self, var: impl Into<VariableId>) -> Integer {
    self.bounds(var).1
  }

  pub fn bounds(&self, var: impl Into<VariableId>) -> (Integer, Integer) {
    match var.into() {
      VariableId::Constant(c) => (c, c),
      VariableId::Simple(simple) => {
        let domain = self.domain_of(simple);
        (domain.lower(), domain.upper())
      }
      VariableId::View(view) => {
        let domain = self.domain_of(view.actual);
        let (a, b) = (view.forward(domain.lower()), view.forward(domain.upper()));
        (a.min(b), a.max(b))
      }
    }
  }

  pub fn in_domain(&self, var: impl Into<VariableId>, value: Integer) -> bool {
    match var.into() {
      VariableId::Constant(c) => c == value,
      VariableId::Simple(simple) => self.domain_of(simple).contains(value),
      VariableId::View(view) => self.domain_of(view.actual).contains(view.backward(value)),
    }
  }

  pub fn optional_single_value(&self, var: impl Into<VariableId>) -> Option<Integer> {
    match var.into() {
      VariableId::Constant(c) => Some(c),
      VariableId::Simple(simple) => self.domain_of(simple).single_value(),
      VariableId::View(view) => self.domain_of(view.actual).single_value().map(|v| view.forward(v)),
    }
  }

  pub fn has_single_value(&self, var: impl Into<VariableId>) -> bool {
    self.optional_single_value(var).is_some()
  }

  pub fn domain_size(&self, var: impl Into<VariableId>) -> Integer {
    match var.into() {
      VariableId::Constant(_) => 1,
      VariableId::Simple(simple) => self.domain_of(simple).size(),
      VariableId::View(view) => self.domain_of(view.actual).size(),
    }
  }

  /// Every value currently in the domain, in ascending order. Eager, so the domain may be
  /// mutated while walking the result.
  pub fn each_value(&self, var: impl Into<VariableId>) -> Vec<Integer> {
    match var.into() {
      VariableId::Constant(c) => vec![c],
      VariableId::Simple(simple) => self.domain_of(simple).values().collect(),
      VariableId::View(view) => {
        let mut values: Vec<Integer> = self
          .domain_of(view.actual)
          .values()
          .map(|v| view.forward(v))
          .collect();
        if view.negate_first {
          values.reverse();
        }
        values
      }
    }
  }

  /// Coroutine-style iteration over the underlying values; does not borrow the state.
  pub fn values_iter(&self, var: SimpleVariableId) -> impl Iterator<Item = Integer> {
    self.domain_of(var).values()
  }

  /// True if this variable's domain is potentially not just contiguous values. May
  /// spuriously claim holes are present.
  pub fn domain_has_holes(&self, var: impl Into<VariableId>) -> bool {
    match var.into() {
      VariableId::Constant(_) => false,
      VariableId::Simple(simple) => self.domain_of(simple).has_holes(),
      VariableId::View(view) => self.domain_of(view.actual).has_holes(),
    }
  }

  pub fn test_literal(&self, lit: &Literal) -> LiteralIs {
    match simplify_literal(lit) {
      SimplifiedLiteral::True => LiteralIs::DefinitelyTrue,
      SimplifiedLiteral::False => LiteralIs::DefinitelyFalse,
      SimplifiedLiteral::Condition(cond) => {
        let domain = self.domain_of(cond.var);
        match cond.op {
          ConditionOperator::Equal => {
            if !domain.contains(cond.value) {
              LiteralIs::DefinitelyFalse
            } else if domain.single_value() == Some(cond.value) {
              LiteralIs::DefinitelyTrue
            } else {
              LiteralIs::Undecided
            }
          }
          ConditionOperator::NotEqual => {
            if !domain.contains(cond.value) {
              LiteralIs::DefinitelyTrue
            } else if domain.single_value() == Some(cond.value) {
              LiteralIs::DefinitelyFalse
            } else {
              LiteralIs::Undecided
            }
          }
          ConditionOperator::GreaterEqual => {
            if domain.lower() >= cond.value {
              LiteralIs::DefinitelyTrue
            } else if domain.upper() < cond.value {
              LiteralIs::DefinitelyFalse
            } else {
              LiteralIs::Undecided
            }
          }
          ConditionOperator::Less => {
            if domain.upper() < cond.value {
              LiteralIs::DefinitelyTrue
            } else if domain.lower() >= cond.value {
              LiteralIs::DefinitelyFalse
            } else {
              LiteralIs::Undecided
            }
          }
        }
      }
    }
  }

  // endregion

  // region Mutation

  /// Applies a literal to the domains. This is the raw operation: events are queued but no
  /// proof is written, which is why it is not public.
  pub(crate) fn apply_literal(&mut self, lit: &Literal) -> Inference {
    match simplify_literal(lit) {
      SimplifiedLiteral::True => Inference::NoChange,
      SimplifiedLiteral::False => Inference::Contradiction,
      SimplifiedLiteral::Condition(cond) => self.apply_condition(&cond),
    }
  }

  fn apply_condition(&mut self, cond: &SimpleCondition) -> Inference {
    let domain = &mut self
      .domains
      .last_mut()
      .expect("the state always has at least one epoch")[cond.var.index()];
    let outcome = match cond.op {
      ConditionOperator::Equal        => domain.assign(cond.value),
      ConditionOperator::NotEqual     => domain.remove(cond.value),
      ConditionOperator::Less         => domain.keep_less_than(cond.value),
      ConditionOperator::GreaterEqual => domain.keep_greater_than_or_equal(cond.value),
    };
    if let Some(how) = outcome.how_changed() {
      self.record_change(cond.var, how);
    }
    outcome
  }

  fn record_change(&mut self, var: SimpleVariableId, how: HowChanged) {
    match &mut self.changed[var.index()] {
      Some(existing) => {
        if how > *existing {
          *existing = how;
        }
      }
      slot @ None => {
        *slot = Some(how);
        self.changed_order.push(var);
      }
    }
  }

  /// Calls the function once for each variable changed since the last call, with the
  /// strongest thing that happened to it. The scheduler's only event source.
  pub(crate) fn extract_changed_variables(&mut self, mut f: impl FnMut(SimpleVariableId, HowChanged)) {
    let order = std::mem::take(&mut self.changed_order);
    for var in order {
      if let Some(how) = self.changed[var.index()].take() {
        f(var, how);
      }
    }
  }

  // endregion

  // region Guessing and backtracking

  /// Guesses that a literal holds: pushes it onto the guess stack (or the extra proof
  /// conditions during a subsearch) and applies it.
  pub(crate) fn guess(
    &mut self,
    mut proof: Option<&mut Proof>,
    lit: Literal,
  ) -> Result<(), Contradiction> {
    if self.in_subsearch {
      self.extra_proof_conditions.push(lit);
    } else {
      self.guesses.push(lit);
    }
    let outcome = self.apply_literal(&lit);
    if let Some(proof) = proof.as_deref_mut() {
      proof.log_inference(self, &lit, Justification::Guess);
    }
    if outcome == Inference::Contradiction {
      Err(Contradiction)
    } else {
      Ok(())
    }
  }

  /// An assumption that should appear in proof reasons but is not a true guess.
  pub fn add_extra_proof_condition(&mut self, lit: Literal) {
    self.extra_proof_conditions.push(lit);
  }

  /// Every active guess, extra proof conditions first.
  pub fn guesses(&self) -> impl Iterator<Item = &Literal> {
    self.extra_proof_conditions.iter().chain(self.guesses.iter())
  }

  pub fn guess_depth(&self) -> usize {
    self.guesses.len()
  }

  /// Creates a new epoch that can be backtracked to. Only legal in a fully propagated state,
  /// i.e. when `extract_changed_variables` would do nothing.
  pub fn new_epoch(&mut self, subsearch: bool) -> Timestamp {
    let current = self.current_domains().clone();
    self.domains.push(current);
    let constraint_states = self
      .epoch_constraint_states
      .last()
      .expect("the state always has at least one epoch")
      .clone();
    self.epoch_constraint_states.push(constraint_states);
    self.on_backtracks.push(Vec::new());

    let timestamp = Timestamp {
      when:             self.domains.len() - 1,
      how_many_guesses: self.guesses.len(),
      how_many_extras:  self.extra_proof_conditions.len(),
      was_subsearch:    self.in_subsearch,
    };
    if subsearch {
      self.in_subsearch = true;
    }
    timestamp
  }

  /// Chronological backtracking to a timestamp: truncates domains, constraint states, the
  /// guess stack, and the extra proof conditions, and runs the hooks of every discarded
  /// epoch in LIFO order.
  pub fn backtrack(&mut self, timestamp: Timestamp) {
    self.domains.truncate(timestamp.when);
    self.epoch_constraint_states.truncate(timestamp.when);
    self.guesses.truncate(timestamp.how_many_guesses);
    self.extra_proof_conditions.truncate(timestamp.how_many_extras);
    self.in_subsearch = timestamp.was_subsearch;

    while self.on_backtracks.len() > timestamp.when {
      let hooks = self
        .on_backtracks
        .pop()
        .expect("the hook stack mirrors the epoch stack");
      for hook in hooks.into_iter().rev() {
        hook();
      }
    }
  }

  /// Registers a callback run once when the current epoch is discarded.
  pub fn on_backtrack(&mut self, hook: Box<dyn FnOnce()>) {
    self
      .on_backtracks
      .last_mut()
      .expect("the state always has at least one epoch")
      .push(hook);
  }

  // endregion

  // region Constraint state

  pub fn add_constraint_state<T: Any + Clone>(
    &mut self,
    scope: ConstraintStateScope,
    value: T,
  ) -> ConstraintStateHandle {
    let table = match scope {
      ConstraintStateScope::Epoch => self
        .epoch_constraint_states
        .last_mut()
        .expect("the state always has at least one epoch"),
      ConstraintStateScope::Persistent => &mut self.persistent_constraint_states,
    };
    table.push(Box::new(value));
    ConstraintStateHandle { scope, index: table.len() - 1 }
  }

  pub fn constraint_state<T: Any>(&self, handle: ConstraintStateHandle) -> &T {
    let slot = match handle.scope {
      ConstraintStateScope::Epoch => {
        &self
          .epoch_constraint_states
          .last()
          .expect("the state always has at least one epoch")[handle.index]
      }
      ConstraintStateScope::Persistent => &self.persistent_constraint_states[handle.index],
    };
    match slot.as_any().downcast_ref::<T>() {
      Some(value) => value,
      None => panic!("constraint state {:?} holds a different type", handle),
    }
  }

  pub fn constraint_state_mut<T: Any>(&mut self, handle: ConstraintStateHandle) -> &mut T {
    let slot = match handle.scope {
      ConstraintStateScope::Epoch => {
        &mut self
          .epoch_constraint_states
          .last_mut()
          .expect("the state always has at least one epoch")[handle.index]
      }
      ConstraintStateScope::Persistent => &mut self.persistent_constraint_states[handle.index],
    };
    match slot.as_any_mut().downcast_mut::<T>() {
      Some(value) => value,
      None => panic!("constraint state {:?} holds a different type", handle),
    }
  }

  // endregion

  /// A read-only view for end users (branch, guess, and solution callbacks).
  pub fn current(&self) -> CurrentState<'_> {
    CurrentState { state: self }
  }
}

/// The part of the state exposed to end-user callbacks.
pub struct CurrentState<'a> {
  state: &'a State,
}

impl<'a> CurrentState<'a> {
  pub fn bounds(&self, var: impl Into<VariableId>) -> (Integer, Integer) {
    self.state.bounds(var)
  }

  pub fn in_domain(&self, var: impl Into<VariableId>, value: Integer) -> bool {
    self.state.in_domain(var, value)
  }

  pub fn has_single_value(&self, var: impl Into<VariableId>) -> bool {
    self.state.has_single_value(var)
  }

  pub fn domain_size(&self, var: impl Into<VariableId>) -> Integer {
    self.state.domain_size(var)
  }

  pub fn each_value(&self, var: impl Into<VariableId>) -> Vec<Integer> {
    self.state.each_value(var)
  }

  /// The single value this variable holds. Callbacks asking for the value of an unfixed
  /// variable are a bug, so this panics rather than guessing.
  pub fn value(&self, var: impl Into<VariableId>) -> Integer {
    let var = var.into();
    match self.state.optional_single_value(var) {
      Some(value) => value,
      None => panic!("variable {} does not have a unique value", var),
    }
  }
}

/// The shim every propagator calls to perform an inference. It routes each inference to the
/// state store *and* to the proof logger, and records whether anything changed. The
/// justification constructor is only invoked when proof logging is on.
pub struct InferenceTracker<'a> {
  state:     &'a mut State,
  proof:     Option<&'a mut Proof>,
  inference: Inference,
}

impl<'a> InferenceTracker<'a> {
  pub fn new(state: &'a mut State, proof: Option<&'a mut Proof>) -> InferenceTracker<'a> {
    InferenceTracker { state, proof, inference: Inference::NoChange }
  }

  pub fn state(&self) -> &State {
    self.state
  }

  pub fn proof_enabled(&self) -> bool {
    self.proof.is_some()
  }

  pub fn proof(&mut self) -> Option<&mut Proof> {
    self.proof.as_deref_mut()
  }

  /// Did any inference so far change a domain?
  pub fn did_change(&self) -> bool {
    self.inference > Inference::NoChange
  }

  pub fn constraint_state<T: Any>(&self, handle: ConstraintStateHandle) -> &T {
    self.state.constraint_state(handle)
  }

  pub fn constraint_state_mut<T: Any>(&mut self, handle: ConstraintStateHandle) -> &mut T {
    self.state.constraint_state_mut(handle)
  }

  /// Infers that a literal must hold, for the given justification.
  pub fn infer(
    &mut self,
    lit: &Literal,
    why: impl FnOnce() -> Justification,
  ) -> Result<(), Contradiction> {
    // The justification reads the pre-inference state, so build it before applying.
    let justification = if self.proof.is_some() { Some(why()) } else { None };
    let outcome = self.state.apply_literal(lit);
    self.inference.increase_to(outcome);

    match outcome {
      Inference::NoChange => Ok(()),
      Inference::Contradiction => {
        if let (Some(proof), Some(justification)) = (self.proof.as_deref_mut(), justification) {
          proof.log_inference(self.state, lit, justification);
        }
        Err(Contradiction)
      }
      _ => {
        if let (Some(proof), Some(justification)) = (self.proof.as_deref_mut(), justification) {
          proof.log_inference(self.state, lit, justification);
        }
        Ok(())
      }
    }
  }

  pub fn infer_equal(
    &mut self,
    var: impl Into<VariableId>,
    value: Integer,
    why: impl FnOnce() -> Justification,
  ) -> Result<(), Contradiction> {
    self.infer(&Literal::equal_to(var, value), why)
  }

  pub fn infer_not_equal(
    &mut self,
    var: impl Into<VariableId>,
    value: Integer,
    why: impl FnOnce() -> Justification,
  ) -> Result<(), Contradiction> {
    self.infer(&Literal::not_equal_to(var, value), why)
  }

  pub fn infer_less_than(
    &mut self,
    var: impl Into<VariableId>,
    value: Integer,
    why: impl FnOnce() -> Justification,
  ) -> Result<(), Contradiction> {
    self.infer(&Literal::less_than(var, value), why)
  }

  pub fn infer_greater_than_or_equal(
    &mut self,
    var: impl Into<VariableId>,
    value: Integer,
    why: impl FnOnce() -> Justification,
  ) -> Result<(), Contradiction> {
    self.infer(&Literal::greater_than_or_equal(var, value), why)
  }

  /// Infers each literal in turn. An explicit justification is only emitted once, for the
  /// first literal; the rest are justified by RUP from the same reason.
  pub fn infer_all(
    &mut self,
    lits: &[Literal],
    why: impl FnOnce() -> Justification,
  ) -> Result<(), Contradiction> {
    if self.proof.is_none() {
      for lit in lits {
        self.infer(lit, || Justification::NoJustificationNeeded)?;
      }
      return Ok(());
    }

    let mut next = Some(why());
    for lit in lits {
      let justification = match next.take() {
        Some(Justification::Explicit { steps, reason }) => {
          next = Some(Justification::Rup { reason: reason.clone() });
          Justification::Explicit { steps, reason }
        }
        Some(Justification::Rup { reason }) => {
          next = Some(Justification::Rup { reason: reason.clone() });
          Justification::Rup { reason }
        }
        Some(Justification::Assert { reason }) => {
          next = Some(Justification::Assert { reason: reason.clone() });
          Justification::Assert { reason }
        }
        Some(other) => {
          next = Some(match &other {
            Justification::Guess => Justification::Guess,
            _ => Justification::NoJustificationNeeded,
          });
          other
        }
        None => Justification::NoJustificationNeeded,
      };
      self.infer(lit, move || justification)?;
    }
    Ok(())
  }

  /// Runs explicit proof steps without an accompanying inference. Used by propagators that
  /// derive a helper line shared by a batch of subsequent inferences.
  pub fn add_proof_steps(&mut self, steps: impl FnOnce(&mut Proof)) {
    if let Some(proof) = self.proof.as_deref_mut() {
      steps(proof);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn tracker_infer(state: &mut State, lit: Literal) -> Result<(), Contradiction> {
    let mut tracker = InferenceTracker::new(state, None);
    tracker.infer(&lit, || Justification::NoJustificationNeeded)
  }

  #[test]
  fn bounds_and_membership_agree_with_iteration() {
    let mut state = State::new();
    let x = state.create_variable(1, 6);
    tracker_infer(&mut state, Literal::not_equal_to(x, 3)).unwrap();
    let values = state.each_value(x);
    assert_eq!(values, vec![1, 2, 4, 5, 6]);
    for v in 0..8 {
      assert_eq!(state.in_domain(x, v), values.contains(&v));
    }
    assert_eq!(state.domain_size(x), 5);
    assert_eq!(state.bounds(x), (1, 6));
  }

  #[test]
  fn epoch_roundtrip_restores_domains() {
    let mut state = State::new();
    let x = state.create_variable(0, 9);
    let y = state.create_variable(-5, 5);
    state.extract_changed_variables(|_, _| {});

    let before_x = state.each_value(x);
    let before_y = state.each_value(y);
    let timestamp = state.new_epoch(false);

    tracker_infer(&mut state, Literal::greater_than_or_equal(x, 4)).unwrap();
    tracker_infer(&mut state, Literal::not_equal_to(y, 0)).unwrap();
    tracker_infer(&mut state, Literal::less_than(y, 3)).unwrap();
    assert_ne!(state.each_value(x), before_x);

    state.backtrack(timestamp);
    assert_eq!(state.each_value(x), before_x);
    assert_eq!(state.each_value(y), before_y);
    assert_eq!(state.domain_size(y), 11);
  }

  #[test]
  fn backtrack_hooks_run_in_lifo_order() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut state = State::new();
    let order = Rc::new(RefCell::new(Vec::new()));
    let timestamp = state.new_epoch(false);
    for tag in ["first", "second"] {
      let order = Rc::clone(&order);
      state.on_backtrack(Box::new(move || order.borrow_mut().push(tag)));
    }
    state.backtrack(timestamp);
    assert_eq!(*order.borrow(), vec!["second", "first"]);
  }

  #[test]
  fn events_report_the_strongest_change() {
    let mut state = State::new();
    let x = state.create_variable(0, 9);
    tracker_infer(&mut state, Literal::not_equal_to(x, 4)).unwrap();
    tracker_infer(&mut state, Literal::greater_than_or_equal(x, 8)).unwrap();

    let mut events = Vec::new();
    state.extract_changed_variables(|var, how| events.push((var, how)));
    assert_eq!(events, vec![(x, HowChanged::BoundsChanged)]);

    // drained: a second extraction sees nothing
    let mut more = Vec::new();
    state.extract_changed_variables(|var, how| more.push((var, how)));
    assert!(more.is_empty());
  }

  #[test]
  fn contradiction_is_reported_and_domains_hold() {
    let mut state = State::new();
    let x = state.create_variable(2, 2);
    assert!(tracker_infer(&mut state, Literal::not_equal_to(x, 2)).is_err());
  }

  #[test]
  fn equal_then_not_equal_contradicts() {
    let mut state = State::new();
    let x = state.create_variable(0, 5);
    tracker_infer(&mut state, Literal::equal_to(x, 3)).unwrap();
    assert!(tracker_infer(&mut state, Literal::not_equal_to(x, 3)).is_err());
  }

  #[test]
  fn view_queries_unwrap() {
    let mut state = State::new();
    let x = state.create_variable(1, 4);
    let v = VariableId::from(x).negated().offset(10); // 10 - x
    assert_eq!(state.bounds(v), (6, 9));
    assert!(state.in_domain(v, 7));
    assert_eq!(state.each_value(v), vec![6, 7, 8, 9]);

    tracker_infer(&mut state, Literal::greater_than_or_equal(v, 8)).unwrap();
    assert_eq!(state.bounds(x), (1, 2));
  }

  #[test]
  fn literal_testing() {
    let mut state = State::new();
    let x = state.create_variable(0, 5);
    assert_eq!(state.test_literal(&Literal::greater_than_or_equal(x, 0)), LiteralIs::DefinitelyTrue);
    assert_eq!(state.test_literal(&Literal::less_than(x, 0)), LiteralIs::DefinitelyFalse);
    assert_eq!(state.test_literal(&Literal::equal_to(x, 3)), LiteralIs::Undecided);
    tracker_infer(&mut state, Literal::equal_to(x, 3)).unwrap();
    assert_eq!(state.test_literal(&Literal::equal_to(x, 3)), LiteralIs::DefinitelyTrue);
  }

  #[test]
  fn constraint_state_scopes() {
    #[derive(Clone, PartialEq, Debug)]
    struct Watch(u32);

    let mut state = State::new();
    let epoch_handle = state.add_constraint_state(ConstraintStateScope::Epoch, Watch(1));
    let persistent_handle = state.add_constraint_state(ConstraintStateScope::Persistent, Watch(1));

    let timestamp = state.new_epoch(false);
    state.constraint_state_mut::<Watch>(epoch_handle).0 = 2;
    state.constraint_state_mut::<Watch>(persistent_handle).0 = 2;
    state.backtrack(timestamp);

    assert_eq!(state.constraint_state::<Watch>(epoch_handle), &Watch(1));
    assert_eq!(state.constraint_state::<Watch>(persistent_handle), &Watch(2));
  }
}
