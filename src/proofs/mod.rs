/*!

  The proof layer. `ProofModel` writes the pseudo-Boolean encoding of the problem once during
  posting; `ProofLogger` appends derived steps during search; `NamesAndIdsTracker` keeps the
  bijection between CP conditions and pseudo-Boolean literals. The `Proof` facade owns all
  three and coordinates the cross-cutting operations: ensuring a condition has a name before
  any line mentions it (writing its definition into the model during posting, or introducing
  it with red rules mid-proof), logging inferences under their justifications, and concluding
  the proof.

*/

pub(crate) mod logger;
pub(crate) mod model;
pub(crate) mod names;
pub(crate) mod pb;

pub use pb::{
  PbComparator,
  PbConstraint,
  PbSum,
  PbTerm,
  PbVariableId,
  ProofBitVariable,
  ProofFlag,
  ProofLevel,
  ProofLine,
  ProofLiteralOrFlag,
  ProofOnlyVariable,
  XLiteral,
};

use crate::errors::Error;
use crate::justification::{is_literally_true, Justification, Reason};
use crate::literal::{simplify_literal, ConditionOperator, Literal, SimpleCondition, SimplifiedLiteral};
use crate::parameters::ProofOptions;
use crate::proofs::logger::ProofLogger;
use crate::proofs::model::{eqvar_name, gevar_name, ProofModel};
use crate::proofs::names::{sanitise_name, GevarDefinition, NamesAndIdsTracker};
use crate::proofs::pb::{flatten_greater_equal, FlatInequality};
use crate::state::State;
use crate::variable::{SimpleVariableId, VariableId};
use crate::Integer;

pub struct Proof {
  names:   NamesAndIdsTracker,
  model:   ProofModel,
  logger:  ProofLogger,
  /// False while the model is being written, true once search has begun.
  logging: bool,
  /// Order-encoding implication chains discovered during posting are RUP once the proof
  /// starts, so they are deferred rather than written into the model.
  delayed: Vec<FlatInequality>,
}

impl Proof {
  pub fn new(options: &ProofOptions) -> Proof {
    Proof {
      names:   NamesAndIdsTracker::new(),
      model:   ProofModel::new(options.opb_file.clone(), options.mapping_file.clone()),
      logger:  ProofLogger::new(options.proof_file.clone()),
      logging: false,
      delayed: Vec::new(),
    }
  }

  // region Model phase

  pub(crate) fn set_up_integer_variable(
    &mut self,
    var: SimpleVariableId,
    lower: Integer,
    upper: Integer,
    name: Option<&str>,
  ) {
    let base = match name {
      Some(name) => format!("i{}_{}", var.index(), sanitise_name(name)),
      None => format!("i{}", var.index()),
    };
    self
      .model
      .set_up_integer_variable(&mut self.names, var.into(), lower, upper, base);
  }

  pub(crate) fn create_proof_only_variable(
    &mut self,
    lower: Integer,
    upper: Integer,
    name: &str,
  ) -> ProofOnlyVariable {
    let var = ProofOnlyVariable(self.names.next_proof_only_index());
    let base = format!("p{}_{}", var.0, sanitise_name(name));
    self
      .model
      .set_up_integer_variable(&mut self.names, var.into(), lower, upper, base);
    var
  }

  pub(crate) fn create_proof_flag(&mut self, name: &str) -> ProofFlag {
    self.names.create_flag(name)
  }

  /// The weighted bits of a variable's encoding, as terms usable in sums.
  pub(crate) fn bits_of(&self, id: PbVariableId) -> Vec<(Integer, ProofBitVariable)> {
    self
      .names
      .bit_encoding(id)
      .bits
      .iter()
      .enumerate()
      .map(|(position, &(weight, _))| {
        (weight, ProofBitVariable { var: id, position: position as u32, positive: true })
      })
      .collect()
  }

  pub(crate) fn model_comment(&mut self, text: &str) {
    self.model.comment(text);
  }

  /// Writes a constraint into the model, optionally half-reified on a conjunction, and
  /// returns the number of the first line written (an equality takes two, `<=` first).
  pub(crate) fn add_model_constraint(
    &mut self,
    constraint: &PbConstraint,
    half_reif: Option<&[ProofLiteralOrFlag]>,
  ) -> ProofLine {
    self.ensure_names_in(constraint, half_reif);
    self.model.add_constraint(&self.names, constraint, half_reif)
  }

  /// `lit₁ ∨ lit₂ ∨ …` as a model constraint.
  pub(crate) fn add_model_cnf(&mut self, literals: &[Literal]) -> ProofLine {
    let mut sum = PbSum::new();
    for &lit in literals {
      sum = sum.plus(1, lit);
    }
    self.add_model_constraint(&sum.greater_equal(1), None)
  }

  /// At most one of the literals holds.
  pub(crate) fn add_model_at_most_one(&mut self, literals: &[Literal]) -> ProofLine {
    let mut sum = PbSum::new();
    for &lit in literals {
      sum = sum.plus(1, lit);
    }
    self.add_model_constraint(&sum.less_equal(1), None)
  }

  pub(crate) fn set_objective_minimise(&mut self, var: VariableId) {
    self.model.set_objective_minimise(var);
  }

  /// Finalises the model file and opens the proof trace. Called once, when search begins.
  pub(crate) fn start_search(&mut self) -> Result<(), Error> {
    self.model.finalise(&self.names)?;
    self.logger.start_proof(self.model.number_of_constraints())?;
    self.logging = true;
    for flat in std::mem::take(&mut self.delayed) {
      self.logger.emit_flat_rup(&self.names, &flat, ProofLevel::Top);
    }
    Ok(())
  }

  // endregion

  // region Names on demand

  /// Idempotent: makes sure the condition underlying `lit` has a pseudo-Boolean name,
  /// emitting its definition to the model (during posting) or as a red introduction (during
  /// search) if this is its first mention.
  pub(crate) fn need_proof_name(&mut self, lit: &Literal) {
    if let SimplifiedLiteral::Condition(cond) = simplify_literal(lit) {
      self.need_condition(&cond);
    }
  }

  pub(crate) fn need_condition(&mut self, cond: &SimpleCondition) {
    let id: PbVariableId = cond.var.into();
    match cond.op {
      ConditionOperator::GreaterEqual | ConditionOperator::Less => self.need_gevar(id, cond.value),
      ConditionOperator::Equal | ConditionOperator::NotEqual => self.need_eqvar(id, cond.value),
    }
  }

  fn ensure_names_in(&mut self, constraint: &PbConstraint, half_reif: Option<&[ProofLiteralOrFlag]>) {
    // Collect first: allocating a name appends to the very tables being walked.
    let mut conditions: Vec<Literal> = Vec::new();
    for (_, term) in &constraint.sum.terms {
      if let PbTerm::Literal(lit) = term {
        conditions.push(*lit);
      }
    }
    if let Some(reif) = half_reif {
      for r in reif {
        if let ProofLiteralOrFlag::Literal(lit) = r {
          conditions.push(*lit);
        }
      }
    }
    for lit in conditions {
      self.need_proof_name(&lit);
    }
  }

  /// Creates the order variable `[x >= v]` if it does not exist: its reified pair of
  /// defining lines, any bound-implied facts, and the implication chain to its neighbours.
  pub(crate) fn need_gevar(&mut self, id: PbVariableId, value: Integer) {
    if self.names.gevar(id, value).is_some() {
      return;
    }

    let base = self.names.base_name(id).to_string();
    let xlit = self
      .names
      .allocate_xliteral(gevar_name(&base, value), format!("{} >= {}", base, value));

    let var_term: PbTerm = match id {
      PbVariableId::Simple(simple) => simple.into(),
      PbVariableId::ProofOnly(proof_only) => proof_only.into(),
    };
    let base_flat = flatten_greater_equal(
      &self.names,
      &PbSum::new().plus(1, var_term),
      value,
    );
    let (forward_line, reverse_line) = self.introduce_reified_pair(&base_flat, xlit);
    self.names.insert_gevar(
      id,
      value,
      GevarDefinition { xliteral: xlit, forward_line, reverse_line },
    );

    // facts implied by the variable's defining bounds
    if let Some((def_lower, def_upper)) = self.names.definition_bounds(id) {
      if def_lower >= value {
        let fact = FlatInequality { terms: vec![(1, xlit)], rhs: 1 };
        self.emit_axiom_or_rup(fact);
      }
      if def_upper < value {
        let fact = FlatInequality { terms: vec![(1, xlit.negated())], rhs: 1 };
        self.emit_axiom_or_rup(fact);
      }
    }

    // the implication chain: implied by the next threshold up, implies the next one down
    let (below, above) = self.names.gevar_neighbours(id, value);
    if let Some(above) = above {
      if let Some(above_xlit) = self.names.gevar(id, above) {
        let chain = FlatInequality {
          terms: vec![(1, xlit), (1, above_xlit.negated())],
          rhs:   1,
        };
        self.emit_now_or_at_start(chain);
      }
    }
    if let Some(below) = below {
      if let Some(below_xlit) = self.names.gevar(id, below) {
        let chain = FlatInequality {
          terms: vec![(1, below_xlit), (1, xlit.negated())],
          rhs:   1,
        };
        self.emit_now_or_at_start(chain);
      }
    }
  }

  /// Creates the direct variable `[x = v]`, in terms of the order variables around it.
  pub(crate) fn need_eqvar(&mut self, id: PbVariableId, value: Integer) {
    if self.names.eqvar(id, value).is_some() {
      return;
    }

    let (def_lower, def_upper) = match self.names.definition_bounds(id) {
      Some(bounds) => bounds,
      None => panic!("no bounds tracked for {:?}", id),
    };

    if value < def_lower || value > def_upper {
      // outside the declared domain: the direct variable is just false
      let base = self.names.base_name(id).to_string();
      let xlit = self
        .names
        .allocate_xliteral(eqvar_name(&base, value), format!("{} = {}", base, value));
      self.names.insert_eqvar(id, value, xlit);
      let fact = FlatInequality { terms: vec![(1, xlit.negated())], rhs: 1 };
      if self.logging {
        self.logger.emit_flat_red(&self.names, &fact, &[(xlit, false)], ProofLevel::Top);
      } else {
        self.model.add_flat(&self.names, &fact);
      }
      return;
    }

    // the order variables this direct variable is defined from
    if value > def_lower {
      self.need_gevar(id, value);
    }
    if value < def_upper {
      self.need_gevar(id, value + 1);
    }

    let base = self.names.base_name(id).to_string();
    let xlit = self
      .names
      .allocate_xliteral(eqvar_name(&base, value), format!("{} = {}", base, value));
    self.names.insert_eqvar(id, value, xlit);

    let base_flat = if value == def_lower && value == def_upper {
      // a singleton domain: the direct variable is simply true
      FlatInequality { terms: Vec::new(), rhs: 0 }
    } else if value == def_lower {
      let ge_next = self.gevar_xliteral(id, value + 1);
      FlatInequality { terms: vec![(1, ge_next.negated())], rhs: 1 }
    } else if value == def_upper {
      let ge_here = self.gevar_xliteral(id, value);
      FlatInequality { terms: vec![(1, ge_here)], rhs: 1 }
    } else {
      let ge_here = self.gevar_xliteral(id, value);
      let ge_next = self.gevar_xliteral(id, value + 1);
      FlatInequality {
        terms: vec![(1, ge_here), (1, ge_next.negated())],
        rhs:   2,
      }
    };
    self.introduce_reified_pair(&base_flat, xlit);
  }

  fn gevar_xliteral(&self, id: PbVariableId, value: Integer) -> XLiteral {
    match self.names.gevar(id, value) {
      Some(xlit) => xlit,
      None => panic!("missing order variable for {:?} >= {}", id, value),
    }
  }

  /// Introduces `xlit ↔ flat` as a forward and a reverse line: written into the model while
  /// posting, introduced by a pair of red rules once the proof is running.
  fn introduce_reified_pair(&mut self, base: &FlatInequality, xlit: XLiteral) -> (ProofLine, ProofLine) {
    let mut forward = base.clone();
    forward.reify_xliterals(&[xlit]);
    let mut reverse = FlatInequality {
      terms: base.terms.iter().map(|&(c, x)| (-c, x)).collect(),
      rhs:   1 - base.rhs,
    };
    reverse.reify_xliterals(&[xlit.negated()]);

    if self.logging {
      let f = self
        .logger
        .emit_flat_red(&self.names, &forward, &[(xlit, false)], ProofLevel::Top);
      let r = self
        .logger
        .emit_flat_red(&self.names, &reverse, &[(xlit, true)], ProofLevel::Top);
      (f, r)
    } else {
      let f = self.model.add_flat(&self.names, &forward);
      let r = self.model.add_flat(&self.names, &reverse);
      (f, r)
    }
  }

  fn emit_axiom_or_rup(&mut self, flat: FlatInequality) {
    if self.logging {
      self.logger.emit_flat_rup(&self.names, &flat, ProofLevel::Top);
    } else {
      self.model.add_flat(&self.names, &flat);
    }
  }

  fn emit_now_or_at_start(&mut self, flat: FlatInequality) {
    if self.logging {
      self.logger.emit_flat_rup(&self.names, &flat, ProofLevel::Top);
    } else {
      self.delayed.push(flat);
    }
  }

  /// The proof line asserting the bound literal's meaning, for use as a `p`-line item:
  /// `[x >= v] -> x >= v` for greater-or-equal conditions, `[x < v] -> x < v` otherwise.
  pub(crate) fn need_pol_item_defining_literal(&mut self, cond: &SimpleCondition) -> ProofLine {
    let id: PbVariableId = cond.var.into();
    self.need_gevar(id, cond.value);
    let def = match self.names.gevar_definition(id, cond.value) {
      Some(def) => def,
      None => panic!("missing order variable for {:?}", cond),
    };
    match cond.op {
      ConditionOperator::GreaterEqual => def.forward_line,
      ConditionOperator::Less => def.reverse_line,
      _ => panic!("polynomial items are defined for bound conditions only"),
    }
  }

  // endregion

  // region Inference logging

  /// Routes an inference to the proof according to its justification. Called by the
  /// inference tracker after the domain change has been applied (the justification was built
  /// beforehand, from the pre-inference state).
  pub(crate) fn log_inference(&mut self, state: &State, lit: &Literal, why: Justification) {
    match why {
      Justification::NoJustificationNeeded => {}
      Justification::Guess => {
        self.need_proof_name(lit);
        if !is_literally_true(lit) {
          let stack = state
            .guesses()
            .map(|g| format!("{}", g))
            .collect::<Vec<_>>()
            .join(" ");
          self
            .logger
            .emit_comment(&format!("guessing {}, decision stack is [ {} ]", lit, stack));
        }
      }
      Justification::Rup { reason } => {
        self.emit_inference_clause(lit, &reason, false);
      }
      Justification::Assert { reason } => {
        self.emit_inference_clause(lit, &reason, true);
      }
      Justification::Explicit { steps, reason } => {
        self.need_proof_name(lit);
        let temporary = self.logger.temporary_proof_level();
        steps(self, &reason);
        self.emit_inference_clause(lit, &reason, false);
        self.forget_level(temporary);
      }
    }
  }

  /// The clause `reason → lit` as a single proof line at the current level.
  fn emit_inference_clause(&mut self, lit: &Literal, reason: &Reason, as_assertion: bool) {
    self.need_proof_name(lit);
    for r in reason {
      self.need_proof_name(r);
    }
    if is_literally_true(lit) {
      return;
    }
    let mut sum = PbSum::new();
    for &r in reason {
      sum = sum.plus(1, !r);
    }
    sum = sum.plus(1, *lit);
    let flat = flatten_greater_equal(&self.names, &sum, 1);
    if as_assertion {
      self.logger.emit_flat_assert(&self.names, &flat, ProofLevel::Current);
    } else {
      self.logger.emit_flat_rup(&self.names, &flat, ProofLevel::Current);
    }
  }

  /// After a subtree is exhausted: the negation of the current guess stack is RUP.
  pub(crate) fn log_backtrack(&mut self, state: &State) {
    self.logger.emit_comment("backtracking");
    let mut sum = PbSum::new();
    for &guess in state.guesses() {
      self.need_proof_name(&guess);
      sum = sum.plus(1, !guess);
    }
    let flat = flatten_greater_equal(&self.names, &sum, 1);
    self.logger.emit_flat_rup(&self.names, &flat, ProofLevel::Current);
  }

  /// Logs a full assignment. The verifier answers a `solx` with a solution-excluding clause
  /// and a `soli` with an objective-improving constraint; either way that constraint takes
  /// the next line number and lives at the top level.
  pub(crate) fn log_solution(
    &mut self,
    state: &State,
    vars: &[SimpleVariableId],
    improvement: bool,
  ) -> ProofLine {
    self.logger.emit_comment("solution");
    let mut assignment = Vec::new();
    for &var in vars {
      if let Some(value) = state.optional_single_value(VariableId::Simple(var)) {
        let lit = Literal::equal_to(var, value);
        self.need_proof_name(&lit);
        if let SimplifiedLiteral::Condition(cond) = simplify_literal(&lit) {
          assignment.push(self.names.xliteral_for_condition(&cond));
        }
      }
    }
    self.logger.emit_solution(&self.names, &assignment, improvement)
  }

  // endregion

  // region Emission helpers for propagators

  pub(crate) fn emit_proof_comment(&mut self, text: &str) {
    if self.logging {
      self.logger.emit_comment(text);
    } else {
      self.model.comment(text);
    }
  }

  /// A raw polynomial-combination (or other) derivation line.
  pub(crate) fn emit_proof_line(&mut self, text: &str, level: ProofLevel) -> ProofLine {
    self.logger.emit_text_line(text, level)
  }

  pub(crate) fn emit_rup(&mut self, constraint: &PbConstraint, level: ProofLevel) -> ProofLine {
    self.ensure_names_in(constraint, None);
    self.logger.emit_rup(&self.names, constraint, level)
  }

  pub(crate) fn emit_assert(&mut self, constraint: &PbConstraint, level: ProofLevel) -> ProofLine {
    self.ensure_names_in(constraint, None);
    let mut first = 0;
    for flat in pb::normalise(&self.names, constraint) {
      let line = self.logger.emit_flat_assert(&self.names, &flat, level);
      if first == 0 {
        first = line;
      }
    }
    first
  }

  // endregion

  // region Levels and conclusions

  pub(crate) fn enter_level(&mut self, depth: usize) {
    self.logger.enter_proof_level(depth);
  }

  pub(crate) fn forget_level(&mut self, depth: usize) {
    self.logger.forget_proof_level(depth);
  }

  pub(crate) fn conclude_unsatisfiable(&mut self, is_optimisation: bool) -> Result<(), Error> {
    self.logger.conclude_unsatisfiable(is_optimisation)
  }

  pub(crate) fn conclude_satisfiable(&mut self) -> Result<(), Error> {
    self.logger.conclude_satisfiable()
  }

  pub(crate) fn conclude_bounds(
    &mut self,
    objective: VariableId,
    lower: Integer,
    upper: Integer,
  ) -> Result<(), Error> {
    let bound = PbSum::new().plus(1, objective).greater_equal(lower);
    self.emit_rup(&bound, ProofLevel::Top);
    self.logger.conclude_bounds(lower, upper)
  }

  pub(crate) fn conclude_none(&mut self) -> Result<(), Error> {
    self.logger.conclude_none()
  }

  // endregion
}

impl FlatInequality {
  /// Adds `slack · ~x` for each given literal, making the inequality vacuous whenever any of
  /// them is false.
  pub(crate) fn reify_xliterals(&mut self, xliterals: &[XLiteral]) {
    let slack = (self.rhs - self.lhs_minimum()).max(0);
    if slack == 0 {
      return;
    }
    for &xlit in xliterals {
      self.terms.push((slack, xlit.negated()));
    }
  }
}
