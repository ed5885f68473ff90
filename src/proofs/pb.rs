/*!

  Pseudo-Boolean building blocks shared by the model writer and the proof logger: literals in
  the pseudo-Boolean file (`XLiteral`), auxiliary flags and proof-only variables, weighted
  sums over terms, and the flattening of a sum into the normalised `>= k` form every emitted
  line uses.

*/

use crate::literal::{simplify_literal, Literal, SimplifiedLiteral};
use crate::proofs::names::NamesAndIdsTracker;
use crate::variable::{SimpleVariableId, VariableId};
use crate::Integer;

/// A line number in the model or proof. Constraints are numbered consecutively from 1 and
/// the counter is never decremented.
pub type ProofLine = u64;

/// Scopes a proof line so its deletion can be batched when the corresponding epoch ends.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum ProofLevel {
  /// Keep for the rest of the proof.
  Top,
  /// Forget when the current search epoch is popped.
  Current,
  /// Forget as soon as the inference being justified has been wrapped up.
  Temporary,
}

/// A literal in the pseudo-Boolean file: an interned name plus a negation bit.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct XLiteral {
  pub(crate) index:   u32,
  pub(crate) negated: bool,
}

impl XLiteral {
  pub(crate) const fn positive(index: u32) -> XLiteral {
    XLiteral { index, negated: false }
  }

  pub const fn negated(self) -> XLiteral {
    XLiteral { index: self.index, negated: !self.negated }
  }
}

/// A named Boolean auxiliary introduced by a propagator.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ProofFlag {
  pub(crate) index:    u32,
  pub(crate) positive: bool,
}

impl std::ops::Not for ProofFlag {
  type Output = Self;

  fn not(self) -> Self::Output {
    ProofFlag { index: self.index, positive: !self.positive }
  }
}

/// An integer variable that exists only in the proof, e.g. the magnitude of a signed
/// variable. It has a bit encoding but no domain in the state store.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ProofOnlyVariable(pub(crate) u32);

/// A variable with a bit encoding: either a real decision variable or a proof-only one.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub enum PbVariableId {
  Simple(SimpleVariableId),
  ProofOnly(ProofOnlyVariable),
}

impl From<SimpleVariableId> for PbVariableId {
  fn from(v: SimpleVariableId) -> Self {
    PbVariableId::Simple(v)
  }
}

impl From<ProofOnlyVariable> for PbVariableId {
  fn from(v: ProofOnlyVariable) -> Self {
    PbVariableId::ProofOnly(v)
  }
}

/// One bit of an integer variable's bit encoding.
#[derive(Copy, Clone, Eq, PartialEq, Debug, Hash)]
pub struct ProofBitVariable {
  pub var:      PbVariableId,
  pub position: u32,
  pub positive: bool,
}

/// A term a pseudo-Boolean sum may mention. Integer-variable terms expand to their bit
/// encodings when the sum is flattened; constants and views fold into the right-hand side.
#[derive(Clone, Debug)]
pub enum PbTerm {
  Literal(Literal),
  Flag(ProofFlag),
  Bit(ProofBitVariable),
  Variable(VariableId),
  ProofOnlyVariable(ProofOnlyVariable),
}

impl From<Literal> for PbTerm {
  fn from(lit: Literal) -> Self {
    PbTerm::Literal(lit)
  }
}

impl From<ProofFlag> for PbTerm {
  fn from(flag: ProofFlag) -> Self {
    PbTerm::Flag(flag)
  }
}

impl From<ProofBitVariable> for PbTerm {
  fn from(bit: ProofBitVariable) -> Self {
    PbTerm::Bit(bit)
  }
}

impl From<VariableId> for PbTerm {
  fn from(var: VariableId) -> Self {
    PbTerm::Variable(var)
  }
}

impl From<SimpleVariableId> for PbTerm {
  fn from(var: SimpleVariableId) -> Self {
    PbTerm::Variable(VariableId::Simple(var))
  }
}

impl From<ProofOnlyVariable> for PbTerm {
  fn from(var: ProofOnlyVariable) -> Self {
    PbTerm::ProofOnlyVariable(var)
  }
}

/// Either a CP literal or a proof flag; reification conjunctions and red-rule witnesses
/// accept both.
#[derive(Clone, Debug)]
pub enum ProofLiteralOrFlag {
  Literal(Literal),
  Flag(ProofFlag),
}

impl From<Literal> for ProofLiteralOrFlag {
  fn from(lit: Literal) -> Self {
    ProofLiteralOrFlag::Literal(lit)
  }
}

impl From<ProofFlag> for ProofLiteralOrFlag {
  fn from(flag: ProofFlag) -> Self {
    ProofLiteralOrFlag::Flag(flag)
  }
}

/// A sum of weighted terms.
#[derive(Clone, Debug, Default)]
pub struct PbSum {
  pub terms: Vec<(Integer, PbTerm)>,
}

impl PbSum {
  pub fn new() -> PbSum {
    PbSum { terms: Vec::new() }
  }

  pub fn plus(mut self, coeff: Integer, term: impl Into<PbTerm>) -> PbSum {
    self.terms.push((coeff, term.into()));
    self
  }

  pub fn less_equal(self, rhs: Integer) -> PbConstraint {
    PbConstraint { sum: self, cmp: PbComparator::LessEqual, rhs }
  }

  pub fn greater_equal(self, rhs: Integer) -> PbConstraint {
    PbConstraint { sum: self, cmp: PbComparator::GreaterEqual, rhs }
  }

  pub fn equal(self, rhs: Integer) -> PbConstraint {
    PbConstraint { sum: self, cmp: PbComparator::Equal, rhs }
  }
}

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum PbComparator {
  LessEqual,
  GreaterEqual,
  Equal,
}

/// A sum compared to an integer. Equalities are emitted as two `>=` lines.
#[derive(Clone, Debug)]
pub struct PbConstraint {
  pub sum: PbSum,
  pub cmp: PbComparator,
  pub rhs: Integer,
}

// region Flattening

/// A sum flattened into `Σ coeff·xliteral >= rhs` over pseudo-Boolean literals only.
#[derive(Clone, Debug)]
pub(crate) struct FlatInequality {
  pub terms: Vec<(Integer, XLiteral)>,
  pub rhs:   Integer,
}

impl FlatInequality {
  /// The smallest value the left-hand side can take.
  pub fn lhs_minimum(&self) -> Integer {
    self.terms.iter().map(|&(c, _)| c.min(0)).sum()
  }

  /// Adds `slack * ~r` for each reification literal, making the inequality vacuous whenever
  /// any of them is false.
  pub fn reify(&mut self, names: &NamesAndIdsTracker, reif: &[ProofLiteralOrFlag]) {
    let slack = (self.rhs - self.lhs_minimum()).max(0);
    if slack == 0 {
      return;
    }
    for r in reif {
      match xliteral_for(names, r) {
        Some(xlit) => self.terms.push((slack, xlit.negated())),
        // A trivially true reifier contributes nothing; a trivially false one makes the
        // whole constraint vacuous.
        None => match r {
          ProofLiteralOrFlag::Literal(lit) if matches!(simplify_literal(lit), SimplifiedLiteral::False) => {
            self.rhs -= slack;
          }
          _ => {}
        },
      }
    }
  }

  pub fn text(&self, names: &NamesAndIdsTracker) -> String {
    let mut out = String::new();
    for &(coeff, xlit) in &self.terms {
      out.push_str(&format!("{} {} ", coeff, names.xliteral_text(xlit)));
    }
    out.push_str(&format!(">= {} ;", self.rhs));
    out
  }
}

fn xliteral_for(names: &NamesAndIdsTracker, r: &ProofLiteralOrFlag) -> Option<XLiteral> {
  match r {
    ProofLiteralOrFlag::Flag(flag) => Some(names.xliteral_for_flag(*flag)),
    ProofLiteralOrFlag::Literal(lit) => match simplify_literal(lit) {
      SimplifiedLiteral::Condition(cond) => Some(names.xliteral_for_condition(&cond)),
      _ => None,
    },
  }
}

/// Flattens `sum >= rhs`. Every condition mentioned must already have a proof name.
pub(crate) fn flatten_greater_equal(
  names: &NamesAndIdsTracker,
  sum: &PbSum,
  rhs: Integer,
) -> FlatInequality {
  let mut flat = FlatInequality { terms: Vec::new(), rhs };

  for (coeff, term) in &sum.terms {
    let coeff = *coeff;
    if coeff == 0 {
      continue;
    }
    match term {
      PbTerm::Literal(lit) => match simplify_literal(lit) {
        SimplifiedLiteral::True => flat.rhs -= coeff,
        SimplifiedLiteral::False => {}
        SimplifiedLiteral::Condition(cond) => {
          flat.terms.push((coeff, names.xliteral_for_condition(&cond)));
        }
      },
      PbTerm::Flag(flag) => flat.terms.push((coeff, names.xliteral_for_flag(*flag))),
      PbTerm::Bit(bit) => {
        let (_weight, xlit) = names.get_bit(bit.var, bit.position);
        let xlit = if bit.positive { xlit } else { xlit.negated() };
        flat.terms.push((coeff, xlit));
      }
      PbTerm::Variable(var) => match *var {
        VariableId::Constant(c) => flat.rhs -= coeff * c,
        VariableId::Simple(simple) => push_bits(names, &mut flat, coeff, simple.into()),
        VariableId::View(view) => {
          flat.rhs -= coeff * view.then_add;
          let inner = if view.negate_first { -coeff } else { coeff };
          push_bits(names, &mut flat, inner, view.actual.into());
        }
      },
      PbTerm::ProofOnlyVariable(var) => push_bits(names, &mut flat, coeff, (*var).into()),
    }
  }

  flat
}

fn push_bits(
  names: &NamesAndIdsTracker,
  flat: &mut FlatInequality,
  coeff: Integer,
  var: PbVariableId,
) {
  for &(weight, xlit) in &names.bit_encoding(var).bits {
    flat.terms.push((coeff * weight, xlit));
  }
}

/// The one or two `>=`-form inequalities a constraint normalises to.
pub(crate) fn normalise(
  names: &NamesAndIdsTracker,
  constraint: &PbConstraint,
) -> Vec<FlatInequality> {
  let negated = || {
    let negated_sum = PbSum {
      terms: constraint
        .sum
        .terms
        .iter()
        .map(|(c, t)| (-c, t.clone()))
        .collect(),
    };
    flatten_greater_equal(names, &negated_sum, -constraint.rhs)
  };

  match constraint.cmp {
    PbComparator::GreaterEqual => {
      vec![flatten_greater_equal(names, &constraint.sum, constraint.rhs)]
    }
    PbComparator::LessEqual => vec![negated()],
    PbComparator::Equal => vec![negated(), flatten_greater_equal(names, &constraint.sum, constraint.rhs)],
  }
}

// endregion
