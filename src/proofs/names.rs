/*!

  The names-and-IDs tracker: a bijection between CP-level conditions, flags, and variable bits
  on one side and pseudo-Boolean literals in the emitted files on the other. It is pure
  bookkeeping; the decisions about *when* an encoding is materialised, and the emission of its
  defining constraints, live in the `Proof` facade, which writes into the model during posting
  and introduces red-rule definitions during search.

*/

use std::collections::{BTreeMap, HashMap};

use crate::literal::{ConditionOperator, SimpleCondition};
use crate::proofs::pb::{PbVariableId, ProofFlag, ProofLine, XLiteral};
use crate::Integer;

/// The bit encoding `Σ wᵢ·bᵢ = x` chosen for an integer variable. When the domain crosses
/// zero the first entry carries the single negative weight.
#[derive(Clone, Debug)]
pub(crate) struct BitEncoding {
  pub negative_coeff: Integer,
  pub bits:           Vec<(Integer, XLiteral)>,
}

/// An order variable `[x >= v]` and the lines defining it: `forward_line` is
/// `[x >= v] -> x >= v`, `reverse_line` is `[x < v] -> x < v`.
#[derive(Copy, Clone, Debug)]
pub(crate) struct GevarDefinition {
  pub xliteral:     XLiteral,
  pub forward_line: ProofLine,
  pub reverse_line: ProofLine,
}

#[derive(Default)]
pub struct NamesAndIdsTracker {
  // XLiteral index → name in the pseudo-Boolean files
  xliteral_names: Vec<String>,
  // (name, human-readable meaning) pairs for the optional mapping file
  mapping: Vec<(String, String)>,

  base_names:        HashMap<PbVariableId, String>,
  bits:              HashMap<PbVariableId, BitEncoding>,
  definition_bounds: HashMap<PbVariableId, (Integer, Integer)>,
  gevars:            HashMap<PbVariableId, BTreeMap<Integer, GevarDefinition>>,
  eqvars:            HashMap<PbVariableId, HashMap<Integer, XLiteral>>,
  flags:             Vec<XLiteral>,
  proof_only_count:  u32,
}

impl NamesAndIdsTracker {
  pub fn new() -> Self {
    Self::default()
  }

  /// How many pseudo-Boolean variables have been allocated so far. This is the
  /// `#variable=` count in the OPB header.
  pub(crate) fn xliteral_count(&self) -> u64 {
    self.xliteral_names.len() as u64
  }

  pub(crate) fn allocate_xliteral(&mut self, name: String, meaning: String) -> XLiteral {
    let index = self.xliteral_names.len() as u32;
    self.mapping.push((name.clone(), meaning));
    self.xliteral_names.push(name);
    XLiteral::positive(index)
  }

  pub(crate) fn xliteral_text(&self, xlit: XLiteral) -> String {
    let name = &self.xliteral_names[xlit.index as usize];
    if xlit.negated {
      format!("~{}", name)
    } else {
      name.clone()
    }
  }

  pub(crate) fn mapping_entries(&self) -> impl Iterator<Item = &(String, String)> {
    self.mapping.iter()
  }

  // region Variables and bits

  pub(crate) fn set_base_name(&mut self, id: PbVariableId, name: String) {
    self.base_names.insert(id, name);
  }

  pub(crate) fn base_name(&self, id: PbVariableId) -> &str {
    match self.base_names.get(&id) {
      Some(name) => name,
      None => panic!("no base name tracked for {:?}", id),
    }
  }

  pub(crate) fn next_proof_only_index(&mut self) -> u32 {
    let index = self.proof_only_count;
    self.proof_only_count += 1;
    index
  }

  pub(crate) fn track_bits(&mut self, id: PbVariableId, negative_coeff: Integer, bits: Vec<(Integer, XLiteral)>) {
    self.bits.insert(id, BitEncoding { negative_coeff, bits });
  }

  pub(crate) fn bit_encoding(&self, id: PbVariableId) -> &BitEncoding {
    match self.bits.get(&id) {
      Some(encoding) => encoding,
      None => panic!("no bit encoding tracked for {:?}", id),
    }
  }

  pub(crate) fn get_bit(&self, id: PbVariableId, position: u32) -> (Integer, XLiteral) {
    self.bit_encoding(id).bits[position as usize]
  }

  pub(crate) fn num_bits(&self, id: PbVariableId) -> u32 {
    self.bit_encoding(id).bits.len() as u32
  }

  pub(crate) fn track_bounds(&mut self, id: PbVariableId, lower: Integer, upper: Integer) {
    self.definition_bounds.insert(id, (lower, upper));
  }

  pub(crate) fn definition_bounds(&self, id: PbVariableId) -> Option<(Integer, Integer)> {
    self.definition_bounds.get(&id).copied()
  }

  // endregion

  // region Order and direct encodings

  pub(crate) fn gevar(&self, id: PbVariableId, value: Integer) -> Option<XLiteral> {
    self
      .gevars
      .get(&id)
      .and_then(|m| m.get(&value))
      .map(|def| def.xliteral)
  }

  pub(crate) fn gevar_definition(&self, id: PbVariableId, value: Integer) -> Option<GevarDefinition> {
    self.gevars.get(&id).and_then(|m| m.get(&value)).copied()
  }

  pub(crate) fn insert_gevar(&mut self, id: PbVariableId, value: Integer, def: GevarDefinition) {
    self.gevars.entry(id).or_default().insert(value, def);
  }

  /// The nearest order-variable thresholds already defined on either side of `value`.
  pub(crate) fn gevar_neighbours(
    &self,
    id: PbVariableId,
    value: Integer,
  ) -> (Option<Integer>, Option<Integer>) {
    match self.gevars.get(&id) {
      None => (None, None),
      Some(m) => {
        let below = m.range(..value).next_back().map(|(&v, _)| v);
        let above = m.range(value + 1..).next().map(|(&v, _)| v);
        (below, above)
      }
    }
  }

  pub(crate) fn eqvar(&self, id: PbVariableId, value: Integer) -> Option<XLiteral> {
    self.eqvars.get(&id).and_then(|m| m.get(&value)).copied()
  }

  pub(crate) fn insert_eqvar(&mut self, id: PbVariableId, value: Integer, xlit: XLiteral) {
    self.eqvars.entry(id).or_default().insert(value, xlit);
  }

  /// The pseudo-Boolean literal for a condition. `need_proof_name` must have been called
  /// for the condition first; a missing name is a fatal contract violation.
  pub(crate) fn xliteral_for_condition(&self, cond: &SimpleCondition) -> XLiteral {
    let id = PbVariableId::Simple(cond.var);
    let missing = || panic!("missing proof name for condition {:?}", cond);
    match cond.op {
      ConditionOperator::Equal        => self.eqvar(id, cond.value).unwrap_or_else(missing),
      ConditionOperator::NotEqual     => self.eqvar(id, cond.value).unwrap_or_else(missing).negated(),
      ConditionOperator::GreaterEqual => self.gevar(id, cond.value).unwrap_or_else(missing),
      ConditionOperator::Less         => self.gevar(id, cond.value).unwrap_or_else(missing).negated(),
    }
  }

  // endregion

  // region Flags

  pub(crate) fn create_flag(&mut self, name: &str) -> ProofFlag {
    let index = self.flags.len() as u32;
    let pb_name = format!("f{}_{}", index, sanitise_name(name));
    let xlit = self.allocate_xliteral(pb_name, format!("flag {}", name));
    self.flags.push(xlit);
    ProofFlag { index, positive: true }
  }

  pub(crate) fn xliteral_for_flag(&self, flag: ProofFlag) -> XLiteral {
    let xlit = self.flags[flag.index as usize];
    if flag.positive {
      xlit
    } else {
      xlit.negated()
    }
  }

  // endregion
}

/// OPB variable names are restricted to word characters; everything else becomes an
/// underscore.
pub(crate) fn sanitise_name(name: &str) -> String {
  name
    .chars()
    .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
    .collect()
}

/// The textual chunk naming an integer value inside a pseudo-Boolean variable name; minus
/// signs are not legal there.
pub(crate) fn value_name(value: Integer) -> String {
  if value < 0 {
    format!("m{}", -value)
  } else {
    format!("{}", value)
  }
}
