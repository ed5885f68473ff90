/*!

  The write-once pseudo-Boolean model of the problem. Constraints are buffered during posting
  and numbered consecutively from 1; `finalise` writes the OPB header (which needs the final
  variable and constraint counts), the optional objective, and then the body.

*/

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

use crate::errors::Error;
use crate::proofs::names::{value_name, NamesAndIdsTracker};
use crate::proofs::pb::{
  normalise,
  FlatInequality,
  PbConstraint,
  PbVariableId,
  ProofLine,
  ProofLiteralOrFlag,
  XLiteral,
};
use crate::variable::VariableId;
use crate::Integer;

pub struct ProofModel {
  body:                  String,
  number_of_constraints: ProofLine,
  objective:             Option<VariableId>,
  opb_file:              PathBuf,
  mapping_file:          Option<PathBuf>,
}

impl ProofModel {
  pub fn new(opb_file: PathBuf, mapping_file: Option<PathBuf>) -> ProofModel {
    ProofModel {
      body: String::new(),
      number_of_constraints: 0,
      objective: None,
      opb_file,
      mapping_file,
    }
  }

  pub fn number_of_constraints(&self) -> ProofLine {
    self.number_of_constraints
  }

  pub(crate) fn comment(&mut self, text: &str) {
    self.body.push_str("* ");
    self.body.push_str(text);
    self.body.push('\n');
  }

  /// Writes one already-flattened `>=` line and returns its number.
  pub(crate) fn add_flat(&mut self, names: &NamesAndIdsTracker, flat: &FlatInequality) -> ProofLine {
    self.body.push_str(&flat.text(names));
    self.body.push('\n');
    self.number_of_constraints += 1;
    self.number_of_constraints
  }

  /// Writes a constraint, optionally half-reified on a conjunction, and returns the number
  /// of the first line written. Equalities take two consecutive lines, the `<=` direction
  /// first. Every condition mentioned must already have a proof name.
  pub(crate) fn add_constraint(
    &mut self,
    names: &NamesAndIdsTracker,
    constraint: &PbConstraint,
    half_reif: Option<&[ProofLiteralOrFlag]>,
  ) -> ProofLine {
    let first = self.number_of_constraints + 1;
    for mut flat in normalise(names, constraint) {
      if let Some(reif) = half_reif {
        flat.reify(names, reif);
      }
      self.add_flat(names, &flat);
    }
    first
  }

  /// Sets up the bit encoding of an integer variable: a comment, the tracked bits, and the
  /// two bound constraints.
  pub(crate) fn set_up_integer_variable(
    &mut self,
    names: &mut NamesAndIdsTracker,
    id: PbVariableId,
    lower: Integer,
    upper: Integer,
    base_name: String,
  ) {
    names.set_base_name(id, base_name.clone());
    self.comment(&format!("variable {} {} .. {} bits encoding", base_name, lower, upper));

    let (negative_coeff, highest_bit_shift) = bits_encoding_coeffs(lower, upper);
    let mut bits: Vec<(Integer, XLiteral)> = Vec::new();

    if negative_coeff != 0 {
      let shift = negative_coeff.unsigned_abs().trailing_zeros();
      let xlit = names.allocate_xliteral(
        format!("{}n{}", base_name, shift),
        format!("{} negative bit {}", base_name, negative_coeff),
      );
      bits.push((negative_coeff, xlit));
    }
    for b in 0..=highest_bit_shift {
      let xlit = names.allocate_xliteral(
        format!("{}b{}", base_name, b),
        format!("{} bit {}", base_name, 1i64 << b),
      );
      bits.push((1 << b, xlit));
    }

    names.track_bits(id, negative_coeff, bits.clone());
    names.track_bounds(id, lower, upper);

    // lower bound, then upper bound
    let lower_line = FlatInequality { terms: bits.clone(), rhs: lower };
    self.add_flat(names, &lower_line);
    let upper_line = FlatInequality {
      terms: bits.iter().map(|&(c, x)| (-c, x)).collect(),
      rhs:   -upper,
    };
    self.add_flat(names, &upper_line);
  }

  pub(crate) fn set_objective_minimise(&mut self, var: VariableId) {
    self.objective = Some(var);
  }

  /// Writes the OPB file: header, optional objective, buffered body; and the optional names
  /// mapping file for verifier diagnostics.
  pub(crate) fn finalise(&mut self, names: &NamesAndIdsTracker) -> Result<(), Error> {
    let mut out = String::new();
    out.push_str(&format!(
      "* #variable= {} #constraint= {}\n",
      names.xliteral_count(),
      self.number_of_constraints
    ));

    if let Some(objective) = self.objective {
      out.push_str("min: ");
      let (id, negate) = match objective {
        VariableId::Simple(simple) => (PbVariableId::Simple(simple), false),
        VariableId::View(view) => (PbVariableId::Simple(view.actual), view.negate_first),
        VariableId::Constant(_) => {
          return Err(Error::Unimplemented("constant objective variable"));
        }
      };
      // the additive part of a view is irrelevant to the argmin
      for &(weight, xlit) in &names.bit_encoding(id).bits {
        let weight = if negate { -weight } else { weight };
        out.push_str(&format!("{} {} ", weight, names.xliteral_text(xlit)));
      }
      out.push_str(";\n");
    }

    out.push_str(&self.body);

    write_file(&self.opb_file, &out)
      .map_err(|e| Error::Proof(format!("error writing opb file '{}': {}", self.opb_file.display(), e)))?;

    if let Some(mapping_file) = &self.mapping_file {
      let mut map = String::new();
      for (name, meaning) in names.mapping_entries() {
        map.push_str(&format!("{} <- {}\n", name, meaning));
      }
      write_file(mapping_file, &map)
        .map_err(|e| Error::Proof(format!("error writing mapping file '{}': {}", mapping_file.display(), e)))?;
    }

    Ok(())
  }
}

fn write_file(path: &PathBuf, contents: &str) -> std::io::Result<()> {
  let mut file = File::create(path)?;
  file.write_all(contents.as_bytes())?;
  file.flush()
}

/// The negative-weight bit coefficient (zero when the domain never goes below zero) and the
/// highest positive bit shift needed to cover `[lower, upper]`.
fn bits_encoding_coeffs(lower: Integer, upper: Integer) -> (Integer, u32) {
  let negative_coeff = if lower >= 0 {
    0
  } else {
    // the smallest power of two at least -lower, negated
    -(((-lower) as u64).next_power_of_two() as Integer)
  };
  let positive_max = upper.max(-1 - negative_coeff).max(0) as u64;
  let highest_bit_shift = if positive_max <= 1 {
    0
  } else {
    63 - positive_max.leading_zeros()
  };
  (negative_coeff, highest_bit_shift)
}

/// The pseudo-Boolean name of an order variable `[x >= v]`.
pub(crate) fn gevar_name(base: &str, value: Integer) -> String {
  format!("{}ge{}", base, value_name(value))
}

/// The pseudo-Boolean name of a direct variable `[x = v]`.
pub(crate) fn eqvar_name(base: &str, value: Integer) -> String {
  format!("{}eq{}", base, value_name(value))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn bit_coefficients_cover_the_domain() {
    // [0, 8] needs bits up to 8
    assert_eq!(bits_encoding_coeffs(0, 8), (0, 3));
    // [1, 1] still gets one bit
    assert_eq!(bits_encoding_coeffs(1, 1), (0, 0));
    // [-3, 4]: negative bit -4, positive bits to 3 (covering -1 - -4 = 3 and 4)
    assert_eq!(bits_encoding_coeffs(-3, 4), (-4, 2));
    // [-10, -2]: negative bit -16, positive bits to 15
    assert_eq!(bits_encoding_coeffs(-10, -2), (-16, 3));
  }

  #[test]
  fn every_domain_value_is_representable() {
    for (lower, upper) in [(-3i64, 4i64), (-10, -2), (0, 63), (-1, 0), (5, 9)] {
      let (neg, shift) = bits_encoding_coeffs(lower, upper);
      let positive_max = (1i64 << (shift + 1)) - 1;
      for v in lower..=upper {
        let representable = (0..=positive_max).any(|p| p == v || (neg != 0 && neg + p == v));
        assert!(representable, "{} not representable in [{}, {}]", v, lower, upper);
      }
    }
  }
}
