/*!

  The append-only proof trace. Lines are numbered monotonically continuing from the model's
  constraint count; every derived line is recorded into the interval set of its proof level so
  that `forget_proof_level` can delete a whole level with a few `del range` directives when
  the corresponding search epoch is popped.

  Write failures are sticky: emission never fails mid-search, and the stored error surfaces
  from `end_proof`.

*/

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::data_structures::IntervalSet;
use crate::errors::Error;
use crate::proofs::names::NamesAndIdsTracker;
use crate::proofs::pb::{normalise, FlatInequality, PbConstraint, ProofLevel, ProofLine, XLiteral};

pub struct ProofLogger {
  proof_file:         PathBuf,
  out:                Option<BufWriter<File>>,
  write_error:        Option<String>,
  proof_line:         ProofLine,
  active_proof_level: usize,
  lines_by_level:     Vec<IntervalSet<ProofLine>>,
  ended:              bool,
}

impl ProofLogger {
  pub fn new(proof_file: PathBuf) -> ProofLogger {
    ProofLogger {
      proof_file,
      out: None,
      write_error: None,
      proof_line: 0,
      active_proof_level: 0,
      lines_by_level: vec![IntervalSet::empty(), IntervalSet::empty()],
      ended: false,
    }
  }

  /// Opens the proof file and writes the preamble: the formula's constraints become axiom
  /// lines 1 to `model_constraints`.
  pub fn start_proof(&mut self, model_constraints: ProofLine) -> Result<(), Error> {
    let file = File::create(&self.proof_file).map_err(|e| {
      Error::Proof(format!("error writing proof file '{}': {}", self.proof_file.display(), e))
    })?;
    self.out = Some(BufWriter::new(file));
    self.raw("pseudo-Boolean proof version 2.0");
    self.raw(&format!("f {} 0", model_constraints));
    self.proof_line = model_constraints;
    Ok(())
  }

  fn raw(&mut self, line: &str) {
    if self.ended {
      panic!("attempt to write to the proof after it ended");
    }
    if self.write_error.is_some() {
      return;
    }
    if let Some(out) = &mut self.out {
      if let Err(e) = writeln!(out, "{}", line) {
        self.write_error = Some(e.to_string());
      }
    }
  }

  fn record(&mut self, level: ProofLevel) -> ProofLine {
    self.proof_line += 1;
    let depth = match level {
      ProofLevel::Top       => 0,
      ProofLevel::Current   => self.active_proof_level,
      ProofLevel::Temporary => self.active_proof_level + 1,
    };
    if self.lines_by_level.len() <= depth {
      self.lines_by_level.resize_with(depth + 1, IntervalSet::empty);
    }
    self.lines_by_level[depth].insert_at_end(self.proof_line);
    self.proof_line
  }

  // region Emission

  pub fn emit_comment(&mut self, text: &str) {
    self.raw(&format!("* {}", text));
  }

  /// An arbitrary derivation line, e.g. a `p` polynomial combination.
  pub(crate) fn emit_text_line(&mut self, text: &str, level: ProofLevel) -> ProofLine {
    self.raw(text);
    self.record(level)
  }

  pub(crate) fn emit_flat_rup(
    &mut self,
    names: &NamesAndIdsTracker,
    flat: &FlatInequality,
    level: ProofLevel,
  ) -> ProofLine {
    self.raw(&format!("u {}", flat.text(names)));
    self.record(level)
  }

  pub(crate) fn emit_flat_assert(
    &mut self,
    names: &NamesAndIdsTracker,
    flat: &FlatInequality,
    level: ProofLevel,
  ) -> ProofLine {
    self.raw(&format!("a {}", flat.text(names)));
    self.record(level)
  }

  /// RUP of a whole constraint; an equality takes two lines and the first is returned.
  pub(crate) fn emit_rup(
    &mut self,
    names: &NamesAndIdsTracker,
    constraint: &PbConstraint,
    level: ProofLevel,
  ) -> ProofLine {
    let mut first = 0;
    for flat in normalise(names, constraint) {
      let line = self.emit_flat_rup(names, &flat, level);
      if first == 0 {
        first = line;
      }
    }
    first
  }

  /// A redundance-based introduction with an explicit witness assignment.
  pub(crate) fn emit_flat_red(
    &mut self,
    names: &NamesAndIdsTracker,
    flat: &FlatInequality,
    witness: &[(XLiteral, bool)],
    level: ProofLevel,
  ) -> ProofLine {
    let witness_text = witness
      .iter()
      .map(|&(xlit, value)| {
        format!("{} -> {}", names.xliteral_text(xlit), if value { "1" } else { "0" })
      })
      .collect::<Vec<_>>()
      .join(" ");
    self.raw(&format!("red {} {}", flat.text(names), witness_text));
    self.record(level)
  }

  /// Logs a solution: `solx` for plain solutions, `soli` when improving an objective. The
  /// verifier answers with an excluding (respectively improving) constraint, which takes the
  /// next line number.
  pub(crate) fn emit_solution(
    &mut self,
    names: &NamesAndIdsTracker,
    assignment: &[XLiteral],
    improvement: bool,
  ) -> ProofLine {
    let keyword = if improvement { "soli" } else { "solx" };
    let text = assignment
      .iter()
      .map(|&xlit| names.xliteral_text(xlit))
      .collect::<Vec<_>>()
      .join(" ");
    self.raw(&format!("{} {}", keyword, text));
    self.record(ProofLevel::Top)
  }

  // endregion

  // region Proof levels

  pub fn proof_level(&self) -> usize {
    self.active_proof_level
  }

  pub fn temporary_proof_level(&self) -> usize {
    self.active_proof_level + 1
  }

  pub fn enter_proof_level(&mut self, depth: usize) {
    if self.lines_by_level.len() <= depth + 1 {
      self.lines_by_level.resize_with(depth + 2, IntervalSet::empty);
    }
    self.active_proof_level = depth;
  }

  /// Emits `del` directives covering every line recorded at `depth` and clears the record.
  pub fn forget_proof_level(&mut self, depth: usize) {
    if depth >= self.lines_by_level.len() {
      return;
    }
    let lines = std::mem::replace(&mut self.lines_by_level[depth], IntervalSet::empty());
    for (lower, upper) in lines.each_interval() {
      if lower == upper {
        self.raw(&format!("del id {}", lower));
      } else {
        self.raw(&format!("del range {} {}", lower, upper + 1));
      }
    }
  }

  // endregion

  // region Conclusions

  pub fn conclude_unsatisfiable(&mut self, is_optimisation: bool) -> Result<(), Error> {
    self.emit_comment("asserting contradiction");
    self.raw("u >= 1 ;");
    let line = self.record(ProofLevel::Top);
    self.raw("output NONE");
    if is_optimisation {
      self.raw("conclusion BOUNDS INF INF");
    } else {
      self.raw(&format!("conclusion UNSAT : {}", line));
    }
    self.end_proof()
  }

  pub fn conclude_satisfiable(&mut self) -> Result<(), Error> {
    self.raw("output NONE");
    self.raw("conclusion SAT");
    self.end_proof()
  }

  /// The facade emits the `u` line proving the objective's lower bound before calling this.
  pub fn conclude_bounds(&mut self, lower: crate::Integer, upper: crate::Integer) -> Result<(), Error> {
    self.raw("output NONE");
    self.raw(&format!("conclusion BOUNDS {} {}", lower, upper));
    self.end_proof()
  }

  pub fn conclude_none(&mut self) -> Result<(), Error> {
    self.raw("output NONE");
    self.raw("conclusion NONE");
    self.end_proof()
  }

  fn end_proof(&mut self) -> Result<(), Error> {
    self.raw("end pseudo-Boolean proof");
    self.ended = true;
    if let Some(out) = &mut self.out {
      if let Err(e) = out.flush() {
        self.write_error.get_or_insert_with(|| e.to_string());
      }
    }
    match self.write_error.take() {
      Some(e) => Err(Error::Proof(format!(
        "error writing proof file '{}': {}",
        self.proof_file.display(),
        e
      ))),
      None => Ok(()),
    }
  }

  // endregion
}
