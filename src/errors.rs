use thiserror::Error as DeriveError;
use user_error::UFE;

/// Things that can go wrong outside of search. Contradictions, timeouts, and exhausted
/// searches are *not* errors; they are ordinary outcomes carried by `Stats` and by the
/// return value of `propagate`.
#[derive(Clone, Eq, PartialEq, Debug, Hash, DeriveError)]
pub enum Error {
  /// The builder was given something nonsensical, e.g. duplicate variables in an
  /// all-different or mismatched tuple widths in a table.
  #[error("unexpected problem: {0}")]
  Unexpected(String),

  /// A code path that legitimately cannot be handled yet.
  #[error("unimplemented: {0}")]
  Unimplemented(&'static str),

  /// The proof layer failed, e.g. the model or proof file could not be written.
  #[error("proof error: {0}")]
  Proof(String),

  #[error("parameters error: {0}")]
  Parameters(String),
}

// The trait bound is derived using `thiserror::Error`.
impl UFE for Error { /* User Facing Error - nothing to implement. */ }
