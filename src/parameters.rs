/*!

Types associated with configuration parameters.

Drivers hand the solver a small parameter set (timeout, whether to enumerate all solutions,
whether and where to write proofs), read from a JSON object at runtime.

 */

use std::path::PathBuf;
use std::time::Duration;

use json::parse as parse_json;

use crate::errors::Error;

/// Where the proof layer writes its files. `new(basename)` gives the conventional trio:
/// `basename.opb`, `basename.pbp`, and (optionally) `basename.map` for the human-readable
/// literal mapping used by verifier diagnostics.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct ProofOptions {
  pub opb_file:     PathBuf,
  pub proof_file:   PathBuf,
  pub mapping_file: Option<PathBuf>,
}

impl ProofOptions {
  pub fn new(basename: &str) -> ProofOptions {
    ProofOptions {
      opb_file:     PathBuf::from(format!("{}.opb", basename)),
      proof_file:   PathBuf::from(format!("{}.pbp", basename)),
      mapping_file: None,
    }
  }

  pub fn with_mapping(basename: &str) -> ProofOptions {
    ProofOptions {
      mapping_file: Some(PathBuf::from(format!("{}.map", basename))),
      ..ProofOptions::new(basename)
    }
  }
}

#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct Parameters {
  pub all_solutions:  bool,
  pub statistics:     bool,
  pub timeout:        Option<Duration>,
  pub prove_basename: Option<String>,
}

impl Parameters {
  pub fn new() -> Parameters {
    Self::default()
  }

  /// Reads parameters from a JSON object, e.g.
  /// `{"all_solutions": true, "timeout_ms": 1000, "prove": "queens"}`.
  pub fn from_json(text: &str) -> Result<Parameters, Error> {
    let parsed = parse_json(text)
      .map_err(|e| Error::Parameters(format!("malformed parameters: {}", e)))?;
    if !parsed.is_object() {
      return Err(Error::Parameters("expected a JSON object".to_string()));
    }

    let mut parameters = Parameters::new();
    for (key, value) in parsed.entries() {
      match key {
        "all_solutions" => {
          parameters.all_solutions = value
            .as_bool()
            .ok_or_else(|| Error::Parameters("all_solutions must be a boolean".to_string()))?;
        }
        "statistics" => {
          parameters.statistics = value
            .as_bool()
            .ok_or_else(|| Error::Parameters("statistics must be a boolean".to_string()))?;
        }
        "timeout_ms" => {
          let millis = value
            .as_u64()
            .ok_or_else(|| Error::Parameters("timeout_ms must be an unsigned integer".to_string()))?;
          parameters.timeout = Some(Duration::from_millis(millis));
        }
        "prove" => {
          let basename = value
            .as_str()
            .ok_or_else(|| Error::Parameters("prove must be a string".to_string()))?;
          parameters.prove_basename = Some(basename.to_string());
        }
        _other => {
          return Err(Error::Parameters(format!("unknown parameter `{}`", _other)));
        }
      }
    }
    Ok(parameters)
  }

  pub fn proof_options(&self) -> Option<ProofOptions> {
    self.prove_basename.as_deref().map(ProofOptions::new)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn parses_a_full_object() {
    let parameters =
      Parameters::from_json(r#"{"all_solutions": true, "timeout_ms": 250, "prove": "out"}"#)
        .unwrap();
    assert!(parameters.all_solutions);
    assert_eq!(parameters.timeout, Some(Duration::from_millis(250)));
    assert_eq!(parameters.proof_options().unwrap().opb_file, PathBuf::from("out.opb"));
  }

  #[test]
  fn rejects_unknown_keys() {
    assert!(Parameters::from_json(r#"{"wat": 1}"#).is_err());
  }

  #[test]
  fn rejects_malformed_json() {
    assert!(Parameters::from_json("{").is_err());
  }
}
