/*!

  The user-facing builder. A `Problem` accumulates variables, constraints, presolvers, and
  the objective; constraints install their propagators (and write their pseudo-Boolean
  encodings) as they are posted, and the search driver takes the assembled pieces from here.

*/

use symbol_map::indexing::{HashIndexing, Indexing, Insertion};

use crate::errors::Error;
use crate::parameters::ProofOptions;
use crate::proofs::Proof;
use crate::propagators::Propagators;
use crate::state::State;
use crate::variable::{SimpleVariableId, VariableId};
use crate::Integer;

/// A constraint knows how to install itself: posting pseudo-Boolean lines into the model
/// and propagators into the registry.
pub trait Constraint {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error>;
}

/// What a constraint gets to work with while installing.
pub struct InstallContext<'a> {
  pub state:       &'a mut State,
  pub propagators: &'a mut Propagators,
  pub proof:       Option<&'a mut Proof>,
}

impl<'a> InstallContext<'a> {
  pub fn proof(&mut self) -> Option<&mut Proof> {
    self.proof.as_deref_mut()
  }
}

/// Runs once before search begins; may post further constraints.
pub trait Presolver {
  fn presolve(&mut self, problem: &mut Problem) -> Result<(), Error>;
}

pub struct Problem {
  pub(crate) state:       State,
  pub(crate) propagators: Propagators,
  pub(crate) proof:       Option<Proof>,
  /// The canonical objective: always minimised (maximisation stores a negated view).
  pub(crate) objective:  Option<VariableId>,
  pub(crate) variables:  Vec<SimpleVariableId>,
  pub(crate) presolvers: Vec<Box<dyn Presolver>>,

  name_table:      HashIndexing<String, usize>,
  named_variables: Vec<SimpleVariableId>,
}

impl Default for Problem {
  fn default() -> Self {
    Problem::new()
  }
}

impl Problem {
  pub fn new() -> Problem {
    Problem {
      state:           State::new(),
      propagators:     Propagators::new(),
      proof:           None,
      objective:       None,
      variables:       Vec::new(),
      presolvers:      Vec::new(),
      name_table:      HashIndexing::default(),
      named_variables: Vec::new(),
    }
  }

  /// A problem whose solve will write a certifying `.opb`/`.pbp` pair.
  pub fn with_proof(options: &ProofOptions) -> Problem {
    Problem { proof: Some(Proof::new(options)), ..Problem::new() }
  }

  pub fn wants_proofs(&self) -> bool {
    self.proof.is_some()
  }

  // region Variables

  pub fn create_integer_variable(
    &mut self,
    lower: Integer,
    upper: Integer,
    name: Option<&str>,
  ) -> Result<SimpleVariableId, Error> {
    if lower > upper {
      return Err(Error::Unexpected(format!(
        "variable '{}' declared with empty domain [{}, {}]",
        name.unwrap_or("?"),
        lower,
        upper
      )));
    }
    let var = self.state.create_variable(lower, upper);
    if let Some(proof) = &mut self.proof {
      proof.set_up_integer_variable(var, lower, upper, name);
    }
    if let Some(name) = name {
      self.remember_name(var, name)?;
    }
    self.variables.push(var);
    Ok(var)
  }

  /// A variable over an explicit value list: created over the spanned range with the gaps
  /// knocked out (and excluded in the model).
  pub fn create_integer_variable_with_values(
    &mut self,
    values: &[Integer],
    name: Option<&str>,
  ) -> Result<SimpleVariableId, Error> {
    let (Some(&lower), Some(&upper)) = (values.iter().min(), values.iter().max()) else {
      return Err(Error::Unexpected(format!(
        "variable '{}' declared with no values",
        name.unwrap_or("?")
      )));
    };
    let var = self.create_integer_variable(lower, upper, name)?;
    for value in lower..=upper {
      if !values.contains(&value) {
        self.state.apply_literal(&crate::Literal::not_equal_to(var, value));
        if let Some(proof) = &mut self.proof {
          proof.add_model_cnf(&[crate::Literal::not_equal_to(var, value)]);
        }
      }
    }
    Ok(var)
  }

  fn remember_name(&mut self, var: SimpleVariableId, name: &str) -> Result<(), Error> {
    match self.name_table.get_or_insert(name.to_string()) {
      Insertion::New(_) => {
        self.named_variables.push(var);
        Ok(())
      }
      Insertion::Present(_) => Err(Error::Unexpected(format!("duplicate variable name '{}'", name))),
    }
  }

  pub fn variable_by_name(&self, name: &str) -> Option<SimpleVariableId> {
    self
      .name_table
      .get(&name.to_string())
      .map(|symbol| self.named_variables[*symbol.id()])
  }

  /// Every decision variable, in creation order.
  pub fn all_variables(&self) -> &[SimpleVariableId] {
    &self.variables
  }

  // endregion

  // region Constraints and objective

  pub fn post(&mut self, constraint: impl Constraint + 'static) -> Result<(), Error> {
    let mut context = InstallContext {
      state:       &mut self.state,
      propagators: &mut self.propagators,
      proof:       self.proof.as_mut(),
    };
    Box::new(constraint).install(&mut context)
  }

  pub fn minimise(&mut self, var: impl Into<VariableId>) {
    let var = var.into();
    self.objective = Some(var);
    if let Some(proof) = &mut self.proof {
      proof.set_objective_minimise(var);
    }
  }

  pub fn maximise(&mut self, var: impl Into<VariableId>) {
    self.minimise(var.into().negated());
  }

  pub fn add_presolver(&mut self, presolver: Box<dyn Presolver>) {
    self.presolvers.push(presolver);
  }

  // endregion

  /// A fresh copy of the root state, as the search driver starts from it.
  pub fn initial_state(&self) -> State {
    self.state.snapshot()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn named_variables_are_found_again() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 5, Some("x")).unwrap();
    let _ = problem.create_integer_variable(0, 5, None).unwrap();
    let y = problem.create_integer_variable(0, 5, Some("y")).unwrap();
    assert_eq!(problem.variable_by_name("x"), Some(x));
    assert_eq!(problem.variable_by_name("y"), Some(y));
    assert_eq!(problem.variable_by_name("z"), None);
  }

  #[test]
  fn duplicate_names_are_rejected() {
    let mut problem = Problem::new();
    problem.create_integer_variable(0, 5, Some("x")).unwrap();
    assert!(problem.create_integer_variable(0, 5, Some("x")).is_err());
  }

  #[test]
  fn empty_domains_are_rejected() {
    let mut problem = Problem::new();
    assert!(problem.create_integer_variable(3, 2, Some("x")).is_err());
    assert!(problem.create_integer_variable_with_values(&[], Some("y")).is_err());
  }

  #[test]
  fn value_lists_punch_holes() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable_with_values(&[1, 3, 7], None).unwrap();
    assert_eq!(problem.state.each_value(x), vec![1, 3, 7]);
  }
}
