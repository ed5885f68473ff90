/*!

  Extensional constraints. A `Table` lists the allowed tuples (entries may be wildcards); a
  `NegativeTable` lists forbidden ones. The positive propagator keeps, for each
  (variable, value) pair, a pointer to the first tuple that still supports it, walking
  forward on each wakeup; the pointers live in per-epoch constraint state so backtracking
  restores them.

  Each tuple is reified by a selector flag at posting time. A deleted value is justified by
  first deriving the disjunction of the still-feasible selectors under the current domains,
  after which the deletion is reverse unit propagation.

*/

use std::collections::HashMap;

use crate::errors::Error;
use crate::justification::{generic_reason, Justification};
use crate::literal::Literal;
use crate::problem::{Constraint, InstallContext};
use crate::proofs::{PbSum, ProofFlag, ProofLevel, ProofLiteralOrFlag};
use crate::propagators::{Contradiction, PropagatorState, Triggers};
use crate::state::{ConstraintStateHandle, ConstraintStateScope, InferenceTracker};
use crate::variable::VariableId;
use crate::Integer;

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
pub enum TableEntry {
  Value(Integer),
  /// Matches anything.
  Any,
}

impl TableEntry {
  fn matches(&self, value: Integer) -> bool {
    match self {
      TableEntry::Value(v) => *v == value,
      TableEntry::Any => true,
    }
  }
}

/// The variables must take values matching at least one of the tuples.
pub struct Table {
  pub vars:   Vec<VariableId>,
  pub tuples: Vec<Vec<TableEntry>>,
}

/// The variables must not take values matching any of the tuples.
pub struct NegativeTable {
  pub vars:   Vec<VariableId>,
  pub tuples: Vec<Vec<TableEntry>>,
}

fn check_widths(vars: &[VariableId], tuples: &[Vec<TableEntry>]) -> Result<(), Error> {
  for tuple in tuples {
    if tuple.len() != vars.len() {
      return Err(Error::Unexpected(format!(
        "table tuple of width {} over {} variables",
        tuple.len(),
        vars.len()
      )));
    }
  }
  Ok(())
}

/// Is this tuple consistent with the current domains?
fn tuple_is_feasible(tracker: &InferenceTracker, vars: &[VariableId], tuple: &[TableEntry]) -> bool {
  vars.iter().zip(tuple).all(|(&var, entry)| match entry {
    TableEntry::Any => true,
    TableEntry::Value(v) => tracker.state().in_domain(var, *v),
  })
}

/// The per-epoch support pointers: for each (variable index, value), the index of the first
/// tuple known to support it at this point in search.
#[derive(Clone, Default)]
struct TableSupports(HashMap<(usize, Integer), usize>);

impl Constraint for Table {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let Table { vars, tuples } = *self;
    check_widths(&vars, &tuples)?;

    if tuples.is_empty() {
      context
        .propagators
        .model_contradiction(context.proof.as_deref_mut(), "table with no tuples");
      return Ok(());
    }

    let mut selectors: Vec<ProofFlag> = Vec::new();
    if let Some(proof) = context.proof.as_deref_mut() {
      proof.model_comment("table");
      for (index, tuple) in tuples.iter().enumerate() {
        let selector = proof.create_proof_flag(&format!("table{}", index));
        let concrete: Vec<(VariableId, Integer)> = vars
          .iter()
          .zip(tuple)
          .filter_map(|(&var, entry)| match entry {
            TableEntry::Value(v) => Some((var, *v)),
            TableEntry::Any => None,
          })
          .collect();
        // selector -> every concrete entry holds
        let mut forward = PbSum::new();
        for &(var, value) in &concrete {
          forward = forward.plus(1, Literal::equal_to(var, value));
        }
        proof.add_model_constraint(
          &forward.greater_equal(concrete.len() as Integer),
          Some(&[ProofLiteralOrFlag::Flag(selector)]),
        );
        // not selector -> some concrete entry fails
        let mut reverse = PbSum::new();
        for &(var, value) in &concrete {
          reverse = reverse.plus(1, Literal::not_equal_to(var, value));
        }
        proof.add_model_constraint(
          &reverse.greater_equal(1),
          Some(&[ProofLiteralOrFlag::Flag(!selector)]),
        );
        selectors.push(selector);
      }
      // some tuple is selected
      let mut any = PbSum::new();
      for &selector in &selectors {
        any = any.plus(1, selector);
      }
      proof.add_model_constraint(&any.greater_equal(1), None);
    }

    let handle = context
      .state
      .add_constraint_state(ConstraintStateScope::Epoch, TableSupports::default());

    let trigger_vars = vars.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_table(tracker, &vars, &tuples, &selectors, handle)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_change_of(trigger_vars),
      "table",
    );
    Ok(())
  }
}

fn propagate_table(
  tracker: &mut InferenceTracker,
  vars: &[VariableId],
  tuples: &[Vec<TableEntry>],
  selectors: &[ProofFlag],
  handle: ConstraintStateHandle,
) -> Result<(), Contradiction> {
  for index in 0..vars.len() {
    for value in tracker.state().each_value(vars[index]) {
      let start = tracker
        .constraint_state::<TableSupports>(handle)
        .0
        .get(&(index, value))
        .copied()
        .unwrap_or(0);

      let support = (start..tuples.len()).find(|&j| {
        tuples[j][index].matches(value) && tuple_is_feasible(tracker, vars, &tuples[j])
      });

      match support {
        Some(found) => {
          tracker
            .constraint_state_mut::<TableSupports>(handle)
            .0
            .insert((index, value), found);
        }
        None => {
          let why = if tracker.proof_enabled() {
            let reason = generic_reason(tracker.state(), vars);
            let feasible: Vec<ProofFlag> = (0..tuples.len())
              .filter(|&j| tuple_is_feasible(tracker, vars, &tuples[j]))
              .map(|j| selectors[j])
              .collect();
            Some((reason, feasible))
          } else {
            None
          };
          tracker.infer_not_equal(vars[index], value, move || {
            let (reason, feasible) = why.unwrap_or_default();
            Justification::Explicit {
              steps: Box::new(move |proof, reason| {
                // the still-feasible selectors form a disjunction under this reason
                let mut sum = PbSum::new();
                for &r in reason {
                  sum = sum.plus(1, !r);
                }
                for &selector in &feasible {
                  sum = sum.plus(1, selector);
                }
                proof.emit_rup(&sum.greater_equal(1), ProofLevel::Temporary);
              }),
              reason,
            }
          })?;
        }
      }
    }
  }
  Ok(())
}

impl Constraint for NegativeTable {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let NegativeTable { vars, tuples } = *self;
    check_widths(&vars, &tuples)?;

    for tuple in &tuples {
      if tuple.iter().all(|entry| matches!(entry, TableEntry::Any)) {
        context
          .propagators
          .model_contradiction(context.proof.as_deref_mut(), "negative table forbidding everything");
        return Ok(());
      }
    }

    if let Some(proof) = context.proof.as_deref_mut() {
      proof.model_comment("negative table");
      for tuple in &tuples {
        let avoided: Vec<Literal> = vars
          .iter()
          .zip(tuple)
          .filter_map(|(&var, entry)| match entry {
            TableEntry::Value(v) => Some(Literal::not_equal_to(var, *v)),
            TableEntry::Any => None,
          })
          .collect();
        proof.add_model_cnf(&avoided);
      }
    }

    let trigger_vars = vars.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_negative_table(tracker, &vars, &tuples)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers {
        on_instantiated: trigger_vars,
        ..Triggers::default()
      },
      "negative table",
    );
    Ok(())
  }
}

fn propagate_negative_table(
  tracker: &mut InferenceTracker,
  vars: &[VariableId],
  tuples: &[Vec<TableEntry>],
) -> Result<(), Contradiction> {
  'tuples: for tuple in tuples {
    // the tuple bites once every concrete entry but at most one is fixed to its value
    let mut unfixed: Option<(VariableId, Integer)> = None;
    let mut reason: Vec<Literal> = Vec::new();
    for (&var, entry) in vars.iter().zip(tuple) {
      let TableEntry::Value(value) = entry else {
        continue;
      };
      match tracker.state().optional_single_value(var) {
        Some(fixed) if fixed == *value => reason.push(Literal::equal_to(var, fixed)),
        Some(_) => continue 'tuples,
        None => {
          if !tracker.state().in_domain(var, *value) {
            continue 'tuples;
          }
          if unfixed.is_some() {
            continue 'tuples;
          }
          unfixed = Some((var, *value));
        }
      }
    }

    match unfixed {
      None => {
        tracker.infer(&Literal::False, move || Justification::Rup { reason })?;
      }
      Some((var, value)) => {
        tracker.infer_not_equal(var, value, move || Justification::Rup { reason })?;
      }
    }
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::Problem;
  use crate::search::{solve, SolveCallbacks};

  fn wildcard_instance() -> (Problem, [crate::SimpleVariableId; 3]) {
    let mut problem = Problem::new();
    let a = problem.create_integer_variable(0, 3, Some("a")).unwrap();
    let b = problem.create_integer_variable(0, 3, Some("b")).unwrap();
    let c = problem.create_integer_variable(0, 3, Some("c")).unwrap();
    problem
      .post(Table {
        vars:   vec![a.into(), b.into(), c.into()],
        tuples: vec![
          vec![TableEntry::Value(0), TableEntry::Any, TableEntry::Value(1)],
          vec![TableEntry::Any, TableEntry::Value(2), TableEntry::Any],
        ],
      })
      .unwrap();
    (problem, [a, b, c])
  }

  #[test]
  fn wildcards_admit_exactly_the_matching_assignments() {
    let (mut problem, [a, b, c]) = wildcard_instance();
    use std::cell::RefCell;
    use std::rc::Rc;
    let seen = Rc::new(RefCell::new(Vec::new()));
    let seen_in_callback = Rc::clone(&seen);
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(move |current| {
        seen_in_callback
          .borrow_mut()
          .push((current.value(a), current.value(b), current.value(c)));
        true
      })),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    // (0,*,1) gives 4 assignments, (*,2,*) gives 16, and they overlap in (0,2,1)
    assert_eq!(stats.solutions, 19);
    for &(a, b, c) in seen.borrow().iter() {
      assert!((a == 0 && c == 1) || b == 2);
    }
  }

  #[test]
  fn empty_tuple_list_fails_immediately() {
    let mut problem = Problem::new();
    let a = problem.create_integer_variable(0, 3, None).unwrap();
    problem.post(Table { vars: vec![a.into()], tuples: vec![] }).unwrap();
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.solutions, 0);
  }

  #[test]
  fn full_cartesian_product_removes_nothing() {
    let mut problem = Problem::new();
    let a = problem.create_integer_variable(0, 1, None).unwrap();
    let b = problem.create_integer_variable(0, 1, None).unwrap();
    let tuples = (0..2)
      .flat_map(|x| (0..2).map(move |y| vec![TableEntry::Value(x), TableEntry::Value(y)]))
      .collect();
    problem.post(Table { vars: vec![a.into(), b.into()], tuples }).unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.domain_size(a), 2);
    assert_eq!(state.domain_size(b), 2);
  }

  #[test]
  fn unsupported_values_are_deleted_at_the_root() {
    let mut problem = Problem::new();
    let a = problem.create_integer_variable(0, 3, None).unwrap();
    let b = problem.create_integer_variable(0, 3, None).unwrap();
    problem
      .post(Table {
        vars:   vec![a.into(), b.into()],
        tuples: vec![
          vec![TableEntry::Value(1), TableEntry::Value(2)],
          vec![TableEntry::Value(2), TableEntry::Value(0)],
        ],
      })
      .unwrap();
    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.each_value(a), vec![1, 2]);
    assert_eq!(state.each_value(b), vec![0, 2]);
  }

  #[test]
  fn mismatched_widths_are_rejected() {
    let mut problem = Problem::new();
    let a = problem.create_integer_variable(0, 3, None).unwrap();
    let result = problem.post(Table {
      vars:   vec![a.into()],
      tuples: vec![vec![TableEntry::Value(0), TableEntry::Value(1)]],
    });
    assert!(result.is_err());
  }

  #[test]
  fn negative_table_excludes_matching_assignments() {
    let mut problem = Problem::new();
    let a = problem.create_integer_variable(0, 1, None).unwrap();
    let b = problem.create_integer_variable(0, 1, None).unwrap();
    problem
      .post(NegativeTable {
        vars:   vec![a.into(), b.into()],
        tuples: vec![vec![TableEntry::Value(0), TableEntry::Any]],
      })
      .unwrap();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    // a = 0 is entirely forbidden
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 2);
  }
}
