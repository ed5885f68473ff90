/*!

  The depth-first search driver: propagate, branch, guess, recurse, backtrack. Optimisation
  is branch-and-bound by root-level tightening: each accepted solution is logged (`soli`),
  the driver records the incumbent, and every subsequent propagation re-imposes
  `objective < incumbent`, so the optimality proof is just an unsatisfiability proof of the
  tightened problem.

  Proof levels track search epochs: entering a child enters level `depth + 1`; the clause
  refuting an exhausted child is emitted at the parent's level while the child's lines are
  still present, and then the child level is forgotten wholesale.

*/

use std::time::{Duration, Instant};

use log::debug;

use crate::data_structures::Statistics;
use crate::errors::Error;
use crate::literal::Literal;
use crate::problem::Problem;
use crate::proofs::Proof;
use crate::propagators::Propagators;
use crate::resource_limit::ResourceLimit;
use crate::state::{CurrentState, State};
use crate::variable::{SimpleVariableId, VariableId};
use crate::Integer;

/// Statistics for one `solve` run.
#[derive(Clone, Debug, Default)]
pub struct Stats {
  pub recursions:                 u64,
  pub failures:                   u64,
  pub solutions:                  u64,
  pub max_depth:                  u64,
  pub propagations:               u64,
  pub effectful_propagations:     u64,
  pub contradicting_propagations: u64,
  pub solve_time:                 Duration,
  /// True iff the search space was exhausted without the abort flag being set.
  pub completed: bool,
  /// The best objective value found, if optimising.
  pub objective: Option<Integer>,
}

impl Stats {
  pub fn collect_statistics(&self, statistics: &mut Statistics) {
    statistics.insert("recursions", self.recursions.into());
    statistics.insert("failures", self.failures.into());
    statistics.insert("solutions", self.solutions.into());
    statistics.insert("max depth", self.max_depth.into());
    statistics.insert("propagations", self.propagations.into());
    statistics.insert("effectful propagations", self.effectful_propagations.into());
    statistics.insert("contradicting propagations", self.contradicting_propagations.into());
    statistics.insert("solve time", self.solve_time.into());
  }
}

/// The callback bundle consumed by the driver. Any omitted callback gets the default:
/// branch on the first unfixed variable, guess values smallest first, stop at the first
/// solution.
#[derive(Default)]
pub struct SolveCallbacks {
  /// Returns `false` to stop the search, `true` to keep going (all-solutions, or keep
  /// improving an objective).
  pub solution: Option<Box<dyn FnMut(&CurrentState) -> bool>>,
  /// Picks the next variable to branch on; `None` means every branchable variable is fixed.
  pub branch: Option<Box<dyn FnMut(&CurrentState) -> Option<SimpleVariableId>>>,
  /// The value order to try for a chosen variable.
  pub guess: Option<Box<dyn FnMut(&CurrentState, SimpleVariableId) -> Vec<Integer>>>,
  /// Invoked if and only if the search space was exhausted without an abort.
  pub completed: Option<Box<dyn FnMut()>>,
}

pub fn solve(problem: &mut Problem, callbacks: SolveCallbacks) -> Result<Stats, Error> {
  solve_with(problem, callbacks, None)
}

pub fn solve_with(
  problem: &mut Problem,
  mut callbacks: SolveCallbacks,
  limit: Option<ResourceLimit>,
) -> Result<Stats, Error> {
  let started = Instant::now();

  // presolvers may post further constraints
  let mut presolvers = std::mem::take(&mut problem.presolvers);
  for presolver in &mut presolvers {
    presolver.presolve(problem)?;
  }
  problem.presolvers = presolvers;

  if let Some(proof) = &mut problem.proof {
    proof.start_search()?;
  }

  let mut state = problem.initial_state();
  let mut stats = Stats::default();

  let (best, stop, aborted) = {
    let mut search = Search {
      propagators: &mut problem.propagators,
      proof:       problem.proof.as_mut(),
      objective:   problem.objective,
      variables:   problem.variables.clone(),
      callbacks:   &mut callbacks,
      limit:       limit.as_ref(),
      stats:       &mut stats,
      best:        None,
      stop:        false,
      aborted:     false,
    };
    search.recurse(&mut state, 0);
    (search.best, search.stop, search.aborted)
  };

  stats.completed = !aborted && !stop;
  stats.objective = best;
  let (total, effectful, contradicting) = problem.propagators.counters();
  stats.propagations = total;
  stats.effectful_propagations = effectful;
  stats.contradicting_propagations = contradicting;
  stats.solve_time = started.elapsed();

  if let Some(proof) = &mut problem.proof {
    if aborted {
      proof.conclude_none()?;
    } else if let Some(objective) = problem.objective {
      if !stats.completed {
        proof.conclude_none()?;
      } else if let Some(best) = best {
        proof.conclude_bounds(objective, best, best)?;
      } else {
        proof.conclude_unsatisfiable(true)?;
      }
    } else if stats.solutions > 0 {
      proof.conclude_satisfiable()?;
    } else if stats.completed {
      proof.conclude_unsatisfiable(false)?;
    } else {
      proof.conclude_none()?;
    }
  }

  if stats.completed {
    if let Some(completed) = &mut callbacks.completed {
      completed();
    }
  }

  debug!(
    "search finished: {} solutions, {} recursions, {} failures",
    stats.solutions, stats.recursions, stats.failures
  );
  Ok(stats)
}

struct Search<'a> {
  propagators: &'a mut Propagators,
  proof:       Option<&'a mut Proof>,
  objective:   Option<VariableId>,
  variables:   Vec<SimpleVariableId>,
  callbacks:   &'a mut SolveCallbacks,
  limit:       Option<&'a ResourceLimit>,
  stats:       &'a mut Stats,
  best:        Option<Integer>,
  stop:        bool,
  aborted:     bool,
}

impl<'a> Search<'a> {
  fn recurse(&mut self, state: &mut State, depth: u64) {
    if depth > 0 {
      self.stats.recursions += 1;
    }
    self.stats.max_depth = self.stats.max_depth.max(depth);

    let bound = match (self.objective, self.best) {
      (Some(objective), Some(best)) => Some((objective, best)),
      _ => None,
    };
    let consistent = self
      .propagators
      .propagate(state, self.proof.as_deref_mut(), bound, self.limit);
    if self.limit.map_or(false, |l| l.is_aborted()) {
      self.aborted = true;
      return;
    }
    if !consistent {
      self.stats.failures += 1;
      return;
    }

    let branch_variable = match &mut self.callbacks.branch {
      Some(branch) => {
        let chosen = branch(&state.current());
        // the callback may say "all fixed"; trust but verify against the branchables
        chosen.or_else(|| self.first_unfixed(state))
      }
      None => self.first_unfixed(state),
    };

    let Some(variable) = branch_variable else {
      self.found_solution(state);
      return;
    };

    let values = match &mut self.callbacks.guess {
      Some(guess) => guess(&state.current(), variable),
      None => state.each_value(variable),
    };

    for value in values {
      if self.stop || self.aborted {
        return;
      }
      if !state.in_domain(variable, value) {
        continue;
      }

      let timestamp = state.new_epoch(false);
      if let Some(proof) = self.proof.as_deref_mut() {
        proof.enter_level(depth as usize + 1);
      }

      let guessed = state.guess(self.proof.as_deref_mut(), Literal::equal_to(variable, value));
      match guessed {
        Ok(()) => self.recurse(state, depth + 1),
        Err(_) => self.stats.failures += 1,
      }

      if !self.stop && !self.aborted {
        // refute this child at the parent's level, while the child's lines still exist
        if let Some(proof) = self.proof.as_deref_mut() {
          proof.enter_level(depth as usize);
          proof.log_backtrack(state);
        }
      }
      state.backtrack(timestamp);
      if let Some(proof) = self.proof.as_deref_mut() {
        proof.forget_level(depth as usize + 1);
        proof.enter_level(depth as usize);
      }
    }
  }

  fn first_unfixed(&self, state: &State) -> Option<SimpleVariableId> {
    self
      .variables
      .iter()
      .copied()
      .find(|&v| !state.has_single_value(v))
  }

  fn found_solution(&mut self, state: &mut State) {
    self.stats.solutions += 1;

    if let Some(objective) = self.objective {
      // with every branchable fixed the objective is pinned from below by its lower bound
      let value = state
        .optional_single_value(objective)
        .unwrap_or_else(|| state.lower_bound(objective));
      self.best = Some(value);
      if let Some(proof) = self.proof.as_deref_mut() {
        proof.log_solution(state, &self.variables, true);
      }
      let keep_going = match &mut self.callbacks.solution {
        Some(solution) => solution(&state.current()),
        None => true,
      };
      if !keep_going {
        self.stop = true;
      }
      // fail on purpose so the search continues looking for improvements
    } else {
      if let Some(proof) = self.proof.as_deref_mut() {
        proof.log_solution(state, &self.variables, false);
      }
      let keep_going = match &mut self.callbacks.solution {
        Some(solution) => solution(&state.current()),
        None => false,
      };
      if !keep_going {
        self.stop = true;
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn an_unconstrained_problem_enumerates_assignments() {
    let mut problem = Problem::new();
    problem.create_integer_variable(0, 2, Some("x")).unwrap();
    problem.create_integer_variable(0, 1, Some("y")).unwrap();

    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 6);
    assert!(stats.completed);
  }

  #[test]
  fn stopping_at_the_first_solution() {
    let mut problem = Problem::new();
    problem.create_integer_variable(0, 9, Some("x")).unwrap();
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.solutions, 1);
    // stopped early: the space was not exhausted
    assert!(!stats.completed);
  }

  #[test]
  fn minimisation_without_constraints_hits_the_lower_bound() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(3, 9, Some("x")).unwrap();
    problem.minimise(x);
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.objective, Some(3));
    assert!(stats.completed);
  }

  #[test]
  fn maximisation_is_minimisation_of_the_negation() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(3, 9, Some("x")).unwrap();
    problem.maximise(x);
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    // the canonical objective is -x, so the reported optimum is -9
    assert_eq!(stats.objective, Some(-9));
  }

  #[test]
  fn guess_order_is_respected() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 5, Some("x")).unwrap();

    let found = Rc::new(RefCell::new(None));
    let found_in_callback = Rc::clone(&found);
    let callbacks = SolveCallbacks {
      guess: Some(Box::new(|current, var| {
        let mut values = current.each_value(var);
        values.reverse(); // largest first
        values
      })),
      solution: Some(Box::new(move |current| {
        *found_in_callback.borrow_mut() = Some(current.value(x));
        false
      })),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 1);
    assert_eq!(*found.borrow(), Some(5));
  }

  #[test]
  fn presolvers_run_before_search_and_may_post() {
    use crate::problem::Presolver;
    use crate::propagators::comparison::Comparison;

    struct CapAtThree;
    impl Presolver for CapAtThree {
      fn presolve(&mut self, problem: &mut Problem) -> Result<(), Error> {
        let x = problem.variable_by_name("x").expect("x exists");
        problem.post(Comparison::less_than(x, 3))
      }
    }

    let mut problem = Problem::new();
    problem.create_integer_variable(0, 9, Some("x")).unwrap();
    problem.add_presolver(Box::new(CapAtThree));
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 3);
  }

  #[test]
  fn aborted_runs_are_not_completed() {
    let mut problem = Problem::new();
    problem.create_integer_variable(0, 9, Some("x")).unwrap();
    problem.create_integer_variable(0, 9, Some("y")).unwrap();
    let limit = ResourceLimit::new();
    limit.abort();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve_with(&mut problem, callbacks, Some(limit)).unwrap();
    assert!(!stats.completed);
  }
}
