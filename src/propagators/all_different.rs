/*!

  All-different, propagated to generalised arc consistency in the style of Régin: build the
  variable-value graph, find a maximum matching, and delete every edge that is matched in no
  maximum matching. Those are the edges that are unmatched, whose endpoints lie in different
  strongly connected components of the matching-oriented graph, and which lie on no
  alternating path from an unmatched value.

  Proofs work through Hall sets. Posting records, per variable, the "takes at least one
  value" line and, per value, the "taken at most once" line. A failed matching yields a Hall
  violator whose lines sum to a contradiction; each component that loses edges yields a Hall
  set whose summed lines force the deleted assignments to zero, and the deletions follow by
  reverse unit propagation.

*/

use std::collections::HashMap;

use bit_set::BitSet;

use crate::errors::Error;
use crate::justification::{generic_reason, Justification};
use crate::literal::Literal;
use crate::problem::{Constraint, InstallContext};
use crate::proofs::{ProofLevel, ProofLine};
use crate::propagators::{Contradiction, PropagatorState, Triggers};
use crate::state::InferenceTracker;
use crate::variable::VariableId;
use crate::Integer;

/// The variables must take pairwise distinct values.
pub struct AllDifferent {
  pub vars: Vec<VariableId>,
}

impl Constraint for AllDifferent {
  fn install(self: Box<Self>, context: &mut InstallContext) -> Result<(), Error> {
    let vars = self.vars;
    for (index, var) in vars.iter().enumerate() {
      if vars[index + 1..].contains(var) {
        return Err(Error::Unexpected(format!("duplicate variable {} in all-different", var)));
      }
    }

    if vars.len() as Integer
      > vars
        .iter()
        .flat_map(|&v| context.state.each_value(v))
        .collect::<std::collections::HashSet<_>>()
        .len() as Integer
    {
      context.propagators.model_contradiction(
        context.proof.as_deref_mut(),
        "all-different over more variables than values",
      );
      return Ok(());
    }

    // per-variable at-least-one lines and per-value at-most-one lines
    let mut at_least_one: Vec<Option<ProofLine>> = vec![None; vars.len()];
    let mut at_most_one: HashMap<Integer, Option<ProofLine>> = HashMap::new();
    if let Some(proof) = context.proof.as_deref_mut() {
      proof.model_comment("all-different");
      for (index, &var) in vars.iter().enumerate() {
        let choices: Vec<Literal> = context
          .state
          .each_value(var)
          .into_iter()
          .map(|v| Literal::equal_to(var, v))
          .collect();
        at_least_one[index] = Some(proof.add_model_cnf(&choices));
      }
      let mut union: Vec<Integer> = vars.iter().flat_map(|&v| context.state.each_value(v)).collect();
      union.sort_unstable();
      union.dedup();
      for value in union {
        let holders: Vec<Literal> = vars
          .iter()
          .filter(|&&v| context.state.in_domain(v, value))
          .map(|&v| Literal::equal_to(v, value))
          .collect();
        at_most_one.insert(value, Some(proof.add_model_at_most_one(&holders)));
      }
    }

    let trigger_vars = vars.clone();
    context.propagators.install(
      Box::new(move |tracker| {
        propagate_all_different(tracker, &vars, &at_least_one, &at_most_one)?;
        Ok(PropagatorState::Enable)
      }),
      Triggers::on_change_of(trigger_vars),
      "all different",
    );
    Ok(())
  }
}

// region GAC propagation

fn propagate_all_different(
  tracker: &mut InferenceTracker,
  vars: &[VariableId],
  at_least_one: &[Option<ProofLine>],
  at_most_one: &HashMap<Integer, Option<ProofLine>>,
) -> Result<(), Contradiction> {
  let n = vars.len();

  // the bipartite graph over current domains
  let mut values: Vec<Integer> = vars.iter().flat_map(|&v| tracker.state().each_value(v)).collect();
  values.sort_unstable();
  values.dedup();
  let value_index: HashMap<Integer, usize> = values.iter().enumerate().map(|(i, &v)| (v, i)).collect();
  let adjacency: Vec<Vec<usize>> = vars
    .iter()
    .map(|&var| {
      tracker
        .state()
        .each_value(var)
        .into_iter()
        .map(|v| value_index[&v])
        .collect()
    })
    .collect();
  let m = values.len();

  // maximum matching: greedy pass, then augmenting paths from exposed variables
  let mut var_match: Vec<Option<usize>> = vec![None; n];
  let mut val_match: Vec<Option<usize>> = vec![None; m];
  for var in 0..n {
    for &value in &adjacency[var] {
      if val_match[value].is_none() {
        var_match[var] = Some(value);
        val_match[value] = Some(var);
        break;
      }
    }
  }
  for var in 0..n {
    if var_match[var].is_none() {
      let mut visited = BitSet::with_capacity(m);
      if !augment(var, &adjacency, &mut visited, &mut var_match, &mut val_match) {
        // a Hall violator: the visited values plus the exposed variable
        return fail_with_hall_violator(tracker, vars, &values, &visited, &val_match, var, at_least_one, at_most_one);
      }
    }
  }

  // values still on an alternating path from an exposed value keep all their edges
  let mut reachable_values = BitSet::with_capacity(m);
  let mut queue: Vec<usize> = (0..m).filter(|&v| val_match[v].is_none()).collect();
  for &v in &queue {
    reachable_values.insert(v);
  }
  while let Some(value) = queue.pop() {
    for var in 0..n {
      if var_match[var] != Some(value) && adjacency[var].contains(&value) {
        if let Some(matched) = var_match[var] {
          if !reachable_values.contains(matched) {
            reachable_values.insert(matched);
            queue.push(matched);
          }
        }
      }
    }
  }

  // strongly connected components of the matching-oriented graph
  let component = tarjan_components(n, m, &adjacency, &var_match, &val_match);

  // Every unsupported edge becomes a deletion, justified per component by its Hall set.
  // Components are processed sources-first (descending id, since Tarjan numbers sinks
  // first): a component's variables lose their edges into earlier components before its
  // own Hall set is invoked, so each reason really confines those variables to the set.
  let mut deletions_by_component: std::collections::BTreeMap<usize, Vec<(usize, usize)>> =
    std::collections::BTreeMap::new();
  for var in 0..n {
    for &value in &adjacency[var] {
      if var_match[var] == Some(value)
        || component[var] == component[n + value]
        || reachable_values.contains(value)
      {
        continue;
      }
      deletions_by_component
        .entry(component[n + value])
        .or_default()
        .push((var, value));
    }
  }

  for (component_id, deletions) in deletions_by_component.into_iter().rev() {
    // the Hall set: the variables and values inside this component
    let hall_vars: Vec<usize> = (0..n).filter(|&x| component[x] == component_id).collect();
    let hall_values: Vec<usize> = (0..m).filter(|&v| component[n + v] == component_id).collect();

    if tracker.proof_enabled() {
      let line_items: Vec<ProofLine> = hall_vars
        .iter()
        .map(|&x| expect_line(at_least_one[x]))
        .chain(hall_values.iter().map(|&v| expect_line(at_most_one[&values[v]])))
        .collect();
      tracker.add_proof_steps(|proof| {
        proof.emit_proof_comment("all-different hall set");
        proof.emit_proof_line(&pol_sum_text(&line_items), ProofLevel::Temporary);
      });
    }

    let reason_vars: Vec<VariableId> = hall_vars.iter().map(|&x| vars[x]).collect();
    let reason = if tracker.proof_enabled() {
      generic_reason(tracker.state(), &reason_vars)
    } else {
      Vec::new()
    };
    for (var, value) in deletions {
      let reason = reason.clone();
      tracker.infer_not_equal(vars[var], values[value], move || Justification::Rup { reason })?;
    }
  }

  Ok(())
}

/// The matching is not total: `exposed` cannot be matched, and the alternating search
/// visited exactly the values reachable from it. Those variables want more values than
/// exist, which the summed Hall lines contradict.
#[allow(clippy::too_many_arguments)]
fn fail_with_hall_violator(
  tracker: &mut InferenceTracker,
  vars: &[VariableId],
  values: &[Integer],
  visited: &BitSet,
  val_match: &[Option<usize>],
  exposed: usize,
  at_least_one: &[Option<ProofLine>],
  at_most_one: &HashMap<Integer, Option<ProofLine>>,
) -> Result<(), Contradiction> {
  let mut hall_vars: Vec<usize> = vec![exposed];
  hall_vars.extend(visited.iter().filter_map(|value| val_match[value]));

  if tracker.proof_enabled() {
    let line_items: Vec<ProofLine> = hall_vars
      .iter()
      .map(|&x| expect_line(at_least_one[x]))
      .chain(visited.iter().map(|v| expect_line(at_most_one[&values[v]])))
      .collect();
    tracker.add_proof_steps(|proof| {
      proof.emit_proof_comment("all-different hall violator");
      proof.emit_proof_line(&pol_sum_text(&line_items), ProofLevel::Temporary);
    });
  }

  let reason_vars: Vec<VariableId> = hall_vars.iter().map(|&x| vars[x]).collect();
  let reason = generic_reason(tracker.state(), &reason_vars);
  tracker.infer(&Literal::False, move || Justification::Rup { reason })?;
  Ok(())
}

/// Kuhn's augmenting search from an exposed variable.
fn augment(
  var: usize,
  adjacency: &[Vec<usize>],
  visited: &mut BitSet,
  var_match: &mut [Option<usize>],
  val_match: &mut [Option<usize>],
) -> bool {
  for &value in &adjacency[var] {
    if visited.contains(value) {
      continue;
    }
    visited.insert(value);
    let free = match val_match[value] {
      None => true,
      Some(other) => augment(other, adjacency, visited, var_match, val_match),
    };
    if free {
      var_match[var] = Some(value);
      val_match[value] = Some(var);
      return true;
    }
  }
  false
}

/// Tarjan over the graph with variable nodes `0..n` and value nodes `n..n+m`: a variable
/// points at its matched value, a value points at every variable that contains it but is
/// matched elsewhere.
fn tarjan_components(
  n: usize,
  m: usize,
  adjacency: &[Vec<usize>],
  var_match: &[Option<usize>],
  val_match: &[Option<usize>],
) -> Vec<usize> {
  struct Tarjan<'a> {
    successors: &'a dyn Fn(usize) -> Vec<usize>,
    index:      Vec<Option<usize>>,
    low:        Vec<usize>,
    on_stack:   Vec<bool>,
    stack:      Vec<usize>,
    next_index: usize,
    component:  Vec<usize>,
    components: usize,
  }

  impl<'a> Tarjan<'a> {
    fn visit(&mut self, node: usize) {
      self.index[node] = Some(self.next_index);
      self.low[node] = self.next_index;
      self.next_index += 1;
      self.stack.push(node);
      self.on_stack[node] = true;

      for next in (self.successors)(node) {
        match self.index[next] {
          None => {
            self.visit(next);
            self.low[node] = self.low[node].min(self.low[next]);
          }
          Some(index) => {
            if self.on_stack[next] {
              self.low[node] = self.low[node].min(index);
            }
          }
        }
      }

      if Some(self.low[node]) == self.index[node] {
        loop {
          let popped = self.stack.pop().expect("tarjan stack cannot be empty here");
          self.on_stack[popped] = false;
          self.component[popped] = self.components;
          if popped == node {
            break;
          }
        }
        self.components += 1;
      }
    }
  }

  let successors = |node: usize| -> Vec<usize> {
    if node < n {
      var_match[node].map(|value| n + value).into_iter().collect()
    } else {
      let value = node - n;
      adjacency
        .iter()
        .enumerate()
        .filter(|(var, edges)| val_match[value] != Some(*var) && edges.contains(&value))
        .map(|(var, _)| var)
        .collect()
    }
  };

  let total = n + m;
  let mut tarjan = Tarjan {
    successors: &successors,
    index: vec![None; total],
    low: vec![0; total],
    on_stack: vec![false; total],
    stack: Vec::new(),
    next_index: 0,
    component: vec![0; total],
    components: 0,
  };
  for node in 0..total {
    if tarjan.index[node].is_none() {
      tarjan.visit(node);
    }
  }
  tarjan.component
}

fn pol_sum_text(lines: &[ProofLine]) -> String {
  let mut text = String::from("p");
  for (position, line) in lines.iter().enumerate() {
    if position == 0 {
      text.push_str(&format!(" {}", line));
    } else {
      text.push_str(&format!(" {} +", line));
    }
  }
  text
}

fn expect_line(line: Option<ProofLine>) -> ProofLine {
  match line {
    Some(line) => line,
    None => panic!("all-different proof lines missing while proof logging is enabled"),
  }
}

// endregion

#[cfg(test)]
mod tests {
  use super::*;
  use crate::problem::Problem;
  use crate::search::{solve, SolveCallbacks};

  #[test]
  fn gac_beats_bounds_consistency() {
    // x1..x3 in 1..3, x4 in 1..4: the Hall set {x1, x2, x3} pins x4 to 4 at the root
    let mut problem = Problem::new();
    let mut vars: Vec<VariableId> = Vec::new();
    for _ in 0..3 {
      vars.push(problem.create_integer_variable(1, 3, None).unwrap().into());
    }
    let x4 = problem.create_integer_variable(1, 4, None).unwrap();
    vars.push(x4.into());
    problem.post(AllDifferent { vars }).unwrap();

    let mut state = problem.initial_state();
    assert!(problem.propagators.propagate(&mut state, None, None, None));
    assert_eq!(state.optional_single_value(x4), Some(4));
  }

  #[test]
  fn pigeonhole_fails_at_the_root() {
    let mut problem = Problem::new();
    let vars: Vec<VariableId> = (0..4)
      .map(|_| problem.create_integer_variable(1, 3, None).unwrap().into())
      .collect();
    problem.post(AllDifferent { vars }).unwrap();
    let stats = solve(&mut problem, SolveCallbacks::default()).unwrap();
    assert_eq!(stats.solutions, 0);
    assert_eq!(stats.recursions, 0);
  }

  #[test]
  fn duplicate_variables_are_rejected() {
    let mut problem = Problem::new();
    let x = problem.create_integer_variable(0, 3, None).unwrap();
    let result = problem.post(AllDifferent { vars: vec![x.into(), x.into()] });
    assert!(result.is_err());
  }

  #[test]
  fn permutation_counting() {
    let mut problem = Problem::new();
    let vars: Vec<VariableId> = (0..4)
      .map(|_| problem.create_integer_variable(1, 4, None).unwrap().into())
      .collect();
    problem.post(AllDifferent { vars }).unwrap();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(|_| true)),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 24);
  }

  #[test]
  fn eight_queens_has_ninety_two_solutions() {
    use std::cell::RefCell;
    use std::rc::Rc;

    let mut problem = Problem::new();
    let queens: Vec<_> = (0..8)
      .map(|i| problem.create_integer_variable(1, 8, Some(&format!("q{}", i))).unwrap())
      .collect();

    let columns: Vec<VariableId> = queens.iter().map(|&q| q.into()).collect();
    let up_diagonals: Vec<VariableId> = queens
      .iter()
      .enumerate()
      .map(|(i, &q)| VariableId::from(q).offset(i as Integer))
      .collect();
    let down_diagonals: Vec<VariableId> = queens
      .iter()
      .enumerate()
      .map(|(i, &q)| VariableId::from(q).offset(-(i as Integer)))
      .collect();
    problem.post(AllDifferent { vars: columns }).unwrap();
    problem.post(AllDifferent { vars: up_diagonals }).unwrap();
    problem.post(AllDifferent { vars: down_diagonals }).unwrap();

    let first = Rc::new(RefCell::new(None));
    let first_in_callback = Rc::clone(&first);
    let queens_in_callback = queens.clone();
    let callbacks = SolveCallbacks {
      solution: Some(Box::new(move |current| {
        let assignment: Vec<Integer> =
          queens_in_callback.iter().map(|&q| current.value(q)).collect();
        first_in_callback.borrow_mut().get_or_insert(assignment);
        true
      })),
      ..SolveCallbacks::default()
    };
    let stats = solve(&mut problem, callbacks).unwrap();
    assert_eq!(stats.solutions, 92);
    // smallest-value guessing finds this board first
    assert_eq!(*first.borrow(), Some(vec![1, 5, 8, 6, 3, 7, 2, 4]));
  }
}
