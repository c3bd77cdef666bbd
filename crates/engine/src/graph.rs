//! Run-after graph validation — runs once at initialization, never mid-run.
//!
//! Rules enforced:
//! 1. Every `runAfter` entry must name an existing action.
//! 2. The run-after relation must be acyclic (topological sort must succeed).
//!
//! Returns the cached topological order on success. Ties between mutually
//! independent actions break by declaration order, so iteration is
//! deterministic even though independent branches may run concurrently.

use std::collections::{BTreeSet, HashMap};

use crate::definition::FlowDefinition;
use crate::error::DefinitionError;

/// The validated, topologically ordered view of a flow's actions.
#[derive(Debug, Clone)]
pub struct FlowGraph {
    order: Vec<String>,
}

impl FlowGraph {
    /// Action names in execution order.
    pub fn order(&self) -> &[String] {
        &self.order
    }
}

/// Validate the run-after relation and cache one topological order.
///
/// # Errors
/// - [`DefinitionError::UnknownRunAfterReference`] for a dangling predecessor.
/// - [`DefinitionError::CycleDetected`] if the relation is not acyclic.
pub fn build_graph(definition: &FlowDefinition) -> Result<FlowGraph, DefinitionError> {
    let actions = &definition.actions;
    let index_of: HashMap<&str, usize> = actions
        .names()
        .enumerate()
        .map(|(index, name)| (name, index))
        .collect();

    // -----------------------------------------------------------------------
    // 1. Validate predecessor references; build adjacency + in-degrees.
    //    A repeated runAfter entry counts once.
    // -----------------------------------------------------------------------
    let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); actions.len()];
    let mut in_degree: Vec<usize> = vec![0; actions.len()];

    for (name, action) in actions.iter() {
        let target = index_of[name];
        let mut seen: BTreeSet<&str> = BTreeSet::new();
        for reference in &action.run_after {
            let source = *index_of.get(reference.as_str()).ok_or_else(|| {
                DefinitionError::UnknownRunAfterReference {
                    action: name.to_owned(),
                    reference: reference.clone(),
                }
            })?;
            if seen.insert(reference.as_str()) {
                adjacency[source].push(target);
                in_degree[target] += 1;
            }
        }
    }

    // -----------------------------------------------------------------------
    // 2. Kahn's algorithm. The ready set is ordered by declaration index so
    //    independent actions surface in declaration order.
    // -----------------------------------------------------------------------
    let names: Vec<&str> = actions.names().collect();
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, &degree)| degree == 0)
        .map(|(index, _)| index)
        .collect();

    let mut order: Vec<String> = Vec::with_capacity(actions.len());

    while let Some(&index) = ready.iter().next() {
        ready.remove(&index);
        order.push(names[index].to_owned());

        for &dependent in &adjacency[index] {
            in_degree[dependent] -= 1;
            if in_degree[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }

    // Any node left unvisited sits on a cycle.
    if order.len() != actions.len() {
        let stuck = in_degree
            .iter()
            .position(|&degree| degree > 0)
            .map(|index| names[index].to_owned())
            .unwrap_or_default();
        return Err(DefinitionError::CycleDetected(stuck));
    }

    Ok(FlowGraph { order })
}
