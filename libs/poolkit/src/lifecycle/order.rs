//! Start-order computation (Kahn's algorithm, one sorted ready set per round).

use std::collections::{BTreeMap, BTreeSet, HashMap};

use super::LifecycleError;

/// Topologically sort `graph` (unit -> dependencies), dependencies first.
///
/// Every dependency must itself be a key of `graph`; the caller validates that first.
/// Each round takes every unit whose dependencies are all placed, appends them sorted by
/// name, and only then releases their dependents into the next round. The result is
/// deterministic for a given graph.
pub(super) fn start_order(
    graph: &BTreeMap<String, Vec<String>>,
) -> Result<Vec<String>, LifecycleError> {
    let mut pending: HashMap<&str, usize> = HashMap::with_capacity(graph.len());
    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();

    for (unit, deps) in graph {
        let unique: BTreeSet<&str> = deps.iter().map(String::as_str).collect();
        pending.insert(unit.as_str(), unique.len());
        for dep in unique {
            dependents.entry(dep).or_default().push(unit.as_str());
        }
    }

    let mut ready: Vec<&str> = pending
        .iter()
        .filter(|&(_, &count)| count == 0)
        .map(|(&unit, _)| unit)
        .collect();

    let mut order = Vec::with_capacity(graph.len());
    while !ready.is_empty() {
        ready.sort_unstable();
        let mut next = Vec::new();
        for unit in ready {
            order.push(unit.to_owned());
            for &dependent in dependents.get(unit).map_or(&[][..], Vec::as_slice) {
                if let Some(count) = pending.get_mut(dependent) {
                    *count -= 1;
                    if *count == 0 {
                        next.push(dependent);
                    }
                }
            }
        }
        ready = next;
    }

    if order.len() < graph.len() {
        let placed: BTreeSet<&str> = order.iter().map(String::as_str).collect();
        let units = graph
            .keys()
            .filter(|unit| !placed.contains(unit.as_str()))
            .cloned()
            .collect();
        return Err(LifecycleError::CircularDependency { units });
    }

    Ok(order)
}
