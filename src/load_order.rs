//! Table load order via topological sort.
//!
//! Inserts must run parents-first so foreign keys always resolve; deletes
//! run in the exact reverse so no row is ever left pointing at a deleted
//! parent.

use std::collections::{HashMap, VecDeque};
use std::fmt::Debug;
use std::hash::Hash;

use crate::warehouse::Table;

/// Compute a dependency-respecting order using Kahn's algorithm.
///
/// `nodes` lists every node with the nodes it depends on. Nodes with no
/// remaining dependencies are released in the order they appear in
/// `nodes`, so the result is deterministic.
///
/// # Returns
/// * `Ok(order)` - every node, each after all of its dependencies
/// * `Err(msg)` - a dependency is undeclared or the graph has a cycle
///
/// # Example
/// ```
/// use salesload::load_order::topological_order;
///
/// let order = topological_order(&[("b", vec!["a"]), ("a", vec![])]).unwrap();
/// assert_eq!(order, vec!["a", "b"]);
/// ```
pub fn topological_order<T>(nodes: &[(T, Vec<T>)]) -> Result<Vec<T>, String>
where
    T: Copy + Eq + Hash + Debug,
{
    let mut in_degree: HashMap<T, usize> = HashMap::new();
    let mut dependents: HashMap<T, Vec<T>> = HashMap::new();

    for (node, _) in nodes {
        in_degree.insert(*node, 0);
        dependents.insert(*node, Vec::new());
    }

    for (node, dependencies) in nodes {
        for dep in dependencies {
            let Some(list) = dependents.get_mut(dep) else {
                return Err(format!("{:?} depends on undeclared {:?}", node, dep));
            };
            list.push(*node);
        }
        if let Some(degree) = in_degree.get_mut(node) {
            *degree += dependencies.len();
        }
    }

    let mut queue: VecDeque<T> = nodes
        .iter()
        .map(|(node, _)| *node)
        .filter(|node| in_degree.get(node) == Some(&0))
        .collect();

    let mut sorted = Vec::with_capacity(nodes.len());

    while let Some(node) = queue.pop_front() {
        sorted.push(node);

        if let Some(children) = dependents.get(&node) {
            for child in children {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(*child);
                    }
                }
            }
        }
    }

    if sorted.len() != nodes.len() {
        let unprocessed: Vec<_> = nodes
            .iter()
            .map(|(node, _)| *node)
            .filter(|node| !sorted.contains(node))
            .collect();

        return Err(format!(
            "Circular dependency detected involving: {:?}",
            unprocessed
        ));
    }

    Ok(sorted)
}

/// Parents-first insert order for the warehouse tables.
pub fn insert_order() -> Vec<Table> {
    let graph: Vec<(Table, Vec<Table>)> = Table::ALL
        .iter()
        .map(|table| (*table, table.dependencies()))
        .collect();

    // The table graph is fixed and acyclic; fall back to declaration order,
    // which is already parents-first.
    topological_order(&graph).unwrap_or_else(|_| Table::ALL.to_vec())
}

/// Children-first delete order: the reverse of [`insert_order`].
pub fn delete_order() -> Vec<Table> {
    let mut order = insert_order();
    order.reverse();
    order
}
