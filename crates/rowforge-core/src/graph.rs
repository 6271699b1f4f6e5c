use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::schema::Schema;

/// One batch of the generation schedule.
///
/// Every group in a level can be generated concurrently once all earlier
/// levels are complete. A group with more than one table is a true FK
/// cycle and is filled together with a nullable-first pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationLevel {
    pub groups: Vec<Vec<String>>,
}

impl GenerationLevel {
    pub fn tables(&self) -> impl Iterator<Item = &str> {
        self.groups.iter().flatten().map(|name| name.as_str())
    }
}

/// Build the level schedule for a schema.
///
/// Tables form a digraph with an edge child → parent for every FK. Each
/// strongly connected component becomes one group; groups are layered so
/// that a group's parents always sit in an earlier level. A component
/// that stays cyclic when only non-nullable FK edges are considered
/// cannot be broken with NULLs and is rejected.
pub fn resolve_levels(schema: &Schema) -> Result<Vec<GenerationLevel>> {
    let names: Vec<&str> = schema.table_names().collect();
    let index: BTreeMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| (*name, idx))
        .collect();

    // child -> parents, self-edges excluded (handled by the generator).
    let mut parents: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); names.len()];
    for (child_idx, name) in names.iter().enumerate() {
        let table = schema.table(name).expect("table listed in schema");
        for fk in table.foreign_keys() {
            if let Some(&parent_idx) = index.get(fk.ref_table.as_str()) {
                if parent_idx != child_idx {
                    parents[child_idx].insert(parent_idx);
                }
            }
        }
    }

    let components = tarjan_scc(&parents);

    let mut component_of = vec![0usize; names.len()];
    for (comp_idx, members) in components.iter().enumerate() {
        for &node in members {
            component_of[node] = comp_idx;
        }
    }

    // Cyclic components must be breakable with NULLs; ordering their
    // members so that non-nullable edges point backward lets the
    // generator satisfy those edges directly and defer only nullable
    // ones.
    let mut ordered_members: Vec<Vec<usize>> = Vec::with_capacity(components.len());
    for members in &components {
        if members.len() > 1 {
            ordered_members.push(order_cycle_members(schema, &names, members)?);
        } else {
            ordered_members.push(members.clone());
        }
    }

    // Condensation layering: a component's level is one past the deepest
    // component it depends on.
    let mut levels = vec![0usize; components.len()];
    let mut max_level = 0usize;
    // Tarjan emits components in reverse topological order of the
    // child -> parent graph, so parents are finalized before children.
    for (comp_idx, members) in components.iter().enumerate() {
        let mut level = 0usize;
        for &node in members {
            for &parent in &parents[node] {
                let parent_comp = component_of[parent];
                if parent_comp != comp_idx {
                    level = level.max(levels[parent_comp] + 1);
                }
            }
        }
        levels[comp_idx] = level;
        max_level = max_level.max(level);
    }

    let mut schedule: Vec<GenerationLevel> = (0..=max_level)
        .map(|_| GenerationLevel { groups: Vec::new() })
        .collect();

    // Deterministic order: groups sorted by their earliest table's
    // position in the schema.
    let mut ordered: Vec<(usize, Vec<usize>)> = components
        .iter()
        .enumerate()
        .map(|(comp_idx, _)| (comp_idx, ordered_members[comp_idx].clone()))
        .collect();
    ordered.sort_by_key(|(_, members)| members.iter().copied().min().unwrap_or(usize::MAX));

    for (comp_idx, members) in ordered {
        let group: Vec<String> = members.iter().map(|&idx| names[idx].to_string()).collect();
        schedule[levels[comp_idx]].groups.push(group);
    }

    Ok(schedule)
}

/// Order a cyclic component so every non-nullable FK points at an
/// earlier member; errors when no such order exists (a cycle that
/// cannot be broken with NULLs).
fn order_cycle_members(schema: &Schema, names: &[&str], members: &[usize]) -> Result<Vec<usize>> {
    let member_set: BTreeSet<usize> = members.iter().copied().collect();
    let index: BTreeMap<&str, usize> = names
        .iter()
        .enumerate()
        .map(|(idx, name)| (*name, idx))
        .collect();

    // Edges that cannot be deferred: FKs whose columns include at least
    // one non-nullable column.
    let mut hard_edges: BTreeMap<usize, BTreeSet<usize>> = BTreeMap::new();
    for &child_idx in members {
        let table = schema.table(names[child_idx]).expect("member table");
        for fk in table.foreign_keys() {
            let Some(&parent_idx) = index.get(fk.ref_table.as_str()) else {
                continue;
            };
            if parent_idx == child_idx || !member_set.contains(&parent_idx) {
                continue;
            }
            let non_nullable = fk.columns.iter().any(|name| {
                table
                    .column(name)
                    .map(|column| !column.nullable)
                    .unwrap_or(false)
            });
            if non_nullable {
                hard_edges.entry(child_idx).or_default().insert(parent_idx);
            }
        }
    }

    // Kahn's algorithm over the hard-edge subgraph, taking the earliest
    // schema position first for determinism. Leftover nodes with
    // unresolved out-degree sit on a non-nullable cycle.
    let mut out_degree: BTreeMap<usize, usize> = member_set.iter().map(|&n| (n, 0)).collect();
    let mut dependents: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for (&child, edge_parents) in &hard_edges {
        *out_degree.get_mut(&child).expect("member node") = edge_parents.len();
        for &parent in edge_parents {
            dependents.entry(parent).or_default().push(child);
        }
    }

    let mut ready: BTreeSet<usize> = out_degree
        .iter()
        .filter_map(|(&node, &deg)| (deg == 0).then_some(node))
        .collect();
    let mut order = Vec::with_capacity(member_set.len());
    while let Some(node) = ready.iter().next().copied() {
        ready.remove(&node);
        order.push(node);
        if let Some(children) = dependents.get(&node) {
            for &child in children {
                let deg = out_degree.get_mut(&child).expect("member node");
                *deg -= 1;
                if *deg == 0 {
                    ready.insert(child);
                }
            }
        }
    }

    if order.len() != member_set.len() {
        let mut cycle: Vec<String> = out_degree
            .iter()
            .filter_map(|(&node, &deg)| (deg > 0).then(|| names[node].to_string()))
            .collect();
        cycle.sort();
        return Err(Error::CyclicDependency(cycle));
    }
    Ok(order)
}

/// Iterative Tarjan over child → parent adjacency. Components come out
/// in reverse topological order (parents before the children that point
/// at them).
fn tarjan_scc(adjacency: &[BTreeSet<usize>]) -> Vec<Vec<usize>> {
    #[derive(Clone)]
    struct NodeState {
        index: Option<usize>,
        lowlink: usize,
        on_stack: bool,
    }

    let n = adjacency.len();
    let mut state = vec![
        NodeState {
            index: None,
            lowlink: 0,
            on_stack: false,
        };
        n
    ];
    let mut next_index = 0usize;
    let mut stack: Vec<usize> = Vec::new();
    let mut components: Vec<Vec<usize>> = Vec::new();

    for start in 0..n {
        if state[start].index.is_some() {
            continue;
        }
        // Explicit call stack: (node, neighbor iterator position).
        let mut call_stack: Vec<(usize, Vec<usize>, usize)> = Vec::new();
        let neighbors: Vec<usize> = adjacency[start].iter().copied().collect();
        state[start].index = Some(next_index);
        state[start].lowlink = next_index;
        next_index += 1;
        stack.push(start);
        state[start].on_stack = true;
        call_stack.push((start, neighbors, 0));

        while let Some((node, neighbors, cursor)) = call_stack.pop() {
            let mut advanced = false;
            for pos in cursor..neighbors.len() {
                let next = neighbors[pos];
                if state[next].index.is_none() {
                    call_stack.push((node, neighbors.clone(), pos + 1));
                    state[next].index = Some(next_index);
                    state[next].lowlink = next_index;
                    next_index += 1;
                    stack.push(next);
                    state[next].on_stack = true;
                    let next_neighbors: Vec<usize> = adjacency[next].iter().copied().collect();
                    call_stack.push((next, next_neighbors, 0));
                    advanced = true;
                    break;
                } else if state[next].on_stack {
                    state[node].lowlink = state[node].lowlink.min(
                        state[next].index.expect("visited node has an index"),
                    );
                }
            }
            if advanced {
                continue;
            }
            if state[node].lowlink == state[node].index.expect("visited node has an index") {
                let mut component = Vec::new();
                while let Some(member) = stack.pop() {
                    state[member].on_stack = false;
                    component.push(member);
                    if member == node {
                        break;
                    }
                }
                components.push(component);
            }
            if let Some((parent, _, _)) = call_stack.last() {
                let parent = *parent;
                state[parent].lowlink = state[parent].lowlink.min(state[node].lowlink);
            }
        }
    }

    components
}
