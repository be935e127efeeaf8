//! Structural Validator (spec §4.5): acyclicity, terminal reachability,
//! and branch isolation. Runs after the graph has been constructed and
//! every individual data edge has already been type-checked.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::algo::toposort;
use petgraph::graph::NodeIndex;
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::error::{CompileError, CompileResult};
use crate::graph::ExecutionGraph;

/// Options that tune which structural checks run (spec §A.3).
#[derive(Debug, Clone, Copy, Default)]
pub struct StructuralCheckOptions {
    pub skip_branch_isolation: bool,
}

/// Runs every structural invariant (I1, I4, I5) in order, stopping at the
/// first violation — exactly the teacher's "fail fast with a dedicated
/// error kind" style rather than a slurp-up `Vec<CompileError>`.
pub fn validate_structure(
    graph: &ExecutionGraph,
    options: StructuralCheckOptions,
) -> CompileResult<()> {
    check_acyclic(graph)?;
    check_terminal_reachability(graph)?;
    if !options.skip_branch_isolation {
        check_branch_isolation(graph)?;
    }
    Ok(())
}

/// I1: the graph must be a DAG.
fn check_acyclic(graph: &ExecutionGraph) -> CompileResult<()> {
    if let Err(cycle) = toposort(graph.inner(), None) {
        let node = graph.node(cycle.node_id());
        return Err(CompileError::CycleError {
            nodes: vec![node.id().to_string()],
            context: vec![],
        });
    }
    Ok(())
}

/// I4: every node must reach at least one terminal — either an output
/// node, or a step whose block declares zero outputs (a side-effecting
/// step such as a verifier or sentinel, a legitimate terminal by design
/// regardless of whether this workflow wires anything downstream of
/// it). Computed as a single reverse-DFS from the union of those
/// terminals (mirrors
/// `get_nodes_that_are_reachable_from_pointed_ones_in_reversed_graph`).
fn check_terminal_reachability(graph: &ExecutionGraph) -> CompileResult<()> {
    let mut terminals = Vec::new();
    for (idx, node) in graph.nodes() {
        if node.is_output() {
            terminals.push(idx);
            continue;
        }
        if node.produces_no_outputs() {
            terminals.push(idx);
        }
    }

    let reachable = reverse_reachable_from(graph, &terminals);

    let mut unreachable: Vec<String> = graph
        .nodes()
        .filter(|(idx, node)| !node.is_output() && !reachable.contains(idx))
        .map(|(_, node)| node.id().to_string())
        .collect();
    unreachable.sort();

    if unreachable.is_empty() {
        Ok(())
    } else {
        Err(CompileError::DanglingBranchError { nodes: unreachable, context: vec![] })
    }
}

fn reverse_reachable_from(graph: &ExecutionGraph, seeds: &[NodeIndex]) -> HashSet<NodeIndex> {
    let mut visited: HashSet<NodeIndex> = HashSet::new();
    let mut queue: VecDeque<NodeIndex> = VecDeque::new();
    for &seed in seeds {
        if visited.insert(seed) {
            queue.push_back(seed);
        }
    }
    while let Some(idx) = queue.pop_front() {
        for edge in graph.inner().edges_directed(idx, Direction::Incoming) {
            let parent = edge.source();
            if visited.insert(parent) {
                queue.push_back(parent);
            }
        }
    }
    visited
}

/// I5: branch isolation (spec §4.5).
///
/// A step with two or more data-edge step parents sits downstream of
/// more than one producer. For each flow-control step, record which of
/// its own *immediate successors* the branch eventually descends from
/// — not the branch parent itself, since a single selected successor
/// may legitimately fan out into several steps that all converge again
/// later. Two hazards are possible:
///
///   1. a single flow-control step's branches converge here through
///      more than one distinct immediate successor (i.e. it picks two
///      of its own branches at once), or
///   2. two *different* flow-control steps each gate a distinct branch
///      feeding this node, so the node could be fed by branches that
///      were never meant to run together.
///
/// Flow-control incoming edges are excluded from the "has ≥2 step
/// parents" seed set (see SPEC_FULL.md §4.5): a step's own
/// flow-control gate does not count as one of its data-producing
/// parents for this check.
fn check_branch_isolation(graph: &ExecutionGraph) -> CompileResult<()> {
    let multi_parent_steps = detect_steps_with_more_than_one_data_parent(graph);
    if multi_parent_steps.is_empty() {
        return Ok(());
    }

    let flow_control_steps: Vec<NodeIndex> = graph
        .nodes()
        .filter(|(idx, node)| node.is_step() && !graph.flow_control_successors(*idx).is_empty())
        .map(|(idx, _)| idx)
        .collect();

    if flow_control_steps.is_empty() {
        return Ok(());
    }

    // reversed, step-only subgraph: edge u -> v in `reversed_steps` means
    // "v is a data or flow-control parent of u" among step nodes only.
    let reversed_steps = construct_reversed_step_only_graph(graph);

    for &node_idx in &multi_parent_steps {
        let parents = graph.step_data_parents(node_idx);
        let step_parents: Vec<NodeIndex> =
            parents.into_iter().filter(|p| graph.node(*p).is_step()).collect();
        if step_parents.len() < 2 {
            continue;
        }

        // For each flow-control step, which of its own immediate
        // successors does each branch parent descend from? Keying on the
        // successor (not the branch parent) means a successor that fans
        // out into several steps which later reconverge is only counted
        // once — it is still a single selected branch.
        let mut gating: HashMap<NodeIndex, HashSet<NodeIndex>> = HashMap::new();
        for &flow_step in &flow_control_steps {
            let successors = graph.flow_control_successors(flow_step);
            let mut implicated: HashSet<NodeIndex> = HashSet::new();
            for &branch_parent in &step_parents {
                if let Some(&successor) = successors
                    .iter()
                    .find(|&&successor| path_exists_through_steps(&reversed_steps, branch_parent, successor))
                {
                    implicated.insert(successor);
                }
            }
            if !implicated.is_empty() {
                gating.insert(flow_step, implicated);
            }
        }

        // Hazard 1: one flow-control step's branches converge here
        // through 2+ distinct immediate successors at once.
        for (flow_step, successors) in &gating {
            if successors.len() > 1 {
                return Err(CompileError::BranchesClashError {
                    node: graph.node(node_idx).id().to_string(),
                    message: format!(
                        "flow-control step '{}' selects more than one of this step's incoming branches simultaneously",
                        graph.node(*flow_step).id()
                    ),
                    context: vec![],
                });
            }
        }

        // Hazard 2: two different flow-control steps each gate a
        // distinct branch feeding this node.
        if gating.len() > 1 {
            let mut offending: Vec<&str> =
                gating.keys().map(|idx| graph.node(*idx).id()).collect();
            offending.sort();
            return Err(CompileError::BranchesClashError {
                node: graph.node(node_idx).id().to_string(),
                message: format!(
                    "incoming branches are gated by different flow-control steps ({}), which may never execute together",
                    offending.join(", ")
                ),
                context: vec![],
            });
        }
    }

    Ok(())
}

fn detect_steps_with_more_than_one_data_parent(graph: &ExecutionGraph) -> Vec<NodeIndex> {
    let mut result: Vec<NodeIndex> = graph
        .nodes()
        .filter(|(idx, node)| {
            node.is_step()
                && graph
                    .step_data_parents(*idx)
                    .into_iter()
                    .filter(|p| graph.node(*p).is_step())
                    .count()
                    >= 2
        })
        .map(|(idx, _)| idx)
        .collect();
    result.sort_by_key(|idx| graph.node(*idx).id().to_string());
    result
}

/// A step-only adjacency view, edges reversed relative to the original
/// graph: `reversed[u]` holds every step `v` such that the original
/// graph has an edge `v -> u` (data or flow-control).
fn construct_reversed_step_only_graph(
    graph: &ExecutionGraph,
) -> HashMap<NodeIndex, Vec<NodeIndex>> {
    let mut reversed: HashMap<NodeIndex, Vec<NodeIndex>> = HashMap::new();
    for (source, target, _kind) in graph.edges() {
        if !graph.node(source).is_step() || !graph.node(target).is_step() {
            continue;
        }
        reversed.entry(target).or_default().push(source);
    }
    reversed
}

/// Whether `to` is reachable from `from` by walking the reversed
/// step-only graph (i.e. whether `from` is a descendant of `to` in
/// execution order).
fn path_exists_through_steps(
    reversed: &HashMap<NodeIndex, Vec<NodeIndex>>,
    from: NodeIndex,
    to: NodeIndex,
) -> bool {
    if from == to {
        return true;
    }
    let mut visited = HashSet::new();
    let mut queue = VecDeque::new();
    queue.push_back(from);
    visited.insert(from);
    while let Some(current) = queue.pop_front() {
        if let Some(parents) = reversed.get(&current) {
            for &parent in parents {
                if parent == to {
                    return true;
                }
                if visited.insert(parent) {
                    queue.push_back(parent);
                }
            }
        }
    }
    false
}
