//! Graph Constructor (spec §4.3): builds the execution graph in three
//! node passes followed by an edge pass, type-checking each data edge as
//! it is added.

use std::collections::HashMap;

use log::debug;
use petgraph::graph::{DiGraph, NodeIndex};

use crate::definition::{StepDefinition, WorkflowDefinition};
use crate::error::{CompileError, CompileResult};
use crate::kind::{Kind, KindSet};
use crate::registry::Registry;
use crate::schema::SelectedElement;
use crate::selector::Selector;
use crate::type_checker::{validate_reference_types, EdgeContext};

/// A tagged execution graph node. The id is the selector string itself
/// (`$inputs.x`, `$steps.y`, `out.z`) — there is no separate numeric id
/// assignment to keep stable across calls.
#[derive(Debug, Clone)]
pub enum Node {
    Input {
        id: String,
        kind: Kind,
    },
    Step {
        id: String,
        manifest_type_id: String,
        is_flow_control: bool,
        /// `true` iff the block declares zero outputs for this step's
        /// manifest — a side-effecting step (verifier, sentinel) that is
        /// a legitimate terminal on its own, independent of whether
        /// anything in this particular workflow consumes it.
        produces_no_outputs: bool,
    },
    Output {
        id: String,
        selector: Selector,
    },
}

impl Node {
    pub fn id(&self) -> &str {
        match self {
            Node::Input { id, .. } => id,
            Node::Step { id, .. } => id,
            Node::Output { id, .. } => id,
        }
    }

    pub fn is_step(&self) -> bool {
        matches!(self, Node::Step { .. })
    }

    pub fn is_output(&self) -> bool {
        matches!(self, Node::Output { .. })
    }

    pub fn produces_no_outputs(&self) -> bool {
        matches!(self, Node::Step { produces_no_outputs: true, .. })
    }
}

/// Whether an edge models a data dependency or a flow-control hand-off.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeKind {
    Data,
    FlowControl,
}

pub fn input_node_id(name: &str) -> String {
    format!("$inputs.{name}")
}

pub fn step_node_id(name: &str) -> String {
    format!("$steps.{name}")
}

pub fn output_node_id(name: &str) -> String {
    format!("out.{name}")
}

/// The validated, annotated execution graph (spec §3, §4.6).
#[derive(Debug, Clone)]
pub struct ExecutionGraph {
    pub(crate) inner: DiGraph<Node, EdgeKind>,
    index_of: HashMap<String, NodeIndex>,
}

impl ExecutionGraph {
    pub fn node_count(&self) -> usize {
        self.inner.node_count()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index_of.contains_key(id)
    }

    pub fn index_of(&self, id: &str) -> Option<NodeIndex> {
        self.index_of.get(id).copied()
    }

    pub fn node(&self, idx: NodeIndex) -> &Node {
        &self.inner[idx]
    }

    pub fn node_by_id(&self, id: &str) -> Option<&Node> {
        self.index_of(id).map(|idx| &self.inner[idx])
    }

    pub fn inner(&self) -> &DiGraph<Node, EdgeKind> {
        &self.inner
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeIndex, &Node)> {
        self.inner.node_indices().map(move |idx| (idx, &self.inner[idx]))
    }

    pub fn edges(&self) -> impl Iterator<Item = (NodeIndex, NodeIndex, EdgeKind)> + '_ {
        self.inner
            .edge_indices()
            .map(move |edge_idx| {
                let (source, target) = self.inner.edge_endpoints(edge_idx).expect("valid edge index");
                (source, target, self.inner[edge_idx])
            })
    }

    /// Per-step ordered list of resolved data selectors, in field
    /// declaration order — feeds `PlannedStep::data_parents` (§4.6).
    pub fn step_data_parents(&self, step_idx: NodeIndex) -> Vec<NodeIndex> {
        use petgraph::Direction;
        self.inner
            .edges_directed(step_idx, Direction::Incoming)
            .filter(|edge| *edge.weight() == EdgeKind::Data)
            .map(|edge| edge.source())
            .collect()
    }

    /// Flow-control successors of a step, i.e. the branches it may
    /// redirect execution into.
    pub fn flow_control_successors(&self, step_idx: NodeIndex) -> Vec<NodeIndex> {
        use petgraph::Direction;
        self.inner
            .edges_directed(step_idx, Direction::Outgoing)
            .filter(|edge| *edge.weight() == EdgeKind::FlowControl)
            .map(|edge| edge.target())
            .collect()
    }
}

/// Builds the (not yet validated) execution graph from a parsed
/// definition and the block registry, type-checking every data edge as
/// it is added. Structural validation (acyclicity, reachability, branch
/// isolation) happens afterward in `structural.rs`.
pub fn construct_graph(
    definition: &WorkflowDefinition,
    registry: &Registry,
) -> CompileResult<ExecutionGraph> {
    let mut inner: DiGraph<Node, EdgeKind> = DiGraph::new();
    let mut index_of = HashMap::new();

    for input in &definition.inputs {
        let id = input_node_id(&input.name);
        debug!("graph: adding input node {id}");
        let idx = inner.add_node(Node::Input { id: id.clone(), kind: input.kind.clone() });
        index_of.insert(id, idx);
    }

    let steps_by_name: HashMap<&str, &StepDefinition> =
        definition.steps.iter().map(|step| (step.name.as_str(), step)).collect();

    for step in &definition.steps {
        let id = step_node_id(&step.name);
        debug!("graph: adding step node {id} ({})", step.manifest_type_id);
        let block = registry.get(&step.manifest_type_id).ok_or_else(|| CompileError::DefinitionError {
            message: format!(
                "step '{}' references unknown block type '{}'",
                step.name, step.manifest_type_id
            ),
            context: vec![],
        })?;
        let produces_no_outputs = block.outputs(step)?.is_empty();
        let idx = inner.add_node(Node::Step {
            id: id.clone(),
            manifest_type_id: step.manifest_type_id.clone(),
            is_flow_control: false,
            produces_no_outputs,
        });
        index_of.insert(id, idx);
    }

    for output in &definition.outputs {
        let id = output_node_id(&output.name);
        debug!("graph: adding output node {id}");
        let idx = inner.add_node(Node::Output { id: id.clone(), selector: output.selector.clone() });
        index_of.insert(id, idx);
    }

    let mut graph = ExecutionGraph { inner, index_of };

    for step in &definition.steps {
        add_edges_for_step(&mut graph, step, &steps_by_name, registry)?;
    }
    for output in &definition.outputs {
        add_edge_for_output(&mut graph, output)?;
    }

    Ok(graph)
}

fn require_node(graph: &ExecutionGraph, id: &str) -> CompileResult<NodeIndex> {
    graph.index_of(id).ok_or_else(|| CompileError::InvalidReferenceError {
        selector: id.to_string(),
        message: "graph definition contains a selector that points to an undefined element".into(),
        context: vec![],
    })
}

fn add_edges_for_step(
    graph: &mut ExecutionGraph,
    step: &StepDefinition,
    steps_by_name: &HashMap<&str, &StepDefinition>,
    registry: &Registry,
) -> CompileResult<()> {
    let step_id = step_node_id(&step.name);
    let step_idx = require_node(graph, &step_id)?;

    let block = registry.get(&step.manifest_type_id).ok_or_else(|| CompileError::DefinitionError {
        message: format!("step '{}' references unknown block type '{}'", step.name, step.manifest_type_id),
        context: vec![],
    })?;

    for (property, selector) in step.selector_fields() {
        let target_id = selector.target_step_or_input_id();
        let target_idx = require_node(graph, &target_id)?;

        let selector_spec = block.schema().selector(property).ok_or_else(|| {
            CompileError::DefinitionError {
                message: format!(
                    "step '{}' sets property '{property}' which is not a selector field of block '{}'",
                    step.name, step.manifest_type_id
                ),
                context: vec![],
            }
        })?;

        if selector.is_step() {
            if !selector_spec.allows_flow_control() {
                return Err(CompileError::StructureError {
                    message: format!(
                        "step '{}' has a flow-control reference on property '{property}', but that property does not declare `step` as an allowed selected element",
                        step.name
                    ),
                    context: vec![],
                });
            }
            graph.inner.add_edge(step_idx, target_idx, EdgeKind::FlowControl);
            if let Node::Step { is_flow_control, .. } = &mut graph.inner[step_idx] {
                *is_flow_control = true;
            }
            continue;
        }

        let expected: KindSet = selector_spec.kinds_for(if selector.is_input() {
            SelectedElement::Input
        } else {
            SelectedElement::StepOutput
        });

        let actual: KindSet = if selector.is_input() {
            match graph.node(target_idx) {
                Node::Input { kind, .. } => [kind.clone()].into_iter().collect(),
                _ => unreachable!("input selector must resolve to an input node"),
            }
        } else {
            let referred_step_name = match &selector {
                Selector::StepOutput { name, .. } => name.as_str(),
                _ => unreachable!("non-step-output selector handled above"),
            };
            let referred_step = steps_by_name.get(referred_step_name).ok_or_else(|| {
                CompileError::InvalidReferenceError {
                    selector: selector.to_string(),
                    message: format!("step '{referred_step_name}' does not exist"),
                    context: vec![],
                }
            })?;
            let referred_block = registry.get(&referred_step.manifest_type_id).ok_or_else(|| {
                CompileError::DefinitionError {
                    message: format!(
                        "step '{referred_step_name}' references unknown block type '{}'",
                        referred_step.manifest_type_id
                    ),
                    context: vec![],
                }
            })?;
            let output_property = selector.property().expect("step-output selector has a property");
            let outputs = referred_block.outputs(referred_step)?;
            outputs
                .into_iter()
                .find(|output| output.name == output_property)
                .map(|output| output.kinds)
                .ok_or_else(|| CompileError::InvalidReferenceError {
                    selector: selector.to_string(),
                    message: format!(
                        "step '{referred_step_name}' does not declare an output named '{output_property}'"
                    ),
                    context: vec![],
                })?
        };

        validate_reference_types(
            &expected,
            &actual,
            EdgeContext {
                consumer_step: &step.name,
                property,
                selector: &selector.to_string(),
            },
        )?;

        graph.inner.add_edge(target_idx, step_idx, EdgeKind::Data);
    }

    Ok(())
}

fn add_edge_for_output(
    graph: &mut ExecutionGraph,
    output: &crate::definition::OutputDefinition,
) -> CompileResult<()> {
    let output_id = output_node_id(&output.name);
    let output_idx = require_node(graph, &output_id)?;
    let source_id = output.selector.target_step_or_input_id();
    let source_idx = require_node(graph, &source_id)?;
    graph.inner.add_edge(source_idx, output_idx, EdgeKind::Data);
    Ok(())
}
