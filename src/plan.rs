//! Compiled Plan (spec §4.6, §6): the evaluator-facing output of a
//! successful compilation — everything an execution engine needs without
//! ever re-deriving type or structural facts.

use std::collections::BTreeMap;

use petgraph::graph::NodeIndex;

use crate::graph::{ExecutionGraph, Node};
use crate::selector::Selector;

/// One step in topological execution order, with its resolved data
/// parents and flow-control branches already looked up.
#[derive(Debug, Clone)]
pub struct PlannedStep {
    pub name: String,
    pub manifest_type_id: String,
    pub is_flow_control: bool,
    /// Node ids this step reads data from, in field-declaration order.
    pub data_parents: Vec<String>,
    /// Node ids this step may redirect execution into.
    pub flow_control_successors: Vec<String>,
}

/// The final compiled artifact: a validated execution graph reduced to
/// what an evaluator actually needs to drive a run.
#[derive(Debug, Clone)]
pub struct CompiledPlan {
    /// Steps in a topological order consistent with both data and
    /// flow-control edges.
    pub steps: Vec<PlannedStep>,
    /// Declared workflow inputs, by name, to their expected kind.
    pub inputs: BTreeMap<String, crate::kind::Kind>,
    /// Declared workflow outputs, by name, to the selector that feeds
    /// them.
    pub outputs: BTreeMap<String, Selector>,
}

/// Reduces a validated [`ExecutionGraph`] into a [`CompiledPlan`].
/// Assumes `graph` has already passed `structural::validate_structure` —
/// this function does not re-check acyclicity.
pub fn build_plan(graph: &ExecutionGraph) -> CompiledPlan {
    let order = topological_step_order(graph);

    let mut steps = Vec::with_capacity(order.len());
    for idx in order {
        let node = graph.node(idx);
        if let Node::Step { id, manifest_type_id, is_flow_control, .. } = node {
            let data_parents = graph
                .step_data_parents(idx)
                .into_iter()
                .map(|parent_idx| graph.node(parent_idx).id().to_string())
                .collect();
            let flow_control_successors = graph
                .flow_control_successors(idx)
                .into_iter()
                .map(|succ_idx| graph.node(succ_idx).id().to_string())
                .collect();
            steps.push(PlannedStep {
                name: id.clone(),
                manifest_type_id: manifest_type_id.clone(),
                is_flow_control: *is_flow_control,
                data_parents,
                flow_control_successors,
            });
        }
    }

    let mut inputs = BTreeMap::new();
    let mut outputs = BTreeMap::new();
    for (_, node) in graph.nodes() {
        match node {
            Node::Input { id, kind } => {
                inputs.insert(id.clone(), kind.clone());
            }
            Node::Output { id, selector } => {
                outputs.insert(id.clone(), selector.clone());
            }
            Node::Step { .. } => {}
        }
    }

    CompiledPlan { steps, inputs, outputs }
}

/// A topological order over step nodes only, respecting both data and
/// flow-control edges (`petgraph::algo::toposort` over the full graph,
/// filtered down to steps, preserves this since every edge the order
/// must respect is still present in the underlying graph).
fn topological_step_order(graph: &ExecutionGraph) -> Vec<NodeIndex> {
    petgraph::algo::toposort(graph.inner(), None)
        .expect("caller must validate acyclicity before building a plan")
        .into_iter()
        .filter(|idx| graph.node(*idx).is_step())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::definition::parse_definition;
    use crate::kind::Kind;
    use crate::registry::{BlockDescriptor, OutputDef, Registry};
    use crate::schema::{parse_manifest_schema, RawAllowedReference, RawFieldKind, RawPropertySchema, SelectedElement};
    use std::sync::Arc;

    struct EchoBlock {
        manifest_type_id: String,
        schema: crate::schema::ManifestSchema,
    }

    impl BlockDescriptor for EchoBlock {
        fn manifest_type_id(&self) -> &str {
            &self.manifest_type_id
        }
        fn schema(&self) -> &crate::schema::ManifestSchema {
            &self.schema
        }
        fn outputs(&self, _manifest: &crate::definition::StepDefinition) -> crate::error::CompileResult<Vec<OutputDef>> {
            Ok(vec![OutputDef { name: "out".into(), kinds: [Kind::new("image")].into_iter().collect() }])
        }
        fn declared_outputs(&self) -> Vec<OutputDef> {
            vec![OutputDef { name: "out".into(), kinds: [Kind::new("image")].into_iter().collect() }]
        }
    }

    #[test]
    fn plan_orders_steps_topologically_and_resolves_parents() {
        let properties = vec![RawPropertySchema {
            name: "image".into(),
            field: RawFieldKind::Selector(vec![RawAllowedReference {
                selected_element: SelectedElement::Input,
                kinds: vec!["image".into()],
            }]),
        }];
        let det_schema = parse_manifest_schema("detector", &properties, &Default::default()).unwrap();
        let registry = Registry::new(vec![Arc::new(EchoBlock {
            manifest_type_id: "detector".into(),
            schema: det_schema,
        })]);

        let json = r#"{
            "inputs": [{"name": "img", "kind": "image"}],
            "steps": [{"name": "det", "type": "detector", "image": "$inputs.img"}],
            "outputs": [{"name": "result", "selector": "$steps.det.out"}]
        }"#;
        let definition = parse_definition(json).unwrap();
        let graph = crate::graph::construct_graph(&definition, &registry).unwrap();
        let plan = build_plan(&graph);

        assert_eq!(plan.steps.len(), 1);
        assert_eq!(plan.steps[0].name, "$steps.det");
        assert_eq!(plan.steps[0].data_parents, vec!["$inputs.img".to_string()]);
        assert!(plan.inputs.contains_key("$inputs.img"));
        assert!(plan.outputs.contains_key("out.result"));
    }
}
