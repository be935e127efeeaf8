//! End-to-end scenarios exercising the public `compile` entry point
//! against small in-memory block registries.

use std::sync::Arc;

use visionflow_compiler::error::CompileError;
use visionflow_compiler::kind::Kind;
use visionflow_compiler::registry::{BlockDescriptor, OutputDef, Registry};
use visionflow_compiler::schema::{
    parse_manifest_schema, ManifestSchema, RawAllowedReference, RawFieldKind, RawPropertySchema,
    SelectedElement,
};
use visionflow_compiler::{compile, CompilerOptions};

/// A block whose single declared output always has the same kind,
/// regardless of the manifest it's asked about — sufficient for every
/// scenario here, none of which needs manifest-sensitive outputs.
struct FixedOutputBlock {
    manifest_type_id: &'static str,
    schema: ManifestSchema,
    output_kind: Option<&'static str>,
}

impl BlockDescriptor for FixedOutputBlock {
    fn manifest_type_id(&self) -> &str {
        self.manifest_type_id
    }

    fn schema(&self) -> &ManifestSchema {
        &self.schema
    }

    fn outputs(
        &self,
        _manifest: &visionflow_compiler::definition::StepDefinition,
    ) -> visionflow_compiler::error::CompileResult<Vec<OutputDef>> {
        match self.output_kind {
            Some(kind) => Ok(vec![OutputDef { name: "out".into(), kinds: [Kind::new(kind)].into_iter().collect() }]),
            None => Ok(vec![]),
        }
    }

    fn declared_outputs(&self) -> Vec<OutputDef> {
        match self.output_kind {
            Some(kind) => vec![OutputDef { name: "out".into(), kinds: [Kind::new(kind)].into_iter().collect() }],
            None => vec![],
        }
    }
}

fn input_selector_property(name: &str, kind: &str) -> RawPropertySchema {
    RawPropertySchema {
        name: name.into(),
        field: RawFieldKind::Selector(vec![RawAllowedReference {
            selected_element: SelectedElement::Input,
            kinds: vec![kind.to_string()],
        }]),
    }
}

fn step_output_selector_property(name: &str, kind: &str) -> RawPropertySchema {
    RawPropertySchema {
        name: name.into(),
        field: RawFieldKind::Selector(vec![RawAllowedReference {
            selected_element: SelectedElement::StepOutput,
            kinds: vec![kind.to_string()],
        }]),
    }
}

fn step_selector_property(name: &str) -> RawPropertySchema {
    RawPropertySchema {
        name: name.into(),
        field: RawFieldKind::Selector(vec![RawAllowedReference {
            selected_element: SelectedElement::Step,
            kinds: vec!["*".into()],
        }]),
    }
}

fn block(
    manifest_type_id: &'static str,
    properties: Vec<RawPropertySchema>,
    output_kind: Option<&'static str>,
) -> Arc<dyn BlockDescriptor> {
    let schema = parse_manifest_schema(manifest_type_id, &properties, &Default::default()).unwrap();
    Arc::new(FixedOutputBlock { manifest_type_id, schema, output_kind })
}

#[test]
fn scenario_1_linear_well_typed_compiles() {
    let registry = Registry::new(vec![block(
        "detector",
        vec![input_selector_property("image", "Image")],
        Some("Detections"),
    )]);
    let json = r#"{
        "inputs": [{"name": "img", "kind": "Image"}],
        "steps": [{"name": "det", "type": "detector", "image": "$inputs.img"}],
        "outputs": [{"name": "result", "selector": "$steps.det.out"}]
    }"#;

    let plan = compile(json, &registry, CompilerOptions::default()).expect("should compile");

    assert_eq!(plan.steps.len(), 1);
    let det = &plan.steps[0];
    assert_eq!(det.name, "$steps.det");
    assert_eq!(det.data_parents, vec!["$inputs.img".to_string()]);
    assert!(plan.outputs.contains_key("out.result"));
}

#[test]
fn scenario_2_type_mismatch_is_rejected() {
    let registry = Registry::new(vec![block(
        "detector",
        vec![input_selector_property("image", "Image")],
        Some("Detections"),
    )]);
    let json = r#"{
        "inputs": [{"name": "n", "kind": "Integer"}],
        "steps": [{"name": "det", "type": "detector", "image": "$inputs.n"}],
        "outputs": [{"name": "result", "selector": "$steps.det.out"}]
    }"#;

    match compile(json, &registry, CompilerOptions::default()) {
        Err(CompileError::TypeMismatchError { property, expected_kinds, actual_kinds, .. }) => {
            assert_eq!(property, "image");
            assert_eq!(expected_kinds, vec![Kind::new("Image")]);
            assert_eq!(actual_kinds, vec![Kind::new("Integer")]);
        }
        other => panic!("expected TypeMismatchError, got {other:?}"),
    }
}

#[test]
fn scenario_3_cycle_is_rejected() {
    let registry = Registry::new(vec![block(
        "node",
        vec![step_output_selector_property("x", "Y")],
        Some("Y"),
    )]);
    let json = r#"{
        "inputs": [],
        "steps": [
            {"name": "a", "type": "node", "x": "$steps.b.out"},
            {"name": "b", "type": "node", "x": "$steps.a.out"}
        ],
        "outputs": []
    }"#;

    let result = compile(json, &registry, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::CycleError { .. })));
}

#[test]
fn scenario_4_dangling_branch_names_the_offending_step() {
    let registry = Registry::new(vec![block(
        "pass",
        vec![input_selector_property("image", "Image")],
        Some("Image"),
    )]);
    let json = r#"{
        "inputs": [{"name": "img", "kind": "Image"}],
        "steps": [
            {"name": "aux", "type": "pass", "image": "$inputs.img"},
            {"name": "main", "type": "pass", "image": "$inputs.img"}
        ],
        "outputs": [{"name": "result", "selector": "$steps.main.out"}]
    }"#;

    match compile(json, &registry, CompilerOptions::default()) {
        Err(CompileError::DanglingBranchError { nodes, .. }) => {
            assert!(nodes.contains(&"$steps.aux".to_string()));
        }
        other => panic!("expected DanglingBranchError, got {other:?}"),
    }
}

#[test]
fn scenario_4b_dangling_step_with_zero_outputs_is_a_legitimate_terminal() {
    let registry = Registry::new(vec![
        block("pass", vec![input_selector_property("image", "Image")], Some("Image")),
        block("verifier", vec![input_selector_property("image", "Image")], None),
    ]);
    let json = r#"{
        "inputs": [{"name": "img", "kind": "Image"}],
        "steps": [
            {"name": "aux", "type": "verifier", "image": "$inputs.img"},
            {"name": "main", "type": "pass", "image": "$inputs.img"}
        ],
        "outputs": [{"name": "result", "selector": "$steps.main.out"}]
    }"#;

    let plan = compile(json, &registry, CompilerOptions::default()).expect("should compile");
    assert_eq!(plan.steps.len(), 2);
}

#[test]
fn scenario_5_branch_clash_hazard_one_same_gate_selects_both_branches() {
    let registry = Registry::new(vec![
        block("ifgate", vec![step_selector_property("step_if_true"), step_selector_property("step_if_false")], None),
        block("source", vec![], Some("T")),
        block("passthrough", vec![step_output_selector_property("x", "T")], Some("T")),
        block(
            "merge",
            vec![step_output_selector_property("x", "T"), step_output_selector_property("y", "T")],
            Some("T"),
        ),
    ]);
    // Mirrors the spec's named scenario: `if(cond) -> step_if_true=B,
    // step_if_false=E`; `C(x=$steps.B.y)`, `F(x=$steps.E.y)`,
    // `G(x=$steps.C.y, y=$steps.F.y)`.
    let json = r#"{
        "inputs": [],
        "steps": [
            {"name": "src", "type": "source"},
            {"name": "gate", "type": "ifgate", "step_if_true": "$steps.B", "step_if_false": "$steps.E"},
            {"name": "B", "type": "passthrough", "x": "$steps.src.out"},
            {"name": "E", "type": "passthrough", "x": "$steps.src.out"},
            {"name": "C", "type": "passthrough", "x": "$steps.B.out"},
            {"name": "F", "type": "passthrough", "x": "$steps.E.out"},
            {"name": "G", "type": "merge", "x": "$steps.C.out", "y": "$steps.F.out"}
        ],
        "outputs": [{"name": "result", "selector": "$steps.G.out"}]
    }"#;

    match compile(json, &registry, CompilerOptions::default()) {
        Err(CompileError::BranchesClashError { node, .. }) => {
            assert_eq!(node, "$steps.G");
        }
        other => panic!("expected BranchesClashError on G, got {other:?}"),
    }
}

#[test]
fn scenario_6_branch_clash_hazard_two_independent_gates_merge() {
    let registry = Registry::new(vec![
        block("ifgate", vec![step_selector_property("branch")], None),
        block("passthrough", vec![step_output_selector_property("x", "T")], Some("T")),
        block(
            "merge",
            vec![step_output_selector_property("x", "T"), step_output_selector_property("y", "T")],
            Some("T"),
        ),
        block("source", vec![], Some("T")),
    ]);
    let json = r#"{
        "inputs": [],
        "steps": [
            {"name": "src", "type": "source"},
            {"name": "gate1", "type": "ifgate", "branch": "$steps.branchA"},
            {"name": "gate2", "type": "ifgate", "branch": "$steps.branchB"},
            {"name": "branchA", "type": "passthrough", "x": "$steps.src.out"},
            {"name": "branchB", "type": "passthrough", "x": "$steps.src.out"},
            {"name": "merged", "type": "merge", "x": "$steps.branchA.out", "y": "$steps.branchB.out"}
        ],
        "outputs": [{"name": "result", "selector": "$steps.merged.out"}]
    }"#;

    let result = compile(json, &registry, CompilerOptions::default());
    assert!(matches!(result, Err(CompileError::BranchesClashError { .. })), "got {result:?}");
}
