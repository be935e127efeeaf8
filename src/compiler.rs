//! Top-level compiler entry point (spec §3, §4, §6): wires the parser,
//! graph constructor, structural validator, and plan builder into the
//! single public `compile` call.

use log::info;

use crate::definition::parse_definition;
use crate::error::CompileResult;
use crate::graph::construct_graph;
use crate::plan::{build_plan, CompiledPlan};
use crate::registry::Registry;
use crate::structural::{validate_structure, StructuralCheckOptions};

/// Tunable compiler behavior (spec §A.3). `skip_branch_isolation` exists
/// for tooling that wants a best-effort graph even when branch isolation
/// would reject it (e.g. an editor's live preview) — production
/// compilation should always leave it `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerOptions {
    pub skip_branch_isolation: bool,
}

impl From<CompilerOptions> for StructuralCheckOptions {
    fn from(options: CompilerOptions) -> Self {
        StructuralCheckOptions { skip_branch_isolation: options.skip_branch_isolation }
    }
}

/// Compiles workflow JSON against a block registry into a [`CompiledPlan`].
///
/// Pipeline: parse the definition, construct the execution graph
/// (type-checking every data edge as it's added), validate the graph's
/// structural invariants, then reduce it to a plan. Each stage can only
/// run once the previous stage has fully succeeded — there's no partial
/// plan on error.
pub fn compile(
    definition_json: &str,
    registry: &Registry,
    options: CompilerOptions,
) -> CompileResult<CompiledPlan> {
    info!("compiling workflow definition ({} bytes)", definition_json.len());

    let definition = parse_definition(definition_json)?;
    info!(
        "parsed definition: {} inputs, {} steps, {} outputs",
        definition.inputs.len(),
        definition.steps.len(),
        definition.outputs.len()
    );

    let graph = construct_graph(&definition, registry)?;
    info!("constructed execution graph with {} nodes", graph.node_count());

    validate_structure(&graph, options.into())?;
    info!("structural validation passed");

    let plan = build_plan(&graph);
    info!("compiled plan with {} steps", plan.steps.len());

    Ok(plan)
}
