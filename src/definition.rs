//! Definition Parser (spec §4, §6): normalizes workflow JSON into
//! `{inputs[], steps[], outputs[]}`.

use std::collections::{BTreeMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::error::{CompileError, CompileResult};
use crate::kind::Kind;
use crate::selector::Selector;

/// One declared workflow input: `{name, kind}`.
#[derive(Debug, Clone)]
pub struct InputDefinition {
    pub name: String,
    pub kind: Kind,
}

/// A step manifest field's value: either a literal JSON value or a
/// reference to another node in the graph.
#[derive(Debug, Clone)]
pub enum FieldValue {
    Literal(Value),
    Selector(Selector),
}

/// One declared step: `{name, manifest_type_id, field_values}`.
#[derive(Debug, Clone)]
pub struct StepDefinition {
    pub name: String,
    pub manifest_type_id: String,
    /// A `BTreeMap` rather than a `HashMap` so property iteration order
    /// (alphabetical by name) is stable across runs — needed for
    /// `compile(D) = compile(D)` (spec §8).
    pub fields: BTreeMap<String, FieldValue>,
}

impl StepDefinition {
    /// Every field whose value is a selector, in field-declaration order
    /// (stable, since `fields` is populated by iterating the JSON array).
    pub fn selector_fields(&self) -> impl Iterator<Item = (&str, &Selector)> {
        self.fields.iter().filter_map(|(property, value)| match value {
            FieldValue::Selector(selector) => Some((property.as_str(), selector)),
            FieldValue::Literal(_) => None,
        })
    }
}

/// One declared workflow output: `{name, selector}`.
#[derive(Debug, Clone)]
pub struct OutputDefinition {
    pub name: String,
    pub selector: Selector,
}

/// A normalized, parsed workflow definition.
#[derive(Debug, Clone)]
pub struct WorkflowDefinition {
    pub inputs: Vec<InputDefinition>,
    pub steps: Vec<StepDefinition>,
    pub outputs: Vec<OutputDefinition>,
}

#[derive(Debug, Deserialize)]
struct RawWorkflowDefinition {
    #[serde(default)]
    inputs: Vec<RawInput>,
    #[serde(default)]
    steps: Vec<RawStep>,
    #[serde(default)]
    outputs: Vec<RawOutput>,
}

#[derive(Debug, Deserialize)]
struct RawInput {
    name: String,
    kind: String,
}

#[derive(Debug, Deserialize)]
struct RawStep {
    name: String,
    #[serde(rename = "type")]
    manifest_type_id: String,
    #[serde(flatten)]
    fields: serde_json::Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct RawOutput {
    name: String,
    selector: String,
}

/// Parses and normalizes a workflow definition from its JSON text form.
pub fn parse_definition(json_text: &str) -> CompileResult<WorkflowDefinition> {
    let raw: RawWorkflowDefinition =
        serde_json::from_str(json_text).map_err(|error| CompileError::DefinitionError {
            message: format!("workflow JSON does not match the expected shape: {error}"),
            context: vec![],
        })?;

    let mut seen_input_names = HashSet::new();
    let mut inputs = Vec::with_capacity(raw.inputs.len());
    for raw_input in raw.inputs {
        if !seen_input_names.insert(raw_input.name.clone()) {
            return Err(CompileError::DefinitionError {
                message: format!("duplicate input name '{}'", raw_input.name),
                context: vec![],
            });
        }
        inputs.push(InputDefinition {
            name: raw_input.name,
            kind: Kind::new(raw_input.kind),
        });
    }

    let mut seen_step_names = HashSet::new();
    let mut steps = Vec::with_capacity(raw.steps.len());
    for raw_step in raw.steps {
        if !seen_step_names.insert(raw_step.name.clone()) {
            return Err(CompileError::DefinitionError {
                message: format!("duplicate step name '{}'", raw_step.name),
                context: vec![],
            });
        }
        let mut fields = BTreeMap::new();
        for (property, value) in raw_step.fields {
            let field_value = match &value {
                Value::String(text) if Selector::parse(text).is_some() => {
                    FieldValue::Selector(Selector::parse(text).expect("checked above"))
                }
                _ => FieldValue::Literal(value),
            };
            fields.insert(property, field_value);
        }
        steps.push(StepDefinition {
            name: raw_step.name,
            manifest_type_id: raw_step.manifest_type_id,
            fields,
        });
    }

    let mut seen_output_names = HashSet::new();
    let mut outputs = Vec::with_capacity(raw.outputs.len());
    for raw_output in raw.outputs {
        if !seen_output_names.insert(raw_output.name.clone()) {
            return Err(CompileError::DefinitionError {
                message: format!("duplicate output name '{}'", raw_output.name),
                context: vec![],
            });
        }
        let selector = Selector::parse(&raw_output.selector).ok_or_else(|| {
            CompileError::DefinitionError {
                message: format!(
                    "output '{}' has an invalid selector '{}'",
                    raw_output.name, raw_output.selector
                ),
                context: vec![],
            }
        })?;
        outputs.push(OutputDefinition {
            name: raw_output.name,
            selector,
        });
    }

    Ok(WorkflowDefinition { inputs, steps, outputs })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_minimal_definition() {
        let json = r#"{
            "inputs": [{"name": "img", "kind": "image"}],
            "steps": [{"name": "det", "type": "detector", "image": "$inputs.img"}],
            "outputs": [{"name": "result", "selector": "$steps.det.preds"}]
        }"#;
        let definition = parse_definition(json).unwrap();
        assert_eq!(definition.inputs.len(), 1);
        assert_eq!(definition.steps.len(), 1);
        assert_eq!(definition.outputs.len(), 1);
        let step = &definition.steps[0];
        assert!(matches!(step.fields.get("image"), Some(FieldValue::Selector(_))));
    }

    #[test]
    fn rejects_duplicate_step_names() {
        let json = r#"{
            "inputs": [],
            "steps": [
                {"name": "a", "type": "t"},
                {"name": "a", "type": "t"}
            ],
            "outputs": []
        }"#;
        assert!(matches!(parse_definition(json), Err(CompileError::DefinitionError { .. })));
    }

    #[test]
    fn rejects_malformed_output_selector() {
        let json = r#"{
            "inputs": [],
            "steps": [],
            "outputs": [{"name": "o", "selector": "not-a-selector"}]
        }"#;
        assert!(matches!(parse_definition(json), Err(CompileError::DefinitionError { .. })));
    }
}
