//! Schema Parser (spec §4.1).
//!
//! Input: one block's manifest schema, expressed as a small closed set of
//! tagged variants rather than a generic reflected/dynamic shape — block
//! authors declare which of their manifest's properties are selector
//! fields, and for each one, which reference kinds and which selected
//! elements (`input`, `step_output`, `step`) are allowed.
//!
//! Output: `{ selectors: map<property_name, SelectorSpec>, literal_fields }`.

use std::collections::{HashMap, HashSet};

use crate::error::{CompileError, CompileResult};
use crate::kind::{Kind, KindSet};

/// Which kind of graph element a selector is allowed to point at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SelectedElement {
    Input,
    StepOutput,
    /// Marks a flow-control reference: the consumer redirects execution.
    Step,
}

/// One declared `{selected_element, kinds}` pair for a selector property.
#[derive(Debug, Clone)]
pub struct AllowedReference {
    pub selected_element: SelectedElement,
    pub kinds: KindSet,
}

/// A selector field's full declaration, as authored by a block.
#[derive(Debug, Clone)]
pub struct SelectorSpec {
    pub property_name: String,
    pub allowed_references: Vec<AllowedReference>,
}

impl SelectorSpec {
    /// Union of kinds across every allowed reference whose selected
    /// element matches `element` — this is the "expected kinds" term of
    /// §4.4's type-checking rule.
    pub fn kinds_for(&self, element: SelectedElement) -> KindSet {
        self.allowed_references
            .iter()
            .filter(|reference| reference.selected_element == element)
            .flat_map(|reference| reference.kinds.iter().cloned())
            .collect()
    }

    /// `true` iff this property permits a pure step (flow-control)
    /// reference at all.
    pub fn allows_flow_control(&self) -> bool {
        self.allowed_references
            .iter()
            .any(|reference| reference.selected_element == SelectedElement::Step)
    }
}

/// The parsed manifest schema of one block: which properties are
/// selectors (with their allowed references) and which are plain literal
/// fields.
#[derive(Debug, Clone, Default)]
pub struct ManifestSchema {
    pub selectors: HashMap<String, SelectorSpec>,
    pub literal_fields: HashSet<String>,
}

impl ManifestSchema {
    pub fn selector(&self, property_name: &str) -> Option<&SelectorSpec> {
        self.selectors.get(property_name)
    }
}

/// Raw, author-declared shape of one manifest property — the input to
/// the schema parser, before it has been validated into a
/// [`ManifestSchema`].
#[derive(Debug, Clone)]
pub struct RawPropertySchema {
    pub name: String,
    pub field: RawFieldKind,
}

#[derive(Debug, Clone)]
pub enum RawFieldKind {
    Literal,
    Selector(Vec<RawAllowedReference>),
}

#[derive(Debug, Clone)]
pub struct RawAllowedReference {
    pub selected_element: SelectedElement,
    pub kinds: Vec<String>,
}

/// Parses a block's raw manifest schema (its list of properties) into a
/// [`ManifestSchema`].
///
/// `known_kinds` is the registry-wide set of kinds every block is allowed
/// to reference; a schema that declares a kind outside this set is
/// malformed. Pass an empty set to skip this check entirely (e.g. while
/// parsing a schema in isolation, before the registry is fully built).
pub fn parse_manifest_schema(
    manifest_type_id: &str,
    properties: &[RawPropertySchema],
    known_kinds: &KindSet,
) -> CompileResult<ManifestSchema> {
    let mut schema = ManifestSchema::default();
    for property in properties {
        match &property.field {
            RawFieldKind::Literal => {
                schema.literal_fields.insert(property.name.clone());
            }
            RawFieldKind::Selector(raw_references) => {
                if raw_references.is_empty() {
                    return Err(CompileError::SchemaError {
                        message: format!(
                            "property '{}' on block '{manifest_type_id}' declares a selector field with an empty allowed-references set",
                            property.name
                        ),
                        context: vec![],
                    });
                }
                let mut allowed_references = Vec::with_capacity(raw_references.len());
                for raw_reference in raw_references {
                    let kinds: KindSet = raw_reference
                        .kinds
                        .iter()
                        .map(|name| Kind::new(name.clone()))
                        .collect();
                    if !known_kinds.is_empty() {
                        for kind in &kinds {
                            if !kind.is_wildcard() && !known_kinds.contains(kind) {
                                return Err(CompileError::SchemaError {
                                    message: format!(
                                        "property '{}' on block '{manifest_type_id}' references unknown kind '{kind}'",
                                        property.name
                                    ),
                                    context: vec![],
                                });
                            }
                        }
                    }
                    allowed_references.push(AllowedReference {
                        selected_element: raw_reference.selected_element,
                        kinds,
                    });
                }
                schema.selectors.insert(
                    property.name.clone(),
                    SelectorSpec {
                        property_name: property.name.clone(),
                        allowed_references,
                    },
                );
            }
        }
    }
    Ok(schema)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_empty_allowed_references() {
        let properties = vec![RawPropertySchema {
            name: "image".into(),
            field: RawFieldKind::Selector(vec![]),
        }];
        let result = parse_manifest_schema("detect", &properties, &KindSet::new());
        assert!(matches!(result, Err(CompileError::SchemaError { .. })));
    }

    #[test]
    fn rejects_unknown_kind_when_known_kinds_given() {
        let properties = vec![RawPropertySchema {
            name: "image".into(),
            field: RawFieldKind::Selector(vec![RawAllowedReference {
                selected_element: SelectedElement::Input,
                kinds: vec!["nonexistent".into()],
            }]),
        }];
        let known: KindSet = [Kind::new("image")].into_iter().collect();
        let result = parse_manifest_schema("detect", &properties, &known);
        assert!(matches!(result, Err(CompileError::SchemaError { .. })));
    }

    #[test]
    fn parses_literal_and_selector_fields() {
        let properties = vec![
            RawPropertySchema {
                name: "threshold".into(),
                field: RawFieldKind::Literal,
            },
            RawPropertySchema {
                name: "image".into(),
                field: RawFieldKind::Selector(vec![RawAllowedReference {
                    selected_element: SelectedElement::Input,
                    kinds: vec!["image".into()],
                }]),
            },
        ];
        let schema = parse_manifest_schema("detect", &properties, &KindSet::new()).unwrap();
        assert!(schema.literal_fields.contains("threshold"));
        assert!(schema.selector("image").is_some());
    }
}
