//! Type Checker (spec §4.4): verifies producer/consumer kind compatibility
//! across a single data edge.

use crate::error::{CompileError, CompileResult};
use crate::kind::{kinds_compatible, Kind, KindSet};

/// The identifying context of one data edge, used only to build a
/// `TypeMismatchError` if the check fails.
pub struct EdgeContext<'a> {
    pub consumer_step: &'a str,
    pub property: &'a str,
    pub selector: &'a str,
}

/// `actual ∩ expected ≠ ∅` (wildcard matches everything on either side).
/// On failure, raises `TypeMismatchError` carrying both kind sets.
pub fn validate_reference_types(
    expected: &KindSet,
    actual: &KindSet,
    context: EdgeContext<'_>,
) -> CompileResult<()> {
    if kinds_compatible(actual, expected) {
        return Ok(());
    }
    let mut expected_kinds: Vec<Kind> = expected.iter().cloned().collect();
    expected_kinds.sort();
    let mut actual_kinds: Vec<Kind> = actual.iter().cloned().collect();
    actual_kinds.sort();
    Err(CompileError::TypeMismatchError {
        consumer: context.consumer_step.to_string(),
        property: context.property.to_string(),
        selector: context.selector.to_string(),
        expected_kinds,
        actual_kinds,
        context: vec![],
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(names: &[&str]) -> KindSet {
        names.iter().map(|n| Kind::new(*n)).collect()
    }

    #[test]
    fn compatible_kinds_pass() {
        let result = validate_reference_types(
            &set(&["image"]),
            &set(&["image"]),
            EdgeContext {
                consumer_step: "$steps.det",
                property: "image",
                selector: "$inputs.img",
            },
        );
        assert!(result.is_ok());
    }

    #[test]
    fn disjoint_kinds_raise_type_mismatch() {
        let result = validate_reference_types(
            &set(&["integer"]),
            &set(&["image"]),
            EdgeContext {
                consumer_step: "$steps.det",
                property: "image",
                selector: "$inputs.n",
            },
        );
        match result {
            Err(CompileError::TypeMismatchError { expected_kinds, actual_kinds, .. }) => {
                assert_eq!(expected_kinds, vec![Kind::new("image")]);
                assert_eq!(actual_kinds, vec![Kind::new("integer")]);
            }
            other => panic!("expected TypeMismatchError, got {other:?}"),
        }
    }
}
