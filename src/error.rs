//! Structured compile-time error taxonomy (spec §7).
//!
//! Every variant carries the offending node ids/selectors and, where
//! applicable, expected/actual kinds. Errors accumulate a `context` chain
//! as they propagate (outermost frame pushed last), the same shape the
//! teacher's hand-rolled `DslError` used, but derived through `thiserror`
//! instead of a manual `Display` impl.

use std::fmt;

use thiserror::Error;

use crate::kind::Kind;

pub type CompileResult<T> = Result<T, CompileError>;

#[derive(Debug, Error)]
pub enum CompileError {
    /// A block's manifest schema is malformed: an empty allowed-reference
    /// set, or a reference to an unknown kind.
    #[error("schema error: {message}{}", format_context(.context))]
    SchemaError { message: String, context: Vec<String> },

    /// The workflow JSON violates its own shape (missing fields, wrong
    /// selector grammar, duplicate names, etc).
    #[error("definition error: {message}{}", format_context(.context))]
    DefinitionError { message: String, context: Vec<String> },

    /// A selector points to an input/step/property that does not exist.
    #[error("invalid reference: {selector} ({message}){}", format_context(.context))]
    InvalidReferenceError {
        selector: String,
        message: String,
        context: Vec<String>,
    },

    /// Producer kinds and consumer allowed kinds are disjoint at an edge.
    #[error(
        "type mismatch on step '{consumer}' property '{property}' (selector {selector}): expected one of {expected:?}, got {actual:?}{}",
        format_context(.context)
    )]
    TypeMismatchError {
        consumer: String,
        property: String,
        selector: String,
        expected_kinds: Vec<Kind>,
        actual_kinds: Vec<Kind>,
        context: Vec<String>,
    },

    /// A flow-control (pure step) reference was used on a property that
    /// does not declare `step` as an allowed selected element.
    #[error("structure error: {message}{}", format_context(.context))]
    StructureError { message: String, context: Vec<String> },

    /// The execution graph is cyclic.
    #[error("cycle detected: {nodes:?}{}", format_context(.context))]
    CycleError { nodes: Vec<String>, context: Vec<String> },

    /// One or more nodes cannot reach any terminal node.
    #[error("dangling branch: nodes {nodes:?} do not reach any terminal{}", format_context(.context))]
    DanglingBranchError { nodes: Vec<String>, context: Vec<String> },

    /// Branch-isolation violated (spec §4.5, hazard 1 or hazard 2).
    #[error("branches clash at '{node}': {message}{}", format_context(.context))]
    BranchesClashError {
        node: String,
        message: String,
        context: Vec<String>,
    },
}

impl CompileError {
    /// Appends one more frame of context, outermost call wins the last
    /// line — mirrors the teacher's `DslError::push_context`.
    pub fn push_context(mut self, msg: impl Into<String>) -> Self {
        match &mut self {
            CompileError::SchemaError { context, .. }
            | CompileError::DefinitionError { context, .. }
            | CompileError::InvalidReferenceError { context, .. }
            | CompileError::TypeMismatchError { context, .. }
            | CompileError::StructureError { context, .. }
            | CompileError::CycleError { context, .. }
            | CompileError::DanglingBranchError { context, .. }
            | CompileError::BranchesClashError { context, .. } => context.push(msg.into()),
        }
        self
    }
}

fn format_context(context: &[String]) -> String {
    struct Writer<'a>(&'a [String]);
    impl fmt::Display for Writer<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            for line in self.0 {
                write!(f, "\n  | {line}")?;
            }
            Ok(())
        }
    }
    Writer(context).to_string()
}
