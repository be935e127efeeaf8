//! Block Registry (spec §2.1, §6): the immutable catalog of available
//! block descriptors the compiler consumes from, and nothing else.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::error::CompileResult;
use crate::kind::KindSet;
use crate::schema::ManifestSchema;

/// One declared output of a block, as produced for a concrete step
/// instance.
#[derive(Debug, Clone)]
pub struct OutputDef {
    pub name: String,
    pub kinds: KindSet,
}

/// A block descriptor, as consumed from the registry: `{manifest_type_id,
/// schema, outputs(manifest)}`.
///
/// `outputs` is deliberately evaluated per concrete manifest instance, not
/// cached per block class — some blocks' output kinds depend on the
/// manifest's literal field values (e.g. a "parse as" block whose output
/// kind is chosen by a `target_kind` literal field), so it must be called
/// fresh for every step during type checking.
pub trait BlockDescriptor: Send + Sync {
    fn manifest_type_id(&self) -> &str;
    fn schema(&self) -> &ManifestSchema;
    fn outputs(&self, manifest: &crate::definition::StepDefinition) -> CompileResult<Vec<OutputDef>>;

    /// The block's static, manifest-independent output declaration
    /// (mirrors the original's `outputs_manifest` attribute). Connection
    /// discovery (§4.2) runs offline, with no concrete step instance to
    /// evaluate `outputs(manifest)` against, so it consults this instead.
    /// A block whose real output kind varies by manifest value should
    /// declare here the union of every kind it could possibly produce.
    fn declared_outputs(&self) -> Vec<OutputDef>;
}

impl fmt::Debug for dyn BlockDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockDescriptor")
            .field("manifest_type_id", &self.manifest_type_id())
            .finish()
    }
}

/// The immutable catalog of blocks available to the compiler.
#[derive(Clone, Default)]
pub struct Registry {
    blocks: BTreeMap<String, Arc<dyn BlockDescriptor>>,
}

impl Registry {
    pub fn new(blocks: Vec<Arc<dyn BlockDescriptor>>) -> Self {
        let blocks = blocks
            .into_iter()
            .map(|block| (block.manifest_type_id().to_string(), block))
            .collect();
        Registry { blocks }
    }

    pub fn list_blocks(&self) -> impl Iterator<Item = &Arc<dyn BlockDescriptor>> {
        self.blocks.values()
    }

    pub fn get(&self, manifest_type_id: &str) -> Option<&Arc<dyn BlockDescriptor>> {
        self.blocks.get(manifest_type_id)
    }

    /// The union of every kind mentioned anywhere in the registry (output
    /// kinds declared statically via schema, plus selector kinds) — used
    /// by the schema parser's "unknown kind" check and by connection
    /// discovery's wildcard population.
    pub fn known_kinds(&self) -> KindSet {
        let mut kinds = KindSet::new();
        for block in self.blocks.values() {
            for selector in block.schema().selectors.values() {
                for reference in &selector.allowed_references {
                    kinds.extend(reference.kinds.iter().cloned());
                }
            }
        }
        kinds
    }
}
