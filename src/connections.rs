//! Connection Discovery (spec §4.2): offline/tooling indices of
//! kind→producers and kind→consumers, plus the per-block compatibility
//! tables derived from them.

use std::collections::{BTreeMap, BTreeSet};

use crate::kind::{Kind, WILDCARD_KIND_NAME};
use crate::registry::Registry;
use crate::schema::SelectedElement;

/// One selector property a given kind is accepted by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct ConsumerProperty {
    pub block_type: String,
    pub property_name: String,
    pub selected_element: SelectedElementTag,
}

/// A serializable stand-in for `SelectedElement` (which itself carries no
/// data worth comparing beyond its tag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SelectedElementTag {
    Input,
    StepOutput,
    Step,
}

impl From<SelectedElement> for SelectedElementTag {
    fn from(value: SelectedElement) -> Self {
        match value {
            SelectedElement::Input => SelectedElementTag::Input,
            SelectedElement::StepOutput => SelectedElementTag::StepOutput,
            SelectedElement::Step => SelectedElementTag::Step,
        }
    }
}

/// The full set of discovered connections for a registry.
#[derive(Debug, Clone, Default)]
pub struct DiscoveredConnections {
    pub producers_by_kind: BTreeMap<Kind, BTreeSet<String>>,
    pub consumers_by_kind: BTreeMap<Kind, BTreeSet<ConsumerProperty>>,
}

impl DiscoveredConnections {
    /// Block-granularity compatibility table: for every block, which
    /// other blocks can feed at least one of its selector properties,
    /// restricted to consumer entries whose `selected_element` passes
    /// `filter`. Mixing flow-control and data consumers here is the one
    /// thing this reduction refuses to do silently — the filter is
    /// mandatory, not a default.
    pub fn block_wise_consumers(
        &self,
        filter: impl Fn(SelectedElementTag) -> bool,
    ) -> BTreeMap<String, BTreeSet<String>> {
        let mut result: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();
        for (kind, consumers) in &self.consumers_by_kind {
            let producers = match self.producers_by_kind.get(kind) {
                Some(producers) => producers,
                None => continue,
            };
            for consumer in consumers {
                if !filter(consumer.selected_element) {
                    continue;
                }
                result
                    .entry(consumer.block_type.clone())
                    .or_default()
                    .extend(producers.iter().cloned());
            }
        }
        result
    }
}

/// Computes the registry-wide connection indices (spec §4.2).
pub fn discover_connections(registry: &Registry) -> DiscoveredConnections {
    let mut producers_by_kind: BTreeMap<Kind, BTreeSet<String>> = BTreeMap::new();
    let mut consumers_by_kind: BTreeMap<Kind, BTreeSet<ConsumerProperty>> = BTreeMap::new();

    let wildcard = Kind::new(WILDCARD_KIND_NAME);

    for block in registry.list_blocks() {
        let block_type = block.manifest_type_id().to_string();

        // The wildcard kind maps to every block as a producer: any block
        // always satisfies a wildcard consumer.
        producers_by_kind.entry(wildcard.clone()).or_default().insert(block_type.clone());

        for output in block.declared_outputs() {
            for kind in output.kinds {
                producers_by_kind.entry(kind).or_default().insert(block_type.clone());
            }
        }

        for selector in block.schema().selectors.values() {
            for reference in &selector.allowed_references {
                let consumer = ConsumerProperty {
                    block_type: block_type.clone(),
                    property_name: selector.property_name.clone(),
                    selected_element: reference.selected_element.into(),
                };
                for kind in &reference.kinds {
                    consumers_by_kind.entry(kind.clone()).or_default().insert(consumer.clone());
                }
                // The wildcard kind also maps to every selector property:
                // a wildcard consumer accepts all producers.
                consumers_by_kind.entry(wildcard.clone()).or_default().insert(consumer.clone());
            }
        }
    }

    DiscoveredConnections { producers_by_kind, consumers_by_kind }
}
