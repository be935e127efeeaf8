//! Kind: the named type tag used at every selector endpoint.
//!
//! Two kinds are compatible iff they share a name or either is the
//! wildcard kind. The wildcard is data, not a special case baked into
//! every comparison site — see [`Kind::is_wildcard`].

use std::collections::HashSet;
use std::fmt;

use serde::{Deserialize, Serialize};

/// The sentinel kind name that matches any other kind in both directions.
pub const WILDCARD_KIND_NAME: &str = "*";

/// A named type tag (e.g. `integer`, `batch_of_object_detection_prediction`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Kind(String);

impl Kind {
    pub fn new(name: impl Into<String>) -> Self {
        Kind(name.into())
    }

    pub fn wildcard() -> Self {
        Kind(WILDCARD_KIND_NAME.to_string())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.0 == WILDCARD_KIND_NAME
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Kind {
    fn from(value: &str) -> Self {
        Kind::new(value)
    }
}

impl From<String> for Kind {
    fn from(value: String) -> Self {
        Kind(value)
    }
}

/// A set of kinds, as declared on a producer output or a consumer's
/// allowed-reference list.
pub type KindSet = HashSet<Kind>;

/// I3 / §4.4 compatibility rule: `actual ∩ expected ≠ ∅`, with wildcard on
/// either side short-circuiting to "compatible".
pub fn kinds_compatible(actual: &KindSet, expected: &KindSet) -> bool {
    if actual.iter().any(Kind::is_wildcard) || expected.iter().any(Kind::is_wildcard) {
        return true;
    }
    actual.intersection(expected).next().is_some()
}
