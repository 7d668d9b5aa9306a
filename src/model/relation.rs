//! Relation (directed, typed edge) in the property graph.

use serde::{Deserialize, Serialize};
use super::{Grounding, PropertyMap, Value};

/// Traversal direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

/// A relation between two groundings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    pub source: Grounding,
    pub target: Grounding,
    pub relation_type: String,
    pub properties: PropertyMap,
}

impl Relation {
    pub fn new(
        source: impl Into<Grounding>,
        target: impl Into<Grounding>,
        relation_type: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            relation_type: relation_type.into(),
            properties: PropertyMap::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn with_properties(mut self, properties: PropertyMap) -> Self {
        self.properties.extend(properties);
        self
    }
}
