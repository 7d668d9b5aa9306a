//! Node in the property graph.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::{PropertyMap, Value};

/// Label most sources attach to every biological entity.
pub const BIO_ENTITY: &str = "BioEntity";

/// Ordered label set. Almost every node carries one or two labels.
pub type Labels = SmallVec<[String; 2]>;

/// A raw `(namespace, local_id)` pair as emitted by a source.
///
/// Not normalized: two groundings that differ only in spelling may
/// still name the same entity. See [`crate::identity`].
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Grounding {
    pub namespace: String,
    pub local_id: String,
}

impl Grounding {
    pub fn new(namespace: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self { namespace: namespace.into(), local_id: local_id.into() }
    }
}

impl fmt::Display for Grounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.namespace, self.local_id)
    }
}

impl<N: Into<String>, I: Into<String>> From<(N, I)> for Grounding {
    fn from((namespace, local_id): (N, I)) -> Self {
        Self::new(namespace, local_id)
    }
}

/// A node in the property graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub namespace: String,
    pub local_id: String,
    pub labels: Labels,
    pub properties: PropertyMap,
}

impl Node {
    pub fn new(namespace: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            local_id: local_id.into(),
            labels: Labels::new(),
            properties: PropertyMap::new(),
        }
    }

    /// A node carrying the `BioEntity` label.
    pub fn bio_entity(namespace: impl Into<String>, local_id: impl Into<String>) -> Self {
        Self::new(namespace, local_id).with_label(BIO_ENTITY)
    }

    pub fn with_labels(mut self, labels: impl IntoIterator<Item = impl Into<String>>) -> Self {
        for label in labels {
            self.push_label(label.into());
        }
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.push_label(label.into());
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn grounding(&self) -> Grounding {
        Grounding::new(self.namespace.clone(), self.local_id.clone())
    }

    /// Labels are a set; re-adding one keeps its first position.
    pub(crate) fn push_label(&mut self, label: String) {
        if !self.has_label(&label) {
            self.labels.push(label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_labels_are_a_set() {
        let node = Node::bio_entity("HGNC", "1100")
            .with_labels(["Gene", "BioEntity", "Gene"]);
        assert_eq!(node.labels.as_slice(), ["BioEntity", "Gene"]);
    }

    #[test]
    fn test_grounding() {
        let node = Node::new("GO", "0003677").with_property("name", "DNA binding");
        assert_eq!(node.grounding(), Grounding::new("GO", "0003677"));
        assert_eq!(node.grounding().to_string(), "GO:0003677");
        assert_eq!(node.get("name"), Some(&Value::from("DNA binding")));
    }
}
