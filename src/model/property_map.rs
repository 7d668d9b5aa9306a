//! PropertyMap: the key-value store on nodes and relations.

use std::collections::BTreeMap;
use super::Value;

/// A map of property names to values.
///
/// Ordered so that iteration, serialization and spill files are
/// deterministic.
pub type PropertyMap = BTreeMap<String, Value>;

/// Insert every key of `other` that `into` does not already have.
///
/// Existing values win; this is the first-seen merge used by dedup.
pub fn merge_missing(into: &mut PropertyMap, other: PropertyMap) {
    for (key, value) in other {
        into.entry(key).or_insert(value);
    }
}

/// Build a map from (key, value) pairs.
pub fn props<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> PropertyMap
where
    K: Into<String>,
    V: Into<Value>,
{
    pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_missing_keeps_existing() {
        let mut a = props([("name", "DNA binding")]);
        let b = props([("name", "other"), ("type", "molecular_function")]);
        merge_missing(&mut a, b);
        assert_eq!(a.get("name"), Some(&Value::from("DNA binding")));
        assert_eq!(a.get("type"), Some(&Value::from("molecular_function")));
    }
}
