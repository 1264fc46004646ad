//! Deep merge for layered YAML configuration documents.
//!
//! Talos machine configs are assembled from a base document plus an ordered
//! list of patches. Mappings merge key by key; every other value (scalars,
//! sequences, null) is replaced wholesale by the later writer.

use serde_yaml::{Mapping, Value};

/// Merge `patches` onto `base` in list order, returning a new document.
///
/// Neither `base` nor the patches are modified.
#[must_use]
pub fn deep_merge(base: &Value, patches: &[Value]) -> Value {
    let mut merged = base.clone();
    for patch in patches {
        merge_into(&mut merged, patch);
    }
    merged
}

/// Merge a single `patch` into `target` in place.
pub fn merge_into(target: &mut Value, patch: &Value) {
    match (target, patch) {
        (Value::Mapping(target), Value::Mapping(patch)) => {
            for (key, value) in patch {
                match target.get_mut(key) {
                    Some(existing) => merge_into(existing, value),
                    None => {
                        target.insert(key.clone(), value.clone());
                    }
                }
            }
        }
        (target, patch) => *target = patch.clone(),
    }
}

/// Build a document that holds `leaf` at `path`, e.g.
/// `at(&["machine", "network", "hostname"], "cp-1".into())`.
#[must_use]
pub fn at(path: &[&str], leaf: Value) -> Value {
    path.iter().rev().fold(leaf, |inner, key| {
        let mut mapping = Mapping::new();
        mapping.insert(Value::from(*key), inner);
        Value::Mapping(mapping)
    })
}

/// An empty mapping, the identity element for [`deep_merge`].
#[must_use]
pub fn empty() -> Value {
    Value::Mapping(Mapping::new())
}

/// Build a string-keyed mapping from `(key, value)` pairs.
#[must_use]
pub fn mapping<K, V, I>(entries: I) -> Value
where
    K: Into<String>,
    V: Into<Value>,
    I: IntoIterator<Item = (K, V)>,
{
    Value::Mapping(
        entries
            .into_iter()
            .map(|(k, v)| (Value::String(k.into()), v.into()))
            .collect(),
    )
}

/// Look up a nested key path, returning `None` as soon as a segment is missing.
#[must_use]
pub fn lookup<'a>(document: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(document, |value, key| value.get(*key))
}
