//! Deep merge engine — structural merge of nested JSON mappings.
//!
//! [`merge_into`] is the recursive worker used by log replay and item
//! updates; [`merge`] adds the whole-record semantics (absent patch keeps
//! the base, `null` patch means deletion).
//!
//! Merge rules, in order:
//!
//! - mapping × mapping → recursive per-key merge
//! - anything else in the patch fully replaces the base slot, including
//!   arrays (never element-wise merged) and explicit `null` (which
//!   overwrites the slot — distinct from an absent key, which leaves the
//!   base untouched)
//! - an empty mapping patch value is a no-op against an existing mapping,
//!   but an empty-but-present array or string replaces

use serde_json::Value;

/// Merge `patch` into `base` in place.
///
/// Patch values are moved into `base`; nothing is shared between the two
/// structures afterwards.
pub fn merge_into(base: &mut Value, patch: Value) {
    match (base, patch) {
        (Value::Object(base_map), Value::Object(patch_map)) => {
            for (key, patch_value) in patch_map {
                match base_map.get_mut(&key) {
                    Some(slot) if slot.is_object() && patch_value.is_object() => {
                        merge_into(slot, patch_value);
                    }
                    _ => {
                        base_map.insert(key, patch_value);
                    }
                }
            }
        }
        (slot, patch) => *slot = patch,
    }
}

/// Whole-record merge.
///
/// `None` patch returns `base` unchanged; a `null` patch yields `None`
/// (the record is deleted); any other patch is merged via [`merge_into`].
pub fn merge(base: Value, patch: Option<Value>) -> Option<Value> {
    match patch {
        None => Some(base),
        Some(Value::Null) => None,
        Some(patch) => {
            let mut merged = base;
            merge_into(&mut merged, patch);
            Some(merged)
        }
    }
}
