//! Hydration merge policy.
//!
//! Combines an incoming snapshot with the entries already held by a client:
//!
//! - keys only present on one side are kept as they are;
//! - objects present on both sides are merged key by key;
//! - for any other value present on both sides the existing one wins;
//! - arrays are never concatenated: the existing array replaces the incoming
//!   one wholesale, so repeated hydrations cannot accumulate duplicates.

use crate::cache::CacheSnapshot;
use serde_json::{Map, Value};

/// Merges an incoming snapshot into the existing cache contents.
///
/// The result keeps the incoming entry order; entries only the existing cache
/// holds are appended in their original order. Each entry is merged in place,
/// so the cost is linear in the size of both snapshots.
pub fn merge_snapshots(incoming: CacheSnapshot, existing: CacheSnapshot) -> CacheSnapshot {
    let mut merged = incoming.into_inner();
    merged.reserve(existing.len());
    for (id, current) in existing.into_inner() {
        match merged.get_mut(&id) {
            Some(slot) => *slot = merge_values(std::mem::take(slot), current),
            None => {
                merged.insert(id, current);
            }
        }
    }
    CacheSnapshot::from(merged)
}

/// Merges two JSON values with the existing value taking precedence.
pub fn merge_values(incoming: Value, existing: Value) -> Value {
    match (incoming, existing) {
        (Value::Object(incoming), Value::Object(existing)) => {
            Value::Object(merge_objects(incoming, existing))
        }
        (_, existing) => existing,
    }
}

fn merge_objects(mut incoming: Map<String, Value>, existing: Map<String, Value>) -> Map<String, Value> {
    for (key, current) in existing {
        match incoming.get_mut(&key) {
            Some(slot) => *slot = merge_values(std::mem::take(slot), current),
            None => {
                incoming.insert(key, current);
            }
        }
    }
    incoming
}
