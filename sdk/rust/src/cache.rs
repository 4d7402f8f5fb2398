//! Normalized entity cache.
//!
//! Every object carrying a `__typename` and an `id` (or `_id`) is stored once
//! under `Typename:id`; everywhere else it appears it is replaced by a
//! `{"__ref": "Typename:id"}` reference. Root fields of an operation live on
//! the `ROOT_QUERY` / `ROOT_MUTATION` entries.
//!
//! ```
//! use hgql_sdk::cache::{NormalizedCache, OperationKind};
//! use serde_json::json;
//!
//! let mut cache = NormalizedCache::new();
//! cache.write_result(
//!     OperationKind::Query,
//!     &json!({"post": {"__typename": "Post", "id": 1, "title": "A"}}),
//!     None,
//! );
//!
//! assert_eq!(cache.entity("Post:1").unwrap()["title"], "A");
//! assert_eq!(
//!     cache.read_field(OperationKind::Query, "post", None).unwrap()["title"],
//!     "A"
//! );
//! ```

use indexmap::IndexMap;
use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

/// Cache id of the query root.
pub const ROOT_QUERY: &str = "ROOT_QUERY";

/// Cache id of the mutation root.
pub const ROOT_MUTATION: &str = "ROOT_MUTATION";

/// Field name marking a normalized reference.
pub const REF_KEY: &str = "__ref";

/// Kind of operation whose result is being cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Query,
    Mutation,
}

impl OperationKind {
    /// Detects the operation kind from its source text.
    ///
    /// The first operation definition in the document decides. Comments,
    /// string literals and fragment definitions are skipped; the anonymous
    /// `{ ... }` shorthand and documents without any operation are queries.
    pub fn detect(source: &str) -> Self {
        let bytes = source.as_bytes();
        let mut depth = 0usize;
        // Inside the header or body of a non-operation definition.
        let mut in_definition = false;
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'#' => {
                    while i < bytes.len() && bytes[i] != b'\n' {
                        i += 1;
                    }
                    continue;
                }
                b'"' => {
                    i = skip_string(bytes, i);
                    continue;
                }
                b'{' if depth == 0 && !in_definition => return Self::Query,
                b'{' => depth += 1,
                b'}' => {
                    depth = depth.saturating_sub(1);
                    if depth == 0 {
                        in_definition = false;
                    }
                }
                c if depth == 0 && (c.is_ascii_alphabetic() || c == b'_') => {
                    let start = i;
                    while i < bytes.len() && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_') {
                        i += 1;
                    }
                    match &source[start..i] {
                        "mutation" if !in_definition => return Self::Mutation,
                        "query" | "subscription" if !in_definition => return Self::Query,
                        _ => in_definition = true,
                    }
                    continue;
                }
                _ => {}
            }
            i += 1;
        }
        Self::Query
    }

    /// Cache id of the root entity for this kind.
    pub const fn root_id(self) -> &'static str {
        match self {
            Self::Query => ROOT_QUERY,
            Self::Mutation => ROOT_MUTATION,
        }
    }

    const fn typename(self) -> &'static str {
        match self {
            Self::Query => "Query",
            Self::Mutation => "Mutation",
        }
    }
}

/// Returns the index just past the string literal starting at `start`.
fn skip_string(bytes: &[u8], start: usize) -> usize {
    const BLOCK: &[u8] = b"\"\"\"";
    if bytes[start..].starts_with(BLOCK) {
        let mut i = start + BLOCK.len();
        while i < bytes.len() {
            if bytes[i] == b'\\' && bytes[i + 1..].starts_with(BLOCK) {
                i += 1 + BLOCK.len();
            } else if bytes[i..].starts_with(BLOCK) {
                return i + BLOCK.len();
            } else {
                i += 1;
            }
        }
        return bytes.len();
    }

    let mut i = start + 1;
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'"' | b'\n' => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// Serializable point-in-time copy of a [`NormalizedCache`].
///
/// Serializes as a plain JSON object keyed by cache id, so it can be embedded
/// in page output and parsed back on the other side.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheSnapshot(IndexMap<String, Value>);

impl CacheSnapshot {
    /// Creates an empty snapshot.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads a snapshot out of an arbitrary JSON value.
    ///
    /// Returns `None` for anything that is not a JSON object.
    pub fn from_value(value: &Value) -> Option<Self> {
        value.as_object().map(|entries| {
            Self(
                entries
                    .iter()
                    .map(|(id, entity)| (id.clone(), entity.clone()))
                    .collect(),
            )
        })
    }

    /// Converts the snapshot into a JSON object.
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.0
                .iter()
                .map(|(id, entity)| (id.clone(), entity.clone()))
                .collect(),
        )
    }

    /// Inserts or replaces an entry.
    pub fn insert(&mut self, id: impl Into<String>, entity: Value) -> Option<Value> {
        self.0.insert(id.into(), entity)
    }

    /// Gets an entry by cache id.
    pub fn get(&self, id: &str) -> Option<&Value> {
        self.0.get(id)
    }

    /// Returns true if the snapshot holds the given cache id.
    pub fn contains(&self, id: &str) -> bool {
        self.0.contains_key(id)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over `(cache id, entry)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    pub fn into_inner(self) -> IndexMap<String, Value> {
        self.0
    }
}

impl FromIterator<(String, Value)> for CacheSnapshot {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl From<IndexMap<String, Value>> for CacheSnapshot {
    fn from(entries: IndexMap<String, Value>) -> Self {
        Self(entries)
    }
}

/// Computes the cache id of an object, if it is an identifiable entity.
pub fn identify(object: &Map<String, Value>) -> Option<String> {
    let typename = object.get("__typename")?.as_str()?;
    let id = object.get("id").or_else(|| object.get("_id"))?;
    match id {
        Value::String(id) => Some(format!("{typename}:{id}")),
        Value::Number(id) => Some(format!("{typename}:{id}")),
        _ => None,
    }
}

/// Name under which a root field is stored.
///
/// Operations with variables get them appended as canonical JSON so that
/// `posts(first: 10)` and `posts(first: 20)` do not overwrite each other.
pub fn store_field_name(field: &str, variables: Option<&Value>) -> String {
    match variables {
        Some(Value::Object(vars)) if !vars.is_empty() => {
            format!("{field}({})", Value::Object(vars.clone()))
        }
        _ => field.to_string(),
    }
}

fn reference_id(value: &Value) -> Option<&str> {
    match value {
        Value::Object(object) if object.len() == 1 => object.get(REF_KEY)?.as_str(),
        _ => None,
    }
}

/// In-memory normalized cache.
#[derive(Debug, Clone, Default)]
pub struct NormalizedCache {
    entries: IndexMap<String, Value>,
}

impl NormalizedCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copies the current contents into a snapshot.
    pub fn extract(&self) -> CacheSnapshot {
        CacheSnapshot(self.entries.clone())
    }

    /// Replaces the current contents with a snapshot.
    pub fn restore(&mut self, snapshot: CacheSnapshot) {
        self.entries = snapshot.0;
    }

    /// Gets a stored entry (entity or root) by cache id.
    pub fn entity(&self, id: &str) -> Option<&Value> {
        self.entries.get(id)
    }

    /// Number of stored entries, roots included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Normalizes an operation result into the cache.
    ///
    /// Returns the number of entity writes performed. Non-object `data` is
    /// ignored.
    pub fn write_result(
        &mut self,
        kind: OperationKind,
        data: &Value,
        variables: Option<&Value>,
    ) -> usize {
        let Some(fields) = data.as_object() else {
            return 0;
        };

        let mut written = 0;
        let mut root = Map::new();
        root.insert("__typename".into(), Value::from(kind.typename()));
        for (field, value) in fields {
            let normalized = self.normalize(value, &mut written);
            root.insert(store_field_name(field, variables), normalized);
        }
        self.merge_entity(kind.root_id(), root);
        written
    }

    /// Reads a root field back, resolving references.
    ///
    /// Returns `None` if the field was never written.
    pub fn read_field(
        &self,
        kind: OperationKind,
        field: &str,
        variables: Option<&Value>,
    ) -> Option<Value> {
        let root = self.entries.get(kind.root_id())?.as_object()?;
        let value = root.get(&store_field_name(field, variables))?;
        let mut path = FxHashSet::default();
        Some(self.denormalize(value, &mut path))
    }

    fn normalize(&mut self, value: &Value, written: &mut usize) -> Value {
        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.normalize(item, written))
                    .collect(),
            ),
            Value::Object(object) => {
                let fields: Map<String, Value> = object
                    .iter()
                    .map(|(key, field)| (key.clone(), self.normalize(field, written)))
                    .collect();
                match identify(object) {
                    Some(id) => {
                        self.merge_entity(&id, fields);
                        *written += 1;
                        json!({ REF_KEY: id })
                    }
                    None => Value::Object(fields),
                }
            }
            other => other.clone(),
        }
    }

    fn merge_entity(&mut self, id: &str, fields: Map<String, Value>) {
        match self.entries.get_mut(id) {
            Some(Value::Object(existing)) => existing.extend(fields),
            _ => {
                self.entries.insert(id.to_string(), Value::Object(fields));
            }
        }
    }

    fn denormalize(&self, value: &Value, path: &mut FxHashSet<String>) -> Value {
        if let Some(id) = reference_id(value) {
            // Cycles (Post.author.posts) stop at the reference.
            if path.contains(id) {
                return value.clone();
            }
            let Some(entity) = self.entries.get(id) else {
                return Value::Null;
            };
            path.insert(id.to_string());
            let resolved = self.denormalize(entity, path);
            path.remove(id);
            return resolved;
        }

        match value {
            Value::Array(items) => Value::Array(
                items
                    .iter()
                    .map(|item| self.denormalize(item, path))
                    .collect(),
            ),
            Value::Object(object) => Value::Object(
                object
                    .iter()
                    .map(|(key, field)| (key.clone(), self.denormalize(field, path)))
                    .collect(),
            ),
            other => other.clone(),
        }
    }
}
