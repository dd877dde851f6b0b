//! Local metadata layered onto remote entries.
//!
//! - **MetadataStore**: key-value side store addressed by scope and path
//! - **InMemoryMetadataStore**: simple `HashMap`-backed store for tests and tools
//! - **MetadataAugmenter**: adds stored keys to entries as `metadata::<key>`

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::info::{AttributeValue, FileInfo};
use crate::matcher::AttributeMatcher;

/// Namespace under which stored keys are exposed.
pub const METADATA_NAMESPACE: &str = "metadata";

/// A stored metadata value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MetaValue {
    /// Single string.
    String(String),
    /// List of strings.
    StringList(Vec<String>),
}

impl From<MetaValue> for AttributeValue {
    fn from(value: MetaValue) -> Self {
        match value {
            MetaValue::String(s) => AttributeValue::String(s),
            MetaValue::StringList(v) => AttributeValue::StringList(v),
        }
    }
}

/// Trait for looking up locally stored metadata.
///
/// Implementations are shared across enumerators and threads.
pub trait MetadataStore: Send + Sync {
    /// Visit every key stored for `path` within `scope`.
    ///
    /// # Parameters
    ///
    /// - `scope`: the store's partition, usually the mount the listing belongs to
    /// - `path`: absolute path of the file inside the mount
    /// - `visit`: called with each key and value; returning `false` stops the walk
    fn enumerate_keys(
        &self,
        scope: &str,
        path: &str,
        visit: &mut dyn FnMut(&str, &MetaValue) -> bool,
    );
}

/// In-memory metadata store keyed by scope, path and key.
///
/// State lives only as long as the process.
#[derive(Debug, Default)]
pub struct InMemoryMetadataStore {
    data: RwLock<HashMap<String, HashMap<String, Vec<(String, MetaValue)>>>>,
}

impl InMemoryMetadataStore {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set `key` on `path`, replacing any previous value.
    pub fn set(&self, scope: &str, path: &str, key: &str, value: MetaValue) {
        let mut data = self.data.write();
        let keys = data
            .entry(scope.to_string())
            .or_default()
            .entry(path.to_string())
            .or_default();
        match keys.iter_mut().find(|(k, _)| k == key) {
            Some((_, slot)) => *slot = value,
            None => keys.push((key.to_string(), value)),
        }
    }

    /// Remove `key` from `path`. Returns the previous value.
    pub fn remove(&self, scope: &str, path: &str, key: &str) -> Option<MetaValue> {
        let mut data = self.data.write();
        let keys = data.get_mut(scope)?.get_mut(path)?;
        let index = keys.iter().position(|(k, _)| k == key)?;
        Some(keys.remove(index).1)
    }

    /// Number of paths carrying at least one key.
    pub fn len(&self) -> usize {
        self.data
            .read()
            .values()
            .flat_map(|paths| paths.values())
            .filter(|keys| !keys.is_empty())
            .count()
    }

    /// Whether no path carries any key.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clear all stored metadata.
    pub fn clear(&self) {
        self.data.write().clear();
    }
}

impl MetadataStore for InMemoryMetadataStore {
    fn enumerate_keys(
        &self,
        scope: &str,
        path: &str,
        visit: &mut dyn FnMut(&str, &MetaValue) -> bool,
    ) {
        let data = self.data.read();
        let Some(keys) = data.get(scope).and_then(|paths| paths.get(path)) else {
            return;
        };
        for (key, value) in keys {
            if !visit(key, value) {
                break;
            }
        }
    }
}

/// Store binding resolved at enumerator creation.
struct BoundStore {
    scope: String,
    store: Arc<dyn MetadataStore>,
}

/// Adds locally stored metadata to entries at hand-off time.
pub(crate) struct MetadataAugmenter {
    matcher: AttributeMatcher,
    store: Option<BoundStore>,
    base_path: String,
}

impl MetadataAugmenter {
    /// Build an augmenter; the store is bound only if the matcher asks for
    /// metadata attributes.
    pub(crate) fn new(
        matcher: AttributeMatcher,
        store: Option<Arc<dyn MetadataStore>>,
        scope: &str,
        base_path: &str,
    ) -> Self {
        let store = store
            .filter(|_| matcher.covers_namespace(METADATA_NAMESPACE))
            .map(|store| BoundStore {
                scope: scope.to_string(),
                store,
            });
        Self {
            matcher,
            store,
            base_path: base_path.to_string(),
        }
    }

    /// Whether a metadata store is bound.
    pub(crate) fn has_store(&self) -> bool {
        self.store.is_some()
    }

    /// Add matching stored keys to `info`. Attributes sent by the daemon win.
    pub(crate) fn augment(&self, info: &mut FileInfo) {
        let Some(bound) = &self.store else {
            return;
        };
        let Some(name) = info.name() else {
            tracing::trace!("entry without name, skipping metadata");
            return;
        };
        let path = join_path(&self.base_path, name);

        let mut found = Vec::new();
        bound.store.enumerate_keys(&bound.scope, &path, &mut |key, value| {
            let attribute = format!("{}::{}", METADATA_NAMESPACE, key);
            if self.matcher.matches(&attribute) {
                found.push((attribute, value.clone()));
            }
            true
        });

        for (attribute, value) in found {
            info.insert_if_absent(attribute, value.into());
        }
    }
}

fn join_path(base: &str, name: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, name)
    } else {
        format!("{}/{}", base, name)
    }
}
