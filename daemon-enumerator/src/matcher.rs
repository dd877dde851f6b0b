//! Requested-attribute matching.
//!
//! A matcher is built from a comma-separated list of patterns:
//!
//! - `*`: every attribute
//! - `namespace::*`: every attribute in a namespace
//! - `namespace::key`: one attribute
//!
//! Example: `standard::name,standard::type,metadata::*`.

use std::collections::{BTreeMap, BTreeSet};

/// Answers which attributes a caller asked for.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeMatcher {
    all: bool,
    namespaces: BTreeSet<String>,
    // namespace -> keys
    keys: BTreeMap<String, BTreeSet<String>>,
}

impl AttributeMatcher {
    /// Parse a comma-separated list of requested attributes.
    ///
    /// Blank patterns are ignored; a bare name without `::` is treated as a whole
    /// namespace.
    pub fn new(attributes: &str) -> Self {
        let mut matcher = Self::default();

        for pattern in attributes.split(',').map(str::trim).filter(|p| !p.is_empty()) {
            if pattern == "*" {
                matcher.all = true;
                continue;
            }

            match pattern.split_once("::") {
                Some((ns, "*")) | Some((ns, "")) => {
                    matcher.namespaces.insert(ns.to_string());
                }
                Some((ns, key)) => {
                    matcher
                        .keys
                        .entry(ns.to_string())
                        .or_default()
                        .insert(key.to_string());
                }
                None => {
                    matcher.namespaces.insert(pattern.to_string());
                }
            }
        }

        matcher
    }

    /// Whether the full attribute name `namespace::key` was requested.
    pub fn matches(&self, attribute: &str) -> bool {
        if self.all {
            return true;
        }

        let Some((ns, key)) = attribute.split_once("::") else {
            return false;
        };

        self.namespaces.contains(ns)
            || self
                .keys
                .get(ns)
                .is_some_and(|keys| keys.contains(key))
    }

    /// Whether any attribute in `namespace` can match.
    pub fn covers_namespace(&self, namespace: &str) -> bool {
        self.all || self.namespaces.contains(namespace) || self.keys.contains_key(namespace)
    }

    /// Whether the matcher matches nothing at all.
    pub fn is_empty(&self) -> bool {
        !self.all && self.namespaces.is_empty() && self.keys.is_empty()
    }
}
