//! File entries delivered by the enumerator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Attribute carrying the entry's file name.
pub const STANDARD_NAME: &str = "standard::name";

/// Value of a single file attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Single string value.
    String(String),
    /// List of strings.
    StringList(Vec<String>),
}

impl AttributeValue {
    /// The value as a string, if it is one.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttributeValue::String(s) => Some(s),
            AttributeValue::StringList(_) => None,
        }
    }

    /// The value as a string list, if it is one.
    pub fn as_list(&self) -> Option<&[String]> {
        match self {
            AttributeValue::String(_) => None,
            AttributeValue::StringList(v) => Some(v),
        }
    }
}

/// Metadata of one remote file, keyed by `namespace::attribute` names.
///
/// Entries are immutable once decoded, except that the enumerator may add
/// locally stored `metadata::*` attributes when handing them out.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileInfo {
    attributes: BTreeMap<String, AttributeValue>,
}

impl FileInfo {
    /// Create an entry with no attributes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an entry carrying only `standard::name`.
    pub fn with_name(name: impl Into<String>) -> Self {
        let mut info = Self::new();
        info.set_attribute_string(STANDARD_NAME, name);
        info
    }

    /// The entry's file name.
    pub fn name(&self) -> Option<&str> {
        self.get(STANDARD_NAME).and_then(AttributeValue::as_str)
    }

    /// Look up an attribute.
    pub fn get(&self, attribute: &str) -> Option<&AttributeValue> {
        self.attributes.get(attribute)
    }

    /// Look up a string attribute.
    pub fn get_string(&self, attribute: &str) -> Option<&str> {
        self.get(attribute).and_then(AttributeValue::as_str)
    }

    /// Whether the attribute is present.
    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.contains_key(attribute)
    }

    /// Set a string attribute, replacing any previous value.
    pub fn set_attribute_string(&mut self, attribute: impl Into<String>, value: impl Into<String>) {
        self.attributes
            .insert(attribute.into(), AttributeValue::String(value.into()));
    }

    /// Set a string-list attribute, replacing any previous value.
    pub fn set_attribute_stringv(&mut self, attribute: impl Into<String>, value: Vec<String>) {
        self.attributes
            .insert(attribute.into(), AttributeValue::StringList(value));
    }

    /// Insert an attribute only if the entry does not carry it yet.
    ///
    /// Returns `true` if the value was inserted.
    pub(crate) fn insert_if_absent(&mut self, attribute: String, value: AttributeValue) -> bool {
        match self.attributes.entry(attribute) {
            std::collections::btree_map::Entry::Occupied(_) => false,
            std::collections::btree_map::Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    /// Whether the entry has no attributes.
    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// Iterate attributes in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(k, v)| (k.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_name() {
        let info = FileInfo::with_name("report.pdf");
        assert_eq!(info.name(), Some("report.pdf"));
        assert_eq!(info.len(), 1);
    }

    #[test]
    fn test_set_and_get() {
        let mut info = FileInfo::new();
        assert!(info.is_empty());

        info.set_attribute_string("standard::content-type", "text/plain");
        info.set_attribute_stringv("metadata::emblems", vec!["urgent".into()]);

        assert_eq!(info.get_string("standard::content-type"), Some("text/plain"));
        assert_eq!(
            info.get("metadata::emblems").and_then(AttributeValue::as_list),
            Some(&["urgent".to_string()][..])
        );
        assert!(info.get_string("metadata::emblems").is_none());
    }

    #[test]
    fn test_insert_if_absent_keeps_existing() {
        let mut info = FileInfo::new();
        info.set_attribute_string("metadata::color", "blue");

        let inserted = info.insert_if_absent(
            "metadata::color".to_string(),
            AttributeValue::String("red".into()),
        );

        assert!(!inserted);
        assert_eq!(info.get_string("metadata::color"), Some("blue"));
    }

    #[test]
    fn test_iter_is_name_ordered() {
        let mut info = FileInfo::with_name("z");
        info.set_attribute_string("access::can-read", "true");

        let names: Vec<&str> = info.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["access::can-read", "standard::name"]);
    }
}
