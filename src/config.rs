use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{JoinIndexError, Result};

/// Default prefix of per-type join field names
pub const DEFAULT_JOIN_FIELD_PREFIX: &str = "_parent#";

/// Externally resolved type hierarchy: each type maps to its parent type
/// (`None` for top-level types).
///
/// A type that is the parent of at least one other type is a *join type*:
/// documents carry a join field for it.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JoinMapping {
    types: BTreeMap<String, Option<String>>,
}

impl JoinMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level type
    pub fn with_root(mut self, name: impl Into<String>) -> Self {
        self.types.insert(name.into(), None);
        self
    }

    /// Add a type whose documents point at `parent` documents
    pub fn with_child(mut self, name: impl Into<String>, parent: impl Into<String>) -> Self {
        let parent = parent.into();
        self.types.entry(parent.clone()).or_insert(None);
        self.types.insert(name.into(), Some(parent));
        self
    }

    pub fn contains(&self, join_type: &str) -> bool {
        self.types.contains_key(join_type)
    }

    pub fn parent_of(&self, join_type: &str) -> Option<&str> {
        self.types.get(join_type).and_then(|p| p.as_deref())
    }

    /// Whether documents carry a join field for this type
    pub fn is_join_type(&self, join_type: &str) -> bool {
        self.types
            .values()
            .any(|parent| parent.as_deref() == Some(join_type))
    }

    /// Parent, grandparent, ... of a type. Stops early on a cycle.
    pub fn ancestors(&self, join_type: &str) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = self.parent_of(join_type);
        while let Some(parent) = current {
            if chain.len() >= self.types.len() {
                break;
            }
            chain.push(parent);
            current = self.parent_of(parent);
        }
        chain
    }

    /// Distance from a top-level type
    pub fn depth(&self, join_type: &str) -> usize {
        self.ancestors(join_type).len()
    }

    /// Join types ordered top-level first, then by name
    pub fn join_types(&self) -> Vec<&str> {
        let mut types: Vec<&str> = self
            .types
            .keys()
            .map(String::as_str)
            .filter(|t| self.is_join_type(t))
            .collect();
        types.sort_by_key(|t| (self.depth(t), *t));
        types
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, Option<&str>)> {
        self.types.iter().map(|(t, p)| (t.as_str(), p.as_deref()))
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// Reject empty names, dangling parents, and cycles
    pub fn validate(&self) -> Result<()> {
        for (name, parent) in &self.types {
            if name.is_empty() {
                return Err(JoinIndexError::InvalidMapping(
                    "type name must not be empty".to_string(),
                ));
            }
            if let Some(parent) = parent {
                if !self.types.contains_key(parent) {
                    return Err(JoinIndexError::InvalidMapping(format!(
                        "type '{}' points at undeclared parent '{}'",
                        name, parent
                    )));
                }
            }
        }

        for name in self.types.keys() {
            let mut current = self.parent_of(name);
            let mut steps = 0;
            while let Some(parent) = current {
                if parent == name || steps > self.types.len() {
                    return Err(JoinIndexError::InvalidMapping(format!(
                        "type '{}' is its own ancestor",
                        name
                    )));
                }
                steps += 1;
                current = self.parent_of(parent);
            }
        }

        Ok(())
    }
}

impl FromIterator<(String, Option<String>)> for JoinMapping {
    fn from_iter<I: IntoIterator<Item = (String, Option<String>)>>(iter: I) -> Self {
        Self {
            types: iter.into_iter().collect(),
        }
    }
}

/// Join index settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinIndexSettings {
    /// Prefix of per-type join field names (`<prefix><type>`)
    pub join_field_prefix: String,
    /// Type hierarchy
    pub mapping: JoinMapping,
    /// Register prometheus metrics for builds and cache hits
    pub metrics_enabled: bool,
}

impl Default for JoinIndexSettings {
    fn default() -> Self {
        Self {
            join_field_prefix: DEFAULT_JOIN_FIELD_PREFIX.to_string(),
            mapping: JoinMapping::default(),
            metrics_enabled: true,
        }
    }
}

impl JoinIndexSettings {
    pub fn new(mapping: JoinMapping) -> Self {
        Self {
            mapping,
            ..Default::default()
        }
    }

    pub fn with_join_field_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.join_field_prefix = prefix.into();
        self
    }

    pub fn with_metrics(mut self, enabled: bool) -> Self {
        self.metrics_enabled = enabled;
        self
    }

    /// Name of the join field holding keys of `join_type`
    pub fn join_field(&self, join_type: &str) -> String {
        join_field_name(&self.join_field_prefix, join_type)
    }

    pub fn validate(&self) -> Result<()> {
        if self.join_field_prefix.is_empty() {
            return Err(JoinIndexError::InvalidMapping(
                "join field prefix must not be empty".to_string(),
            ));
        }
        self.mapping.validate()
    }

    pub fn from_json(data: &[u8]) -> Result<Self> {
        let settings: Self = serde_json::from_slice(data)?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read(path)?;
        Self::from_json(&data)
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }
}

pub(crate) fn join_field_name(prefix: &str, join_type: &str) -> String {
    format!("{}{}", prefix, join_type)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn family() -> JoinMapping {
        JoinMapping::new()
            .with_root("parent")
            .with_child("child", "parent")
            .with_child("grand-child", "child")
    }

    #[test]
    fn test_join_types_are_ordered_root_first() {
        let mapping = family();
        assert_eq!(mapping.join_types(), vec!["parent", "child"]);
        assert!(mapping.is_join_type("parent"));
        assert!(!mapping.is_join_type("grand-child"));
        assert_eq!(mapping.ancestors("grand-child"), vec!["child", "parent"]);
        assert_eq!(mapping.depth("parent"), 0);
    }

    #[test]
    fn test_validate_rejects_cycles_and_dangling_parents() {
        assert!(family().validate().is_ok());

        let cyclic: JoinMapping =
            serde_json::from_str(r#"{"a": "b", "b": "a"}"#).unwrap();
        assert!(matches!(
            cyclic.validate(),
            Err(JoinIndexError::InvalidMapping(_))
        ));

        let dangling: JoinMapping = serde_json::from_str(r#"{"a": "missing"}"#).unwrap();
        assert!(matches!(
            dangling.validate(),
            Err(JoinIndexError::InvalidMapping(_))
        ));
    }

    #[test]
    fn test_settings_json_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(
            br#"{"join_field_prefix": "_join#", "mapping": {"parent": null, "child": "parent"}}"#,
        )
        .unwrap();

        let settings = JoinIndexSettings::from_json_file(file.path()).unwrap();
        assert_eq!(settings.join_field("parent"), "_join#parent");
        assert_eq!(settings.mapping.parent_of("child"), Some("parent"));
        assert!(settings.metrics_enabled);

        let restored = JoinIndexSettings::from_json(&settings.to_json().unwrap()).unwrap();
        assert_eq!(restored.mapping, settings.mapping);
    }

    #[test]
    fn test_settings_default_prefix() {
        let settings = JoinIndexSettings::new(family());
        assert_eq!(settings.join_field("child"), "_parent#child");
    }
}
