//! Class declarations and merged class descriptors.

use super::property::PropertyDescriptor;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// Base abstraction a class hierarchy is rooted in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassKind {
    /// Has identity and timestamps; persisted as a root record.
    Entity,
    /// No identity; only ever stored embedded in its owner.
    ValueObject,
}

/// Registration of a schema-eligible class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Class name; also the node label and default table name.
    pub name: String,
    /// Direct superclass, if any.
    pub parent: Option<String>,
    /// Base abstraction. Derived classes inherit the root's kind.
    pub kind: Option<ClassKind>,
    /// Relational table name override.
    pub table_name: Option<String>,
}

impl ClassDecl {
    /// Declare an entity class.
    pub fn entity(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind: Some(ClassKind::Entity),
            table_name: None,
        }
    }

    /// Declare an embeddable value object class.
    pub fn value_object(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            kind: Some(ClassKind::ValueObject),
            table_name: None,
        }
    }

    /// Declare a class deriving from `parent`.
    pub fn derived(name: impl Into<String>, parent: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: Some(parent.into()),
            kind: None,
            table_name: None,
        }
    }

    /// Set the superclass.
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Override the relational table name.
    pub fn with_table_name(mut self, table: impl Into<String>) -> Self {
        self.table_name = Some(table.into());
        self
    }

    /// Reject declarations that can never merge.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::invalid("class name is empty"));
        }
        if self.parent.as_deref() == Some(self.name.as_str()) {
            return Err(Error::invalid(format!("class {} extends itself", self.name)));
        }
        if self.parent.is_none() && self.kind.is_none() {
            return Err(Error::invalid(format!(
                "root class {} must declare a kind",
                self.name
            )));
        }
        Ok(())
    }
}

/// Merged, de-duplicated view of a class and all its ancestors.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassDescriptor {
    /// Class name.
    pub name: String,
    /// Base abstraction of the hierarchy.
    pub kind: ClassKind,
    /// Ancestor chain, root first, ending with this class.
    pub lineage: Vec<String>,
    /// Relational table name.
    pub table_name: String,
    /// Properties in base-to-derived declaration order.
    pub properties: Vec<PropertyDescriptor>,
}

impl ClassDescriptor {
    /// Get a property by key.
    pub fn get(&self, key: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.key == key)
    }

    /// The identity property, if the hierarchy has one.
    pub fn identifier(&self) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.is_identifier)
    }

    /// Check if this is an entity hierarchy.
    pub fn is_entity(&self) -> bool {
        self.kind == ClassKind::Entity
    }

    /// Properties that are not relationship links.
    pub fn value_properties(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| !p.is_relationship())
    }

    /// Relationship links.
    pub fn relationships(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.iter().filter(|p| p.is_relationship())
    }

    /// Composite unique keys as `(group, keys)` in first-seen order.
    pub fn unique_groups(&self) -> Vec<(String, Vec<String>)> {
        let mut groups: Vec<(String, Vec<String>)> = Vec::new();
        for property in &self.properties {
            let Some(group) = &property.unique_group else {
                continue;
            };
            match groups.iter_mut().find(|(name, _)| name == group) {
                Some((_, keys)) => keys.push(property.key.clone()),
                None => groups.push((group.clone(), vec![property.key.clone()])),
            }
        }
        groups
    }
}
