//! JSON model manifests.
//!
//! A manifest declares classes, their properties and relationships in one
//! file so a model can be compiled without writing registration code:
//!
//! ```json
//! {
//!   "classes": [
//!     { "name": "User", "kind": "entity",
//!       "properties": { "email": { "type": { "scalar": "string" }, "unique": true } } },
//!     { "name": "Order", "kind": "entity",
//!       "relationships": { "buyer": { "edge_type": "PLACED_BY", "target": "User",
//!                                     "cardinality": "many-to-one" } } }
//!   ]
//! }
//! ```
//!
//! Member order follows the order of keys in the file.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::metadata::{
    Cardinality, CascadeRules, ClassDecl, ClassKind, Direction, JoinColumn, JoinTable,
    PropertyOptions, Registry, RelationshipOptions,
};

/// A model manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Manifest {
    /// Class declarations.
    pub classes: Vec<ClassSpec>,
}

/// One class in a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClassSpec {
    /// Class name.
    pub name: String,
    /// Base abstraction; required on root classes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<ClassKind>,
    /// Direct superclass.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extends: Option<String>,
    /// Relational table name override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table_name: Option<String>,
    /// Property options by key, in file order.
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    /// Relationship options by key, in file order.
    #[serde(default)]
    pub relationships: serde_json::Map<String, serde_json::Value>,
}

/// Relationship options as written in a manifest. Targets are class names.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelationshipSpec {
    /// Edge type / relation name.
    pub edge_type: Option<String>,
    /// Target class name.
    pub target: Option<String>,
    /// Edge direction.
    pub direction: Option<Direction>,
    /// Relation cardinality.
    pub cardinality: Option<Cardinality>,
    /// Whether the declaring class owns the relation.
    pub owner: Option<bool>,
    /// Property on the target pointing back.
    pub inverse_property: Option<String>,
    /// Foreign key columns on the owning side.
    pub join_columns: Option<Vec<JoinColumn>>,
    /// Join table for many-to-many relations.
    pub join_table: Option<JoinTable>,
    /// Cascade rules.
    pub cascade: Option<CascadeRules>,
    /// Load related instances eagerly.
    pub eager: Option<bool>,
    /// Properties stored on the edge itself.
    pub edge_projected_properties: Option<Vec<String>>,
}

impl From<RelationshipSpec> for RelationshipOptions {
    fn from(spec: RelationshipSpec) -> Self {
        RelationshipOptions {
            edge_type: spec.edge_type,
            target: spec.target.map(Into::into),
            direction: spec.direction,
            cardinality: spec.cardinality,
            owner: spec.owner,
            inverse_property: spec.inverse_property,
            join_columns: spec.join_columns,
            join_table: spec.join_table,
            cascade: spec.cascade,
            eager: spec.eager,
            edge_projected_properties: spec.edge_projected_properties,
        }
    }
}

impl ClassSpec {
    fn decl(&self) -> ClassDecl {
        ClassDecl {
            name: self.name.clone(),
            parent: self.extends.clone(),
            kind: self.kind,
            table_name: self.table_name.clone(),
        }
    }

    fn property_options(&self) -> Result<Vec<(String, PropertyOptions)>> {
        self.properties
            .iter()
            .map(|(key, value)| {
                let options = serde_json::from_value(value.clone()).map_err(|e| {
                    Error::Manifest(format!("{}.{}: {}", self.name, key, e))
                })?;
                Ok((key.clone(), options))
            })
            .collect()
    }

    fn relationship_options(&self) -> Result<Vec<(String, RelationshipOptions)>> {
        self.relationships
            .iter()
            .map(|(key, value)| {
                let spec: RelationshipSpec = serde_json::from_value(value.clone()).map_err(|e| {
                    Error::Manifest(format!("{}.{}: {}", self.name, key, e))
                })?;
                Ok((key.clone(), spec.into()))
            })
            .collect()
    }
}

impl Manifest {
    /// Parse a manifest from JSON text.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Manifest(e.to_string()))
    }

    /// Read and parse a manifest file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path)?;
        tracing::debug!(path = %path.display(), "loading model manifest");
        Self::from_json(&json)
    }

    /// Names of the declared classes, in file order.
    pub fn class_names(&self) -> Vec<&str> {
        self.classes.iter().map(|c| c.name.as_str()).collect()
    }

    /// Register every class and member. All class declarations and member
    /// options are checked before anything is registered.
    pub fn apply(&self, registry: &Registry) -> Result<()> {
        let mut decls = Vec::with_capacity(self.classes.len());
        let mut members = Vec::with_capacity(self.classes.len());
        for class in &self.classes {
            let decl = class.decl();
            decl.validate().map_err(|e| Error::Manifest(format!("{}: {}", class.name, e)))?;
            decls.push(decl);
            members.push((class.property_options()?, class.relationship_options()?));
        }

        for decl in decls {
            registry.register_entity(decl)?;
        }
        for (class, (properties, relationships)) in self.classes.iter().zip(members) {
            registry.register_bulk(&class.name, properties)?;
            registry.register_bulk(&class.name, relationships)?;
        }
        tracing::info!(classes = self.classes.len(), "applied model manifest");
        Ok(())
    }
}
