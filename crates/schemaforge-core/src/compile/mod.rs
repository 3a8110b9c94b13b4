//! Backend schema compilers.
//!
//! Each compiler turns a merged [`ClassDescriptor`] into the configuration
//! object a document, graph or relational driver consumes natively:
//!
//! - [`document`] - nested field maps with embedded sub-schemas
//! - [`graph`] - one node per class plus relationship definitions
//! - [`relational`] - table columns plus relation descriptors
//!
//! Compilation is a pure function of the registered metadata, the target
//! backend and the recursion depth.

pub mod cache;
pub mod document;
pub mod graph;
pub mod relational;

use serde::{Deserialize, Serialize};

use crate::classify::TypeClassifier;
use crate::config::CompilerConfig;
use crate::error::{Error, Result};
use crate::guard::RecursionGuard;
use crate::metadata::{ClassDescriptor, PropertyDescriptor, Registry, RelationshipDescriptor};

pub use cache::SchemaCache;
pub use document::{DocumentField, DocumentFieldType, DocumentSchema};
pub use graph::{GraphProperty, GraphPropertyType, GraphRelationship, GraphSchema, NodeDef};
pub use relational::{ColumnDef, ColumnType, JoinSpec, RelationDescriptor, RelationalSchema};

/// Target persistence backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backend {
    /// Nested document store.
    Document,
    /// Labeled property graph store.
    Graph,
    /// Relational store.
    Relational,
}

/// A uniqueness constraint over one or more fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueConstraint {
    /// Constraint name.
    pub name: String,
    /// Fields that must be unique together.
    pub fields: Vec<String>,
}

impl UniqueConstraint {
    /// Check if this constraint spans several fields.
    pub fn is_composite(&self) -> bool {
        self.fields.len() > 1
    }
}

/// How the domain identifier property is named in a backend artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdMapping {
    /// Property key on the domain class.
    pub property: String,
    /// Field, property or column name in the backend.
    pub field: String,
}

/// Output of any of the three compilers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "snake_case")]
pub enum SchemaArtifact {
    /// Document store schema.
    Document(DocumentSchema),
    /// Graph store schema.
    Graph(GraphSchema),
    /// Relational store schema.
    Relational(RelationalSchema),
}

impl SchemaArtifact {
    /// Backend this artifact targets.
    pub fn backend(&self) -> Backend {
        match self {
            SchemaArtifact::Document(_) => Backend::Document,
            SchemaArtifact::Graph(_) => Backend::Graph,
            SchemaArtifact::Relational(_) => Backend::Relational,
        }
    }

    /// Serialize as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Compiles registered classes into backend artifacts.
pub struct SchemaCompiler<'a> {
    registry: &'a Registry,
    config: CompilerConfig,
}

impl<'a> SchemaCompiler<'a> {
    /// Create a compiler with the default configuration.
    pub fn new(registry: &'a Registry) -> Self {
        Self::with_config(registry, CompilerConfig::default())
    }

    /// Create a compiler with a custom configuration.
    pub fn with_config(registry: &'a Registry, config: CompilerConfig) -> Self {
        Self { registry, config }
    }

    /// Compiler configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Registry the compiler reads from.
    pub fn registry(&self) -> &'a Registry {
        self.registry
    }

    pub(crate) fn guard(&self) -> RecursionGuard {
        RecursionGuard::new(self.config.max_depth)
    }

    pub(crate) fn classifier(&self) -> TypeClassifier<'a> {
        TypeClassifier::new(self.registry)
    }

    /// Compile a class for the given backend.
    pub fn compile(&self, class: &str, backend: Backend) -> Result<SchemaArtifact> {
        Ok(match backend {
            Backend::Document => SchemaArtifact::Document(self.compile_document(class)?),
            Backend::Graph => SchemaArtifact::Graph(self.compile_graph(class)?),
            Backend::Relational => SchemaArtifact::Relational(self.compile_relational(class)?),
        })
    }

    /// Compile a nested document schema for a class.
    pub fn compile_document(&self, class: &str) -> Result<DocumentSchema> {
        tracing::debug!(class, max_depth = self.config.max_depth, "compiling document schema");
        self.document_at(class, 0)
    }

    /// Compile a node/relationship schema for a class.
    pub fn compile_graph(&self, class: &str) -> Result<GraphSchema> {
        tracing::debug!(class, "compiling graph schema");
        self.graph_for(class)
    }

    /// Compile one graph schema spanning several classes.
    pub fn compile_graph_model<S: AsRef<str>>(&self, classes: &[S]) -> Result<GraphSchema> {
        let mut model = GraphSchema::default();
        for class in classes {
            model.absorb(self.compile_graph(class.as_ref())?);
        }
        Ok(model)
    }

    /// Compile a table/column/relation schema for a class.
    pub fn compile_relational(&self, class: &str) -> Result<RelationalSchema> {
        tracing::debug!(class, max_depth = self.config.max_depth, "compiling relational schema");
        self.relational_at(class, 0)
    }

    /// Resolve the target class of a relationship property.
    pub(crate) fn resolve_target(
        &self,
        class: &str,
        property: &PropertyDescriptor,
        relationship: &RelationshipDescriptor,
    ) -> Result<String> {
        match relationship.target.resolve() {
            Some(target) if self.registry.is_registered(&target) => Ok(target),
            _ => Err(Error::UnresolvedRelationshipTarget {
                class: class.to_string(),
                property: property.key.clone(),
            }),
        }
    }
}

/// Single-field constraints for unique/identifier properties followed by
/// composite keys, with property keys renamed through `field_name`.
pub(crate) fn unique_constraints(
    descriptor: &ClassDescriptor,
    field_name: impl Fn(&PropertyDescriptor) -> String,
) -> Vec<UniqueConstraint> {
    let mut constraints: Vec<UniqueConstraint> = descriptor
        .value_properties()
        .filter(|p| p.requires_unique())
        .map(|p| UniqueConstraint {
            name: format!("{}_{}_unique", descriptor.name, p.key),
            fields: vec![field_name(p)],
        })
        .collect();

    for (group, keys) in descriptor.unique_groups() {
        let fields = keys
            .iter()
            .filter_map(|key| descriptor.get(key))
            .filter(|p| !p.is_relationship())
            .map(&field_name)
            .collect();
        constraints.push(UniqueConstraint {
            name: format!("{}_{}_unique", descriptor.name, group),
            fields,
        });
    }
    constraints
}

/// Compile a document schema with the default configuration except depth.
pub fn compile_document_schema(
    registry: &Registry,
    class: &str,
    max_depth: usize,
) -> Result<DocumentSchema> {
    SchemaCompiler::with_config(registry, CompilerConfig::default().with_max_depth(max_depth))
        .compile_document(class)
}

/// Compile a graph schema with the default configuration.
pub fn compile_graph_schema(registry: &Registry, class: &str) -> Result<GraphSchema> {
    SchemaCompiler::new(registry).compile_graph(class)
}

/// Compile a relational schema with the default configuration except depth.
pub fn compile_relational_schema(
    registry: &Registry,
    class: &str,
    max_depth: usize,
) -> Result<RelationalSchema> {
    SchemaCompiler::with_config(registry, CompilerConfig::default().with_max_depth(max_depth))
        .compile_relational(class)
}
