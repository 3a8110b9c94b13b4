//! SchemaForge Core - metadata registry and multi-backend schema compilers.
//!
//! Domain classes are described once in a [`Registry`] (properties,
//! constraints, enumerations, arrays, embedded structures and relationships,
//! with inheritance overrides) and compiled into the native schema shape of a
//! document store, a labeled property graph or a relational store.

pub mod classify;
pub mod compile;
pub mod config;
pub mod error;
pub mod guard;
pub mod manifest;
pub mod metadata;

pub use classify::{Classification, TypeClassifier};
pub use compile::{
    compile_document_schema, compile_graph_schema, compile_relational_schema, Backend,
    DocumentSchema, GraphSchema, IdMapping, RelationalSchema, SchemaArtifact, SchemaCache,
    SchemaCompiler, UniqueConstraint,
};
pub use config::{CompilerConfig, RegistryConfig};
pub use error::{Error, Result};
pub use guard::{DepthCheck, RecursionGuard};
pub use manifest::Manifest;
pub use metadata::{
    Cardinality, ClassDecl, ClassDescriptor, ClassKind, DefaultValue, Direction, EnumValue,
    EnumValues, PropertyDescriptor, PropertyOptions, Registry, RelationshipDescriptor,
    RelationshipOptions, ScalarType, TargetResolver, TypeDescriptor,
};
