//! Metadata registry for schema-eligible classes.
//!
//! Classes, properties and relationships are registered once at model
//! definition time; the registry merges each class over its superclass chain
//! into an immutable [`ClassDescriptor`].

mod class;
mod property;
mod registry;
mod relationship;
mod types;

pub use class::{ClassDecl, ClassDescriptor, ClassKind};
pub use property::{PropertyDescriptor, PropertyOptions};
pub use registry::{MemberOptions, Registry};
pub use relationship::{
    Cardinality, CascadeRules, DeleteBehavior, Direction, JoinColumn, JoinTable,
    RelationshipDescriptor, RelationshipOptions, TargetResolver,
};
pub use types::{DefaultValue, EnumValue, EnumValues, ScalarType, TypeDescriptor};
