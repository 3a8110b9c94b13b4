//! Relationship declarations between registered classes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Cardinality of a relationship, seen from the declaring class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Cardinality {
    /// One-to-one relation (unique foreign key).
    OneToOne,
    /// One-to-many relation (foreign key on the related side).
    OneToMany,
    /// Many-to-one relation (foreign key on the declaring side).
    ManyToOne,
    /// Many-to-many relation (requires a join table).
    ManyToMany,
}

impl Cardinality {
    /// Whether the declaring side holds many related instances.
    pub fn is_to_many(&self) -> bool {
        matches!(self, Cardinality::OneToMany | Cardinality::ManyToMany)
    }

    /// Whether the declaring side owns the relation when nothing else is declared.
    pub fn owns_by_default(&self) -> bool {
        matches!(self, Cardinality::ManyToOne)
    }
}

/// Traversal direction of a graph edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// Edge points from the related class to the declaring class.
    Incoming,
    /// Edge points from the declaring class to the related class.
    #[default]
    Outgoing,
    /// Edge is traversed in both directions.
    Both,
}

/// Behavior when a referenced instance is deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeleteBehavior {
    /// Delete related instances.
    Cascade,
    /// Prevent deletion if related instances exist.
    Restrict,
    /// Set the foreign key to null.
    SetNull,
}

/// Which operations propagate across the relation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CascadeRules {
    /// Persist new related instances together with the owner.
    pub insert: bool,
    /// Propagate updates to related instances.
    pub update: bool,
    /// Remove related instances together with the owner.
    pub remove: bool,
    /// Referential action when the referenced row goes away.
    pub on_delete: Option<DeleteBehavior>,
}

impl CascadeRules {
    /// Cascade every operation.
    pub fn all() -> Self {
        Self {
            insert: true,
            update: true,
            remove: true,
            on_delete: Some(DeleteBehavior::Cascade),
        }
    }

    /// Whether any rule is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A foreign key column on the owning side.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinColumn {
    /// Column name on the owning table.
    pub name: String,
    /// Referenced column on the target table.
    pub referenced_column: String,
}

impl JoinColumn {
    /// Create a join column referencing `referenced_column`.
    pub fn new(name: impl Into<String>, referenced_column: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            referenced_column: referenced_column.into(),
        }
    }
}

/// Join table configuration for many-to-many relations.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinTable {
    /// Join table name.
    pub name: Option<String>,
    /// Column referencing the owning side.
    pub join_column: Option<String>,
    /// Column referencing the related side.
    pub inverse_join_column: Option<String>,
}

impl JoinTable {
    /// Create a join table with explicit names.
    pub fn new(
        name: impl Into<String>,
        join_column: impl Into<String>,
        inverse_join_column: impl Into<String>,
    ) -> Self {
        Self {
            name: Some(name.into()),
            join_column: Some(join_column.into()),
            inverse_join_column: Some(inverse_join_column.into()),
        }
    }
}

/// Resolves the target class of a relationship.
///
/// A deferred resolver is only invoked at compile time, so two classes may
/// reference each other regardless of registration order.
#[derive(Clone)]
pub enum TargetResolver {
    /// Target known by name at declaration time.
    Direct(String),
    /// Target produced lazily.
    Deferred(Arc<dyn Fn() -> Option<String> + Send + Sync>),
}

impl TargetResolver {
    /// Create a deferred resolver.
    pub fn deferred<F>(resolve: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        TargetResolver::Deferred(Arc::new(resolve))
    }

    /// Produce the target class name.
    pub fn resolve(&self) -> Option<String> {
        match self {
            TargetResolver::Direct(name) => Some(name.clone()),
            TargetResolver::Deferred(resolve) => resolve(),
        }
    }
}

impl fmt::Debug for TargetResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetResolver::Direct(name) => f.debug_tuple("Direct").field(name).finish(),
            TargetResolver::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl PartialEq for TargetResolver {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (TargetResolver::Direct(a), TargetResolver::Direct(b)) => a == b,
            (TargetResolver::Deferred(a), TargetResolver::Deferred(b)) => Arc::ptr_eq(a, b),
            _ => false,
        }
    }
}

impl From<&str> for TargetResolver {
    fn from(name: &str) -> Self {
        TargetResolver::Direct(name.to_string())
    }
}

impl From<String> for TargetResolver {
    fn from(name: String) -> Self {
        TargetResolver::Direct(name)
    }
}

/// Relationship configuration as declared on a single class.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationshipOptions {
    /// Edge type (graph) / relation name.
    pub edge_type: Option<String>,
    /// Target class resolver.
    pub target: Option<TargetResolver>,
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

impl RelationshipOptions {
    /// Create a relationship with an edge type and target.
    pub fn new(edge_type: impl Into<String>, target: impl Into<TargetResolver>) -> Self {
        Self {
            edge_type: Some(edge_type.into()),
            target: Some(target.into()),
            ..Default::default()
        }
    }

    /// Options with nothing declared, used to override an inherited relationship.
    pub fn overriding() -> Self {
        Self::default()
    }

    /// Set the direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Set the cardinality.
    pub fn with_cardinality(mut self, cardinality: Cardinality) -> Self {
        self.cardinality = Some(cardinality);
        self
    }

    /// Mark the declaring class as the owning side.
    pub fn owning(mut self) -> Self {
        self.owner = Some(true);
        self
    }

    /// Mark the declaring class as the inverse side.
    pub fn inverse_side(mut self) -> Self {
        self.owner = Some(false);
        self
    }

    /// Set the inverse property on the target.
    pub fn with_inverse(mut self, property: impl Into<String>) -> Self {
        self.inverse_property = Some(property.into());
        self
    }

    /// Set the join columns.
    pub fn with_join_columns(mut self, columns: Vec<JoinColumn>) -> Self {
        self.join_columns = Some(columns);
        self
    }

    /// Set the join table.
    pub fn with_join_table(mut self, table: JoinTable) -> Self {
        self.join_table = Some(table);
        self
    }

    /// Set the cascade rules.
    pub fn with_cascade(mut self, cascade: CascadeRules) -> Self {
        self.cascade = Some(cascade);
        self
    }

    /// Load eagerly.
    pub fn eager(mut self) -> Self {
        self.eager = Some(true);
        self
    }

    /// Set properties projected onto the edge.
    pub fn with_edge_properties(mut self, properties: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.edge_projected_properties = Some(properties.into_iter().map(Into::into).collect());
        self
    }

    /// Overlay `other` on top of `self`; fields declared in `other` win.
    pub fn merge(&mut self, other: &RelationshipOptions) {
        macro_rules! overlay {
            ($($field:ident),*) => {
                $(
                    if other.$field.is_some() {
                        self.$field = other.$field.clone();
                    }
                )*
            };
        }
        overlay!(
            edge_type,
            target,
            direction,
            cardinality,
            owner,
            inverse_property,
            join_columns,
            join_table,
            cascade,
            eager,
            edge_projected_properties
        );
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if matches!(&self.edge_type, Some(t) if t.trim().is_empty()) {
            return Err("relationship edge type is empty".into());
        }
        if matches!(&self.target, Some(TargetResolver::Direct(t)) if t.is_empty()) {
            return Err("relationship target is empty".into());
        }
        if let Some(columns) = &self.join_columns {
            if columns.iter().any(|c| c.name.is_empty()) {
                return Err("join column with empty name".into());
            }
        }
        Ok(())
    }

    /// Resolve defaults into a descriptor; `None` when edge type or target is missing.
    pub(crate) fn resolve(&self) -> Option<RelationshipDescriptor> {
        let cardinality = self.cardinality.unwrap_or(Cardinality::ManyToMany);
        Some(RelationshipDescriptor {
            edge_type: self.edge_type.clone()?,
            target: self.target.clone()?,
            direction: self.direction.unwrap_or_default(),
            cardinality,
            owner: self.owner.unwrap_or_else(|| cardinality.owns_by_default()),
            inverse_property: self.inverse_property.clone(),
            join_columns: self.join_columns.clone().unwrap_or_default(),
            join_table: self.join_table.clone(),
            cascade: self.cascade.unwrap_or_default(),
            eager: self.eager.unwrap_or(false),
            edge_projected_properties: self.edge_projected_properties.clone().unwrap_or_default(),
        })
    }
}

/// A merged relationship descriptor with defaults applied.
#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipDescriptor {
    /// Edge type (graph) / relation name.
    pub edge_type: String,
    /// Target class resolver.
    pub target: TargetResolver,
    /// Edge direction.
    pub direction: Direction,
    /// Relation cardinality.
    pub cardinality: Cardinality,
    /// Whether the declaring class owns the relation.
    pub owner: bool,
    /// Property on the target pointing back.
    pub inverse_property: Option<String>,
    /// Declared join columns; empty means the ORM naming convention.
    pub join_columns: Vec<JoinColumn>,
    /// Declared join table.
    pub join_table: Option<JoinTable>,
    /// Cascade rules.
    pub cascade: CascadeRules,
    /// Load related instances eagerly.
    pub eager: bool,
    /// Properties stored on the edge itself.
    pub edge_projected_properties: Vec<String>,
}
