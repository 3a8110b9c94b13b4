//! Relational-schema compiler.
//!
//! Scalars, identifiers and enumerations become columns. Embedded structures
//! are kept in a single document-typed column (never normalized into extra
//! tables). Relationships become relation descriptors, never columns.

use serde::{Deserialize, Serialize};

use super::document::innermost_enum;
use super::{unique_constraints, IdMapping, SchemaCompiler, UniqueConstraint};
use crate::classify::Classification;
use crate::error::Result;
use crate::guard::DepthCheck;
use crate::metadata::{
    Cardinality, CascadeRules, DefaultValue, EnumValues, JoinColumn, JoinTable,
    PropertyDescriptor, RelationshipDescriptor, ScalarType,
};

/// Column type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnType {
    /// Scalar column.
    Scalar(ScalarType),
    /// Native array of scalars.
    Array(ScalarType),
    /// Serialized embedded structure.
    Document(Box<RelationalSchema>),
    /// Serialized array of embedded structures.
    DocumentArray(Box<RelationalSchema>),
}

impl ColumnType {
    /// SQL type name.
    pub fn sql_type(&self) -> String {
        match self {
            ColumnType::Scalar(scalar) => scalar.sql_type(),
            ColumnType::Array(scalar) => format!("{}[]", scalar.sql_type()),
            ColumnType::Document(_) | ColumnType::DocumentArray(_) => "jsonb".to_string(),
        }
    }

    /// Shape of the serialized structure, for document-typed columns.
    pub fn embedded(&self) -> Option<&RelationalSchema> {
        match self {
            ColumnType::Document(schema) | ColumnType::DocumentArray(schema) => Some(schema),
            _ => None,
        }
    }
}

/// A table column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDef {
    /// Column name.
    pub name: String,
    /// Column type.
    pub column_type: ColumnType,
    /// Column accepts NULL.
    pub nullable: bool,
    /// Column carries a unique constraint.
    pub unique: bool,
    /// Column is the primary key.
    pub primary: bool,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Allowed values (check constraint).
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<EnumValues>,
}

/// Join configuration on the owning side of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JoinSpec {
    /// Foreign-key columns on this table.
    Columns(Vec<JoinColumn>),
    /// Link table with two join columns.
    Table(JoinTable),
}

/// A relation to another table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Property key on the declaring class.
    pub property: String,
    /// Relation kind.
    pub kind: Cardinality,
    /// Related class.
    pub target: String,
    /// Table of the related class.
    pub target_table: String,
    /// This side owns the relation.
    pub owner: bool,
    /// Property on the related class mapping the other side.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inverse_property: Option<String>,
    /// Join configuration, owning side only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub join: Option<JoinSpec>,
    /// Cascade rules.
    pub cascade: CascadeRules,
    /// Load eagerly.
    pub eager: bool,
}

/// Table definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RelationalSchema {
    /// Table name; empty for the placeholder schema.
    pub name: String,
    /// Class the table maps.
    pub class: String,
    /// Columns in declaration order.
    pub columns: Vec<ColumnDef>,
    /// Relations in declaration order.
    pub relations: Vec<RelationDescriptor>,
    /// Unique constraints.
    pub unique_constraints: Vec<UniqueConstraint>,
    /// Mapping from the domain identifier to the primary-key column.
    pub identifier: Option<IdMapping>,
}

impl RelationalSchema {
    /// The placeholder emitted past the recursion limit.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if this is the placeholder schema.
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty() && self.relations.is_empty()
    }

    /// Get a column by name.
    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Get a relation by property key.
    pub fn relation(&self, property: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|r| r.property == property)
    }

    /// Primary-key columns.
    pub fn primary_key(&self) -> impl Iterator<Item = &ColumnDef> {
        self.columns.iter().filter(|c| c.primary)
    }
}

impl<'a> SchemaCompiler<'a> {
    pub(crate) fn relational_at(&self, class: &str, depth: usize) -> Result<RelationalSchema> {
        if self.guard().check(depth) == DepthCheck::LimitReached {
            tracing::debug!(class, depth, "recursion limit reached, emitting empty relational schema");
            return Ok(RelationalSchema::empty());
        }

        let descriptor = self.registry().merged_descriptor(class)?;
        let classifier = self.classifier();
        let id_field = &self.config().relational_id_field;

        let mut columns = Vec::new();
        let mut relations = Vec::new();
        let mut identifier = None;

        for property in &descriptor.properties {
            let classification = classifier.classify(property);
            if let Classification::Relationship(relationship) = &classification {
                relations.push(self.relation(class, &descriptor.table_name, property, relationship)?);
                continue;
            }

            let column_type = self.column_type(&classification, depth)?;
            let mut column = ColumnDef {
                name: property.key.clone(),
                column_type,
                nullable: property.optional,
                unique: property.requires_unique(),
                primary: property.is_identifier,
                default: property.default.clone(),
                enum_values: innermost_enum(&classification).cloned(),
            };
            if property.is_identifier {
                column.name = id_field.clone();
                column.nullable = false;
                identifier = Some(IdMapping {
                    property: property.key.clone(),
                    field: id_field.clone(),
                });
            }
            columns.push(column);
        }

        let unique = unique_constraints(&descriptor, |p| {
            if p.is_identifier {
                id_field.clone()
            } else {
                p.key.clone()
            }
        });

        Ok(RelationalSchema {
            name: descriptor.table_name,
            class: descriptor.name,
            columns,
            relations,
            unique_constraints: unique,
            identifier,
        })
    }

    fn column_type(&self, classification: &Classification, depth: usize) -> Result<ColumnType> {
        Ok(match classification {
            Classification::Embedded(target) => {
                ColumnType::Document(Box::new(self.relational_at(target, depth + 1)?))
            }
            Classification::ArrayOf(element) => match element.as_ref() {
                Classification::Embedded(target) => {
                    ColumnType::DocumentArray(Box::new(self.relational_at(target, depth + 1)?))
                }
                other => match other.scalar() {
                    Some(scalar) => ColumnType::Array(scalar),
                    None => ColumnType::Scalar(ScalarType::Json),
                },
            },
            other => ColumnType::Scalar(other.scalar().unwrap_or(ScalarType::Json)),
        })
    }

    fn relation(
        &self,
        class: &str,
        table: &str,
        property: &PropertyDescriptor,
        relationship: &RelationshipDescriptor,
    ) -> Result<RelationDescriptor> {
        let target = self.resolve_target(class, property, relationship)?;
        let target_table = self.registry().merged_descriptor(&target)?.table_name;
        let join = if relationship.owner {
            self.join_spec(table, &target_table, property, relationship)
        } else {
            None
        };

        Ok(RelationDescriptor {
            property: property.key.clone(),
            kind: relationship.cardinality,
            target,
            target_table,
            owner: relationship.owner,
            inverse_property: relationship.inverse_property.clone(),
            join,
            cascade: relationship.cascade,
            eager: relationship.eager,
        })
    }

    /// Declared join configuration, or the conventional one for the kind.
    fn join_spec(
        &self,
        table: &str,
        target_table: &str,
        property: &PropertyDescriptor,
        relationship: &RelationshipDescriptor,
    ) -> Option<JoinSpec> {
        let id_field = &self.config().relational_id_field;
        match relationship.cardinality {
            Cardinality::OneToOne | Cardinality::ManyToOne => {
                if relationship.join_columns.is_empty() {
                    Some(JoinSpec::Columns(vec![JoinColumn::new(
                        format!("{}_{}", property.key, id_field),
                        id_field.clone(),
                    )]))
                } else {
                    Some(JoinSpec::Columns(relationship.join_columns.clone()))
                }
            }
            Cardinality::ManyToMany => {
                let declared = relationship.join_table.clone().unwrap_or_default();
                Some(JoinSpec::Table(JoinTable {
                    name: declared
                        .name
                        .or_else(|| Some(format!("{}_{}", table, property.key))),
                    join_column: declared
                        .join_column
                        .or_else(|| Some(format!("{}_{}", table, id_field))),
                    inverse_join_column: declared
                        .inverse_join_column
                        .or_else(|| Some(format!("{}_{}", target_table, id_field))),
                }))
            }
            Cardinality::OneToMany => relationship.join_table.clone().map(JoinSpec::Table),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompilerConfig;
    use crate::metadata::{ClassDecl, PropertyOptions, Registry, RelationshipOptions, TypeDescriptor};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register_entity(ClassDecl::entity("User").with_table_name("users"))
            .unwrap();
        registry.register_entity(ClassDecl::entity("Order")).unwrap();
        registry.register_entity(ClassDecl::entity("Tag")).unwrap();
        registry
            .register_entity(ClassDecl::value_object("Line"))
            .unwrap();
        registry
            .register_bulk(
                "Line",
                [
                    ("sku", PropertyOptions::string()),
                    ("qty", PropertyOptions::scalar(ScalarType::Int32)),
                ],
            )
            .unwrap();
        registry
            .register_bulk(
                "User",
                [
                    ("email", PropertyOptions::string().unique()),
                    ("nickname", PropertyOptions::string().optional()),
                ],
            )
            .unwrap();
        registry
            .register_property(
                "Order",
                "lines",
                PropertyOptions::typed(TypeDescriptor::array(TypeDescriptor::class("Line"))),
            )
            .unwrap();
        registry
            .register_relationship(
                "Order",
                "buyer",
                RelationshipOptions::new("PLACED_BY", "User")
                    .with_cardinality(Cardinality::ManyToOne),
            )
            .unwrap();
        registry
            .register_relationship(
                "Order",
                "tags",
                RelationshipOptions::new("TAGGED", "Tag").owning(),
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_columns() {
        let registry = registry();
        let users = SchemaCompiler::new(&registry).compile_relational("User").unwrap();

        assert_eq!(users.name, "users");
        assert_eq!(users.class, "User");
        let pk: Vec<_> = users.primary_key().map(|c| c.name.as_str()).collect();
        assert_eq!(pk, vec!["id"]);
        assert!(users.column("email").unwrap().unique);
        assert!(users.column("nickname").unwrap().nullable);
        assert!(!users.column("email").unwrap().nullable);
        assert_eq!(users.column("created_at").unwrap().column_type.sql_type(), "timestamptz");
    }

    #[test]
    fn test_embedded_array_is_single_document_column() {
        let registry = registry();
        let orders = SchemaCompiler::new(&registry).compile_relational("Order").unwrap();

        let lines = orders.column("lines").unwrap();
        assert_eq!(lines.column_type.sql_type(), "jsonb");
        let shape = lines.column_type.embedded().unwrap();
        assert!(shape.column("sku").is_some());
        assert!(shape.primary_key().next().is_none());
    }

    #[test]
    fn test_relations_are_not_columns() {
        let registry = registry();
        let orders = SchemaCompiler::new(&registry).compile_relational("Order").unwrap();

        assert!(orders.column("buyer").is_none());
        let buyer = orders.relation("buyer").unwrap();
        assert_eq!(buyer.kind, Cardinality::ManyToOne);
        assert_eq!(buyer.target_table, "users");
        assert_eq!(
            buyer.join,
            Some(JoinSpec::Columns(vec![JoinColumn::new("buyer_id", "id")]))
        );

        let tags = orders.relation("tags").unwrap();
        assert_eq!(
            tags.join,
            Some(JoinSpec::Table(JoinTable::new("Order_tags", "Order_id", "Tag_id")))
        );
    }

    #[test]
    fn test_one_to_one_owner_gets_join_column() {
        let registry = registry();
        registry
            .register_relationship(
                "Order",
                "invoice",
                RelationshipOptions::new("BILLED_AS", "Tag")
                    .with_cardinality(Cardinality::OneToOne)
                    .owning(),
            )
            .unwrap();

        let orders = SchemaCompiler::new(&registry).compile_relational("Order").unwrap();
        let invoice = orders.relation("invoice").unwrap();
        assert_eq!(invoice.kind, Cardinality::OneToOne);
        assert_eq!(
            invoice.join,
            Some(JoinSpec::Columns(vec![JoinColumn::new("invoice_id", "id")]))
        );
        assert!(orders.column("invoice_id").is_none());
    }

    #[test]
    fn test_one_to_many_owner_without_join_table() {
        let registry = registry();
        registry
            .register_relationship(
                "User",
                "orders",
                RelationshipOptions::new("PLACED", "Order")
                    .with_cardinality(Cardinality::OneToMany)
                    .owning(),
            )
            .unwrap();
        registry
            .register_relationship(
                "User",
                "archived",
                RelationshipOptions::new("ARCHIVED", "Order")
                    .with_cardinality(Cardinality::OneToMany)
                    .owning()
                    .with_join_table(JoinTable::new("user_archive", "user_id", "order_id")),
            )
            .unwrap();

        let users = SchemaCompiler::new(&registry).compile_relational("User").unwrap();
        let orders = users.relation("orders").unwrap();
        assert!(orders.owner);
        assert!(orders.join.is_none());
        assert_eq!(
            users.relation("archived").unwrap().join,
            Some(JoinSpec::Table(JoinTable::new("user_archive", "user_id", "order_id")))
        );
    }

    #[test]
    fn test_declared_join_configuration_wins() {
        let registry = registry();
        registry
            .register_relationship(
                "Order",
                "tags",
                RelationshipOptions::overriding()
                    .with_join_table(JoinTable::new("order_tags", "order_ref", "tag_ref")),
            )
            .unwrap();

        let orders = SchemaCompiler::new(&registry).compile_relational("Order").unwrap();
        assert_eq!(
            orders.relation("tags").unwrap().join,
            Some(JoinSpec::Table(JoinTable::new("order_tags", "order_ref", "tag_ref")))
        );
    }

    #[test]
    fn test_inverse_side_has_no_join() {
        let registry = registry();
        registry
            .register_relationship(
                "User",
                "orders",
                RelationshipOptions::new("PLACED_BY", "Order")
                    .with_cardinality(Cardinality::OneToMany)
                    .with_inverse("buyer"),
            )
            .unwrap();

        let users = SchemaCompiler::new(&registry).compile_relational("User").unwrap();
        let orders = users.relation("orders").unwrap();
        assert!(!orders.owner);
        assert!(orders.join.is_none());
        assert!(users.column("orders").is_none());
    }

    #[test]
    fn test_custom_id_column() {
        let registry = registry();
        let config = CompilerConfig::default().with_relational_id_field("pk");
        let users = SchemaCompiler::with_config(&registry, config)
            .compile_relational("User")
            .unwrap();
        assert!(users.column("pk").unwrap().primary);
        assert_eq!(users.identifier.as_ref().unwrap().property, "id");
    }
}
