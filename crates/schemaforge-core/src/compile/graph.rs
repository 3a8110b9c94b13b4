//! Graph-schema compiler.
//!
//! One node per class with a flat property map. Embedded structures are not
//! expanded into further nodes; they become opaque object properties. Only
//! relationship properties produce edges.

use serde::{Deserialize, Serialize};

use super::document::innermost_enum;
use super::{unique_constraints, IdMapping, SchemaCompiler, UniqueConstraint};
use crate::classify::Classification;
use crate::error::Result;
use crate::metadata::{Cardinality, DefaultValue, Direction, EnumValues, ScalarType};

/// Type tag of a node property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GraphPropertyType {
    /// Scalar value.
    Scalar(ScalarType),
    /// Homogeneous array of scalars.
    ScalarArray(ScalarType),
    /// Serialized structure.
    Object,
    /// Array of serialized structures.
    ObjectArray,
}

impl GraphPropertyType {
    /// Type tag, e.g. `string`, `integer[]` or `object`.
    pub fn tag(&self) -> String {
        match self {
            GraphPropertyType::Scalar(scalar) => scalar.graph_type().to_string(),
            GraphPropertyType::ScalarArray(scalar) => format!("{}[]", scalar.graph_type()),
            GraphPropertyType::Object => "object".to_string(),
            GraphPropertyType::ObjectArray => "object[]".to_string(),
        }
    }
}

/// A node property.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphProperty {
    /// Property name.
    pub name: String,
    /// Type tag.
    pub property_type: GraphPropertyType,
    /// Property must be present.
    pub required: bool,
    /// Property value must be unique per label.
    pub unique: bool,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Allowed values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<EnumValues>,
}

/// A node label with its properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeDef {
    /// Node label (class name).
    pub label: String,
    /// Flattened properties in declaration order.
    pub properties: Vec<GraphProperty>,
    /// Mapping from the domain identifier to the node property.
    pub id_mapping: Option<IdMapping>,
    /// Uniqueness constraints to create on this label.
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl NodeDef {
    /// Get a property by name.
    pub fn property(&self, name: &str) -> Option<&GraphProperty> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// A relationship type between two labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphRelationship {
    /// Label of the declaring class.
    pub source_label: String,
    /// Label of the related class.
    pub target_label: String,
    /// Relationship type.
    #[serde(rename = "type")]
    pub rel_type: String,
    /// Edge direction relative to the source.
    pub direction: Direction,
    /// Cardinality as declared on the source.
    pub cardinality: Cardinality,
    /// Properties stored on the edge.
    pub edge_properties: Vec<String>,
}

impl GraphRelationship {
    fn same_edge(&self, other: &GraphRelationship) -> bool {
        self.source_label == other.source_label
            && self.rel_type == other.rel_type
            && self.target_label == other.target_label
    }
}

/// Node and relationship definitions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GraphSchema {
    /// Node definitions, one per class.
    pub nodes: Vec<NodeDef>,
    /// Relationship definitions, unique by `(source, type, target)`.
    pub relationships: Vec<GraphRelationship>,
}

impl GraphSchema {
    /// Get a node by label.
    pub fn node(&self, label: &str) -> Option<&NodeDef> {
        self.nodes.iter().find(|n| n.label == label)
    }

    /// Add a relationship unless an equal `(source, type, target)` exists.
    pub fn add_relationship(&mut self, relationship: GraphRelationship) -> bool {
        if self.relationships.iter().any(|r| r.same_edge(&relationship)) {
            return false;
        }
        self.relationships.push(relationship);
        true
    }

    /// Merge another schema in, keeping the first node per label.
    pub fn absorb(&mut self, other: GraphSchema) {
        for node in other.nodes {
            if self.node(&node.label).is_none() {
                self.nodes.push(node);
            }
        }
        for relationship in other.relationships {
            self.add_relationship(relationship);
        }
    }
}

impl<'a> SchemaCompiler<'a> {
    pub(crate) fn graph_for(&self, class: &str) -> Result<GraphSchema> {
        let descriptor = self.registry().merged_descriptor(class)?;
        let classifier = self.classifier();
        let id_field = &self.config().graph_id_field;

        let mut schema = GraphSchema::default();
        let mut properties = Vec::new();
        let mut id_mapping = None;

        for property in &descriptor.properties {
            let classification = classifier.classify(property);
            let property_type = match &classification {
                Classification::Relationship(relationship) => {
                    let target = self.resolve_target(class, property, relationship)?;
                    let added = schema.add_relationship(GraphRelationship {
                        source_label: descriptor.name.clone(),
                        target_label: target,
                        rel_type: relationship.edge_type.clone(),
                        direction: relationship.direction,
                        cardinality: relationship.cardinality,
                        edge_properties: relationship.edge_projected_properties.clone(),
                    });
                    if !added {
                        tracing::debug!(class, key = %property.key, edge = %relationship.edge_type, "collapsing duplicate relationship");
                    }
                    continue;
                }
                other => graph_property_type(other),
            };

            let mut name = property.key.clone();
            if property.is_identifier {
                name = id_field.clone();
                id_mapping = Some(IdMapping {
                    property: property.key.clone(),
                    field: id_field.clone(),
                });
            }

            properties.push(GraphProperty {
                name,
                property_type,
                required: !property.optional || property.is_identifier,
                unique: property.requires_unique(),
                default: property.default.clone(),
                enum_values: innermost_enum(&classification).cloned(),
            });
        }

        let unique = unique_constraints(&descriptor, |p| {
            if p.is_identifier {
                id_field.clone()
            } else {
                p.key.clone()
            }
        });

        schema.nodes.push(NodeDef {
            label: descriptor.name,
            properties,
            id_mapping,
            unique_constraints: unique,
        });
        Ok(schema)
    }
}

fn graph_property_type(classification: &Classification) -> GraphPropertyType {
    match classification {
        Classification::ArrayOf(element) => match element.scalar() {
            Some(scalar) => GraphPropertyType::ScalarArray(scalar),
            None => GraphPropertyType::ObjectArray,
        },
        Classification::Embedded(_) => GraphPropertyType::Object,
        other => other
            .scalar()
            .map(GraphPropertyType::Scalar)
            .unwrap_or(GraphPropertyType::Object),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{
        ClassDecl, PropertyOptions, Registry, RelationshipOptions, TargetResolver, TypeDescriptor,
    };

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("Person")).unwrap();
        registry
            .register_entity(ClassDecl::value_object("Address"))
            .unwrap();
        registry
            .register_property("Address", "city", PropertyOptions::string())
            .unwrap();
        registry
            .register_bulk(
                "Person",
                [
                    ("name", PropertyOptions::string()),
                    ("address", PropertyOptions::typed(TypeDescriptor::class("Address"))),
                    (
                        "history",
                        PropertyOptions::typed(TypeDescriptor::array(TypeDescriptor::class(
                            "Address",
                        ))),
                    ),
                    (
                        "scores",
                        PropertyOptions::typed(TypeDescriptor::array(TypeDescriptor::scalar(
                            ScalarType::Int64,
                        ))),
                    ),
                ],
            )
            .unwrap();
        registry
    }

    #[test]
    fn test_single_node_with_flat_properties() {
        let registry = registry();
        let schema = SchemaCompiler::new(&registry).compile_graph("Person").unwrap();

        assert_eq!(schema.nodes.len(), 1);
        let node = schema.node("Person").unwrap();
        assert_eq!(node.property("address").unwrap().property_type.tag(), "object");
        assert_eq!(node.property("history").unwrap().property_type.tag(), "object[]");
        assert_eq!(node.property("scores").unwrap().property_type.tag(), "integer[]");

        let id = node.property("id").unwrap();
        assert!(id.unique);
        assert_eq!(id.property_type, GraphPropertyType::Scalar(ScalarType::String));
    }

    #[test]
    fn test_relationships_deduplicated() {
        let registry = registry();
        let knows = || RelationshipOptions::new("KNOWS", "Person");
        registry
            .register_relationship("Person", "friends", knows())
            .unwrap();
        registry
            .register_relationship(
                "Person",
                "acquaintances",
                knows().with_direction(Direction::Both),
            )
            .unwrap();
        registry
            .register_relationship(
                "Person",
                "employer",
                RelationshipOptions::new(
                    "WORKS_AT",
                    TargetResolver::deferred(|| Some("Person".to_string())),
                )
                .with_edge_properties(["since"]),
            )
            .unwrap();

        let schema = SchemaCompiler::new(&registry).compile_graph("Person").unwrap();
        assert_eq!(schema.relationships.len(), 2);
        assert!(schema.node("Person").unwrap().property("friends").is_none());

        let works_at = schema
            .relationships
            .iter()
            .find(|r| r.rel_type == "WORKS_AT")
            .unwrap();
        assert_eq!(works_at.edge_properties, vec!["since".to_string()]);
    }

    #[test]
    fn test_graph_model_spans_classes() {
        let registry = registry();
        registry.register_entity(ClassDecl::entity("Company")).unwrap();
        registry
            .register_relationship("Person", "employer", RelationshipOptions::new("WORKS_AT", "Company"))
            .unwrap();
        registry
            .register_relationship(
                "Company",
                "staff",
                RelationshipOptions::new("EMPLOYS", "Person"),
            )
            .unwrap();

        let model = SchemaCompiler::new(&registry)
            .compile_graph_model(&["Person", "Company", "Person"])
            .unwrap();
        assert_eq!(model.nodes.len(), 2);
        assert_eq!(model.relationships.len(), 2);
    }
}
