//! Document-schema compiler.
//!
//! Embedded classes become nested sub-schemas, relationships become lists of
//! string identifiers. Only root entities get an identifier field, mapped to
//! the configured document id field (`_id` by default).

use serde::{Deserialize, Serialize};

use super::{unique_constraints, IdMapping, SchemaCompiler, UniqueConstraint};
use crate::classify::Classification;
use crate::error::Result;
use crate::guard::DepthCheck;
use crate::metadata::{DefaultValue, EnumValues, PropertyDescriptor, ScalarType};

/// Shape of a document field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentFieldType {
    /// Scalar value.
    Scalar(ScalarType),
    /// Array of an element shape.
    Array(Box<DocumentFieldType>),
    /// Embedded sub-document.
    Nested(Box<DocumentSchema>),
    /// Array of string identifiers of another class's documents.
    References {
        /// Referenced class.
        target: String,
    },
}

impl DocumentFieldType {
    /// Driver type name, e.g. `String` or `[Number]`.
    pub fn type_name(&self) -> String {
        match self {
            DocumentFieldType::Scalar(scalar) => scalar.document_type().to_string(),
            DocumentFieldType::Array(element) => format!("[{}]", element.type_name()),
            DocumentFieldType::Nested(schema) if schema.is_empty() => "Object".to_string(),
            DocumentFieldType::Nested(schema) => schema.name.clone(),
            DocumentFieldType::References { .. } => "[String]".to_string(),
        }
    }
}

/// A single field of a document schema.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentField {
    /// Field name.
    pub name: String,
    /// Field shape.
    pub field_type: DocumentFieldType,
    /// Field must be present.
    pub required: bool,
    /// Field value must be unique.
    pub unique: bool,
    /// Default value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<DefaultValue>,
    /// Allowed values.
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<EnumValues>,
}

/// A nested document schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentSchema {
    /// Class name; empty for the placeholder schema.
    pub name: String,
    /// Fields in declaration order.
    pub fields: Vec<DocumentField>,
    /// Identifier field name, for root entities.
    pub identifier_field: Option<String>,
    /// Mapping from the domain identifier to the identifier field.
    pub id_mapping: Option<IdMapping>,
    /// Unique indexes to create.
    pub unique_constraints: Vec<UniqueConstraint>,
}

impl DocumentSchema {
    /// The placeholder emitted past the recursion limit.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Check if this is the placeholder schema.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.identifier_field.is_none()
    }

    /// Get a field by name.
    pub fn field(&self, name: &str) -> Option<&DocumentField> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Follow a chain of nested field names.
    pub fn nested(&self, path: &[&str]) -> Option<&DocumentSchema> {
        let mut current = self;
        for name in path {
            current = match &current.field(name)?.field_type {
                DocumentFieldType::Nested(schema) => schema,
                DocumentFieldType::Array(element) => match element.as_ref() {
                    DocumentFieldType::Nested(schema) => schema,
                    _ => return None,
                },
                _ => return None,
            };
        }
        Some(current)
    }
}

impl<'a> SchemaCompiler<'a> {
    pub(crate) fn document_at(&self, class: &str, depth: usize) -> Result<DocumentSchema> {
        if self.guard().check(depth) == DepthCheck::LimitReached {
            tracing::debug!(class, depth, "recursion limit reached, emitting empty document schema");
            return Ok(DocumentSchema::empty());
        }

        let descriptor = self.registry().merged_descriptor(class)?;
        let classifier = self.classifier();
        let root_identifier = depth == 0 && descriptor.is_entity();
        let id_field = &self.config().document_id_field;

        let mut fields = Vec::with_capacity(descriptor.properties.len());
        let mut id_mapping = None;

        for property in &descriptor.properties {
            let classification = classifier.classify(property);
            let field_type = self.document_field_type(class, property, &classification, depth)?;

            let mut field = DocumentField {
                name: property.key.clone(),
                field_type,
                required: !property.optional,
                unique: property.requires_unique(),
                default: property.default.clone(),
                enum_values: innermost_enum(&classification).cloned(),
            };

            if property.is_identifier {
                if classification == Classification::WrappedIdentifier && field.default.is_none() {
                    field.default = Some(DefaultValue::AutoUuid);
                }
                if root_identifier {
                    field.name = id_field.clone();
                    field.required = true;
                    id_mapping = Some(IdMapping {
                        property: property.key.clone(),
                        field: id_field.clone(),
                    });
                }
            }
            fields.push(field);
        }

        let unique = unique_constraints(&descriptor, |p| {
            if p.is_identifier && root_identifier {
                id_field.clone()
            } else {
                p.key.clone()
            }
        });

        Ok(DocumentSchema {
            name: descriptor.name,
            fields,
            identifier_field: id_mapping.as_ref().map(|m| m.field.clone()),
            id_mapping,
            unique_constraints: unique,
        })
    }

    fn document_field_type(
        &self,
        class: &str,
        property: &PropertyDescriptor,
        classification: &Classification,
        depth: usize,
    ) -> Result<DocumentFieldType> {
        Ok(match classification {
            Classification::Primitive(scalar) => DocumentFieldType::Scalar(*scalar),
            Classification::WrappedIdentifier => DocumentFieldType::Scalar(ScalarType::String),
            Classification::EnumeratedSet { scalar, .. } => DocumentFieldType::Scalar(*scalar),
            Classification::Embedded(target) => {
                DocumentFieldType::Nested(Box::new(self.document_at(target, depth + 1)?))
            }
            Classification::ArrayOf(element) => DocumentFieldType::Array(Box::new(
                self.document_field_type(class, property, element, depth)?,
            )),
            Classification::Relationship(relationship) => DocumentFieldType::References {
                target: self.resolve_target(class, property, relationship)?,
            },
        })
    }
}

/// Value set of an enumerated classification, looking through arrays.
pub(crate) fn innermost_enum(classification: &Classification) -> Option<&EnumValues> {
    match classification {
        Classification::EnumeratedSet { values, .. } => Some(values),
        Classification::ArrayOf(element) => innermost_enum(element),
        _ => None,
    }
}
