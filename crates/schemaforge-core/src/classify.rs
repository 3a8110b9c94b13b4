//! Type classification: maps a declared type to a storage kind.
//!
//! Resolution order:
//! 1. relationship descriptor present → [`Classification::Relationship`]
//! 2. explicit `enum` option or enumerated type → [`Classification::EnumeratedSet`]
//! 3. identifier wrapper → [`Classification::WrappedIdentifier`]
//! 4. array → [`Classification::ArrayOf`] of the element's classification
//! 5. registered class → [`Classification::Embedded`]
//! 6. anything else → [`Classification::Primitive`]

use crate::metadata::{
    EnumValues, PropertyDescriptor, Registry, RelationshipDescriptor, ScalarType, TypeDescriptor,
};

/// Semantic storage kind of a property.
#[derive(Debug, Clone, PartialEq)]
pub enum Classification {
    /// A plain scalar.
    Primitive(ScalarType),
    /// Domain identifier wrapper, stored as a string.
    WrappedIdentifier,
    /// Scalar restricted to a finite value set.
    EnumeratedSet {
        /// Storage scalar of the set.
        scalar: ScalarType,
        /// Allowed values.
        values: EnumValues,
    },
    /// Nested structure of a registered class.
    Embedded(String),
    /// Collection of an element classification.
    ArrayOf(Box<Classification>),
    /// Link to another class.
    Relationship(RelationshipDescriptor),
}

impl Classification {
    /// Storage scalar for scalar-like classifications.
    pub fn scalar(&self) -> Option<ScalarType> {
        match self {
            Classification::Primitive(scalar) => Some(*scalar),
            Classification::WrappedIdentifier => Some(ScalarType::String),
            Classification::EnumeratedSet { scalar, .. } => Some(*scalar),
            _ => None,
        }
    }

    /// Allowed values for enumerated classifications.
    pub fn enum_values(&self) -> Option<&EnumValues> {
        match self {
            Classification::EnumeratedSet { values, .. } => Some(values),
            _ => None,
        }
    }

    /// Check if this is an embedded structure.
    pub fn is_embedded(&self) -> bool {
        matches!(self, Classification::Embedded(_))
    }
}

/// Classifies declared types against the registry.
pub struct TypeClassifier<'a> {
    registry: &'a Registry,
}

impl<'a> TypeClassifier<'a> {
    /// Create a classifier backed by `registry`.
    pub fn new(registry: &'a Registry) -> Self {
        Self { registry }
    }

    /// Classify a merged property.
    pub fn classify(&self, property: &PropertyDescriptor) -> Classification {
        if let Some(relationship) = &property.relationship {
            return Classification::Relationship(relationship.clone());
        }
        self.classify_type(&property.declared_type, property.enum_values.as_ref())
    }

    /// Classify a declared type. An explicit value set always overrides
    /// values inferred from the type and applies to array elements.
    pub fn classify_type(
        &self,
        declared: &TypeDescriptor,
        explicit_enum: Option<&EnumValues>,
    ) -> Classification {
        if let Some(values) = explicit_enum {
            return match declared {
                TypeDescriptor::Array(element) => Classification::ArrayOf(Box::new(
                    self.classify_type(element, Some(values)),
                )),
                _ => Classification::EnumeratedSet {
                    scalar: values.scalar_type(),
                    values: values.clone(),
                },
            };
        }

        match declared {
            TypeDescriptor::Enumeration { values, .. } => Classification::EnumeratedSet {
                scalar: values.scalar_type(),
                values: values.clone(),
            },
            TypeDescriptor::Identifier => Classification::WrappedIdentifier,
            TypeDescriptor::Array(element) => {
                Classification::ArrayOf(Box::new(self.classify_type(element, None)))
            }
            TypeDescriptor::Class(name) if self.registry.is_registered(name) => {
                Classification::Embedded(name.clone())
            }
            TypeDescriptor::Class(name) => {
                tracing::warn!(class = %name, "class reference is not registered, storing as opaque json");
                Classification::Primitive(ScalarType::Json)
            }
            TypeDescriptor::Scalar(scalar) => Classification::Primitive(*scalar),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ClassDecl, PropertyOptions, RelationshipOptions};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry
            .register_entity(ClassDecl::value_object("Address"))
            .unwrap();
        registry
            .register_property("Address", "city", PropertyOptions::string())
            .unwrap();
        registry
    }

    #[test]
    fn test_scalar_and_identifier() {
        let registry = registry();
        let classifier = TypeClassifier::new(&registry);

        assert_eq!(
            classifier.classify_type(&TypeDescriptor::scalar(ScalarType::Int32), None),
            Classification::Primitive(ScalarType::Int32)
        );
        let id = classifier.classify_type(&TypeDescriptor::Identifier, None);
        assert_eq!(id, Classification::WrappedIdentifier);
        assert_eq!(id.scalar(), Some(ScalarType::String));
    }

    #[test]
    fn test_enumeration_inferred_and_explicit() {
        let registry = registry();
        let classifier = TypeClassifier::new(&registry);

        let inferred = TypeDescriptor::enumeration("Priority", [1i64, 2, 3]);
        assert_eq!(
            classifier.classify_type(&inferred, None).scalar(),
            Some(ScalarType::Int64)
        );

        let explicit = EnumValues::new(["LOW", "HIGH"]);
        let classified = classifier.classify_type(&inferred, Some(&explicit));
        assert_eq!(classified.enum_values(), Some(&explicit));
        assert_eq!(classified.scalar(), Some(ScalarType::String));
    }

    #[test]
    fn test_array_element_classified_like_scalar() {
        let registry = registry();
        let classifier = TypeClassifier::new(&registry);

        let scalar = classifier.classify_type(&TypeDescriptor::scalar(ScalarType::String), None);
        let array = classifier.classify_type(
            &TypeDescriptor::array(TypeDescriptor::scalar(ScalarType::String)),
            None,
        );
        assert_eq!(array, Classification::ArrayOf(Box::new(scalar)));

        let tags = EnumValues::new(["a", "b"]);
        let array = classifier.classify_type(
            &TypeDescriptor::array(TypeDescriptor::scalar(ScalarType::String)),
            Some(&tags),
        );
        match array {
            Classification::ArrayOf(inner) => assert_eq!(inner.enum_values(), Some(&tags)),
            other => panic!("expected array, got {:?}", other),
        }
    }

    #[test]
    fn test_embedded_and_unregistered_class() {
        let registry = registry();
        let classifier = TypeClassifier::new(&registry);

        assert!(classifier
            .classify_type(&TypeDescriptor::class("Address"), None)
            .is_embedded());
        assert_eq!(
            classifier.classify_type(&TypeDescriptor::class("Unknown"), None),
            Classification::Primitive(ScalarType::Json)
        );
    }

    #[test]
    fn test_relationship_takes_precedence() {
        let registry = registry();
        registry.register_entity(ClassDecl::entity("User")).unwrap();
        registry
            .register_relationship("User", "home", RelationshipOptions::new("LIVES_AT", "Address"))
            .unwrap();
        registry
            .register_property("User", "home", PropertyOptions::typed(TypeDescriptor::class("Address")))
            .unwrap();

        let user = registry.merged_descriptor("User").unwrap();
        let classifier = TypeClassifier::new(&registry);
        assert!(matches!(
            classifier.classify(user.get("home").unwrap()),
            Classification::Relationship(_)
        ));
    }
}
