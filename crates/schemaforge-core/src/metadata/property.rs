//! Property declarations and their merged descriptors.

use super::relationship::{RelationshipDescriptor, RelationshipOptions};
use super::types::{DefaultValue, EnumValues, ScalarType, TypeDescriptor};
use serde::{Deserialize, Serialize};

/// Per-property configuration as declared on a single class.
///
/// Every field is optional so that a derived class can re-declare only the
/// flags it wants to change. Merging is field-by-field: a declared field wins
/// over the inherited one, an undeclared field keeps the inherited value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PropertyOptions {
    /// Declared type.
    #[serde(rename = "type")]
    pub declared_type: Option<TypeDescriptor>,
    /// Value must be unique across all instances.
    pub unique: Option<bool>,
    /// Value may be absent.
    pub optional: Option<bool>,
    /// Property is the identity of the hierarchy.
    pub is_identifier: Option<bool>,
    /// Explicit enumerated values; always override inferred ones.
    #[serde(rename = "enum")]
    pub enum_values: Option<EnumValues>,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Composite unique key this property participates in.
    pub unique_group: Option<String>,
}

impl PropertyOptions {
    /// Options with a declared type and nothing else.
    pub fn typed(declared_type: TypeDescriptor) -> Self {
        Self {
            declared_type: Some(declared_type),
            ..Default::default()
        }
    }

    /// Options for a scalar property.
    pub fn scalar(scalar: ScalarType) -> Self {
        Self::typed(TypeDescriptor::Scalar(scalar))
    }

    /// Options for a string property.
    pub fn string() -> Self {
        Self::scalar(ScalarType::String)
    }

    /// Options for a domain identifier wrapper property.
    pub fn identifier() -> Self {
        Self::typed(TypeDescriptor::Identifier)
    }

    /// Options with no type, used to override flags of an inherited property.
    pub fn overriding() -> Self {
        Self::default()
    }

    /// Mark as unique.
    pub fn unique(mut self) -> Self {
        self.unique = Some(true);
        self
    }

    /// Set whether the property may be absent.
    pub fn with_optional(mut self, optional: bool) -> Self {
        self.optional = Some(optional);
        self
    }

    /// Mark as optional.
    pub fn optional(self) -> Self {
        self.with_optional(true)
    }

    /// Mark as required.
    pub fn required(self) -> Self {
        self.with_optional(false)
    }

    /// Mark as the identity property.
    pub fn as_identifier(mut self) -> Self {
        self.is_identifier = Some(true);
        self
    }

    /// Set explicit enumerated values.
    pub fn with_enum(mut self, values: EnumValues) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Set the default value.
    pub fn with_default(mut self, default: DefaultValue) -> Self {
        self.default = Some(default);
        self
    }

    /// Join a composite unique key.
    pub fn in_unique_group(mut self, group: impl Into<String>) -> Self {
        self.unique_group = Some(group.into());
        self
    }

    /// Overlay `other` on top of `self`; fields declared in `other` win.
    pub fn merge(&mut self, other: &PropertyOptions) {
        if other.declared_type.is_some() {
            self.declared_type = other.declared_type.clone();
        }
        if other.unique.is_some() {
            self.unique = other.unique;
        }
        if other.optional.is_some() {
            self.optional = other.optional;
        }
        if other.is_identifier.is_some() {
            self.is_identifier = other.is_identifier;
        }
        if other.enum_values.is_some() {
            self.enum_values = other.enum_values.clone();
        }
        if other.default.is_some() {
            self.default = other.default.clone();
        }
        if other.unique_group.is_some() {
            self.unique_group = other.unique_group.clone();
        }
    }

    pub(crate) fn validate(&self) -> Result<(), String> {
        if let Some(ty) = &self.declared_type {
            ty.validate()?;
        }
        if let Some(values) = &self.enum_values {
            values.validate()?;
        }
        if matches!(&self.unique_group, Some(g) if g.is_empty()) {
            return Err("unique group name is empty".into());
        }
        Ok(())
    }
}

/// A property as declared on one class: plain options plus an optional
/// relationship.
#[derive(Debug, Clone, Default)]
pub struct PropertyDeclaration {
    pub(crate) options: PropertyOptions,
    pub(crate) relationship: Option<RelationshipOptions>,
}

impl PropertyDeclaration {
    pub(crate) fn merge(&mut self, other: &PropertyDeclaration) {
        self.options.merge(&other.options);
        match (&mut self.relationship, &other.relationship) {
            (Some(existing), Some(incoming)) => existing.merge(incoming),
            (None, Some(incoming)) => self.relationship = Some(incoming.clone()),
            _ => {}
        }
    }
}

/// A fully merged, immutable property descriptor.
#[derive(Debug, Clone, PartialEq)]
pub struct PropertyDescriptor {
    /// Property key, unique within the merged class.
    pub key: String,
    /// Declared type.
    pub declared_type: TypeDescriptor,
    /// Value must be unique.
    pub unique: bool,
    /// Value may be absent.
    pub optional: bool,
    /// Property is the identity of the hierarchy.
    pub is_identifier: bool,
    /// Explicit enumerated values.
    pub enum_values: Option<EnumValues>,
    /// Default value.
    pub default: Option<DefaultValue>,
    /// Composite unique key this property participates in.
    pub unique_group: Option<String>,
    /// Relationship configuration, if this property is a link.
    pub relationship: Option<RelationshipDescriptor>,
    /// Most-derived class that declared this property.
    pub declared_in: String,
}

impl PropertyDescriptor {
    /// Whether every backend must enforce uniqueness on this property.
    pub fn requires_unique(&self) -> bool {
        self.unique || self.is_identifier
    }

    /// Whether this property is a relationship link.
    pub fn is_relationship(&self) -> bool {
        self.relationship.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_derived_wins_field_by_field() {
        let mut base = PropertyOptions::string().optional().unique();
        base.merge(&PropertyOptions::overriding().required());

        assert_eq!(base.declared_type, Some(TypeDescriptor::Scalar(ScalarType::String)));
        assert_eq!(base.optional, Some(false));
        assert_eq!(base.unique, Some(true));
    }

    #[test]
    fn test_options_from_json() {
        let options: PropertyOptions = serde_json::from_str(
            r#"{"type": {"scalar": "string"}, "unique": true, "enum": ["A", "B"]}"#,
        )
        .unwrap();

        assert_eq!(options.unique, Some(true));
        assert_eq!(options.enum_values, Some(EnumValues::new(["A", "B"])));
        assert!(options.optional.is_none());
    }

    #[test]
    fn test_validate_rejects_empty_enum() {
        let options = PropertyOptions::string().with_enum(EnumValues::new(Vec::<String>::new()));
        assert!(options.validate().is_err());
    }
}
