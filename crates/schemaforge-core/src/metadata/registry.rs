//! The metadata registry: stores per-class declarations and merges
//! inheritance chains into class descriptors.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use super::class::{ClassDecl, ClassDescriptor, ClassKind};
use super::property::{PropertyDeclaration, PropertyDescriptor, PropertyOptions};
use super::relationship::RelationshipOptions;
use super::types::{DefaultValue, ScalarType, TypeDescriptor};
use crate::config::RegistryConfig;
use crate::error::{Error, Result};

/// Options accepted by [`Registry::register_bulk`].
#[derive(Debug, Clone)]
pub enum MemberOptions {
    /// A plain property.
    Property(PropertyOptions),
    /// A relationship link.
    Relationship(RelationshipOptions),
}

impl From<PropertyOptions> for MemberOptions {
    fn from(options: PropertyOptions) -> Self {
        MemberOptions::Property(options)
    }
}

impl From<RelationshipOptions> for MemberOptions {
    fn from(options: RelationshipOptions) -> Self {
        MemberOptions::Relationship(options)
    }
}

/// Declarations collected for one class.
#[derive(Debug, Default)]
struct ClassEntry {
    /// Present once the class was registered as schema-eligible.
    decl: Option<ClassDecl>,
    /// Own declarations in first-registration order.
    declarations: Vec<(String, PropertyDeclaration)>,
}

impl ClassEntry {
    fn declare(&mut self, key: &str, incoming: PropertyDeclaration) {
        match self.declarations.iter_mut().find(|(k, _)| k == key) {
            Some((_, existing)) => existing.merge(&incoming),
            None => self.declarations.push((key.to_string(), incoming)),
        }
    }
}

#[derive(Debug, Default)]
struct RegistryState {
    classes: HashMap<String, ClassEntry>,
    /// Class names in first-seen order.
    order: Vec<String>,
}

impl RegistryState {
    fn entry(&mut self, class: &str) -> &mut ClassEntry {
        if !self.classes.contains_key(class) {
            self.order.push(class.to_string());
        }
        self.classes.entry(class.to_string()).or_default()
    }
}

/// A property being folded across the chain.
struct Folded {
    key: String,
    declaration: PropertyDeclaration,
    declared_in: String,
    /// Injected by the base abstraction and never re-declared.
    injected: bool,
}

/// Registry of class, property and relationship metadata.
///
/// Registration takes a write lock; merging and compilation only read. Once
/// model definition is complete the registry is effectively read-only.
#[derive(Debug, Default)]
pub struct Registry {
    config: RegistryConfig,
    state: RwLock<RegistryState>,
    generation: AtomicU64,
}

impl Registry {
    /// Create an empty registry with the default base abstraction.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty registry with a custom base abstraction.
    pub fn with_config(config: RegistryConfig) -> Self {
        Self {
            config,
            state: RwLock::new(RegistryState::default()),
            generation: AtomicU64::new(0),
        }
    }

    /// Registry configuration.
    pub fn config(&self) -> &RegistryConfig {
        &self.config
    }

    /// Counter bumped on every registration.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
    }

    /// Mark a class schema-eligible. Re-registering replaces the declaration.
    pub fn register_entity(&self, decl: ClassDecl) -> Result<()> {
        decl.validate()?;

        tracing::debug!(class = %decl.name, parent = ?decl.parent, kind = ?decl.kind, "registering class");
        let name = decl.name.clone();
        self.state.write().entry(&name).decl = Some(decl);
        self.bump();
        Ok(())
    }

    /// Register or update a property on a class.
    pub fn register_property(&self, class: &str, key: &str, options: PropertyOptions) -> Result<()> {
        self.register_bulk(class, [(key, MemberOptions::Property(options))])
    }

    /// Register or update a relationship on a class.
    pub fn register_relationship(
        &self,
        class: &str,
        key: &str,
        options: RelationshipOptions,
    ) -> Result<()> {
        self.register_bulk(class, [(key, MemberOptions::Relationship(options))])
    }

    /// Register several members at once.
    ///
    /// Equivalent to repeated single registrations, except that nothing is
    /// applied if any member is malformed.
    pub fn register_bulk<K, O>(
        &self,
        class: &str,
        members: impl IntoIterator<Item = (K, O)>,
    ) -> Result<()>
    where
        K: AsRef<str>,
        O: Into<MemberOptions>,
    {
        if class.trim().is_empty() {
            return Err(Error::invalid("class name is empty"));
        }

        let mut declarations = Vec::new();
        for (key, options) in members {
            let key = key.as_ref();
            if key.trim().is_empty() {
                return Err(Error::invalid(format!("empty property key on {}", class)));
            }
            let declaration = match options.into() {
                MemberOptions::Property(options) => {
                    options
                        .validate()
                        .map_err(|e| Error::invalid(format!("{}.{}: {}", class, key, e)))?;
                    PropertyDeclaration {
                        options,
                        relationship: None,
                    }
                }
                MemberOptions::Relationship(relationship) => {
                    relationship
                        .validate()
                        .map_err(|e| Error::invalid(format!("{}.{}: {}", class, key, e)))?;
                    PropertyDeclaration {
                        options: PropertyOptions::default(),
                        relationship: Some(relationship),
                    }
                }
            };
            declarations.push((key.to_string(), declaration));
        }

        let mut state = self.state.write();
        let entry = state.entry(class);
        for (key, declaration) in declarations {
            tracing::debug!(class, key = %key, relationship = declaration.relationship.is_some(), "registering member");
            entry.declare(&key, declaration);
        }
        drop(state);
        self.bump();
        Ok(())
    }

    /// Check if a class was registered as schema-eligible.
    pub fn is_registered(&self, class: &str) -> bool {
        self.state
            .read()
            .classes
            .get(class)
            .is_some_and(|e| e.decl.is_some())
    }

    /// Names of all schema-eligible classes in registration order.
    pub fn classes(&self) -> Vec<String> {
        let state = self.state.read();
        state
            .order
            .iter()
            .filter(|name| state.classes.get(*name).is_some_and(|e| e.decl.is_some()))
            .cloned()
            .collect()
    }

    /// Merge a class's declarations over its full superclass chain.
    pub fn merged_descriptor(&self, class: &str) -> Result<ClassDescriptor> {
        let state = self.state.read();
        let chain = Self::lineage(&state, class)?;

        let root = chain[0];
        let kind = root.kind.ok_or_else(|| {
            Error::invalid(format!("root class {} must declare a kind", root.name))
        })?;
        for decl in &chain[1..] {
            if let Some(own) = decl.kind {
                if own != kind {
                    return Err(Error::invalid(format!(
                        "class {} declares kind {:?} but its hierarchy is {:?}",
                        decl.name, own, kind
                    )));
                }
            }
        }

        let mut folded = self.base_properties(kind, &root.name);
        for decl in &chain {
            let Some(entry) = state.classes.get(&decl.name) else {
                continue;
            };
            for (key, declaration) in &entry.declarations {
                match folded.iter_mut().find(|f| &f.key == key) {
                    Some(existing) => {
                        existing.declaration.merge(declaration);
                        existing.declared_in = decl.name.clone();
                        existing.injected = false;
                    }
                    None => folded.push(Folded {
                        key: key.clone(),
                        declaration: declaration.clone(),
                        declared_in: decl.name.clone(),
                        injected: false,
                    }),
                }
            }
        }
        let lineage: Vec<String> = chain.iter().map(|d| d.name.clone()).collect();
        let table_name = chain_table_name(&chain);
        drop(state);

        self.settle_identifier(class, kind, &mut folded)?;

        let properties = folded
            .into_iter()
            .map(|f| Self::resolve(class, f))
            .collect::<Result<Vec<_>>>()?;

        Ok(ClassDescriptor {
            name: class.to_string(),
            kind,
            lineage,
            table_name,
            properties,
        })
    }

    /// Walk from `class` up to its root; returned root first.
    fn lineage<'a>(state: &'a RegistryState, class: &str) -> Result<Vec<&'a ClassDecl>> {
        let mut chain = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(class.to_string());

        while let Some(name) = current {
            if !seen.insert(name.clone()) {
                return Err(Error::invalid(format!(
                    "inheritance cycle through class {}",
                    name
                )));
            }
            let decl = state
                .classes
                .get(&name)
                .and_then(|e| e.decl.as_ref())
                .ok_or_else(|| Error::missing_class(name.clone()))?;
            current = decl.parent.clone();
            chain.push(decl);
        }

        chain.reverse();
        Ok(chain)
    }

    /// Properties supplied by the base abstraction, as if declared at the root.
    fn base_properties(&self, kind: ClassKind, root: &str) -> Vec<Folded> {
        if kind != ClassKind::Entity {
            return Vec::new();
        }

        let mut base = vec![Folded {
            key: self.config.identifier_key.clone(),
            declaration: PropertyDeclaration {
                options: PropertyOptions::identifier()
                    .as_identifier()
                    .required()
                    .with_default(DefaultValue::AutoUuid),
                relationship: None,
            },
            declared_in: root.to_string(),
            injected: true,
        }];

        if self.config.inject_timestamps {
            for key in &self.config.timestamp_keys {
                base.push(Folded {
                    key: key.clone(),
                    declaration: PropertyDeclaration {
                        options: PropertyOptions::scalar(ScalarType::Timestamp)
                            .required()
                            .with_default(DefaultValue::CurrentTimestamp),
                        relationship: None,
                    },
                    declared_in: root.to_string(),
                    injected: true,
                });
            }
        }
        base
    }

    /// Ensure at most one identifier, synthesizing one for entities.
    fn settle_identifier(&self, class: &str, kind: ClassKind, folded: &mut Vec<Folded>) -> Result<()> {
        let is_identifier = |f: &Folded| f.declaration.options.is_identifier == Some(true);

        let explicit = folded.iter().filter(|f| is_identifier(f) && !f.injected).count();
        if explicit > 0 {
            folded.retain(|f| !(f.injected && is_identifier(f)));
        }

        let identifiers: Vec<&str> = folded
            .iter()
            .filter(|f| is_identifier(f))
            .map(|f| f.key.as_str())
            .collect();
        if identifiers.len() > 1 {
            return Err(Error::invalid(format!(
                "class {} declares more than one identifier: {}",
                class,
                identifiers.join(", ")
            )));
        }

        if identifiers.is_empty() && kind == ClassKind::Entity {
            let key = &self.config.identifier_key;
            if folded.iter().any(|f| &f.key == key) {
                return Err(Error::invalid(format!(
                    "class {} has no identifier and {} is taken by a non-identifier property",
                    class, key
                )));
            }
            tracing::debug!(class, key = %key, "synthesizing identifier");
            folded.insert(
                0,
                Folded {
                    key: key.clone(),
                    declaration: PropertyDeclaration {
                        options: PropertyOptions::identifier()
                            .as_identifier()
                            .required()
                            .with_default(DefaultValue::AutoUuid),
                        relationship: None,
                    },
                    declared_in: class.to_string(),
                    injected: true,
                },
            );
        }
        Ok(())
    }

    fn resolve(class: &str, folded: Folded) -> Result<PropertyDescriptor> {
        let Folded {
            key,
            declaration,
            declared_in,
            ..
        } = folded;
        let options = declaration.options;

        let relationship = match &declaration.relationship {
            Some(rel) => Some(rel.resolve().ok_or_else(|| {
                Error::invalid(format!(
                    "relationship {}.{} needs an edge type and a target",
                    class, key
                ))
            })?),
            None => None,
        };

        let declared_type = match (options.declared_type, &relationship) {
            (Some(ty), _) => ty,
            (None, Some(rel)) if rel.cardinality.is_to_many() => {
                TypeDescriptor::array(TypeDescriptor::Identifier)
            }
            (None, Some(_)) => TypeDescriptor::Identifier,
            (None, None) => {
                return Err(Error::invalid(format!(
                    "property {}.{} has no declared type",
                    class, key
                )))
            }
        };

        Ok(PropertyDescriptor {
            key,
            declared_type,
            unique: options.unique.unwrap_or(false),
            // Links may be empty until related instances exist.
            optional: options.optional.unwrap_or(relationship.is_some()),
            is_identifier: options.is_identifier.unwrap_or(false),
            enum_values: options.enum_values,
            default: options.default,
            unique_group: options.unique_group,
            relationship,
            declared_in,
        })
    }
}

/// Table name of the most-derived class in a non-empty chain.
fn chain_table_name(chain: &[&ClassDecl]) -> String {
    chain
        .last()
        .map(|decl| decl.table_name.clone().unwrap_or_else(|| decl.name.clone()))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{Cardinality, EnumValues};

    fn registry() -> Registry {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("Base")).unwrap();
        registry
            .register_entity(ClassDecl::derived("Middle", "Base"))
            .unwrap();
        registry
            .register_entity(ClassDecl::derived("Leaf", "Middle"))
            .unwrap();
        registry
    }

    #[test]
    fn test_entity_gets_base_properties() {
        let registry = registry();
        let descriptor = registry.merged_descriptor("Base").unwrap();

        let keys: Vec<_> = descriptor.properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["id", "created_at", "updated_at"]);
        let id = descriptor.identifier().unwrap();
        assert_eq!(id.declared_type, TypeDescriptor::Identifier);
        assert_eq!(id.default, Some(DefaultValue::AutoUuid));
    }

    #[test]
    fn test_most_derived_declaration_wins() {
        let registry = registry();
        registry
            .register_property("Base", "label", PropertyOptions::string().optional())
            .unwrap();
        registry
            .register_property("Middle", "label", PropertyOptions::overriding().unique())
            .unwrap();
        registry
            .register_property("Leaf", "label", PropertyOptions::overriding().required())
            .unwrap();

        let leaf = registry.merged_descriptor("Leaf").unwrap();
        let label: Vec<_> = leaf.properties.iter().filter(|p| p.key == "label").collect();
        assert_eq!(label.len(), 1);
        assert!(!label[0].optional);
        assert!(label[0].unique);
        assert_eq!(label[0].declared_in, "Leaf");

        let base = registry.merged_descriptor("Base").unwrap();
        let label = base.get("label").unwrap();
        assert!(label.optional);
        assert!(!label.unique);
    }

    #[test]
    fn test_explicit_identifier_replaces_injected() {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("Product")).unwrap();
        registry
            .register_property("Product", "sku", PropertyOptions::identifier().as_identifier())
            .unwrap();

        let descriptor = registry.merged_descriptor("Product").unwrap();
        assert!(descriptor.get("id").is_none());
        assert_eq!(descriptor.identifier().unwrap().key, "sku");
    }

    #[test]
    fn test_two_identifiers_rejected() {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("Product")).unwrap();
        registry
            .register_property("Product", "sku", PropertyOptions::string().as_identifier())
            .unwrap();
        registry
            .register_property("Product", "code", PropertyOptions::string().as_identifier())
            .unwrap();

        assert!(matches!(
            registry.merged_descriptor("Product"),
            Err(Error::InvalidRegistration(_))
        ));
    }

    #[test]
    fn test_value_object_has_no_identifier() {
        let registry = Registry::new();
        registry
            .register_entity(ClassDecl::value_object("Address"))
            .unwrap();
        registry
            .register_property("Address", "city", PropertyOptions::string())
            .unwrap();

        let descriptor = registry.merged_descriptor("Address").unwrap();
        assert!(descriptor.identifier().is_none());
        assert_eq!(descriptor.properties.len(), 1);
    }

    #[test]
    fn test_missing_class_and_parent() {
        let registry = Registry::new();
        assert!(matches!(
            registry.merged_descriptor("Ghost"),
            Err(Error::MetadataMissing { .. })
        ));

        registry
            .register_entity(ClassDecl::derived("Orphan", "Ghost"))
            .unwrap();
        match registry.merged_descriptor("Orphan") {
            Err(Error::MetadataMissing { class, .. }) => assert_eq!(class, "Ghost"),
            other => panic!("expected MetadataMissing, got {:?}", other),
        }
    }

    #[test]
    fn test_inheritance_cycle_rejected() {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::derived("A", "B")).unwrap();
        registry.register_entity(ClassDecl::derived("B", "A")).unwrap();

        assert!(matches!(
            registry.merged_descriptor("A"),
            Err(Error::InvalidRegistration(_))
        ));
    }

    #[test]
    fn test_properties_before_class_registration() {
        let registry = Registry::new();
        registry
            .register_property("Late", "name", PropertyOptions::string())
            .unwrap();
        assert!(!registry.is_registered("Late"));

        registry.register_entity(ClassDecl::entity("Late")).unwrap();
        assert!(registry.merged_descriptor("Late").unwrap().get("name").is_some());
    }

    #[test]
    fn test_reregistration_updates_in_place() {
        let registry = registry();
        registry
            .register_property("Base", "a", PropertyOptions::string())
            .unwrap();
        registry
            .register_property("Base", "b", PropertyOptions::string())
            .unwrap();
        registry
            .register_property("Base", "a", PropertyOptions::overriding().unique())
            .unwrap();

        let descriptor = registry.merged_descriptor("Base").unwrap();
        let keys: Vec<_> = descriptor.properties.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["id", "created_at", "updated_at", "a", "b"]);
        assert!(descriptor.get("a").unwrap().unique);
    }

    #[test]
    fn test_bulk_equals_single() {
        let single = registry();
        single
            .register_property("Base", "name", PropertyOptions::string())
            .unwrap();
        single
            .register_property(
                "Base",
                "status",
                PropertyOptions::string().with_enum(EnumValues::new(["A", "B"])),
            )
            .unwrap();

        let bulk = registry();
        bulk.register_bulk(
            "Base",
            [
                ("name", PropertyOptions::string()),
                (
                    "status",
                    PropertyOptions::string().with_enum(EnumValues::new(["A", "B"])),
                ),
            ],
        )
        .unwrap();

        assert_eq!(
            single.merged_descriptor("Base").unwrap(),
            bulk.merged_descriptor("Base").unwrap()
        );
    }

    #[test]
    fn test_bulk_rejects_malformed_atomically() {
        let registry = registry();
        let result = registry.register_bulk(
            "Base",
            [
                ("ok", PropertyOptions::string()),
                ("bad", PropertyOptions::string().with_enum(EnumValues::new(Vec::<String>::new()))),
            ],
        );

        assert!(result.is_err());
        assert!(registry.merged_descriptor("Base").unwrap().get("ok").is_none());
    }

    #[test]
    fn test_untyped_property_rejected_at_merge() {
        let registry = registry();
        registry
            .register_property("Base", "mystery", PropertyOptions::overriding())
            .unwrap();
        assert!(registry.merged_descriptor("Base").is_err());
    }

    #[test]
    fn test_relationship_type_defaults() {
        let registry = registry();
        registry
            .register_relationship(
                "Base",
                "friends",
                RelationshipOptions::new("FRIEND_OF", "Base"),
            )
            .unwrap();
        registry
            .register_relationship(
                "Base",
                "manager",
                RelationshipOptions::new("MANAGED_BY", "Base")
                    .with_cardinality(Cardinality::ManyToOne),
            )
            .unwrap();

        let descriptor = registry.merged_descriptor("Base").unwrap();
        assert!(descriptor.get("friends").unwrap().declared_type.is_array());
        assert!(descriptor.get("friends").unwrap().optional);
        assert_eq!(
            descriptor.get("manager").unwrap().declared_type,
            TypeDescriptor::Identifier
        );
    }

    #[test]
    fn test_relationship_required_when_declared() {
        let registry = registry();
        registry
            .register_relationship(
                "Base",
                "owner",
                RelationshipOptions::new("OWNED_BY", "Base").with_cardinality(Cardinality::ManyToOne),
            )
            .unwrap();
        registry
            .register_property("Base", "owner", PropertyOptions::overriding().required())
            .unwrap();

        let descriptor = registry.merged_descriptor("Base").unwrap();
        assert!(!descriptor.get("owner").unwrap().optional);
    }

    #[test]
    fn test_generation_bumps() {
        let registry = Registry::new();
        let before = registry.generation();
        registry.register_entity(ClassDecl::entity("X")).unwrap();
        assert!(registry.generation() > before);
    }

    #[test]
    fn test_custom_base_abstraction() {
        let registry =
            Registry::with_config(RegistryConfig::default().with_identifier_key("uuid").without_timestamps());
        registry.register_entity(ClassDecl::entity("Thing")).unwrap();

        let descriptor = registry.merged_descriptor("Thing").unwrap();
        assert_eq!(descriptor.properties.len(), 1);
        assert_eq!(descriptor.identifier().unwrap().key, "uuid");
    }
}
