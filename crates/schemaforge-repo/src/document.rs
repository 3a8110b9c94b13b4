//! Embedded document repository bound to a compiled document schema.
//!
//! Documents live in the tree `docs:<Class>` keyed by identifier. The domain
//! identifier key (`id`) is stored under the schema's identifier field
//! (`_id`) and mapped back before hydration. Unique constraints from the
//! schema are enforced through a [`UniqueIndex`].

use std::marker::PhantomData;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Serialize;
use serde_json::{Map, Value};
use sled::Tree;

use schemaforge_core::compile::{DocumentField, DocumentSchema};
use schemaforge_core::{DefaultValue, EnumValue, Registry, SchemaCompiler};

use crate::error::{RepoError, Result};
use crate::query::{field_value, run_pipeline, SearchQuery, Stage};
use crate::record::{current_timestamp, Record};
use crate::repository::{HydrateFn, Repository};
use crate::unique_index::{Claim, UniqueIndex};

/// Prefix of the per-class document trees.
pub const DOCUMENT_TREE_PREFIX: &str = "docs:";

/// Sled-backed [`Repository`] for one root entity class.
pub struct DocumentRepository<T> {
    schema: DocumentSchema,
    /// Domain identifier key.
    id_key: String,
    /// Stored identifier field.
    id_field: String,
    documents: Tree,
    unique: UniqueIndex,
    hydrate: RwLock<Option<HydrateFn<T>>>,
    _entity: PhantomData<fn() -> T>,
}

impl<T> DocumentRepository<T>
where
    T: Serialize + Send + Sync + 'static,
{
    /// Bind a compiled schema to a database. The schema must describe a
    /// root entity.
    pub fn open(db: &sled::Db, schema: DocumentSchema) -> Result<Self> {
        let mapping = schema.id_mapping.clone().ok_or_else(|| {
            RepoError::InvalidEntity(format!("{} is not a root entity schema", schema.name))
        })?;
        let documents = db.open_tree(format!("{}{}", DOCUMENT_TREE_PREFIX, schema.name))?;
        let unique = UniqueIndex::open(db)?;

        tracing::debug!(entity = %schema.name, id_field = %mapping.field, "opened document repository");
        Ok(Self {
            schema,
            id_key: mapping.property,
            id_field: mapping.field,
            documents,
            unique,
            hydrate: RwLock::new(None),
            _entity: PhantomData,
        })
    }

    /// Compile the document schema of a registered class and bind it.
    pub fn for_class(db: &sled::Db, registry: &Registry, class: &str) -> Result<Self> {
        let schema = SchemaCompiler::new(registry).compile_document(class)?;
        Self::open(db, schema)
    }

    /// The bound schema.
    pub fn schema(&self) -> &DocumentSchema {
        &self.schema
    }

    /// Number of stored documents.
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Check if no documents are stored.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    fn entity(&self) -> &str {
        &self.schema.name
    }

    fn hydrator(&self) -> Result<HydrateFn<T>> {
        self.hydrate
            .read()
            .clone()
            .ok_or_else(|| RepoError::HydrationNotConfigured {
                entity: self.entity().to_string(),
            })
    }

    /// Serialize an entity and map it onto the stored field names.
    fn to_document(&self, entity: &T) -> Result<Map<String, Value>> {
        let mut document = match serde_json::to_value(entity)? {
            Value::Object(map) => map,
            other => {
                return Err(RepoError::InvalidEntity(format!(
                    "{} must serialize to an object, got {}",
                    self.entity(),
                    other
                )))
            }
        };
        if self.id_key != self.id_field {
            if let Some(id) = document.remove(&self.id_key) {
                document.insert(self.id_field.clone(), id);
            }
        }
        Ok(document)
    }

    /// Map a stored document back onto domain property names.
    fn from_document(&self, mut document: Map<String, Value>) -> Value {
        if self.id_key != self.id_field {
            if let Some(id) = document.remove(&self.id_field) {
                document.insert(self.id_key.clone(), id);
            }
        }
        Value::Object(document)
    }

    fn id_of(&self, document: &Map<String, Value>) -> Option<String> {
        document.get(&self.id_field).and_then(scalar_text)
    }

    fn id_field_def(&self) -> Option<&DocumentField> {
        self.schema.field(&self.id_field)
    }

    /// Assign an identifier when the entity carries none.
    fn assign_id(&self, document: &mut Map<String, Value>) -> Result<String> {
        if let Some(id) = self.id_of(document) {
            return Ok(id);
        }
        let generated = matches!(
            self.id_field_def().and_then(|f| f.default.as_ref()),
            Some(DefaultValue::AutoUuid) | None
        );
        if !generated {
            return Err(RepoError::InvalidEntity(format!(
                "{} has no {} and no generated default",
                self.entity(),
                self.id_key
            )));
        }
        let id = uuid::Uuid::new_v4().to_string();
        document.insert(self.id_field.clone(), Value::String(id.clone()));
        Ok(id)
    }

    /// Write schema defaults into absent fields. For defaulted fields a value
    /// in `previous` wins, so an update keeps what was generated on insert.
    fn fill_defaults(
        &self,
        document: &mut Map<String, Value>,
        previous: Option<&Map<String, Value>>,
    ) {
        let now = current_timestamp();
        for field in &self.schema.fields {
            let Some(default) = &field.default else {
                continue;
            };
            if document.get(&field.name).is_some_and(|v| !v.is_null()) {
                continue;
            }
            if let Some(kept) = previous.and_then(|p| p.get(&field.name)).filter(|v| !v.is_null()) {
                document.insert(field.name.clone(), kept.clone());
                continue;
            }
            let value = match default {
                DefaultValue::Null => Value::Null,
                DefaultValue::Bool(b) => Value::Bool(*b),
                DefaultValue::Int(i) => Value::from(*i),
                DefaultValue::Float(f) => Value::from(*f),
                DefaultValue::String(s) => Value::String(s.clone()),
                DefaultValue::CurrentTimestamp => Value::from(now),
                DefaultValue::AutoUuid => Value::String(uuid::Uuid::new_v4().to_string()),
            };
            document.insert(field.name.clone(), value);
        }
    }

    /// Check required fields and enumerated values.
    fn validate(&self, document: &Map<String, Value>) -> Result<()> {
        for field in &self.schema.fields {
            let value = document.get(&field.name).filter(|v| !v.is_null());
            match value {
                None if field.required && field.default.is_none() => {
                    return Err(RepoError::InvalidEntity(format!(
                        "{}.{} is required",
                        self.entity(),
                        field.name
                    )));
                }
                Some(value) => {
                    if let Some(allowed) = &field.enum_values {
                        let members: Vec<&Value> = match value {
                            Value::Array(items) => items.iter().collect(),
                            other => vec![other],
                        };
                        for member in members {
                            let accepted = enum_member(member)
                                .is_some_and(|m| allowed.values().contains(&m));
                            if !accepted {
                                return Err(RepoError::InvalidEntity(format!(
                                    "{}.{}: {} is not an allowed value",
                                    self.entity(),
                                    field.name,
                                    member
                                )));
                            }
                        }
                    }
                }
                None => {}
            }
        }
        Ok(())
    }

    /// Unique values a document claims. The identifier constraint is
    /// enforced by the document key itself; constraints with a missing
    /// field are skipped.
    fn claims(&self, document: &Value) -> Vec<Claim> {
        self.schema
            .unique_constraints
            .iter()
            .filter(|c| c.fields.iter().any(|f| f != &self.id_field))
            .filter_map(|constraint| {
                let values = constraint
                    .fields
                    .iter()
                    .map(|f| field_value(document, f).map(value_text))
                    .collect::<Option<Vec<_>>>()?;
                Some(Claim {
                    constraint: constraint.name.clone(),
                    fields: constraint.fields.clone(),
                    values,
                })
            })
            .collect()
    }

    fn load(&self, id: &str) -> Result<Option<Record>> {
        self.documents
            .get(id.as_bytes())?
            .map(|bytes| Record::from_bytes(&bytes))
            .transpose()
    }

    fn stored_documents(&self) -> Result<Vec<Value>> {
        self.documents
            .iter()
            .values()
            .map(|bytes| Record::from_bytes(&bytes?)?.document())
            .collect()
    }

    fn hydrate_all(&self, documents: Vec<Value>) -> Result<Vec<T>> {
        let hydrate = self.hydrator()?;
        documents
            .into_iter()
            .map(|document| match document {
                Value::Object(map) => hydrate(self.from_document(map)),
                other => Err(RepoError::Serialization(format!(
                    "stored {} document is not an object: {}",
                    self.entity(),
                    other
                ))),
            })
            .collect()
    }

    /// Release claims of a write that did not land, except those the stored
    /// document still holds.
    fn release_unheld(&self, claims: &[Claim], id: &str) -> Result<()> {
        let held = match self.load(id)? {
            Some(record) => self.claims(&record.document()?),
            None => Vec::new(),
        };
        for claim in claims.iter().filter(|c| !held.contains(c)) {
            self.unique.release(self.entity(), claim, id)?;
        }
        Ok(())
    }

    fn not_found(&self, id: &str) -> RepoError {
        RepoError::EntityNotFound {
            entity: self.entity().to_string(),
            id: id.to_string(),
        }
    }

    fn id_conflict(&self, id: &str) -> RepoError {
        RepoError::UniqueConstraintViolation {
            entity: self.entity().to_string(),
            constraint: format!("{}_{}_unique", self.entity(), self.id_key),
            fields: vec![self.id_field.clone()],
            value: id.to_string(),
        }
    }

    fn required_id(&self, document: &Map<String, Value>) -> Result<String> {
        self.id_of(document).ok_or_else(|| {
            RepoError::InvalidEntity(format!("{} has no {}", self.entity(), self.id_key))
        })
    }
}

#[async_trait]
impl<T> Repository<T> for DocumentRepository<T>
where
    T: Serialize + Send + Sync + 'static,
{
    fn on_hydrate(&self, hydrate: HydrateFn<T>) {
        *self.hydrate.write() = Some(hydrate);
    }

    async fn find_all(&self) -> Result<Vec<T>> {
        self.hydrator()?;
        self.hydrate_all(self.stored_documents()?)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<T>> {
        let hydrate = self.hydrator()?;
        match self.load(id)? {
            Some(record) => match record.document()? {
                Value::Object(map) => Ok(Some(hydrate(self.from_document(map))?)),
                other => Err(RepoError::Serialization(format!(
                    "stored {} document is not an object: {}",
                    self.entity(),
                    other
                ))),
            },
            None => Ok(None),
        }
    }

    async fn insert(&self, entity: &T) -> Result<String> {
        let mut document = self.to_document(entity)?;
        let id = self.assign_id(&mut document)?;
        self.fill_defaults(&mut document, None);
        self.validate(&document)?;

        let document = Value::Object(document);
        let bytes = Record::new(serde_json::to_vec(&document)?).to_bytes()?;

        // Reserve the key first so claims never touch another document's values.
        let reserved = self
            .documents
            .compare_and_swap(id.as_bytes(), None as Option<&[u8]>, Some(bytes.as_slice()))?;
        if reserved.is_err() {
            return Err(self.id_conflict(&id));
        }

        let claims = self.claims(&document);
        if let Err(err) = self.unique.claim_all(self.entity(), &claims, &id) {
            let _ = self.documents.compare_and_swap(
                id.as_bytes(),
                Some(bytes.as_slice()),
                None as Option<&[u8]>,
            )?;
            return Err(err);
        }

        tracing::info!(entity = %self.entity(), id = %id, "inserted document");
        Ok(id)
    }

    async fn update(&self, entity: &T) -> Result<()> {
        let document = self.to_document(entity)?;
        let id = self.required_id(&document)?;

        // Optimistic loop: the write only lands if the stored bytes are the
        // ones the claim diff was computed against.
        loop {
            let previous_bytes = self
                .documents
                .get(id.as_bytes())?
                .ok_or_else(|| self.not_found(&id))?;
            let previous = Record::from_bytes(&previous_bytes)?;
            let previous_document = previous.document()?;

            let mut next = document.clone();
            self.fill_defaults(&mut next, previous_document.as_object());
            self.validate(&next)?;
            let next = Value::Object(next);
            let bytes = previous.updated(serde_json::to_vec(&next)?).to_bytes()?;

            let old_claims = self.claims(&previous_document);
            let new_claims = self.claims(&next);
            let added: Vec<Claim> = new_claims
                .iter()
                .filter(|c| !old_claims.contains(c))
                .cloned()
                .collect();
            self.unique.claim_all(self.entity(), &added, &id)?;

            let swapped = match self.documents.compare_and_swap(
                id.as_bytes(),
                Some(&previous_bytes),
                Some(bytes),
            ) {
                Ok(swapped) => swapped,
                Err(err) => {
                    self.release_unheld(&added, &id)?;
                    return Err(err.into());
                }
            };
            if swapped.is_err() {
                tracing::debug!(entity = %self.entity(), id = %id, "document changed during update, retrying");
                self.release_unheld(&added, &id)?;
                continue;
            }

            for stale in old_claims.iter().filter(|c| !new_claims.contains(c)) {
                self.unique.release(self.entity(), stale, &id)?;
            }
            tracing::debug!(entity = %self.entity(), id = %id, claimed = added.len(), "updated document");
            return Ok(());
        }
    }

    async fn delete(&self, entity: &T) -> Result<()> {
        let document = self.to_document(entity)?;
        let id = self.required_id(&document)?;

        let removed = self
            .documents
            .remove(id.as_bytes())?
            .ok_or_else(|| self.not_found(&id))?;
        for claim in self.claims(&Record::from_bytes(&removed)?.document()?) {
            self.unique.release(self.entity(), &claim, &id)?;
        }

        tracing::debug!(entity = %self.entity(), id = %id, "deleted document");
        Ok(())
    }

    async fn search(&self, query: &SearchQuery) -> Result<Vec<T>> {
        self.hydrator()?;
        self.hydrate_all(query.apply(self.stored_documents()?))
    }

    async fn aggregate(&self, pipeline: &[Stage]) -> Result<Vec<Value>> {
        Ok(run_pipeline(self.stored_documents()?, pipeline))
    }
}

/// Text of a scalar identifier value.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Text form of a value for the unique index.
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn enum_member(value: &Value) -> Option<EnumValue> {
    match value {
        Value::String(s) => Some(EnumValue::Text(s.clone())),
        Value::Number(n) => n.as_i64().map(EnumValue::Int),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use schemaforge_core::{ClassDecl, EnumValues, PropertyOptions};
    use serde_json::json;

    fn repository() -> DocumentRepository<Value> {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("User")).unwrap();
        registry
            .register_bulk(
                "User",
                [
                    ("email", PropertyOptions::string().unique()),
                    (
                        "role",
                        PropertyOptions::string()
                            .with_enum(EnumValues::new(["ADMIN", "MEMBER"]))
                            .optional(),
                    ),
                ],
            )
            .unwrap();
        let db = sled::Config::new().temporary(true).open().unwrap();
        DocumentRepository::for_class(&db, &registry, "User").unwrap()
    }

    #[test]
    fn test_id_mapping() {
        let repo = repository();
        let mut document = repo.to_document(&json!({"id": "u1", "email": "a@x"})).unwrap();
        assert_eq!(document.get("_id"), Some(&json!("u1")));
        assert!(document.get("id").is_none());

        document.insert("extra".into(), json!(1));
        let back = repo.from_document(document);
        assert_eq!(back["id"], "u1");
    }

    #[test]
    fn test_assign_id() {
        let repo = repository();
        let mut document = repo.to_document(&json!({"email": "a@x"})).unwrap();
        let id = repo.assign_id(&mut document).unwrap();
        assert!(uuid::Uuid::parse_str(&id).is_ok());
    }

    #[test]
    fn test_validation() {
        let repo = repository();
        let missing = repo.to_document(&json!({"id": "u1"})).unwrap();
        assert!(matches!(repo.validate(&missing), Err(RepoError::InvalidEntity(_))));

        let bad_role = repo
            .to_document(&json!({"id": "u1", "email": "a@x", "role": "ROOT"}))
            .unwrap();
        assert!(matches!(repo.validate(&bad_role), Err(RepoError::InvalidEntity(_))));

        let ok = repo
            .to_document(&json!({"id": "u1", "email": "a@x", "role": "ADMIN"}))
            .unwrap();
        assert!(repo.validate(&ok).is_ok());
    }

    #[test]
    fn test_fill_defaults() {
        let repo = repository();
        let mut document = repo.to_document(&json!({"email": "a@x"})).unwrap();
        repo.fill_defaults(&mut document, None);
        assert!(document["created_at"].as_u64().is_some());
        assert!(document["updated_at"].as_u64().is_some());
        assert!(document["_id"].as_str().is_some());
        assert!(document.get("role").is_none());

        let previous = json!({"created_at": 7, "updated_at": 7});
        let mut document = repo.to_document(&json!({"id": "u1", "email": "a@x"})).unwrap();
        repo.fill_defaults(&mut document, previous.as_object());
        assert_eq!(document["created_at"], 7);
        assert_eq!(document["_id"], "u1");
    }

    #[test]
    fn test_claims_skip_identifier() {
        let repo = repository();
        let claims = repo.claims(&json!({"_id": "u1", "email": "a@x"}));
        assert_eq!(claims.len(), 1);
        assert_eq!(claims[0].constraint, "User_email_unique");
        assert_eq!(claims[0].values, vec!["a@x".to_string()]);
    }

    #[test]
    fn test_value_object_schema_rejected() {
        let registry = Registry::new();
        registry
            .register_entity(ClassDecl::value_object("Address"))
            .unwrap();
        registry
            .register_property("Address", "city", PropertyOptions::string())
            .unwrap();
        let db = sled::Config::new().temporary(true).open().unwrap();
        assert!(matches!(
            DocumentRepository::<Value>::for_class(&db, &registry, "Address"),
            Err(RepoError::InvalidEntity(_))
        ));
    }
}
