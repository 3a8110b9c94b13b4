//! Database-level index enforcing unique constraints.
//!
//! Each claimed value maps to the id of the document holding it. Claims are
//! made with an atomic compare-and-swap, so two concurrent writers can never
//! both hold the same value.

use sled::Tree;

use crate::error::{RepoError, Result};

/// Tree name for the unique constraint index.
pub const UNIQUE_INDEX_TREE: &str = "index:unique";

/// A constraint value claimed for one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Claim {
    /// Constraint name.
    pub constraint: String,
    /// Constrained fields.
    pub fields: Vec<String>,
    /// Field values, in field order.
    pub values: Vec<String>,
}

/// Index of claimed unique values.
///
/// Key format: `entity\0constraint\0value1\0value2...` -> `document id`
pub struct UniqueIndex {
    tree: Tree,
}

impl UniqueIndex {
    /// Create a unique index backed by the given tree.
    pub fn new(tree: Tree) -> Self {
        Self { tree }
    }

    /// Open or create the unique index in a database.
    pub fn open(db: &sled::Db) -> Result<Self> {
        Ok(Self::new(db.open_tree(UNIQUE_INDEX_TREE)?))
    }

    fn build_key(entity: &str, constraint: &str, values: &[String]) -> Vec<u8> {
        let mut key = Vec::new();
        key.extend_from_slice(entity.as_bytes());
        key.push(0);
        key.extend_from_slice(constraint.as_bytes());
        for value in values {
            key.push(0);
            key.extend_from_slice(value.as_bytes());
        }
        key
    }

    /// Claim a value for `id`. Claiming a value already held by `id` succeeds.
    pub fn claim(&self, entity: &str, claim: &Claim, id: &str) -> Result<()> {
        let key = Self::build_key(entity, &claim.constraint, &claim.values);
        match self
            .tree
            .compare_and_swap(&key, None as Option<&[u8]>, Some(id.as_bytes()))?
        {
            Ok(()) => Ok(()),
            Err(conflict) if conflict.current.as_deref() == Some(id.as_bytes()) => Ok(()),
            Err(_) => Err(RepoError::UniqueConstraintViolation {
                entity: entity.to_string(),
                constraint: claim.constraint.clone(),
                fields: claim.fields.clone(),
                value: claim.values.join(", "),
            }),
        }
    }

    /// Claim every value or none. Claims made before a violation are released.
    pub fn claim_all(&self, entity: &str, claims: &[Claim], id: &str) -> Result<()> {
        for (position, claim) in claims.iter().enumerate() {
            if let Err(err) = self.claim(entity, claim, id) {
                for made in &claims[..position] {
                    self.release(entity, made, id)?;
                }
                tracing::debug!(entity, constraint = %claim.constraint, "unique claim rejected");
                return Err(err);
            }
        }
        Ok(())
    }

    /// Release a value if `id` holds it.
    pub fn release(&self, entity: &str, claim: &Claim, id: &str) -> Result<()> {
        let key = Self::build_key(entity, &claim.constraint, &claim.values);
        // A mismatch means another document holds the value; leave it alone.
        let _ = self
            .tree
            .compare_and_swap(&key, Some(id.as_bytes()), None as Option<&[u8]>)?;
        Ok(())
    }

    /// Look up the document holding a value.
    pub fn lookup(&self, entity: &str, constraint: &str, values: &[String]) -> Result<Option<String>> {
        let key = Self::build_key(entity, constraint, values);
        Ok(self
            .tree
            .get(key)?
            .map(|id| String::from_utf8_lossy(&id).into_owned()))
    }

    /// Flush the index to disk.
    pub fn flush(&self) -> Result<()> {
        self.tree.flush()?;
        Ok(())
    }

    /// Get the number of claimed values.
    pub fn len(&self) -> usize {
        self.tree.len()
    }

    /// Check if the index is empty.
    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }
}
