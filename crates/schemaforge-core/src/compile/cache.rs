//! Compiled-artifact cache keyed by class, backend and compiler configuration.
//!
//! Entries are stamped with the registry generation they were compiled
//! against; any registration bumps the generation and the next lookup
//! recompiles.

use dashmap::DashMap;

use super::{Backend, DocumentSchema, GraphSchema, RelationalSchema, SchemaArtifact, SchemaCompiler};
use crate::config::CompilerConfig;
use crate::error::Result;

type CacheKey = (String, Backend, CompilerConfig);

/// Concurrent cache of compiled schema artifacts.
#[derive(Debug, Default)]
pub struct SchemaCache {
    entries: DashMap<CacheKey, (u64, SchemaArtifact)>,
}

impl SchemaCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached artifact, compiling it if absent or stale.
    pub fn get_or_compile(
        &self,
        compiler: &SchemaCompiler<'_>,
        class: &str,
        backend: Backend,
    ) -> Result<SchemaArtifact> {
        let generation = compiler.registry().generation();
        let key = (class.to_string(), backend, compiler.config().clone());

        if let Some(entry) = self.entries.get(&key) {
            let (stamp, artifact) = entry.value();
            if *stamp == generation {
                return Ok(artifact.clone());
            }
        }

        let artifact = compiler.compile(class, backend)?;
        tracing::trace!(class, ?backend, generation, "caching compiled schema");
        self.entries.insert(key, (generation, artifact.clone()));
        Ok(artifact)
    }

    /// Cached document schema.
    pub fn document(&self, compiler: &SchemaCompiler<'_>, class: &str) -> Result<DocumentSchema> {
        match self.get_or_compile(compiler, class, Backend::Document)? {
            SchemaArtifact::Document(schema) => Ok(schema),
            _ => compiler.compile_document(class),
        }
    }

    /// Cached graph schema.
    pub fn graph(&self, compiler: &SchemaCompiler<'_>, class: &str) -> Result<GraphSchema> {
        match self.get_or_compile(compiler, class, Backend::Graph)? {
            SchemaArtifact::Graph(schema) => Ok(schema),
            _ => compiler.compile_graph(class),
        }
    }

    /// Cached relational schema.
    pub fn relational(
        &self,
        compiler: &SchemaCompiler<'_>,
        class: &str,
    ) -> Result<RelationalSchema> {
        match self.get_or_compile(compiler, class, Backend::Relational)? {
            SchemaArtifact::Relational(schema) => Ok(schema),
            _ => compiler.compile_relational(class),
        }
    }

    /// Drop every entry for a class.
    pub fn invalidate(&self, class: &str) {
        self.entries.retain(|(name, _, _), _| name != class);
    }

    /// Drop all entries.
    pub fn clear(&self) {
        self.entries.clear();
    }

    /// Number of cached artifacts.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{ClassDecl, PropertyOptions, Registry};

    #[test]
    fn test_cache_hit_and_staleness() {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("User")).unwrap();
        let compiler = SchemaCompiler::new(&registry);
        let cache = SchemaCache::new();

        let first = cache.document(&compiler, "User").unwrap();
        assert!(first.field("email").is_none());
        assert_eq!(cache.len(), 1);

        registry
            .register_property("User", "email", PropertyOptions::string())
            .unwrap();
        let second = cache.document(&compiler, "User").unwrap();
        assert!(second.field("email").is_some());
        assert_eq!(cache.len(), 1);

        cache.graph(&compiler, "User").unwrap();
        assert_eq!(cache.len(), 2);
        cache.invalidate("User");
        assert!(cache.is_empty());
    }

    #[test]
    fn test_configs_do_not_share_entries() {
        let registry = Registry::new();
        registry.register_entity(ClassDecl::entity("User")).unwrap();
        let cache = SchemaCache::new();

        let default = SchemaCompiler::new(&registry);
        let renamed = SchemaCompiler::with_config(
            &registry,
            CompilerConfig::default().with_document_id_field("docId"),
        );

        let first = cache.document(&default, "User").unwrap();
        let second = cache.document(&renamed, "User").unwrap();
        assert_eq!(first.identifier_field.as_deref(), Some("_id"));
        assert_eq!(second.identifier_field.as_deref(), Some("docId"));
        assert_eq!(cache.len(), 2);
    }
}
