//! Registry and compiler configuration.

/// Default maximum nesting depth for embedded structures.
pub const DEFAULT_MAX_DEPTH: usize = 5;

/// Default identifier field name in document stores.
pub const DEFAULT_DOCUMENT_ID_FIELD: &str = "_id";

/// Default identifier field name in graph and relational stores.
pub const DEFAULT_ID_FIELD: &str = "id";

/// Configuration for the entity base abstraction injected at the root of
/// every entity hierarchy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Key of the injected identifier property.
    pub identifier_key: String,

    /// Keys of the injected timestamp properties.
    pub timestamp_keys: Vec<String>,

    /// Whether timestamps are injected at all.
    pub inject_timestamps: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            identifier_key: DEFAULT_ID_FIELD.to_string(),
            timestamp_keys: vec!["created_at".to_string(), "updated_at".to_string()],
            inject_timestamps: true,
        }
    }
}

impl RegistryConfig {
    /// Set the injected identifier key.
    pub fn with_identifier_key(mut self, key: impl Into<String>) -> Self {
        self.identifier_key = key.into();
        self
    }

    /// Set the injected timestamp keys.
    pub fn with_timestamp_keys(mut self, keys: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.timestamp_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Do not inject timestamps.
    pub fn without_timestamps(mut self) -> Self {
        self.inject_timestamps = false;
        self
    }
}

/// Configuration shared by the schema compilers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompilerConfig {
    /// Deepest nesting level that is still expanded.
    pub max_depth: usize,

    /// Identifier field name in document artifacts.
    pub document_id_field: String,

    /// Identifier property name in graph artifacts.
    pub graph_id_field: String,

    /// Primary key column name in relational artifacts.
    pub relational_id_field: String,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            document_id_field: DEFAULT_DOCUMENT_ID_FIELD.to_string(),
            graph_id_field: DEFAULT_ID_FIELD.to_string(),
            relational_id_field: DEFAULT_ID_FIELD.to_string(),
        }
    }
}

impl CompilerConfig {
    /// Set the recursion depth limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    /// Set the document identifier field name.
    pub fn with_document_id_field(mut self, field: impl Into<String>) -> Self {
        self.document_id_field = field.into();
        self
    }

    /// Set the graph identifier property name.
    pub fn with_graph_id_field(mut self, field: impl Into<String>) -> Self {
        self.graph_id_field = field.into();
        self
    }

    /// Set the relational primary key column name.
    pub fn with_relational_id_field(mut self, field: impl Into<String>) -> Self {
        self.relational_id_field = field.into();
        self
    }
}
