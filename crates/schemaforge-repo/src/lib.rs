//! SchemaForge Repo - repository contract and embedded document repository.
//!
//! [`Repository`] is the asynchronous boundary between domain code and a
//! storage engine. [`DocumentRepository`] implements it over an embedded
//! sled database, driven entirely by a compiled
//! [`DocumentSchema`](schemaforge_core::DocumentSchema): identifier mapping,
//! required fields, enumerations and database-level unique constraints.

pub mod config;
pub mod document;
pub mod error;
pub mod query;
pub mod record;
pub mod repository;
pub mod unique_index;

pub use config::StoreConfig;
pub use document::DocumentRepository;
pub use error::{error_codes, RepoError, Result};
pub use query::{run_pipeline, FilterExpr, OrderDirection, OrderSpec, SearchQuery, Stage};
pub use record::Record;
pub use repository::{serde_hydrator, HydrateFn, Repository};
pub use unique_index::{Claim, UniqueIndex};
