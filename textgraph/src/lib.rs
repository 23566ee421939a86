//! TextGraph
//!
//! Persists NLP-annotated text into an embedded property graph and answers
//! tag-based filter queries over it.
//!
//! ## Features
//!
//! - **Upsert by external id** - Re-storing a document refreshes it in place
//! - **Sentence chain** - Sentence order is kept as first/next links, not as an index
//! - **Shared tags** - One tag node per (lemma, POS) across the whole store
//! - **Filter DSL** - `lemma[/NE](,lemma[/NE])*`, matched case-insensitively
//! - **RocksDB persistence** - Bincode records under prefix-scanned keys
//!
//! ## Example
//!
//! ```ignore
//! use textgraph::{AnnotatedText, GraphStore, Persistable, Sentence, Tag};
//!
//! let graph = GraphStore::open_default(&db_path)?;
//!
//! let text = AnnotatedText::with_id("doc-1").sentence(
//!     Sentence::new(0)
//!         .tag(Tag::new("nice", "NNP").with_ne("Location"))
//!         .tag(Tag::new("attack", "NN")),
//! );
//!
//! let handle = text.store(&graph)?;
//! let loaded = AnnotatedText::load(&graph, handle)?;
//! assert!(loaded.filter("Nice/Location, attack"));
//! ```

pub mod chain;
pub mod config;
pub mod document;
pub mod error;
pub mod filter;
pub mod migration;
pub mod node;
pub mod persist;
pub mod sentence;
pub mod storage;
pub mod tag;

// Re-exports for convenience
pub use chain::SentenceChain;
pub use config::StoreConfig;
pub use document::AnnotatedText;
pub use error::{GraphError, Result};
pub use filter::{FilterOptions, FilterQuery, QueryTerm};
pub use node::{ExternalId, Label, NodeId, NodeKind, Relationship};
pub use persist::Persistable;
pub use sentence::{Sentence, TagOccurrence};
pub use storage::GraphStore;
pub use tag::Tag;
