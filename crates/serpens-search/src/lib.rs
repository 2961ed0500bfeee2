//! Hybrid retrieval for the snake catalog.
//!
//! [`HybridQueryBuilder`] turns an [`Intent`](serpens_core::Intent) and a query
//! embedding into a backend-neutral [`RetrievalQuery`]; a [`SearchBackend`]
//! executes it and [`ResultFilter`] drops hits below the relevance threshold.
#![cfg_attr(
    test,
    allow(
        clippy::expect_used,
        clippy::unwrap_used,
        clippy::panic,
        clippy::missing_panics_doc,
        reason = "Test allows"
    )
)]

/// Retrieval backend trait.
pub mod backend;
/// Elasticsearch backend.
pub mod elastic;
/// Index field names.
pub mod fields;
/// Score threshold filtering.
pub mod filter;
/// In-process catalog backend.
pub mod memory;
/// Query model and builder.
pub mod query;

pub use backend::SearchBackend;
pub use elastic::ElasticsearchBackend;
pub use filter::ResultFilter;
pub use memory::{CatalogEntry, MemoryCatalog};
pub use query::{Filters, HybridQueryBuilder, KeywordField, KeywordQuery, Predicate, RetrievalQuery};
