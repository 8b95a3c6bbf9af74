//! # moldrec
//!
//! Recommends past mold designs similar to a new request.
//!
//! Each stored design is reduced to a search key (product category plus the
//! part name with parenthesized remarks removed), the keys are fitted into a
//! TF-IDF model, and a query is ranked against every row by cosine
//! similarity.
//!
//! ## Quick Start
//!
//! ### As a Server
//!
//! ```bash
//! moldrec serve --csv designs.csv --port 5000
//! curl -X POST localhost:5000/api/recommend \
//!      -H 'content-type: application/json' \
//!      -d '{"product_type": "사출금형", "product_name": "핸들커버"}'
//! ```
//!
//! ### As a Library
//!
//! ```rust,no_run
//! use moldrec::prelude::*;
//!
//! let storage = StorageManager::open(&SourceConfig::Csv {
//!     path: "designs.csv".into(),
//! })?;
//! for hit in storage.recommend(&compose_query("사출금형", "핸들커버"), 5) {
//!     println!("{} {} {:.4}", hit.record.code, hit.record.part_name, hit.similarity);
//! }
//! # Ok::<(), moldrec::Error>(())
//! ```
//!
//! ## Crate Structure
//!
//! - [`moldrec-core`](https://docs.rs/moldrec-core) - Normalization, TF-IDF, ranking, snapshots
//! - [`moldrec-storage`](https://docs.rs/moldrec-storage) - CSV and SQLite sources, GitHub sync
//! - [`moldrec-api`](https://docs.rs/moldrec-api) - REST API

// Re-export core types
pub use moldrec_core::{
    compose_query, fit, normalize, recommend,
    DesignRecord, RecordTable, Column,
    TfidfModel, DocumentTermMatrix, SparseVector,
    RecommendConfig, Recommendation,
    Snapshot, SnapshotHandle, RefreshWorker, RecordSource,
    Error, Result,
};

// Re-export storage
pub use moldrec_storage::{CsvSource, GithubConfig, SourceConfig, SqliteSource, StorageManager};

// Re-export API
pub use moldrec_api::{RestApi, ServiceConfig};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::{
        compose_query, recommend, fit,
        DesignRecord, RecordTable,
        RecommendConfig, Recommendation,
        Snapshot, RecordSource,
        Error, Result,
        CsvSource, SqliteSource, SourceConfig, StorageManager,
        RestApi, ServiceConfig,
    };
}
