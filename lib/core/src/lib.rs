//! # moldrec Core
//!
//! Core library for the moldrec design recommender.
//!
//! This crate holds the whole recommendation pipeline:
//!
//! - [`normalize()`] - Parenthesis stripping and whitespace collapsing
//! - [`DesignRecord`] / [`RecordTable`] - Loaded rows and their search keys
//! - [`TfidfModel`] / [`DocumentTermMatrix`] - TF-IDF fitting over search keys
//! - [`recommend()`] - Cosine ranking of every row against a query
//! - [`Snapshot`] / [`SnapshotHandle`] - The fitted bundle and its swappable slot
//! - [`RefreshWorker`] - Background rebuilds from a [`RecordSource`]
//!
//! ## Example
//!
//! ```rust
//! use moldrec_core::{fit, recommend, DesignRecord, RecordTable};
//!
//! let table = RecordTable::new(vec![
//!     DesignRecord::new("25-001", "사출금형", "핸들커버(구형)"),
//!     DesignRecord::new("25-002", "사출금형", "손잡이"),
//!     DesignRecord::new("25-003", "프레스금형", "브라켓"),
//! ]);
//! let (model, matrix) = fit(&table);
//!
//! let results = recommend("사출금형 핸들커버", &model, &matrix, &table, 10);
//! assert_eq!(results[0].record.code, "25-001");
//! assert_eq!(results[0].similarity, 1.0);
//! ```

pub mod background;
pub mod error;
pub mod normalize;
pub mod recommend;
pub mod record;
pub mod snapshot;
pub mod source;
pub mod tfidf;
pub mod vector;

pub use background::{rebuild, RefreshStats, RefreshWorker};
pub use error::{Error, Result};
pub use normalize::normalize;
pub use recommend::{compose_query, recommend, RecommendConfig, Recommendation, DEFAULT_TOP_N};
pub use record::{search_key, Column, DesignRecord, RecordTable};
pub use snapshot::{Snapshot, SnapshotHandle};
pub use source::RecordSource;
pub use tfidf::{fit, tokenize, DocumentTermMatrix, TfidfModel};
pub use vector::SparseVector;
