use serde::{Deserialize, Serialize};

use crate::normalize::normalize_query;
use crate::record::{DesignRecord, RecordTable};
use crate::tfidf::{DocumentTermMatrix, TfidfModel};

pub const DEFAULT_TOP_N: usize = 10;

/// Similarities are reported with this many decimal digits.
pub const SIMILARITY_DECIMALS: i32 = 4;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendConfig {
    /// Used when a caller does not ask for a specific count
    pub top_n: usize,
    /// Upper bound applied to any requested count
    pub max_top_n: usize,
}

impl Default for RecommendConfig {
    fn default() -> Self {
        Self {
            top_n: DEFAULT_TOP_N,
            max_top_n: 100,
        }
    }
}

impl RecommendConfig {
    /// Resolve a requested count against the default and the cap.
    #[inline]
    pub fn resolve_top_n(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.top_n).min(self.max_top_n)
    }
}

/// A matched record and its rounded cosine similarity.
#[derive(Debug, Clone, PartialEq)]
pub struct Recommendation {
    /// Row of the record in the table it came from
    pub row: usize,
    pub record: DesignRecord,
    pub similarity: f64,
}

/// Compose the query text from a product category and a product name.
#[inline]
pub fn compose_query(product_category: &str, product_name: &str) -> String {
    format!("{} {}", product_category, product_name).trim().to_string()
}

#[inline]
pub fn round_similarity(sim: f64) -> f64 {
    let scale = 10f64.powi(SIMILARITY_DECIMALS);
    ((sim * scale).round() / scale).clamp(0.0, 1.0)
}

/// Rank every record of `table` against `query`.
///
/// Returns at most `top_n` entries ordered by similarity, highest first.
/// Equal similarities keep table order. Rows scoring zero are included when
/// fewer than `top_n` rows score above zero. A blank query yields nothing.
///
/// `matrix` must have been fitted from `table`: row `i` of one describes
/// row `i` of the other.
pub fn recommend(
    query: &str,
    model: &TfidfModel,
    matrix: &DocumentTermMatrix,
    table: &RecordTable,
    top_n: usize,
) -> Vec<Recommendation> {
    debug_assert_eq!(matrix.n_rows(), table.len());

    let query = query.trim();
    if query.is_empty() || top_n == 0 {
        return Vec::new();
    }

    let query = normalize_query(query);
    let query_vector = model.transform(&query);
    let sims = matrix.similarities(&query_vector);

    let mut ranked: Vec<(usize, f64)> = sims.into_iter().enumerate().collect();
    // stable: ties stay in table order
    ranked.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
    ranked.truncate(top_n);

    ranked
        .into_iter()
        .filter_map(|(row, sim)| {
            table.get(row).map(|record| Recommendation {
                row,
                record: record.clone(),
                similarity: round_similarity(sim),
            })
        })
        .collect()
}
