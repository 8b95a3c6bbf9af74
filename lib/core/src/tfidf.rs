// TF-IDF vectorizer over record search keys
use ahash::AHashMap;
use regex::Regex;
use std::sync::OnceLock;

use crate::record::RecordTable;
use crate::vector::SparseVector;

static TOKEN: OnceLock<Regex> = OnceLock::new();

fn token_pattern() -> &'static Regex {
    TOKEN.get_or_init(|| Regex::new(r"\b\w\w+\b").expect("static regex"))
}

/// Split text into terms.
///
/// Lowercases, then keeps every run of two or more Unicode word characters.
/// Single characters never become terms.
#[inline]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    token_pattern()
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// Vocabulary and inverse document frequencies fitted on one record set.
///
/// Immutable once fitted; a changed record set needs a fresh fit.
#[derive(Debug, Clone, Default)]
pub struct TfidfModel {
    // term -> column
    vocabulary: AHashMap<String, u32>,
    // column -> term, lexicographic
    terms: Vec<String>,
    // column -> idf
    idf: Vec<f64>,
    n_docs: usize,
}

impl TfidfModel {
    /// Fit vocabulary and idf weights over `docs`.
    ///
    /// Smooth idf: `ln((1 + n) / (1 + df)) + 1`.
    pub fn fit<S: AsRef<str>>(docs: &[S]) -> Self {
        // term -> document frequency
        let mut dfs: AHashMap<String, u32> = AHashMap::new();
        for doc in docs {
            let mut seen: Vec<String> = tokenize(doc.as_ref());
            seen.sort_unstable();
            seen.dedup();
            for term in seen {
                *dfs.entry(term).or_insert(0) += 1;
            }
        }

        let mut terms: Vec<String> = dfs.keys().cloned().collect();
        terms.sort_unstable();

        let n_docs = docs.len();
        let n = n_docs as f64;
        let idf = terms
            .iter()
            .map(|t| {
                let df = dfs.get(t).copied().unwrap_or(0) as f64;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let vocabulary = terms
            .iter()
            .enumerate()
            .map(|(col, term)| (term.clone(), col as u32))
            .collect();

        Self {
            vocabulary,
            terms,
            idf,
            n_docs,
        }
    }

    /// Project text into the fitted space. Unknown terms are ignored; the
    /// result is L2-normalized (or empty when nothing matched).
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: AHashMap<u32, u32> = AHashMap::new();
        for token in tokenize(text) {
            if let Some(&col) = self.vocabulary.get(&token) {
                *counts.entry(col).or_insert(0) += 1;
            }
        }

        let pairs = counts
            .into_iter()
            .map(|(col, tf)| (col, tf as f64 * self.idf[col as usize]))
            .collect();
        let mut v = SparseVector::from_pairs(pairs);
        v.normalize();
        v
    }

    #[inline]
    #[must_use]
    pub fn vocabulary_size(&self) -> usize {
        self.terms.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    #[inline]
    #[must_use]
    pub fn n_docs(&self) -> usize {
        self.n_docs
    }

    /// Column of `term`, if it was seen during fitting.
    #[inline]
    pub fn column(&self, term: &str) -> Option<u32> {
        self.vocabulary.get(term).copied()
    }

    #[inline]
    pub fn idf(&self, term: &str) -> Option<f64> {
        self.column(term).map(|c| self.idf[c as usize])
    }

    /// Terms in column order.
    #[inline]
    pub fn terms(&self) -> &[String] {
        &self.terms
    }
}

/// One TF-IDF row per record, in table order.
#[derive(Debug, Clone, Default)]
pub struct DocumentTermMatrix {
    rows: Vec<SparseVector>,
    n_cols: usize,
}

impl DocumentTermMatrix {
    #[inline]
    #[must_use]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    #[inline]
    #[must_use]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    #[inline]
    pub fn row(&self, i: usize) -> Option<&SparseVector> {
        self.rows.get(i)
    }

    #[inline]
    pub fn rows(&self) -> &[SparseVector] {
        &self.rows
    }

    /// Cosine similarity of `query` against every row, in row order.
    pub fn similarities(&self, query: &SparseVector) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| query.cosine_similarity(row))
            .collect()
    }
}

/// Fit a model over every search key of `table` and transform the same
/// keys into the document-term matrix. Never fails; an empty table yields an
/// empty vocabulary and a zero-row matrix.
pub fn fit(table: &RecordTable) -> (TfidfModel, DocumentTermMatrix) {
    let keys = table.search_keys();
    let model = TfidfModel::fit(keys);
    let rows = keys.iter().map(|k| model.transform(k)).collect();
    let matrix = DocumentTermMatrix {
        rows,
        n_cols: model.vocabulary_size(),
    };
    (model, matrix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::DesignRecord;

    fn table(keys: &[(&str, &str)]) -> RecordTable {
        keys.iter()
            .enumerate()
            .map(|(i, (cat, name))| DesignRecord::new(format!("R{i}"), *cat, *name))
            .collect()
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(tokenize("사출금형 핸들커버"), vec!["사출금형", "핸들커버"]);
        assert_eq!(tokenize("ABS Cover, 2-Cav"), vec!["abs", "cover", "cav"]);
        assert!(tokenize("a b c").is_empty());
        assert!(tokenize("").is_empty());
    }

    #[test]
    fn test_vocabulary_is_sorted_and_idf_smoothed() {
        let t = table(&[("사출금형", "핸들커버"), ("사출금형", "손잡이"), ("프레스금형", "브라켓")]);
        let (model, matrix) = fit(&t);
        assert_eq!(model.vocabulary_size(), 5);
        let mut sorted = model.terms().to_vec();
        sorted.sort();
        assert_eq!(sorted, model.terms());

        // df = 2 of n = 3
        let expected = (4.0f64 / 3.0).ln() + 1.0;
        assert!((model.idf("사출금형").unwrap() - expected).abs() < 1e-12);
        // df = 1
        let expected = 2.0f64.ln() + 1.0;
        assert!((model.idf("브라켓").unwrap() - expected).abs() < 1e-12);

        assert_eq!(matrix.n_rows(), 3);
        assert_eq!(matrix.n_cols(), 5);
        for row in matrix.rows() {
            assert!((row.norm() - 1.0).abs() < 1e-12);
        }
    }

    #[test]
    fn test_empty_table_fits() {
        let (model, matrix) = fit(&RecordTable::default());
        assert!(model.is_empty());
        assert_eq!(matrix.n_rows(), 0);
        assert!(model.transform("사출금형").is_empty());
    }

    #[test]
    fn test_row_without_terms_stays_aligned() {
        let t = table(&[("사출금형", "핸들커버"), ("", "(미정)"), ("a", "b")]);
        let (_, matrix) = fit(&t);
        assert_eq!(matrix.n_rows(), 3);
        assert!(matrix.row(1).unwrap().is_empty());
        assert!(matrix.row(2).unwrap().is_empty());
    }

    #[test]
    fn test_transform_ignores_unknown_terms() {
        let t = table(&[("사출금형", "핸들커버")]);
        let (model, _) = fit(&t);
        assert!(model.transform("xyz123").is_empty());
        let v = model.transform("사출금형 xyz123");
        assert_eq!(v.nnz(), 1);
        assert!((v.norm() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_fit_is_deterministic() {
        let t = table(&[("사출금형", "핸들커버"), ("사출금형", "손잡이"), ("프레스금형", "브라켓")]);
        let (m1, d1) = fit(&t);
        let (m2, d2) = fit(&t);
        assert_eq!(m1.terms(), m2.terms());
        let q1 = m1.transform("사출금형 핸들커버");
        let q2 = m2.transform("사출금형 핸들커버");
        assert_eq!(d1.similarities(&q1), d2.similarities(&q2));
    }
}
