use serde::{Deserialize, Serialize};

/// A sparse vector of `(column, weight)` pairs sorted by column.
///
/// Rows of a TF-IDF matrix only touch a handful of vocabulary terms, so the
/// dense form is never materialized.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SparseVector {
    indices: Vec<u32>,
    values: Vec<f64>,
}

impl SparseVector {
    /// Build from arbitrary pairs. Pairs are sorted by column; duplicate
    /// columns are summed and explicit zeros dropped.
    pub fn from_pairs(mut pairs: Vec<(u32, f64)>) -> Self {
        pairs.sort_unstable_by_key(|&(idx, _)| idx);

        let mut indices = Vec::with_capacity(pairs.len());
        let mut values: Vec<f64> = Vec::with_capacity(pairs.len());
        for (idx, value) in pairs {
            if indices.last() == Some(&idx) {
                if let Some(last) = values.last_mut() {
                    *last += value;
                }
            } else {
                indices.push(idx);
                values.push(value);
            }
        }

        let mut v = Self { indices, values };
        v.prune_zeros();
        v
    }

    fn prune_zeros(&mut self) {
        if self.values.iter().all(|&w| w != 0.0) {
            return;
        }
        let (indices, values): (Vec<u32>, Vec<f64>) = self
            .indices
            .iter()
            .zip(&self.values)
            .filter(|(_, w)| **w != 0.0)
            .map(|(&i, &w)| (i, w))
            .unzip();
        self.indices = indices;
        self.values = values;
    }

    #[inline]
    #[must_use]
    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    #[inline]
    pub fn indices(&self) -> &[u32] {
        &self.indices
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Weight at `column`, zero when absent.
    pub fn get(&self, column: u32) -> f64 {
        match self.indices.binary_search(&column) {
            Ok(pos) => self.values[pos],
            Err(_) => 0.0,
        }
    }

    #[inline]
    pub fn norm(&self) -> f64 {
        self.values.iter().map(|w| w * w).sum::<f64>().sqrt()
    }

    /// Sorted merge over both index lists.
    pub fn dot(&self, other: &SparseVector) -> f64 {
        let (mut i, mut j) = (0, 0);
        let mut sum = 0.0;
        while i < self.indices.len() && j < other.indices.len() {
            match self.indices[i].cmp(&other.indices[j]) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    sum += self.values[i] * other.values[j];
                    i += 1;
                    j += 1;
                }
            }
        }
        sum
    }

    /// `(a·b) / (|a|·|b|)`, zero when either side has zero norm.
    #[inline]
    pub fn cosine_similarity(&self, other: &SparseVector) -> f64 {
        let norm_a = self.norm();
        let norm_b = other.norm();
        if norm_a == 0.0 || norm_b == 0.0 {
            return 0.0;
        }
        self.dot(other) / (norm_a * norm_b)
    }

    /// Scale to unit length. Zero vectors are left untouched.
    #[inline]
    pub fn normalize(&mut self) {
        let norm = self.norm();
        if norm > f64::EPSILON {
            let inv_norm = 1.0 / norm;
            for w in &mut self.values {
                *w *= inv_norm;
            }
        }
    }

    /// Dense copy of width `dim`. Columns at or beyond `dim` are dropped.
    pub fn to_dense(&self, dim: usize) -> Vec<f64> {
        let mut dense = vec![0.0; dim];
        for (&idx, &w) in self.indices.iter().zip(&self.values) {
            if let Some(slot) = dense.get_mut(idx as usize) {
                *slot = w;
            }
        }
        dense
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pairs_sorts_and_merges() {
        let v = SparseVector::from_pairs(vec![(3, 1.0), (1, 2.0), (3, 0.5), (2, 0.0)]);
        assert_eq!(v.indices(), &[1, 3]);
        assert_eq!(v.values(), &[2.0, 1.5]);
        assert_eq!(v.get(2), 0.0);
    }

    #[test]
    fn test_cosine_similarity() {
        let a = SparseVector::from_pairs(vec![(0, 1.0), (1, 1.0)]);
        let b = SparseVector::from_pairs(vec![(0, 1.0)]);
        let sim = a.cosine_similarity(&b);
        assert!((sim - std::f64::consts::FRAC_1_SQRT_2).abs() < 1e-12);
        assert!((a.cosine_similarity(&a) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_cosine_with_zero_vector_is_zero() {
        let a = SparseVector::from_pairs(vec![(0, 1.0)]);
        let zero = SparseVector::default();
        assert_eq!(a.cosine_similarity(&zero), 0.0);
        assert_eq!(zero.cosine_similarity(&zero), 0.0);
    }

    #[test]
    fn test_normalize() {
        let mut v = SparseVector::from_pairs(vec![(0, 3.0), (4, 4.0)]);
        v.normalize();
        assert!((v.norm() - 1.0).abs() < 1e-12);
        let dense = v.to_dense(5);
        assert_eq!(dense.len(), 5);
        assert!((dense[0] - 0.6).abs() < 1e-12);
        assert!((dense[4] - 0.8).abs() < 1e-12);
        assert_eq!(&dense[1..4], &[0.0, 0.0, 0.0]);
    }
}
