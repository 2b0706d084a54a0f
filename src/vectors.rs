//! Vector helpers shared by clustering, ranking, and evaluation.

/// Cosine similarity of two vectors, accumulated in `f64`.
///
/// Returns 0.0 for mismatched dimensions, empty input, or a zero-norm side.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Component-wise mean of equal-length vectors. Empty input yields an empty
/// vector.
pub fn mean_vector(rows: &[&[f32]]) -> Vec<f32> {
    let Some(first) = rows.first() else {
        return Vec::new();
    };
    let mut sums = vec![0.0f64; first.len()];
    for row in rows {
        for (sum, value) in sums.iter_mut().zip(row.iter()) {
            *sum += f64::from(*value);
        }
    }
    let count = rows.len() as f64;
    sums.into_iter().map(|sum| (sum / count) as f32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_of_identical_vectors_is_one() {
        let v = vec![0.3, -0.2, 0.9];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn cosine_of_orthogonal_vectors_is_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), 0.0);
    }

    #[test]
    fn cosine_degenerate_inputs_are_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
        assert_eq!(cosine_similarity(&[1.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
    }

    #[test]
    fn mean_vector_averages_components() {
        let a = [1.0f32, 3.0];
        let b = [3.0f32, 5.0];
        assert_eq!(mean_vector(&[&a, &b]), vec![2.0, 4.0]);
        assert!(mean_vector(&[]).is_empty());
    }
}
