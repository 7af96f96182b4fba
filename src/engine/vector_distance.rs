//! Distance functions for the HNSW vector index. Each returns a `(distance, similarity)`
//! pair: `distance` is what the beam search orders candidates by (smaller is closer, except
//! for [`VectorMetric::DotProduct`] where the search orders by `distance` ascending too, since
//! `distance` is defined there as the negated dot product), `similarity` is the metric's own
//! natural scale, used for the threshold check in `Search` (`SPEC_FULL.md` §4.5).

use crate::engine::vector_collection_index::VectorMetric;

pub(crate) fn distance(metric: VectorMetric, a: &[f32], b: &[f32]) -> (f32, f32) {
    match metric {
        VectorMetric::Cosine => cosine(a, b),
        VectorMetric::Euclidean => euclidean(a, b),
        VectorMetric::DotProduct => dot_product(a, b),
    }
}

fn cosine(a: &[f32], b: &[f32]) -> (f32, f32) {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return (f32::NAN, f32::NAN);
    }

    let similarity = dot / (norm_a * norm_b);
    (1.0 - similarity, similarity)
}

fn euclidean(a: &[f32], b: &[f32]) -> (f32, f32) {
    let distance = a
        .iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt();
    (distance, distance)
}

fn dot_product(a: &[f32], b: &[f32]) -> (f32, f32) {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    (-dot, dot)
}

/// Whether `similarity` (as produced by [`distance`]) clears the `Search` threshold for
/// `metric` — distance metrics keep candidates at or below the threshold, `DotProduct`
/// keeps candidates at or above it (it's a minimum-similarity gate, not a max-distance one).
pub(crate) fn within_threshold(metric: VectorMetric, similarity: f32, threshold: f32) -> bool {
    match metric {
        VectorMetric::Cosine | VectorMetric::Euclidean => similarity <= threshold,
        VectorMetric::DotProduct => similarity >= threshold,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_identical_vectors_is_zero_distance() {
        let (d, s) = cosine(&[1.0, 0.0], &[1.0, 0.0]);
        assert!((d - 0.0).abs() < 1e-6);
        assert!((s - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_zero_vector_is_nan() {
        let (d, s) = cosine(&[0.0, 0.0], &[1.0, 0.0]);
        assert!(d.is_nan());
        assert!(s.is_nan());
    }

    #[test]
    fn euclidean_matches_pythagoras() {
        let (d, _) = euclidean(&[0.0, 0.0], &[3.0, 4.0]);
        assert!((d - 5.0).abs() < 1e-6);
    }

    #[test]
    fn dot_product_orders_by_negated_similarity() {
        let (d, s) = dot_product(&[1.0, 2.0], &[3.0, 4.0]);
        assert!((s - 11.0).abs() < 1e-6);
        assert!((d + 11.0).abs() < 1e-6);
    }

    #[test]
    fn threshold_direction_differs_for_dot_product() {
        assert!(within_threshold(VectorMetric::Cosine, 0.1, 0.2));
        assert!(!within_threshold(VectorMetric::Cosine, 0.3, 0.2));
        assert!(within_threshold(VectorMetric::DotProduct, 0.3, 0.2));
        assert!(!within_threshold(VectorMetric::DotProduct, 0.1, 0.2));
    }
}
