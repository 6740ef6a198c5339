#![forbid(unsafe_code)]

use voicenudge_kernel_contracts::auth::VoiceEmbedding;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimilarityError {
    DimensionMismatch { left: usize, right: usize },
    DegenerateVector,
}

/// Cosine-similarity comparator over voice embeddings. Stateless and safe to
/// call from any number of threads.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmbeddingComparator;

impl EmbeddingComparator {
    pub fn cosine_similarity(
        a: &VoiceEmbedding,
        b: &VoiceEmbedding,
    ) -> Result<f32, SimilarityError> {
        Self::cosine_similarity_raw(a.as_slice(), b.as_slice())
    }

    /// `dot(a,b) / (|a| * |b|)`, accumulated in f64 and clamped to [-1, 1]
    /// so rounding can never push the score outside the contract range.
    pub fn cosine_similarity_raw(a: &[f32], b: &[f32]) -> Result<f32, SimilarityError> {
        if a.len() != b.len() {
            return Err(SimilarityError::DimensionMismatch {
                left: a.len(),
                right: b.len(),
            });
        }
        let mut dot = 0.0f64;
        let mut norm_a = 0.0f64;
        let mut norm_b = 0.0f64;
        for (&x, &y) in a.iter().zip(b.iter()) {
            let (x, y) = (f64::from(x), f64::from(y));
            dot += x * y;
            norm_a += x * x;
            norm_b += y * y;
        }
        if norm_a == 0.0 || norm_b == 0.0 {
            // Cosine is undefined here; callers must treat this as no-match,
            // never as a NaN score.
            return Err(SimilarityError::DegenerateVector);
        }
        let score = dot / (norm_a.sqrt() * norm_b.sqrt());
        Ok(score.clamp(-1.0, 1.0) as f32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(components: &[f32]) -> VoiceEmbedding {
        VoiceEmbedding::new(components.to_vec()).unwrap()
    }

    #[test]
    fn at_embed_01_identical_vectors_score_one() {
        let v = embedding(&[0.3, -1.2, 4.5, 0.01]);
        let score = EmbeddingComparator::cosine_similarity(&v, &v).unwrap();
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn at_embed_02_orthogonal_vectors_score_zero() {
        let a = embedding(&[1.0, 0.0]);
        let b = embedding(&[0.0, 1.0]);
        let score = EmbeddingComparator::cosine_similarity(&a, &b).unwrap();
        assert!(score.abs() < 1e-6);
    }

    #[test]
    fn at_embed_03_opposite_vectors_score_negative_one() {
        let a = embedding(&[2.0, -3.0]);
        let b = embedding(&[-2.0, 3.0]);
        let score = EmbeddingComparator::cosine_similarity(&a, &b).unwrap();
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn at_embed_04_dimension_mismatch_is_typed() {
        let a = embedding(&[1.0, 0.0, 0.0]);
        let b = embedding(&[1.0, 0.0]);
        assert_eq!(
            EmbeddingComparator::cosine_similarity(&a, &b),
            Err(SimilarityError::DimensionMismatch { left: 3, right: 2 })
        );
    }

    #[test]
    fn at_embed_05_zero_norm_is_degenerate_not_nan() {
        let zero = embedding(&[0.0, 0.0]);
        let v = embedding(&[1.0, 1.0]);
        assert_eq!(
            EmbeddingComparator::cosine_similarity(&zero, &v),
            Err(SimilarityError::DegenerateVector)
        );
        assert_eq!(
            EmbeddingComparator::cosine_similarity(&v, &zero),
            Err(SimilarityError::DegenerateVector)
        );
    }

    #[test]
    fn at_embed_06_score_never_escapes_unit_interval() {
        let a = embedding(&[1e-20, 1e-20]);
        let b = embedding(&[1e-20, 1e-20]);
        let score = EmbeddingComparator::cosine_similarity(&a, &b).unwrap();
        assert!((-1.0..=1.0).contains(&score));
    }
}
