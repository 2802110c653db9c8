use crate::error::DimensionMismatch;
use crate::models::Chunk;
use tracing::debug;

pub const DEFAULT_TOP_K: usize = 3;

/// Score given when either vector has zero magnitude. Strictly below any
/// real cosine value, so degenerate entries never outrank a valid match.
pub const DEGENERATE_SIMILARITY: f32 = f32::NEG_INFINITY;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankedChunk<'a> {
    pub chunk: &'a Chunk,
    pub score: f32,
}

pub fn cosine_similarity(left: &[f32], right: &[f32]) -> Result<f32, DimensionMismatch> {
    if left.len() != right.len() {
        return Err(DimensionMismatch {
            query: left.len(),
            entry: right.len(),
        });
    }

    let dot = left.iter().zip(right).map(|(a, b)| a * b).sum::<f32>();
    let left_norm = left.iter().map(|value| value * value).sum::<f32>().sqrt();
    let right_norm = right.iter().map(|value| value * value).sum::<f32>().sqrt();

    let similarity = dot / (left_norm * right_norm);
    if left_norm == 0.0 || right_norm == 0.0 || !similarity.is_finite() {
        return Ok(DEGENERATE_SIMILARITY);
    }
    Ok(similarity)
}

/// Top `top_k` entries by cosine similarity to `query`, best first. Entries
/// without an embedding or with a different dimensionality are left out.
/// Equal scores keep their store order.
pub fn rank<'a>(query: &[f32], entries: &'a [Chunk], top_k: usize) -> Vec<RankedChunk<'a>> {
    let mut skipped = 0usize;
    let mut scored: Vec<RankedChunk<'a>> = entries
        .iter()
        .filter_map(|chunk| {
            let embedding = chunk.embedding.as_deref()?;
            match cosine_similarity(query, embedding) {
                Ok(score) => Some(RankedChunk { chunk, score }),
                Err(_) => {
                    skipped += 1;
                    None
                }
            }
        })
        .collect();

    // `sort_by` is stable. Scores are never NaN, and `partial_cmp` keeps
    // -0.0 and 0.0 equal.
    scored.sort_by(|left, right| {
        right
            .score
            .partial_cmp(&left.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    scored.truncate(top_k);

    if skipped > 0 {
        debug!(skipped, "entries excluded for dimension mismatch");
    }
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(content: &str, embedding: Option<Vec<f32>>) -> Chunk {
        let mut chunk = Chunk::embedded(content.to_string(), None, Vec::new());
        chunk.embedding = embedding;
        chunk
    }

    fn names<'a>(ranked: &[RankedChunk<'a>]) -> Vec<&'a str> {
        ranked.iter().map(|hit| hit.chunk.content.as_str()).collect()
    }

    #[test]
    fn identical_direction_scores_one() {
        let score = cosine_similarity(&[1.0, 2.0], &[2.0, 4.0]).expect("same length");
        assert!((score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn opposite_direction_scores_minus_one() {
        let score = cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]).expect("same length");
        assert!((score + 1.0).abs() < 1e-6);
    }

    #[test]
    fn mismatched_lengths_are_reported() {
        assert_eq!(
            cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]),
            Err(DimensionMismatch { query: 2, entry: 3 })
        );
    }

    #[test]
    fn zero_vectors_get_the_degenerate_score() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), Ok(DEGENERATE_SIMILARITY));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 0.0]), Ok(DEGENERATE_SIMILARITY));
        assert_eq!(cosine_similarity(&[], &[]), Ok(DEGENERATE_SIMILARITY));
    }

    #[test]
    fn degenerate_entry_ranks_below_an_opposite_match() {
        let entries = vec![
            entry("zero", Some(vec![0.0, 0.0])),
            entry("opposite", Some(vec![-1.0, 0.0])),
        ];
        let ranked = rank(&[1.0, 0.0], &entries, 2);
        assert_eq!(names(&ranked), vec!["opposite", "zero"]);
    }

    #[test]
    fn missing_and_mismatched_embeddings_are_excluded() {
        let entries = vec![
            entry("missing", None),
            entry("wide", Some(vec![1.0, 0.0, 0.0])),
            entry("match", Some(vec![0.0, 1.0])),
        ];
        let ranked = rank(&[1.0, 0.0], &entries, 10);
        assert_eq!(names(&ranked), vec!["match"]);
    }

    #[test]
    fn signed_zero_scores_tie_in_store_order() {
        let entries = vec![
            entry("first", Some(vec![-0.0, -1.0])),
            entry("second", Some(vec![0.0, 1.0])),
        ];
        let ranked = rank(&[1.0, 0.0], &entries, 2);
        assert_eq!(names(&ranked), vec!["first", "second"]);
    }

    #[test]
    fn results_are_sorted_and_capped() {
        let entries = vec![
            entry("far", Some(vec![0.0, 1.0])),
            entry("close", Some(vec![1.0, 0.1])),
            entry("exact", Some(vec![1.0, 0.0])),
            entry("middle", Some(vec![1.0, 1.0])),
        ];
        let ranked = rank(&[1.0, 0.0], &entries, 3);
        assert_eq!(names(&ranked), vec!["exact", "close", "middle"]);
    }

    #[test]
    fn ties_keep_insertion_order() {
        let entries = vec![
            entry("first", Some(vec![2.0, 0.0])),
            entry("second", Some(vec![1.0, 0.0])),
            entry("third", Some(vec![3.0, 0.0])),
        ];
        let ranked = rank(&[1.0, 0.0], &entries, 3);
        assert_eq!(names(&ranked), vec!["first", "second", "third"]);
    }

    #[test]
    fn empty_store_ranks_nothing() {
        assert!(rank(&[1.0], &[], 3).is_empty());
    }

    fn vector(len: usize) -> impl Strategy<Value = Vec<f32>> {
        proptest::collection::vec(-10.0f32..10.0, len)
    }

    proptest! {
        #[test]
        fn similarity_is_symmetric(
            (left, right) in (1usize..16).prop_flat_map(|len| (vector(len), vector(len)))
        ) {
            let forward = cosine_similarity(&left, &right).expect("same length");
            let backward = cosine_similarity(&right, &left).expect("same length");
            prop_assert_eq!(forward.to_bits(), backward.to_bits());
        }

        #[test]
        fn ranking_is_bounded_and_non_increasing(
            query in vector(4),
            stored in proptest::collection::vec(
                proptest::option::of((2usize..6).prop_flat_map(vector)),
                0..20,
            ),
            top_k in 0usize..8,
        ) {
            let entries: Vec<Chunk> = stored
                .into_iter()
                .enumerate()
                .map(|(index, embedding)| entry(&index.to_string(), embedding))
                .collect();
            let ranked = rank(&query, &entries, top_k);

            let qualifying = entries
                .iter()
                .filter(|chunk| chunk.embedding.as_ref().is_some_and(|v| v.len() == query.len()))
                .count();
            prop_assert_eq!(ranked.len(), top_k.min(qualifying));
            for pair in ranked.windows(2) {
                prop_assert!(pair[0].score >= pair[1].score);
            }
            for hit in &ranked {
                prop_assert_eq!(hit.chunk.embedding.as_ref().map(Vec::len), Some(query.len()));
            }
        }
    }
}
