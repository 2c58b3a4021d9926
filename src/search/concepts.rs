//! Multi-concept conjunctive search
//!
//! Runs an independent vector query per concept phrase with an inflated
//! candidate limit, groups candidates by conversation (archive path), and
//! keeps only conversations where every concept contributed - a strict
//! AND. Survivors are ranked by the mean of their per-concept
//! similarities.

use anyhow::Result;
use rayon::prelude::*;
use std::collections::hash_map::Entry;
use std::collections::HashMap;

use super::{snippet, validate, RecallEngine, MAX_LIMIT, SearchOptions};
use crate::store::{Exchange, VectorHit};

/// Room for intersection: each concept fetches `limit x 5` candidates
const CANDIDATE_MULTIPLIER: usize = 5;

/// One conversation that satisfied every concept
///
/// `concept_similarities[i]` is the similarity of this conversation's
/// candidate for concept `i`, in input order. The representative exchange
/// and snippet come from the first candidate encountered, not a merge.
#[derive(Debug, Clone)]
pub struct ConceptSearchResult {
    pub exchange: Exchange,
    pub snippet: String,
    pub concept_similarities: Vec<f32>,
    pub average_similarity: f32,
}

impl RecallEngine {
    /// Conjunctive search across 2-5 concept phrases
    ///
    /// Always vector-based; the date bounds apply to every per-concept
    /// query. Returns an empty list (not an error) when no conversation
    /// satisfies all concepts.
    pub fn search_concepts(
        &self,
        concepts: &[String],
        options: &SearchOptions,
    ) -> Result<Vec<ConceptSearchResult>> {
        validate::validate_concepts(concepts)?;
        let range = validate::validate_range(options.after.as_deref(), options.before.as_deref())?;
        let limit = options.limit.clamp(1, MAX_LIMIT);
        let candidate_limit = limit * CANDIDATE_MULTIPLIER;

        // Fire all per-concept queries at once; they are independent and
        // read-only, and serialize at the embedder/store mutexes
        let per_concept: Vec<Vec<VectorHit>> = concepts
            .par_iter()
            .map(|concept| -> Result<Vec<VectorHit>> {
                let query_vector = {
                    let mut embedder = self.embedder.lock();
                    embedder.embed(concept)?
                };
                self.store
                    .lock()
                    .vector_query(&query_vector, candidate_limit, &range)
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(rank_conjunctions(per_concept, concepts.len(), limit))
    }
}

/// A conversation's candidates, accumulated across concepts
struct ConversationGroup {
    representative: Exchange,
    // One slot per concept index; None = concept not yet satisfied
    similarities: Vec<Option<f32>>,
}

/// Group per-concept candidates by archive path, keep conversations that
/// satisfied every concept, rank by mean similarity, truncate to limit
///
/// Grouping keys on `archive_path` rather than exchange id: exchanges
/// from the same source file count as one conversation, and different
/// exchanges may satisfy different concepts.
fn rank_conjunctions(
    per_concept: Vec<Vec<VectorHit>>,
    concept_count: usize,
    limit: usize,
) -> Vec<ConceptSearchResult> {
    let mut groups: HashMap<String, ConversationGroup> = HashMap::new();

    for (concept_idx, hits) in per_concept.into_iter().enumerate() {
        for hit in hits {
            let similarity = 1.0 - hit.distance;

            match groups.entry(hit.exchange.archive_path.clone()) {
                Entry::Occupied(mut occupied) => {
                    let group = occupied.get_mut();
                    // First candidate per concept wins (they arrive in
                    // ascending-distance order, so it is also the best)
                    if group.similarities[concept_idx].is_none() {
                        group.similarities[concept_idx] = Some(similarity);
                    }
                }
                Entry::Vacant(vacant) => {
                    let mut similarities = vec![None; concept_count];
                    similarities[concept_idx] = Some(similarity);
                    vacant.insert(ConversationGroup {
                        representative: hit.exchange,
                        similarities,
                    });
                }
            }
        }
    }

    // Strict AND: drop any conversation missing even one concept
    let mut survivors: Vec<ConceptSearchResult> = groups
        .into_values()
        .filter_map(|group| {
            let similarities: Option<Vec<f32>> = group.similarities.into_iter().collect();
            similarities.map(|concept_similarities| {
                let average_similarity =
                    concept_similarities.iter().sum::<f32>() / concept_similarities.len() as f32;
                ConceptSearchResult {
                    snippet: snippet::extract(&group.representative.user_message),
                    exchange: group.representative,
                    concept_similarities,
                    average_similarity,
                }
            })
        })
        .collect();

    survivors.sort_by(|a, b| {
        b.average_similarity
            .partial_cmp(&a.average_similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    survivors.truncate(limit);
    survivors
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn hit(id: &str, archive: &str, distance: f32) -> VectorHit {
        VectorHit {
            exchange: Exchange {
                id: id.to_string(),
                project: "demo".to_string(),
                timestamp: "2025-01-01T00:00:00".to_string(),
                user_message: format!("message for {}", id),
                assistant_message: "reply".to_string(),
                archive_path: archive.to_string(),
                line_start: 1,
                line_end: 5,
                tool_calls: vec![],
            },
            distance,
        }
    }

    #[test]
    fn conversation_missing_a_concept_is_dropped() {
        // archive-a matched both concepts, archive-b only the first
        let per_concept = vec![
            vec![hit("a1", "archive-a", 0.2), hit("b1", "archive-b", 0.1)],
            vec![hit("a2", "archive-a", 0.4)],
        ];

        let ranked = rank_conjunctions(per_concept, 2, 10);

        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].exchange.archive_path, "archive-a");
        assert_eq!(ranked[0].concept_similarities.len(), 2);
    }

    #[test]
    fn different_exchanges_in_one_archive_can_satisfy_different_concepts() {
        // Grouping is per conversation, not per exchange
        let per_concept = vec![
            vec![hit("e1", "archive-a", 0.2)],
            vec![hit("e2", "archive-a", 0.6)],
        ];

        let ranked = rank_conjunctions(per_concept, 2, 10);

        assert_eq!(ranked.len(), 1);
        // Representative is the first candidate encountered
        assert_eq!(ranked[0].exchange.id, "e1");
        assert_relative_eq!(ranked[0].concept_similarities[0], 0.8, epsilon = 1e-6);
        assert_relative_eq!(ranked[0].concept_similarities[1], 0.4, epsilon = 1e-6);
        assert_relative_eq!(ranked[0].average_similarity, 0.6, epsilon = 1e-6);
    }

    #[test]
    fn first_candidate_per_concept_wins_within_a_conversation() {
        let per_concept = vec![
            vec![hit("best", "archive-a", 0.1), hit("worse", "archive-a", 0.5)],
            vec![hit("other", "archive-a", 0.3)],
        ];

        let ranked = rank_conjunctions(per_concept, 2, 10);
        assert_relative_eq!(ranked[0].concept_similarities[0], 0.9, epsilon = 1e-6);
    }

    #[test]
    fn survivors_sorted_by_average_similarity_and_truncated() {
        let per_concept = vec![
            vec![
                hit("a1", "archive-a", 0.4),
                hit("b1", "archive-b", 0.1),
                hit("c1", "archive-c", 0.3),
            ],
            vec![
                hit("a2", "archive-a", 0.4),
                hit("b2", "archive-b", 0.1),
                hit("c2", "archive-c", 0.3),
            ],
        ];

        let ranked = rank_conjunctions(per_concept, 2, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].exchange.archive_path, "archive-b");
        assert_eq!(ranked[1].exchange.archive_path, "archive-c");
        assert!(ranked[0].average_similarity >= ranked[1].average_similarity);
    }

    #[test]
    fn no_survivors_yields_empty_list() {
        let per_concept = vec![
            vec![hit("a1", "archive-a", 0.2)],
            vec![hit("b1", "archive-b", 0.2)],
        ];

        let ranked = rank_conjunctions(per_concept, 2, 10);
        assert!(ranked.is_empty());
    }
}
