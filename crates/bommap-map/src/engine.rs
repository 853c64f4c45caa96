//! Mapping proposal engine.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use bommap_model::{ColumnName, HeaderMapping, MappingEntry, ModelError};

use crate::score::score_headers;
use crate::utils::normalize_header;

/// Minimum score for a pair to be proposed at all.
pub const DEFAULT_SCORE_THRESHOLD: f64 = 0.6;

/// Proposes a source header for each target header.
///
/// Optionally seeded with per-target synonyms (typically the source spellings
/// a template was saved with); a synonym hit scores as an exact match before
/// any distance scoring happens.
///
/// The engine performs one-to-one assignment: each source header is given to
/// at most one target, greedily in descending score order over all pairs, so
/// two targets can never both claim the same best source.
pub struct MappingEngine {
    threshold: f64,
    /// target -> normalized known spellings.
    synonyms: BTreeMap<ColumnName, BTreeSet<String>>,
}

/// One target header's outcome: the chosen source (or none) and its score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetProposal {
    pub target: ColumnName,
    pub source: Option<ColumnName>,
    /// Confidence in `[0, 1]`; `0.0` when no source cleared the threshold.
    pub score: f32,
}

/// Full proposal: one entry per target header in input order, plus the
/// source headers nothing claimed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingProposal {
    pub proposals: Vec<TargetProposal>,
    pub unmapped_sources: Vec<ColumnName>,
}

impl MappingProposal {
    pub fn mapped_count(&self) -> usize {
        self.proposals
            .iter()
            .filter(|proposal| proposal.source.is_some())
            .count()
    }

    /// Converts the proposal into a confirmable mapping, preserving target
    /// input order.
    pub fn into_mapping(self) -> Result<HeaderMapping, ModelError> {
        HeaderMapping::new(
            self.proposals
                .into_iter()
                .map(|proposal| MappingEntry {
                    target: proposal.target,
                    source: proposal.source,
                })
                .collect(),
        )
    }
}

struct Candidate {
    target_idx: usize,
    source_idx: usize,
    score: f64,
}

impl MappingEngine {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold,
            synonyms: BTreeMap::new(),
        }
    }

    /// Seeds per-target synonyms, e.g. from a saved template's mapping.
    pub fn with_synonyms(mut self, synonyms: &BTreeMap<ColumnName, Vec<String>>) -> Self {
        for (target, spellings) in synonyms {
            let normalized = spellings
                .iter()
                .map(|spelling| normalize_header(spelling))
                .filter(|spelling| !spelling.is_empty())
                .collect();
            self.synonyms.insert(target.clone(), normalized);
        }
        self
    }

    /// Scores and assigns sources to targets. Pure function of the inputs.
    ///
    /// Duplicate target headers keep their first occurrence only, preserving
    /// the invariant that a mapping addresses each target at most once.
    /// Score ties break by source input order, then target input order.
    pub fn propose(
        &self,
        source_headers: &[ColumnName],
        target_headers: &[ColumnName],
    ) -> MappingProposal {
        let mut targets: Vec<ColumnName> = Vec::new();
        let mut seen = BTreeSet::new();
        for target in target_headers {
            if seen.insert(target.clone()) {
                targets.push(target.clone());
            }
        }

        let mut candidates: Vec<Candidate> = Vec::new();
        for (target_idx, target) in targets.iter().enumerate() {
            for (source_idx, source) in source_headers.iter().enumerate() {
                let score = self.score_pair(target, source);
                if score >= self.threshold {
                    candidates.push(Candidate {
                        target_idx,
                        source_idx,
                        score,
                    });
                }
            }
        }

        candidates.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.source_idx.cmp(&b.source_idx))
                .then(a.target_idx.cmp(&b.target_idx))
        });

        let mut assigned: Vec<Option<(usize, f64)>> = vec![None; targets.len()];
        let mut used_sources = BTreeSet::new();
        for candidate in candidates {
            if assigned[candidate.target_idx].is_some() || used_sources.contains(&candidate.source_idx)
            {
                continue;
            }
            assigned[candidate.target_idx] = Some((candidate.source_idx, candidate.score));
            used_sources.insert(candidate.source_idx);
        }

        let proposals = targets
            .into_iter()
            .enumerate()
            .map(|(target_idx, target)| match assigned[target_idx] {
                Some((source_idx, score)) => TargetProposal {
                    target,
                    source: Some(source_headers[source_idx].clone()),
                    score: score as f32,
                },
                None => TargetProposal {
                    target,
                    source: None,
                    score: 0.0,
                },
            })
            .collect();

        let unmapped_sources = source_headers
            .iter()
            .enumerate()
            .filter(|(source_idx, _)| !used_sources.contains(source_idx))
            .map(|(_, source)| source.clone())
            .collect();

        MappingProposal {
            proposals,
            unmapped_sources,
        }
    }

    /// Score for one (target, source) pair, with synonym override.
    pub fn score_pair(&self, target: &ColumnName, source: &ColumnName) -> f64 {
        if let Some(spellings) = self.synonyms.get(target)
            && spellings.contains(&normalize_header(source.as_str()))
        {
            return 1.0;
        }
        score_headers(target.as_str(), source.as_str())
    }
}

impl Default for MappingEngine {
    fn default() -> Self {
        Self::new(DEFAULT_SCORE_THRESHOLD)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cols(names: &[&str]) -> Vec<ColumnName> {
        names
            .iter()
            .map(|name| ColumnName::new(*name).unwrap())
            .collect()
    }

    #[test]
    fn duplicate_targets_keep_first_occurrence() {
        let engine = MappingEngine::default();
        let proposal = engine.propose(&cols(&["Qty"]), &cols(&["Quantity", "Quantity"]));
        assert_eq!(proposal.proposals.len(), 1);
    }

    #[test]
    fn synonym_hit_scores_exactly_one() {
        let target = ColumnName::new("Material Group").unwrap();
        let synonyms = BTreeMap::from([(
            target.clone(),
            vec!["Warengruppe".to_string()],
        )]);
        let engine = MappingEngine::default().with_synonyms(&synonyms);

        let source = ColumnName::new("WARENGRUPPE").unwrap();
        assert_eq!(engine.score_pair(&target, &source), 1.0);
    }

    #[test]
    fn tie_at_equal_score_prefers_first_source() {
        let engine = MappingEngine::default();
        // Two identically-spelled source headers produce identical scores;
        // the earlier one must win.
        let proposal = engine.propose(&cols(&["Qty", "Qty"]), &cols(&["Quantity"]));
        assert_eq!(
            proposal.proposals[0].source,
            Some(ColumnName::new("Qty").unwrap())
        );
        assert_eq!(proposal.unmapped_sources.len(), 1);
    }
}
