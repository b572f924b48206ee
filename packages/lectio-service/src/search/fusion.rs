//! Candidate fusion: merge per-channel candidates, score them, keep the top `k`, and rank by
//! document.

use std::{
	cmp::Ordering,
	collections::{BTreeMap, HashMap},
};

use uuid::Uuid;

use lectio_config::SearchWeights;
use lectio_domain::osis::{self, OsisRange};
use lectio_storage::models::PassageRecord;

/// Per-passage working state. Each channel fills only its own signal.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
	pub passage: PassageRecord,
	pub lexical: f32,
	pub vector: f32,
	pub metadata: f32,
	/// `None` means neither side carried a reference; it contributes nothing.
	pub reference_distance: Option<f32>,
	pub reference_match: bool,
}
impl Candidate {
	pub fn new(passage: PassageRecord) -> Self {
		Self {
			passage,
			lexical: 0.0,
			vector: 0.0,
			metadata: 0.0,
			reference_distance: None,
			reference_match: false,
		}
	}

	pub fn passage_id(&self) -> Uuid {
		self.passage.passage_id
	}

	pub fn document_id(&self) -> Uuid {
		self.passage.document_id
	}

	fn absorb(&mut self, other: Candidate) {
		self.lexical += other.lexical;
		self.vector += other.vector;
		self.metadata += other.metadata;
		self.reference_match |= other.reference_match;
		self.reference_distance = min_distance(self.reference_distance, other.reference_distance);
	}

	fn is_well_formed(&self) -> bool {
		[self.lexical, self.vector, self.metadata].iter().all(|score| score.is_finite() && *score >= 0.0)
			&& self.reference_distance.is_none_or(|distance| distance.is_finite() && distance >= 0.0)
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
	pub candidate: Candidate,
	pub total: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RankedCandidate {
	pub candidate: Candidate,
	pub total: f32,
	pub document_rank: u32,
	/// Index in score order before document grouping.
	pub position: usize,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentGroup {
	pub document_id: Uuid,
	pub document_rank: u32,
	pub best_score: f32,
	pub passage_ids: Vec<Uuid>,
}

/// Folds channel results, given in channel order, into one map keyed by passage id. Signals from
/// different channels accumulate.
pub fn merge_candidates(channel_results: Vec<Vec<Candidate>>) -> BTreeMap<Uuid, Candidate> {
	let mut merged: BTreeMap<Uuid, Candidate> = BTreeMap::new();

	for candidate in channel_results.into_iter().flatten() {
		match merged.get_mut(&candidate.passage_id()) {
			Some(existing) => existing.absorb(candidate),
			None => {
				merged.insert(candidate.passage_id(), candidate);
			},
		}
	}

	merged
}

/// Sets the flag iff the candidate's reference intersects the query range. Channels other than
/// the reference channel can surface an intersecting passage, so this runs after merging.
pub fn mark_reference_match(candidate: &mut Candidate, query_range: &OsisRange) {
	let candidate_range = candidate.passage.reference_range();

	candidate.reference_match = osis::reference_matches(query_range, &candidate_range);
	candidate.reference_distance = min_distance(
		candidate.reference_distance,
		osis::reference_distance(query_range, &candidate_range),
	);
}

pub fn score_candidate(candidate: &Candidate, weights: &SearchWeights) -> f32 {
	let bonus = if candidate.reference_match { weights.reference_bonus } else { 0.0 };

	weights.lexical * candidate.lexical
		+ weights.vector * candidate.vector
		+ weights.metadata * candidate.metadata
		+ bonus
}

/// Scores every candidate, dropping malformed ones and those without a positive signal.
pub fn score_candidates(
	candidates: BTreeMap<Uuid, Candidate>,
	weights: &SearchWeights,
) -> Vec<ScoredCandidate> {
	candidates
		.into_values()
		.filter_map(|candidate| {
			if !candidate.is_well_formed() {
				tracing::warn!(
					passage_id = %candidate.passage_id(),
					lexical = candidate.lexical,
					vector = candidate.vector,
					metadata = candidate.metadata,
					"Skipping malformed candidate."
				);

				return None;
			}

			let total = score_candidate(&candidate, weights);

			(total.is_finite() && total > 0.0).then_some(ScoredCandidate { candidate, total })
		})
		.collect()
}

/// Total descending, then passage id ascending; truncated to `k`.
pub fn merge_scored_candidates(mut candidates: Vec<ScoredCandidate>, k: usize) -> Vec<ScoredCandidate> {
	candidates.sort_by(|a, b| {
		cmp_f32_desc(a.total, b.total)
			.then_with(|| a.candidate.passage_id().cmp(&b.candidate.passage_id()))
	});
	candidates.truncate(k);

	candidates
}

/// Ranks documents 1..N by first appearance in `ordered` and gives every passage its document's
/// rank. Output is ordered by rank, then by incoming score order.
pub fn apply_document_ranks(ordered: Vec<ScoredCandidate>) -> Vec<RankedCandidate> {
	let mut ranks: HashMap<Uuid, u32> = HashMap::new();
	let mut ranked: Vec<RankedCandidate> = ordered
		.into_iter()
		.enumerate()
		.map(|(position, scored)| {
			let next_rank = ranks.len() as u32 + 1;
			let document_rank = *ranks.entry(scored.candidate.document_id()).or_insert(next_rank);

			RankedCandidate { candidate: scored.candidate, total: scored.total, document_rank, position }
		})
		.collect();

	ranked.sort_by_key(|item| (item.document_rank, item.position));

	ranked
}

pub fn build_document_groups(ranked: &[RankedCandidate]) -> Vec<DocumentGroup> {
	let mut groups: Vec<DocumentGroup> = Vec::new();
	let mut index: HashMap<Uuid, usize> = HashMap::new();

	for item in ranked {
		let document_id = item.candidate.document_id();

		match index.get(&document_id) {
			Some(&slot) => {
				let group = &mut groups[slot];

				group.best_score = group.best_score.max(item.total);
				group.document_rank = group.document_rank.min(item.document_rank);
				group.passage_ids.push(item.candidate.passage_id());
			},
			None => {
				index.insert(document_id, groups.len());
				groups.push(DocumentGroup {
					document_id,
					document_rank: item.document_rank,
					best_score: item.total,
					passage_ids: vec![item.candidate.passage_id()],
				});
			},
		}
	}

	groups.sort_by(|a, b| {
		a.document_rank.cmp(&b.document_rank).then_with(|| cmp_f32_desc(a.best_score, b.best_score))
	});

	groups
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn min_distance(a: Option<f32>, b: Option<f32>) -> Option<f32> {
	match (a, b) {
		(Some(a), Some(b)) => Some(a.min(b)),
		(a, None) => a,
		(None, b) => b,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn passage(n: u128, document: u128) -> PassageRecord {
		PassageRecord {
			passage_id: Uuid::from_u128(n),
			document_id: Uuid::from_u128(1_000 + document),
			text: String::new(),
			osis_ref: None,
			osis_start: None,
			osis_end: None,
		}
	}

	fn scored(n: u128, document: u128, total: f32) -> ScoredCandidate {
		ScoredCandidate { candidate: Candidate::new(passage(n, document)), total }
	}

	#[test]
	fn merge_sums_signals_across_channels() {
		let mut lexical = Candidate::new(passage(1, 1));
		let mut vector = Candidate::new(passage(1, 1));

		lexical.lexical = 0.5;
		vector.vector = 0.75;
		vector.reference_match = true;

		let merged = merge_candidates(vec![vec![lexical], vec![vector]]);
		let candidate = &merged[&Uuid::from_u128(1)];

		assert_eq!(merged.len(), 1);
		assert_eq!(candidate.lexical, 0.5);
		assert_eq!(candidate.vector, 0.75);
		assert!(candidate.reference_match);
		assert_eq!(score_candidate(candidate, &SearchWeights::default()), 1.45);
	}

	#[test]
	fn zero_and_malformed_candidates_are_dropped() {
		let mut positive = Candidate::new(passage(1, 1));
		let zero = Candidate::new(passage(2, 1));
		let mut broken = Candidate::new(passage(3, 1));

		positive.lexical = 0.5;
		broken.vector = f32::NAN;

		let merged = merge_candidates(vec![vec![positive, zero, broken]]);
		let scored = score_candidates(merged, &SearchWeights::default());

		assert_eq!(scored.len(), 1);
		assert_eq!(scored[0].candidate.passage_id(), Uuid::from_u128(1));
	}

	#[test]
	fn ties_break_on_passage_id() {
		let ordered = merge_scored_candidates(
			vec![scored(9, 1, 0.5), scored(2, 2, 0.5), scored(5, 3, 0.9)],
			2,
		);
		let ids: Vec<_> = ordered.iter().map(|item| item.candidate.passage_id()).collect();

		assert_eq!(ids, vec![Uuid::from_u128(5), Uuid::from_u128(2)]);
	}

	#[test]
	fn document_ranks_follow_first_appearance() {
		let ranked =
			apply_document_ranks(vec![scored(1, 1, 0.9), scored(2, 2, 0.8), scored(3, 1, 0.7)]);
		let view: Vec<_> = ranked
			.iter()
			.map(|item| (item.candidate.passage_id(), item.document_rank))
			.collect();

		assert_eq!(view, vec![
			(Uuid::from_u128(1), 1),
			(Uuid::from_u128(3), 1),
			(Uuid::from_u128(2), 2)
		]);

		let groups = build_document_groups(&ranked);

		assert_eq!(groups.len(), 2);
		assert_eq!(groups[0].best_score, 0.9);
		assert_eq!(groups[0].passage_ids, vec![Uuid::from_u128(1), Uuid::from_u128(3)]);
		assert_eq!(groups[1].document_rank, 2);
	}

	#[test]
	fn reference_flag_requires_intersection() {
		let mut inside = Candidate::new(PassageRecord {
			osis_ref: Some("John.1.1-John.1.3".to_string()),
			..passage(1, 1)
		});
		let mut outside =
			Candidate::new(PassageRecord { osis_ref: Some("John.3.16".to_string()), ..passage(2, 1) });
		let query = OsisRange::Span { start: 43_001_001, end: 43_001_001 };

		mark_reference_match(&mut inside, &query);
		mark_reference_match(&mut outside, &query);

		assert!(inside.reference_match);
		assert_eq!(inside.reference_distance, Some(0.0));
		assert!(!outside.reference_match);
		assert!(outside.reference_distance.is_some_and(|distance| distance > 0.0));
	}
}
