//! Retrieval channels. Each variant wraps one store query and converts its rows into
//! [`Candidate`]s carrying only that channel's signal.

use std::collections::BTreeSet;

use lectio_domain::{
	guardrail::GuardrailFilters,
	lexical, metadata,
	osis::{self, OsisRange},
};
use lectio_storage::store::{PassageStore, ReferenceQuery};

use crate::search::fusion::Candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelKind {
	Vector,
	Lexical,
	Metadata,
	Reference,
}
impl ChannelKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Vector => "vector",
			Self::Lexical => "lexical",
			Self::Metadata => "metadata",
			Self::Reference => "reference",
		}
	}
}

#[derive(Debug, thiserror::Error)]
pub enum ChannelError {
	#[error("{channel} channel timed out after {after_ms} ms.")]
	Timeout { channel: &'static str, after_ms: u64 },
	#[error("{channel} channel is unavailable: {message}")]
	Unavailable { channel: &'static str, message: String },
	#[error("{channel} channel failed: {source}")]
	Store {
		channel: &'static str,
		#[source]
		source: lectio_storage::Error,
	},
}

#[derive(Debug, Clone)]
pub enum Channel {
	Vector { embedding: Vec<f32> },
	Lexical { tokens: Vec<String> },
	Metadata { terms: BTreeSet<String> },
	Reference { range: OsisRange, window_chapters: u32 },
}
impl Channel {
	pub fn kind(&self) -> ChannelKind {
		match self {
			Self::Vector { .. } => ChannelKind::Vector,
			Self::Lexical { .. } => ChannelKind::Lexical,
			Self::Metadata { .. } => ChannelKind::Metadata,
			Self::Reference { .. } => ChannelKind::Reference,
		}
	}

	pub async fn execute(
		&self,
		store: &dyn PassageStore,
		filters: &GuardrailFilters,
		limit: u32,
	) -> Result<Vec<Candidate>, ChannelError> {
		let channel = self.kind().as_str();

		match self {
			Self::Vector { embedding } => {
				// Any vector-side failure means the index is unreachable for this call.
				let hits = store.vector_candidates(embedding, filters, limit).await.map_err(
					|err| ChannelError::Unavailable { channel, message: err.to_string() },
				)?;

				Ok(hits
					.into_iter()
					.filter_map(|hit| {
						if !hit.score.is_finite() {
							tracing::warn!(
								passage_id = %hit.passage.passage_id,
								score = hit.score,
								"Skipping vector hit with a non-finite score."
							);

							return None;
						}

						let mut candidate = Candidate::new(hit.passage);

						candidate.vector = hit.score.clamp(0.0, 1.0);

						Some(candidate)
					})
					.collect())
			},
			Self::Lexical { tokens } => {
				let terms: Vec<String> = lexical::query_terms(tokens).into_iter().collect();
				let hits = store
					.lexical_candidates(&terms, filters, limit)
					.await
					.map_err(|source| ChannelError::Store { channel, source })?;

				// Store ranks only order the fetch; the signal is re-derived from the text so every
				// backend scores identically.
				Ok(hits
					.into_iter()
					.map(|hit| {
						let lexical = lexical::lexical_score(tokens, &hit.passage.text);
						let mut candidate = Candidate::new(hit.passage);

						candidate.lexical = lexical;

						candidate
					})
					.collect())
			},
			Self::Metadata { terms } => {
				let wanted: Vec<String> = terms.iter().cloned().collect();
				let hits = store
					.metadata_candidates(&wanted, filters, limit)
					.await
					.map_err(|source| ChannelError::Store { channel, source })?;

				Ok(hits
					.into_iter()
					.map(|hit| {
						let score = metadata::metadata_match_score(
							terms,
							&metadata::metadata_terms(&hit.metadata),
						);
						let mut candidate = Candidate::new(hit.passage);

						candidate.metadata = score;

						candidate
					})
					.collect())
			},
			Self::Reference { range, window_chapters } => {
				let Some(reference) = ReferenceQuery::new(range, *window_chapters) else {
					return Ok(Vec::new());
				};
				let hits = store
					.reference_candidates(reference, filters, limit)
					.await
					.map_err(|source| ChannelError::Store { channel, source })?;

				Ok(hits
					.into_iter()
					.map(|hit| {
						let candidate_range = hit.passage.reference_range();
						let mut candidate = Candidate::new(hit.passage);

						candidate.reference_distance =
							osis::reference_distance(range, &candidate_range);
						candidate.reference_match = osis::reference_matches(range, &candidate_range);

						candidate
					})
					.collect())
			},
		}
	}
}

/// Inputs the planner needs beyond the request itself.
#[derive(Debug, Clone)]
pub struct PlanInput<'a> {
	pub tokens: &'a [String],
	pub metadata_terms: &'a BTreeSet<String>,
	pub reference: &'a OsisRange,
	pub window_chapters: u32,
	/// Present only when the primary backend was selected.
	pub embedding: Option<Vec<f32>>,
}

/// Channel order is fixed (vector, lexical, metadata, reference) and defines merge order.
pub fn plan_channels(input: PlanInput<'_>) -> Vec<Channel> {
	let mut channels = Vec::with_capacity(4);

	if let Some(embedding) = input.embedding {
		channels.push(Channel::Vector { embedding });
	}

	channels.push(Channel::Lexical { tokens: input.tokens.to_vec() });

	if !input.metadata_terms.is_empty() {
		channels.push(Channel::Metadata { terms: input.metadata_terms.clone() });
	}
	if !input.reference.is_empty() {
		channels.push(Channel::Reference {
			range: *input.reference,
			window_chapters: input.window_chapters,
		});
	}

	channels
}

/// Rows each channel may fetch: `k` over-fetched by the multiplier, capped by `max_candidates`.
pub fn channel_limit(k: u32, overfetch_multiplier: u32, max_candidates: u32) -> u32 {
	k.saturating_mul(overfetch_multiplier.max(1)).min(max_candidates)
}

#[cfg(test)]
mod tests {
	use super::*;

	fn strings(values: &[&str]) -> Vec<String> {
		values.iter().map(|value| value.to_string()).collect()
	}

	#[test]
	fn lexical_always_planned_and_reference_only_with_a_range() {
		let tokens = strings(&["grace"]);
		let terms = BTreeSet::new();
		let channels = plan_channels(PlanInput {
			tokens: &tokens,
			metadata_terms: &terms,
			reference: &OsisRange::Empty,
			window_chapters: 2,
			embedding: None,
		});
		let kinds: Vec<_> = channels.iter().map(Channel::kind).collect();

		assert_eq!(kinds, vec![ChannelKind::Lexical]);
	}

	#[test]
	fn primary_plan_orders_every_channel() {
		let tokens = strings(&["word"]);
		let terms: BTreeSet<String> = tokens.iter().cloned().collect();
		let range = OsisRange::Span { start: 43_001_001, end: 43_001_001 };
		let channels = plan_channels(PlanInput {
			tokens: &tokens,
			metadata_terms: &terms,
			reference: &range,
			window_chapters: 1,
			embedding: Some(vec![0.1, 0.2]),
		});
		let kinds: Vec<_> = channels.iter().map(Channel::kind).collect();

		assert_eq!(kinds, vec![
			ChannelKind::Vector,
			ChannelKind::Lexical,
			ChannelKind::Metadata,
			ChannelKind::Reference
		]);
	}

	#[test]
	fn limit_overfetches_and_respects_the_cap() {
		assert_eq!(channel_limit(5, 3, 300), 15);
		assert_eq!(channel_limit(50, 10, 300), 300);
		assert_eq!(channel_limit(5, 0, 300), 5);
	}
}
