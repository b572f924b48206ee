pub mod assemble;
pub mod channel;
pub mod fusion;
pub mod observe;

pub use fusion::DocumentGroup;

use std::{
	collections::{HashMap, HashSet},
	sync::Arc,
	time::{Duration, Instant},
};

use tokio::{task::JoinSet, time};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::{Error, Result, SearchService};
use assemble::AssembleOptions;
use channel::{Channel, ChannelError, ChannelKind, PlanInput};
use fusion::{Candidate, ScoredCandidate};
use lectio_domain::{
	guardrail::{self, GuardrailFilters},
	lexical,
	osis::{self, OsisRange},
};
use lectio_storage::models::DocumentRecord;
use observe::{ChannelReport, ChannelStatus, SearchTelemetry};

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SearchFilters {
	#[serde(default)]
	pub authors: Vec<String>,
	#[serde(default)]
	pub traditions: Vec<String>,
	#[serde(default)]
	pub topic_domains: Vec<String>,
	/// Extra structured-metadata terms matched alongside the query text. These widen the metadata
	/// channel and never exclude candidates.
	#[serde(default)]
	pub metadata: Vec<String>,
}
impl SearchFilters {
	pub fn guardrails(&self) -> GuardrailFilters {
		GuardrailFilters {
			authors: self.authors.clone(),
			traditions: self.traditions.clone(),
			topic_domains: self.topic_domains.clone(),
		}
		.normalized()
	}
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SearchRequest {
	pub query: String,
	#[serde(default)]
	pub structured_reference: Option<String>,
	#[serde(default)]
	pub filters: SearchFilters,
	pub k: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
	Primary,
	Fallback,
}
impl Backend {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Primary => "primary",
			Self::Fallback => "fallback",
		}
	}
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct DocumentContext {
	pub authors: Vec<String>,
	pub tradition: Option<String>,
	pub topic_domains: Vec<String>,
	pub source_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchExplain {
	pub lexical: f32,
	pub vector: f32,
	pub metadata: f32,
	pub reference_distance: Option<f32>,
	pub reference_bonus: f32,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchItem {
	pub passage_id: Uuid,
	pub document_id: Uuid,
	pub document_title: String,
	pub snippet: String,
	pub highlights: Vec<String>,
	pub structured_reference: Option<String>,
	pub score: f32,
	pub document_rank: u32,
	pub backend: Backend,
	pub document: DocumentContext,
	pub explain: SearchExplain,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SearchResponse {
	pub trace_id: Uuid,
	pub backend: Backend,
	pub items: Vec<SearchItem>,
	pub groups: Vec<DocumentGroup>,
}

/// What a call has learned so far. Filled in as the pipeline advances so telemetry can be recorded
/// on every exit path.
struct CallState {
	trace_id: Uuid,
	backend: Option<Backend>,
	channels: Vec<ChannelReport>,
	result_count: usize,
}
impl CallState {
	fn new() -> Self {
		Self { trace_id: Uuid::new_v4(), backend: None, channels: Vec::new(), result_count: 0 }
	}
}

struct ChannelOutcome {
	kind: ChannelKind,
	result: Result<Vec<Candidate>, ChannelError>,
	elapsed_ms: u64,
}
impl ChannelOutcome {
	fn status(&self) -> ChannelStatus {
		match &self.result {
			Ok(_) => ChannelStatus::Ok,
			Err(ChannelError::Timeout { .. }) => ChannelStatus::TimedOut,
			Err(ChannelError::Unavailable { .. }) => ChannelStatus::Unavailable,
			Err(ChannelError::Store { .. }) => ChannelStatus::Failed,
		}
	}

	fn failed(&self) -> bool {
		matches!(self.status(), ChannelStatus::Unavailable | ChannelStatus::Failed)
	}

	fn report(&self) -> ChannelReport {
		ChannelReport {
			channel: self.kind,
			status: self.status(),
			candidates: self.result.as_ref().map_or(0, Vec::len),
			elapsed_ms: self.elapsed_ms,
		}
	}
}

impl SearchService {
	/// Runs one search. Cancelling `cancel`, or exceeding `search.deadline_ms`, abandons every
	/// in-flight channel and returns [`Error::Cancelled`] without a partial result.
	///
	/// The observer receives exactly one [`SearchTelemetry`] per call, whether it succeeds or not.
	pub async fn search(
		&self,
		req: SearchRequest,
		cancel: &CancellationToken,
	) -> Result<SearchResponse> {
		let started = Instant::now();
		let deadline = self.cfg.search.deadline_ms.map(Duration::from_millis);
		let mut state = CallState::new();
		let result = {
			let run = async {
				match deadline {
					Some(deadline) => time::timeout(deadline, self.run_search(&req, &mut state))
						.await
						.unwrap_or_else(|_| {
							tracing::warn!(
								deadline_ms = deadline.as_millis() as u64,
								"Search exceeded its deadline."
							);

							Err(Error::Cancelled)
						}),
					None => self.run_search(&req, &mut state).await,
				}
			};

			tokio::select! {
				biased;
				_ = cancel.cancelled() => {
					tracing::info!("Search cancelled by caller.");

					Err(Error::Cancelled)
				},
				result = run => result,
			}
		};

		self.observer.record(&SearchTelemetry {
			trace_id: state.trace_id,
			query: req.query.trim().to_string(),
			filters: req.filters.guardrails(),
			backend: state.backend,
			channels: state.channels,
			result_count: state.result_count,
			latency_ms: started.elapsed().as_millis() as u64,
			error: result.as_ref().err().map(ToString::to_string),
		});

		result
	}

	async fn run_search(
		&self,
		req: &SearchRequest,
		state: &mut CallState,
	) -> Result<SearchResponse> {
		let trace_id = state.trace_id;
		let search_cfg = &self.cfg.search;
		let query = req.query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}
		if req.k == 0 {
			return Err(Error::InvalidRequest {
				message: "k must be greater than zero.".to_string(),
			});
		}
		if req.k > search_cfg.max_k {
			return Err(Error::InvalidRequest {
				message: format!("k must be at most {}.", search_cfg.max_k),
			});
		}

		let reference = match req.structured_reference.as_deref().map(str::trim) {
			Some(raw) if !raw.is_empty() => osis::expand_reference(raw)?,
			_ => OsisRange::Empty,
		};
		let filters = req.filters.guardrails();
		let tokens = lexical::tokenize(query);
		let mut metadata_terms = lexical::query_terms(&tokens);

		for constraint in &req.filters.metadata {
			metadata_terms.extend(lexical::tokenize(constraint));
		}

		let embedding = self.query_embedding(query).await;
		let channels = channel::plan_channels(PlanInput {
			tokens: &tokens,
			metadata_terms: &metadata_terms,
			reference: &reference,
			window_chapters: search_cfg.reference.window_chapters,
			embedding,
		});
		let limit = channel::channel_limit(
			req.k,
			search_cfg.overfetch_multiplier,
			search_cfg.max_candidates,
		);
		let outcomes = self.run_channels(channels, &filters, limit).await;

		state.channels = outcomes.iter().map(ChannelOutcome::report).collect();

		if outcomes.iter().all(ChannelOutcome::failed) {
			let message = outcomes
				.iter()
				.filter_map(|outcome| outcome.result.as_ref().err().map(ToString::to_string))
				.collect::<Vec<_>>()
				.join(" ");

			tracing::error!(trace_id = %trace_id, error = %message, "Every search channel failed.");

			return Err(Error::BackendUnavailable { message });
		}

		// Primary only when the vector channel actually contributed; otherwise the call was served
		// without vector signal.
		let backend = if outcomes
			.iter()
			.any(|outcome| outcome.kind == ChannelKind::Vector && outcome.result.is_ok())
		{
			Backend::Primary
		} else {
			Backend::Fallback
		};

		state.backend = Some(backend);

		let channel_results: Vec<Vec<Candidate>> = outcomes
			.into_iter()
			.map(|outcome| match outcome.result {
				Ok(candidates) => candidates,
				Err(err) => {
					tracing::warn!(
						trace_id = %trace_id,
						channel = outcome.kind.as_str(),
						error = %err,
						"Search channel degraded to an empty result."
					);

					Vec::new()
				},
			})
			.collect();
		let mut merged = fusion::merge_candidates(channel_results);

		if !reference.is_empty() {
			for candidate in merged.values_mut() {
				fusion::mark_reference_match(candidate, &reference);
			}
		}

		let scored = fusion::score_candidates(merged, &search_cfg.weights);
		// Resolve before truncating so dropped documents are backfilled from the overfetch.
		let (resolved, documents) = self.resolve_documents(trace_id, scored, &filters).await?;
		let ordered = fusion::merge_scored_candidates(resolved, req.k as usize);
		let ranked = fusion::apply_document_ranks(ordered);
		let groups = fusion::build_document_groups(&ranked);
		let options = AssembleOptions {
			snippet_max_chars: search_cfg.snippet_max_chars as usize,
			max_highlights: search_cfg.max_highlights as usize,
			reference_bonus: search_cfg.weights.reference_bonus,
			backend,
		};
		let items: Vec<SearchItem> = ranked
			.iter()
			.filter_map(|item| {
				let document = documents.get(&item.candidate.document_id())?;

				Some(assemble::build_result(item, document, &tokens, &options))
			})
			.collect();

		state.result_count = items.len();

		Ok(SearchResponse { trace_id, backend, items, groups })
	}

	/// `None` routes the call to the fallback backend.
	async fn query_embedding(&self, query: &str) -> Option<Vec<f32>> {
		if !self.cfg.search.vector.enabled {
			return None;
		}
		if !self.store.vector_index_available() {
			tracing::info!("Vector index is unavailable. Using the fallback backend.");

			return None;
		}

		let cfg = &self.cfg.providers.embedding;
		let texts = vec![query.to_string()];
		let timeout = Duration::from_millis(cfg.timeout_ms.max(1));
		let vectors = match time::timeout(timeout, self.embedding.embed(cfg, &texts)).await {
			Ok(Ok(vectors)) => vectors,
			Ok(Err(err)) => {
				tracing::warn!(error = %err, "Query embedding failed. Using the fallback backend.");

				return None;
			},
			Err(_) => {
				tracing::warn!(
					timeout_ms = cfg.timeout_ms,
					"Query embedding timed out. Using the fallback backend."
				);

				return None;
			},
		};
		let Ok([vector]) = <[Vec<f32>; 1]>::try_from(vectors) else {
			tracing::warn!("Embedding provider returned an unexpected number of vectors.");

			return None;
		};

		if vector.len() != cfg.dimensions as usize || vector.iter().any(|value| !value.is_finite())
		{
			tracing::warn!(
				expected = cfg.dimensions,
				actual = vector.len(),
				"Query embedding has the wrong shape. Using the fallback backend."
			);

			return None;
		}

		Some(vector)
	}

	/// Runs every channel concurrently under the per-channel timeout. Outcomes come back in
	/// channel order regardless of completion order.
	async fn run_channels(
		&self,
		channels: Vec<Channel>,
		filters: &GuardrailFilters,
		limit: u32,
	) -> Vec<ChannelOutcome> {
		let timeout_ms = self.cfg.search.channel_timeout_ms;
		let timeout = Duration::from_millis(timeout_ms);
		let kinds: Vec<ChannelKind> = channels.iter().map(Channel::kind).collect();
		let mut tasks = JoinSet::new();

		for (position, channel) in channels.into_iter().enumerate() {
			let store = Arc::clone(&self.store);
			let filters = filters.clone();

			tasks.spawn(async move {
				let started = Instant::now();
				let kind = channel.kind();
				let execution = channel.execute(store.as_ref(), &filters, limit);
				let result = match time::timeout(timeout, execution).await {
					Ok(result) => result,
					Err(_) =>
						Err(ChannelError::Timeout { channel: kind.as_str(), after_ms: timeout_ms }),
				};

				(position, result, started.elapsed().as_millis() as u64)
			});
		}

		let mut slots: Vec<Option<ChannelOutcome>> = kinds.iter().map(|_| None).collect();

		while let Some(joined) = tasks.join_next().await {
			match joined {
				Ok((position, result, elapsed_ms)) =>
					if let (Some(slot), Some(kind)) = (slots.get_mut(position), kinds.get(position)) {
						*slot = Some(ChannelOutcome { kind: *kind, result, elapsed_ms });
					},
				Err(err) => tracing::error!(error = %err, "Search channel task did not complete."),
			}
		}

		kinds
			.into_iter()
			.zip(slots)
			.map(|(kind, slot)| {
				slot.unwrap_or_else(|| ChannelOutcome {
					kind,
					result: Err(ChannelError::Unavailable {
						channel: kind.as_str(),
						message: "Channel task did not complete.".to_string(),
					}),
					elapsed_ms: 0,
				})
			})
			.collect()
	}

	/// Looks up parent documents once, dropping candidates whose document vanished or whose
	/// resolved document fails the guardrails.
	async fn resolve_documents(
		&self,
		trace_id: Uuid,
		scored: Vec<ScoredCandidate>,
		filters: &GuardrailFilters,
	) -> Result<(Vec<ScoredCandidate>, HashMap<Uuid, DocumentRecord>)> {
		let mut seen = HashSet::new();
		let document_ids: Vec<Uuid> = scored
			.iter()
			.map(|scored| scored.candidate.document_id())
			.filter(|id| seen.insert(*id))
			.collect();
		let documents = self.store.documents(&document_ids).await?;
		let resolved = scored
			.into_iter()
			.filter(|scored| {
				let candidate = &scored.candidate;
				let Some(document) = documents.get(&candidate.document_id()) else {
					tracing::warn!(
						trace_id = %trace_id,
						passage_id = %candidate.passage_id(),
						document_id = %candidate.document_id(),
						"Dropping candidate whose document could not be resolved."
					);

					return false;
				};

				if !guardrail::passes_filters(&document.attributes, filters) {
					tracing::warn!(
						trace_id = %trace_id,
						passage_id = %candidate.passage_id(),
						"Dropping candidate that fails guardrails after document resolution."
					);

					return false;
				}

				true
			})
			.collect();

		Ok((resolved, documents))
	}
}
