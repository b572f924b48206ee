use std::{collections::HashMap, future::Future, pin::Pin};

use uuid::Uuid;

use lectio_domain::{guardrail::GuardrailFilters, osis::OsisRange};

use crate::{
	Result,
	models::{DocumentRecord, MetadataHit, PassageHit},
};

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reference channel input: passages intersecting `window` are fetched and ordered by their gap
/// to `query`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceQuery {
	pub query: (u32, u32),
	pub window: (u32, u32),
}
impl ReferenceQuery {
	pub fn new(query: &OsisRange, window_chapters: u32) -> Option<Self> {
		let query_bounds = query.bounds()?;
		let window = query.widen(window_chapters).bounds()?;

		Some(Self { query: query_bounds, window })
	}

	pub fn gap(&self, start: u32, end: u32) -> u32 {
		let (q_start, q_end) = self.query;

		if start > q_end {
			start - q_end
		} else if q_start > end {
			q_start - end
		} else {
			0
		}
	}
}

/// Read-only backing store consumed by the search engine.
///
/// Every channel method receives normalized guardrail filters and must apply them before
/// `limit` is enforced. Ordering within a channel must be deterministic (score, then passage id).
pub trait PassageStore
where
	Self: Send + Sync,
{
	fn lexical_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>>;

	/// Fails with [`crate::Error::VectorUnavailable`] when no vector index is configured.
	fn vector_candidates<'a>(
		&'a self,
		embedding: &'a [f32],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>>;

	fn metadata_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<MetadataHit>>>;

	fn reference_candidates<'a>(
		&'a self,
		reference: ReferenceQuery,
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>>;

	/// Missing ids are absent from the map rather than an error.
	fn documents<'a>(
		&'a self,
		document_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, DocumentRecord>>>;

	fn vector_index_available(&self) -> bool;
}
