use std::collections::HashMap;

use uuid::Uuid;

use lectio_domain::guardrail::GuardrailFilters;

use crate::{
	Error, Result,
	db::Db,
	models::{DocumentRecord, MetadataHit, PassageHit},
	qdrant::QdrantStore,
	queries,
	store::{BoxFuture, PassageStore, ReferenceQuery},
};

/// Postgres for text, metadata, and reference channels; Qdrant for the vector channel when
/// configured.
pub struct PgStore {
	pub db: Db,
	pub qdrant: Option<QdrantStore>,
}
impl PgStore {
	pub async fn connect(cfg: &lectio_config::Storage) -> Result<Self> {
		let db = Db::connect(&cfg.postgres).await?;
		let qdrant = cfg.qdrant.as_ref().map(QdrantStore::new).transpose()?;

		Ok(Self { db, qdrant })
	}

	async fn vector(
		&self,
		embedding: &[f32],
		filters: &GuardrailFilters,
		limit: u32,
	) -> Result<Vec<PassageHit>> {
		let Some(qdrant) = self.qdrant.as_ref() else {
			return Err(Error::VectorUnavailable("Qdrant is not configured.".to_string()));
		};
		let scored = qdrant.nearest_passages(embedding, filters, limit).await?;
		let passage_ids: Vec<Uuid> = scored.iter().map(|(id, _)| *id).collect();
		let scores: HashMap<Uuid, f32> = scored.into_iter().collect();
		// Guardrails are re-applied here so stale index payloads cannot leak excluded passages.
		let passages = queries::passages_by_ids(&self.db.pool, &passage_ids, filters).await?;

		Ok(passages
			.into_iter()
			.map(|passage| {
				let score = scores.get(&passage.passage_id).copied().unwrap_or(0.0);

				PassageHit { passage, score }
			})
			.collect())
	}
}

impl PassageStore for PgStore {
	fn lexical_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(queries::lexical_passages(&self.db.pool, terms, filters, limit))
	}

	fn vector_candidates<'a>(
		&'a self,
		embedding: &'a [f32],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(self.vector(embedding, filters, limit))
	}

	fn metadata_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<MetadataHit>>> {
		Box::pin(queries::metadata_passages(&self.db.pool, terms, filters, limit))
	}

	fn reference_candidates<'a>(
		&'a self,
		reference: ReferenceQuery,
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(queries::reference_passages(&self.db.pool, reference, filters, limit))
	}

	fn documents<'a>(
		&'a self,
		document_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, DocumentRecord>>> {
		Box::pin(async move {
			let documents = queries::documents_by_ids(&self.db.pool, document_ids).await?;

			Ok(documents.into_iter().map(|document| (document.document_id, document)).collect())
		})
	}

	fn vector_index_available(&self) -> bool {
		self.qdrant.is_some()
	}
}
