//! In-process [`PassageStore`] over a fixed corpus.
//!
//! Used by tests and by the CLI when a JSON corpus is supplied instead of a database. Channel
//! ordering mirrors the Postgres queries: score first, then passage id.

use std::{
	cmp::Ordering,
	collections::{BTreeMap, BTreeSet, HashMap},
	path::Path,
};

use serde::Deserialize;
use serde_json::Value;
use uuid::Uuid;

use lectio_domain::{
	guardrail::{self, DocumentAttributes, GuardrailFilters},
	lexical, metadata,
	osis::OsisRange,
};

use crate::{
	Error, Result,
	models::{DocumentRecord, MetadataHit, PassageHit, PassageRecord},
	store::{BoxFuture, PassageStore, ReferenceQuery},
};

/// On-disk corpus layout: documents with their passages nested.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Corpus {
	#[serde(default)]
	pub documents: Vec<CorpusDocument>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorpusDocument {
	pub document_id: Uuid,
	pub title: String,
	#[serde(flatten)]
	pub attributes: DocumentAttributes,
	#[serde(default)]
	pub metadata: Value,
	#[serde(default)]
	pub source_url: Option<String>,
	#[serde(default)]
	pub passages: Vec<CorpusPassage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CorpusPassage {
	pub passage_id: Uuid,
	pub text: String,
	#[serde(default)]
	pub osis_ref: Option<String>,
	#[serde(default)]
	pub embedding: Option<Vec<f32>>,
}

struct StoredPassage {
	record: PassageRecord,
	range: OsisRange,
	embedding: Option<Vec<f32>>,
}

struct StoredDocument {
	record: DocumentRecord,
	terms: BTreeSet<String>,
}

#[derive(Default)]
pub struct MemoryStore {
	documents: BTreeMap<Uuid, StoredDocument>,
	passages: BTreeMap<Uuid, StoredPassage>,
	vector_index: bool,
}
impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn load(path: &Path) -> Result<Self> {
		let raw = std::fs::read_to_string(path)
			.map_err(|source| Error::ReadCorpus { path: path.to_path_buf(), source })?;
		let corpus: Corpus = serde_json::from_str(&raw)
			.map_err(|source| Error::ParseCorpus { path: path.to_path_buf(), source })?;

		Ok(Self::from_corpus(corpus))
	}

	/// The vector index is reported available once any passage carries an embedding.
	pub fn from_corpus(corpus: Corpus) -> Self {
		let mut store = Self::new();

		for document in corpus.documents {
			let document_id = document.document_id;

			store.insert_document(DocumentRecord {
				document_id,
				title: document.title,
				attributes: document.attributes,
				metadata: document.metadata,
				source_url: document.source_url,
			});

			for passage in document.passages {
				let record = PassageRecord {
					passage_id: passage.passage_id,
					document_id,
					text: passage.text,
					osis_ref: passage.osis_ref,
					osis_start: None,
					osis_end: None,
				};

				store.insert_passage(record, passage.embedding);
			}
		}

		store
	}

	pub fn insert_document(&mut self, record: DocumentRecord) {
		let terms = metadata::metadata_terms(&record.metadata);

		self.documents.insert(record.document_id, StoredDocument { record, terms });
	}

	pub fn insert_passage(&mut self, mut record: PassageRecord, embedding: Option<Vec<f32>>) {
		let range = record.reference_range();

		if let Some((start, end)) = range.bounds() {
			record.osis_start = Some(start);
			record.osis_end = Some(end);
		}
		if embedding.is_some() {
			self.vector_index = true;
		}

		self.passages.insert(record.passage_id, StoredPassage { record, range, embedding });
	}

	/// Removes a document while leaving its passages behind, mimicking a concurrent delete.
	pub fn remove_document(&mut self, document_id: Uuid) -> Option<DocumentRecord> {
		self.documents.remove(&document_id).map(|stored| stored.record)
	}

	pub fn set_vector_index(&mut self, available: bool) {
		self.vector_index = available;
	}

	pub fn passage_count(&self) -> usize {
		self.passages.len()
	}

	fn admitted<'a>(
		&'a self,
		filters: &'a GuardrailFilters,
	) -> impl Iterator<Item = (&'a StoredPassage, &'a StoredDocument)> + 'a {
		self.passages.values().filter_map(move |passage| {
			let document = self.documents.get(&passage.record.document_id)?;

			guardrail::passes_filters(&document.record.attributes, filters)
				.then_some((passage, document))
		})
	}

	fn lexical(&self, terms: &[String], filters: &GuardrailFilters, limit: u32) -> Vec<PassageHit> {
		let mut hits: Vec<PassageHit> = self
			.admitted(filters)
			.filter_map(|(passage, _)| {
				let score = lexical::lexical_score(terms, &passage.record.text);

				(score > 0.0).then(|| PassageHit { passage: passage.record.clone(), score })
			})
			.collect();

		sort_desc(&mut hits);
		hits.truncate(limit as usize);

		hits
	}

	fn vector(&self, embedding: &[f32], filters: &GuardrailFilters, limit: u32) -> Vec<PassageHit> {
		let mut hits: Vec<PassageHit> = self
			.admitted(filters)
			.filter_map(|(passage, _)| {
				let stored = passage.embedding.as_deref()?;
				let score = cosine_similarity(embedding, stored)?;

				Some(PassageHit { passage: passage.record.clone(), score })
			})
			.collect();

		sort_desc(&mut hits);
		hits.truncate(limit as usize);

		hits
	}

	fn metadata(&self, terms: &[String], filters: &GuardrailFilters, limit: u32) -> Vec<MetadataHit> {
		let wanted: BTreeSet<String> = terms.iter().cloned().collect();
		let mut hits: Vec<(usize, MetadataHit)> = self
			.admitted(filters)
			.filter_map(|(passage, document)| {
				let overlap = document.terms.intersection(&wanted).count();

				(overlap > 0).then(|| {
					(overlap, MetadataHit {
						passage: passage.record.clone(),
						metadata: document.record.metadata.clone(),
					})
				})
			})
			.collect();

		hits.sort_by(|(a_overlap, a), (b_overlap, b)| {
			b_overlap.cmp(a_overlap).then_with(|| a.passage.passage_id.cmp(&b.passage.passage_id))
		});
		hits.truncate(limit as usize);

		hits.into_iter().map(|(_, hit)| hit).collect()
	}

	fn reference(
		&self,
		reference: ReferenceQuery,
		filters: &GuardrailFilters,
		limit: u32,
	) -> Vec<PassageHit> {
		let window = OsisRange::Span { start: reference.window.0, end: reference.window.1 };
		let mut hits: Vec<(u32, PassageHit)> = self
			.admitted(filters)
			.filter_map(|(passage, _)| {
				let (start, end) = passage.range.bounds()?;

				passage.range.intersects(&window).then(|| {
					let gap = reference.gap(start, end);

					(gap, PassageHit { passage: passage.record.clone(), score: gap as f32 })
				})
			})
			.collect();

		hits.sort_by(|(a_gap, a), (b_gap, b)| {
			a_gap.cmp(b_gap).then_with(|| a.passage.passage_id.cmp(&b.passage.passage_id))
		});
		hits.truncate(limit as usize);

		hits.into_iter().map(|(_, hit)| hit).collect()
	}
}

impl PassageStore for MemoryStore {
	fn lexical_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(async move { Ok(self.lexical(terms, filters, limit)) })
	}

	fn vector_candidates<'a>(
		&'a self,
		embedding: &'a [f32],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(async move {
			if !self.vector_index {
				return Err(Error::VectorUnavailable("No embeddings are loaded.".to_string()));
			}

			Ok(self.vector(embedding, filters, limit))
		})
	}

	fn metadata_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<MetadataHit>>> {
		Box::pin(async move { Ok(self.metadata(terms, filters, limit)) })
	}

	fn reference_candidates<'a>(
		&'a self,
		reference: ReferenceQuery,
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(async move { Ok(self.reference(reference, filters, limit)) })
	}

	fn documents<'a>(
		&'a self,
		document_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, DocumentRecord>>> {
		Box::pin(async move {
			Ok(document_ids
				.iter()
				.filter_map(|id| self.documents.get(id).map(|stored| (*id, stored.record.clone())))
				.collect())
		})
	}

	fn vector_index_available(&self) -> bool {
		self.vector_index
	}
}

/// Cosine similarity clamped to [0, 1]. `None` on dimension mismatch or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f32> {
	if a.len() != b.len() || a.is_empty() {
		return None;
	}

	let (dot, norm_a, norm_b) = a.iter().zip(b).fold((0.0_f32, 0.0_f32, 0.0_f32), |acc, (x, y)| {
		(acc.0 + x * y, acc.1 + x * x, acc.2 + y * y)
	});

	if norm_a <= 0.0 || norm_b <= 0.0 {
		return None;
	}

	let similarity = dot / (norm_a.sqrt() * norm_b.sqrt());

	similarity.is_finite().then(|| similarity.clamp(0.0, 1.0))
}

fn sort_desc(hits: &mut [PassageHit]) {
	hits.sort_by(|a, b| {
		b.score
			.partial_cmp(&a.score)
			.unwrap_or(Ordering::Equal)
			.then_with(|| a.passage.passage_id.cmp(&b.passage.passage_id))
	});
}
