use serde_json::Value;
use uuid::Uuid;

use lectio_domain::{
	guardrail::DocumentAttributes,
	osis::{self, OsisRange},
};

#[derive(Debug, Clone, PartialEq)]
pub struct PassageRecord {
	pub passage_id: Uuid,
	pub document_id: Uuid,
	pub text: String,
	pub osis_ref: Option<String>,
	pub osis_start: Option<u32>,
	pub osis_end: Option<u32>,
}
impl PassageRecord {
	/// Prefers the stored verse-id bounds and falls back to expanding `osis_ref`.
	pub fn reference_range(&self) -> OsisRange {
		if let (Some(start), Some(end)) = (self.osis_start, self.osis_end)
			&& start <= end
		{
			return OsisRange::Span { start, end };
		}

		let Some(raw) = self.osis_ref.as_deref() else { return OsisRange::Empty };

		match osis::expand_reference(raw) {
			Ok(range) => range,
			Err(err) => {
				tracing::warn!(
					passage_id = %self.passage_id,
					error = %err,
					"Stored passage reference is malformed."
				);

				OsisRange::Empty
			},
		}
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct DocumentRecord {
	pub document_id: Uuid,
	pub title: String,
	pub attributes: DocumentAttributes,
	pub metadata: Value,
	pub source_url: Option<String>,
}

/// One channel row. `score` is the store's raw ordering score (text rank, cosine similarity, or
/// reference gap) and is re-derived by the engine where needed.
#[derive(Debug, Clone)]
pub struct PassageHit {
	pub passage: PassageRecord,
	pub score: f32,
}

#[derive(Debug, Clone)]
pub struct MetadataHit {
	pub passage: PassageRecord,
	pub metadata: Value,
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct PassageRow {
	pub passage_id: Uuid,
	pub document_id: Uuid,
	pub text: String,
	pub osis_ref: Option<String>,
	pub osis_start: Option<i32>,
	pub osis_end: Option<i32>,
}
impl From<PassageRow> for PassageRecord {
	fn from(row: PassageRow) -> Self {
		Self {
			passage_id: row.passage_id,
			document_id: row.document_id,
			text: row.text,
			osis_ref: row.osis_ref,
			osis_start: row.osis_start.and_then(|value| u32::try_from(value).ok()),
			osis_end: row.osis_end.and_then(|value| u32::try_from(value).ok()),
		}
	}
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DocumentRow {
	pub document_id: Uuid,
	pub title: String,
	pub authors: Option<Vec<String>>,
	pub tradition: Option<String>,
	pub topic_domains: Option<Vec<String>>,
	pub metadata: Value,
	pub source_url: Option<String>,
}
impl From<DocumentRow> for DocumentRecord {
	fn from(row: DocumentRow) -> Self {
		Self {
			document_id: row.document_id,
			title: row.title,
			attributes: DocumentAttributes {
				authors: row.authors.unwrap_or_default(),
				tradition: row.tradition,
				topic_domains: row.topic_domains.unwrap_or_default(),
			},
			metadata: row.metadata,
			source_url: row.source_url,
		}
	}
}
