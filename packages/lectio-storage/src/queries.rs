use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use lectio_domain::{guardrail::GuardrailFilters, lexical, metadata};

use crate::{
	Result,
	models::{DocumentRecord, DocumentRow, MetadataHit, PassageHit, PassageRecord, PassageRow},
	store::ReferenceQuery,
};

// Binds $1 authors, $2 traditions, $3 topic domains. Each list is pre-normalized and empty means
// unrestricted. A NULL document attribute never satisfies a restriction.
macro_rules! guardrail_predicate {
	() => {
		"
	AND (
		cardinality($1::text[]) = 0
		OR EXISTS (SELECT 1 FROM unnest(d.authors) AS a(value) WHERE lower(btrim(a.value)) = ANY($1))
	)
	AND (cardinality($2::text[]) = 0 OR lower(btrim(d.tradition)) = ANY($2))
	AND (
		cardinality($3::text[]) = 0
		OR EXISTS (
			SELECT 1 FROM unnest(d.topic_domains) AS t(value) WHERE lower(btrim(t.value)) = ANY($3)
		)
	)"
	};
}

#[derive(Debug, sqlx::FromRow)]
struct ScoredPassageRow {
	#[sqlx(flatten)]
	passage: PassageRow,
	score: f32,
}

#[derive(Debug, sqlx::FromRow)]
struct MetadataPassageRow {
	#[sqlx(flatten)]
	passage: PassageRow,
	metadata: Value,
}

#[derive(Debug, sqlx::FromRow)]
struct GapPassageRow {
	#[sqlx(flatten)]
	passage: PassageRow,
	gap: i32,
}

pub async fn insert_document(pool: &PgPool, document: &DocumentRecord) -> Result<()> {
	let terms: Vec<String> = metadata::metadata_terms(&document.metadata).into_iter().collect();

	sqlx::query(
		"\
INSERT INTO documents (
	document_id,
	title,
	authors,
	tradition,
	topic_domains,
	metadata,
	metadata_terms,
	source_url
)
VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
ON CONFLICT (document_id) DO UPDATE
SET
	title = EXCLUDED.title,
	authors = EXCLUDED.authors,
	tradition = EXCLUDED.tradition,
	topic_domains = EXCLUDED.topic_domains,
	metadata = EXCLUDED.metadata,
	metadata_terms = EXCLUDED.metadata_terms,
	source_url = EXCLUDED.source_url",
	)
	.bind(document.document_id)
	.bind(document.title.as_str())
	.bind(&document.attributes.authors)
	.bind(document.attributes.tradition.as_deref())
	.bind(&document.attributes.topic_domains)
	.bind(&document.metadata)
	.bind(&terms)
	.bind(document.source_url.as_deref())
	.execute(pool)
	.await?;

	Ok(())
}

pub async fn insert_passage(pool: &PgPool, passage: &PassageRecord) -> Result<()> {
	let osis_start = passage.osis_start.map(to_sql_verse).transpose()?;
	let osis_end = passage.osis_end.map(to_sql_verse).transpose()?;
	let terms: Vec<String> =
		lexical::query_terms(&lexical::tokenize(&passage.text)).into_iter().collect();

	sqlx::query(
		"\
INSERT INTO passages (passage_id, document_id, text, osis_ref, osis_start, osis_end, text_terms)
VALUES ($1, $2, $3, $4, $5, $6, $7)
ON CONFLICT (passage_id) DO UPDATE
SET
	document_id = EXCLUDED.document_id,
	text = EXCLUDED.text,
	osis_ref = EXCLUDED.osis_ref,
	osis_start = EXCLUDED.osis_start,
	osis_end = EXCLUDED.osis_end,
	text_terms = EXCLUDED.text_terms",
	)
	.bind(passage.passage_id)
	.bind(passage.document_id)
	.bind(passage.text.as_str())
	.bind(passage.osis_ref.as_deref())
	.bind(osis_start)
	.bind(osis_end)
	.bind(&terms)
	.execute(pool)
	.await?;

	Ok(())
}

/// Passages sharing any of `terms`, ordered by how many distinct terms they share. Both sides are
/// produced by the domain tokenizer, so matching agrees with the in-memory store.
pub async fn lexical_passages(
	pool: &PgPool,
	terms: &[String],
	filters: &GuardrailFilters,
	limit: u32,
) -> Result<Vec<PassageHit>> {
	if terms.is_empty() || limit == 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<ScoredPassageRow> = sqlx::query_as(concat!(
		"\
SELECT
	p.passage_id,
	p.document_id,
	p.text,
	p.osis_ref,
	p.osis_start,
	p.osis_end,
	cardinality(ARRAY(SELECT unnest(p.text_terms) INTERSECT SELECT unnest($4::text[])))::real
		AS score
FROM passages p
JOIN documents d ON d.document_id = p.document_id
WHERE p.text_terms && $4::text[]",
		guardrail_predicate!(),
		"
ORDER BY score DESC, p.passage_id ASC
LIMIT $5",
	))
	.bind(&filters.authors)
	.bind(&filters.traditions)
	.bind(&filters.topic_domains)
	.bind(terms)
	.bind(i64::from(limit))
	.fetch_all(pool)
	.await?;

	Ok(rows
		.into_iter()
		.map(|row| PassageHit { passage: row.passage.into(), score: row.score })
		.collect())
}

pub async fn metadata_passages(
	pool: &PgPool,
	terms: &[String],
	filters: &GuardrailFilters,
	limit: u32,
) -> Result<Vec<MetadataHit>> {
	if terms.is_empty() || limit == 0 {
		return Ok(Vec::new());
	}

	let rows: Vec<MetadataPassageRow> = sqlx::query_as(concat!(
		"\
SELECT
	p.passage_id,
	p.document_id,
	p.text,
	p.osis_ref,
	p.osis_start,
	p.osis_end,
	d.metadata
FROM passages p
JOIN documents d ON d.document_id = p.document_id
WHERE d.metadata_terms && $4::text[]",
		guardrail_predicate!(),
		"
ORDER BY cardinality(ARRAY(SELECT unnest(d.metadata_terms) INTERSECT SELECT unnest($4::text[]))) DESC,
	p.passage_id ASC
LIMIT $5",
	))
	.bind(&filters.authors)
	.bind(&filters.traditions)
	.bind(&filters.topic_domains)
	.bind(terms)
	.bind(i64::from(limit))
	.fetch_all(pool)
	.await?;

	Ok(rows
		.into_iter()
		.map(|row| MetadataHit { passage: row.passage.into(), metadata: row.metadata })
		.collect())
}

pub async fn reference_passages(
	pool: &PgPool,
	reference: ReferenceQuery,
	filters: &GuardrailFilters,
	limit: u32,
) -> Result<Vec<PassageHit>> {
	if limit == 0 {
		return Ok(Vec::new());
	}

	let (query_start, query_end) = reference.query;
	let (window_start, window_end) = reference.window;
	let rows: Vec<GapPassageRow> = sqlx::query_as(concat!(
		"\
SELECT
	p.passage_id,
	p.document_id,
	p.text,
	p.osis_ref,
	p.osis_start,
	p.osis_end,
	GREATEST(p.osis_start - $7, $6 - p.osis_end, 0) AS gap
FROM passages p
JOIN documents d ON d.document_id = p.document_id
WHERE p.osis_start IS NOT NULL
	AND p.osis_end IS NOT NULL
	AND p.osis_start <= $5
	AND p.osis_end >= $4",
		guardrail_predicate!(),
		"
ORDER BY gap ASC, p.passage_id ASC
LIMIT $8",
	))
	.bind(&filters.authors)
	.bind(&filters.traditions)
	.bind(&filters.topic_domains)
	.bind(to_sql_verse(window_start)?)
	.bind(to_sql_verse(window_end)?)
	.bind(to_sql_verse(query_start)?)
	.bind(to_sql_verse(query_end)?)
	.bind(i64::from(limit))
	.fetch_all(pool)
	.await?;

	Ok(rows
		.into_iter()
		.map(|row| PassageHit { passage: row.passage.into(), score: row.gap as f32 })
		.collect())
}

/// Hydrates passages by id, re-applying guardrails. Output follows the order of `passage_ids`.
pub async fn passages_by_ids(
	pool: &PgPool,
	passage_ids: &[Uuid],
	filters: &GuardrailFilters,
) -> Result<Vec<PassageRecord>> {
	if passage_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<PassageRow> = sqlx::query_as(concat!(
		"\
SELECT p.passage_id, p.document_id, p.text, p.osis_ref, p.osis_start, p.osis_end
FROM passages p
JOIN documents d ON d.document_id = p.document_id
WHERE p.passage_id = ANY($4)",
		guardrail_predicate!(),
	))
	.bind(&filters.authors)
	.bind(&filters.traditions)
	.bind(&filters.topic_domains)
	.bind(passage_ids)
	.fetch_all(pool)
	.await?;
	let mut by_id: std::collections::HashMap<Uuid, PassageRecord> =
		rows.into_iter().map(|row| (row.passage_id, PassageRecord::from(row))).collect();

	Ok(passage_ids.iter().filter_map(|id| by_id.remove(id)).collect())
}

pub async fn documents_by_ids(pool: &PgPool, document_ids: &[Uuid]) -> Result<Vec<DocumentRecord>> {
	if document_ids.is_empty() {
		return Ok(Vec::new());
	}

	let rows: Vec<DocumentRow> = sqlx::query_as(
		"\
SELECT document_id, title, authors, tradition, topic_domains, metadata, source_url
FROM documents
WHERE document_id = ANY($1)",
	)
	.bind(document_ids)
	.fetch_all(pool)
	.await?;

	Ok(rows.into_iter().map(DocumentRecord::from).collect())
}

fn to_sql_verse(verse_id: u32) -> Result<i32> {
	i32::try_from(verse_id).map_err(|_| {
		crate::Error::InvalidArgument(format!("Verse id {verse_id} is out of range."))
	})
}
