pub const DENSE_VECTOR_NAME: &str = "dense";
pub const PAYLOAD_PASSAGE_ID: &str = "passage_id";
pub const PAYLOAD_AUTHORS: &str = "authors";
pub const PAYLOAD_TRADITION: &str = "tradition";
pub const PAYLOAD_TOPIC_DOMAINS: &str = "topic_domains";

use std::collections::HashMap;

use qdrant_client::{
	Qdrant,
	qdrant::{
		Condition, Filter, PointId, Query, QueryPointsBuilder, ScoredPoint, Value,
		point_id::PointIdOptions, value::Kind,
	},
};
use uuid::Uuid;

use lectio_domain::guardrail::GuardrailFilters;

use crate::{Error, Result};

pub struct QdrantStore {
	pub client: Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &lectio_config::Qdrant) -> Result<Self> {
		let client = Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest passages with guardrails pushed into the payload filter. Scores are cosine
	/// similarities as reported by the collection.
	pub async fn nearest_passages(
		&self,
		vector: &[f32],
		filters: &GuardrailFilters,
		limit: u32,
	) -> Result<Vec<(Uuid, f32)>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions; collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}
		if limit == 0 {
			return Ok(Vec::new());
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.with_payload(true)
			.limit(u64::from(limit));

		if let Some(filter) = guardrail_filter(filters) {
			search = search.filter(filter);
		}

		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(scored_passage).collect())
	}
}

/// Payload values are stored lowercased at index time so keyword matches line up with
/// normalized filters.
pub fn guardrail_filter(filters: &GuardrailFilters) -> Option<Filter> {
	let mut must = Vec::new();

	if !filters.authors.is_empty() {
		must.push(Condition::matches(PAYLOAD_AUTHORS, filters.authors.clone()));
	}
	if !filters.traditions.is_empty() {
		must.push(Condition::matches(PAYLOAD_TRADITION, filters.traditions.clone()));
	}
	if !filters.topic_domains.is_empty() {
		must.push(Condition::matches(PAYLOAD_TOPIC_DOMAINS, filters.topic_domains.clone()));
	}

	if must.is_empty() { None } else { Some(Filter::all(must)) }
}

fn scored_passage(point: &ScoredPoint) -> Option<(Uuid, f32)> {
	let passage_id = point
		.id
		.as_ref()
		.and_then(point_id_to_uuid)
		.or_else(|| payload_uuid(&point.payload, PAYLOAD_PASSAGE_ID));

	match passage_id {
		Some(passage_id) => Some((passage_id, point.score)),
		None => {
			tracing::warn!(point_id = ?point.id, "Vector point has no passage id.");

			None
		},
	}
}

fn point_id_to_uuid(point_id: &PointId) -> Option<Uuid> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Uuid::parse_str(id).ok(),
		_ => None,
	}
}

fn payload_uuid(payload: &HashMap<String, Value>, key: &str) -> Option<Uuid> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Uuid::parse_str(text).ok(),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn empty_filters_push_nothing_down() {
		assert!(guardrail_filter(&GuardrailFilters::default()).is_none());
	}

	#[test]
	fn each_restricted_field_becomes_a_must_condition() {
		let filters = GuardrailFilters {
			authors: vec!["augustine".to_string()],
			traditions: Vec::new(),
			topic_domains: vec!["grace".to_string(), "sin".to_string()],
		};
		let filter = guardrail_filter(&filters).expect("Filter should be built.");

		assert_eq!(filter.must.len(), 2);
		assert!(filter.should.is_empty());
	}

	#[test]
	fn uuid_point_ids_resolve() {
		let id = Uuid::from_u128(42);
		let point_id = PointId { point_id_options: Some(PointIdOptions::Uuid(id.to_string())) };

		assert_eq!(point_id_to_uuid(&point_id), Some(id));
		assert_eq!(
			point_id_to_uuid(&PointId { point_id_options: Some(PointIdOptions::Num(7)) }),
			None
		);
	}
}
