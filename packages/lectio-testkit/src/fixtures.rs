//! Corpus builders for engine and storage tests. Ids are derived from small integers so
//! assertions can name them.

use serde_json::Value;
use uuid::Uuid;

use lectio_domain::guardrail::DocumentAttributes;
use lectio_storage::{
	memory::MemoryStore,
	models::{DocumentRecord, PassageRecord},
};

pub fn document_id(n: u128) -> Uuid {
	Uuid::from_u128(0xd0c0_0000_0000 + n)
}

pub fn passage_id(n: u128) -> Uuid {
	Uuid::from_u128(0xba55_0000_0000 + n)
}

pub fn document(n: u128, title: &str) -> DocumentRecord {
	DocumentRecord {
		document_id: document_id(n),
		title: title.to_string(),
		attributes: DocumentAttributes::default(),
		metadata: Value::Null,
		source_url: None,
	}
}

pub trait DocumentExt {
	fn authored_by(self, authors: &[&str]) -> Self;
	fn in_tradition(self, tradition: &str) -> Self;
	fn in_domains(self, domains: &[&str]) -> Self;
	fn with_metadata(self, metadata: Value) -> Self;
}
impl DocumentExt for DocumentRecord {
	fn authored_by(mut self, authors: &[&str]) -> Self {
		self.attributes.authors = authors.iter().map(|value| value.to_string()).collect();

		self
	}

	fn in_tradition(mut self, tradition: &str) -> Self {
		self.attributes.tradition = Some(tradition.to_string());

		self
	}

	fn in_domains(mut self, domains: &[&str]) -> Self {
		self.attributes.topic_domains = domains.iter().map(|value| value.to_string()).collect();

		self
	}

	fn with_metadata(mut self, metadata: Value) -> Self {
		self.metadata = metadata;

		self
	}
}

pub fn passage(n: u128, document: u128, text: &str, osis_ref: Option<&str>) -> PassageRecord {
	PassageRecord {
		passage_id: passage_id(n),
		document_id: document_id(document),
		text: text.to_string(),
		osis_ref: osis_ref.map(str::to_string),
		osis_start: None,
		osis_end: None,
	}
}

/// Collects documents and passages, then materializes them into a [`MemoryStore`].
#[derive(Default)]
pub struct CorpusBuilder {
	documents: Vec<DocumentRecord>,
	passages: Vec<(PassageRecord, Option<Vec<f32>>)>,
}
impl CorpusBuilder {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn document(mut self, document: DocumentRecord) -> Self {
		self.documents.push(document);

		self
	}

	pub fn passage(mut self, passage: PassageRecord) -> Self {
		self.passages.push((passage, None));

		self
	}

	pub fn embedded_passage(mut self, passage: PassageRecord, embedding: Vec<f32>) -> Self {
		self.passages.push((passage, Some(embedding)));

		self
	}

	pub fn build(self) -> MemoryStore {
		let mut store = MemoryStore::new();

		for document in self.documents {
			store.insert_document(document);
		}
		for (passage, embedding) in self.passages {
			store.insert_passage(passage, embedding);
		}

		store
	}
}
