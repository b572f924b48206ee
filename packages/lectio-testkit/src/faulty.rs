//! A [`PassageStore`] wrapper that injects latency and failures per channel.

use std::{
	collections::{HashMap, HashSet},
	sync::{
		Arc,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use uuid::Uuid;

use lectio_domain::guardrail::GuardrailFilters;
use lectio_storage::{
	Error, Result,
	models::{DocumentRecord, MetadataHit, PassageHit},
	store::{BoxFuture, PassageStore, ReferenceQuery},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Fault {
	Lexical,
	Vector,
	Metadata,
	Reference,
}

#[derive(Debug, Clone, Copy)]
enum Behavior {
	Delay(Duration),
	Fail,
}

pub struct FaultyStore<S> {
	inner: S,
	behaviors: HashMap<Fault, Behavior>,
	hidden_documents: HashSet<Uuid>,
	document_lookups: Arc<AtomicUsize>,
}
impl<S> FaultyStore<S>
where
	S: PassageStore,
{
	pub fn new(inner: S) -> Self {
		Self {
			inner,
			behaviors: HashMap::new(),
			hidden_documents: HashSet::new(),
			document_lookups: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn delay(mut self, channel: Fault, delay: Duration) -> Self {
		self.behaviors.insert(channel, Behavior::Delay(delay));

		self
	}

	pub fn fail(mut self, channel: Fault) -> Self {
		self.behaviors.insert(channel, Behavior::Fail);

		self
	}

	/// Documents that disappear between candidate retrieval and result assembly.
	pub fn hide_document(mut self, document_id: Uuid) -> Self {
		self.hidden_documents.insert(document_id);

		self
	}

	pub fn document_lookups(&self) -> Arc<AtomicUsize> {
		self.document_lookups.clone()
	}

	async fn inject(&self, channel: Fault) -> Result<()> {
		match self.behaviors.get(&channel) {
			Some(Behavior::Delay(delay)) => {
				tokio::time::sleep(*delay).await;

				Ok(())
			},
			Some(Behavior::Fail) =>
				Err(Error::InvalidArgument(format!("Injected {channel:?} channel failure."))),
			None => Ok(()),
		}
	}
}

impl<S> PassageStore for FaultyStore<S>
where
	S: PassageStore,
{
	fn lexical_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(async move {
			self.inject(Fault::Lexical).await?;
			self.inner.lexical_candidates(terms, filters, limit).await
		})
	}

	fn vector_candidates<'a>(
		&'a self,
		embedding: &'a [f32],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(async move {
			self.inject(Fault::Vector).await?;
			self.inner.vector_candidates(embedding, filters, limit).await
		})
	}

	fn metadata_candidates<'a>(
		&'a self,
		terms: &'a [String],
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<MetadataHit>>> {
		Box::pin(async move {
			self.inject(Fault::Metadata).await?;
			self.inner.metadata_candidates(terms, filters, limit).await
		})
	}

	fn reference_candidates<'a>(
		&'a self,
		reference: ReferenceQuery,
		filters: &'a GuardrailFilters,
		limit: u32,
	) -> BoxFuture<'a, Result<Vec<PassageHit>>> {
		Box::pin(async move {
			self.inject(Fault::Reference).await?;
			self.inner.reference_candidates(reference, filters, limit).await
		})
	}

	fn documents<'a>(
		&'a self,
		document_ids: &'a [Uuid],
	) -> BoxFuture<'a, Result<HashMap<Uuid, DocumentRecord>>> {
		Box::pin(async move {
			self.document_lookups.fetch_add(1, Ordering::SeqCst);

			let mut documents = self.inner.documents(document_ids).await?;

			documents.retain(|id, _| !self.hidden_documents.contains(id));

			Ok(documents)
		})
	}

	fn vector_index_available(&self) -> bool {
		self.inner.vector_index_available()
	}
}
