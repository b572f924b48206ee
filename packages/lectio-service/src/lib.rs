pub mod search;

mod error;

pub use error::{Error, Result};
pub use search::{
	Backend, DocumentContext, DocumentGroup, SearchExplain, SearchFilters, SearchItem,
	SearchRequest, SearchResponse,
	observe::{ChannelReport, SearchObserver, SearchTelemetry, TracingObserver},
};

use std::sync::Arc;

use lectio_config::{Config, EmbeddingProviderConfig};
use lectio_providers::embedding;
use lectio_storage::store::{BoxFuture, PassageStore};

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	/// Any error is read as "embedding unavailable" and routes the call to the fallback backend.
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, lectio_providers::Result<Vec<Vec<f32>>>>;
}

pub struct SearchService {
	pub cfg: Config,
	pub store: Arc<dyn PassageStore>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub observer: Arc<dyn SearchObserver>,
}
impl SearchService {
	pub fn new(cfg: Config, store: Arc<dyn PassageStore>) -> Self {
		Self {
			cfg,
			store,
			embedding: Arc::new(DefaultProviders),
			observer: Arc::new(TracingObserver),
		}
	}

	pub fn with_embedding(mut self, embedding: Arc<dyn EmbeddingProvider>) -> Self {
		self.embedding = embedding;

		self
	}

	pub fn with_observer(mut self, observer: Arc<dyn SearchObserver>) -> Self {
		self.observer = observer;

		self
	}
}

struct DefaultProviders;

impl EmbeddingProvider for DefaultProviders {
	fn embed<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		texts: &'a [String],
	) -> BoxFuture<'a, lectio_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(embedding::embed(cfg, texts))
	}
}
