use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub search: Search,
}

#[derive(Debug, Deserialize)]
pub struct Service {
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Deserialize)]
pub struct Storage {
	pub postgres: Postgres,
	/// Optional. Without it the vector channel is never planned and every search is served by the
	/// fallback backend.
	pub qdrant: Option<Qdrant>,
}

#[derive(Debug, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
}

#[derive(Debug, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
pub struct Search {
	pub max_k: u32,
	/// Each channel fetches `k * overfetch_multiplier` rows so guardrail and zero-score drops
	/// during fusion still leave `k` results.
	pub overfetch_multiplier: u32,
	pub max_candidates: u32,
	pub channel_timeout_ms: u64,
	/// Optional. Overall budget for one call; exceeding it cancels the call.
	pub deadline_ms: Option<u64>,
	pub snippet_max_chars: u32,
	pub max_highlights: u32,
	pub weights: SearchWeights,
	pub reference: SearchReference,
	pub vector: SearchVector,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct SearchWeights {
	pub lexical: f32,
	pub vector: f32,
	pub metadata: f32,
	/// Flat bonus added once when a passage's reference intersects the query reference.
	pub reference_bonus: f32,
}
impl Default for SearchWeights {
	fn default() -> Self {
		Self { lexical: 1.0, vector: 1.0, metadata: 0.5, reference_bonus: 0.2 }
	}
}

#[derive(Debug, Deserialize)]
pub struct SearchReference {
	/// Passages within this many chapters of the query range are fetched by the reference
	/// channel; only intersecting ones earn the bonus.
	pub window_chapters: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchVector {
	pub enabled: bool,
}

fn default_log_level() -> String {
	"info".to_string()
}
