mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Postgres, Providers, Qdrant, Search, SearchReference,
	SearchVector, SearchWeights, Service, Storage,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;
	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);
	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if let Some(qdrant) = cfg.storage.qdrant.as_ref() {
		if qdrant.collection.trim().is_empty() {
			return Err(Error::Validation {
				message: "storage.qdrant.collection must be non-empty.".to_string(),
			});
		}
		if cfg.providers.embedding.dimensions != qdrant.vector_dim {
			return Err(Error::Validation {
				message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
					.to_string(),
			});
		}
	}
	if cfg.search.max_k == 0 {
		return Err(Error::Validation {
			message: "search.max_k must be greater than zero.".to_string(),
		});
	}
	if !(1..=10).contains(&cfg.search.overfetch_multiplier) {
		return Err(Error::Validation {
			message: "search.overfetch_multiplier must be in the range 1-10.".to_string(),
		});
	}
	if cfg.search.max_candidates < cfg.search.max_k {
		return Err(Error::Validation {
			message: "search.max_candidates must be at least search.max_k.".to_string(),
		});
	}
	if cfg.search.channel_timeout_ms == 0 {
		return Err(Error::Validation {
			message: "search.channel_timeout_ms must be greater than zero.".to_string(),
		});
	}
	if let Some(deadline) = cfg.search.deadline_ms
		&& deadline < cfg.search.channel_timeout_ms
	{
		return Err(Error::Validation {
			message: "search.deadline_ms must be at least search.channel_timeout_ms.".to_string(),
		});
	}
	if cfg.search.snippet_max_chars < 16 {
		return Err(Error::Validation {
			message: "search.snippet_max_chars must be at least 16.".to_string(),
		});
	}

	for (label, weight) in [
		("search.weights.lexical", cfg.search.weights.lexical),
		("search.weights.vector", cfg.search.weights.vector),
		("search.weights.metadata", cfg.search.weights.metadata),
		("search.weights.reference_bonus", cfg.search.weights.reference_bonus),
	] {
		if !weight.is_finite() {
			return Err(Error::Validation { message: format!("{label} must be a finite number.") });
		}
		if weight < 0.0 {
			return Err(Error::Validation { message: format!("{label} must be zero or greater.") });
		}
	}

	if cfg.providers.embedding.api_key.trim().is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg.service.log_level.trim().is_empty() {
		cfg.service.log_level = "info".to_string();
	}
	if cfg.search.deadline_ms == Some(0) {
		cfg.search.deadline_ms = None;
	}

	let api_base = cfg.providers.embedding.api_base.trim_end_matches('/').to_string();

	cfg.providers.embedding.api_base = api_base;
}
