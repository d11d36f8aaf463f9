mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, Experiment, Postgres, Providers, Retrieval, Service, Storage,
	Variant,
};

use std::{fs, path::Path};

pub const BACKEND_MEMORY: &str = "memory";
pub const BACKEND_POSTGRES: &str = "postgres";

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
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.storage.vector_dim == 0 {
		return Err(Error::Validation {
			message: "storage.vector_dim must be greater than zero.".to_string(),
		});
	}

	match cfg.storage.backend.as_str() {
		BACKEND_MEMORY => {},
		BACKEND_POSTGRES => {
			let Some(postgres) = cfg.storage.postgres.as_ref() else {
				return Err(Error::Validation {
					message: "storage.postgres is required when storage.backend is postgres."
						.to_string(),
				});
			};

			if postgres.dsn.trim().is_empty() {
				return Err(Error::Validation {
					message: "storage.postgres.dsn must be non-empty.".to_string(),
				});
			}
			if postgres.pool_max_conns == 0 {
				return Err(Error::Validation {
					message: "storage.postgres.pool_max_conns must be greater than zero."
						.to_string(),
				});
			}
			if !is_sql_identifier(&postgres.table) {
				return Err(Error::Validation {
					message: "storage.postgres.table must match [a-z_][a-z0-9_]*.".to_string(),
				});
			}
		},
		_ => {
			return Err(Error::Validation {
				message: "storage.backend must be one of memory or postgres.".to_string(),
			});
		},
	}

	let embedding = &cfg.providers.embedding;

	if embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if embedding.api_key.is_empty() {
		return Err(Error::Validation {
			message: "Provider embedding api_key must be non-empty.".to_string(),
		});
	}
	if embedding.timeout_ms == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.timeout_ms must be greater than zero.".to_string(),
		});
	}
	if embedding.default_headers.values().any(|value| !value.is_string()) {
		return Err(Error::Validation {
			message: "providers.embedding.default_headers values must be strings.".to_string(),
		});
	}
	if cfg.retrieval.max_top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.max_top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.default_top_k == 0 || cfg.retrieval.default_top_k > cfg.retrieval.max_top_k {
		return Err(Error::Validation {
			message: "retrieval.default_top_k must be between 1 and retrieval.max_top_k."
				.to_string(),
		});
	}
	if !is_bucket_label(&cfg.experiment.default_bucket) {
		return Err(Error::Validation {
			message: "experiment.default_bucket must be one of A or B.".to_string(),
		});
	}

	for (label, variant) in &cfg.experiment.variants {
		if !is_bucket_label(label) {
			return Err(Error::Validation {
				message: format!("experiment.variants.{label} is not a known bucket."),
			});
		}
		if variant.prompt_version.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("experiment.variants.{label}.prompt_version must be non-empty."),
			});
		}
		if variant.model.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("experiment.variants.{label}.model must be non-empty."),
			});
		}
	}

	Ok(())
}

/// Returns `(provider_dim, index_dim)` when the embedding model is configured to emit vectors of
/// a different length than the index stores.
///
/// This is a warning, not a load failure. Vectors of the wrong length are still rejected by the
/// index at insert and search time.
pub fn dimension_mismatch(cfg: &Config) -> Option<(u32, u32)> {
	let provider_dim = cfg.providers.embedding.dimensions;
	let index_dim = cfg.storage.vector_dim;

	(provider_dim != index_dim).then_some((provider_dim, index_dim))
}

fn normalize(cfg: &mut Config) {
	let embedding = &mut cfg.providers.embedding;

	embedding.api_key = embedding.api_key.trim().to_string();
	embedding
		.default_headers
		.retain(|_, value| value.as_str().map(|raw| !raw.trim().is_empty()).unwrap_or(true));

	cfg.experiment.default_bucket = cfg.experiment.default_bucket.trim().to_ascii_uppercase();
}

fn is_bucket_label(label: &str) -> bool {
	matches!(label, "A" | "B")
}

fn is_sql_identifier(name: &str) -> bool {
	let mut chars = name.chars();
	let Some(first) = chars.next() else {
		return false;
	};

	(first.is_ascii_lowercase() || first == '_')
		&& chars.all(|ch| ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')
		&& name.len() <= 63
}
