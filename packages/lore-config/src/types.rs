use std::collections::HashMap;

use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	pub retrieval: Retrieval,
	pub experiment: Experiment,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	#[serde(default = "default_log_level")]
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	#[serde(default = "default_backend")]
	pub backend: String,
	/// Expected length of every stored and queried vector.
	pub vector_dim: u32,
	pub postgres: Option<Postgres>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Postgres {
	pub dsn: String,
	pub pool_max_conns: u32,
	#[serde(default = "default_table")]
	pub table: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
}

#[derive(Debug, Clone, Deserialize)]
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

#[derive(Debug, Clone, Deserialize)]
pub struct Retrieval {
	pub default_top_k: u32,
	pub max_top_k: u32,
	/// Identity used for bucketing when the caller sends none. Empty sends anonymous callers to
	/// `experiment.default_bucket`.
	#[serde(default = "default_anonymous_identity")]
	pub anonymous_identity: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Experiment {
	pub default_bucket: String,
	/// Keyed by bucket label ("A" or "B").
	#[serde(default)]
	pub variants: HashMap<String, Variant>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Variant {
	pub prompt_version: String,
	pub model: String,
	#[serde(default = "default_instructions")]
	pub instructions: String,
}

fn default_log_level() -> String {
	"info".to_string()
}

fn default_backend() -> String {
	"memory".to_string()
}

fn default_table() -> String {
	"documents".to_string()
}

fn default_anonymous_identity() -> String {
	"anon".to_string()
}

fn default_instructions() -> String {
	"Answer using retrieved context only.".to_string()
}
