pub mod audit;
pub mod ingest;
pub mod query;

mod error;

pub use audit::{AuditOutcome, AuditRecord, AuditSink, TracingAuditSink};
pub use error::{Error, Result};
pub use ingest::{IngestRequest, IngestResponse};
pub use lore_storage::BoxFuture;
pub use query::{
	INJECTION_ERROR, InjectionRejection, QueryOutcome, QueryRequest, QueryResponse, Source,
};

use std::sync::Arc;

use lore_config::Config;
use lore_domain::bucket::Bucket;
use lore_providers::embedding::EmbeddingClient;
use lore_storage::VectorIndex;

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, lore_providers::Result<Vec<Vec<f32>>>>;
}

impl EmbeddingProvider for EmbeddingClient {
	fn embed<'a>(
		&'a self,
		texts: &'a [String],
	) -> BoxFuture<'a, lore_providers::Result<Vec<Vec<f32>>>> {
		Box::pin(EmbeddingClient::embed(self, texts))
	}
}

/// Query-time retrieval: screen, bucket, embed, search, assemble.
///
/// Built once per process and shared; it holds no per-request state, so concurrent calls are
/// independent.
pub struct LoreService {
	pub cfg: Config,
	pub index: Arc<dyn VectorIndex>,
	pub embedder: Arc<dyn EmbeddingProvider>,
	pub audit: Arc<dyn AuditSink>,
	default_bucket: Bucket,
}
impl LoreService {
	pub fn new(
		cfg: Config,
		index: Arc<dyn VectorIndex>,
		embedder: Arc<dyn EmbeddingProvider>,
	) -> Result<Self> {
		Self::with_audit_sink(cfg, index, embedder, Arc::new(TracingAuditSink))
	}

	pub fn with_audit_sink(
		cfg: Config,
		index: Arc<dyn VectorIndex>,
		embedder: Arc<dyn EmbeddingProvider>,
		audit: Arc<dyn AuditSink>,
	) -> Result<Self> {
		let default_bucket = cfg
			.experiment
			.default_bucket
			.parse::<Bucket>()
			.map_err(|err| Error::Config { message: err.to_string() })?;

		Ok(Self { cfg, index, embedder, audit, default_bucket })
	}

	/// Opens the configured index and embedding client.
	pub async fn from_config(cfg: Config) -> Result<Self> {
		if let Some((provider_dim, index_dim)) = lore_config::dimension_mismatch(&cfg) {
			tracing::warn!(
				provider_dim,
				index_dim,
				"Embedding dimensions differ from storage.vector_dim; mismatched vectors will be rejected."
			);
		}

		let index = lore_storage::open(&cfg.storage).await?;
		let embedder = EmbeddingClient::new(&cfg.providers.embedding)?;

		Self::new(cfg, index, Arc::new(embedder))
	}

	pub fn default_bucket(&self) -> Bucket {
		self.default_bucket
	}

	pub(crate) async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
		let texts = [text.to_string()];
		let vectors = self.embedder.embed(&texts).await.map_err(|err| {
			tracing::error!(error = %err, "Embedding provider call failed.");

			Error::from(err)
		})?;

		vectors.into_iter().next().ok_or_else(|| Error::Provider {
			message: "Embedding provider returned no vectors.".to_string(),
		})
	}
}
