pub mod memory;
pub mod models;
pub mod pgvector;
pub mod schema;

mod error;

pub use error::Error;
pub use models::{DocumentId, NewDocument, ScoredDocument};

use std::{future::Future, pin::Pin, sync::Arc};

use crate::{memory::MemoryIndex, pgvector::PgVectorIndex};

pub type Result<T, E = Error> = std::result::Result<T, E>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Stores vectors with attached content and answers top-k cosine queries.
///
/// Every backing must hold to the same contract: vectors of the wrong length are rejected before
/// any state changes, ids are assigned by the index and never reused, results come back by
/// descending score with ties broken by ascending id, and a short corpus yields fewer than `k`
/// results rather than an error.
pub trait VectorIndex
where
	Self: Send + Sync,
{
	fn dimension(&self) -> usize;

	fn insert<'a>(&'a self, doc: NewDocument) -> BoxFuture<'a, Result<DocumentId>>;

	fn search<'a>(
		&'a self,
		query: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredDocument>>>;

	fn len<'a>(&'a self) -> BoxFuture<'a, Result<u64>>;
}

/// Opens the backing selected by `storage.backend`.
pub async fn open(cfg: &lore_config::Storage) -> Result<Arc<dyn VectorIndex>> {
	let dim = cfg.vector_dim as usize;

	match cfg.backend.as_str() {
		lore_config::BACKEND_POSTGRES => {
			let Some(postgres) = cfg.postgres.as_ref() else {
				return Err(Error::InvalidArgument(
					"storage.postgres is required for the postgres backend.".to_string(),
				));
			};
			let index = PgVectorIndex::connect(postgres, dim).await?;

			index.ensure_schema().await?;

			tracing::info!(table = %postgres.table, dim, "Opened pgvector index.");

			Ok(Arc::new(index))
		},
		_ => {
			tracing::info!(dim, "Opened in-memory vector index.");

			Ok(Arc::new(MemoryIndex::new(dim)))
		},
	}
}

pub(crate) fn check_vector(expected: usize, vector: &[f32]) -> Result<()> {
	if vector.len() != expected {
		return Err(Error::DimensionMismatch { expected, actual: vector.len() });
	}
	if vector.iter().any(|value| !value.is_finite()) {
		return Err(Error::InvalidArgument("Vector values must be finite.".to_string()));
	}

	Ok(())
}

pub(crate) fn check_k(k: usize) -> Result<()> {
	if k == 0 {
		return Err(Error::InvalidArgument("k must be greater than zero.".to_string()));
	}

	Ok(())
}
