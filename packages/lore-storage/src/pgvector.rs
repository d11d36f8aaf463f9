//! PostgreSQL + pgvector backing. Ranking is delegated to the `<=>` cosine distance operator.

use serde_json::{Map, Value};
use sqlx::{PgPool, postgres::PgPoolOptions, types::Json};

use crate::{
	BoxFuture, DocumentId, NewDocument, Result, ScoredDocument, VectorIndex, check_k, check_vector,
	schema,
};

const SCHEMA_LOCK_ID: i64 = 7_120_115;

pub struct PgVectorIndex {
	pub pool: PgPool,
	table: String,
	dim: usize,
}
impl PgVectorIndex {
	pub async fn connect(cfg: &lore_config::Postgres, dim: usize) -> Result<Self> {
		let pool =
			PgPoolOptions::new().max_connections(cfg.pool_max_conns).connect(&cfg.dsn).await?;

		Ok(Self { pool, table: cfg.table.clone(), dim })
	}

	pub async fn ensure_schema(&self) -> Result<()> {
		let sql = schema::render_schema(&self.table, self.dim);
		// Advisory locks are held per connection. Use a single transaction so the lock is scoped to
		// one connection and automatically released when the transaction ends.
		let mut tx = self.pool.begin().await?;

		sqlx::query("SELECT pg_advisory_xact_lock($1)")
			.bind(SCHEMA_LOCK_ID)
			.execute(&mut *tx)
			.await?;

		for statement in sql.split(';') {
			let trimmed = statement.trim();

			if trimmed.is_empty() {
				continue;
			}

			sqlx::query(trimmed).execute(&mut *tx).await?;
		}

		tx.commit().await?;

		Ok(())
	}

	async fn insert_document(&self, doc: NewDocument) -> Result<DocumentId> {
		check_vector(self.dim, &doc.vector)?;

		let sql = format!(
			"\
INSERT INTO {} (content, metadata, embedding)
VALUES ($1, $2, $3::text::vector)
RETURNING id",
			self.table
		);
		let id: i64 = sqlx::query_scalar(&sql)
			.bind(doc.content)
			.bind(Json(doc.metadata))
			.bind(vector_to_pg(&doc.vector))
			.fetch_one(&self.pool)
			.await?;

		Ok(id)
	}

	async fn search_documents(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
		check_vector(self.dim, query)?;
		check_k(k)?;

		// `<=>` is NaN for zero-magnitude vectors; they score 0. Ties break on the projected score.
		let sql = format!(
			"\
SELECT
	id,
	COALESCE(NULLIF((1 - (embedding <=> $1::text::vector))::real, 'NaN'::real), 0)::real AS score,
	content,
	metadata
FROM {}
ORDER BY score DESC, id ASC
LIMIT $2",
			self.table
		);
		let limit = i64::try_from(k).unwrap_or(i64::MAX);
		let rows: Vec<(i64, f32, String, Json<Map<String, Value>>)> = sqlx::query_as(&sql)
			.bind(vector_to_pg(query))
			.bind(limit)
			.fetch_all(&self.pool)
			.await?;

		Ok(rows
			.into_iter()
			.map(|(id, score, content, Json(metadata))| ScoredDocument {
				id,
				score,
				content,
				metadata,
			})
			.collect())
	}

	async fn count(&self) -> Result<u64> {
		let sql = format!("SELECT count(*) FROM {}", self.table);
		let count: i64 = sqlx::query_scalar(&sql).fetch_one(&self.pool).await?;

		Ok(count.max(0) as u64)
	}
}
impl VectorIndex for PgVectorIndex {
	fn dimension(&self) -> usize {
		self.dim
	}

	fn insert<'a>(&'a self, doc: NewDocument) -> BoxFuture<'a, Result<DocumentId>> {
		Box::pin(self.insert_document(doc))
	}

	fn search<'a>(
		&'a self,
		query: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredDocument>>> {
		Box::pin(self.search_documents(query, k))
	}

	fn len<'a>(&'a self) -> BoxFuture<'a, Result<u64>> {
		Box::pin(self.count())
	}
}

pub(crate) fn vector_to_pg(vec: &[f32]) -> String {
	let mut out = String::with_capacity(vec.len() * 8);

	out.push('[');

	for (i, value) in vec.iter().enumerate() {
		if i > 0 {
			out.push(',');
		}

		out.push_str(&value.to_string());
	}

	out.push(']');

	out
}
