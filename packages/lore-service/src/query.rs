use serde::{Deserialize, Serialize};

use lore_domain::{bucket, injection};
use lore_storage::{DocumentId, ScoredDocument};

use crate::{AuditRecord, Error, LoreService, Result};

pub const INJECTION_ERROR: &str = "Potential prompt injection detected";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryRequest {
	pub query: String,
	/// Empty or absent means anonymous.
	#[serde(default)]
	pub caller_identity: Option<String>,
	/// Defaults to `retrieval.default_top_k`; clamped to `retrieval.max_top_k`.
	#[serde(default)]
	pub top_k: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
	pub bucket: bucket::Bucket,
	pub answer_context: String,
	pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Source {
	pub id: DocumentId,
	pub score: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InjectionRejection {
	pub error: &'static str,
	pub phrase: &'static str,
}

/// Terminal states of a query that are not faults.
#[derive(Debug, Clone)]
pub enum QueryOutcome {
	Answered(QueryResponse),
	Rejected(InjectionRejection),
}

impl LoreService {
	/// Runs one query through screening, bucketing, embedding, search, and assembly.
	///
	/// Exactly one audit record is written for an answered or rejected query, after the last await
	/// point, so a cancelled or failed request leaves no record behind.
	pub async fn query(&self, req: QueryRequest) -> Result<QueryOutcome> {
		if req.query.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let k = self.resolve_top_k(req.top_k)?;

		if let Some(phrase) = injection::screen(&req.query) {
			tracing::info!(phrase, "Query rejected by injection screen.");

			self.audit.record(&AuditRecord::rejected(&req.query, phrase));

			return Ok(QueryOutcome::Rejected(InjectionRejection { error: INJECTION_ERROR, phrase }));
		}

		let identity = req
			.caller_identity
			.as_deref()
			.filter(|identity| !identity.is_empty())
			.unwrap_or(self.cfg.retrieval.anonymous_identity.as_str());
		let bucket = bucket::assign(identity, self.default_bucket());

		tracing::debug!(%bucket, k, "Query bucketed.");

		let vector = self.embed_one(&req.query).await?;
		let results = self.index.search(&vector, k).await.inspect_err(|err| {
			if err.is_validation() {
				tracing::warn!(error = %err, "Query vector rejected by the index.");
			} else {
				tracing::error!(error = %err, "Vector index search failed.");
			}
		})?;

		tracing::debug!(hits = results.len(), "Query searched.");

		let Some(variant) = self.cfg.experiment.variants.get(bucket.as_str()) else {
			tracing::error!(%bucket, "No variant configured for bucket.");

			return Err(Error::Config { message: format!("No variant configured for bucket {bucket}.") });
		};
		let answer_context = assemble_context(bucket, &variant.instructions, &results, &req.query);
		let sources: Vec<Source> =
			results.iter().map(|doc| Source { id: doc.id, score: doc.score }).collect();

		self.audit.record(&AuditRecord::complete(
			&req.query,
			bucket,
			variant,
			sources.iter().map(|source| source.id).collect(),
		));

		Ok(QueryOutcome::Answered(QueryResponse { bucket, answer_context, sources }))
	}

	fn resolve_top_k(&self, requested: Option<u32>) -> Result<usize> {
		let requested = requested.unwrap_or(self.cfg.retrieval.default_top_k);

		if requested == 0 {
			return Err(Error::InvalidRequest {
				message: "top_k must be greater than zero.".to_string(),
			});
		}

		Ok(requested.min(self.cfg.retrieval.max_top_k) as usize)
	}
}

fn assemble_context(
	bucket: bucket::Bucket,
	instructions: &str,
	results: &[ScoredDocument],
	query: &str,
) -> String {
	let context = results.iter().map(|doc| doc.content.as_str()).collect::<Vec<_>>().join("\n\n");

	format!("[{bucket}] {instructions}\n\nContext:\n{context}\n\nQ: {query}\nA:")
}
