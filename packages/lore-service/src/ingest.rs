use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use lore_storage::{DocumentId, NewDocument};

use crate::{Error, LoreService, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct IngestRequest {
	pub content: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
	pub id: DocumentId,
}

impl LoreService {
	pub async fn ingest(&self, req: IngestRequest) -> Result<IngestResponse> {
		if req.content.trim().is_empty() {
			return Err(Error::InvalidRequest { message: "content must be non-empty.".to_string() });
		}

		let vector = self.embed_one(&req.content).await?;
		let id = self
			.index
			.insert(NewDocument { content: req.content, metadata: req.metadata, vector })
			.await
			.inspect_err(|err| {
				if !err.is_validation() {
					tracing::error!(error = %err, "Vector index insert failed.");
				}
			})?;

		tracing::info!(id, "Document ingested.");

		Ok(IngestResponse { id })
	}
}
