use serde::Serialize;
use time::OffsetDateTime;

use lore_domain::bucket::Bucket;
use lore_storage::DocumentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditOutcome {
	Complete,
	Rejected,
}

/// One entry per completed or rejected query. `query` is always the scrubbed text.
#[derive(Debug, Clone, Serialize)]
pub struct AuditRecord {
	#[serde(with = "time::serde::rfc3339")]
	pub ts: OffsetDateTime,
	pub event: &'static str,
	pub outcome: AuditOutcome,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub bucket: Option<Bucket>,
	pub query: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub phrase: Option<&'static str>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub prompt_version: Option<String>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub model: Option<String>,
	#[serde(skip_serializing_if = "Vec::is_empty")]
	pub source_ids: Vec<DocumentId>,
}
impl AuditRecord {
	pub(crate) fn rejected(raw_query: &str, phrase: &'static str) -> Self {
		Self {
			ts: OffsetDateTime::now_utc(),
			event: "query",
			outcome: AuditOutcome::Rejected,
			bucket: None,
			query: lore_domain::pii::scrub(raw_query),
			phrase: Some(phrase),
			prompt_version: None,
			model: None,
			source_ids: Vec::new(),
		}
	}

	pub(crate) fn complete(
		raw_query: &str,
		bucket: Bucket,
		variant: &lore_config::Variant,
		source_ids: Vec<DocumentId>,
	) -> Self {
		Self {
			ts: OffsetDateTime::now_utc(),
			event: "query",
			outcome: AuditOutcome::Complete,
			bucket: Some(bucket),
			query: lore_domain::pii::scrub(raw_query),
			phrase: None,
			prompt_version: Some(variant.prompt_version.clone()),
			model: Some(variant.model.clone()),
			source_ids,
		}
	}
}

pub trait AuditSink
where
	Self: Send + Sync,
{
	fn record(&self, record: &AuditRecord);
}

/// Writes each record as one JSON line on the `lore::audit` tracing target.
pub struct TracingAuditSink;
impl AuditSink for TracingAuditSink {
	fn record(&self, record: &AuditRecord) {
		match serde_json::to_string(record) {
			Ok(json) => tracing::info!(target: "lore::audit", "{json}"),
			Err(err) => tracing::warn!(error = %err, "Failed to serialize audit record."),
		}
	}
}
