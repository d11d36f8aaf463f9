use serde_json::{Map, Value};

pub type DocumentId = i64;

#[derive(Debug, Clone)]
pub struct NewDocument {
	pub content: String,
	pub metadata: Map<String, Value>,
	pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
	pub id: DocumentId,
	/// `1 - cosine_distance`; higher is closer.
	pub score: f32,
	pub content: String,
	pub metadata: Map<String, Value>,
}
