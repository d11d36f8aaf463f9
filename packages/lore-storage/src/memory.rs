//! Brute-force cosine index held in process memory.

use std::{
	future,
	sync::{RwLock, RwLockReadGuard, RwLockWriteGuard},
};

use serde_json::{Map, Value};

use crate::{
	BoxFuture, DocumentId, NewDocument, Result, ScoredDocument, VectorIndex, check_k, check_vector,
};

struct Entry {
	id: DocumentId,
	content: String,
	metadata: Map<String, Value>,
	vector: Vec<f32>,
	norm: f64,
}

struct Entries {
	next_id: DocumentId,
	entries: Vec<Entry>,
}

/// Exact nearest-neighbor index that scans every stored vector.
///
/// Searches share a read lock and run in parallel. An insert takes the write lock for the id
/// assignment and the push, so a search sees a document either fully or not at all.
pub struct MemoryIndex {
	dim: usize,
	inner: RwLock<Entries>,
}
impl MemoryIndex {
	pub fn new(dim: usize) -> Self {
		Self { dim, inner: RwLock::new(Entries { next_id: 1, entries: Vec::new() }) }
	}

	pub fn insert_document(&self, doc: NewDocument) -> Result<DocumentId> {
		check_vector(self.dim, &doc.vector)?;

		let norm = norm(&doc.vector);
		let mut inner = self.write();
		let id = inner.next_id;

		inner.next_id += 1;
		inner.entries.push(Entry {
			id,
			content: doc.content,
			metadata: doc.metadata,
			vector: doc.vector,
			norm,
		});

		Ok(id)
	}

	pub fn search_documents(&self, query: &[f32], k: usize) -> Result<Vec<ScoredDocument>> {
		check_vector(self.dim, query)?;
		check_k(k)?;

		let query_norm = norm(query);
		let inner = self.read();
		let mut scored: Vec<(f32, usize)> = inner
			.entries
			.iter()
			.enumerate()
			.map(|(pos, entry)| (cosine_similarity(query, query_norm, entry), pos))
			.collect();

		scored.sort_by(|(a_score, a_pos), (b_score, b_pos)| {
			b_score
				.total_cmp(a_score)
				.then_with(|| inner.entries[*a_pos].id.cmp(&inner.entries[*b_pos].id))
		});
		scored.truncate(k);

		Ok(scored
			.into_iter()
			.map(|(score, pos)| {
				let entry = &inner.entries[pos];

				ScoredDocument {
					id: entry.id,
					score,
					content: entry.content.clone(),
					metadata: entry.metadata.clone(),
				}
			})
			.collect())
	}

	pub fn count(&self) -> usize {
		self.read().entries.len()
	}

	fn read(&self) -> RwLockReadGuard<'_, Entries> {
		self.inner.read().unwrap_or_else(|err| err.into_inner())
	}

	fn write(&self) -> RwLockWriteGuard<'_, Entries> {
		self.inner.write().unwrap_or_else(|err| err.into_inner())
	}
}
impl VectorIndex for MemoryIndex {
	fn dimension(&self) -> usize {
		self.dim
	}

	fn insert<'a>(&'a self, doc: NewDocument) -> BoxFuture<'a, Result<DocumentId>> {
		Box::pin(future::ready(self.insert_document(doc)))
	}

	fn search<'a>(
		&'a self,
		query: &'a [f32],
		k: usize,
	) -> BoxFuture<'a, Result<Vec<ScoredDocument>>> {
		Box::pin(future::ready(self.search_documents(query, k)))
	}

	fn len<'a>(&'a self) -> BoxFuture<'a, Result<u64>> {
		Box::pin(future::ready(Ok(self.count() as u64)))
	}
}

fn norm(vector: &[f32]) -> f64 {
	vector.iter().map(|v| f64::from(*v) * f64::from(*v)).sum::<f64>().sqrt()
}

// Zero-magnitude vectors have no direction; they score 0.0 against everything.
fn cosine_similarity(query: &[f32], query_norm: f64, entry: &Entry) -> f32 {
	if query_norm == 0.0 || entry.norm == 0.0 {
		return 0.0;
	}

	let dot: f64 = query.iter().zip(&entry.vector).map(|(a, b)| f64::from(*a) * f64::from(*b)).sum();

	let score = (dot / (query_norm * entry.norm)) as f32;

	// `total_cmp` orders -0.0 below 0.0; equal scores must tie on id.
	if score == 0.0 { 0.0 } else { score }
}
