use std::{
	fs,
	path::{Path, PathBuf},
};

use clap::Parser;
use color_eyre::eyre;
use serde::Deserialize;
use serde_json::{Map, Value};
use tracing_subscriber::EnvFilter;

use lore_service::{IngestRequest, LoreService};

const SEED_SOURCE: &str = "seed";
const BUILTIN_DOCS: [&str; 3] = [
	"This repository is a minimal production-ready RAG template using FastAPI and pgvector.",
	"It includes CI/CD, observability with OpenTelemetry, and security features like PII masking.",
	"A/B testing scaffolding allows comparing two prompt/model setups safely.",
];

#[derive(Debug, Parser)]
#[command(
	version = lore_cli::VERSION,
	rename_all = "kebab",
	styles = lore_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// JSON array of `{content, metadata}` documents. Defaults to the built-in seed set.
	#[arg(long, short = 'f', value_name = "FILE")]
	pub file: Option<PathBuf>,
}

#[derive(Debug, Deserialize)]
struct SeedDocument {
	content: String,
	#[serde(default)]
	metadata: Map<String, Value>,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = lore_config::load(&args.config)?;
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));
	tracing_subscriber::fmt().with_env_filter(filter).init();

	let docs = match args.file.as_ref() {
		Some(path) => load_documents(path)?,
		None => builtin_documents(),
	};
	if docs.is_empty() {
		return Err(eyre::eyre!("No documents to seed."));
	}

	let service = LoreService::from_config(config).await?;
	let mut ids = Vec::with_capacity(docs.len());

	for doc in docs {
		let response = service
			.ingest(IngestRequest { content: doc.content, metadata: doc.metadata })
			.await?;

		ids.push(response.id);
	}

	tracing::info!(
		count = ids.len(),
		first_id = ?ids.first(),
		last_id = ?ids.last(),
		"Seeded documents."
	);

	Ok(())
}

fn load_documents(path: &Path) -> color_eyre::Result<Vec<SeedDocument>> {
	let raw = fs::read_to_string(path)
		.map_err(|err| eyre::eyre!("Failed to read {}: {err}.", path.display()))?;

	parse_documents(&raw)
}

fn parse_documents(raw: &str) -> color_eyre::Result<Vec<SeedDocument>> {
	let docs: Vec<SeedDocument> = serde_json::from_str(raw)?;

	if let Some(index) = docs.iter().position(|doc| doc.content.trim().is_empty()) {
		return Err(eyre::eyre!("Document {index} has empty content."));
	}

	Ok(docs)
}

fn builtin_documents() -> Vec<SeedDocument> {
	BUILTIN_DOCS
		.iter()
		.map(|content| {
			let mut metadata = Map::new();

			metadata.insert("source".to_string(), Value::String(SEED_SOURCE.to_string()));

			SeedDocument { content: (*content).to_string(), metadata }
		})
		.collect()
}
