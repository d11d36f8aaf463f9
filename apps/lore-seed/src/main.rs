use clap::Parser;

use lore_seed::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;
	let args = Args::parse();
	lore_seed::run(args).await
}
