pub mod analysis;
pub mod product_match;
pub mod recommendation;
pub mod visualization;
pub mod worker;

use clap::Parser;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(rename_all = "kebab")]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = decora_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = decora_storage::db::Db::connect(&config.storage.postgres).await?;

	db.ensure_schema().await?;

	let service = decora_service::DesignService::new(config, db);
	let state = worker::WorkerState::new(service);

	worker::run_worker(state).await
}
