use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	decora_worker::run(decora_worker::Args::parse()).await
}
