use clap::Parser;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = lectio_search::Args::parse();

	lectio_search::run(args).await
}
