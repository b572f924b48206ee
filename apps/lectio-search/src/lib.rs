use std::{path::PathBuf, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use lectio_service::{SearchFilters, SearchRequest, SearchService};
use lectio_storage::{backend::PgStore, memory::MemoryStore, store::PassageStore};

#[derive(Debug, Parser)]
#[command(
	version = lectio_cli::VERSION,
	rename_all = "kebab",
	styles = lectio_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: PathBuf,
	/// Search a JSON corpus in memory instead of the configured Postgres and Qdrant stores.
	#[arg(long, value_name = "FILE")]
	pub corpus: Option<PathBuf>,
	/// Create the Postgres schema before searching.
	#[arg(long, conflicts_with = "corpus")]
	pub ensure_schema: bool,
	#[arg(value_name = "QUERY")]
	pub query: String,
	/// OSIS reference such as `John.1.1-5`.
	#[arg(long, short = 'r', value_name = "OSIS")]
	pub reference: Option<String>,
	#[arg(long = "author", value_name = "NAME")]
	pub authors: Vec<String>,
	#[arg(long = "tradition", value_name = "NAME")]
	pub traditions: Vec<String>,
	#[arg(long = "topic-domain", value_name = "NAME")]
	pub topic_domains: Vec<String>,
	#[arg(long = "metadata", value_name = "TERM")]
	pub metadata: Vec<String>,
	#[arg(long, short = 'k', default_value_t = 10)]
	pub k: u32,
}
impl Args {
	pub fn request(&self) -> SearchRequest {
		SearchRequest {
			query: self.query.clone(),
			structured_reference: self.reference.clone(),
			filters: SearchFilters {
				authors: self.authors.clone(),
				traditions: self.traditions.clone(),
				topic_domains: self.topic_domains.clone(),
				metadata: self.metadata.clone(),
			},
			k: self.k,
		}
	}
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = lectio_config::load(&args.config)?;

	init_tracing(&config)?;

	let store: Arc<dyn PassageStore> = match args.corpus.as_deref() {
		Some(path) => {
			let store = MemoryStore::load(path)?;

			tracing::info!(path = %path.display(), passages = store.passage_count(), "Corpus loaded.");

			Arc::new(store)
		},
		None => {
			let store = PgStore::connect(&config.storage).await?;

			if args.ensure_schema {
				store.db.ensure_schema().await?;
			}

			Arc::new(store)
		},
	};
	let service = SearchService::new(config, store);
	let cancel = CancellationToken::new();
	let trigger = cancel.clone();

	tokio::spawn(async move {
		if tokio::signal::ctrl_c().await.is_ok() {
			tracing::info!("Received Ctrl+C, cancelling search.");
			trigger.cancel();
		}
	});

	let response = service.search(args.request(), &cancel).await?;

	println!("{}", serde_json::to_string_pretty(&response)?);

	Ok(())
}

fn init_tracing(config: &lectio_config::Config) -> color_eyre::Result<()> {
	let filter =
		EnvFilter::try_new(&config.service.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

	tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

	Ok(())
}
