use std::{path::Path, sync::Arc};

use clap::Parser;
use tokio_util::sync::CancellationToken;

use lectio_search::Args;
use lectio_service::{Backend, SearchService};
use lectio_storage::memory::MemoryStore;

fn fixture(name: &str) -> std::path::PathBuf {
	Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(name)
}

fn sample_config() -> lectio_config::Config {
	let path = Path::new(env!("CARGO_MANIFEST_DIR"))
		.join("../../packages/lectio-config/tests/fixtures/sample_config.template.toml");

	lectio_config::load(&path).expect("Sample config should load.")
}

#[test]
fn repeated_filter_flags_build_one_request() {
	let args = Args::try_parse_from([
		"lectio-search",
		"--config",
		"lectio.toml",
		"--author",
		"Augustine",
		"--author",
		"Jane Doe",
		"--tradition",
		"Reformed",
		"-r",
		"John.1.1",
		"-k",
		"3",
		"word of grace",
	])
	.expect("Arguments should parse.");
	let request = args.request();

	assert_eq!(request.query, "word of grace");
	assert_eq!(request.k, 3);
	assert_eq!(request.structured_reference.as_deref(), Some("John.1.1"));
	assert_eq!(request.filters.authors, vec!["Augustine".to_string(), "Jane Doe".to_string()]);
	assert_eq!(request.filters.traditions, vec!["Reformed".to_string()]);
	assert!(request.filters.topic_domains.is_empty());
}

#[test]
fn corpus_and_schema_flags_conflict() {
	let result = Args::try_parse_from([
		"lectio-search",
		"-c",
		"lectio.toml",
		"--corpus",
		"corpus.json",
		"--ensure-schema",
		"grace",
	]);

	assert!(result.is_err());
}

#[tokio::test]
async fn corpus_fixture_answers_a_filtered_reference_query() {
	let store = MemoryStore::load(&fixture("corpus.json")).expect("Corpus should load.");
	let service = SearchService::new(sample_config(), Arc::new(store));
	let args = Args::try_parse_from([
		"lectio-search",
		"-c",
		"unused.toml",
		"--corpus",
		"corpus.json",
		"--tradition",
		"patristic",
		"-r",
		"John.1.1",
		"word",
	])
	.expect("Arguments should parse.");
	let response =
		service.search(args.request(), &CancellationToken::new()).await.expect("Search succeeds.");

	assert_eq!(response.backend, Backend::Fallback);
	assert_eq!(response.items.len(), 2);
	assert_eq!(response.items[0].structured_reference.as_deref(), Some("John.1.1"));
	assert!(response.items.iter().all(|item| item.document_title.starts_with("Homilies")));
	assert!(response.items[0].highlights[0].contains("<mark>Word</mark>"));
}
