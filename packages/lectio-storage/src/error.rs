#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Sqlx(#[from] sqlx::Error),
	#[error(transparent)]
	Qdrant(#[from] Box<qdrant_client::QdrantError>),
	#[error("Vector index is unavailable: {0}")]
	VectorUnavailable(String),
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),
	#[error("Failed to read corpus at {path:?}.")]
	ReadCorpus { path: std::path::PathBuf, source: std::io::Error },
	#[error("Failed to parse corpus at {path:?}.")]
	ParseCorpus { path: std::path::PathBuf, source: serde_json::Error },
}
impl From<qdrant_client::QdrantError> for Error {
	fn from(err: qdrant_client::QdrantError) -> Self {
		Self::Qdrant(Box::new(err))
	}
}
