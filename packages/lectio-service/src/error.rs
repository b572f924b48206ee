pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	InvalidReference(#[from] lectio_domain::osis::InvalidReference),
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Search backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Search was cancelled.")]
	Cancelled,
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl Error {
	/// Whether a caller may retry the same request unchanged.
	pub fn is_retryable(&self) -> bool {
		matches!(self, Self::BackendUnavailable { .. } | Self::Storage { .. })
	}
}

impl From<lectio_storage::Error> for Error {
	fn from(err: lectio_storage::Error) -> Self {
		match err {
			lectio_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
