pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Not found: {message}")]
	NotFound { message: String },
	#[error("{message}")]
	RateLimited { message: String },
	#[error("Conflict: {message}")]
	Conflict { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<sqlx::Error> for Error {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<decora_storage::Error> for Error {
	fn from(err: decora_storage::Error) -> Self {
		match err {
			decora_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			decora_storage::Error::Http(inner) => Self::Storage { message: inner.to_string() },
			decora_storage::Error::SerdeJson(inner) =>
				Self::Storage { message: inner.to_string() },
			decora_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			decora_storage::Error::NotFound(message) => Self::NotFound { message },
			decora_storage::Error::Conflict(message) => Self::Conflict { message },
			decora_storage::Error::ObjectStore(message) => Self::Storage { message },
		}
	}
}

impl From<decora_providers::Error> for Error {
	fn from(err: decora_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
