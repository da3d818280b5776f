pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Provider failure taxonomy.
///
/// `Transport` and retryable `Status` values mean the provider was
/// unavailable; `InvalidResponse` means it answered with something the caller
/// cannot use. The retry utility only ever retries the former.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error(transparent)]
	Transport(#[from] reqwest::Error),
	#[error("Provider returned HTTP {status}.")]
	Status { status: reqwest::StatusCode },
	#[error("Invalid provider response: {message}")]
	InvalidResponse { message: String },
	#[error("{message}")]
	InvalidConfig { message: String },
	#[error("{message}")]
	MissingCredentials { message: String },
	#[error(transparent)]
	InvalidHeaderName(#[from] reqwest::header::InvalidHeaderName),
	#[error(transparent)]
	InvalidHeaderValue(#[from] reqwest::header::InvalidHeaderValue),
}
impl Error {
	pub fn invalid_response(message: impl Into<String>) -> Self {
		Self::InvalidResponse { message: message.into() }
	}

	pub fn is_retryable(&self) -> bool {
		let retryable = match self {
			Self::Transport(err) => err.is_timeout() || err.is_connect(),
			Self::Status { status } => matches!(status.as_u16(), 429 | 503 | 504),
			Self::InvalidResponse { .. }
			| Self::InvalidConfig { .. }
			| Self::MissingCredentials { .. }
			| Self::InvalidHeaderName(_)
			| Self::InvalidHeaderValue(_) => false,
		};

		if retryable {
			return true;
		}

		// Last-resort fallback for providers that report throttling only in
		// free text.
		self.to_string().to_ascii_lowercase().contains("rate limit")
	}
}
